//! Fields module
//!
//! Owns field declarations. A root class gets `_id`; a subclass gets its
//! own `_type` (defaulting to the subclass name) and inherits `_id`.

use tracing::debug;

use crate::schema::class::SchemaBuilder;
use crate::schema::definition::ClassDefinition;
use crate::schema::errors::{CompositionError, CompositionResult};
use crate::schema::module::{CompositionContext, Module};
use crate::schema::types::{FieldDefinition, ID_FIELD, TYPE_FIELD};

pub const FIELDS_MODULE: &str = "fields";

#[derive(Debug, Default, Clone, Copy)]
pub struct FieldsModule;

impl Module for FieldsModule {
    type Fragment = Vec<FieldDefinition>;

    fn name(&self) -> &str {
        FIELDS_MODULE
    }

    fn init_schema(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()> {
        if schema.parent().is_none() {
            schema.fields.push(FieldDefinition::id_field());
        } else {
            schema.fields.push(FieldDefinition::type_field(ctx.class_name));
        }
        Ok(())
    }

    fn init_definition(
        &self,
        _ctx: &CompositionContext<'_>,
        schema: &SchemaBuilder,
    ) -> CompositionResult<Self::Fragment> {
        Ok(schema.own_fields().to_vec())
    }

    fn parse_definition(
        &self,
        ctx: &CompositionContext<'_>,
        definition: &ClassDefinition,
        mut fragment: Self::Fragment,
    ) -> CompositionResult<Self::Fragment> {
        for (name, spec) in &definition.fields {
            if name == ID_FIELD || name == TYPE_FIELD {
                return Err(CompositionError::ReservedField {
                    class: ctx.class_name.to_string(),
                    field: name.clone(),
                });
            }
            if name.is_empty() || name.contains('.') {
                return Err(CompositionError::invalid(
                    ctx.class_name,
                    format!("invalid field name '{}'", name),
                ));
            }
            if fragment.iter().any(|f| f.name == *name) {
                return Err(CompositionError::DuplicateField {
                    class: ctx.class_name.to_string(),
                    field: name.clone(),
                });
            }

            fragment.push(FieldDefinition {
                name: name.clone(),
                field_type: spec.type_spec.as_ref().map(|t| t.resolve(ctx.classes)),
                default: spec.default.clone(),
                optional: spec.optional,
                transient: spec.transient,
                immutable: spec.immutable,
            });
        }
        Ok(fragment)
    }

    fn merge_definitions(
        &self,
        _ctx: &CompositionContext<'_>,
        parent: &Self::Fragment,
        own: &Self::Fragment,
    ) -> CompositionResult<Self::Fragment> {
        let mut merged = parent.clone();
        for field in own {
            match merged.iter_mut().find(|f| f.name == field.name) {
                Some(slot) => *slot = field.clone(),
                None => merged.push(field.clone()),
            }
        }
        Ok(merged)
    }

    fn apply_definition(
        &self,
        _ctx: &CompositionContext<'_>,
        schema: &mut SchemaBuilder,
        own: &Self::Fragment,
        merged: &Self::Fragment,
    ) -> CompositionResult<()> {
        schema.fields = own.clone();
        schema.field_order = merged.iter().map(|f| f.name.clone()).collect();
        Ok(())
    }

    fn init_class(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()> {
        for field in schema.own_fields() {
            let Some(class) = field.field_type.as_ref().and_then(|t| t.class_ref()) else {
                continue;
            };
            if class.name() == ctx.class_name || ctx.is_declared(class.name()) {
                debug!(class = %ctx.class_name, field = %field.name, referenced = %class.name(), "Resolved class reference");
                continue;
            }
            return Err(CompositionError::UnresolvedClass {
                class: ctx.class_name.to_string(),
                field: field.name.clone(),
                referenced: class.name().to_string(),
            });
        }
        Ok(())
    }
}
