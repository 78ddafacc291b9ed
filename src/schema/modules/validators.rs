//! Validators module
//!
//! Resolves declared validator kinds against the validator registry and
//! binds them to fields. A subclass declaring validators for a field
//! replaces the parent's list for that field.

use super::merge_keyed;
use crate::schema::class::SchemaBuilder;
use crate::schema::definition::ClassDefinition;
use crate::schema::errors::{CompositionError, CompositionResult};
use crate::schema::module::{CompositionContext, Module};
use crate::validation::ValidatorDefinition;

pub const VALIDATORS_MODULE: &str = "validators";

#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatorsModule;

impl Module for ValidatorsModule {
    type Fragment = Vec<(String, Vec<ValidatorDefinition>)>;

    fn name(&self) -> &str {
        VALIDATORS_MODULE
    }

    fn init_definition(
        &self,
        _ctx: &CompositionContext<'_>,
        _schema: &SchemaBuilder,
    ) -> CompositionResult<Self::Fragment> {
        Ok(Vec::new())
    }

    fn parse_definition(
        &self,
        ctx: &CompositionContext<'_>,
        definition: &ClassDefinition,
        mut fragment: Self::Fragment,
    ) -> CompositionResult<Self::Fragment> {
        for (field, specs) in &definition.validators {
            let mut bound = Vec::with_capacity(specs.len());
            for spec in specs {
                let func = ctx.validators.get(&spec.kind).ok_or_else(|| {
                    CompositionError::UnknownValidator {
                        class: ctx.class_name.to_string(),
                        field: field.clone(),
                        kind: spec.kind.clone(),
                    }
                })?;
                let mut validator = ValidatorDefinition::new(field.clone(), spec.kind.clone(), func);
                validator.param = spec.param.clone();
                validator.message = spec.message.clone();
                validator.resolve_error = spec.resolve_error.clone();
                bound.push(validator);
            }

            match fragment.iter_mut().find(|(name, _)| name == field) {
                Some((_, existing)) => existing.extend(bound),
                None => fragment.push((field.clone(), bound)),
            }
        }
        Ok(fragment)
    }

    fn merge_definitions(
        &self,
        _ctx: &CompositionContext<'_>,
        parent: &Self::Fragment,
        own: &Self::Fragment,
    ) -> CompositionResult<Self::Fragment> {
        Ok(merge_keyed(parent, own))
    }

    fn apply_definition(
        &self,
        _ctx: &CompositionContext<'_>,
        schema: &mut SchemaBuilder,
        _own: &Self::Fragment,
        merged: &Self::Fragment,
    ) -> CompositionResult<()> {
        schema.validators = merged.clone();
        Ok(())
    }

    fn init_class(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()> {
        for (field, _) in &schema.validators {
            // Nested fields take their validators from their own class
            if field.contains('.') {
                return Err(CompositionError::invalid(
                    ctx.class_name,
                    format!("validators bound to nested path '{}'", field),
                ));
            }
            if schema.field(field).is_none() {
                return Err(CompositionError::invalid(
                    ctx.class_name,
                    format!("validators bound to unknown field '{}'", field),
                ));
            }
        }
        Ok(())
    }
}
