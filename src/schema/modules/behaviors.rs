//! Behaviors module
//!
//! Behaviors are named option maps carried through composition for
//! collaborators to interpret. Child options replace the parent's per
//! behavior name.

use serde_json::Value;

use super::{merge_keyed, upsert};
use crate::schema::class::SchemaBuilder;
use crate::schema::definition::ClassDefinition;
use crate::schema::errors::{CompositionError, CompositionResult};
use crate::schema::module::{CompositionContext, Module};

pub const BEHAVIORS_MODULE: &str = "behaviors";

#[derive(Debug, Default, Clone, Copy)]
pub struct BehaviorsModule;

impl Module for BehaviorsModule {
    type Fragment = Vec<(String, Value)>;

    fn name(&self) -> &str {
        BEHAVIORS_MODULE
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
        for (name, options) in &definition.behaviors {
            let options = match options {
                Value::Null => Value::Object(Default::default()),
                Value::Object(_) => options.clone(),
                other => {
                    return Err(CompositionError::invalid(
                        ctx.class_name,
                        format!("behavior '{}' options must be an object, got {}", name, other),
                    ))
                }
            };
            upsert(&mut fragment, name, options);
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
        schema.behaviors = merged.clone();
        Ok(())
    }
}
