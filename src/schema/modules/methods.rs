//! Methods module

use super::{merge_keyed, upsert};
use crate::schema::class::SchemaBuilder;
use crate::schema::definition::{ClassDefinition, Method};
use crate::schema::errors::CompositionResult;
use crate::schema::module::{CompositionContext, Module};

pub const METHODS_MODULE: &str = "methods";

#[derive(Debug, Default, Clone, Copy)]
pub struct MethodsModule;

impl Module for MethodsModule {
    type Fragment = Vec<(String, Method)>;

    fn name(&self) -> &str {
        METHODS_MODULE
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
        _ctx: &CompositionContext<'_>,
        definition: &ClassDefinition,
        mut fragment: Self::Fragment,
    ) -> CompositionResult<Self::Fragment> {
        for (name, method) in &definition.methods {
            upsert(&mut fragment, name, method.clone());
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
        schema.methods = merged.clone();
        Ok(())
    }
}
