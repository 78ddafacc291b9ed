//! Events module
//!
//! Handlers accumulate down the inheritance chain: a subclass's handlers
//! run after its parent's for the same event.

use crate::schema::class::SchemaBuilder;
use crate::schema::definition::{ClassDefinition, EventHandler};
use crate::schema::errors::CompositionResult;
use crate::schema::module::{CompositionContext, Module};

pub const EVENTS_MODULE: &str = "events";

#[derive(Debug, Default, Clone, Copy)]
pub struct EventsModule;

fn append(entries: &mut Vec<(String, Vec<EventHandler>)>, event: &str, handlers: &[EventHandler]) {
    match entries.iter_mut().find(|(name, _)| name == event) {
        Some((_, existing)) => existing.extend(handlers.iter().cloned()),
        None => entries.push((event.to_string(), handlers.to_vec())),
    }
}

impl Module for EventsModule {
    type Fragment = Vec<(String, Vec<EventHandler>)>;

    fn name(&self) -> &str {
        EVENTS_MODULE
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
        for (event, handler) in &definition.events {
            append(&mut fragment, event, std::slice::from_ref(handler));
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
        for (event, handlers) in own {
            append(&mut merged, event, handlers);
        }
        Ok(merged)
    }

    fn apply_definition(
        &self,
        _ctx: &CompositionContext<'_>,
        schema: &mut SchemaBuilder,
        _own: &Self::Fragment,
        merged: &Self::Fragment,
    ) -> CompositionResult<()> {
        schema.events = merged.clone();
        Ok(())
    }
}
