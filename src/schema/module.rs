//! Composition modules
//!
//! A module owns one slice of a class declaration (fields, validators,
//! events, ...) and contributes to the Schema through six hooks. The
//! registry runs each phase across every module, in registration order,
//! before starting the next phase.
//!
//! Each module's per-phase output is an explicit `Fragment` value handed to
//! the next phase. Fragments are stored on the published Schema so that a
//! subclass can merge against its parent's merged fragment.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use super::class::{Schema, SchemaBuilder};
use super::definition::ClassDefinition;
use super::errors::{CompositionError, CompositionResult};
use super::registry::ClassTable;
use super::types::ClassRef;
use crate::validation::ValidatorRegistry;

/// Composition phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    InitSchema,
    InitDefinition,
    ParseDefinition,
    MergeDefinitions,
    ApplyDefinition,
    InitClass,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::InitSchema,
        Phase::InitDefinition,
        Phase::ParseDefinition,
        Phase::MergeDefinitions,
        Phase::ApplyDefinition,
        Phase::InitClass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::InitSchema => "initSchema",
            Phase::InitDefinition => "initDefinition",
            Phase::ParseDefinition => "parseDefinition",
            Phase::MergeDefinitions => "mergeDefinitions",
            Phase::ApplyDefinition => "applyDefinition",
            Phase::InitClass => "initClass",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a module can see while composing one class
pub struct CompositionContext<'a> {
    pub class_name: &'a str,
    pub parent: Option<&'a Arc<Schema>>,
    pub validators: &'a ValidatorRegistry,
    pub(crate) classes: &'a Weak<ClassTable>,
    pub(crate) batch: &'a HashSet<String>,
}

impl<'a> CompositionContext<'a> {
    /// Looks up an already published class
    pub fn lookup_class(&self, name: &str) -> Option<Arc<Schema>> {
        ClassRef::lookup(self.classes, name)
    }

    /// True when `name` is published or registered in the same batch
    /// as this class
    pub fn is_declared(&self, name: &str) -> bool {
        self.batch.contains(name) || self.lookup_class(name).is_some()
    }

    /// Builds a phase failure for `module`
    pub fn error(&self, module: &str, phase: Phase, reason: impl Into<String>) -> CompositionError {
        CompositionError::Phase {
            module: module.to_string(),
            phase,
            class: self.class_name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A composition module.
///
/// Only `name`, `init_definition`, `parse_definition` and
/// `merge_definitions` are required; the other hooks default to no-ops.
pub trait Module: Send + Sync + 'static {
    /// The module's canonical slice of a declaration
    type Fragment: Send + Sync + 'static;

    /// Unique module name
    fn name(&self) -> &str;

    /// Installs framework-mandatory entries on the schema
    fn init_schema(&self, _ctx: &CompositionContext<'_>, _schema: &mut SchemaBuilder) -> CompositionResult<()> {
        Ok(())
    }

    /// Allocates the empty fragment for this class
    fn init_definition(
        &self,
        ctx: &CompositionContext<'_>,
        schema: &SchemaBuilder,
    ) -> CompositionResult<Self::Fragment>;

    /// Normalizes the module's slice of the raw declaration into `fragment`
    fn parse_definition(
        &self,
        ctx: &CompositionContext<'_>,
        definition: &ClassDefinition,
        fragment: Self::Fragment,
    ) -> CompositionResult<Self::Fragment>;

    /// Combines the parent's merged fragment with this class's own.
    /// The child replaces by key; the parent provides the rest.
    fn merge_definitions(
        &self,
        ctx: &CompositionContext<'_>,
        parent: &Self::Fragment,
        own: &Self::Fragment,
    ) -> CompositionResult<Self::Fragment>;

    /// Installs the module's observable surface on the schema
    fn apply_definition(
        &self,
        _ctx: &CompositionContext<'_>,
        _schema: &mut SchemaBuilder,
        _own: &Self::Fragment,
        _merged: &Self::Fragment,
    ) -> CompositionResult<()> {
        Ok(())
    }

    /// Final checks once every module has applied its definition
    fn init_class(&self, _ctx: &CompositionContext<'_>, _schema: &mut SchemaBuilder) -> CompositionResult<()> {
        Ok(())
    }
}

pub(crate) type AnyFragment = Box<dyn Any + Send + Sync>;

/// Object-safe view of a `Module`, fragments boxed as `Any`
pub(crate) trait ErasedModule: Send + Sync {
    fn module_name(&self) -> &str;

    fn init_schema(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()>;

    fn init_definition(&self, ctx: &CompositionContext<'_>, schema: &SchemaBuilder) -> CompositionResult<AnyFragment>;

    fn parse_definition(
        &self,
        ctx: &CompositionContext<'_>,
        definition: &ClassDefinition,
        fragment: AnyFragment,
    ) -> CompositionResult<AnyFragment>;

    fn merge_definitions(
        &self,
        ctx: &CompositionContext<'_>,
        parent: &(dyn Any + Send + Sync),
        own: &(dyn Any + Send + Sync),
    ) -> CompositionResult<AnyFragment>;

    fn apply_definition(
        &self,
        ctx: &CompositionContext<'_>,
        schema: &mut SchemaBuilder,
        own: &(dyn Any + Send + Sync),
        merged: &(dyn Any + Send + Sync),
    ) -> CompositionResult<()>;

    fn init_class(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()>;
}

impl<M: Module> ErasedModule for M {
    fn module_name(&self) -> &str {
        Module::name(self)
    }

    fn init_schema(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()> {
        Module::init_schema(self, ctx, schema)
    }

    fn init_definition(&self, ctx: &CompositionContext<'_>, schema: &SchemaBuilder) -> CompositionResult<AnyFragment> {
        let fragment = Module::init_definition(self, ctx, schema)?;
        Ok(Box::new(fragment))
    }

    fn parse_definition(
        &self,
        ctx: &CompositionContext<'_>,
        definition: &ClassDefinition,
        fragment: AnyFragment,
    ) -> CompositionResult<AnyFragment> {
        let fragment = fragment
            .downcast::<M::Fragment>()
            .map_err(|_| mismatch(ctx, Module::name(self), Phase::ParseDefinition))?;
        let parsed = Module::parse_definition(self, ctx, definition, *fragment)?;
        Ok(Box::new(parsed))
    }

    fn merge_definitions(
        &self,
        ctx: &CompositionContext<'_>,
        parent: &(dyn Any + Send + Sync),
        own: &(dyn Any + Send + Sync),
    ) -> CompositionResult<AnyFragment> {
        let name = Module::name(self);
        let parent = typed::<M::Fragment>(ctx, name, Phase::MergeDefinitions, parent)?;
        let own = typed::<M::Fragment>(ctx, name, Phase::MergeDefinitions, own)?;
        let merged = Module::merge_definitions(self, ctx, parent, own)?;
        Ok(Box::new(merged))
    }

    fn apply_definition(
        &self,
        ctx: &CompositionContext<'_>,
        schema: &mut SchemaBuilder,
        own: &(dyn Any + Send + Sync),
        merged: &(dyn Any + Send + Sync),
    ) -> CompositionResult<()> {
        let name = Module::name(self);
        let own = typed::<M::Fragment>(ctx, name, Phase::ApplyDefinition, own)?;
        let merged = typed::<M::Fragment>(ctx, name, Phase::ApplyDefinition, merged)?;
        Module::apply_definition(self, ctx, schema, own, merged)
    }

    fn init_class(&self, ctx: &CompositionContext<'_>, schema: &mut SchemaBuilder) -> CompositionResult<()> {
        Module::init_class(self, ctx, schema)
    }
}

fn typed<'f, T: Any>(
    ctx: &CompositionContext<'_>,
    module: &str,
    phase: Phase,
    fragment: &'f (dyn Any + Send + Sync),
) -> CompositionResult<&'f T> {
    fragment
        .downcast_ref::<T>()
        .ok_or_else(|| mismatch(ctx, module, phase))
}

fn mismatch(ctx: &CompositionContext<'_>, module: &str, phase: Phase) -> CompositionError {
    ctx.error(module, phase, "fragment has an unexpected type")
}
