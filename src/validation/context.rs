//! Execution context
//!
//! Validation passes requested with `simulation = false` only run when the
//! caller is inside a trusted execution context. Hosts decide what
//! "trusted" means by supplying an `ExecutionContext`.

/// Predicate answering whether the current flow is trusted
pub trait ExecutionContext: Send + Sync {
    fn is_trusted(&self) -> bool;
}

/// Always trusted (server-side flows, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedContext;

impl ExecutionContext for TrustedContext {
    fn is_trusted(&self) -> bool {
        true
    }
}

/// Never trusted
#[derive(Debug, Clone, Copy, Default)]
pub struct UntrustedContext;

impl ExecutionContext for UntrustedContext {
    fn is_trusted(&self) -> bool {
        false
    }
}

impl<F> ExecutionContext for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_trusted(&self) -> bool {
        self()
    }
}
