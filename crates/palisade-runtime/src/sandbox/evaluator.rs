//! Restricted evaluator port
//!
//! The thing being sandboxed is dynamically supplied code, but the
//! mechanism that runs it is injected behind this trait so the core logic
//! (permission checks, resource accounting, violation recording) stays
//! independent of the concrete isolation technology. An evaluator only
//! sees the code unit and the [`SandboxHost`] handle — nothing outside
//! the host's namespace is reachable.
//!
//! The timed-execution race preempts at await points: an evaluator must
//! reach the host through its async surface (fetch, timers) rather than
//! blocking the thread, matching the assumption that the execution
//! substrate can be preempted on a timer.

use crate::sandbox::namespace::SandboxHost;
use crate::sandbox::SandboxError;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of one evaluation
#[derive(Error, Debug)]
pub enum EvalError {
    /// A host-raised denial: capability, resource budget, or banned
    /// construct
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The plugin code's own failure, surfaced as-is
    #[error("{0}")]
    Code(String),
}

/// Executes one code unit against a restricted host namespace
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        code: &str,
        host: &SandboxHost,
    ) -> Result<serde_json::Value, EvalError>;
}

/// Evaluator that runs nothing and returns `null`; useful for wiring
/// tests and hosts that only exercise pre-flight checks
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvaluator;

#[async_trait]
impl Evaluator for NullEvaluator {
    async fn evaluate(
        &self,
        _code: &str,
        _host: &SandboxHost,
    ) -> Result<serde_json::Value, EvalError> {
        Ok(serde_json::Value::Null)
    }
}
