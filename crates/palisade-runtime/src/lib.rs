//! Palisade Runtime - plugin security sandbox
//!
//! This library decides whether untrusted third-party plugin code may run
//! at all, and runs it under enforced isolation if so:
//! - Static code scanning (banned constructs, secrets, import policy)
//! - Capability/permission validation with an audit trail
//! - Resource-bounded sandboxed execution behind an injected evaluator
//!
//! Install time: [`Scanner::scan_code`] evaluates the source; if the scan
//! is acceptable, [`PermissionValidator`] parses and validates the
//! requested capabilities, producing the approved set the installer
//! persists. Run time: [`SandboxRuntime`] binds a context to that
//! approved set and executes code, consulting the validator for every
//! capability-gated operation and recording violations as they fire.
//!
//! # Example
//!
//! ```
//! use palisade_runtime::scanner::Scanner;
//!
//! let scanner = Scanner::with_policy_name("default");
//! let report = scanner.scan_code("eval(payload);");
//! assert!(!report.passed);
//! ```

/// Palisade runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod audit;
pub mod manifest;
pub mod permissions;
pub mod sandbox;
pub mod scanner;
pub mod validator;

// Re-export commonly used types
pub use audit::{AuditFilter, AuditLog, AuditLogEntry};
pub use manifest::{ManifestError, PluginManifest};
pub use permissions::{
    AccessLevel, FileSystemPermission, NetworkPermission, PermissionSet, Protocol,
};
pub use sandbox::{
    EvalError, Evaluator, ExecutionResult, FetchResponse, NetworkBackend, ResourceLimitOverrides,
    ResourceLimits, ResourceUsage, SandboxContext, SandboxError, SandboxHost, SandboxRuntime,
    SecurityViolation, ViolationHook, ViolationKind,
};
pub use scanner::{PatternMatch, Scanner, SecurityScanResult};
pub use validator::{PermissionValidator, ValidationReport, RECOGNIZED_TOOLS};

// The policy vocabulary travels with the runtime API
pub use palisade_policy::{PolicyPatch, SecurityPolicy, Severity};
