//! Palisade Security Policy
//!
//! Declarative configuration for the Palisade plugin sandbox:
//! - Permission quotas and trust anchors
//! - Banned-construct and secret-detection pattern sets
//! - Module allow/deny lists for the static scanner
//! - Named presets and deterministic structural merging
//!
//! A policy is pure data. The scanner, permission validator, and sandbox
//! runtime in `palisade-runtime` consume it; nothing here executes or
//! validates anything beyond parsing.
//!
//! # Example
//!
//! ```
//! use palisade_policy::{policy, PolicyPatch};
//!
//! let base = policy("strict");
//! let patch = PolicyPatch {
//!     trusted_domains: vec!["api.example.com".to_string()],
//!     ..PolicyPatch::default()
//! };
//! let custom = base.merge(&patch);
//! assert!(custom.trusted_domains.contains(&"api.example.com".to_string()));
//! ```

pub mod patterns;
pub mod policy;
pub mod presets;

use thiserror::Error;

/// Policy loading errors
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy parse error: {0}")]
    Parse(String),
}

pub use patterns::{
    BannedPattern, ModulePolicy, PatternCategory, SecretKind, SecretPattern, Severity,
};
pub use policy::{MaxPermissions, MaxPermissionsPatch, PolicyPatch, SecurityPolicy};
pub use presets::{
    default_policy, development_policy, permissive_policy, policy, strict_policy,
};
