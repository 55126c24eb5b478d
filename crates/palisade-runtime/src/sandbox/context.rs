//! Execution contexts and resource accounting
//!
//! A context is one live, resource-accounted execution session bound to
//! one plugin and one approved capability set. The authoritative state
//! lives in the runtime's context table; the public [`SandboxContext`] is
//! a snapshot.

use crate::permissions::PermissionSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_MEMORY_LIMIT: &str = "256MB";
pub const DEFAULT_MEMORY_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_CPU_TIME_MS: u64 = 30_000;
pub const DEFAULT_NETWORK_CALLS: u32 = 100;
pub const DEFAULT_FILESYSTEM_OPS: u32 = 500;

/// Per-context resource budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceLimits {
    /// Size string, e.g. `256MB`
    pub memory_limit: String,
    pub cpu_time_ms: u64,
    pub network_calls: u32,
    pub filesystem_ops: Option<u32>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
            cpu_time_ms: DEFAULT_CPU_TIME_MS,
            network_calls: DEFAULT_NETWORK_CALLS,
            filesystem_ops: Some(DEFAULT_FILESYSTEM_OPS),
        }
    }
}

impl ResourceLimits {
    /// Parsed memory budget; an unparseable size string falls back to the
    /// default because context creation never errors
    pub fn memory_bytes(&self) -> u64 {
        parse_size(&self.memory_limit).unwrap_or(DEFAULT_MEMORY_BYTES)
    }

    pub fn filesystem_ops(&self) -> u32 {
        self.filesystem_ops.unwrap_or(DEFAULT_FILESYSTEM_OPS)
    }

    /// Caller-supplied overrides merged over the defaults
    pub fn merged_over_defaults(overrides: &ResourceLimitOverrides) -> Self {
        let defaults = Self::default();
        Self {
            memory_limit: overrides
                .memory_limit
                .clone()
                .unwrap_or(defaults.memory_limit),
            cpu_time_ms: overrides.cpu_time_ms.unwrap_or(defaults.cpu_time_ms),
            network_calls: overrides.network_calls.unwrap_or(defaults.network_calls),
            filesystem_ops: overrides.filesystem_ops.or(defaults.filesystem_ops),
        }
    }
}

/// Partial form of [`ResourceLimits`]; absent fields keep the default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceLimitOverrides {
    pub memory_limit: Option<String>,
    pub cpu_time_ms: Option<u64>,
    pub network_calls: Option<u32>,
    pub filesystem_ops: Option<u32>,
}

/// Accumulated consumption; monotonically non-decreasing for the life of
/// a context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub memory_bytes: u64,
    /// Wall-clock execution time; an explicit approximation of CPU time
    pub cpu_time_ms: u64,
    pub network_calls: u32,
    pub filesystem_ops: u32,
}

/// Snapshot of a live execution session
#[derive(Debug, Clone)]
pub struct SandboxContext {
    pub id: String,
    pub plugin: String,
    pub permissions: PermissionSet,
    pub limits: ResourceLimits,
    pub allowed_globals: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub usage: ResourceUsage,
}

/// Parse a size string such as `64KB`, `256MB`, `1GB`, or a bare byte
/// count
pub fn parse_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits.parse().ok()?;

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

pub(crate) fn generate_context_id() -> String {
    format!("ctx-{:032x}", rand::random::<u128>())
}
