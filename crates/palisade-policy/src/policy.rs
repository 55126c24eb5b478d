//! Security policy definition and structural merge
//!
//! A `SecurityPolicy` is pure configuration: quotas, pattern sets, module
//! lists, and trust anchors. It carries no behavior beyond deterministic
//! merging and (de)serialization; validation happens where the policy is
//! consumed.

use crate::patterns::{BannedPattern, ModulePolicy, SecretPattern};
use crate::presets;
use crate::PolicyError;
use serde::{Deserialize, Serialize};

/// Per-category quotas on how many permission entries a plugin may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxPermissions {
    pub filesystem: usize,
    pub network: usize,
    pub tools: usize,
}

impl Default for MaxPermissions {
    fn default() -> Self {
        Self {
            filesystem: 10,
            network: 5,
            tools: 10,
        }
    }
}

/// Partial form of [`MaxPermissions`]; absent fields keep the base value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxPermissionsPatch {
    pub filesystem: Option<usize>,
    pub network: Option<usize>,
    pub tools: Option<usize>,
}

/// Immutable security configuration consumed by the scanner, the
/// permission validator, and the sandbox runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Policy name (preset name, or a caller-chosen identifier)
    pub name: String,
    pub max_permissions: MaxPermissions,
    pub banned_patterns: Vec<BannedPattern>,
    pub secret_patterns: Vec<SecretPattern>,
    pub modules: ModulePolicy,
    /// Actions the policy expects a plugin to request; a missing one is
    /// reported as a validation warning
    pub required_permissions: Vec<String>,
    /// Whether denied-but-trusted-adjacent hosts solicit confirmation
    pub elevated_permission_prompt: bool,
    /// When true, the sandbox pre-flight skips the dynamic-eval pattern
    /// category (the scanner still reports it at install time)
    pub allow_dynamic_execution: bool,
    pub trusted_domains: Vec<String>,
    /// Path prefixes no filesystem permission may fall under
    pub system_path_denylist: Vec<String>,
    /// Retention bound of the validator's audit ring buffer
    pub audit_capacity: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        presets::default_policy()
    }
}

impl SecurityPolicy {
    /// Load a full policy from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, PolicyError> {
        toml::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// Load a full policy from a JSON string
    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// Structural merge: array fields concatenate (base entries first),
    /// scalar fields are overridden when present in the patch, nested
    /// objects merge key-by-key. Deterministic; performs no validation.
    pub fn merge(&self, patch: &PolicyPatch) -> SecurityPolicy {
        let mut merged = self.clone();

        if let Some(name) = &patch.name {
            merged.name = name.clone();
        }
        if let Some(quotas) = &patch.max_permissions {
            if let Some(filesystem) = quotas.filesystem {
                merged.max_permissions.filesystem = filesystem;
            }
            if let Some(network) = quotas.network {
                merged.max_permissions.network = network;
            }
            if let Some(tools) = quotas.tools {
                merged.max_permissions.tools = tools;
            }
        }
        merged
            .banned_patterns
            .extend(patch.banned_patterns.iter().cloned());
        merged
            .secret_patterns
            .extend(patch.secret_patterns.iter().cloned());
        merged.modules.extend(&patch.modules);
        merged
            .required_permissions
            .extend(patch.required_permissions.iter().cloned());
        if let Some(prompt) = patch.elevated_permission_prompt {
            merged.elevated_permission_prompt = prompt;
        }
        if let Some(dynamic) = patch.allow_dynamic_execution {
            merged.allow_dynamic_execution = dynamic;
        }
        merged
            .trusted_domains
            .extend(patch.trusted_domains.iter().cloned());
        merged
            .system_path_denylist
            .extend(patch.system_path_denylist.iter().cloned());
        if let Some(capacity) = patch.audit_capacity {
            merged.audit_capacity = capacity;
        }

        merged
    }
}

/// Partial policy overlay for [`SecurityPolicy::merge`]
///
/// Array fields default to empty (nothing to concatenate); scalar fields
/// default to `None` (keep the base value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyPatch {
    pub name: Option<String>,
    pub max_permissions: Option<MaxPermissionsPatch>,
    pub banned_patterns: Vec<BannedPattern>,
    pub secret_patterns: Vec<SecretPattern>,
    pub modules: ModulePolicy,
    pub required_permissions: Vec<String>,
    pub elevated_permission_prompt: Option<bool>,
    pub allow_dynamic_execution: Option<bool>,
    pub trusted_domains: Vec<String>,
    pub system_path_denylist: Vec<String>,
    pub audit_capacity: Option<usize>,
}

impl PolicyPatch {
    /// Load a patch from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, PolicyError> {
        toml::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// Load a patch from a JSON string
    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{PatternCategory, Severity};
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_overrides_scalars() {
        let base = presets::default_policy();
        let patch = PolicyPatch {
            allow_dynamic_execution: Some(true),
            audit_capacity: Some(50),
            ..PolicyPatch::default()
        };

        let merged = base.merge(&patch);
        assert!(merged.allow_dynamic_execution);
        assert_eq!(merged.audit_capacity, 50);
        // Untouched scalars keep the base value
        assert_eq!(
            merged.elevated_permission_prompt,
            base.elevated_permission_prompt
        );
    }

    #[test]
    fn merge_concatenates_arrays_base_first() {
        let base = presets::default_policy();
        let patch = PolicyPatch {
            trusted_domains: vec!["internal.example.net".to_string()],
            banned_patterns: vec![BannedPattern::new(
                r"\bdebugger\b",
                Severity::Low,
                PatternCategory::Introspection,
                "halts execution in a debugger",
            )],
            ..PolicyPatch::default()
        };

        let merged = base.merge(&patch);
        assert_eq!(
            merged.trusted_domains.len(),
            base.trusted_domains.len() + 1
        );
        assert_eq!(
            merged.trusted_domains.last().map(String::as_str),
            Some("internal.example.net")
        );
        assert_eq!(
            merged.banned_patterns.len(),
            base.banned_patterns.len() + 1
        );
        // Base entries keep their positions
        assert_eq!(merged.banned_patterns[0], base.banned_patterns[0]);
    }

    #[test]
    fn merge_quota_object_key_by_key() {
        let base = presets::default_policy();
        let patch = PolicyPatch {
            max_permissions: Some(MaxPermissionsPatch {
                network: Some(2),
                ..MaxPermissionsPatch::default()
            }),
            ..PolicyPatch::default()
        };

        let merged = base.merge(&patch);
        assert_eq!(merged.max_permissions.network, 2);
        assert_eq!(
            merged.max_permissions.filesystem,
            base.max_permissions.filesystem
        );
        assert_eq!(merged.max_permissions.tools, base.max_permissions.tools);
    }

    #[test]
    fn merge_is_deterministic() {
        let base = presets::strict_policy();
        let patch = PolicyPatch {
            trusted_domains: vec!["api.example.com".to_string()],
            ..PolicyPatch::default()
        };

        assert_eq!(base.merge(&patch), base.merge(&patch));
    }

    #[test]
    fn empty_patch_is_identity() {
        let base = presets::permissive_policy();
        assert_eq!(base.merge(&PolicyPatch::default()), base);
    }

    #[test]
    fn patch_parses_from_toml() {
        let toml = r#"
            allow_dynamic_execution = true
            trusted_domains = ["api.example.com"]

            [max_permissions]
            filesystem = 3
        "#;

        let patch = PolicyPatch::from_toml(toml).unwrap();
        assert_eq!(patch.allow_dynamic_execution, Some(true));
        assert_eq!(patch.trusted_domains, vec!["api.example.com"]);
        assert_eq!(
            patch.max_permissions.unwrap().filesystem,
            Some(3)
        );
    }

    #[test]
    fn policy_parses_from_json() {
        let json = r#"{ "name": "custom", "audit_capacity": 10 }"#;
        let policy = SecurityPolicy::from_json(json).unwrap();

        assert_eq!(policy.name, "custom");
        assert_eq!(policy.audit_capacity, 10);
        // Absent fields fall back to the default preset's values
        assert!(!policy.banned_patterns.is_empty());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SecurityPolicy::from_toml("name = [").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn policy_round_trips_through_json() {
        let policy = presets::development_policy();
        let json = serde_json::to_string(&policy).unwrap();
        let back = SecurityPolicy::from_json(&json).unwrap();
        assert_eq!(policy, back);
    }
}
