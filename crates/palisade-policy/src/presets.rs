//! Named policy presets
//!
//! Four value instances of [`SecurityPolicy`], not subtypes. Lookup by
//! name falls back to the default preset and never errors.
//!
//! No preset lists a loopback or private-range host among its trusted
//! domains: `localhost` stays rejected under every built-in policy.

use crate::patterns::{
    default_banned_patterns, default_module_policy, default_secret_patterns,
    default_system_paths, strict_banned_patterns,
};
use crate::policy::{MaxPermissions, SecurityPolicy};

/// Resolve a preset by name; unknown names fall back to the default preset
pub fn policy(name: &str) -> SecurityPolicy {
    match name {
        "strict" => strict_policy(),
        "permissive" => permissive_policy(),
        "development" => development_policy(),
        _ => default_policy(),
    }
}

/// Balanced preset used when nothing else is selected
pub fn default_policy() -> SecurityPolicy {
    SecurityPolicy {
        name: "default".to_string(),
        max_permissions: MaxPermissions {
            filesystem: 10,
            network: 5,
            tools: 10,
        },
        banned_patterns: default_banned_patterns(),
        secret_patterns: default_secret_patterns(),
        modules: default_module_policy(),
        required_permissions: Vec::new(),
        elevated_permission_prompt: true,
        allow_dynamic_execution: false,
        trusted_domains: vec![
            "api.github.com".to_string(),
            "*.githubusercontent.com".to_string(),
            "registry.npmjs.org".to_string(),
        ],
        system_path_denylist: default_system_paths(),
        audit_capacity: 1000,
    }
}

/// Minimal quotas, extra banned patterns, empty trust anchors
pub fn strict_policy() -> SecurityPolicy {
    let mut banned = default_banned_patterns();
    banned.extend(strict_banned_patterns());
    SecurityPolicy {
        name: "strict".to_string(),
        max_permissions: MaxPermissions {
            filesystem: 3,
            network: 1,
            tools: 3,
        },
        banned_patterns: banned,
        trusted_domains: Vec::new(),
        audit_capacity: 500,
        ..default_policy()
    }
}

/// Wide quotas and a universal trust anchor; patterns stay enforced
pub fn permissive_policy() -> SecurityPolicy {
    SecurityPolicy {
        name: "permissive".to_string(),
        max_permissions: MaxPermissions {
            filesystem: 50,
            network: 20,
            tools: 50,
        },
        elevated_permission_prompt: false,
        trusted_domains: vec!["*".to_string()],
        audit_capacity: 5000,
        ..default_policy()
    }
}

/// Development preset: everything permissive plus dynamic evaluation
pub fn development_policy() -> SecurityPolicy {
    SecurityPolicy {
        name: "development".to_string(),
        max_permissions: MaxPermissions {
            filesystem: 100,
            network: 100,
            tools: 100,
        },
        elevated_permission_prompt: false,
        allow_dynamic_execution: true,
        trusted_domains: vec!["*".to_string()],
        audit_capacity: 10000,
        ..default_policy()
    }
}
