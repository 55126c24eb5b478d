//! Permission validation and live capability checks
//!
//! Install time: a declared permission request is checked against the
//! active policy and split into approved and denied entries with
//! human-readable errors and warnings. Run time: `check_permission`
//! answers "may this action proceed" against an approved set, appending
//! exactly one audit entry per call.

use crate::audit::{AuditFilter, AuditLog, AuditLogEntry};
use crate::manifest::PluginManifest;
use crate::permissions::{
    has_traversal, host_matches, is_loopback_or_private, system_path_hit, PermissionSet,
};
use chrono::Utc;
use palisade_policy::SecurityPolicy;

/// Host capabilities a plugin may request by name, independent of policy
pub const RECOGNIZED_TOOLS: &[&str] = &[
    "clipboard_read",
    "clipboard_write",
    "http_request",
    "notifications",
    "render_panel",
    "shell_exec",
    "storage_read",
    "storage_write",
];

/// Outcome of validating a permission request against a policy
///
/// Business-rule failures are data, not errors: `valid` is false iff
/// `errors` is non-empty, and warnings never affect it.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub approved: PermissionSet,
    pub denied: PermissionSet,
}

/// Namespaced capability action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action<'a> {
    FsRead,
    FsWrite,
    Network,
    Tool(&'a str),
}

impl<'a> Action<'a> {
    fn parse(action: &'a str) -> Option<Self> {
        match action.split_once(':')? {
            ("fs", "read") => Some(Action::FsRead),
            ("fs", "write") => Some(Action::FsWrite),
            ("network", _) => Some(Action::Network),
            ("tool", name) if !name.is_empty() => Some(Action::Tool(name)),
            _ => None,
        }
    }
}

/// Validates permission requests and answers live capability queries
pub struct PermissionValidator {
    policy: SecurityPolicy,
    audit: AuditLog,
}

impl PermissionValidator {
    pub fn new(policy: SecurityPolicy) -> Self {
        let audit = AuditLog::new(policy.audit_capacity);
        Self { policy, audit }
    }

    /// Construct with a named policy preset
    pub fn with_policy_name(name: &str) -> Self {
        Self::new(palisade_policy::policy(name))
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Lossless mapping from a manifest's declared permissions into the
    /// typed model; absent fields yield empty lists
    pub fn parse_permissions(manifest: &PluginManifest) -> PermissionSet {
        manifest.requested_permissions()
    }

    /// Validate a requested permission set against the active policy
    pub fn validate(&self, requested: &PermissionSet) -> ValidationReport {
        let mut report = ValidationReport::default();
        let quotas = &self.policy.max_permissions;

        if requested.filesystem.len() > quotas.filesystem {
            report.errors.push(format!(
                "filesystem permissions exceed quota: requested {}, quota {}",
                requested.filesystem.len(),
                quotas.filesystem
            ));
        }
        if requested.network.len() > quotas.network {
            report.errors.push(format!(
                "network permissions exceed quota: requested {}, quota {}",
                requested.network.len(),
                quotas.network
            ));
        }
        if requested.tools.len() > quotas.tools {
            report.errors.push(format!(
                "tool permissions exceed quota: requested {}, quota {}",
                requested.tools.len(),
                quotas.tools
            ));
        }

        for fs in &requested.filesystem {
            if has_traversal(&fs.path) {
                report.errors.push(format!(
                    "filesystem path '{}' contains a traversal segment",
                    fs.path
                ));
                report.denied.filesystem.push(fs.clone());
            } else if let Some(prefix) =
                system_path_hit(&fs.path, &self.policy.system_path_denylist)
            {
                report.errors.push(format!(
                    "filesystem path '{}' falls under protected system path '{}'",
                    fs.path, prefix
                ));
                report.denied.filesystem.push(fs.clone());
            } else {
                report.approved.filesystem.push(fs.clone());
            }
        }

        for net in &requested.network {
            let host = net.host.as_str();
            let explicitly_trusted = self.policy.trusted_domains.iter().any(|t| t == host);
            if is_loopback_or_private(host) && !explicitly_trusted {
                report.errors.push(format!(
                    "network host '{}' is loopback or private-range",
                    host
                ));
                report.denied.network.push(net.clone());
            } else if self.host_is_trusted(host) {
                report.approved.network.push(net.clone());
            } else if self.policy.elevated_permission_prompt && self.host_is_trusted_adjacent(host)
            {
                report.warnings.push(format!(
                    "network host '{}' is adjacent to a trusted domain but not approved; \
                     elevated permission confirmation required",
                    host
                ));
                report.denied.network.push(net.clone());
            } else {
                report.errors.push(format!(
                    "network host '{}' is not on the trusted domain list",
                    host
                ));
                report.denied.network.push(net.clone());
            }
        }

        for tool in &requested.tools {
            if RECOGNIZED_TOOLS.contains(&tool.as_str()) {
                report.approved.tools.push(tool.clone());
            } else {
                report
                    .errors
                    .push(format!("unknown tool capability '{}'", tool));
                report.denied.tools.push(tool.clone());
            }
        }

        // No policy axis restricts MCP server names
        report.approved.mcp_servers = requested.mcp_servers.clone();

        for required in &self.policy.required_permissions {
            if !request_covers(requested, required) {
                report.warnings.push(format!(
                    "policy expects permission '{}' to be requested",
                    required
                ));
            }
        }

        report.valid = report.errors.is_empty();
        report
    }

    fn host_is_trusted(&self, host: &str) -> bool {
        self.policy
            .trusted_domains
            .iter()
            .any(|t| host_matches(t, host))
    }

    /// A host whose parent domain appears in the trusted set without a
    /// wildcard covering this subdomain
    fn host_is_trusted_adjacent(&self, host: &str) -> bool {
        self.policy.trusted_domains.iter().any(|t| {
            let domain = t.strip_prefix("*.").unwrap_or(t);
            domain != "*"
                && (host == domain || host.ends_with(&format!(".{}", domain)))
        })
    }

    /// Live capability check; appends exactly one audit entry per call
    pub fn check_permission(
        &self,
        plugin: &str,
        action: &str,
        resource: &str,
        granted: &PermissionSet,
    ) -> bool {
        let (allowed, permission) = match Action::parse(action) {
            Some(Action::FsRead) => match granted.granting_fs(resource, false) {
                Some(p) => (true, Some(format!("fs:{}:{}", p.path, p.access))),
                None => (false, None),
            },
            Some(Action::FsWrite) => match granted.granting_fs(resource, true) {
                Some(p) => (true, Some(format!("fs:{}:{}", p.path, p.access))),
                None => (false, None),
            },
            Some(Action::Network) => match granted.granting_network(resource) {
                Some(p) => (true, Some(format!("network:{}", p.host))),
                None => (false, None),
            },
            Some(Action::Tool(name)) => {
                if granted.grants_tool(name) {
                    (true, Some(format!("tool:{}", name)))
                } else {
                    (false, None)
                }
            }
            None => (false, None),
        };

        self.audit.append(AuditLogEntry {
            timestamp: Utc::now(),
            plugin: plugin.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            allowed,
            permission,
            user: None,
            context: None,
        });

        allowed
    }

    /// In-memory audit snapshot; durable export is a collaborator concern
    pub fn audit_log(&self, filter: &AuditFilter) -> Vec<AuditLogEntry> {
        self.audit.snapshot(filter)
    }

    pub fn audit_len(&self) -> usize {
        self.audit.len()
    }
}

/// Whether a requested set covers a policy-required action string
fn request_covers(requested: &PermissionSet, required: &str) -> bool {
    match Action::parse(required) {
        Some(Action::FsRead) => requested
            .filesystem
            .iter()
            .any(|p| p.access.allows_read()),
        Some(Action::FsWrite) => requested
            .filesystem
            .iter()
            .any(|p| p.access.allows_write()),
        Some(Action::Network) => !requested.network.is_empty(),
        Some(Action::Tool(name)) => requested.grants_tool(name),
        None => false,
    }
}
