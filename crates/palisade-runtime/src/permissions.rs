//! Typed capability model
//!
//! A plugin's grant is a [`PermissionSet`]: filesystem path patterns with
//! an access level, network host patterns, named host tools, and MCP
//! server names. Matching is "any entry grants"; entry order carries no
//! meaning. Sets are serializable because the installer persists the
//! approved grant between install time and run time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Direction of filesystem access a permission entry grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Readwrite,
}

impl AccessLevel {
    pub fn allows_read(self) -> bool {
        matches!(self, AccessLevel::Read | AccessLevel::Readwrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, AccessLevel::Write | AccessLevel::Readwrite)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Readwrite => "readwrite",
        };
        write!(f, "{}", s)
    }
}

/// Filesystem capability: glob-style path pattern plus access level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemPermission {
    pub path: String,
    pub access: AccessLevel,
}

impl FileSystemPermission {
    pub fn new(path: &str, access: AccessLevel) -> Self {
        Self {
            path: path.to_string(),
            access,
        }
    }

    /// Whether this entry grants the requested direction on `path`
    pub fn allows(&self, path: &str, write: bool) -> bool {
        let direction_ok = if write {
            self.access.allows_write()
        } else {
            self.access.allows_read()
        };
        direction_ok && glob_match(&self.path, path)
    }
}

/// Network protocols a permission entry may restrict itself to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ws,
    Wss,
}

/// Network capability: exact or `*.`-wildcard host, optional port and
/// protocol restrictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPermission {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<Protocol>>,
}

impl NetworkPermission {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ports: None,
            protocols: None,
        }
    }

    pub fn allows(&self, host: &str) -> bool {
        host_matches(&self.host, host)
    }
}

/// The capability grant for one plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PermissionSet {
    pub filesystem: Vec<FileSystemPermission>,
    pub network: Vec<NetworkPermission>,
    pub tools: Vec<String>,
    pub mcp_servers: Vec<String>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filesystem.is_empty()
            && self.network.is_empty()
            && self.tools.is_empty()
            && self.mcp_servers.is_empty()
    }

    /// First filesystem entry granting the requested direction on `path`
    pub fn granting_fs(&self, path: &str, write: bool) -> Option<&FileSystemPermission> {
        self.filesystem.iter().find(|p| p.allows(path, write))
    }

    /// First network entry whose host pattern matches `host`
    pub fn granting_network(&self, host: &str) -> Option<&NetworkPermission> {
        self.network.iter().find(|p| p.allows(host))
    }

    pub fn grants_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

/// Glob-style path matching: `*` within one segment, `**` across
/// segments, `?` a single non-separator character
pub fn glob_match(pattern: &str, path: &str) -> bool {
    match_bytes(pattern.as_bytes(), path.as_bytes())
}

fn match_bytes(pattern: &[u8], path: &[u8]) -> bool {
    if pattern.is_empty() {
        return path.is_empty();
    }
    match pattern[0] {
        b'*' => {
            if pattern.len() >= 2 && pattern[1] == b'*' {
                // "**" also swallows a following separator so "a/**/b"
                // matches "a/b"
                let rest = &pattern[2..];
                let past_sep = if rest.first() == Some(&b'/') {
                    Some(&rest[1..])
                } else {
                    None
                };
                (0..=path.len()).any(|i| {
                    match_bytes(rest, &path[i..])
                        || past_sep.is_some_and(|r| match_bytes(r, &path[i..]))
                })
            } else {
                let rest = &pattern[1..];
                (0..=path.len())
                    .take_while(|&i| i == 0 || path[i - 1] != b'/')
                    .any(|i| match_bytes(rest, &path[i..]))
            }
        }
        b'?' => !path.is_empty() && path[0] != b'/' && match_bytes(&pattern[1..], &path[1..]),
        c => !path.is_empty() && path[0] == c && match_bytes(&pattern[1..], &path[1..]),
    }
}

/// Host pattern matching: exact, universal `*`, or `*.domain` (which also
/// matches the apex domain itself)
pub fn host_matches(pattern: &str, host: &str) -> bool {
    if pattern == host || pattern == "*" {
        return true;
    }
    if let Some(domain) = pattern.strip_prefix("*.") {
        if host == domain {
            return true;
        }
        if let Some(prefix) = host.strip_suffix(domain) {
            return prefix.ends_with('.');
        }
    }
    false
}

/// Whether `host` names a loopback, private-range, or link-local target
pub fn is_loopback_or_private(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => {
                v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => {
                // fc00::/7 unique-local
                v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00
            }
        };
    }
    let lower = bare.to_ascii_lowercase();
    lower == "localhost"
        || lower.ends_with(".localhost")
        || lower.ends_with(".local")
        || lower.ends_with(".internal")
}

/// Whether any `/`- or `\`-separated segment of `path` is `..`
pub fn has_traversal(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

/// The denylist prefix `path` falls under, if any
pub fn system_path_hit<'a>(path: &str, denylist: &'a [String]) -> Option<&'a str> {
    denylist
        .iter()
        .map(String::as_str)
        .find(|prefix| {
            path == *prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('\\'))
        })
}
