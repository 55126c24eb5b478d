//! Pattern vocabulary shared by the scanner, validator, and sandbox
//!
//! Banned-construct patterns, secret-detection patterns, and module
//! allow/deny lists are plain policy data. Compilation to `regex::Regex`
//! happens in the consumers; an entry here is just the pattern source plus
//! the metadata needed to score and report a match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Severity of a static finding or runtime violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed score penalty applied per pattern match of this severity
    pub fn score_penalty(self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 15,
            Severity::Medium => 10,
            Severity::Low => 5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// What kind of dangerous construct a banned pattern detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternCategory {
    /// Evaluation of code supplied as a string
    DynamicEval,
    /// Subprocess spawning or host-process control
    ProcessControl,
    /// Host process / environment introspection
    Introspection,
    /// Module loading by computed name
    ModuleLoad,
    /// Raw DOM sink writes
    DomSink,
    /// Path traversal literals
    PathTraversal,
}

/// A banned code construct: regex source plus reporting metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannedPattern {
    /// Regex source, applied line-by-line by the scanner and at
    /// pre-flight by the sandbox
    pub pattern: String,
    pub severity: Severity,
    pub category: PatternCategory,
    /// Human-readable statement of what the construct does
    pub description: String,
}

impl BannedPattern {
    pub fn new(
        pattern: &str,
        severity: Severity,
        category: PatternCategory,
        description: &str,
    ) -> Self {
        Self {
            pattern: pattern.to_string(),
            severity,
            category,
            description: description.to_string(),
        }
    }
}

/// Classification of a detected credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    ApiKey,
    Password,
    Token,
    PrivateKey,
    Certificate,
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecretKind::ApiKey => "api_key",
            SecretKind::Password => "password",
            SecretKind::Token => "token",
            SecretKind::PrivateKey => "private_key",
            SecretKind::Certificate => "certificate",
        };
        write!(f, "{}", s)
    }
}

/// A secret-detection pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretPattern {
    pub kind: SecretKind,
    pub pattern: String,
    pub description: String,
}

impl SecretPattern {
    pub fn new(kind: SecretKind, pattern: &str, description: &str) -> Self {
        Self {
            kind,
            pattern: pattern.to_string(),
            description: description.to_string(),
        }
    }
}

/// Module allow/deny lists consulted by the scanner's import pass
///
/// Built-in names cover the host platform's bundled modules (with or
/// without the `node:` namespace prefix); third-party names are package
/// identities, i.e. the leading path segment of a specifier (the first two
/// segments for `@scope/pkg`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulePolicy {
    pub builtin_allow: BTreeSet<String>,
    pub builtin_deny: BTreeSet<String>,
    pub third_party_allow: BTreeSet<String>,
    pub third_party_deny: BTreeSet<String>,
}

impl ModulePolicy {
    /// Union-merge another module policy into this one
    pub fn extend(&mut self, other: &ModulePolicy) {
        self.builtin_allow.extend(other.builtin_allow.iter().cloned());
        self.builtin_deny.extend(other.builtin_deny.iter().cloned());
        self.third_party_allow
            .extend(other.third_party_allow.iter().cloned());
        self.third_party_deny
            .extend(other.third_party_deny.iter().cloned());
    }
}

/// Banned-construct patterns shared by every preset
pub fn default_banned_patterns() -> Vec<BannedPattern> {
    vec![
        BannedPattern::new(
            r"\beval\s*\(",
            Severity::Critical,
            PatternCategory::DynamicEval,
            "evaluates code supplied as a string",
        ),
        BannedPattern::new(
            r"new\s+Function\s*\(",
            Severity::Critical,
            PatternCategory::DynamicEval,
            "constructs a function body from a string",
        ),
        BannedPattern::new(
            r#"set(?:Timeout|Interval)\s*\(\s*['"]"#,
            Severity::High,
            PatternCategory::DynamicEval,
            "defers evaluation of a string argument",
        ),
        BannedPattern::new(
            r"\bchild_process\b",
            Severity::Critical,
            PatternCategory::ProcessControl,
            "spawns subprocesses",
        ),
        BannedPattern::new(
            r"\b(?:execSync|spawnSync|execFile|fork)\s*\(",
            Severity::Critical,
            PatternCategory::ProcessControl,
            "spawns subprocesses",
        ),
        BannedPattern::new(
            r"\bprocess\.env\b",
            Severity::Medium,
            PatternCategory::Introspection,
            "reads the host process environment",
        ),
        BannedPattern::new(
            r"\bprocess\.(?:exit|kill|abort)\b",
            Severity::High,
            PatternCategory::ProcessControl,
            "controls the host process",
        ),
        BannedPattern::new(
            r#"require\s*\(\s*[^'")]"#,
            Severity::High,
            PatternCategory::ModuleLoad,
            "loads a module by computed name",
        ),
        BannedPattern::new(
            r"\bimport\s*\(",
            Severity::Medium,
            PatternCategory::ModuleLoad,
            "loads a module at runtime",
        ),
        BannedPattern::new(
            r"\.innerHTML\s*=",
            Severity::High,
            PatternCategory::DomSink,
            "writes raw markup into the document",
        ),
        BannedPattern::new(
            r"document\.write\s*\(",
            Severity::High,
            PatternCategory::DomSink,
            "writes raw markup into the document",
        ),
        BannedPattern::new(
            r"\.\./",
            Severity::Medium,
            PatternCategory::PathTraversal,
            "escapes the plugin directory",
        ),
    ]
}

/// Additional patterns enforced only by the strict preset
pub fn strict_banned_patterns() -> Vec<BannedPattern> {
    vec![
        BannedPattern::new(
            r"\bglobalThis\b",
            Severity::Medium,
            PatternCategory::Introspection,
            "reaches the global object",
        ),
        BannedPattern::new(
            r"\bReflect\s*\.",
            Severity::Medium,
            PatternCategory::Introspection,
            "reflects on host objects",
        ),
        BannedPattern::new(
            r"new\s+Proxy\s*\(",
            Severity::Medium,
            PatternCategory::Introspection,
            "intercepts host object access",
        ),
    ]
}

/// Secret-detection patterns shared by every preset
pub fn default_secret_patterns() -> Vec<SecretPattern> {
    vec![
        SecretPattern::new(
            SecretKind::ApiKey,
            r#"(?i)api[_-]?key['"]?\s*[:=]\s*['"][A-Za-z0-9_\-]{16,}['"]"#,
            "api key assignment",
        ),
        SecretPattern::new(
            SecretKind::Password,
            r#"(?i)password['"]?\s*[:=]\s*['"][^'"]{6,}['"]"#,
            "password assignment",
        ),
        SecretPattern::new(
            SecretKind::Token,
            r#"(?i)(?:auth[_-]?|bearer[_-]?|access[_-]?|refresh[_-]?)?token['"]?\s*[:=]\s*['"][A-Za-z0-9_\-.]{16,}['"]"#,
            "token assignment",
        ),
        SecretPattern::new(
            SecretKind::PrivateKey,
            r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
            "private key material",
        ),
        SecretPattern::new(
            SecretKind::Certificate,
            r"-----BEGIN CERTIFICATE-----",
            "certificate material",
        ),
    ]
}

/// Module allow/deny lists shared by every preset
pub fn default_module_policy() -> ModulePolicy {
    let set = |names: &[&str]| -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    };
    ModulePolicy {
        builtin_allow: set(&[
            "assert",
            "buffer",
            "crypto",
            "events",
            "path",
            "querystring",
            "stream",
            "string_decoder",
            "url",
            "util",
            "zlib",
        ]),
        builtin_deny: set(&[
            "child_process",
            "cluster",
            "dgram",
            "dns",
            "fs",
            "http",
            "https",
            "net",
            "os",
            "perf_hooks",
            "process",
            "repl",
            "tls",
            "v8",
            "vm",
            "worker_threads",
        ]),
        third_party_allow: set(&["dayjs", "lodash", "rxjs", "semver", "uuid", "zod"]),
        third_party_deny: set(&[
            "cross-spawn",
            "execa",
            "fs-extra",
            "node-pty",
            "shelljs",
        ]),
    }
}

/// System path prefixes no filesystem permission may fall under
pub fn default_system_paths() -> Vec<String> {
    [
        "/etc",
        "/sys",
        "/proc",
        "/dev",
        "/boot",
        "/root",
        "/var/run",
        "C:\\Windows",
        "C:\\Program Files",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_penalties() {
        assert_eq!(Severity::Critical.score_penalty(), 25);
        assert_eq!(Severity::High.score_penalty(), 15);
        assert_eq!(Severity::Medium.score_penalty(), 10);
        assert_eq!(Severity::Low.score_penalty(), 5);
    }

    #[test]
    fn default_module_policy_is_disjoint() {
        let modules = default_module_policy();
        assert!(modules.builtin_allow.is_disjoint(&modules.builtin_deny));
        assert!(modules
            .third_party_allow
            .is_disjoint(&modules.third_party_deny));
    }

    #[test]
    fn module_policy_extend_unions() {
        let mut base = default_module_policy();
        let mut extra = ModulePolicy::default();
        extra.builtin_deny.insert("inspector".to_string());

        base.extend(&extra);
        assert!(base.builtin_deny.contains("inspector"));
        assert!(base.builtin_deny.contains("fs"));
    }

    #[test]
    fn secret_kind_display() {
        assert_eq!(SecretKind::ApiKey.to_string(), "api_key");
        assert_eq!(SecretKind::PrivateKey.to_string(), "private_key");
    }
}
