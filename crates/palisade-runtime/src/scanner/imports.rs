//! Import extraction and classification pass
//!
//! Extracts every module reference (static imports, dynamic imports, and
//! string-literal `require` calls) and classifies each specifier exactly
//! once: relative specifiers belong to the plugin, built-in names consult
//! the policy's built-in allow/deny sets, and anything else is classified
//! as a third-party package by its leading path segment (`@scope/pkg`
//! keeps its first two segments).

use palisade_policy::{ModulePolicy, SecurityPolicy};
use regex::Regex;
use serde::Serialize;

/// Prefix of namespaced built-in module specifiers
const BUILTIN_NAMESPACE: &str = "node:";

/// Total classification of all extracted imports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
    pub unknown: Vec<String>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.allowed.len() + self.blocked.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

pub(crate) struct ImportClassifier {
    modules: ModulePolicy,
    static_import: Regex,
    export_from: Regex,
    dynamic_import: Regex,
    require_call: Regex,
}

impl ImportClassifier {
    pub fn compile(policy: &SecurityPolicy) -> Self {
        Self {
            modules: policy.modules.clone(),
            static_import: Regex::new(
                r#"(?m)^\s*import\s+(?:[\w$*{}\s,]+\s+from\s+)?['"]([^'"]+)['"]"#,
            )
            .expect("static import pattern"),
            export_from: Regex::new(r#"(?m)^\s*export\s+[\w$*{}\s,]+\s+from\s+['"]([^'"]+)['"]"#)
                .expect("export-from pattern"),
            dynamic_import: Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
                .expect("dynamic import pattern"),
            require_call: Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
                .expect("require pattern"),
        }
    }

    /// Classify every extracted specifier into exactly one bucket
    pub fn classify(&self, code: &str) -> ImportReport {
        let mut report = ImportReport::default();
        let mut seen = std::collections::HashSet::new();

        for specifier in self.extract(code) {
            if !seen.insert(specifier.clone()) {
                continue;
            }
            match self.classify_one(&specifier) {
                Bucket::Allowed => report.allowed.push(specifier),
                Bucket::Blocked => report.blocked.push(specifier),
                Bucket::Unknown => report.unknown.push(specifier),
            }
        }

        report
    }

    fn extract(&self, code: &str) -> Vec<String> {
        let mut specifiers = Vec::new();
        for regex in [
            &self.static_import,
            &self.export_from,
            &self.dynamic_import,
            &self.require_call,
        ] {
            for captures in regex.captures_iter(code) {
                specifiers.push(captures[1].to_string());
            }
        }
        specifiers
    }

    fn classify_one(&self, specifier: &str) -> Bucket {
        // Relative specifiers are plugin-internal, never third-party
        if specifier == "." || specifier == ".." || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            return Bucket::Allowed;
        }

        let namespaced = specifier.starts_with(BUILTIN_NAMESPACE);
        let bare = specifier.strip_prefix(BUILTIN_NAMESPACE).unwrap_or(specifier);
        let builtin_key = bare.split('/').next().unwrap_or(bare);
        if self.modules.builtin_deny.contains(builtin_key) {
            return Bucket::Blocked;
        }
        if self.modules.builtin_allow.contains(builtin_key) {
            return Bucket::Allowed;
        }
        if namespaced {
            // A namespaced built-in outside both lists
            return Bucket::Unknown;
        }

        let package = package_identity(specifier);
        if self.modules.third_party_deny.contains(&package) {
            return Bucket::Blocked;
        }
        if self.modules.third_party_allow.contains(&package) {
            return Bucket::Allowed;
        }
        Bucket::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Allowed,
    Blocked,
    Unknown,
}

/// Leading path segment of a specifier; scoped packages keep two segments
fn package_identity(specifier: &str) -> String {
    let mut segments = specifier.split('/');
    match segments.next() {
        Some(scope) if scope.starts_with('@') => match segments.next() {
            Some(name) => format!("{}/{}", scope, name),
            None => scope.to_string(),
        },
        Some(first) => first.to_string(),
        None => specifier.to_string(),
    }
}
