//! Static code scanner
//!
//! Side-effect-free analysis of a code unit: a banned-pattern pass, a
//! secret-detection pass, and an import-classification pass over the same
//! input, combined into a scored [`SecurityScanResult`]. The scanner never
//! executes anything and never errors on malformed input — it only
//! reports empty result sets.

pub mod imports;
pub mod secrets;

pub use imports::ImportReport;
pub use secrets::SecretMatch;

use palisade_policy::{BannedPattern, PatternCategory, SecurityPolicy, Severity};
use regex::Regex;
use serde::Serialize;

/// One banned-construct hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    /// What the matched construct does
    pub description: String,
    pub severity: Severity,
    pub category: PatternCategory,
    /// 1-based line number
    pub line: usize,
    /// 1-based character column
    pub column: usize,
    pub matched: String,
}

/// Report produced by one `scan_code` call; no lifecycle beyond it
#[derive(Debug, Clone, Serialize)]
pub struct SecurityScanResult {
    pub passed: bool,
    pub dangerous_patterns: Vec<PatternMatch>,
    pub secrets: Vec<SecretMatch>,
    pub imports: ImportReport,
    /// 0..=100 heuristic; not a correctness proof
    pub security_score: u8,
    pub recommendations: Vec<String>,
}

impl SecurityScanResult {
    /// Blocked module specifiers, the import pass's violation list
    pub fn import_violations(&self) -> &[String] {
        &self.imports.blocked
    }
}

/// Compiled banned-pattern set, shared with the sandbox pre-flight check
pub struct PatternSet {
    compiled: Vec<(Regex, BannedPattern)>,
}

impl PatternSet {
    /// Compile a policy's banned patterns, skipping unparseable ones
    pub fn compile(policy: &SecurityPolicy) -> Self {
        let compiled = policy
            .banned_patterns
            .iter()
            .filter_map(|p| Regex::new(&p.pattern).ok().map(|re| (re, p.clone())))
            .collect();
        Self { compiled }
    }

    /// All matches, line-by-line; a single line may hit several patterns
    pub fn scan(&self, code: &str) -> Vec<PatternMatch> {
        self.scan_filtered(code, false)
    }

    /// First match, honoring the dynamic-eval exemption used at pre-flight
    pub fn first_match(&self, code: &str, skip_dynamic_eval: bool) -> Option<PatternMatch> {
        self.scan_filtered(code, skip_dynamic_eval).into_iter().next()
    }

    fn scan_filtered(&self, code: &str, skip_dynamic_eval: bool) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        for (index, line) in code.lines().enumerate() {
            for (regex, pattern) in &self.compiled {
                if skip_dynamic_eval && pattern.category == PatternCategory::DynamicEval {
                    continue;
                }
                for hit in regex.find_iter(line) {
                    matches.push(PatternMatch {
                        description: pattern.description.clone(),
                        severity: pattern.severity,
                        category: pattern.category,
                        line: index + 1,
                        column: line[..hit.start()].chars().count() + 1,
                        matched: hit.as_str().to_string(),
                    });
                }
            }
        }
        matches
    }
}

/// Static scanner parameterized by a security policy
pub struct Scanner {
    patterns: PatternSet,
    secrets: secrets::SecretScanner,
    imports: imports::ImportClassifier,
}

impl Scanner {
    pub fn new(policy: &SecurityPolicy) -> Self {
        Self {
            patterns: PatternSet::compile(policy),
            secrets: secrets::SecretScanner::compile(policy),
            imports: imports::ImportClassifier::compile(policy),
        }
    }

    /// Construct with a named policy preset
    pub fn with_policy_name(name: &str) -> Self {
        Self::new(&palisade_policy::policy(name))
    }

    /// Run all three passes over `code` and combine the results
    pub fn scan_code(&self, code: &str) -> SecurityScanResult {
        let dangerous_patterns = self.patterns.scan(code);
        let secrets = self.secrets.scan(code);
        let imports = self.imports.classify(code);

        let security_score = score(&dangerous_patterns, &secrets, &imports);
        // A single pattern or secret finding always fails, whatever the score
        let passed = dangerous_patterns.is_empty() && secrets.is_empty();
        let recommendations = recommendations(&dangerous_patterns, &secrets, &imports);

        SecurityScanResult {
            passed,
            dangerous_patterns,
            secrets,
            imports,
            security_score,
            recommendations,
        }
    }
}

fn score(patterns: &[PatternMatch], secrets: &[SecretMatch], imports: &ImportReport) -> u8 {
    let mut score = 100.0_f64;
    for hit in patterns {
        score -= f64::from(hit.severity.score_penalty());
    }
    for secret in secrets {
        score -= secret.confidence * 20.0;
    }
    score -= imports.blocked.len() as f64 * 10.0;
    score.round().clamp(0.0, 100.0) as u8
}

fn recommendations(
    patterns: &[PatternMatch],
    secrets: &[SecretMatch],
    imports: &ImportReport,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if !patterns.is_empty() {
        let critical = patterns
            .iter()
            .filter(|m| m.severity == Severity::Critical)
            .count();
        if critical > 0 {
            recommendations.push(format!(
                "Resolve {} dangerous pattern finding(s), including {} critical; \
                 critical constructs block installation",
                patterns.len(),
                critical
            ));
        } else {
            recommendations.push(format!(
                "Resolve {} dangerous pattern finding(s)",
                patterns.len()
            ));
        }
    }
    if !secrets.is_empty() {
        recommendations.push(
            "Remove hardcoded credentials and load them from host-provided \
             configuration at runtime"
                .to_string(),
        );
    }
    if !imports.blocked.is_empty() {
        recommendations.push(format!(
            "Remove blocked module imports: {}",
            imports.blocked.join(", ")
        ));
    }
    if !imports.unknown.is_empty() {
        recommendations.push(format!(
            "Audit unrecognized module imports: {}",
            imports.unknown.join(", ")
        ));
    }
    if recommendations.is_empty() {
        recommendations.push("No issues found".to_string());
    }

    recommendations
}
