//! End-to-end install-time-scan / runtime-enforce pipeline tests

mod common;

use common::{runtime_with, FetchEvaluator, ResilientFetchEvaluator};
use palisade_runtime::audit::AuditFilter;
use palisade_runtime::manifest::PluginManifest;
use palisade_runtime::permissions::{AccessLevel, FileSystemPermission, PermissionSet};
use palisade_runtime::sandbox::{ResourceLimitOverrides, ViolationKind};
use palisade_runtime::scanner::Scanner;
use palisade_runtime::validator::PermissionValidator;
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn scan_detects_credentials_in_plugin_source() {
    let scanner = Scanner::with_policy_name("default");
    let source = concat!(
        "import { format } from 'util';\n",
        "const apiKey = \"sk_live_abcdefghijklmnop\";\n",
        "export function report(data) { return format('%j', data); }\n",
    );

    let result = scanner.scan_code(source);
    assert!(result.secrets.len() >= 1);
    assert!(!result.passed);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.contains("credentials")));
}

#[test]
fn oversized_permission_request_fails_validation_with_quota_error() {
    let validator = PermissionValidator::with_policy_name("default");
    let requested = PermissionSet {
        filesystem: (0..20)
            .map(|i| FileSystemPermission::new(&format!("/workspace/dir-{}/**", i), AccessLevel::Read))
            .collect(),
        ..PermissionSet::new()
    };

    let report = validator.validate(&requested);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("quota")));
}

#[tokio::test]
async fn network_budget_allows_one_fetch_then_violates() {
    let (runtime, _validator) = runtime_with(
        "default",
        Arc::new(FetchEvaluator {
            urls: vec![
                "https://api.example.com/first".to_string(),
                "https://api.example.com/second".to_string(),
            ],
        }),
    );

    let permissions = PermissionSet {
        network: vec![palisade_runtime::permissions::NetworkPermission::new(
            "*.example.com",
        )],
        ..PermissionSet::new()
    };
    let ctx = runtime.create_context(
        "weather-widget",
        permissions,
        Some(ResourceLimitOverrides {
            network_calls: Some(1),
            ..ResourceLimitOverrides::default()
        }),
    );

    let result = runtime.execute("sync()", &ctx.id).await;
    assert!(!result.success);
    assert_eq!(result.usage.network_calls, 1);

    let violations = result.violations.unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Resource);
}

#[tokio::test]
async fn full_pipeline_from_manifest_to_execution() {
    // Install time: scan, then validate the declared permission request
    let manifest = PluginManifest::from_json(
        r#"{
            "name": "release-notes",
            "version": "1.2.0",
            "permissions": {
                "network": [{ "host": "api.github.com" }],
                "tools": ["http_request"]
            }
        }"#,
    )
    .unwrap();

    let scanner = Scanner::with_policy_name("default");
    let source = "import { inspect } from 'util';\nexport async function run(host) {\n  const response = await host.fetch('https://api.github.com/releases');\n  return inspect(response);\n}\n";
    assert!(scanner.scan_code(source).passed);

    let validator = PermissionValidator::with_policy_name("default");
    let requested = PermissionValidator::parse_permissions(&manifest);
    let report = validator.validate(&requested);
    assert!(report.valid, "errors: {:?}", report.errors);

    // Run time: bind a context to the approved set and execute
    let (runtime, validator) = runtime_with(
        "default",
        Arc::new(FetchEvaluator {
            urls: vec!["https://api.github.com/releases".to_string()],
        }),
    );
    let ctx = runtime.create_context(&manifest.name, report.approved, None);

    let result = runtime.execute(source, &ctx.id).await;
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.usage.network_calls, 1);

    // Every capability check left an audit entry
    let audited = validator.audit_log(&AuditFilter {
        plugin: Some("release-notes".to_string()),
        ..AuditFilter::default()
    });
    assert_eq!(audited.len(), 1);
    assert!(audited[0].allowed);

    assert!(runtime.destroy_context(&ctx.id));
}

#[tokio::test]
async fn successful_run_can_still_accumulate_violations() {
    let (runtime, validator) = runtime_with(
        "default",
        Arc::new(ResilientFetchEvaluator {
            urls: vec![
                "https://api.example.com/ok".to_string(),
                "https://blocked.example.org/no".to_string(),
            ],
        }),
    );
    let permissions = PermissionSet {
        network: vec![palisade_runtime::permissions::NetworkPermission::new(
            "*.example.com",
        )],
        ..PermissionSet::new()
    };
    let ctx = runtime.create_context("collector", permissions, None);

    let result = runtime.execute("collect()", &ctx.id).await;
    assert!(result.success);
    assert_eq!(result.value, Some(serde_json::json!(1)));

    let violations = result.violations.unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Permission);

    // One audit entry per check, allowed and denied alike
    let denied = validator.audit_log(&AuditFilter {
        allowed: Some(false),
        ..AuditFilter::default()
    });
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].resource, "blocked.example.org");
}

#[test]
fn install_time_policy_may_differ_from_runtime_policy() {
    // A plugin scanned under the permissive preset still hits the strict
    // preset's pre-flight at execution time
    let scanner = Scanner::with_policy_name("permissive");
    let source = "const g = globalThis;\n";
    assert!(scanner.scan_code(source).passed);

    let strict_scanner = Scanner::with_policy_name("strict");
    assert!(!strict_scanner.scan_code(source).passed);
}
