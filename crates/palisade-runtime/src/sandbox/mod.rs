//! Sandboxed execution runtime
//!
//! Owns the table of live execution contexts and runs code units under
//! enforced restrictions: a pre-flight banned-pattern check against the
//! current policy, a restricted namespace, a timed-execution race, and
//! capability-gated primitives that record violations as they fire.
//!
//! The context table and every counter are instance state — independent
//! runtimes coexist, and nothing here is a process-wide singleton.

pub mod context;
pub mod evaluator;
pub mod namespace;

pub use context::{
    ResourceLimitOverrides, ResourceLimits, ResourceUsage, SandboxContext,
};
pub use evaluator::{EvalError, Evaluator, NullEvaluator};
pub use namespace::{
    ConsoleProxy, FetchResponse, HttpBackend, NetworkBackend, SandboxHost, SAFE_GLOBALS,
};

use crate::scanner::PatternSet;
use crate::validator::PermissionValidator;
use chrono::{DateTime, Utc};
use context::generate_context_id;
use namespace::TimerRegistry;
use palisade_policy::{SecurityPolicy, Severity};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Runtime failure taxonomy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SandboxError {
    #[error("capability denied: {action} on '{resource}'")]
    CapabilityDenied { action: String, resource: String },

    #[error("resource budget exhausted: {resource} (limit {limit})")]
    ResourceExhausted { resource: String, limit: u64 },

    #[error("execution timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("banned construct: {description}")]
    BannedPattern { description: String },

    #[error("unknown context id '{id}'")]
    UnknownContext { id: String },

    #[error("network error: {0}")]
    Network(String),
}

/// What a violation detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Permission,
    Resource,
    Pattern,
    Timeout,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::Permission => "permission",
            ViolationKind::Resource => "resource",
            ViolationKind::Pattern => "pattern",
            ViolationKind::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// One pre-flight or runtime detection that an operation exceeded policy
/// or capability bounds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Hook invoked once per violation at the moment it is recorded
pub type ViolationHook = Arc<dyn Fn(&SecurityViolation) + Send + Sync>;

/// Collects violations for one `execute` call and fans them out to the
/// optional hook
#[derive(Clone, Default)]
pub(crate) struct ViolationSink {
    recorded: Arc<Mutex<Vec<SecurityViolation>>>,
    hook: Option<ViolationHook>,
}

impl ViolationSink {
    fn new(hook: Option<ViolationHook>) -> Self {
        Self {
            recorded: Arc::new(Mutex::new(Vec::new())),
            hook,
        }
    }

    pub fn record(
        &self,
        kind: ViolationKind,
        severity: Severity,
        message: String,
        location: Option<String>,
    ) {
        let violation = SecurityViolation {
            kind,
            severity,
            message,
            location,
            timestamp: Utc::now(),
        };
        if let Some(hook) = &self.hook {
            hook(&violation);
        }
        self.recorded.lock().unwrap().push(violation);
    }

    pub fn snapshot(&self) -> Vec<SecurityViolation> {
        self.recorded.lock().unwrap().clone()
    }

    /// Accumulated violations, or `None` when none occurred
    fn drain(&self) -> Option<Vec<SecurityViolation>> {
        let mut recorded = self.recorded.lock().unwrap();
        if recorded.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut *recorded))
        }
    }
}

/// Outcome of one `execute` call; immutable after return
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub usage: ResourceUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<SecurityViolation>>,
}

impl ExecutionResult {
    fn failure(
        error: String,
        execution_time_ms: u64,
        usage: ResourceUsage,
        violations: Option<Vec<SecurityViolation>>,
    ) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error),
            execution_time_ms,
            usage,
            violations,
        }
    }
}

/// Authoritative per-context state, owned by the runtime's table
struct ContextState {
    id: String,
    plugin: String,
    permissions: crate::permissions::PermissionSet,
    limits: ResourceLimits,
    allowed_globals: BTreeSet<String>,
    created_at: DateTime<Utc>,
    started: Instant,
    usage: Arc<Mutex<ResourceUsage>>,
    timers: Arc<TimerRegistry>,
    /// Serializes concurrent `execute` calls against this context so
    /// usage accounting stays correct
    gate: tokio::sync::Mutex<()>,
}

impl ContextState {
    fn snapshot(&self) -> SandboxContext {
        SandboxContext {
            id: self.id.clone(),
            plugin: self.plugin.clone(),
            permissions: self.permissions.clone(),
            limits: self.limits.clone(),
            allowed_globals: self.allowed_globals.clone(),
            created_at: self.created_at,
            usage: *self.usage.lock().unwrap(),
        }
    }
}

/// The sandboxed execution runtime
pub struct SandboxRuntime {
    policy: SecurityPolicy,
    patterns: PatternSet,
    validator: Arc<PermissionValidator>,
    evaluator: Arc<dyn Evaluator>,
    network: Arc<dyn NetworkBackend>,
    contexts: Mutex<HashMap<String, Arc<ContextState>>>,
    host_globals: HashMap<String, serde_json::Value>,
    violation_hook: Option<ViolationHook>,
}

impl SandboxRuntime {
    /// The policy given here is the runtime enforcement policy; it may
    /// differ from the policy the plugin was scanned and installed under.
    pub fn new(
        policy: SecurityPolicy,
        validator: Arc<PermissionValidator>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        let patterns = PatternSet::compile(&policy);
        Self {
            policy,
            patterns,
            validator,
            evaluator,
            network: Arc::new(HttpBackend::new()),
            contexts: Mutex::new(HashMap::new()),
            host_globals: HashMap::new(),
            violation_hook: None,
        }
    }

    /// Replace the transport behind the fetch primitive
    pub fn with_network_backend(mut self, backend: Arc<dyn NetworkBackend>) -> Self {
        self.network = backend;
        self
    }

    /// Install the violation callback, invoked once per recorded violation
    pub fn with_violation_hook(mut self, hook: ViolationHook) -> Self {
        self.violation_hook = Some(hook);
        self
    }

    /// Register a host-environment global; contexts created afterwards may
    /// reach it by name
    pub fn with_host_global(mut self, name: &str, value: serde_json::Value) -> Self {
        self.host_globals.insert(name.to_string(), value);
        self
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Allocate and register a fresh context; pure allocation, nothing
    /// executes
    pub fn create_context(
        &self,
        plugin: &str,
        permissions: crate::permissions::PermissionSet,
        limits: Option<ResourceLimitOverrides>,
    ) -> SandboxContext {
        let limits = ResourceLimits::merged_over_defaults(&limits.unwrap_or_default());
        let mut allowed_globals: BTreeSet<String> =
            SAFE_GLOBALS.iter().map(|s| s.to_string()).collect();
        allowed_globals.extend(self.host_globals.keys().cloned());

        let state = Arc::new(ContextState {
            id: generate_context_id(),
            plugin: plugin.to_string(),
            permissions,
            limits,
            allowed_globals,
            created_at: Utc::now(),
            started: Instant::now(),
            usage: Arc::new(Mutex::new(ResourceUsage::default())),
            timers: Arc::new(TimerRegistry::default()),
            gate: tokio::sync::Mutex::new(()),
        });
        let snapshot = state.snapshot();
        self.contexts
            .lock()
            .unwrap()
            .insert(state.id.clone(), state);
        snapshot
    }

    /// Snapshot of a registered context
    pub fn context(&self, id: &str) -> Option<SandboxContext> {
        self.contexts
            .lock()
            .unwrap()
            .get(id)
            .map(|state| state.snapshot())
    }

    pub fn context_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    /// Run one code unit inside a registered context
    pub async fn execute(&self, code: &str, context_id: &str) -> ExecutionResult {
        let state = self.contexts.lock().unwrap().get(context_id).cloned();
        let Some(state) = state else {
            // No code ran, so no violation is recorded
            return ExecutionResult::failure(
                SandboxError::UnknownContext {
                    id: context_id.to_string(),
                }
                .to_string(),
                0,
                ResourceUsage::default(),
                None,
            );
        };

        let _serialized = state.gate.lock().await;
        let sink = ViolationSink::new(self.violation_hook.clone());
        let started = Instant::now();

        // Pre-flight against the current policy, before any user code
        if let Some(hit) = self
            .patterns
            .first_match(code, self.policy.allow_dynamic_execution)
        {
            sink.record(
                ViolationKind::Pattern,
                Severity::Critical,
                format!("banned construct at line {}: {}", hit.line, hit.description),
                Some(format!("{}:{}", hit.line, hit.column)),
            );
            return ExecutionResult::failure(
                SandboxError::BannedPattern {
                    description: hit.description,
                }
                .to_string(),
                started.elapsed().as_millis() as u64,
                *state.usage.lock().unwrap(),
                sink.drain(),
            );
        }

        let host = SandboxHost::new(
            state.plugin.clone(),
            state.permissions.clone(),
            state.limits.clone(),
            state.allowed_globals.clone(),
            self.host_globals.clone(),
            Arc::clone(&state.usage),
            Arc::clone(&state.timers),
            Arc::clone(&self.validator),
            Arc::clone(&self.network),
            sink.clone(),
        );

        let budget = Duration::from_millis(state.limits.cpu_time_ms);
        let outcome = tokio::time::timeout(budget, self.evaluator.evaluate(code, &host)).await;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let usage = {
            let mut usage = state.usage.lock().unwrap();
            usage.cpu_time_ms += execution_time_ms;
            *usage
        };

        match outcome {
            Err(_) => {
                sink.record(
                    ViolationKind::Timeout,
                    Severity::High,
                    format!(
                        "execution exceeded the {}ms budget",
                        state.limits.cpu_time_ms
                    ),
                    None,
                );
                ExecutionResult::failure(
                    SandboxError::Timeout {
                        limit_ms: state.limits.cpu_time_ms,
                    }
                    .to_string(),
                    execution_time_ms,
                    usage,
                    sink.drain(),
                )
            }
            Ok(Ok(value)) => ExecutionResult {
                success: true,
                value: Some(value),
                error: None,
                execution_time_ms,
                usage,
                violations: sink.drain(),
            },
            Ok(Err(error)) => {
                ExecutionResult::failure(error.to_string(), execution_time_ms, usage, sink.drain())
            }
        }
    }

    /// Remove a context and cancel every timer it still owns
    pub fn destroy_context(&self, id: &str) -> bool {
        match self.contexts.lock().unwrap().remove(id) {
            Some(state) => {
                state.timers.abort_all();
                true
            }
            None => false,
        }
    }

    /// Destroy every context older than `max_age_ms`; returns how many
    /// were swept
    pub fn cleanup_expired_contexts(&self, max_age_ms: u64) -> usize {
        let max_age = Duration::from_millis(max_age_ms);
        let expired: Vec<Arc<ContextState>> = {
            let mut contexts = self.contexts.lock().unwrap();
            let ids: Vec<String> = contexts
                .iter()
                .filter(|(_, state)| state.started.elapsed() > max_age)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| contexts.remove(id)).collect()
        };
        for state in &expired {
            state.timers.abort_all();
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{NetworkPermission, PermissionSet};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend;

    #[async_trait]
    impl NetworkBackend for StubBackend {
        async fn fetch(&self, url: &str) -> Result<FetchResponse, SandboxError> {
            Ok(FetchResponse {
                status: 200,
                body: "ok".to_string(),
                url: url.to_string(),
            })
        }
    }

    /// Counts invocations and returns a fixed value
    struct CountingEvaluator {
        calls: AtomicUsize,
    }

    impl CountingEvaluator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Evaluator for CountingEvaluator {
        async fn evaluate(
            &self,
            _code: &str,
            _host: &SandboxHost,
        ) -> Result<serde_json::Value, EvalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(42))
        }
    }

    /// Awaits for the given duration, simulating code that never yields a
    /// result within its budget
    struct SleepEvaluator(Duration);

    #[async_trait]
    impl Evaluator for SleepEvaluator {
        async fn evaluate(
            &self,
            _code: &str,
            _host: &SandboxHost,
        ) -> Result<serde_json::Value, EvalError> {
            tokio::time::sleep(self.0).await;
            Ok(serde_json::Value::Null)
        }
    }

    /// Fetches every url in order, propagating the first denial
    struct FetchEvaluator {
        urls: Vec<String>,
    }

    #[async_trait]
    impl Evaluator for FetchEvaluator {
        async fn evaluate(
            &self,
            _code: &str,
            host: &SandboxHost,
        ) -> Result<serde_json::Value, EvalError> {
            let mut completed = 0u32;
            for url in &self.urls {
                host.fetch(url).await?;
                completed += 1;
            }
            Ok(serde_json::json!(completed))
        }
    }

    fn runtime_with(evaluator: Arc<dyn Evaluator>) -> SandboxRuntime {
        let validator = Arc::new(PermissionValidator::with_policy_name("default"));
        SandboxRuntime::new(palisade_policy::policy("default"), validator, evaluator)
            .with_network_backend(Arc::new(StubBackend))
    }

    fn network_permissions() -> PermissionSet {
        PermissionSet {
            network: vec![NetworkPermission::new("*.example.com")],
            ..PermissionSet::new()
        }
    }

    #[test]
    fn create_context_is_pure_allocation() {
        let evaluator = CountingEvaluator::new();
        let runtime = runtime_with(evaluator.clone());

        let ctx = runtime.create_context("demo", PermissionSet::new(), None);
        assert!(ctx.id.starts_with("ctx-"));
        assert_eq!(ctx.plugin, "demo");
        assert_eq!(ctx.limits, ResourceLimits::default());
        assert_eq!(ctx.usage, ResourceUsage::default());
        assert!(ctx.allowed_globals.contains("console"));
        assert!(ctx.allowed_globals.contains("fetch"));
        assert_eq!(runtime.context_count(), 1);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn context_ids_never_collide() {
        let runtime = runtime_with(CountingEvaluator::new());
        let a = runtime.create_context("demo", PermissionSet::new(), None);
        let b = runtime.create_context("demo", PermissionSet::new(), None);
        assert_ne!(a.id, b.id);
        assert_eq!(runtime.context_count(), 2);
    }

    #[tokio::test]
    async fn execute_returns_value_and_accounts_time() {
        let runtime = runtime_with(CountingEvaluator::new());
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        let result = runtime.execute("answer()", &ctx.id).await;
        assert!(result.success);
        assert_eq!(result.value, Some(serde_json::json!(42)));
        assert!(result.error.is_none());
        assert!(result.violations.is_none());

        let after = runtime.context(&ctx.id).unwrap();
        assert_eq!(after.usage.cpu_time_ms, result.usage.cpu_time_ms);
    }

    #[tokio::test]
    async fn unknown_context_fails_without_violation() {
        let runtime = runtime_with(CountingEvaluator::new());

        let result = runtime.execute("answer()", "ctx-missing").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown context"));
        assert!(result.violations.is_none());
    }

    #[tokio::test]
    async fn destroyed_context_cannot_be_reused() {
        let runtime = runtime_with(CountingEvaluator::new());
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        assert!(runtime.destroy_context(&ctx.id));
        assert!(!runtime.destroy_context(&ctx.id));
        assert_eq!(runtime.context_count(), 0);

        let result = runtime.execute("answer()", &ctx.id).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn preflight_pattern_blocks_before_any_code_runs() {
        let evaluator = CountingEvaluator::new();
        let runtime = runtime_with(evaluator.clone());
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        let result = runtime.execute("eval(payload);", &ctx.id).await;
        assert!(!result.success);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);

        let violations = result.violations.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Pattern);
        assert_eq!(violations[0].severity, Severity::Critical);
        assert!(violations[0].location.is_some());
    }

    #[tokio::test]
    async fn dynamic_execution_exemption_applies_at_preflight() {
        let evaluator = CountingEvaluator::new();
        let validator = Arc::new(PermissionValidator::with_policy_name("development"));
        let runtime = SandboxRuntime::new(
            palisade_policy::policy("development"),
            validator,
            evaluator.clone(),
        );
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        // eval is exempted under the development policy...
        let result = runtime.execute("eval(payload);", &ctx.id).await;
        assert!(result.success);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);

        // ...but other categories stay enforced
        let result = runtime.execute("spawnSync('ls');", &ctx.id).await;
        assert!(!result.success);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_wins_the_race_and_records_a_violation() {
        let runtime = runtime_with(Arc::new(SleepEvaluator(Duration::from_secs(600))));
        let ctx = runtime.create_context(
            "demo",
            PermissionSet::new(),
            Some(ResourceLimitOverrides {
                cpu_time_ms: Some(1000),
                ..ResourceLimitOverrides::default()
            }),
        );

        let result = runtime.execute("loop_forever()", &ctx.id).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
        assert!(result.execution_time_ms >= 1000);
        assert!(result.execution_time_ms < 5000);

        let violations = result.violations.unwrap();
        assert_eq!(violations[0].kind, ViolationKind::Timeout);
        assert_eq!(violations[0].severity, Severity::High);

        // The context survives the failed call
        assert!(runtime.context(&ctx.id).is_some());
    }

    #[tokio::test]
    async fn denied_fetch_records_violation_without_counting() {
        let runtime = runtime_with(Arc::new(FetchEvaluator {
            urls: vec!["https://evil.example.org/data".to_string()],
        }));
        let ctx = runtime.create_context("demo", network_permissions(), None);

        let result = runtime.execute("fetch_all()", &ctx.id).await;
        assert!(!result.success);

        let violations = result.violations.unwrap();
        assert_eq!(violations[0].kind, ViolationKind::Permission);
        assert_eq!(violations[0].severity, Severity::High);
        assert_eq!(runtime.context(&ctx.id).unwrap().usage.network_calls, 0);
    }

    #[tokio::test]
    async fn network_budget_exhaustion_is_a_resource_violation() {
        let runtime = runtime_with(Arc::new(FetchEvaluator {
            urls: vec![
                "https://api.example.com/one".to_string(),
                "https://api.example.com/two".to_string(),
            ],
        }));
        let ctx = runtime.create_context(
            "demo",
            network_permissions(),
            Some(ResourceLimitOverrides {
                network_calls: Some(1),
                ..ResourceLimitOverrides::default()
            }),
        );

        let result = runtime.execute("fetch_all()", &ctx.id).await;
        assert!(!result.success);

        let violations = result.violations.unwrap();
        assert_eq!(violations[0].kind, ViolationKind::Resource);
        assert_eq!(violations[0].severity, Severity::Medium);
        // The first permitted fetch was counted; the denied one was not
        assert_eq!(runtime.context(&ctx.id).unwrap().usage.network_calls, 1);
    }

    #[tokio::test]
    async fn violation_hook_fires_once_per_violation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let hook: ViolationHook = Arc::new(move |violation| {
            seen_clone.lock().unwrap().push(violation.kind);
        });

        let validator = Arc::new(PermissionValidator::with_policy_name("default"));
        let runtime = SandboxRuntime::new(
            palisade_policy::policy("default"),
            validator,
            Arc::new(NullEvaluator),
        )
        .with_violation_hook(hook);
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        let _ = runtime.execute("eval(x);", &ctx.id).await;
        assert_eq!(*seen.lock().unwrap(), vec![ViolationKind::Pattern]);
    }

    #[tokio::test]
    async fn host_globals_reach_the_namespace() {
        struct GlobalReader;

        #[async_trait]
        impl Evaluator for GlobalReader {
            async fn evaluate(
                &self,
                _code: &str,
                host: &SandboxHost,
            ) -> Result<serde_json::Value, EvalError> {
                match host.global("hostVersion") {
                    Some(value) => Ok(value.clone()),
                    None => Err(EvalError::Code("hostVersion unreachable".to_string())),
                }
            }
        }

        let validator = Arc::new(PermissionValidator::with_policy_name("default"));
        let runtime = SandboxRuntime::new(
            palisade_policy::policy("default"),
            validator,
            Arc::new(GlobalReader),
        )
        .with_host_global("hostVersion", serde_json::json!("2.4.0"));
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);
        assert!(ctx.allowed_globals.contains("hostVersion"));

        let result = runtime.execute("read()", &ctx.id).await;
        assert!(result.success);
        assert_eq!(result.value, Some(serde_json::json!("2.4.0")));
    }

    #[tokio::test]
    async fn plugin_error_is_surfaced_as_is() {
        struct Failing;

        #[async_trait]
        impl Evaluator for Failing {
            async fn evaluate(
                &self,
                _code: &str,
                _host: &SandboxHost,
            ) -> Result<serde_json::Value, EvalError> {
                Err(EvalError::Code("TypeError: undefined is not a function".to_string()))
            }
        }

        let runtime = runtime_with(Arc::new(Failing));
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        let result = runtime.execute("broken()", &ctx.id).await;
        assert!(!result.success);
        assert_eq!(
            result.error.unwrap(),
            "TypeError: undefined is not a function"
        );
        assert!(result.violations.is_none());
    }

    #[tokio::test]
    async fn same_context_calls_are_serialized() {
        let runtime = runtime_with(Arc::new(SleepEvaluator(Duration::from_millis(50))));
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        let started = Instant::now();
        let (a, b) = tokio::join!(
            runtime.execute("first()", &ctx.id),
            runtime.execute("second()", &ctx.id),
        );
        assert!(a.success && b.success);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn destroy_cancels_outstanding_timers() {
        struct TimerSetter {
            fired: Arc<Mutex<bool>>,
        }

        #[async_trait]
        impl Evaluator for TimerSetter {
            async fn evaluate(
                &self,
                _code: &str,
                host: &SandboxHost,
            ) -> Result<serde_json::Value, EvalError> {
                let fired = Arc::clone(&self.fired);
                host.set_timeout(100, move || {
                    *fired.lock().unwrap() = true;
                });
                Ok(serde_json::Value::Null)
            }
        }

        let fired = Arc::new(Mutex::new(false));
        let runtime = runtime_with(Arc::new(TimerSetter {
            fired: Arc::clone(&fired),
        }));
        let ctx = runtime.create_context("demo", PermissionSet::new(), None);

        let result = runtime.execute("schedule()", &ctx.id).await;
        assert!(result.success);
        assert!(runtime.destroy_context(&ctx.id));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!*fired.lock().unwrap());
    }

    #[tokio::test]
    async fn cleanup_sweeps_expired_contexts() {
        let runtime = runtime_with(CountingEvaluator::new());
        runtime.create_context("one", PermissionSet::new(), None);
        runtime.create_context("two", PermissionSet::new(), None);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let fresh = runtime.create_context("three", PermissionSet::new(), None);

        assert_eq!(runtime.cleanup_expired_contexts(10), 2);
        assert_eq!(runtime.context_count(), 1);
        assert!(runtime.context(&fresh.id).is_some());
    }

    #[tokio::test]
    async fn fetch_checks_are_audited() {
        let validator = Arc::new(PermissionValidator::with_policy_name("default"));
        let runtime = SandboxRuntime::new(
            palisade_policy::policy("default"),
            Arc::clone(&validator),
            Arc::new(FetchEvaluator {
                urls: vec!["https://api.example.com/data".to_string()],
            }),
        )
        .with_network_backend(Arc::new(StubBackend));
        let ctx = runtime.create_context("demo", network_permissions(), None);

        let result = runtime.execute("fetch_all()", &ctx.id).await;
        assert!(result.success);

        let entries = validator.audit_log(&crate::audit::AuditFilter::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "network:fetch");
        assert_eq!(entries[0].resource, "api.example.com");
        assert!(entries[0].allowed);
    }
}
