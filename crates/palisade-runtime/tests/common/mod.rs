//! Shared test utilities
//!
//! Stub evaluators and network backends so the sandbox's enforcement
//! logic can be exercised without a concrete isolation technology.
#![allow(dead_code)]

use async_trait::async_trait;
use palisade_runtime::sandbox::{
    EvalError, Evaluator, FetchResponse, NetworkBackend, SandboxError, SandboxHost,
    SandboxRuntime,
};
use palisade_runtime::validator::PermissionValidator;
use std::sync::Arc;

/// Backend that answers every request with a 200 without touching the
/// network
pub struct StubBackend;

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

/// Evaluator that fetches every url in order, propagating the first
/// denial
pub struct FetchEvaluator {
    pub urls: Vec<String>,
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

/// Evaluator that keeps fetching but swallows denials, so a run can
/// succeed while still accumulating violations
pub struct ResilientFetchEvaluator {
    pub urls: Vec<String>,
}

#[async_trait]
impl Evaluator for ResilientFetchEvaluator {
    async fn evaluate(
        &self,
        _code: &str,
        host: &SandboxHost,
    ) -> Result<serde_json::Value, EvalError> {
        let mut completed = 0u32;
        for url in &self.urls {
            if host.fetch(url).await.is_ok() {
                completed += 1;
            }
        }
        Ok(serde_json::json!(completed))
    }
}

/// Build a runtime over the named policy preset with a stub transport
pub fn runtime_with(
    policy_name: &str,
    evaluator: Arc<dyn Evaluator>,
) -> (SandboxRuntime, Arc<PermissionValidator>) {
    let validator = Arc::new(PermissionValidator::with_policy_name(policy_name));
    let runtime = SandboxRuntime::new(
        palisade_policy::policy(policy_name),
        Arc::clone(&validator),
        evaluator,
    )
    .with_network_backend(Arc::new(StubBackend));
    (runtime, validator)
}
