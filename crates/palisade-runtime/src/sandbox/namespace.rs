//! Restricted execution namespace
//!
//! The [`SandboxHost`] is everything a code unit can reach during one
//! `execute` call: a console proxy tagging output with the plugin name,
//! cancelable timer primitives, host globals gated by the context's
//! allowed set, a capability-checked network fetch, and resource budget
//! gates. Every denial records a violation before raising.

use crate::permissions::PermissionSet;
use crate::sandbox::context::{ResourceLimits, ResourceUsage};
use crate::sandbox::{SandboxError, SecurityViolation, ViolationKind, ViolationSink};
use crate::validator::PermissionValidator;
use async_trait::async_trait;
use palisade_policy::Severity;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// The fixed safe core every context may reach
pub const SAFE_GLOBALS: &[&str] = &[
    "Array",
    "Boolean",
    "Date",
    "JSON",
    "Math",
    "Number",
    "Object",
    "Promise",
    "String",
    "clearTimeout",
    "console",
    "fetch",
    "setTimeout",
];

/// Console proxy that tags every line with the plugin name
#[derive(Debug, Clone)]
pub struct ConsoleProxy {
    plugin: String,
    lines: Arc<Mutex<Vec<String>>>,
}

impl ConsoleProxy {
    pub(crate) fn new(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log(&self, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("[{}] {}", self.plugin, message));
    }

    pub fn error(&self, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("[{}] error: {}", self.plugin, message));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

/// Timers owned by one context; all of them are aborted when the context
/// is destroyed so nothing leaks past destruction
#[derive(Debug, Default)]
pub(crate) struct TimerRegistry {
    next_id: AtomicU64,
    handles: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl TimerRegistry {
    pub fn spawn<F>(&self, delay: Duration, callback: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        let mut handles = self.handles.lock().unwrap();
        handles.retain(|_, h| !h.is_finished());
        handles.insert(id, handle);
        id
    }

    pub fn cancel(&self, id: u64) -> bool {
        match self.handles.lock().unwrap().remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn abort_all(&self) {
        for (_, handle) in self.handles.lock().unwrap().drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        let mut handles = self.handles.lock().unwrap();
        handles.retain(|_, h| !h.is_finished());
        handles.len()
    }
}

/// Response handed back by the network primitive
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub url: String,
}

/// Transport behind the capability-checked fetch primitive
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, SandboxError>;
}

/// Default reqwest-backed transport
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkBackend for HttpBackend {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, SandboxError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SandboxError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SandboxError::Network(e.to_string()))?;
        Ok(FetchResponse {
            status,
            body,
            url: final_url,
        })
    }
}

/// Everything a code unit can reach during one `execute` call
pub struct SandboxHost {
    plugin: String,
    permissions: PermissionSet,
    limits: ResourceLimits,
    allowed_globals: BTreeSet<String>,
    globals: HashMap<String, serde_json::Value>,
    console: ConsoleProxy,
    usage: Arc<Mutex<ResourceUsage>>,
    timers: Arc<TimerRegistry>,
    validator: Arc<PermissionValidator>,
    network: Arc<dyn NetworkBackend>,
    violations: ViolationSink,
}

impl SandboxHost {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        plugin: String,
        permissions: PermissionSet,
        limits: ResourceLimits,
        allowed_globals: BTreeSet<String>,
        globals: HashMap<String, serde_json::Value>,
        usage: Arc<Mutex<ResourceUsage>>,
        timers: Arc<TimerRegistry>,
        validator: Arc<PermissionValidator>,
        network: Arc<dyn NetworkBackend>,
        violations: ViolationSink,
    ) -> Self {
        let console = ConsoleProxy::new(&plugin);
        Self {
            plugin,
            permissions,
            limits,
            allowed_globals,
            globals,
            console,
            usage,
            timers,
            validator,
            network,
            violations,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn console(&self) -> &ConsoleProxy {
        &self.console
    }

    pub fn allowed_globals(&self) -> &BTreeSet<String> {
        &self.allowed_globals
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.allowed_globals.contains(name)
    }

    /// A registered host global, reachable only when the context's
    /// allowed set contains it
    pub fn global(&self, name: &str) -> Option<&serde_json::Value> {
        if self.allowed_globals.contains(name) {
            self.globals.get(name)
        } else {
            None
        }
    }

    /// Capability-checked network fetch
    ///
    /// Permission is checked per call through the validator (one audit
    /// entry each time); the call budget is checked before the transport
    /// runs; the counter increments only on transport success.
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchResponse, SandboxError> {
        let parsed = Url::parse(raw_url)
            .map_err(|e| SandboxError::Network(format!("invalid url '{}': {}", raw_url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| SandboxError::Network(format!("url '{}' has no host", raw_url)))?
            .to_string();

        if !self
            .validator
            .check_permission(&self.plugin, "network:fetch", &host, &self.permissions)
        {
            self.violations.record(
                ViolationKind::Permission,
                Severity::High,
                format!("network fetch to '{}' denied", host),
                Some(raw_url.to_string()),
            );
            return Err(SandboxError::CapabilityDenied {
                action: "network:fetch".to_string(),
                resource: host,
            });
        }

        let budget = self.limits.network_calls;
        if self.usage.lock().unwrap().network_calls >= budget {
            self.violations.record(
                ViolationKind::Resource,
                Severity::Medium,
                format!("network call budget of {} exhausted", budget),
                Some(raw_url.to_string()),
            );
            return Err(SandboxError::ResourceExhausted {
                resource: "network_calls".to_string(),
                limit: u64::from(budget),
            });
        }

        let response = self.network.fetch(raw_url).await?;
        self.usage.lock().unwrap().network_calls += 1;
        Ok(response)
    }

    /// Schedule a callback; the timer belongs to the context and is
    /// aborted when the context is destroyed
    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.timers
            .spawn(Duration::from_millis(delay_ms), callback)
    }

    pub fn clear_timeout(&self, timer_id: u64) -> bool {
        self.timers.cancel(timer_id)
    }

    /// Account an allocation against the memory budget
    pub fn track_allocation(&self, bytes: u64) -> Result<(), SandboxError> {
        let budget = self.limits.memory_bytes();
        let mut usage = self.usage.lock().unwrap();
        if usage.memory_bytes.saturating_add(bytes) > budget {
            drop(usage);
            self.violations.record(
                ViolationKind::Resource,
                Severity::Medium,
                format!("memory budget of {} bytes exhausted", budget),
                None,
            );
            return Err(SandboxError::ResourceExhausted {
                resource: "memory".to_string(),
                limit: budget,
            });
        }
        usage.memory_bytes += bytes;
        Ok(())
    }

    /// Account one filesystem operation against its budget
    pub fn record_filesystem_op(&self) -> Result<(), SandboxError> {
        let budget = self.limits.filesystem_ops();
        let mut usage = self.usage.lock().unwrap();
        if usage.filesystem_ops >= budget {
            drop(usage);
            self.violations.record(
                ViolationKind::Resource,
                Severity::Medium,
                format!("filesystem operation budget of {} exhausted", budget),
                None,
            );
            return Err(SandboxError::ResourceExhausted {
                resource: "filesystem_ops".to_string(),
                limit: u64::from(budget),
            });
        }
        usage.filesystem_ops += 1;
        Ok(())
    }

    /// Current usage snapshot
    pub fn usage(&self) -> ResourceUsage {
        *self.usage.lock().unwrap()
    }

    pub fn violations(&self) -> Vec<SecurityViolation> {
        self.violations.snapshot()
    }
}
