//! Registry test utilities

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Notify;

use packument_resolver::registry::retry::{Resume, RetryPolicy};
use packument_resolver::registry::transport::{RegistryResponse, Transport};
use packument_resolver::version::error::RegistryError;

/// Transport answering from a queue of canned responses, in call order
#[allow(dead_code)]
#[derive(Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<RegistryResponse, RegistryError>>>,
    calls: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.respond_with(RegistryResponse::new(status, body))
    }

    pub fn respond_with(self, response: RegistryResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Hold every response for `delay` so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(url, accept)` of every request made so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, url: &str, accept: &str) -> Result<RegistryResponse, RegistryError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), accept.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RegistryError::InvalidResponse("no stubbed response".to_string())))
    }
}

/// Retry policy resuming at once for the first `max_attempts` failures
#[allow(dead_code)]
pub struct ImmediateRetry {
    max_attempts: u32,
    attempts: Mutex<Vec<u32>>,
}

#[allow(dead_code)]
impl ImmediateRetry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<u32> {
        self.attempts.lock().unwrap().clone()
    }
}

impl RetryPolicy for ImmediateRetry {
    fn retry(&self, _error: &RegistryError, _package_name: &str, attempt: u32, resume: Resume) {
        self.attempts.lock().unwrap().push(attempt);
        if attempt <= self.max_attempts {
            resume.resume();
        }
    }
}

/// Retry policy holding every `Resume` until the test releases it
#[allow(dead_code)]
#[derive(Default)]
pub struct ManualRetry {
    pending: Mutex<Vec<Resume>>,
    notify: Notify,
}

#[allow(dead_code)]
impl ManualRetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait_pending(&self) {
        loop {
            if !self.pending.lock().unwrap().is_empty() {
                return;
            }
            self.notify.notified().await;
        }
    }

    pub fn resume_all(&self) {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        for resume in pending {
            resume.resume();
        }
    }

    pub fn give_up_all(&self) {
        self.pending.lock().unwrap().clear();
    }
}

impl RetryPolicy for ManualRetry {
    fn retry(&self, _error: &RegistryError, _package_name: &str, _attempt: u32, resume: Resume) {
        self.pending.lock().unwrap().push(resume);
        self.notify.notify_one();
    }
}

/// Packument body with plain manifests for `versions`
pub fn packument_body(name: &str, versions: &[&str], latest: &str) -> String {
    packument_value(name, versions, latest).to_string()
}

pub fn packument_value(name: &str, versions: &[&str], latest: &str) -> Value {
    let manifests: Map<String, Value> = versions
        .iter()
        .map(|v| (v.to_string(), json!({ "name": name, "version": v })))
        .collect();

    json!({
        "name": name,
        "dist-tags": { "latest": latest },
        "versions": manifests,
    })
}
