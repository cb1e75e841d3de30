//! Audited, retried external calls.

use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::{retry, RetryPolicy, ServiceError};
use crate::audit::{AuditEvent, AuditHandle, CallStatus};
use crate::metrics::{EXTERNAL_CALLS, EXTERNAL_CALL_DURATION};

/// Description of one external call, used for audit records and metrics.
#[derive(Debug, Clone)]
pub struct ExternalCall<'a> {
    /// Task the call belongs to, if any.
    pub task_id: Option<&'a str>,
    /// Collaborator name ("analyzer", "image", "storage").
    pub service: &'static str,
    /// Operation name ("validate", "generate_scenario", ...).
    pub method: &'static str,
    /// Model or backend identifier.
    pub model: &'a str,
    /// Snapshot of the request, stored with every attempt.
    pub request: Value,
}

impl<'a> ExternalCall<'a> {
    pub fn new(service: &'static str, method: &'static str, model: &'a str) -> Self {
        Self {
            task_id: None,
            service,
            method,
            model,
            request: Value::Null,
        }
    }

    pub fn for_task(mut self, task_id: &'a str) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_request(mut self, request: Value) -> Self {
        self.request = request;
        self
    }
}

/// Run a collaborator call under `policy`, recording every attempt.
///
/// `summarize` turns a successful result into the response snapshot of its
/// audit record. Audit emission never blocks and never fails the call.
pub async fn invoke<T, F, Fut, S>(
    policy: &RetryPolicy,
    audit: Option<&AuditHandle>,
    call: &ExternalCall<'_>,
    summarize: S,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
    S: Fn(&T) -> Value,
{
    let operation = format!("{}.{}", call.service, call.method);
    let summarize = &summarize;

    retry(policy, &operation, |attempt| {
        let pending = op();
        async move {
            let started = Instant::now();
            let result = pending.await;
            record_attempt(audit, call, attempt, started.elapsed(), &result, summarize);
            result
        }
    })
    .await
}

fn record_attempt<T>(
    audit: Option<&AuditHandle>,
    call: &ExternalCall<'_>,
    attempt: u32,
    elapsed: Duration,
    result: &Result<T, ServiceError>,
    summarize: &dyn Fn(&T) -> Value,
) {
    let status = if result.is_ok() {
        CallStatus::Success
    } else {
        CallStatus::Error
    };

    EXTERNAL_CALLS
        .with_label_values(&[call.service, call.method, status.as_str()])
        .inc();
    EXTERNAL_CALL_DURATION
        .with_label_values(&[call.service, call.method])
        .observe(elapsed.as_secs_f64());

    let Some(audit) = audit else {
        return;
    };

    let (response, error) = match result {
        Ok(value) => (summarize(value), None),
        Err(e) => (json!({ "category": e.category() }), Some(e.to_string())),
    };

    audit.try_emit(AuditEvent::ExternalCall {
        task_id: call.task_id.map(String::from),
        service: call.service.to_string(),
        method: call.method.to_string(),
        model: call.model.to_string(),
        attempt,
        status,
        duration_secs: (elapsed.as_secs_f64() * 1000.0).round() / 1000.0,
        request: call.request.clone(),
        response,
        error,
    });
}
