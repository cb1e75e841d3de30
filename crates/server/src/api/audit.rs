//! Audit trail queries.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toonmill_core::{AuditFilter, AuditRecord, CallStatus};

use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for the audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub task_id: Option<String>,
    /// e.g. `task_state_changed`, `external_call`
    pub event_type: Option<String>,
    /// Collaborator of an external call: `analyzer`, `image` or `storage`
    pub service: Option<String>,
    /// Collaborator method, e.g. `validate` or `generate_with_reference`
    pub method: Option<String>,
    /// Outcome of an external call attempt: `success` or `error`
    pub status: Option<CallStatus>,
    /// Events at or after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Events at or before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQueryParams {
    /// Filter without pagination, shared by query and count.
    fn filter(&self) -> AuditFilter {
        let mut filter = AuditFilter::new();
        if let Some(ref task_id) = self.task_id {
            filter = filter.with_task_id(task_id);
        }
        if let Some(ref event_type) = self.event_type {
            filter = filter.with_event_type(event_type);
        }
        if let Some(ref service) = self.service {
            filter = filter.with_service(service);
        }
        if let Some(ref method) = self.method {
            filter = filter.with_method(method);
        }
        if let Some(status) = self.status {
            filter = filter.with_call_status(status);
        }
        if self.from.is_some() || self.to.is_some() {
            filter = filter.with_time_range(self.from, self.to);
        }
        filter
    }
}

/// Response for the audit endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct AuditErrorResponse {
    pub error: String,
}

type ErrorReply = (StatusCode, Json<AuditErrorResponse>);

fn store_error(action: &str, e: impl std::fmt::Display) -> ErrorReply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AuditErrorResponse {
            error: format!("Failed to {} audit events: {}", action, e),
        }),
    )
}

/// Query audit events, newest first
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ErrorReply> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let filter = params.filter();
    let events = state
        .audit_store()
        .query(&filter.clone().with_limit(limit).with_offset(offset))
        .map_err(|e| store_error("query", e))?;
    let total = state
        .audit_store()
        .count(&filter)
        .map_err(|e| store_error("count", e))?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}
