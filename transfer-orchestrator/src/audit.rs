//! Audit events and sinks
//!
//! Every state transition of a transfer, every rate fallback and every gated
//! card action produces one immutable [`AuditEvent`].

use crate::AuditSink;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Audit event type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Transfer lifecycle
    TransferCreated,
    TransferCompleted,
    RateFallback,

    // Step execution
    StepStarted,
    StepCompleted,
    StepFailed,
    InvariantViolation,
    ReviewCleared,

    // Rollback
    RollbackStep,
    RollbackCompleted,

    // Card actions
    CardActionAssessed,
    CardActionBlocked,
}

impl AuditEventType {
    /// snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::TransferCreated => "transfer_created",
            AuditEventType::TransferCompleted => "transfer_completed",
            AuditEventType::RateFallback => "rate_fallback",
            AuditEventType::StepStarted => "step_started",
            AuditEventType::StepCompleted => "step_completed",
            AuditEventType::StepFailed => "step_failed",
            AuditEventType::InvariantViolation => "invariant_violation",
            AuditEventType::ReviewCleared => "review_cleared",
            AuditEventType::RollbackStep => "rollback_step",
            AuditEventType::RollbackCompleted => "rollback_completed",
            AuditEventType::CardActionAssessed => "card_action_assessed",
            AuditEventType::CardActionBlocked => "card_action_blocked",
        }
    }
}

/// Audit severity level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    /// Routine transition
    Info,
    /// Degraded but handled
    Warning,
    /// Operation failed
    Error,
    /// Needs a human
    Critical,
}

/// Audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub event_id: Uuid,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type
    pub event_type: AuditEventType,

    /// Severity level
    pub severity: AuditSeverity,

    /// Entity the event is about (transfer id, account...)
    pub entity_ref: String,

    /// State before the transition
    pub before: Option<serde_json::Value>,

    /// State after the transition
    pub after: Option<serde_json::Value>,

    /// Additional context
    pub context: serde_json::Value,
}

impl AuditEvent {
    /// Start an info-level event
    pub fn new(event_type: AuditEventType, entity_ref: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type,
            severity: AuditSeverity::Info,
            entity_ref: entity_ref.into(),
            before: None,
            after: None,
            context: serde_json::Value::Null,
        }
    }

    /// Set severity
    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Set before/after states
    pub fn transition(mut self, before: impl Serialize, after: impl Serialize) -> Self {
        self.before = serde_json::to_value(before).ok();
        self.after = serde_json::to_value(after).ok();
        self
    }

    /// Set context
    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Sink that writes events as structured `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let before = event.before.as_ref().map(|v| v.to_string());
        let after = event.after.as_ref().map(|v| v.to_string());
        match event.severity {
            AuditSeverity::Info => info!(
                target: "audit",
                event_id = %event.event_id,
                event_type = event.event_type.as_str(),
                entity = %event.entity_ref,
                before = ?before,
                after = ?after,
                context = %event.context,
                "audit"
            ),
            _ => warn!(
                target: "audit",
                event_id = %event.event_id,
                event_type = event.event_type.as_str(),
                severity = ?event.severity,
                entity = %event.entity_ref,
                before = ?before,
                after = ?after,
                context = %event.context,
                "audit"
            ),
        }
    }
}

/// Sink that keeps events in memory for inspection
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Create empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Events of one type
    pub fn of_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
