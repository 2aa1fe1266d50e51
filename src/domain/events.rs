//! Recovery audit events.
//!
//! Every per-anchor decision and every review action is recorded as an
//! immutable event in an append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::anchor::RecoveryMethod;

/// A single event in the recovery log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Document the batch ran against
    pub document_id: String,

    /// Anchor the event concerns (None for batch events)
    pub anchor_id: Option<Uuid>,

    pub event_type: RecoveryEventType,

    /// Human-readable summary
    pub summary: String,

    pub method: Option<RecoveryMethod>,
    pub confidence: Option<f64>,

    /// Error or diagnostic message
    pub error: Option<String>,
}

impl RecoveryEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        document_id: impl Into<String>,
        anchor_id: Option<Uuid>,
        event_type: RecoveryEventType,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            document_id: document_id.into(),
            anchor_id,
            event_type,
            summary: summary.into(),
            method: None,
            confidence: None,
            error: None,
        }
    }

    pub fn with_result(mut self, method: RecoveryMethod, confidence: f64) -> Self {
        self.method = Some(method);
        self.confidence = Some(confidence);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventType {
    BatchStarted,
    BatchCompleted,
    AnchorRecovered,
    AnchorFlagged,
    AnchorOrphaned,
    AnchorSkipped,
    /// Recovery threw; anchor was flagged for review
    AnchorFailed,
    ReviewAccepted,
    ReviewRejected,
    ReviewRelinked,
}
