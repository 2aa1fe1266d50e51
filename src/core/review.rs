//! Review queue over anchors flagged by recovery.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::anchor_store::AnchorStore;
use super::recovery_log::RecoveryLog;
use crate::domain::{Anchor, CharRange, EntityKind, RecoveryEvent, RecoveryEventType, RecoveryMethod};
use crate::error::AnchorError;

/// Confidence band of a flagged anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// 0.85 and above
    High,
    /// 0.70 up to 0.85
    Medium,
    /// Below 0.70
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.85 {
            ConfidenceBand::High
        } else if confidence >= 0.70 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

impl FromStr for ConfidenceBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(ConfidenceBand::High),
            "medium" => Ok(ConfidenceBand::Medium),
            "low" => Ok(ConfidenceBand::Low),
            other => Err(format!("unknown confidence band: {}", other)),
        }
    }
}

/// Filter for `ReviewQueue::list`; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub document_id: Option<String>,
    pub band: Option<ConfidenceBand>,
    pub kind: Option<EntityKind>,
}

impl ReviewFilter {
    pub fn matches(&self, anchor: &Anchor) -> bool {
        anchor.needs_review
            && self
                .document_id
                .as_ref()
                .map_or(true, |d| *d == anchor.document_id)
            && self
                .band
                .map_or(true, |b| b == ConfidenceBand::of(anchor.recovery_confidence))
            && self.kind.map_or(true, |k| k == anchor.entity_kind)
    }
}

/// Query and resolve anchors that need a human decision
pub struct ReviewQueue {
    store: Arc<dyn AnchorStore>,
    log_dir: Option<std::path::PathBuf>,
}

impl ReviewQueue {
    pub fn new(store: Arc<dyn AnchorStore>) -> Self {
        Self {
            store,
            log_dir: None,
        }
    }

    /// Record review actions in the per-document recovery log
    pub fn with_log_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Flagged anchors, lowest confidence first
    pub async fn list(&self, filter: &ReviewFilter) -> Result<Vec<Anchor>> {
        let anchors = match &filter.document_id {
            Some(doc) => self.store.list_for_document(doc).await?,
            None => self.store.list_all().await?,
        };
        let mut flagged: Vec<Anchor> = anchors.into_iter().filter(|a| filter.matches(a)).collect();
        flagged.sort_by(|a, b| {
            a.recovery_confidence
                .total_cmp(&b.recovery_confidence)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(flagged)
    }

    /// Confirm the current location
    pub async fn accept(&self, anchor_id: Uuid) -> Result<Anchor> {
        let mut anchor = self.load(anchor_id).await?;
        anchor.needs_review = false;
        anchor.review_reason = None;
        anchor.touch();
        self.commit(
            &anchor,
            RecoveryEventType::ReviewAccepted,
            "review accepted".to_string(),
        )
        .await?;
        Ok(anchor)
    }

    /// Give up on placing the anchor; it is kept, marked lost
    pub async fn reject(&self, anchor_id: Uuid) -> Result<Anchor> {
        let mut anchor = self.load(anchor_id).await?;
        anchor.recovery_method = RecoveryMethod::Lost;
        anchor.recovery_confidence = 0.0;
        anchor.needs_review = false;
        anchor.review_reason = None;
        anchor.touch();
        self.commit(
            &anchor,
            RecoveryEventType::ReviewRejected,
            "review rejected, marked lost".to_string(),
        )
        .await?;
        Ok(anchor)
    }

    /// Place the anchor at a caller-supplied location
    pub async fn relink(
        &self,
        anchor_id: Uuid,
        range: CharRange,
        chunk_ids: Vec<String>,
    ) -> Result<Anchor> {
        if range.is_empty() {
            return Err(AnchorError::InvalidRange {
                start: range.start,
                end: range.end,
                len: range.end,
            }
            .into());
        }
        let mut anchor = self.load(anchor_id).await?;
        anchor.current_char_range = Some(range);
        anchor.current_chunk_ids = chunk_ids;
        anchor.recovery_method = RecoveryMethod::Manual;
        anchor.recovery_confidence = 1.0;
        anchor.needs_review = false;
        anchor.review_reason = None;
        anchor.touch();
        self.commit(
            &anchor,
            RecoveryEventType::ReviewRelinked,
            format!("relinked to {}..{}", range.start, range.end),
        )
        .await?;
        Ok(anchor)
    }

    async fn load(&self, anchor_id: Uuid) -> Result<Anchor> {
        self.store
            .get(anchor_id)
            .await?
            .ok_or_else(|| AnchorError::AnchorNotFound(anchor_id).into())
    }

    async fn commit(
        &self,
        anchor: &Anchor,
        event_type: RecoveryEventType,
        summary: String,
    ) -> Result<()> {
        self.store.put(anchor).await?;
        info!(anchor_id = %anchor.id, action = ?event_type, "Review action applied");

        if let Some(dir) = &self.log_dir {
            let event = RecoveryEvent::new(&anchor.document_id, Some(anchor.id), event_type, summary)
                .with_result(anchor.recovery_method, anchor.recovery_confidence);
            let log = RecoveryLog::open(dir, &anchor.document_id).await?;
            if let Err(e) = log.append(&event).await {
                warn!(error = %e, "Failed to append review event");
            }
        }
        Ok(())
    }
}
