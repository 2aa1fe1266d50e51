//! Append-only recovery log with file-based persistence.
//!
//! One JSONL file per document. Every batch start/finish, per-anchor
//! decision and review action is appended as a `RecoveryEvent`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{RecoveryEvent, RecoveryEventType};

/// File-based recovery log using JSONL format
#[derive(Debug, Clone)]
pub struct RecoveryLog {
    path: PathBuf,
}

impl RecoveryLog {
    /// Create or open the log for a document under `dir`
    pub async fn open(dir: &Path, document_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        Ok(Self {
            path: dir.join(format!("{}.jsonl", document_id)),
        })
    }

    /// Open a log at an explicit file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &RecoveryEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open recovery log: {}", self.path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<RecoveryEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open recovery log: {}", self.path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: RecoveryEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Events concerning one anchor, oldest first
    pub async fn history(&self, anchor_id: Uuid) -> Result<Vec<RecoveryEvent>> {
        let events = self.replay().await?;
        Ok(events
            .into_iter()
            .filter(|e| e.anchor_id == Some(anchor_id))
            .collect())
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(
        &self,
        event_type: RecoveryEventType,
    ) -> Result<Option<RecoveryEvent>> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }
}

/// Key identifying one anchor recovered against one document snapshot
pub fn generate_recovery_key(anchor_id: Uuid, snapshot_fingerprint: &str) -> String {
    hash_input(&format!("{}:{}", anchor_id, snapshot_fingerprint))
}

/// Hash input content (first 16 chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecoveryMethod;
    use tempfile::TempDir;

    async fn create_test_log() -> (RecoveryLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = RecoveryLog::open(&temp_dir.path().join("logs"), "doc-1")
            .await
            .unwrap();
        (log, temp_dir)
    }

    #[tokio::test]
    async fn test_event_append_and_replay() {
        let (log, _temp) = create_test_log().await;
        let anchor_id = Uuid::new_v4();

        log.append(&RecoveryEvent::new(
            "doc-1",
            None,
            RecoveryEventType::BatchStarted,
            "batch started",
        ))
        .await
        .unwrap();
        log.append(
            &RecoveryEvent::new(
                "doc-1",
                Some(anchor_id),
                RecoveryEventType::AnchorRecovered,
                "recovered",
            )
            .with_result(RecoveryMethod::Exact, 1.0),
        )
        .await
        .unwrap();

        let events = log.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, RecoveryEventType::BatchStarted);
        assert_eq!(events[1].method, Some(RecoveryMethod::Exact));

        let history = log.history(anchor_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(log.path().ends_with("doc-1.jsonl"));
    }

    #[tokio::test]
    async fn test_replay_missing_log_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let log = RecoveryLog::at(temp_dir.path().join("absent.jsonl"));
        assert!(log.replay().await.unwrap().is_empty());
        assert!(log
            .last_event_of_type(RecoveryEventType::BatchCompleted)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_last_event_of_type() {
        let (log, _temp) = create_test_log().await;
        for summary in ["first", "second"] {
            log.append(&RecoveryEvent::new(
                "doc-1",
                None,
                RecoveryEventType::BatchCompleted,
                summary,
            ))
            .await
            .unwrap();
        }
        let last = log
            .last_event_of_type(RecoveryEventType::BatchCompleted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.summary, "second");
    }

    #[test]
    fn test_recovery_key_format() {
        let anchor_id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let key = generate_recovery_key(anchor_id, "0123456789abcdef");
        assert_eq!(key.len(), 16);
        assert_eq!(key, generate_recovery_key(anchor_id, "0123456789abcdef"));
        assert_ne!(key, generate_recovery_key(anchor_id, "fedcba9876543210"));
    }

    #[test]
    fn test_input_hash_consistency() {
        let hash1 = hash_input("test input");
        let hash2 = hash_input("test input");
        let hash3 = hash_input("different input");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }
}
