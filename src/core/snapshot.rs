//! Document snapshots supplied by the host at each recovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;

use crate::domain::Chunk;

/// Current text and segmentation of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub document_id: String,
    pub text: String,
    pub chunks: Vec<Chunk>,

    /// Precomputed embedding per chunk id
    #[serde(default)]
    pub chunk_vectors: HashMap<String, Vec<f32>>,
}

impl DocumentSnapshot {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
            chunks,
            chunk_vectors: HashMap::new(),
        }
    }

    pub fn with_vector(mut self, chunk_id: impl Into<String>, vector: Vec<f32>) -> Self {
        self.chunk_vectors.insert(chunk_id.into(), vector);
        self
    }
}

/// Source of fresh document snapshots
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn snapshot(&self, document_id: &str) -> Result<DocumentSnapshot>;
}

/// Reads `<root>/<document_id>.json`
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Source rooted at the configured snapshot directory
    pub fn from_config() -> Result<Self> {
        Ok(Self::new(crate::config::snapshots_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a snapshot where `snapshot()` will find it
    pub async fn save(&self, snapshot: &DocumentSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create snapshot directory: {}", self.root.display()))?;
        let path = self.root.join(format!("{}.json", snapshot.document_id));
        let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        Ok(path)
    }
}

#[async_trait]
impl DocumentSource for SnapshotDir {
    async fn snapshot(&self, document_id: &str) -> Result<DocumentSnapshot> {
        let path = self.root.join(format!("{}.json", document_id));
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        let snapshot: DocumentSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;

        if snapshot.document_id != document_id {
            anyhow::bail!(
                "Snapshot {} belongs to document '{}', expected '{}'",
                path.display(),
                snapshot.document_id,
                document_id
            );
        }
        Ok(snapshot)
    }
}

/// In-process snapshot source
#[derive(Debug, Default)]
pub struct MemoryDocumentSource {
    snapshots: RwLock<HashMap<String, DocumentSnapshot>>,
}

impl MemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot of a document
    pub async fn insert(&self, snapshot: DocumentSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.document_id.clone(), snapshot);
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn snapshot(&self, document_id: &str) -> Result<DocumentSnapshot> {
        self.snapshots
            .read()
            .await
            .get(document_id)
            .cloned()
            .with_context(|| format!("No snapshot for document '{}'", document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_dir_round_trip() {
        let temp = TempDir::new().unwrap();
        let source = SnapshotDir::new(temp.path());
        let snapshot = DocumentSnapshot::new("doc-1", "Hello world", vec![Chunk::new("c0", 0, 11)])
            .with_vector("c0", vec![1.0, 0.0]);

        let path = source.save(&snapshot).await.unwrap();
        assert!(path.ends_with("doc-1.json"));
        assert_eq!(source.snapshot("doc-1").await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_snapshot_dir_missing_document() {
        let temp = TempDir::new().unwrap();
        let source = SnapshotDir::new(temp.path());
        let err = source.snapshot("nope").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read snapshot"));
    }

    #[tokio::test]
    async fn test_snapshot_without_vectors_parses() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("doc-2.json"),
            r#"{"document_id":"doc-2","text":"abc","chunks":[{"id":"c0","char_start":0,"char_end":3}]}"#,
        )
        .unwrap();
        let snapshot = SnapshotDir::new(temp.path()).snapshot("doc-2").await.unwrap();
        assert!(snapshot.chunk_vectors.is_empty());
        assert_eq!(snapshot.chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryDocumentSource::new();
        source.insert(DocumentSnapshot::new("doc-1", "abc", vec![])).await;
        assert_eq!(source.snapshot("doc-1").await.unwrap().text, "abc");
        assert!(source.snapshot("doc-2").await.is_err());
    }
}
