//! Anchor persistence.
//!
//! Writes are per anchor and atomic: a reader sees either the previous
//! record or the new one, never a partial file.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Anchor;

/// Persistence interface for anchors
#[async_trait]
pub trait AnchorStore: Send + Sync {
    /// Anchors of one document, oldest first
    async fn list_for_document(&self, document_id: &str) -> Result<Vec<Anchor>>;

    async fn get(&self, id: Uuid) -> Result<Option<Anchor>>;

    /// Insert or replace one anchor atomically
    async fn put(&self, anchor: &Anchor) -> Result<()>;

    /// Every anchor across documents, oldest first
    async fn list_all(&self) -> Result<Vec<Anchor>>;
}

fn sort_anchors(anchors: &mut [Anchor]) {
    anchors.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Reject ids that would escape the store directory
fn check_document_id(document_id: &str) -> Result<()> {
    if document_id.is_empty()
        || document_id == "."
        || document_id == ".."
        || document_id.contains(['/', '\\'])
    {
        anyhow::bail!("Invalid document id: {:?}", document_id);
    }
    Ok(())
}

/// One pretty-printed JSON file per anchor under `<root>/<document_id>/`
#[derive(Debug, Clone)]
pub struct JsonAnchorStore {
    root: PathBuf,
}

impl JsonAnchorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the configured store directory
    pub fn from_config() -> Result<Self> {
        Ok(Self::new(crate::config::store_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn anchor_path(&self, document_id: &str, id: Uuid) -> PathBuf {
        self.root.join(document_id).join(format!("{}.json", id))
    }

    async fn read_anchor(path: &Path) -> Result<Anchor> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read anchor: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse anchor: {}", path.display()))
    }

    async fn read_dir_anchors(dir: &Path) -> Result<Vec<Anchor>> {
        let mut anchors = Vec::new();
        if !dir.exists() {
            return Ok(anchors);
        }

        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to list anchors: {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                anchors.push(Self::read_anchor(&path).await?);
            }
        }
        Ok(anchors)
    }

    async fn document_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        if !self.root.exists() {
            return Ok(dirs);
        }

        let mut entries = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to list store: {}", self.root.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[async_trait]
impl AnchorStore for JsonAnchorStore {
    async fn list_for_document(&self, document_id: &str) -> Result<Vec<Anchor>> {
        check_document_id(document_id)?;
        let mut anchors = Self::read_dir_anchors(&self.root.join(document_id)).await?;
        sort_anchors(&mut anchors);
        Ok(anchors)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Anchor>> {
        let file_name = format!("{}.json", id);
        for dir in self.document_dirs().await? {
            let path = dir.join(&file_name);
            if path.exists() {
                return Self::read_anchor(&path).await.map(Some);
            }
        }
        Ok(None)
    }

    async fn put(&self, anchor: &Anchor) -> Result<()> {
        check_document_id(&anchor.document_id)?;
        let dir = self.root.join(&anchor.document_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create anchor directory: {}", dir.display()))?;

        let path = self.anchor_path(&anchor.document_id, anchor.id);
        let json = serde_json::to_string_pretty(anchor).context("Failed to serialize anchor")?;

        // Write to a sibling temp file, then rename over the record
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
            tmp.write_all(json.as_bytes())
                .context("Failed to write anchor")?;
            tmp.as_file().sync_all().context("Failed to sync anchor")?;
            tmp.persist(&path)
                .with_context(|| format!("Failed to persist anchor: {}", path.display()))?;
            Ok(())
        })
        .await
        .context("Anchor write task failed")?
    }

    async fn list_all(&self) -> Result<Vec<Anchor>> {
        let mut anchors = Vec::new();
        for dir in self.document_dirs().await? {
            anchors.extend(Self::read_dir_anchors(&dir).await?);
        }
        sort_anchors(&mut anchors);
        Ok(anchors)
    }
}

/// In-process store, mainly for embedding the engine and for tests
#[derive(Debug, Default)]
pub struct MemoryAnchorStore {
    anchors: RwLock<HashMap<Uuid, Anchor>>,
}

impl MemoryAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store
    pub fn with_anchors(anchors: impl IntoIterator<Item = Anchor>) -> Self {
        Self {
            anchors: RwLock::new(anchors.into_iter().map(|a| (a.id, a)).collect()),
        }
    }
}

#[async_trait]
impl AnchorStore for MemoryAnchorStore {
    async fn list_for_document(&self, document_id: &str) -> Result<Vec<Anchor>> {
        let anchors = self.anchors.read().await;
        let mut found: Vec<Anchor> = anchors
            .values()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        sort_anchors(&mut found);
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Anchor>> {
        Ok(self.anchors.read().await.get(&id).cloned())
    }

    async fn put(&self, anchor: &Anchor) -> Result<()> {
        self.anchors.write().await.insert(anchor.id, anchor.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Anchor>> {
        let mut all: Vec<Anchor> = self.anchors.read().await.values().cloned().collect();
        sort_anchors(&mut all);
        Ok(all)
    }
}
