//! Recovery orchestrator.
//!
//! Runs one batch per document against a fresh snapshot. Every anchor is
//! located, classified and written back on its own, so one failing anchor
//! never blocks the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::anchor_store::{AnchorStore, JsonAnchorStore};
use super::recovery_log::{generate_recovery_key, RecoveryLog};
use super::snapshot::{DocumentSnapshot, DocumentSource, SnapshotDir};
use crate::adapters::{EmbeddingError, EmbeddingService, HttpEmbeddingClient};
use crate::bridge::CoordinateBridge;
use crate::config::ResolvedConfig;
use crate::domain::{Anchor, CharRange, RecoveryEvent, RecoveryEventType, RecoveryMethod, Span};
use crate::error::AnchorError;
use crate::matching::{cosine_similarity, DocumentIndex, TieredMatcher};

/// Classification thresholds and batch limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Text confidence at or above which an anchor is recovered
    pub recovered_threshold: f64,
    /// Text confidence at or above which an anchor goes to review
    pub review_threshold: f64,
    /// Cosine similarity strictly above which a semantic match is recovered
    pub semantic_recovered_threshold: f64,
    pub semantic_review_threshold: f64,
    /// Anchors processed concurrently within a batch
    pub max_parallel: usize,
    pub embedding_timeout_ms: u64,
    /// Chars of the retained chunk excerpt used in the semantic query
    pub excerpt_chars: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            recovered_threshold: 0.85,
            review_threshold: 0.70,
            semantic_recovered_threshold: 0.85,
            semantic_review_threshold: 0.70,
            max_parallel: 8,
            embedding_timeout_ms: 5000,
            excerpt_chars: 500,
        }
    }
}

impl RecoveryConfig {
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }
}

/// Per-invocation options
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverOptions {
    /// Recompute anchors already recovered against this snapshot
    pub force: bool,
}

/// What happened to one anchor in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Recovered,
    NeedsReview,
    Orphaned,
    /// Already recovered against this snapshot
    Skipped,
    /// Recovery errored; anchor flagged for review with a diagnostic
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Recovered => "recovered",
            Outcome::NeedsReview => "needs_review",
            Outcome::Orphaned => "orphaned",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
        }
    }

    fn event_type(&self) -> RecoveryEventType {
        match self {
            Outcome::Recovered => RecoveryEventType::AnchorRecovered,
            Outcome::NeedsReview => RecoveryEventType::AnchorFlagged,
            Outcome::Orphaned => RecoveryEventType::AnchorOrphaned,
            Outcome::Skipped => RecoveryEventType::AnchorSkipped,
            Outcome::Failed => RecoveryEventType::AnchorFailed,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of one anchor in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorOutcome {
    pub anchor_id: Uuid,
    pub outcome: Outcome,
    pub method: RecoveryMethod,
    pub confidence: f64,
    pub char_range: Option<CharRange>,
    pub reason: Option<String>,
}

impl AnchorOutcome {
    fn from_anchor(anchor: &Anchor, outcome: Outcome) -> Self {
        Self {
            anchor_id: anchor.id,
            outcome,
            method: anchor.recovery_method,
            confidence: anchor.recovery_confidence,
            char_range: anchor.current_char_range,
            reason: anchor.review_reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub recovered: usize,
    pub needs_review: usize,
    pub orphaned: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Summary of one recovery batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub document_id: String,
    /// Fingerprint of the snapshot the batch ran against
    pub snapshot_fingerprint: String,
    /// One entry per anchor, in store order
    pub outcomes: Vec<AnchorOutcome>,
}

impl RecoveryReport {
    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts::default();
        for o in &self.outcomes {
            match o.outcome {
                Outcome::Recovered => counts.recovered += 1,
                Outcome::NeedsReview => counts.needs_review += 1,
                Outcome::Orphaned => counts.orphaned += 1,
                Outcome::Skipped => counts.skipped += 1,
                Outcome::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn get(&self, anchor_id: Uuid) -> Option<&AnchorOutcome> {
        self.outcomes.iter().find(|o| o.anchor_id == anchor_id)
    }
}

/// Location decided for an anchor
#[derive(Debug, Clone)]
enum Placement {
    /// Leave the current location untouched
    Keep,
    Set {
        range: Option<CharRange>,
        chunk_ids: Vec<String>,
    },
}

/// Classification of one anchor, applied to the record before writing
#[derive(Debug, Clone)]
struct Decision {
    outcome: Outcome,
    placement: Placement,
    method: Option<RecoveryMethod>,
    confidence: f64,
    reason: Option<String>,
    /// Final for this snapshot; degraded results are retried next batch
    settled: bool,
}

impl Decision {
    fn failed(reason: String) -> Self {
        Self {
            outcome: Outcome::Failed,
            placement: Placement::Keep,
            method: None,
            confidence: 0.0,
            reason: Some(reason),
            settled: false,
        }
    }

    fn apply(&self, anchor: &mut Anchor, recovery_key: &str) {
        if let Placement::Set { range, chunk_ids } = &self.placement {
            anchor.current_char_range = *range;
            anchor.current_chunk_ids = chunk_ids.clone();
        }
        if let Some(method) = self.method {
            anchor.recovery_method = method;
        }
        if self.outcome != Outcome::Failed {
            anchor.recovery_confidence = self.confidence;
        }
        anchor.needs_review = self.outcome != Outcome::Recovered;
        anchor.review_reason = self.reason.clone();
        anchor.recovery_key = self.settled.then(|| recovery_key.to_string());
        anchor.touch();
    }
}

/// Combined text-based estimate over all spans of an anchor
#[derive(Debug, Clone)]
struct TextEstimate {
    range: Option<CharRange>,
    chunk_ids: Vec<String>,
    confidence: f64,
    method: RecoveryMethod,
    /// Per-span diagnostics
    summary: String,
}

impl TextEstimate {
    fn placement(&self) -> Placement {
        Placement::Set {
            range: self.range,
            chunk_ids: self.chunk_ids.clone(),
        }
    }
}

/// Locate every span and combine: confidence is the length-weighted mean
/// (unlocated spans count as zero), the range covers every located span and
/// the method is the least precise one used.
fn locate_spans(matcher: &TieredMatcher, index: &DocumentIndex, spans: &[Span]) -> TextEstimate {
    let bridge = CoordinateBridge::new(matcher, index);
    let mut weighted = 0.0;
    let mut total_weight = 0usize;
    let mut range: Option<CharRange> = None;
    let mut method: Option<RecoveryMethod> = None;
    let mut notes = Vec::with_capacity(spans.len());

    for span in spans {
        let (result, span_method) = match (&span.origin_char_range, &span.origin_geometry) {
            (None, Some(geometry)) => (
                bridge.locate_span(span, geometry.page),
                RecoveryMethod::Geometric,
            ),
            _ => {
                let result = matcher.match_span(span, index);
                let method = result.method;
                (result, method)
            }
        };

        let weight = span.char_len().max(1);
        total_weight += weight;

        match result.char_range.filter(|_| result.found) {
            Some(found) => {
                weighted += result.confidence * weight as f64;
                range = Some(range.map_or(found, |r| r.cover(&found)));
                method = Some(match method {
                    Some(m) if m.precision_rank() >= span_method.precision_rank() => m,
                    _ => span_method,
                });
                notes.push(format!("{} {:.2}", span_method, result.confidence));
            }
            None => notes.push(format!("lost (best {:.2})", result.best_score())),
        }
    }

    let confidence = if total_weight == 0 {
        0.0
    } else {
        weighted / total_weight as f64
    };
    TextEstimate {
        chunk_ids: range.map(|r| index.chunk_ids_for(&r)).unwrap_or_default(),
        range,
        confidence,
        method: method.unwrap_or(RecoveryMethod::Lost),
        summary: notes.join(", "),
    }
}

/// Best chunk by cosine similarity
#[derive(Debug, Clone, Copy)]
struct SemanticHit {
    chunk_index: usize,
    similarity: f64,
}

/// Read-only state shared by every worker of a batch
struct BatchContext {
    index: DocumentIndex,
    matcher: Arc<TieredMatcher>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    /// Vectors aligned with `index.chunks()`
    chunk_vectors: Vec<Option<Vec<f32>>>,
    config: RecoveryConfig,
}

impl BatchContext {
    async fn semantic_match(&self, anchor: &Anchor) -> Result<SemanticHit, AnchorError> {
        let unavailable = |msg: String| AnchorError::EmbeddingServiceUnavailable(msg);

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| unavailable("no embedding service configured".to_string()))?;
        if self.chunk_vectors.iter().all(Option::is_none) {
            return Err(unavailable("snapshot has no chunk vectors".to_string()));
        }
        let query = anchor.semantic_query(self.config.excerpt_chars);
        if query.is_empty() {
            return Err(unavailable("anchor has no text to embed".to_string()));
        }

        let timeout = self.config.embedding_timeout();
        let vector = tokio::time::timeout(timeout, embedder.embed(&query))
            .await
            .map_err(|_| EmbeddingError::Timeout(timeout))
            .and_then(|r| r)
            .map_err(|e| unavailable(e.to_string()))?;

        let mut best: Option<SemanticHit> = None;
        for (chunk_index, chunk_vector) in self.chunk_vectors.iter().enumerate() {
            let Some(similarity) = chunk_vector
                .as_deref()
                .and_then(|v| cosine_similarity(&vector, v))
            else {
                continue;
            };
            if best.map_or(true, |b| similarity > b.similarity) {
                best = Some(SemanticHit {
                    chunk_index,
                    similarity,
                });
            }
        }

        best.ok_or_else(|| {
            let expected = self
                .chunk_vectors
                .iter()
                .flatten()
                .map(Vec::len)
                .next()
                .unwrap_or_default();
            unavailable(
                EmbeddingError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                }
                .to_string(),
            )
        })
    }
}

/// Locate and classify one anchor
async fn recover_anchor(ctx: Arc<BatchContext>, anchor: Anchor) -> Result<Decision> {
    anchor.validate()?;
    let config = &ctx.config;

    let text = if anchor.has_text_spans() {
        let spans = anchor.spans.clone();
        let worker = Arc::clone(&ctx);
        let estimate = tokio::task::spawn_blocking(move || {
            locate_spans(&worker.matcher, &worker.index, &spans)
        })
        .await
        .context("Text matching task failed")?;
        debug!(anchor_id = %anchor.id, confidence = estimate.confidence, method = %estimate.method, "Text phase finished");
        Some(estimate)
    } else {
        None
    };

    if let Some(estimate) = &text {
        if estimate.confidence >= config.recovered_threshold {
            return Ok(Decision {
                outcome: Outcome::Recovered,
                placement: estimate.placement(),
                method: Some(estimate.method),
                confidence: estimate.confidence,
                reason: None,
                settled: true,
            });
        }
        if estimate.confidence >= config.review_threshold {
            return Ok(Decision {
                outcome: Outcome::NeedsReview,
                placement: estimate.placement(),
                method: Some(estimate.method),
                confidence: estimate.confidence,
                reason: Some(format!(
                    "text confidence {:.2} below {:.2} ({})",
                    estimate.confidence, config.recovered_threshold, estimate.summary
                )),
                settled: true,
            });
        }
    }

    let text_note = text
        .as_ref()
        .map(|t| format!("; text: {}", t.summary))
        .unwrap_or_default();

    match ctx.semantic_match(&anchor).await {
        Ok(hit) => {
            let chunk = &ctx.index.chunks()[hit.chunk_index];
            let located = Placement::Set {
                range: Some(chunk.range()),
                chunk_ids: vec![chunk.id.clone()],
            };
            debug!(anchor_id = %anchor.id, chunk = %chunk.id, similarity = hit.similarity, "Semantic fallback");

            if hit.similarity > config.semantic_recovered_threshold {
                Ok(Decision {
                    outcome: Outcome::Recovered,
                    placement: located,
                    method: Some(RecoveryMethod::Semantic),
                    confidence: hit.similarity,
                    reason: None,
                    settled: true,
                })
            } else if hit.similarity >= config.semantic_review_threshold {
                Ok(Decision {
                    outcome: Outcome::NeedsReview,
                    placement: located,
                    method: Some(RecoveryMethod::Semantic),
                    confidence: hit.similarity,
                    reason: Some(format!(
                        "semantic similarity {:.2} to chunk {}{}",
                        hit.similarity, chunk.id, text_note
                    )),
                    settled: true,
                })
            } else {
                let best_text = text.as_ref().map_or(0.0, |t| t.confidence);
                Ok(Decision {
                    outcome: Outcome::Orphaned,
                    placement: Placement::Set {
                        range: None,
                        chunk_ids: Vec::new(),
                    },
                    method: Some(RecoveryMethod::Orphaned),
                    confidence: best_text.max(hit.similarity),
                    reason: Some(format!(
                        "no chunk reaches similarity {:.2} (best {:.2}){}",
                        config.semantic_review_threshold, hit.similarity, text_note
                    )),
                    settled: true,
                })
            }
        }
        Err(err) => {
            warn!(anchor_id = %anchor.id, error = %err, "Semantic fallback unavailable, using text result");
            match text {
                Some(estimate) => Ok(Decision {
                    outcome: Outcome::Orphaned,
                    placement: Placement::Set {
                        range: None,
                        chunk_ids: Vec::new(),
                    },
                    method: Some(RecoveryMethod::Orphaned),
                    confidence: estimate.confidence,
                    reason: Some(format!("{}{}", err, text_note)),
                    settled: false,
                }),
                // Notes without text keep their location until the service answers
                None => Ok(Decision {
                    outcome: Outcome::NeedsReview,
                    placement: Placement::Keep,
                    method: None,
                    confidence: 0.0,
                    reason: Some(err.to_string()),
                    settled: false,
                }),
            }
        }
    }
}

/// Diagnostic for a worker that panicked or was cancelled
fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        format!("recovery panicked: {}", message)
    } else {
        format!("recovery task cancelled: {}", err)
    }
}

enum Pending {
    Skipped(Anchor),
    Running {
        anchor: Anchor,
        handle: JoinHandle<Result<Decision>>,
    },
}

/// Batch recovery engine
pub struct RecoveryOrchestrator {
    store: Arc<dyn AnchorStore>,
    source: Arc<dyn DocumentSource>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    matcher: Arc<TieredMatcher>,
    config: RecoveryConfig,
    log_dir: Option<PathBuf>,
}

impl RecoveryOrchestrator {
    /// Create an orchestrator with default matcher and thresholds, no
    /// embedding service and no audit log
    pub fn new(store: Arc<dyn AnchorStore>, source: Arc<dyn DocumentSource>) -> Self {
        Self {
            store,
            source,
            embedder: None,
            matcher: Arc::new(TieredMatcher::default()),
            config: RecoveryConfig::default(),
            log_dir: None,
        }
    }

    /// File-backed orchestrator wired from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let embedder = HttpEmbeddingClient::from_config(
            &config.embedding,
            config.recovery.embedding_timeout(),
        );
        Self::new(
            Arc::new(JsonAnchorStore::new(&config.store_dir)),
            Arc::new(SnapshotDir::new(&config.snapshots_dir)),
        )
        .with_embedder(Arc::new(embedder))
        .with_matcher(TieredMatcher::new(config.matching.clone()))
        .with_config(config.recovery.clone())
        .with_log_dir(&config.logs_dir)
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_matcher(mut self, matcher: TieredMatcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn with_config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Append recovery events to `<dir>/<document_id>.jsonl`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Recover every anchor of a document
    pub async fn recover(&self, document_id: &str) -> Result<RecoveryReport> {
        self.recover_with(document_id, RecoverOptions::default()).await
    }

    /// Recover every anchor of a document.
    ///
    /// Fails only when the snapshot or anchors cannot be loaded, or when
    /// the snapshot's chunks violate segmentation invariants. Everything
    /// else is classified per anchor.
    #[instrument(skip(self, options), fields(force = options.force))]
    pub async fn recover_with(
        &self,
        document_id: &str,
        options: RecoverOptions,
    ) -> Result<RecoveryReport> {
        let snapshot = self
            .source
            .snapshot(document_id)
            .await
            .with_context(|| format!("Failed to load snapshot for '{}'", document_id))?;
        let anchors = self
            .store
            .list_for_document(document_id)
            .await
            .with_context(|| format!("Failed to load anchors for '{}'", document_id))?;

        let DocumentSnapshot {
            text,
            chunks,
            mut chunk_vectors,
            ..
        } = snapshot;

        let index = match self.matcher.index(&text, chunks) {
            Ok(index) => index,
            Err(e) => {
                error!(error = %e, "Snapshot rejected");
                return Err(anyhow::Error::new(e)
                    .context(format!("Snapshot of '{}' is inconsistent", document_id)));
            }
        };

        let log = match &self.log_dir {
            Some(dir) => Some(RecoveryLog::open(dir, document_id).await?),
            None => None,
        };
        let fingerprint = index.fingerprint().to_string();
        info!(anchors = anchors.len(), chunks = index.chunks().len(), %fingerprint, "Starting recovery batch");
        append_event(
            log.as_ref(),
            RecoveryEvent::new(
                document_id,
                None,
                RecoveryEventType::BatchStarted,
                format!("{} anchors against snapshot {}", anchors.len(), fingerprint),
            ),
        )
        .await;

        let outcomes = if index.chunks().is_empty() {
            self.flag_empty_candidates(document_id, anchors, log.as_ref())
                .await
        } else {
            let chunk_vectors = index
                .chunks()
                .iter()
                .map(|c| chunk_vectors.remove(&c.id))
                .collect();
            let ctx = Arc::new(BatchContext {
                index,
                matcher: Arc::clone(&self.matcher),
                embedder: self.embedder.clone(),
                chunk_vectors,
                config: self.config.clone(),
            });
            self.run_batch(document_id, ctx, &fingerprint, anchors, options, log.as_ref())
                .await
        };

        let report = RecoveryReport {
            document_id: document_id.to_string(),
            snapshot_fingerprint: fingerprint,
            outcomes,
        };
        let counts = report.counts();
        info!(
            recovered = counts.recovered,
            needs_review = counts.needs_review,
            orphaned = counts.orphaned,
            skipped = counts.skipped,
            failed = counts.failed,
            "Recovery batch completed"
        );
        append_event(
            log.as_ref(),
            RecoveryEvent::new(
                document_id,
                None,
                RecoveryEventType::BatchCompleted,
                format!(
                    "{} recovered, {} needs review, {} orphaned, {} skipped, {} failed",
                    counts.recovered,
                    counts.needs_review,
                    counts.orphaned,
                    counts.skipped,
                    counts.failed
                ),
            ),
        )
        .await;

        Ok(report)
    }

    async fn run_batch(
        &self,
        document_id: &str,
        ctx: Arc<BatchContext>,
        fingerprint: &str,
        anchors: Vec<Anchor>,
        options: RecoverOptions,
        log: Option<&RecoveryLog>,
    ) -> Vec<AnchorOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut pending = Vec::with_capacity(anchors.len());

        for anchor in anchors {
            let key = generate_recovery_key(anchor.id, fingerprint);
            if !options.force && anchor.recovery_key.as_deref() == Some(key.as_str()) {
                pending.push(Pending::Skipped(anchor));
                continue;
            }

            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let task_anchor = anchor.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("Recovery worker pool closed")?;
                recover_anchor(ctx, task_anchor).await
            });
            pending.push(Pending::Running { anchor, handle });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for item in pending {
            let outcome = match item {
                Pending::Skipped(anchor) => {
                    debug!(anchor_id = %anchor.id, "Already recovered against this snapshot");
                    AnchorOutcome::from_anchor(&anchor, Outcome::Skipped)
                }
                Pending::Running { mut anchor, handle } => {
                    let decision = match handle.await {
                        Ok(Ok(decision)) => decision,
                        Ok(Err(e)) => Decision::failed(format!("{:#}", e)),
                        Err(join) => Decision::failed(join_failure(join)),
                    };
                    if decision.outcome == Outcome::Failed {
                        error!(anchor_id = %anchor.id, reason = ?decision.reason, "Anchor recovery failed");
                    }

                    let key = generate_recovery_key(anchor.id, fingerprint);
                    decision.apply(&mut anchor, &key);
                    self.write_anchor(&anchor, decision.outcome).await
                }
            };

            append_event(log, outcome_event(document_id, &outcome)).await;
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Document has no chunks: flag everything, keep locations
    async fn flag_empty_candidates(
        &self,
        document_id: &str,
        anchors: Vec<Anchor>,
        log: Option<&RecoveryLog>,
    ) -> Vec<AnchorOutcome> {
        let reason = AnchorError::EmptyCandidateSet {
            document_id: document_id.to_string(),
        }
        .to_string();
        warn!(anchors = anchors.len(), "{}", reason);

        let mut outcomes = Vec::with_capacity(anchors.len());
        for mut anchor in anchors {
            let decision = Decision {
                outcome: Outcome::NeedsReview,
                placement: Placement::Keep,
                method: None,
                confidence: 0.0,
                reason: Some(reason.clone()),
                settled: false,
            };
            decision.apply(&mut anchor, "");
            let outcome = self.write_anchor(&anchor, decision.outcome).await;
            append_event(log, outcome_event(document_id, &outcome)).await;
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn write_anchor(&self, anchor: &Anchor, outcome: Outcome) -> AnchorOutcome {
        match self.store.put(anchor).await {
            Ok(()) => AnchorOutcome::from_anchor(anchor, outcome),
            Err(e) => {
                error!(anchor_id = %anchor.id, error = %e, "Failed to write anchor");
                AnchorOutcome {
                    outcome: Outcome::Failed,
                    reason: Some(format!("write failed: {:#}", e)),
                    ..AnchorOutcome::from_anchor(anchor, outcome)
                }
            }
        }
    }
}

fn outcome_event(document_id: &str, outcome: &AnchorOutcome) -> RecoveryEvent {
    let summary = match outcome.char_range {
        Some(range) => format!(
            "{} via {} at {}..{} ({:.2})",
            outcome.outcome, outcome.method, range.start, range.end, outcome.confidence
        ),
        None => format!(
            "{} via {} ({:.2})",
            outcome.outcome, outcome.method, outcome.confidence
        ),
    };
    let event = RecoveryEvent::new(
        document_id,
        Some(outcome.anchor_id),
        outcome.outcome.event_type(),
        summary,
    )
    .with_result(outcome.method, outcome.confidence);
    match &outcome.reason {
        Some(reason) => event.with_error(reason.clone()),
        None => event,
    }
}

/// Audit failures never abort a batch
async fn append_event(log: Option<&RecoveryLog>, event: RecoveryEvent) {
    if let Some(log) = log {
        if let Err(e) = log.append(&event).await {
            warn!(error = %e, path = %log.path().display(), "Failed to append recovery event");
        }
    }
}
