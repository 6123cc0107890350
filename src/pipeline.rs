//! Pipeline orchestration.
//!
//! [`Pipeline`] owns the long-lived Embedder, Vector Index and Generator
//! clients (constructed once, shared by every request) and sequences the
//! two request paths:
//!
//! ```text
//! ingest:  Received → Chunked → Embedded → Indexed → Done
//! query:   Received → Retrieved → Synthesized → Done
//! ```
//!
//! Any collaborator failure ends the request in `Failed(stage)` and is
//! returned as a [`PipelineError`] naming that stage. An ingestion is
//! reported as indexed only when every record of the document was written.
//!
//! Requests share no mutable state, so a `Pipeline` can serve any number of
//! concurrent requests through `&self`. Concurrent ingestions of the *same*
//! document id may interleave their writes; callers that need exact
//! last-writer-wins semantics must serialize them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use ragline_core::chunk::chunk_text;
use ragline_core::embedding::{check_dims, Embedder};
use ragline_core::error::Error;
use ragline_core::generate::Generator;
use ragline_core::index::VectorIndex;
use ragline_core::models::{Answer, Document, IndexRecord, RetrievalResult, SourceMetadata};
use ragline_core::retrieve::Retriever;
use ragline_core::synthesize::Synthesizer;

use crate::config::{Config, OnExisting};
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::index::open_index;
use crate::timeout::{TimeoutEmbedder, TimeoutGenerator, TimeoutIndex};

/// The pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Chunking,
    Embedding,
    Indexing,
    Retrieval,
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
            Stage::Indexing => "indexing",
            Stage::Retrieval => "retrieval",
            Stage::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// A failed request: the stage that failed plus the underlying error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {}", .source.message())]
pub struct PipelineError {
    pub stage: Stage,
    pub source: Error,
}

impl PipelineError {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    /// Taxonomy name of the underlying error (e.g. `"ProviderError"`).
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}

/// Attach a stage to a core result.
trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> AtStage<T> for ragline_core::Result<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestState {
    Received,
    Chunked,
    Embedded,
    Indexed,
    Done,
    Failed(Stage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryState {
    Received,
    Retrieved,
    Synthesized,
    Done,
    Failed(Stage),
}

/// Records and logs the transitions of one request.
struct Trail<S> {
    request: &'static str,
    states: Vec<S>,
}

impl<S: Copy + fmt::Debug> Trail<S> {
    fn start(request: &'static str, initial: S) -> Self {
        tracing::debug!(request, state = ?initial, "request state");
        Self {
            request,
            states: vec![initial],
        }
    }

    fn advance(&mut self, next: S) {
        tracing::debug!(request = self.request, state = ?next, "request state");
        self.states.push(next);
    }
}

impl Trail<IngestState> {
    fn fail(&mut self, err: PipelineError) -> PipelineError {
        self.advance(IngestState::Failed(err.stage));
        tracing::warn!(request = self.request, stage = %err.stage, kind = err.kind(), "{}", err);
        err
    }
}

impl Trail<QueryState> {
    fn fail(&mut self, err: PipelineError) -> PipelineError {
        self.advance(QueryState::Failed(err.stage));
        tracing::warn!(request = self.request, stage = %err.stage, kind = err.kind(), "{}", err);
        err
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks: usize,
    pub records_written: usize,
    /// Previous records of the document that the new version replaced.
    /// `None` in append mode or when the backend does not report a count.
    pub replaced: Option<usize>,
    pub states: Vec<IngestState>,
}

/// Index and embedder health, as reported by `ragline check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub embedding_model: String,
    pub configured_dims: usize,
    pub probed_dims: usize,
    pub index_backend: String,
    pub records: usize,
}

impl Diagnostics {
    pub fn dims_match(&self) -> bool {
        self.configured_dims == self.probed_dims
    }
}

/// Request-independent knobs, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: i64,
    pub embedding_dims: usize,
    pub batch_size: usize,
    pub not_found_message: String,
    pub on_existing: OnExisting,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            top_k: config.retrieval.top_k,
            embedding_dims: config.embedding.dims(),
            batch_size: config.embedding.batch_size.max(1),
            not_found_message: config.answer.not_found_message.clone(),
            on_existing: config.ingest.on_existing,
        }
    }
}

pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Assemble a pipeline from already-constructed clients.
    ///
    /// Fails with [`Error::Configuration`] when the embedder's dimension
    /// differs from `settings.embedding_dims`.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> ragline_core::Result<Self> {
        if embedder.dims() != settings.embedding_dims {
            return Err(Error::configuration(format!(
                "embedder '{}' produces {} dimensions but the index is configured for {}",
                embedder.model_name(),
                embedder.dims(),
                settings.embedding_dims
            )));
        }
        ragline_core::chunk::validate_params(settings.chunk_size, settings.chunk_overlap)?;
        ragline_core::index::validate_k(settings.top_k)?;

        Ok(Self {
            embedder,
            index,
            generator,
            settings,
        })
    }

    /// Build every client from configuration, each wrapped in its per-call
    /// timeout.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let index = open_index(&config.index).await?;
        let generator = create_generator(&config.generation)?;

        tracing::info!(
            embedding_model = embedder.model_name(),
            generation_model = generator.model_name(),
            index_backend = index.backend(),
            "pipeline ready"
        );

        let embedder = Arc::new(TimeoutEmbedder::new(
            embedder,
            Duration::from_secs(config.embedding.timeout_secs),
        ));
        let index = Arc::new(TimeoutIndex::new(
            index,
            Duration::from_secs(config.index.timeout_secs),
        ));
        let generator = Arc::new(TimeoutGenerator::new(
            generator,
            Duration::from_secs(config.generation.timeout_secs),
        ));

        Ok(Self::new(
            embedder,
            index,
            generator,
            PipelineSettings::from_config(config),
        )?)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Chunk, embed and index one document.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport, PipelineError> {
        let mut trail = Trail::start("ingest", IngestState::Received);
        match self.run_ingest(document, &mut trail).await {
            Ok(mut report) => {
                trail.advance(IngestState::Done);
                report.states = trail.states;
                tracing::info!(
                    document_id = %report.document_id,
                    chunks = report.chunks,
                    records = report.records_written,
                    "document indexed"
                );
                Ok(report)
            }
            Err(e) => Err(trail.fail(e)),
        }
    }

    async fn run_ingest(
        &self,
        document: &Document,
        trail: &mut Trail<IngestState>,
    ) -> Result<IngestReport, PipelineError> {
        if document.text.trim().is_empty() {
            return Err(PipelineError::new(
                Stage::Chunking,
                Error::empty_input(format!("document '{}' has no text", document.id)),
            ));
        }

        let chunks = chunk_text(
            &document.id,
            &document.text,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )
        .at(Stage::Chunking)?;
        trail.advance(IngestState::Chunked);

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.settings.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = self.embedder.embed_many(&texts).await.at(Stage::Embedding)?;
            if batch_vectors.len() != texts.len() {
                return Err(PipelineError::new(
                    Stage::Embedding,
                    Error::provider(format!(
                        "embedder returned {} vectors for {} chunks",
                        batch_vectors.len(),
                        texts.len()
                    )),
                ));
            }
            vectors.extend(batch_vectors);
        }
        trail.advance(IngestState::Embedded);

        // Guard before any index call so a mismatched model never writes.
        check_dims(&vectors, self.settings.embedding_dims).at(Stage::Indexing)?;

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let replace = self.settings.on_existing == OnExisting::Replace;
        let records: Vec<IndexRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut metadata = SourceMetadata::for_chunk(chunk);
                metadata.ingested_at = Some(ingested_at.clone());
                IndexRecord {
                    id: replace.then(|| chunk.id.clone()),
                    vector,
                    text: chunk.text.clone(),
                    metadata,
                }
            })
            .collect();

        // Replace mode swaps the document in one index call, so a failed
        // write leaves the previous version in place.
        let (written, replaced) = if replace {
            let outcome = self
                .index
                .replace_document(&document.id, &records)
                .await
                .at(Stage::Indexing)?;
            (outcome.written, outcome.removed)
        } else {
            let written = self.index.upsert(&records).await.at(Stage::Indexing)?;
            (written, None)
        };

        if written != records.len() {
            return Err(PipelineError::new(
                Stage::Indexing,
                Error::provider(format!(
                    "index wrote {} of {} records for '{}'",
                    written,
                    records.len(),
                    document.id
                )),
            ));
        }
        trail.advance(IngestState::Indexed);

        Ok(IngestReport {
            document_id: document.id.clone(),
            chunks: chunks.len(),
            records_written: written,
            replaced,
            states: Vec::new(),
        })
    }

    /// Retrieval only. `k` defaults to the configured `top_k`.
    pub async fn retrieve(
        &self,
        question: &str,
        k: Option<i64>,
    ) -> Result<RetrievalResult, PipelineError> {
        let k = k.unwrap_or(self.settings.top_k);
        Retriever::new(self.embedder.as_ref(), self.index.as_ref())
            .retrieve(question, k)
            .await
            .at(Stage::Retrieval)
    }

    /// Full query path: retrieve, then synthesize a grounded answer.
    pub async fn ask(&self, question: &str, k: Option<i64>) -> Result<Answer, PipelineError> {
        let (answer, _) = self.ask_traced(question, k).await?;
        Ok(answer)
    }

    /// Like [`Pipeline::ask`], also returning the state trail.
    pub async fn ask_traced(
        &self,
        question: &str,
        k: Option<i64>,
    ) -> Result<(Answer, Vec<QueryState>), PipelineError> {
        let mut trail = Trail::start("query", QueryState::Received);

        let retrieval = match self.retrieve(question, k).await {
            Ok(r) => r,
            Err(e) => return Err(trail.fail(e)),
        };
        trail.advance(QueryState::Retrieved);
        tracing::info!(k = k.unwrap_or(self.settings.top_k), passages = retrieval.len(), "retrieved");

        let answer = match Synthesizer::new(self.generator.as_ref(), &self.settings.not_found_message)
            .synthesize(question, retrieval)
            .await
            .at(Stage::Synthesis)
        {
            Ok(a) => a,
            Err(e) => return Err(trail.fail(e)),
        };
        trail.advance(QueryState::Synthesized);
        trail.advance(QueryState::Done);

        tracing::info!(found = answer.found, "answered");
        Ok((answer, trail.states))
    }

    /// Remove every record of `document_id` from the index.
    pub async fn purge(&self, document_id: &str) -> Result<Option<usize>, PipelineError> {
        if document_id.trim().is_empty() {
            return Err(PipelineError::new(
                Stage::Indexing,
                Error::empty_input("document id is empty"),
            ));
        }
        let removed = self
            .index
            .delete_document(document_id)
            .await
            .at(Stage::Indexing)?;
        tracing::info!(document_id, removed = ?removed, "document purged");
        Ok(removed)
    }

    /// Probe the embedder's real output dimension and count index records.
    pub async fn diagnose(&self) -> Result<Diagnostics, PipelineError> {
        let probe = self
            .embedder
            .embed("dimension probe")
            .await
            .at(Stage::Embedding)?;
        let records = self.index.count().await.at(Stage::Indexing)?;

        Ok(Diagnostics {
            embedding_model: self.embedder.model_name().to_string(),
            configured_dims: self.settings.embedding_dims,
            probed_dims: probe.len(),
            index_backend: self.index.backend().to_string(),
            records,
        })
    }
}
