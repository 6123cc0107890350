//! # ragline
//!
//! Retrieval-augmented question answering over a document collection.
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! vector index; questions are embedded, matched against the index, and
//! answered by a generative model constrained to the retrieved passages.
//!
//! ```text
//! ingest:  Document ──▶ Chunker ──▶ Embedder ──▶ Vector Index
//! query:   Question ──▶ Retriever ──▶ Answer Synthesizer ──▶ Answer
//! ```
//!
//! The provider-independent pieces (data model, chunker, traits, retriever,
//! prompt, synthesizer) live in `ragline-core`. This crate adds the
//! concrete clients and the orchestrator that owns them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`extract`] | PDF / DOCX / text document loading |
//! | [`http`] | Shared HTTP client settings and retry policy |
//! | [`embedding`] | Gemini, OpenAI and Ollama embedders |
//! | [`generation`] | Gemini, OpenAI and Ollama generators |
//! | [`index`] | Vector index backend selection |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`pinecone`] | Pinecone vector index |
//! | [`timeout`] | Per-call timeout wrappers |
//! | [`pipeline`] | Ingestion and query orchestration |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod index;
pub mod logging;
pub mod migrate;
pub mod pinecone;
pub mod pipeline;
pub mod sqlite_index;
pub mod timeout;
