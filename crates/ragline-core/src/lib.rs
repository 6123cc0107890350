//! # ragline core
//!
//! Runtime-free logic for ragline: data models, the error taxonomy,
//! the sliding-window chunker, the client traits consumed by the pipeline
//! (embedder, vector index, generator), retrieval, prompt rendering and
//! grounded answer synthesis.
//!
//! This crate contains no tokio, HTTP, database or filesystem code.
//! Concrete providers and the request orchestrator live in the `ragline`
//! application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod synthesize;

pub use error::{Error, Result};
