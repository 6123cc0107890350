//! Vector index backend selection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use ragline_core::index::memory::InMemoryIndex;
use ragline_core::index::VectorIndex;

use crate::config::IndexConfig;
use crate::http::env_key;
use crate::pinecone::PineconeIndex;
use crate::sqlite_index::SqliteIndex;

/// Construct the configured backend. Called once per process.
///
/// `memory` lives only as long as the process; `sqlite` creates its schema
/// on open; `pinecone` reads `PINECONE_API_KEY`.
pub async fn open_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.backend.as_str() {
        "memory" => Arc::new(InMemoryIndex::new()),
        "sqlite" => Arc::new(SqliteIndex::open(&config.path).await?),
        "pinecone" => {
            let host = match &config.host {
                Some(h) => h,
                None => bail!("index.host must be set when backend is 'pinecone'"),
            };
            let key = env_key("PINECONE_API_KEY");
            if key.is_none() {
                bail!("PINECONE_API_KEY environment variable not set");
            }
            Arc::new(PineconeIndex::new(
                host,
                key,
                config.namespace.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)
        }
        other => bail!("Unknown index backend: {}", other),
    };
    Ok(index)
}
