//! Chunk-and-store entry point with source-level deduplication

use crate::chunker::Chunker;
use crate::collection::CollectionStore;
use crate::error::Result;
use crate::metadata::EntryMetadata;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Result of [`add_text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddOutcome {
    /// The text was chunked and `chunks` entries were stored
    Stored { chunks: usize },
    /// Entries for this source already exist; nothing was stored
    AlreadyExists,
}

impl AddOutcome {
    pub fn chunks_created(&self) -> usize {
        match self {
            Self::Stored { chunks } => *chunks,
            Self::AlreadyExists => 0,
        }
    }

    pub fn already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }
}

/// Split `text` into chunks and store them in `store`.
///
/// When `source` is given and the store already holds entries for it, nothing
/// is stored and [`AddOutcome::AlreadyExists`] is returned. Every chunk gets a
/// fresh UUID v4 id and metadata carrying `source` (or no metadata at all).
/// An empty `source` counts as no source.
pub fn add_text(
    store: &mut CollectionStore,
    chunker: &Chunker,
    text: &str,
    source: Option<&str>,
) -> Result<AddOutcome> {
    let source = source.filter(|s| !s.is_empty());
    if let Some(source) = source {
        if store.exists_for_source(source) {
            info!(
                "Source '{}' already stored in '{}', skipping",
                source,
                store.name()
            );
            return Ok(AddOutcome::AlreadyExists);
        }
    }

    let chunks = chunker.chunk(text);
    if chunks.is_empty() {
        return Ok(AddOutcome::Stored { chunks: 0 });
    }

    let count = chunks.len();
    let ids = chunks.iter().map(|_| Uuid::new_v4().to_string()).collect();
    let metadatas = chunks
        .iter()
        .map(|_| match source {
            Some(source) => EntryMetadata::with_source(source),
            None => EntryMetadata::new(),
        })
        .collect();
    let documents = chunks.into_iter().map(|c| c.text).collect();

    store.add(ids, documents, metadatas)?;

    Ok(AddOutcome::Stored { chunks: count })
}
