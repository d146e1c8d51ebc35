//! Per-modality collections sharing one embedder and one chunker
//!
//! Each uploaded content type gets its own collection, named
//! `chat_<modality>_context`, persisted side by side in the configured
//! directory. Stores are wrapped in `RwLock`s so concurrent request handlers
//! serialize writers per collection while readers interleave.

use crate::chunker::Chunker;
use crate::collection::{CollectionStats, CollectionStore};
use crate::config::StoreConfig;
use crate::embedder::Embedder;
use crate::error::{Result, StoreError};
use crate::ingest::{add_text, AddOutcome};
use crate::retriever::{HybridRetriever, Retrieval, SearchMethod};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Content type a collection is dedicated to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Video,
    Audio,
    Pdf,
    Image,
}

impl Modality {
    pub const ALL: [Modality; 4] = [Self::Video, Self::Audio, Self::Pdf, Self::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }

    pub fn collection_name(&self) -> String {
        format!("chat_{}_context", self.as_str())
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

/// The set of per-modality collections
pub struct CollectionRegistry {
    config: StoreConfig,
    chunker: Arc<Chunker>,
    retriever: HybridRetriever,
    collections: BTreeMap<Modality, Arc<RwLock<CollectionStore>>>,
}

impl CollectionRegistry {
    /// Open (or create) every modality collection under `config.persist_dir`
    pub fn open(config: StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.embedding_dimension {
            return Err(StoreError::DimensionMismatch {
                expected: config.embedding_dimension,
                actual: embedder.dimension(),
            });
        }

        std::fs::create_dir_all(&config.persist_dir)?;

        let chunker = Arc::new(Chunker::with_config(config.chunker_config())?);
        let retriever = HybridRetriever::with_config(config.retriever_config());

        let collections = Modality::ALL
            .into_iter()
            .map(|modality| {
                let store = CollectionStore::open(
                    modality.collection_name(),
                    config.persist_dir.clone(),
                    Arc::clone(&embedder),
                );
                (modality, Arc::new(RwLock::new(store)))
            })
            .collect();

        info!(
            "Opened {} collections in {:?} (chunking by {})",
            Modality::ALL.len(),
            config.persist_dir,
            chunker.method().as_str()
        );

        Ok(Self {
            config,
            chunker,
            retriever,
            collections,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn chunker(&self) -> &Arc<Chunker> {
        &self.chunker
    }

    /// Shared handle to one collection
    pub fn collection(&self, modality: Modality) -> Result<Arc<RwLock<CollectionStore>>> {
        self.collections
            .get(&modality)
            .cloned()
            .ok_or_else(|| StoreError::UnknownCollection(modality.collection_name()))
    }

    /// Chunk and store extracted text unless `source` was already stored
    pub fn add_text(
        &self,
        modality: Modality,
        text: &str,
        source: Option<&str>,
    ) -> Result<AddOutcome> {
        let collection = self.collection(modality)?;
        let mut store = collection.write();
        add_text(&mut store, &self.chunker, text, source)
    }

    /// Retrieve context for `query` using the configured `n_results`
    pub fn retrieve(
        &self,
        modality: Modality,
        query: &str,
        fallback_text: Option<&str>,
    ) -> Retrieval {
        self.retrieve_n(modality, query, self.config.n_results, fallback_text)
    }

    pub fn retrieve_n(
        &self,
        modality: Modality,
        query: &str,
        n_results: usize,
        fallback_text: Option<&str>,
    ) -> Retrieval {
        match self.collection(modality) {
            Ok(collection) => {
                let store = collection.read();
                self.retriever
                    .retrieve(&store, query, n_results, fallback_text)
            }
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                Retrieval::empty(SearchMethod::Error)
            }
        }
    }

    pub fn stats(&self) -> Vec<CollectionStats> {
        self.collections
            .values()
            .map(|c| c.read().stats())
            .collect()
    }
}
