//! # mmrag-store: Vector Store and Hybrid Retrieval
//!
//! The storage core of a local multi-modal RAG backend. Text extracted from
//! uploaded videos, audio, PDFs and images is chunked, embedded and kept in
//! one persisted collection per content type. Questions are answered with the
//! closest chunks, or with a keyword scan over the raw text when semantic
//! search has nothing to offer.
//!
//! - **Exact search**: squared-L2 nearest neighbors over a flat vector table
//! - **Dedup by source**: re-uploading a file is a no-op
//! - **Crash-tolerant persistence**: atomic file replacement plus load-time
//!   reconciliation of the index and metadata files
//! - **Token or character chunking** with overlapping windows
//!
//! ## Quick Start
//!
//! ```rust
//! use mmrag_store::{add_text, Chunker, ChunkerConfig, CollectionStore, HybridRetriever, SearchMethod};
//! use mmrag_store::mock::MockEmbedder;
//! use std::sync::Arc;
//!
//! # fn main() -> mmrag_store::Result<()> {
//! # let dir = tempfile::tempdir()?;
//! let embedder = Arc::new(MockEmbedder::new(64));
//! let mut store = CollectionStore::open("chat_pdf_context", dir.path(), embedder);
//! let chunker = Chunker::with_config(ChunkerConfig::characters(500, 100))?;
//!
//! let outcome = add_text(&mut store, &chunker, "Revenue grew 12% in Q3.", Some("q3.pdf"))?;
//! assert_eq!(outcome.chunks_created(), 1);
//!
//! // Same source again: nothing is stored
//! assert!(add_text(&mut store, &chunker, "Revenue grew 12% in Q3.", Some("q3.pdf"))?.already_exists());
//!
//! let retrieval = HybridRetriever::new().retrieve(&store, "revenue growth", 5, None);
//! assert_eq!(retrieval.method, SearchMethod::Semantic);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! text ──► Chunker ──► CollectionStore.add ──► Embedder ──► VectorIndex
//!                            │                                  │
//!                            ▼                                  ▼
//!              <name>_metadata.json                  <name>_index.bin
//!
//! query ──► HybridRetriever ──► CollectionStore.query ──► ranked chunks
//!                  └──────► keyword_search(fallback text)
//! ```
//!
//! ## Features
//!
//! - **tokens** (default): token-count chunking with a HuggingFace tokenizer
//! - **bert**: local sentence embeddings via candle
//! - **cuda** / **metal**: GPU acceleration for `bert`

pub mod chunker;
pub mod collection;
pub mod config;
pub mod embedder;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metadata;
pub mod mock;
pub mod registry;
pub mod retriever;
pub mod vector_index;

#[cfg(feature = "bert")]
pub mod bert;

pub use chunker::{Chunk, ChunkStats, Chunker, ChunkerConfig, ChunkingMethod};
pub use collection::{CollectionStats, CollectionStore, Entry, QueryHit, QueryResult};
pub use config::StoreConfig;
pub use embedder::{Embedder, LazyEmbedder};
pub use error::{Result, StoreError};
pub use ingest::{add_text, AddOutcome};
pub use metadata::{EntryMetadata, MetadataFilter};
pub use registry::{CollectionRegistry, Modality};
pub use retriever::{keyword_search, HybridRetriever, Retrieval, RetrieverConfig, SearchMethod};
pub use vector_index::{Neighbor, VectorIndex};

#[cfg(feature = "bert")]
pub use bert::{BertEmbedder, EmbedderConfig};
