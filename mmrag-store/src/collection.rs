//! Persistent collection: one vector index plus row-aligned entry metadata
//!
//! Row `i` of the index always belongs to `entries[i]`. Both halves are
//! written to `<persist_dir>/<name>_index.bin` and
//! `<persist_dir>/<name>_metadata.json`, index first.

use crate::embedder::Embedder;
use crate::error::{Result, StoreError};
use crate::metadata::{EntryMetadata, MetadataFilter};
use crate::vector_index::VectorIndex;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const METADATA_FORMAT_VERSION: u32 = 1;

/// One stored chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub document: String,
    pub metadata: EntryMetadata,
}

/// A ranked query hit
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: EntryMetadata,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
}

/// Query hits, closest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn documents(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.document.as_str()).collect()
    }

    pub fn distances(&self) -> Vec<f32> {
        self.hits.iter().map(|h| h.distance).collect()
    }
}

/// Collection statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub entries: usize,
    pub sources: usize,
    pub dimension: usize,
}

/// A named vector collection persisted to disk
pub struct CollectionStore {
    name: String,
    persist_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
    entries: Vec<Entry>,
}

impl CollectionStore {
    /// Open the collection `name` under `persist_dir`.
    ///
    /// Never fails: missing or unreadable files leave the collection empty,
    /// and the problem is logged.
    pub fn open(
        name: impl Into<String>,
        persist_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let dimension = embedder.dimension();
        let mut store = Self {
            name: name.into(),
            persist_dir: persist_dir.into(),
            embedder,
            index: VectorIndex::new(dimension),
            entries: Vec::new(),
        };

        match store.load() {
            Ok(true) => info!(
                "Loaded collection '{}' with {} entries",
                store.name,
                store.entries.len()
            ),
            Ok(false) => info!("Created new collection '{}'", store.name),
            Err(e) => {
                warn!(
                    "Failed to load collection '{}': {}, starting empty",
                    store.name, e
                );
                store.index = VectorIndex::new(dimension);
                store.entries.clear();
            }
        }

        store
    }

    /// Load persisted state. Returns `Ok(false)` when nothing was persisted yet.
    fn load(&mut self) -> Result<bool> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();

        match (index_path.exists(), metadata_path.exists()) {
            (false, false) => return Ok(false),
            (true, false) => {
                return Err(StoreError::index_load(&metadata_path, "metadata file missing"))
            }
            (false, true) => {
                return Err(StoreError::index_load(&index_path, "index file missing"))
            }
            (true, true) => {}
        }

        let mut index = VectorIndex::load(&index_path)?;
        if index.dimension() != self.index.dimension() {
            return Err(StoreError::index_load(
                &index_path,
                format!(
                    "stored dimension {} does not match embedder dimension {}",
                    index.dimension(),
                    self.index.dimension()
                ),
            ));
        }

        let file = File::open(&metadata_path).map_err(|e| StoreError::index_load(&metadata_path, e))?;
        let metadata: MetadataFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::index_load(&metadata_path, e))?;

        if metadata.format_version != METADATA_FORMAT_VERSION {
            return Err(StoreError::index_load(
                &metadata_path,
                format!("unsupported format version {}", metadata.format_version),
            ));
        }

        let rows = metadata.ids.len();
        if metadata.documents.len() != rows || metadata.metadatas.len() != rows {
            return Err(StoreError::index_load(
                &metadata_path,
                format!(
                    "ragged metadata: {} ids, {} documents, {} metadatas",
                    rows,
                    metadata.documents.len(),
                    metadata.metadatas.len()
                ),
            ));
        }

        if index.len() < rows {
            return Err(StoreError::index_load(
                &index_path,
                format!("index has {} rows but metadata has {} entries", index.len(), rows),
            ));
        }
        if index.len() > rows {
            // Index was persisted but the metadata write never landed.
            // Rows are append-only, so the first `rows` still line up.
            warn!(
                "Collection '{}': index has {} rows but metadata has {} entries, truncating index",
                self.name,
                index.len(),
                rows
            );
            index.truncate(rows);
        }

        self.entries = metadata
            .ids
            .into_iter()
            .zip(metadata.documents)
            .zip(metadata.metadatas)
            .map(|((id, document), metadata)| Entry {
                id,
                document,
                metadata,
            })
            .collect();
        self.index = index;

        Ok(true)
    }

    /// Write the index file, then the metadata file.
    fn persist(&self) -> Result<()> {
        std::fs::create_dir_all(&self.persist_dir)
            .map_err(|e| StoreError::index_write(&self.persist_dir, e))?;

        let index_path = self.index_path();
        self.index.save(&index_path)?;
        debug!(
            "Index saved: {:?} ({} rows)",
            index_path,
            self.index.len()
        );

        let metadata_path = self.metadata_path();
        let data = MetadataFileRef {
            format_version: METADATA_FORMAT_VERSION,
            ids: self.entries.iter().map(|e| e.id.as_str()).collect(),
            documents: self.entries.iter().map(|e| e.document.as_str()).collect(),
            metadatas: self.entries.iter().map(|e| &e.metadata).collect(),
        };

        let tmp_path = metadata_path.with_extension("tmp");
        {
            let file =
                File::create(&tmp_path).map_err(|e| StoreError::index_write(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &data)
                .map_err(|e| StoreError::index_write(&tmp_path, e))?;
            writer
                .flush()
                .map_err(|e| StoreError::index_write(&tmp_path, e))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| StoreError::index_write(&tmp_path, e))?;
        }
        std::fs::rename(&tmp_path, &metadata_path)
            .map_err(|e| StoreError::index_write(&metadata_path, e))?;
        debug!(
            "Metadata saved: {:?} ({} entries)",
            metadata_path,
            self.entries.len()
        );

        Ok(())
    }

    /// Whether any entry carries `source` in its metadata
    pub fn exists_for_source(&self, source: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.metadata.source.as_deref() == Some(source))
    }

    /// Embed and append a batch of documents, then persist.
    ///
    /// All three vectors must have the same length. Ids must be new. The
    /// documents are embedded with a single embedder call. If embedding,
    /// insertion or persistence fails, the collection is left as it was.
    pub fn add(
        &mut self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<EntryMetadata>,
    ) -> Result<()> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(StoreError::InvalidBatch(format!(
                "{} ids, {} documents, {} metadatas",
                ids.len(),
                documents.len(),
                metadatas.len()
            )));
        }

        if documents.is_empty() {
            warn!("No documents to add to '{}'", self.name);
            return Ok(());
        }

        if self.index.dimension() == 0 {
            return Err(StoreError::Config(format!(
                "collection '{}' has a zero-dimension embedder",
                self.name
            )));
        }

        let mut seen: HashSet<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
        if let Some(dup) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(StoreError::InvalidBatch(format!("duplicate id '{}'", dup)));
        }

        debug!(
            "Adding {} documents to '{}' (current size {})",
            documents.len(),
            self.name,
            self.entries.len()
        );

        let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&texts).map_err(as_embedding_error)?;
        if vectors.len() != documents.len() {
            return Err(StoreError::Embedding(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        let rows_before = self.entries.len();
        self.index
            .add(&vectors)
            .map_err(|e| StoreError::index_write(self.index_path(), e))?;

        self.entries.extend(
            ids.into_iter()
                .zip(documents)
                .zip(metadatas)
                .map(|((id, document), metadata)| Entry {
                    id,
                    document,
                    metadata,
                }),
        );

        if let Err(e) = self.persist() {
            warn!(
                "Failed to persist collection '{}': {}, rolling back",
                self.name, e
            );
            self.index.truncate(rows_before);
            self.entries.truncate(rows_before);
            return Err(e);
        }

        info!(
            "Collection '{}' now holds {} entries",
            self.name,
            self.entries.len()
        );
        Ok(())
    }

    /// All entries matching `filter`, in insertion order
    pub fn get(&self, filter: &MetadataFilter) -> Vec<Entry> {
        self.entries
            .iter()
            .filter(|e| filter.matches(&e.metadata))
            .cloned()
            .collect()
    }

    /// Embed `query_text` and return the `n_results` closest entries
    pub fn query(&self, query_text: &str, n_results: usize) -> Result<QueryResult> {
        if self.entries.is_empty() || n_results == 0 {
            debug!("Query on empty collection '{}'", self.name);
            return Ok(QueryResult::default());
        }

        let vector = self.embedder.embed(query_text).map_err(as_embedding_error)?;
        self.query_vector(&vector, n_results)
    }

    /// Return the `n_results` entries closest to `vector`
    pub fn query_vector(&self, vector: &[f32], n_results: usize) -> Result<QueryResult> {
        let k = n_results.min(self.entries.len());
        let neighbors = self.index.search(vector, k)?;

        let hits = neighbors
            .into_iter()
            .filter_map(|n| {
                self.entries.get(n.row).map(|entry| QueryHit {
                    id: entry.id.clone(),
                    document: entry.document.clone(),
                    metadata: entry.metadata.clone(),
                    distance: n.distance,
                })
            })
            .collect();

        Ok(QueryResult { hits })
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Distinct sources, in the order they were first stored
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter_map(|e| e.metadata.source.as_deref())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            name: self.name.clone(),
            entries: self.entries.len(),
            sources: self.sources().len(),
            dimension: self.index.dimension(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.persist_dir.join(format!("{}_index.bin", self.name))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.persist_dir.join(format!("{}_metadata.json", self.name))
    }
}

fn as_embedding_error(e: StoreError) -> StoreError {
    match e {
        StoreError::Embedding(_) => e,
        other => StoreError::Embedding(other.to_string()),
    }
}

#[derive(Serialize)]
struct MetadataFileRef<'a> {
    format_version: u32,
    ids: Vec<&'a str>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a EntryMetadata>,
}

#[derive(Deserialize)]
struct MetadataFile {
    format_version: u32,
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<EntryMetadata>,
}
