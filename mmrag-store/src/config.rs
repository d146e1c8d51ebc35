//! Store configuration
//!
//! Defaults can be overridden from a YAML file or from environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `MMRAG_PERSIST_DIR` | `persist_dir` |
//! | `CHUNKING_METHOD` | `chunking_method` (`token`, anything else means characters) |
//! | `MMRAG_CHUNK_SIZE` | `chunk_size` |
//! | `MMRAG_CHUNK_OVERLAP` | `chunk_overlap` |
//! | `MMRAG_TOKENIZER_PATH` | `tokenizer_path` |
//! | `MMRAG_N_RESULTS` | `n_results` |
//! | `MMRAG_KEYWORD_TOP_K` | `keyword_top_k` |

use crate::chunker::{ChunkerConfig, ChunkingMethod};
use crate::error::{Result, StoreError};
use crate::retriever::RetrieverConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration shared by every collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the index and metadata files
    pub persist_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunking_method: ChunkingMethod,
    pub tokenizer_path: PathBuf,
    /// Semantic results per retrieval
    pub n_results: usize,
    /// Lines returned by the keyword fallback
    pub keyword_top_k: usize,
    pub oversample: usize,
    /// Dimension of the embedding model (all-MiniLM-L6-v2: 384)
    pub embedding_dimension: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("vector_db"),
            chunk_size: 1000,
            chunk_overlap: 200,
            chunking_method: ChunkingMethod::Token,
            tokenizer_path: PathBuf::from("models/tokenizer.json"),
            n_results: 5,
            keyword_top_k: 3,
            oversample: 2,
            embedding_dimension: 384,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("MMRAG_PERSIST_DIR") {
            config.persist_dir = PathBuf::from(dir);
        }
        if let Some(method) = lookup("CHUNKING_METHOD") {
            config.chunking_method = ChunkingMethod::parse(&method);
        }
        if let Some(path) = lookup("MMRAG_TOKENIZER_PATH") {
            config.tokenizer_path = PathBuf::from(path);
        }
        parse_var(&lookup, "MMRAG_CHUNK_SIZE", &mut config.chunk_size)?;
        parse_var(&lookup, "MMRAG_CHUNK_OVERLAP", &mut config.chunk_overlap)?;
        parse_var(&lookup, "MMRAG_N_RESULTS", &mut config.n_results)?;
        parse_var(&lookup, "MMRAG_KEYWORD_TOP_K", &mut config.keyword_top_k)?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file; missing fields keep their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml_ng::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker_config().validate()?;
        if self.embedding_dimension == 0 {
            return Err(StoreError::Config(
                "embedding_dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            method: self.chunking_method,
            tokenizer_path: self.tokenizer_path.clone(),
        }
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            keyword_top_k: self.keyword_top_k,
            oversample: self.oversample,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| StoreError::Config(format!("{}={:?}: {}", key, raw, e)))?;
    }
    Ok(())
}
