//! Text chunking for vector embeddings
//!
//! Splits long documents into overlapping windows. Window size and overlap are
//! measured either in tokens (HuggingFace tokenizer) or in characters. Every
//! chunk is an exact substring of the input, so consecutive chunks always
//! share text and together cover the whole document.

use crate::error::{Result, StoreError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[cfg(feature = "tokens")]
use tokenizers::Tokenizer;

/// Unit used to measure chunk size and overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMethod {
    #[default]
    Token,
    Character,
}

impl ChunkingMethod {
    /// `"token"` selects tokens; any other value selects characters
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("token") {
            Self::Token
        } else {
            Self::Character
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Character => "character",
        }
    }
}

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk size in units (default: 1000)
    pub chunk_size: usize,
    /// Units shared by consecutive chunks (default: 200)
    pub chunk_overlap: usize,
    pub method: ChunkingMethod,
    /// Path to tokenizer.json, used by [`ChunkingMethod::Token`]
    pub tokenizer_path: PathBuf,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            method: ChunkingMethod::Token,
            tokenizer_path: PathBuf::from("models/tokenizer.json"),
        }
    }
}

impl ChunkerConfig {
    pub fn characters(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            method: ChunkingMethod::Character,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(StoreError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(StoreError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A chunk of text with its position in the source document
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Sequence number (0-indexed)
    pub seq: usize,
    /// Chunk text, equal to the source chars `start_char..end_char`
    pub text: String,
    /// Start position in original text (in characters)
    pub start_char: usize,
    /// End position in original text (in characters, exclusive)
    pub end_char: usize,
}

enum Measure {
    Characters,
    #[cfg(feature = "tokens")]
    Tokens(Box<Tokenizer>),
}

/// Text chunker for creating overlapping text segments
pub struct Chunker {
    config: ChunkerConfig,
    measure: Measure,
}

impl Chunker {
    /// Create a chunker with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ChunkerConfig::default())
    }

    /// Create a chunker with custom configuration
    ///
    /// Fails only on invalid sizes. An unavailable tokenizer downgrades the
    /// chunker to character measurement.
    pub fn with_config(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;

        let measure = match config.method {
            ChunkingMethod::Character => Measure::Characters,
            ChunkingMethod::Token => Self::token_measure(&config),
        };

        Ok(Self { config, measure })
    }

    #[cfg(feature = "tokens")]
    fn token_measure(config: &ChunkerConfig) -> Measure {
        let loaded = Tokenizer::from_file(&config.tokenizer_path).and_then(|mut tokenizer| {
            // Windows are measured over the whole text, never a truncated or padded prefix
            tokenizer.with_truncation(None)?;
            tokenizer.with_padding(None);
            Ok(tokenizer)
        });

        match loaded {
            Ok(tokenizer) => Measure::Tokens(Box::new(tokenizer)),
            Err(e) => {
                warn!(
                    "Failed to load tokenizer from {:?}: {}. Falling back to character chunking",
                    config.tokenizer_path, e
                );
                Measure::Characters
            }
        }
    }

    #[cfg(not(feature = "tokens"))]
    fn token_measure(_config: &ChunkerConfig) -> Measure {
        warn!("Built without token support, falling back to character chunking");
        Measure::Characters
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// The measure actually in use
    pub fn method(&self) -> ChunkingMethod {
        match self.measure {
            Measure::Characters => ChunkingMethod::Character,
            #[cfg(feature = "tokens")]
            Measure::Tokens(_) => ChunkingMethod::Token,
        }
    }

    /// Chunk a document into overlapping segments
    ///
    /// # Examples
    ///
    /// ```
    /// # use mmrag_store::{Chunker, ChunkerConfig};
    /// let chunker = Chunker::with_config(ChunkerConfig::characters(100, 20))?;
    /// let text = "Long document text. ".repeat(50);
    /// let chunks = chunker.chunk(&text);
    ///
    /// assert!(chunks.len() > 1);
    /// assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
    /// # Ok::<(), mmrag_store::StoreError>(())
    /// ```
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return vec![];
        }

        let chunks = match self.measure {
            Measure::Characters => self.chunk_by_chars(text),
            #[cfg(feature = "tokens")]
            Measure::Tokens(ref tokenizer) => match self.chunk_by_tokens(tokenizer, text) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!("Token chunking failed ({}), falling back to characters", e);
                    self.chunk_by_chars(text)
                }
            },
        };

        debug!(
            "Split {} chars into {} chunks ({})",
            text.chars().count(),
            chunks.len(),
            self.method().as_str()
        );
        chunks
    }

    fn chunk_by_chars(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let offsets = byte_offsets(text);
        let total = chars.len();
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let mut end = (start + size).min(total);
            if end < total {
                // Prefer to cut right after whitespace in the last tenth of the window
                let min_end = (start + overlap + 1).max(end - size / 10);
                end = (min_end..=end)
                    .rev()
                    .find(|&i| chars[i - 1].is_whitespace())
                    .unwrap_or(end);
            }

            chunks.push(Chunk {
                seq: chunks.len(),
                text: text[offsets[start]..offsets[end]].to_string(),
                start_char: start,
                end_char: end,
            });

            if end >= total {
                break;
            }
            start = end - overlap;
        }

        chunks
    }

    #[cfg(feature = "tokens")]
    fn chunk_by_tokens(&self, tokenizer: &Tokenizer, text: &str) -> tokenizers::Result<Vec<Chunk>> {
        let encoding = tokenizer.encode_char_offsets(text, false)?;
        let token_offsets = encoding.get_offsets();
        if token_offsets.is_empty() {
            return Err("tokenizer produced no tokens".into());
        }

        let offsets = byte_offsets(text);
        let total_chars = offsets.len() - 1;
        let total_tokens = token_offsets.len();

        // The last chunk runs to the end of the text, so the tokens must reach it
        let content_end = text.trim_end().chars().count();
        let last_token_end = token_offsets.iter().map(|o| o.1).max().unwrap_or(0);
        if last_token_end < content_end {
            return Err(format!(
                "tokens end at char {} of {}",
                last_token_end, content_end
            )
            .into());
        }
        let stride = self.config.chunk_size - self.config.chunk_overlap;

        let mut chunks = Vec::new();

        // Sliding window over tokens; each chunk runs from its first token up
        // to the first token of the next window so no text is skipped.
        for window_start in (0..total_tokens).step_by(stride) {
            let window_end = (window_start + self.config.chunk_size).min(total_tokens);

            let start_char = if window_start == 0 {
                0
            } else {
                token_offsets[window_start].0.min(total_chars)
            };
            let end_char = if window_end == total_tokens {
                total_chars
            } else {
                token_offsets[window_end].0.clamp(start_char, total_chars)
            };

            chunks.push(Chunk {
                seq: chunks.len(),
                text: text[offsets[start_char]..offsets[end_char]].to_string(),
                start_char,
                end_char,
            });

            if window_end >= total_tokens {
                break;
            }
        }

        Ok(chunks)
    }

    /// Get chunker statistics for a text
    pub fn stats(&self, text: &str) -> ChunkStats {
        let total_chars = text.chars().count();
        let total_units = match self.measure {
            Measure::Characters => total_chars,
            #[cfg(feature = "tokens")]
            Measure::Tokens(ref tokenizer) => tokenizer
                .encode_char_offsets(text, false)
                .map(|enc| enc.get_ids().len())
                .unwrap_or(total_chars),
        };

        let size = self.config.chunk_size;
        let stride = size - self.config.chunk_overlap;
        let estimated_chunks = if text.trim().is_empty() {
            0
        } else if total_units <= size {
            1
        } else {
            1 + (total_units - size).div_ceil(stride)
        };

        ChunkStats {
            method: self.method(),
            total_units,
            total_chars,
            chunk_size: size,
            overlap: self.config.chunk_overlap,
            estimated_chunks,
        }
    }
}

/// Statistics about chunking
#[derive(Debug, Clone)]
pub struct ChunkStats {
    pub method: ChunkingMethod,
    pub total_units: usize,
    pub total_chars: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub estimated_chunks: usize,
}

/// Byte offset of every char, plus `text.len()` as the final entry
fn byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}
