//! Hybrid retrieval: semantic search with a keyword-scan fallback
//!
//! Retrieval never fails. Errors from the store or the embedder are logged
//! and reported as [`SearchMethod::Error`] with an empty context, so callers
//! can always fall back to answering without context.

use crate::collection::{CollectionStore, QueryHit};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Which strategy produced a [`Retrieval`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Semantic,
    Keyword,
    None,
    Error,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::None => "none",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context assembled for one query
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub context: String,
    pub method: SearchMethod,
    /// Semantic hits behind `context`, closest first (empty for other methods)
    pub hits: Vec<QueryHit>,
}

impl Retrieval {
    pub(crate) fn empty(method: SearchMethod) -> Self {
        Self {
            context: String::new(),
            method,
            hits: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Lines returned by the keyword fallback (default: 3)
    pub keyword_top_k: usize,
    /// Semantic candidates fetched per requested result (default: 2)
    pub oversample: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            keyword_top_k: 3,
            oversample: 2,
        }
    }
}

/// Hybrid retriever
#[derive(Debug, Clone, Default)]
pub struct HybridRetriever {
    config: RetrieverConfig,
}

impl HybridRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RetrieverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Resolve `query` into a context string
    ///
    /// Semantic results are joined with a blank line. When semantic search
    /// yields nothing and `fallback_text` is given, its best matching lines
    /// are joined with newlines instead.
    pub fn retrieve(
        &self,
        store: &CollectionStore,
        query: &str,
        n_results: usize,
        fallback_text: Option<&str>,
    ) -> Retrieval {
        let count = store.count();
        if count == 0 {
            debug!("Collection '{}' is empty, no context", store.name());
            return Retrieval::empty(SearchMethod::None);
        }

        let candidates = n_results.saturating_mul(self.config.oversample.max(1)).min(count);
        debug!(
            "Semantic search in '{}': '{}' ({} candidates)",
            store.name(),
            query,
            candidates
        );

        let result = match store.query(query, candidates) {
            Ok(result) => result,
            Err(e) => {
                warn!("Retrieval from '{}' failed: {}", store.name(), e);
                return Retrieval::empty(SearchMethod::Error);
            }
        };

        if !result.is_empty() {
            let hits: Vec<QueryHit> = result.hits.into_iter().take(n_results).collect();
            let context = hits
                .iter()
                .map(|h| h.document.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            debug!("Semantic search returned {} documents", hits.len());
            return Retrieval {
                context,
                method: SearchMethod::Semantic,
                hits,
            };
        }

        if let Some(text) = fallback_text {
            let context = keyword_search(text, query, self.config.keyword_top_k);
            if !context.is_empty() {
                debug!("Keyword fallback matched in '{}'", store.name());
                return Retrieval {
                    context,
                    method: SearchMethod::Keyword,
                    hits: Vec::new(),
                };
            }
        }

        Retrieval::empty(SearchMethod::None)
    }
}

/// Rank the lines of `full_text` by how many query tokens they contain
///
/// Matching is case-insensitive substring matching of each whitespace
/// separated query token. Lines with no match are dropped, equal scores keep
/// their original order, and the best `top_k` lines are joined with `\n`.
pub fn keyword_search(full_text: &str, query: &str, top_k: usize) -> String {
    let query = query.to_lowercase();
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.is_empty() || top_k == 0 {
        return String::new();
    }

    let mut scored: Vec<(usize, &str)> = full_text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let lower = line.to_lowercase();
            let score = tokens.iter().filter(|t| lower.contains(*t)).count();
            (score > 0).then_some((score, line))
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(top_k)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntryMetadata;
    use crate::mock::MockEmbedder;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_with(temp: &TempDir, embedder: &Arc<MockEmbedder>, docs: &[&str]) -> CollectionStore {
        let mut store = CollectionStore::open("chat_video_context", temp.path(), embedder.clone());
        if !docs.is_empty() {
            store
                .add(
                    docs.iter().enumerate().map(|(i, _)| format!("id-{}", i)).collect(),
                    docs.iter().map(|d| d.to_string()).collect(),
                    docs.iter().map(|_| EntryMetadata::with_source("clip.mp4")).collect(),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_keyword_search_scenario() {
        let text = "apples are red\nbananas are yellow\ncars are fast";
        let result = keyword_search(text, "apples yellow", 2);
        assert_eq!(result, "apples are red\nbananas are yellow");
    }

    #[test]
    fn test_keyword_search_ranks_by_score() {
        let text = "apple pie recipe\nbanana bread\napple and banana smoothie";
        let result = keyword_search(text, "apple banana", 2);
        assert_eq!(result, "apple and banana smoothie\napple pie recipe");
    }

    #[test]
    fn test_keyword_search_ties_keep_order() {
        let text = "apple pie\nbanana bread\ncherry tart";
        assert_eq!(
            keyword_search(text, "apple banana", 2),
            "apple pie\nbanana bread"
        );
    }

    #[test]
    fn test_keyword_search_is_case_insensitive_substring() {
        let text = "The APPLES are ripe\n\n   \nnothing here";
        assert_eq!(keyword_search(text, "Apple", 3), "The APPLES are ripe");
    }

    #[test]
    fn test_keyword_search_no_matches() {
        assert_eq!(keyword_search("alpha\nbeta", "gamma", 3), "");
        assert_eq!(keyword_search("alpha\nbeta", "   ", 3), "");
        assert_eq!(keyword_search("", "alpha", 3), "");
    }

    #[test]
    fn test_retrieve_empty_collection() {
        let temp = TempDir::new().unwrap();
        let embedder = Arc::new(MockEmbedder::new(32));
        let store = store_with(&temp, &embedder, &[]);

        let retrieval = HybridRetriever::new().retrieve(&store, "anything", 5, None);
        assert_eq!(retrieval.context, "");
        assert_eq!(retrieval.method, SearchMethod::None);

        let retrieval =
            HybridRetriever::new().retrieve(&store, "anything", 5, Some("anything goes"));
        assert_eq!(retrieval.method, SearchMethod::None);
        assert_eq!(embedder.calls(), 0);
    }

    #[test]
    fn test_retrieve_semantic_joins_top_results() {
        let temp = TempDir::new().unwrap();
        let embedder = Arc::new(MockEmbedder::new(1024));
        let store = store_with(
            &temp,
            &embedder,
            &[
                "the speaker talks about rust",
                "a cooking segment",
                "rust compiler internals",
                "weather report",
            ],
        );

        let retrieval = HybridRetriever::new().retrieve(&store, "rust", 2, None);
        assert_eq!(retrieval.method, SearchMethod::Semantic);
        assert_eq!(retrieval.hits.len(), 2);

        let parts: Vec<&str> = retrieval.context.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.contains("rust")));

        for pair in retrieval.hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_retrieve_with_fewer_entries_than_requested() {
        let temp = TempDir::new().unwrap();
        let embedder = Arc::new(MockEmbedder::new(32));
        let store = store_with(&temp, &embedder, &["only entry"]);

        let retrieval = HybridRetriever::new().retrieve(&store, "entry", 5, None);
        assert_eq!(retrieval.method, SearchMethod::Semantic);
        assert_eq!(retrieval.context, "only entry");
    }

    #[test]
    fn test_retrieve_zero_results_uses_keyword_fallback() {
        let temp = TempDir::new().unwrap();
        let embedder = Arc::new(MockEmbedder::new(32));
        let store = store_with(&temp, &embedder, &["stored chunk"]);

        let retriever = HybridRetriever::with_config(RetrieverConfig {
            keyword_top_k: 1,
            oversample: 2,
        });
        let retrieval = retriever.retrieve(
            &store,
            "invoice total",
            0,
            Some("header\ninvoice total: 42\nfooter"),
        );
        assert_eq!(retrieval.method, SearchMethod::Keyword);
        assert_eq!(retrieval.context, "invoice total: 42");

        let retrieval = retriever.retrieve(&store, "invoice", 0, Some("nothing relevant"));
        assert_eq!(retrieval.method, SearchMethod::None);
    }

    #[test]
    fn test_retrieve_embedding_failure_degrades_to_error() {
        let temp = TempDir::new().unwrap();
        let embedder = Arc::new(MockEmbedder::new(32));
        let store = store_with(&temp, &embedder, &["stored chunk"]);

        embedder.set_failing(true);
        let retrieval = HybridRetriever::new().retrieve(&store, "chunk", 3, Some("chunk"));
        assert_eq!(retrieval.method, SearchMethod::Error);
        assert!(retrieval.is_empty());
    }

    #[test]
    fn test_search_method_rendering() {
        assert_eq!(SearchMethod::Semantic.to_string(), "semantic");
        assert_eq!(SearchMethod::None.as_str(), "none");
        assert_eq!(
            serde_json::to_string(&SearchMethod::Keyword).unwrap(),
            "\"keyword\""
        );
        assert_eq!(
            serde_json::from_str::<SearchMethod>("\"error\"").unwrap(),
            SearchMethod::Error
        );
    }
}
