//! Embedding model interface
//!
//! The store never computes embeddings itself. It is handed an [`Embedder`]
//! at construction time and calls it once per `add` batch and once per query.

use crate::error::{Result, StoreError};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Produces fixed-dimension vectors for text
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Embedding("embedder returned no vector".to_string()))
    }
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Embedder whose model is loaded on first use
///
/// The dimension is declared up front so collections can be opened before the
/// model exists. The loader runs at most once successfully; a failed load is
/// retried on the next call.
pub struct LazyEmbedder {
    dimension: usize,
    loader: Loader,
    inner: Mutex<Option<Arc<dyn Embedder>>>,
}

impl LazyEmbedder {
    pub fn new<F>(dimension: usize, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        Self {
            dimension,
            loader: Box::new(loader),
            inner: Mutex::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().is_some()
    }

    fn get(&self) -> Result<Arc<dyn Embedder>> {
        let mut inner = self.inner.lock();
        if let Some(ref embedder) = *inner {
            return Ok(Arc::clone(embedder));
        }

        info!("Loading embedding model (dimension {})", self.dimension);
        let embedder = (self.loader)().map_err(|e| match e {
            StoreError::Embedding(_) => e,
            other => StoreError::Embedding(format!("model load failed: {}", other)),
        })?;

        if embedder.dimension() != self.dimension {
            return Err(StoreError::Embedding(format!(
                "loaded model has dimension {}, expected {}",
                embedder.dimension(),
                self.dimension
            )));
        }

        *inner = Some(Arc::clone(&embedder));
        Ok(embedder)
    }
}

impl Embedder for LazyEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.get()?.embed_batch(texts)
    }
}

/// L2 normalize a vector in place; zero vectors are left as is
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
