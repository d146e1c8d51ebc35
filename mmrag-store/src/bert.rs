//! Local sentence embeddings with a BERT model (candle)
//!
//! Loads `all-MiniLM-L6-v2` style safetensors weights, runs the encoder, mean
//! pools over the attention mask and optionally L2 normalizes.

use crate::embedder::Embedder;
use crate::error::{Result, StoreError};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use std::path::PathBuf;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer};

/// Configuration for the BERT embedder
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub config_path: PathBuf,
    pub normalize: bool,
    /// Device to use (cpu, cuda, metal, or auto). Default: auto
    pub device: Option<String>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.safetensors"),
            tokenizer_path: PathBuf::from("models/tokenizer.json"),
            config_path: PathBuf::from("models/config.json"),
            normalize: true,
            device: None,
        }
    }
}

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    config: EmbedderConfig,
    device: Device,
    dimension: usize,
}

fn candle_err(stage: &'static str) -> impl Fn(candle_core::Error) -> StoreError {
    move |e| StoreError::Embedding(format!("{} failed: {}", stage, e))
}

impl BertEmbedder {
    pub fn new() -> Result<Self> {
        Self::with_config(EmbedderConfig::default())
    }

    pub fn with_config(config: EmbedderConfig) -> Result<Self> {
        let device = match config.device.as_deref() {
            Some("cpu") => Device::Cpu,
            Some("cuda") => Device::new_cuda(0).map_err(candle_err("CUDA init"))?,
            Some("metal") => Device::new_metal(0).map_err(candle_err("Metal init"))?,
            Some("auto") | None => {
                if candle_core::utils::cuda_is_available() {
                    tracing::info!("Auto-detected CUDA, using GPU");
                    Device::new_cuda(0).map_err(candle_err("CUDA init"))?
                } else if candle_core::utils::metal_is_available() {
                    tracing::info!("Auto-detected Metal, using GPU");
                    Device::new_metal(0).map_err(candle_err("Metal init"))?
                } else {
                    tracing::info!("Using CPU");
                    Device::Cpu
                }
            }
            Some(d) => return Err(StoreError::Config(format!("Unknown device: {}", d))),
        };

        let config_content = std::fs::read_to_string(&config.config_path).map_err(|e| {
            StoreError::Embedding(format!(
                "Failed to read model config {:?}: {}",
                config.config_path, e
            ))
        })?;
        let bert_config: Config = serde_json::from_str(&config_content)
            .map_err(|e| StoreError::Embedding(format!("Failed to parse model config: {}", e)))?;

        // SAFETY: the weights file is only read, and is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                std::slice::from_ref(&config.model_path),
                DType::F32,
                &device,
            )
        }
        .map_err(candle_err("Loading safetensors"))?;

        let model = BertModel::load(vb, &bert_config).map_err(candle_err("Loading BertModel"))?;

        let mut tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| StoreError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        if let Some(pp) = tokenizer.get_padding_mut() {
            pp.strategy = PaddingStrategy::BatchLongest;
        } else {
            tokenizer.with_padding(Some(PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                ..Default::default()
            }));
        }

        let dimension = bert_config.hidden_size;

        Ok(Self {
            model,
            tokenizer,
            config,
            device,
            dimension,
        })
    }

    fn forward(&self, texts: &[&str]) -> Result<Tensor> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| StoreError::Embedding(format!("Tokenization failed: {}", e)))?;

        let token_ids = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_ids(), &self.device))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(candle_err("Tensor creation"))?;
        let token_ids = Tensor::stack(&token_ids, 0).map_err(candle_err("Stack"))?;
        let token_type_ids = token_ids.zeros_like().map_err(candle_err("Zeros like"))?;

        // 1 for real tokens, 0 for padding
        let attention_mask = token_ids
            .ne(0u32)
            .and_then(|m| m.to_dtype(DType::U32))
            .map_err(candle_err("Attention mask"))?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))
            .map_err(candle_err("Model forward"))?;

        // Mean pooling over non-padding positions
        let mask = attention_mask
            .to_dtype(DType::F32)
            .map_err(candle_err("Mask cast"))?;
        let summed = mask
            .unsqueeze(2)
            .and_then(|m| m.broadcast_as(hidden.shape()))
            .and_then(|m| hidden.mul(&m))
            .and_then(|h| h.sum(1))
            .map_err(candle_err("Masked sum"))?;
        let counts = mask
            .sum(1)
            .and_then(|c| c.clamp(1e-9, f32::MAX))
            .and_then(|c| c.unsqueeze(1))
            .and_then(|c| c.broadcast_as(summed.shape()))
            .map_err(candle_err("Mask count"))?;
        let pooled = summed.div(&counts).map_err(candle_err("Mean"))?;

        if !self.config.normalize {
            return Ok(pooled);
        }

        let norm = pooled
            .sqr()
            .and_then(|p| p.sum_keepdim(1))
            .and_then(|p| p.sqrt())
            .and_then(|n| n.broadcast_as(pooled.shape()))
            .map_err(candle_err("Norm"))?;
        pooled.div(&norm).map_err(candle_err("Normalize"))
    }
}

impl Embedder for BertEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(StoreError::Embedding("Cannot embed empty text".to_string()));
        }

        self.forward(texts)?
            .to_vec2::<f32>()
            .map_err(candle_err("To vec2"))
    }
}
