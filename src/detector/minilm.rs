//! all-MiniLM-L6-v2 sentence encoder on Candle
//!
//! Weights and tokenizer are fetched from the HuggingFace hub on first use and
//! cached in the hub cache directory (~/.cache/huggingface). Sentence vectors
//! are the attention-masked mean of the token states, L2 normalized.

use super::embedding::{Embedder, Embedding};
use crate::domain::violations::{ModerationError, ModerationResult};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Sentence encoder backed by a BERT checkpoint
pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
}

impl MiniLmEmbedder {
    /// Download (if needed) and load `repo` from the hub
    pub fn from_hub(repo: &str) -> ModerationResult<Self> {
        Self::load(repo).map_err(|e| ModerationError::embedding(format!("{e:#}")))
    }

    fn load(model_name: &str) -> Result<Self> {
        info!("Loading embedding model: {}", model_name);

        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_name.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").context("Failed to download config.json")?;
        let tokenizer_path =
            repo.get("tokenizer.json").context("Failed to download tokenizer.json")?;
        let weights_path =
            repo.get("model.safetensors").context("Failed to download model.safetensors")?;

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(&config_path).context("Failed to read config.json")?,
        )
        .context("Failed to parse config.json")?;
        debug!("Model config: hidden_size={}", config.hidden_size);

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to build BERT model")?;

        info!("Embedding model loaded: {}", model_name);

        Ok(Self { model, tokenizer, device, model_id: model_name.to_string() })
    }

    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut all_input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut all_attention_mask = Vec::with_capacity(texts.len() * max_len);
        let mut all_token_type_ids = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let mut ids = encoding.get_ids().to_vec();
            let mut attention = encoding.get_attention_mask().to_vec();
            let mut type_ids = encoding.get_type_ids().to_vec();

            ids.resize(max_len, 0);
            attention.resize(max_len, 0);
            type_ids.resize(max_len, 0);

            all_input_ids.extend(ids);
            all_attention_mask.extend(attention);
            all_token_type_ids.extend(type_ids);
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(all_input_ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(all_attention_mask, shape, &self.device)?;
        let token_type_ids = Tensor::from_vec(all_token_type_ids, shape, &self.device)?;

        // (batch, seq, hidden)
        let output = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = output.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
        let normalized = pooled.broadcast_div(&norm)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

impl Embedder for MiniLmEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, text: &str) -> ModerationResult<Embedding> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| ModerationError::embedding("model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> ModerationResult<Vec<Embedding>> {
        self.forward_batch(texts)
            .map_err(|e| ModerationError::embedding(format!("{e:#}")))
    }
}
