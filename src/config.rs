//! Captioning model configuration.

use crate::error::{CaptionError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Vision encoder hyperparameters, aligned with ViTConfig in Hugging Face Transformers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Square input resolution (image_size)
    pub image_size: u32,
    /// Input channels (num_channels)
    pub num_channels: u32,
    /// Patch edge length (patch_size)
    pub patch_size: u32,
    /// Encoder embedding dimension (hidden_size)
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            num_channels: 3,
            patch_size: 16,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
        }
    }
}

/// Text decoder hyperparameters, aligned with GPT2Config in Hugging Face Transformers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Default generation step budget
    pub max_length: usize,
    pub vocab_size: usize,
    /// Decoder embedding dimension (n_embd)
    pub n_embd: usize,
    /// Number of decoder layers (n_layer)
    pub n_layer: usize,
    /// Number of attention heads (n_head)
    pub n_head: usize,
    /// Context window length (n_ctx)
    pub n_ctx: usize,
    pub n_positions: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_length: 20,
            vocab_size: 50257,
            n_embd: 768,
            n_layer: 12,
            n_head: 12,
            n_ctx: 1024,
            n_positions: 1024,
        }
    }
}

/// Generation policy. Only greedy decoding is performed; these values are
/// carried through load/save so the document round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub do_sample: bool,
    pub num_beams: usize,
    pub temperature: f64,
    pub top_k: usize,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub length_penalty: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            do_sample: false,
            num_beams: 1,
            temperature: 1.0,
            top_k: 50,
            top_p: 1.0,
            repetition_penalty: 1.0,
            length_penalty: 1.0,
        }
    }
}

/// GPT-2 `<|endoftext|>`, used for BOS, EOS and padding alike.
pub const ENDOFTEXT_ID: u32 = 50256;

/// Full model configuration as stored in `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub encoder: EncoderConfig,
    pub decoder: DecoderConfig,
    pub bos_token_id: u32,
    pub eos_token_id: u32,
    pub pad_token_id: u32,
    pub generation: GenerationConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            decoder: DecoderConfig::default(),
            bos_token_id: ENDOFTEXT_ID,
            eos_token_id: ENDOFTEXT_ID,
            pad_token_id: ENDOFTEXT_ID,
            generation: GenerationConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Load and validate a config document.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            CaptionError::Configuration(format!(
                "caption model config {} not readable ({e}); download the model files first",
                path.display()
            ))
        })?;
        let config = Self::from_slice(&bytes).map_err(|e| match e {
            CaptionError::Configuration(msg) => {
                CaptionError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate a config document from raw JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let config: ModelConfig = serde_json::from_slice(bytes)
            .map_err(|e| CaptionError::Configuration(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the document pretty-printed, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CaptionError::Configuration(format!("serialize config: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject geometry the decode loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let dec = &self.decoder;
        if dec.n_layer == 0 {
            return Err(CaptionError::Configuration("decoder.n_layer must be > 0".into()));
        }
        if dec.n_head == 0 || dec.n_embd % dec.n_head != 0 {
            return Err(CaptionError::Configuration(format!(
                "decoder.n_embd ({}) must be a positive multiple of decoder.n_head ({})",
                dec.n_embd, dec.n_head
            )));
        }
        // n_ctx - 1 is the hard cap on generated tokens
        if dec.n_ctx < 2 {
            return Err(CaptionError::Configuration(format!(
                "decoder.n_ctx must be at least 2, got {}",
                dec.n_ctx
            )));
        }
        if self.encoder.image_size == 0 {
            return Err(CaptionError::Configuration("encoder.image_size must be > 0".into()));
        }
        Ok(())
    }

    /// Returns the per-head attention dimension.
    #[inline]
    pub fn head_dim(&self) -> usize {
        self.decoder.n_embd / self.decoder.n_head
    }

    /// Returns the number of image patches the encoder sees (excluding CLS).
    #[inline]
    pub fn num_patches(&self) -> usize {
        let per_side = (self.encoder.image_size / self.encoder.patch_size.max(1)) as usize;
        per_side * per_side
    }

    /// Returns the maximum number of tokens a single generation may emit.
    #[inline]
    pub fn context_limit(&self) -> usize {
        self.decoder.n_ctx.saturating_sub(1)
    }
}
