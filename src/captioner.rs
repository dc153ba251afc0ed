//! Image to caption pipeline.

use crate::backend::{TextDecoder, VisionEncoder};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::generate::{StopReason, generate};
use crate::preprocess::{ImageSource, prepare};
use crate::tokenizer::Vocabulary;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// A generated caption together with how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub tokens: Vec<u32>,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

/// Loaded captioning model: config, vocabulary and the two model functions.
///
/// Requests take `&mut self`, so one instance serves one caption at a time.
/// Config and vocabulary are shared read-only and may back several
/// instances.
pub struct Captioner<E, D> {
    config: Arc<ModelConfig>,
    vocab: Arc<Vocabulary>,
    encoder: E,
    decoder: D,
}

impl<E, D> Captioner<E, D>
where
    E: VisionEncoder,
    D: TextDecoder,
{
    /// Assemble a captioner from already-loaded parts.
    pub fn new(
        config: Arc<ModelConfig>,
        vocab: Arc<Vocabulary>,
        encoder: E,
        decoder: D,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            vocab,
            encoder,
            decoder,
        })
    }

    pub fn config(&self) -> &Arc<ModelConfig> {
        &self.config
    }

    pub fn vocab(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Caption an image. `max_length` defaults to `decoder.max_length`.
    pub fn generate_caption<I: Into<ImageSource>>(
        &mut self,
        image: I,
        max_length: Option<usize>,
    ) -> Result<String> {
        Ok(self.describe(image, max_length)?.text)
    }

    /// Caption an image and report the token ids and stop reason.
    pub fn describe<I: Into<ImageSource>>(
        &mut self,
        image: I,
        max_length: Option<usize>,
    ) -> Result<Caption> {
        let start = Instant::now();
        let max_length = max_length.unwrap_or(self.config.decoder.max_length);

        let pixel_values = prepare(&image.into(), self.config.encoder.image_size)?;
        let hidden_states = self.encoder.encode(&pixel_values)?;
        let generation = generate(&mut self.decoder, &hidden_states, &self.config, max_length)?;
        let text = self.vocab.decode(&generation.tokens);

        let elapsed = start.elapsed();
        info!(
            tokens = generation.tokens.len(),
            stop = ?generation.stop_reason,
            elapsed = ?elapsed,
            "captioned image: {text}"
        );

        Ok(Caption {
            text,
            tokens: generation.tokens,
            stop_reason: generation.stop_reason,
            elapsed,
        })
    }
}
