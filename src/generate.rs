//! Greedy autoregressive caption decoding.

use crate::backend::{DecoderInput, TextDecoder};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::sample::greedy;
use crate::state::AttentionCache;
use crate::tensor::Tensor;
use tracing::debug;

/// Why a generation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The decoder picked the end-of-sequence token.
    EndOfSequence,
    /// The step budget (`max_length`) ran out.
    MaxLength,
    /// Output reached `n_ctx - 1` tokens.
    ContextWindow,
}

/// Result of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Emitted token ids, never including the end-of-sequence token.
    pub tokens: Vec<u32>,
    pub stop_reason: StopReason,
}

/// Generate caption tokens for one image's encoder output.
///
/// Each step feeds exactly one token (BOS first, then the latest emitted
/// token) together with the unchanged encoder states and the cache built by
/// the previous steps. At most `min(max_length, n_ctx - 1)` tokens are
/// emitted.
pub fn generate<D>(
    decoder: &mut D,
    encoder_hidden_states: &Tensor,
    config: &ModelConfig,
    max_length: usize,
) -> Result<Generation>
where
    D: TextDecoder + ?Sized,
{
    let context_limit = config.context_limit();
    let mut cache = AttentionCache::new(config);
    let mut tokens: Vec<u32> = Vec::with_capacity(max_length.min(context_limit));

    for step in 0..max_length {
        let input_id = tokens.last().copied().unwrap_or(config.bos_token_id);

        let output = decoder.decode_step(DecoderInput {
            input_ids: &[input_id],
            encoder_hidden_states,
            use_cache: true,
            past: &cache,
        })?;

        let next = greedy(output.logits.last_row()?)?;
        debug!(step, input_id, next, past = cache.seq_len(), "decode step");

        if next == config.eos_token_id {
            return Ok(Generation {
                tokens,
                stop_reason: StopReason::EndOfSequence,
            });
        }

        tokens.push(next);
        cache.update(output.present)?;

        if tokens.len() >= context_limit {
            return Ok(Generation {
                tokens,
                stop_reason: StopReason::ContextWindow,
            });
        }
    }

    Ok(Generation {
        tokens,
        stop_reason: StopReason::MaxLength,
    })
}
