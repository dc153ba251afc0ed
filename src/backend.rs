//! Capability traits for the opaque encoder and decoder functions.
//!
//! The decode loop in [`crate::generate`] only talks to these traits, so any
//! inference backend (ONNX Runtime behind the `ort` feature, or an in-process
//! stub) can drive it.

use crate::error::Result;
use crate::state::AttentionCache;
use crate::tensor::Tensor;

/// Vision encoder: pixel tensor in, hidden-state sequence out.
pub trait VisionEncoder {
    /// Run the encoder on a `(1, 3, S, S)` tensor and return its first output,
    /// `(1, patches, hidden)`.
    fn encode(&mut self, pixel_values: &Tensor) -> Result<Tensor>;
}

/// Inputs to one decoder step.
#[derive(Debug, Clone, Copy)]
pub struct DecoderInput<'a> {
    /// Exactly the tokens new to this step, shape `(1, len)`.
    pub input_ids: &'a [u32],
    pub encoder_hidden_states: &'a Tensor,
    /// Selects the cached branch of a merged decoder graph.
    pub use_cache: bool,
    pub past: &'a AttentionCache,
}

/// Outputs of one decoder step.
#[derive(Debug, Clone)]
pub struct DecoderOutput {
    /// `(1, len, vocab)`
    pub logits: Tensor,
    /// Present key/value tensors in layer order: `key0, value0, key1, ...`.
    /// May be shorter than `2 * n_layer`.
    pub present: Vec<Tensor>,
}

/// Text decoder: one autoregressive step against a key/value cache.
pub trait TextDecoder {
    fn decode_step(&mut self, input: DecoderInput<'_>) -> Result<DecoderOutput>;
}

impl<T: VisionEncoder + ?Sized> VisionEncoder for Box<T> {
    fn encode(&mut self, pixel_values: &Tensor) -> Result<Tensor> {
        (**self).encode(pixel_values)
    }
}

impl<T: TextDecoder + ?Sized> TextDecoder for Box<T> {
    fn decode_step(&mut self, input: DecoderInput<'_>) -> Result<DecoderOutput> {
        (**self).decode_step(input)
    }
}
