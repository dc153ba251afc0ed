//! Image captioning inference library in Rust
//!
//! Runs a ViT encoder and a GPT-2 decoder (vit-gpt2-image-captioning style
//! models) to turn a screenshot or image file into a short caption, using
//! greedy decoding over an incrementally grown key/value cache.

pub mod backend;
pub mod bench;
pub mod captioner;
pub mod config;
pub mod error;
pub mod generate;
pub mod loader;
pub mod model;
#[cfg(feature = "ort")]
pub mod onnx;
pub mod preprocess;
pub mod sample;
pub mod state;
pub mod tensor;
pub mod tokenizer;

pub use backend::{DecoderInput, DecoderOutput, TextDecoder, VisionEncoder};
pub use captioner::{Caption, Captioner};
pub use config::ModelConfig;
pub use error::{CaptionError, Result};
pub use generate::{Generation, StopReason, generate};
pub use model::{ModelPaths, default_model_dir, load_config_and_vocab};
#[cfg(feature = "ort")]
pub use onnx::{ModelInfo, OnnxCaptioner, OnnxDecoder, OnnxEncoder, OnnxOptions, SessionInfo};
pub use preprocess::ImageSource;
pub use state::AttentionCache;
pub use tensor::Tensor;
pub use tokenizer::{Vocabulary, load_vocab};
