//! ONNX Runtime backend for the ViT encoder and merged GPT-2 decoder.
//!
//! ONNX tensor shapes use `i64` dimensions while Rust indexing needs `usize`.
//! These casts are safe because tensor dimensions are always small positive values.
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ort::session::Session;
use ort::value::{DynValue, Tensor as OrtTensor};
use tracing::{debug, info};

use crate::backend::{DecoderInput, DecoderOutput, TextDecoder, VisionEncoder};
use crate::captioner::Captioner;
use crate::error::{CaptionError, Result};
use crate::model::{ModelPaths, load_config_and_vocab};
use crate::tensor::Tensor;

/// Session construction options.
#[derive(Debug, Clone)]
pub struct OnnxOptions {
    /// Intra-op thread count for the encoder session.
    pub encoder_threads: usize,
    /// The decoder runs one token at a time; few threads suffice.
    pub decoder_threads: usize,
    /// Write ONNX Runtime profiling traces with this file prefix.
    pub profiling: Option<PathBuf>,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            encoder_threads: 4,
            decoder_threads: 1,
            profiling: None,
        }
    }
}

fn open_session(path: &Path, threads: usize, profiling: Option<&Path>) -> Result<Session> {
    if !path.exists() {
        return Err(CaptionError::ModelUnavailable(format!(
            "{} not found, download the model files first",
            path.display()
        )));
    }
    let mut builder = Session::builder()
        .map_err(|e| unavailable(path, e))?
        .with_intra_threads(threads)
        .map_err(|e| unavailable(path, e))?;
    if let Some(prefix) = profiling {
        builder = builder
            .with_profiling(prefix)
            .map_err(|e| unavailable(path, e))?;
    }
    builder.commit_from_file(path).map_err(|e| unavailable(path, e))
}

fn unavailable(path: &Path, e: impl fmt::Display) -> CaptionError {
    CaptionError::ModelUnavailable(format!("{}: {e}", path.display()))
}

fn to_ort(t: &Tensor) -> Result<DynValue> {
    let shape: Vec<i64> = t.shape().iter().map(|&d| d as i64).collect();
    OrtTensor::from_array((shape, t.data().to_vec()))
        .map(|t| t.into_dyn())
        .map_err(|e| CaptionError::Inference(format!("build input tensor: {e}")))
}

fn from_ort(value: &DynValue, what: &str) -> Result<Tensor> {
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| CaptionError::Inference(format!("extract {what}: {e}")))?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    Tensor::new(dims, data.to_vec())
}

/// Names and value types of one session's graph inputs and outputs, in
/// graph order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
}

impl SessionInfo {
    fn of(session: &Session) -> Self {
        Self {
            inputs: session
                .inputs()
                .iter()
                .map(|o| (o.name().to_string(), o.dtype().to_string()))
                .collect(),
            outputs: session
                .outputs()
                .iter()
                .map(|o| (o.name().to_string(), o.dtype().to_string()))
                .collect(),
        }
    }
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  inputs:")?;
        for (i, (name, ty)) in self.inputs.iter().enumerate() {
            writeln!(f, "    {i}: {name} {ty}")?;
        }
        writeln!(f, "  outputs:")?;
        for (i, (name, ty)) in self.outputs.iter().enumerate() {
            writeln!(f, "    {i}: {name} {ty}")?;
        }
        Ok(())
    }
}

/// Signatures of both sessions. The decoder's outputs are read by
/// position: logits first, then `present` key/value pairs per layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    pub encoder: SessionInfo,
    pub decoder: SessionInfo,
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "encoder:")?;
        write!(f, "{}", self.encoder)?;
        writeln!(f, "decoder:")?;
        write!(f, "{}", self.decoder)
    }
}

/// ViT encoder session.
pub struct OnnxEncoder {
    session: Session,
}

impl OnnxEncoder {
    pub fn load(path: &Path, options: &OnnxOptions) -> Result<Self> {
        let session = open_session(path, options.encoder_threads, options.profiling.as_deref())?;
        debug!(path = %path.display(), "loaded encoder");
        Ok(Self { session })
    }
}

impl VisionEncoder for OnnxEncoder {
    fn encode(&mut self, pixel_values: &Tensor) -> Result<Tensor> {
        let input = to_ort(pixel_values)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| CaptionError::Inference(format!("encoder run: {e}")))?;
        if outputs.len() == 0 {
            return Err(CaptionError::Inference("encoder produced no outputs".into()));
        }
        from_ort(&outputs[0], "encoder hidden states")
    }
}

/// Merged GPT-2 decoder session (`decoder_model_merged`), always run on its
/// cached branch.
pub struct OnnxDecoder {
    session: Session,
}

impl OnnxDecoder {
    pub fn load(path: &Path, options: &OnnxOptions) -> Result<Self> {
        let session = open_session(path, options.decoder_threads, options.profiling.as_deref())?;
        debug!(path = %path.display(), "loaded decoder");
        Ok(Self { session })
    }
}

impl TextDecoder for OnnxDecoder {
    fn decode_step(&mut self, input: DecoderInput<'_>) -> Result<DecoderOutput> {
        let ids: Vec<i64> = input.input_ids.iter().map(|&id| i64::from(id)).collect();
        let input_ids = OrtTensor::from_array(([1i64, ids.len() as i64], ids))
            .map_err(|e| CaptionError::Inference(format!("input_ids tensor: {e}")))?;
        let use_cache = OrtTensor::from_array(([1i64], vec![input.use_cache]))
            .map_err(|e| CaptionError::Inference(format!("use_cache_branch tensor: {e}")))?;

        let mut inputs: Vec<(String, DynValue)> = vec![
            ("input_ids".into(), input_ids.into_dyn()),
            (
                "encoder_hidden_states".into(),
                to_ort(input.encoder_hidden_states)?,
            ),
            ("use_cache_branch".into(), use_cache.into_dyn()),
        ];
        for (i, layer) in input.past.layers().iter().enumerate() {
            inputs.push((format!("past_key_values.{i}.key"), to_ort(&layer.key)?));
            inputs.push((format!("past_key_values.{i}.value"), to_ort(&layer.value)?));
        }

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| CaptionError::Inference(format!("decoder run: {e}")))?;
        if outputs.len() == 0 {
            return Err(CaptionError::Inference("decoder produced no outputs".into()));
        }

        let logits = from_ort(&outputs[0], "logits")?;
        let present = (1..outputs.len())
            .map(|i| from_ort(&outputs[i], "present key/value"))
            .collect::<Result<Vec<_>>>()?;

        Ok(DecoderOutput { logits, present })
    }
}

/// Captioner backed by ONNX Runtime sessions.
pub type OnnxCaptioner = Captioner<OnnxEncoder, OnnxDecoder>;

impl Captioner<OnnxEncoder, OnnxDecoder> {
    /// Load config, vocabulary and both sessions.
    ///
    /// Fails with `Configuration` when the config is missing and with
    /// `ModelUnavailable` when either weight file is missing or unloadable.
    pub fn load(paths: &ModelPaths, options: &OnnxOptions) -> Result<Self> {
        let (config, vocab) = load_config_and_vocab(paths)?;
        let missing: Vec<String> = [&paths.encoder, &paths.decoder]
            .into_iter()
            .filter(|p| !p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CaptionError::ModelUnavailable(format!(
                "missing {}, download the model files first",
                missing.join(", ")
            )));
        }
        let encoder = OnnxEncoder::load(&paths.encoder, options)?;
        let decoder = OnnxDecoder::load(&paths.decoder, options)?;

        info!(
            encoder = %paths.encoder.display(),
            decoder = %paths.decoder.display(),
            image_size = config.encoder.image_size,
            max_length = config.decoder.max_length,
            "caption model ready"
        );
        Captioner::new(Arc::new(config), Arc::new(vocab), encoder, decoder)
    }

    /// Load from a model directory laid out as [`ModelPaths::from_dir`] expects.
    pub fn load_dir(dir: impl AsRef<Path>, options: &OnnxOptions) -> Result<Self> {
        Self::load(&ModelPaths::from_dir(dir), options)
    }

    /// Input and output signatures of the loaded sessions.
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            encoder: SessionInfo::of(&self.encoder().session),
            decoder: SessionInfo::of(&self.decoder().session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use std::fs;

    fn model_dir_without_weights() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        ModelConfig::default()
            .save(tmp.path().join("config.json"))
            .unwrap();
        fs::write(tmp.path().join("vocab.json"), r#"{"a": 64}"#).unwrap();
        tmp
    }

    #[test]
    fn missing_weights_are_model_unavailable() {
        let tmp = model_dir_without_weights();
        let err = OnnxCaptioner::load_dir(tmp.path(), &OnnxOptions::default()).unwrap_err();
        match err {
            CaptionError::ModelUnavailable(msg) => {
                assert!(msg.contains("encoder_model_quantized.onnx"));
                assert!(msg.contains("decoder_model_merged_quantized.onnx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_decoder_alone_is_model_unavailable() {
        let tmp = model_dir_without_weights();
        let paths = ModelPaths::from_dir(tmp.path());
        fs::create_dir_all(tmp.path().join("onnx")).unwrap();
        fs::write(&paths.encoder, b"").unwrap();

        let err = OnnxCaptioner::load(&paths, &OnnxOptions::default()).unwrap_err();
        match err {
            CaptionError::ModelUnavailable(msg) => {
                assert!(msg.contains("decoder_model_merged_quantized.onnx"));
                assert!(!msg.contains("encoder_model_quantized.onnx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_config_wins_over_missing_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let err = OnnxCaptioner::load_dir(tmp.path(), &OnnxOptions::default()).unwrap_err();
        assert!(matches!(err, CaptionError::Configuration(_)));
    }

    #[test]
    fn model_info_lists_outputs_in_order() {
        let info = ModelInfo {
            encoder: SessionInfo {
                inputs: vec![("pixel_values".into(), "Tensor<f32>".into())],
                outputs: vec![("last_hidden_state".into(), "Tensor<f32>".into())],
            },
            decoder: SessionInfo {
                inputs: vec![("input_ids".into(), "Tensor<i64>".into())],
                outputs: vec![
                    ("logits".into(), "Tensor<f32>".into()),
                    ("present.0.key".into(), "Tensor<f32>".into()),
                ],
            },
        };
        let text = info.to_string();
        assert!(text.starts_with("encoder:\n"));
        assert!(text.contains("    0: logits Tensor<f32>\n    1: present.0.key Tensor<f32>"));
    }
}
