//! Model file layout and loading of the non-weight parts.

use crate::config::ModelConfig;
use crate::error::Result;
use crate::tokenizer::{Vocabulary, load_vocab};
use std::path::{Path, PathBuf};
use tracing::info;

/// Typed paths for the files of a vit-gpt2 captioning model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Quantized ViT encoder (`onnx/encoder_model_quantized.onnx`).
    pub encoder: PathBuf,
    /// Merged GPT-2 decoder with cache branch (`onnx/decoder_model_merged_quantized.onnx`).
    pub decoder: PathBuf,
    pub config: PathBuf,
    pub vocab: PathBuf,
}

impl ModelPaths {
    /// Model files relative to the model directory.
    pub const NAMES: &[&str] = &[
        "onnx/encoder_model_quantized.onnx",
        "onnx/decoder_model_merged_quantized.onnx",
        "config.json",
        "vocab.json",
    ];

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            encoder: dir.join(Self::NAMES[0]),
            decoder: dir.join(Self::NAMES[1]),
            config: dir.join(Self::NAMES[2]),
            vocab: dir.join(Self::NAMES[3]),
        }
    }

    /// Paths from explicit file locations; the vocabulary sits next to the config.
    pub fn from_files(
        encoder: impl Into<PathBuf>,
        decoder: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
    ) -> Self {
        let config = config.into();
        let vocab = config
            .parent()
            .map(|dir| dir.join("vocab.json"))
            .unwrap_or_else(|| PathBuf::from("vocab.json"));
        Self {
            encoder: encoder.into(),
            decoder: decoder.into(),
            config,
            vocab,
        }
    }

    /// Files that are not present. `vocab.json` is listed too even though
    /// its absence only degrades output.
    pub fn missing(&self) -> Vec<&Path> {
        [&self.encoder, &self.decoder, &self.config, &self.vocab]
            .into_iter()
            .filter(|p| !p.exists())
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn all_exist(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Default model directory: `~/.caption-rs/models/vit-gpt2-image-captioning`.
pub fn default_model_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".caption-rs/models/vit-gpt2-image-captioning")
}

/// Load config (required) and vocabulary (falls back on failure).
pub fn load_config_and_vocab(paths: &ModelPaths) -> Result<(ModelConfig, Vocabulary)> {
    let config = ModelConfig::load(&paths.config)?;
    info!(
        path = %paths.config.display(),
        image_size = config.encoder.image_size,
        max_length = config.decoder.max_length,
        "loaded model config"
    );
    let vocab = load_vocab(&paths.vocab);
    Ok((config, vocab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptionError;
    use std::fs;

    #[test]
    fn from_dir_constructs_all_paths() {
        let paths = ModelPaths::from_dir("/models/vit");
        assert_eq!(
            paths.encoder,
            PathBuf::from("/models/vit/onnx/encoder_model_quantized.onnx")
        );
        assert_eq!(
            paths.decoder,
            PathBuf::from("/models/vit/onnx/decoder_model_merged_quantized.onnx")
        );
        assert_eq!(paths.config, PathBuf::from("/models/vit/config.json"));
        assert_eq!(paths.vocab, PathBuf::from("/models/vit/vocab.json"));
    }

    #[test]
    fn from_files_puts_vocab_beside_config() {
        let paths = ModelPaths::from_files("enc.onnx", "dec.onnx", "/cfg/dir/config.json");
        assert_eq!(paths.vocab, PathBuf::from("/cfg/dir/vocab.json"));
        assert_eq!(paths.encoder, PathBuf::from("enc.onnx"));
    }

    #[test]
    fn missing_reports_absent_files() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ModelPaths::from_dir(tmp.path());
        assert_eq!(paths.missing().len(), 4);

        fs::write(&paths.config, b"{}").unwrap();
        assert_eq!(paths.missing().len(), 3);
        assert!(!paths.all_exist());

        fs::create_dir_all(tmp.path().join("onnx")).unwrap();
        for name in ModelPaths::NAMES {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        assert!(paths.all_exist());
    }

    #[test]
    fn missing_config_aborts_load() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config_and_vocab(&ModelPaths::from_dir(tmp.path())).unwrap_err();
        assert!(matches!(err, CaptionError::Configuration(_)));
    }

    #[test]
    fn missing_vocab_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ModelPaths::from_dir(tmp.path());
        fs::write(&paths.config, br#"{"decoder": {"max_length": 8}}"#).unwrap();

        let (config, vocab) = load_config_and_vocab(&paths).unwrap();
        assert_eq!(config.decoder.max_length, 8);
        assert_eq!(vocab.len(), Vocabulary::fallback().len());
    }

    #[test]
    fn default_dir_is_under_home() {
        assert!(default_model_dir().ends_with(".caption-rs/models/vit-gpt2-image-captioning"));
    }
}
