//! Per-request attention key/value cache.

use crate::config::ModelConfig;
use crate::error::{CaptionError, Result};
use crate::tensor::Tensor;
use tracing::warn;

/// Cached key and value for one decoder layer, each `(1, n_head, seq, head_dim)`.
#[derive(Debug, Clone)]
pub struct LayerCache {
    pub key: Tensor,
    pub value: Tensor,
}

/// Key/value cache for every decoder layer (past_key_values).
///
/// Created empty at the start of a generation run, replaced layer by layer
/// after each decode step and dropped when the run ends.
#[derive(Debug, Clone)]
pub struct AttentionCache {
    layers: Vec<LayerCache>,
}

impl AttentionCache {
    /// Allocate an empty cache (sequence length 0) based on config.
    pub fn new(config: &ModelConfig) -> Self {
        let n_layers = config.decoder.n_layer;
        let n_heads = config.decoder.n_head;
        let head_dim = config.head_dim();

        let layers = (0..n_layers)
            .map(|_| LayerCache {
                key: Tensor::zeros(vec![1, n_heads, 0, head_dim]),
                value: Tensor::zeros(vec![1, n_heads, 0, head_dim]),
            })
            .collect();

        AttentionCache { layers }
    }

    #[inline]
    pub fn layers(&self) -> &[LayerCache] {
        &self.layers
    }

    /// Cached sequence length, read from the first layer's key.
    pub fn seq_len(&self) -> usize {
        self.layers
            .first()
            .and_then(|l| l.key.dim(2))
            .unwrap_or(0)
    }

    /// Replace cached tensors with a decoder step's present outputs, laid out
    /// `key0, value0, key1, value1, ...`.
    ///
    /// A layer is replaced only when both its key and value are present;
    /// layers past the end of `present` keep their previous tensors. Returns
    /// the number of layers replaced.
    pub fn update(&mut self, present: Vec<Tensor>) -> Result<usize> {
        let available = present.len();
        let mut present = present.into_iter();
        let mut updated = 0;

        for (idx, layer) in self.layers.iter_mut().enumerate() {
            let (Some(key), Some(value)) = (present.next(), present.next()) else {
                break;
            };
            for t in [&key, &value] {
                if t.rank() != 4 {
                    return Err(CaptionError::Inference(format!(
                        "layer {idx} cache tensor has shape {:?}, expected rank 4",
                        t.shape()
                    )));
                }
            }
            layer.key = key;
            layer.value = value;
            updated += 1;
        }

        if updated < self.layers.len() {
            warn!(
                updated,
                layers = self.layers.len(),
                present = available,
                "decoder returned fewer cache tensors than layers, keeping stale entries"
            );
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ModelConfig {
        let mut config = ModelConfig::default();
        config.decoder.n_layer = 3;
        config.decoder.n_head = 2;
        config.decoder.n_embd = 8;
        config
    }

    fn grown(seq: usize, fill: f32) -> Tensor {
        let len = 2 * seq * 4;
        Tensor::new(vec![1, 2, seq, 4], vec![fill; len]).unwrap()
    }

    #[test]
    fn starts_empty_with_config_geometry() {
        let cache = AttentionCache::new(&small_config());
        assert_eq!(cache.layers().len(), 3);
        assert_eq!(cache.seq_len(), 0);
        for layer in cache.layers() {
            assert_eq!(layer.key.shape(), &[1, 2, 0, 4]);
            assert_eq!(layer.value.shape(), &[1, 2, 0, 4]);
        }
    }

    #[test]
    fn full_update_replaces_every_layer() {
        let mut cache = AttentionCache::new(&small_config());
        let present = (0..6).map(|i| grown(1, i as f32)).collect();
        assert_eq!(cache.update(present).unwrap(), 3);
        assert_eq!(cache.seq_len(), 1);
        assert_eq!(cache.layers()[2].value.data()[0], 5.0);
    }

    #[test]
    fn short_update_keeps_stale_layers() {
        let mut cache = AttentionCache::new(&small_config());
        // layer 0 complete, layer 1 key only
        let present = vec![grown(1, 1.0), grown(1, 2.0), grown(1, 3.0)];
        assert_eq!(cache.update(present).unwrap(), 1);
        assert_eq!(cache.layers()[0].key.dim(2), Some(1));
        assert_eq!(cache.layers()[1].key.dim(2), Some(0));
        assert_eq!(cache.layers()[2].key.dim(2), Some(0));
    }

    #[test]
    fn empty_update_is_tolerated() {
        let mut cache = AttentionCache::new(&small_config());
        assert_eq!(cache.update(Vec::new()).unwrap(), 0);
        assert_eq!(cache.seq_len(), 0);
    }

    #[test]
    fn non_rank4_tensor_is_inference_error() {
        let mut cache = AttentionCache::new(&small_config());
        let present = vec![Tensor::zeros(vec![2, 4]), grown(1, 0.0)];
        assert!(matches!(
            cache.update(present),
            Err(CaptionError::Inference(_))
        ));
    }
}
