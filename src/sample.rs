//! Greedy token selection.

use crate::error::{CaptionError, Result};

/// Pick the next token id from a logits row by argmax.
///
/// Temperature and nucleus settings in the config are deliberately not
/// consulted here: decoding is always greedy.
pub fn greedy(logits: &[f32]) -> Result<u32> {
    let idx = argmax(logits)
        .ok_or_else(|| CaptionError::Inference("empty logits row".into()))?;
    u32::try_from(idx)
        .map_err(|_| CaptionError::Inference(format!("token index {idx} out of range")))
}

/// Returns the index of the maximum element; the first one wins on ties.
///
/// NaN compares above everything, so the first NaN is returned when the
/// row contains one (the same answer `numpy.argmax` gives).
#[inline]
pub fn argmax(x: &[f32]) -> Option<usize> {
    if let Some(nan) = x.iter().position(|v| v.is_nan()) {
        return Some(nan);
    }
    let (&first, rest) = x.split_first()?;
    let mut max_idx = 0;
    let mut max_val = first;
    for (i, &v) in rest.iter().enumerate() {
        if v > max_val {
            max_val = v;
            max_idx = i + 1;
        }
    }
    Some(max_idx)
}
