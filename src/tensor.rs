//! Dense row-major f32 tensor exchanged with the model backends.

use crate::error::{CaptionError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Wrap `data` with `shape`, checking that the element counts agree.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CaptionError::Inference(format!(
                "tensor shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Zero-filled tensor. Any dimension may be 0.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.shape.get(axis).copied()
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns the innermost row at the last position, i.e. `t[0, -1, :]` for
    /// batch-1 logits of shape `(1, seq, vocab)`.
    pub fn last_row(&self) -> Result<&[f32]> {
        let width = match self.shape.last() {
            Some(&w) if w > 0 && !self.data.is_empty() => w,
            _ => {
                return Err(CaptionError::Inference(format!(
                    "cannot take last row of empty tensor {:?}",
                    self.shape
                )));
            }
        };
        Ok(&self.data[self.data.len() - width..])
    }
}
