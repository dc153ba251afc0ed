#![allow(dead_code)]

use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;

use caption_rs::{
    CaptionError, Captioner, DecoderInput, DecoderOutput, ModelConfig, Result, Tensor,
    TextDecoder, VisionEncoder, Vocabulary,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub const EOS: u32 = 50256;

/// Small geometry so stub tensors stay tiny.
pub fn config(max_length: usize) -> ModelConfig {
    let mut config = ModelConfig::default();
    config.encoder.image_size = 32;
    config.encoder.patch_size = 16;
    config.decoder.max_length = max_length;
    config.decoder.n_layer = 2;
    config.decoder.n_head = 2;
    config.decoder.n_embd = 8;
    config
}

pub fn vocab() -> Vocabulary {
    Vocabulary::from_token_ids(
        [
            ("a", 0u32),
            ("Ġdog", 5),
            ("Ġon", 6),
            ("Ġgrass", 7),
            ("<|endoftext|>", EOS),
        ]
        .into_iter()
        .map(|(t, id)| (t.to_string(), id)),
    )
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(48, 40, Rgb([30, 200, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// Returns fixed hidden states and counts invocations.
pub struct StubEncoder {
    pub calls: Rc<Cell<usize>>,
    pub fail: bool,
}

impl StubEncoder {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            fail: false,
        }
    }
}

impl VisionEncoder for StubEncoder {
    fn encode(&mut self, pixel_values: &Tensor) -> Result<Tensor> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(CaptionError::Inference("encoder backend failure".into()));
        }
        assert_eq!(pixel_values.shape(), &[1, 3, 32, 32]);
        Ok(Tensor::zeros(vec![1, 5, 8]))
    }
}

/// Emits `script[step]` (repeating the last entry) as the argmax and grows
/// each layer's cache by one position.
pub struct StubDecoder {
    pub script: Vec<u32>,
    pub calls: Rc<Cell<usize>>,
    pub fail_at: Option<usize>,
}

impl StubDecoder {
    pub fn new(script: Vec<u32>) -> Self {
        Self {
            script,
            calls: Rc::new(Cell::new(0)),
            fail_at: None,
        }
    }
}

impl TextDecoder for StubDecoder {
    fn decode_step(&mut self, input: DecoderInput<'_>) -> Result<DecoderOutput> {
        let step = self.calls.get();
        self.calls.set(step + 1);
        if self.fail_at == Some(step) {
            return Err(CaptionError::Inference("decoder backend failure".into()));
        }
        assert_eq!(input.input_ids.len(), 1);
        assert_eq!(input.encoder_hidden_states.shape(), &[1, 5, 8]);

        let next = self.script[step.min(self.script.len() - 1)] as usize;
        let vocab = EOS as usize + 1;
        let mut logits = vec![0.0f32; vocab];
        logits[next] = 3.0;

        let present = input
            .past
            .layers()
            .iter()
            .flat_map(|l| {
                let seq = l.key.dim(2).unwrap_or(0) + 1;
                [Tensor::zeros(vec![1, 2, seq, 4]), Tensor::zeros(vec![1, 2, seq, 4])]
            })
            .collect();

        Ok(DecoderOutput {
            logits: Tensor::new(vec![1, 1, vocab], logits)?,
            present,
        })
    }
}

pub fn captioner(
    max_length: usize,
    script: Vec<u32>,
) -> (Captioner<StubEncoder, StubDecoder>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let encoder = StubEncoder::new();
    let decoder = StubDecoder::new(script);
    let enc_calls = Rc::clone(&encoder.calls);
    let dec_calls = Rc::clone(&decoder.calls);
    let captioner = Captioner::new(
        Arc::new(config(max_length)),
        Arc::new(vocab()),
        encoder,
        decoder,
    )
    .expect("valid config");
    (captioner, enc_calls, dec_calls)
}
