//! Caption latency benchmark.

use crate::backend::{TextDecoder, VisionEncoder};
use crate::captioner::Captioner;
use crate::error::Result;
use crate::preprocess::ImageSource;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub runs: usize,
    pub mean: Duration,
    pub caption: String,
}

/// Caption `image` once to warm up, then `runs` more times and average.
pub fn benchmark<E, D>(
    captioner: &mut Captioner<E, D>,
    image: &ImageSource,
    runs: usize,
) -> Result<BenchReport>
where
    E: VisionEncoder,
    D: TextDecoder,
{
    let runs = runs.max(1);
    info!(runs, "running caption benchmark");

    let mut caption = captioner.generate_caption(image.clone(), None)?;

    let start = Instant::now();
    for _ in 0..runs {
        caption = captioner.generate_caption(image.clone(), None)?;
    }
    let mean = start.elapsed().div_f64(runs as f64);

    info!(mean = ?mean, "average caption time");
    Ok(BenchReport {
        runs,
        mean,
        caption,
    })
}
