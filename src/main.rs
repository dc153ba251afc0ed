mod logging;

use caption_rs::bench::benchmark;
use caption_rs::{ImageSource, ModelConfig, ModelPaths, OnnxCaptioner, OnnxOptions, default_model_dir};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "caption", about = "Caption images with a local ViT-GPT2 model")]
struct Cli {
    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Caption an image and print the text.
    Describe {
        #[command(flatten)]
        model: ModelArgs,
        image: PathBuf,
        /// Maximum tokens to generate (default: config decoder.max_length).
        #[arg(long)]
        max_length: Option<usize>,
    },
    /// Time repeated captions of one image.
    Bench {
        #[command(flatten)]
        model: ModelArgs,
        image: PathBuf,
        #[arg(long, default_value_t = 10)]
        runs: usize,
    },
    /// Print the encoder and decoder graph inputs and outputs.
    Info {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Write a config document with default values.
    InitConfig {
        #[arg(default_value = "config.json")]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Model directory (onnx/, config.json, vocab.json).
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Encoder threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,
    /// Write ONNX Runtime profiling traces with this prefix.
    #[arg(long)]
    profile: Option<PathBuf>,
}

impl ModelArgs {
    fn load(&self) -> caption_rs::Result<OnnxCaptioner> {
        let dir = self.model_dir.clone().unwrap_or_else(default_model_dir);
        let paths = ModelPaths::from_dir(&dir);
        let options = OnnxOptions {
            encoder_threads: self.threads,
            profiling: self.profile.clone(),
            ..OnnxOptions::default()
        };
        info!(dir = %dir.display(), "loading caption model");
        OnnxCaptioner::load(&paths, &options)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.quiet);

    match cli.command {
        Command::Describe {
            model,
            image,
            max_length,
        } => {
            let mut captioner = model.load()?;
            let caption = captioner.generate_caption(image, max_length)?;
            println!("{caption}");
        }
        Command::Bench { model, image, runs } => {
            let mut captioner = model.load()?;
            let report = benchmark(&mut captioner, &ImageSource::Path(image), runs)?;
            println!("caption: {}", report.caption);
            println!(
                "average over {} runs: {:.3}s",
                report.runs,
                report.mean.as_secs_f64()
            );
        }
        Command::Info { model } => {
            let captioner = model.load()?;
            print!("{}", captioner.model_info());
        }
        Command::InitConfig { path } => {
            ModelConfig::default().save(&path)?;
            println!("config saved to {}", path.display());
        }
    }
    Ok(())
}
