use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;
use refmark_engine::config::EngineConfig;
use refmark_engine::detector::{self, DetectionOutcome};
use refmark_engine::embed::{self, Backend, Partitioning};
use refmark_engine::utils::seed::rng_from_phrase;
use refmark_engine::{ChannelFormat, dct, image_handler, reference};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Arithmetic backend (auto, scalar, vector128, vector256); overrides REFMARK_BACKEND
    #[arg(long, global = true)]
    backend: Option<Backend>,
    /// Work split between threads (rows, columns); overrides REFMARK_PARTITIONING
    #[arg(long, global = true)]
    partitioning: Option<Partitioning>,
    /// Worker threads, 0 runs inline; overrides REFMARK_WORKERS
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a reference pattern sized like the input image
    GenReference {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Exclusive upper bound of the reference samples (1..=255)
        #[arg(long, default_value_t = 50)]
        reference_max: u8,
        /// Run the DCT robustness filter with this coefficient threshold.
        /// Without it the filter is skipped and the raw random pattern is written;
        /// pass 0 to sparsify every negative coefficient.
        #[arg(long)]
        robustness_threshold: Option<f32>,
        /// Generate a 3-channel pattern instead of a grayscale one
        #[arg(long)]
        color: bool,
        /// Seed phrase for a reproducible pattern
        #[arg(long)]
        seed: Option<String>,
    },
    /// Embed a reference pattern into an image
    Embed {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        reference: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Reference pattern embedding multiplier
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,
        /// Embedded value: true adds the pattern, false subtracts it
        #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
        value: bool,
        /// Channel layout the image is processed in
        #[arg(long, default_value_t = ChannelFormat::Color)]
        format: ChannelFormat,
    },
    /// Detect which value, if any, is embedded in an image
    Detect {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        reference: PathBuf,
        /// Detector threshold value
        #[arg(long, default_value_t = 0.01)]
        threshold: f64,
        /// Channel layout the image is analysed in
        #[arg(long, default_value_t = ChannelFormat::Color)]
        format: ChannelFormat,
    },
    /// Convert an image to BT.601 grayscale
    ToGray {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(partitioning) = cli.partitioning {
        config.partitioning = partitioning;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    match cli.command {
        Commands::GenReference {
            input,
            output,
            reference_max,
            robustness_threshold,
            color,
            seed,
        } => {
            let format = if color {
                ChannelFormat::Color
            } else {
                ChannelFormat::Grayscale
            };
            let image = image_handler::load(&input, ChannelFormat::Grayscale)
                .with_context(|| format!("Error opening input file `{}`", input.display()))?;

            let mut rng: Box<dyn rand::RngCore> = match seed {
                Some(phrase) => Box::new(rng_from_phrase(phrase.as_bytes())),
                None => Box::new(rand::rng()),
            };
            let mut pattern = reference::create_random_with_rng(
                image.width(),
                image.height(),
                reference_max,
                format,
                rng.as_mut(),
            )?;
            if let Some(threshold) = robustness_threshold {
                dct::sharpen_with_rng(&mut pattern, threshold, reference_max, rng.as_mut())?;
            }

            image_handler::save(&pattern, &output)?;
            info!(
                "Reference {}x{} written to {}",
                pattern.width(),
                pattern.height(),
                output.display()
            );
        }

        Commands::Embed {
            input,
            reference,
            output,
            alpha,
            value,
            format,
        } => {
            let mut image = image_handler::load(&input, format)
                .with_context(|| format!("Error opening input file `{}`", input.display()))?;
            let pattern = image_handler::load(&reference, format).with_context(|| {
                format!("Error opening reference file `{}`", reference.display())
            })?;

            let pool = config.worker_pool()?;
            embed::apply_reference(&mut image, &pattern, &config.embed_params(alpha, value), &pool)?;

            image_handler::save(&image, &output)?;
            info!("Embedding done.");
        }

        Commands::Detect {
            input,
            reference,
            threshold,
            format,
        } => {
            let image = image_handler::load(&input, format)
                .with_context(|| format!("Error opening input file `{}`", input.display()))?;
            let pattern = image_handler::load(&reference, format).with_context(|| {
                format!("Error opening reference file `{}`", reference.display())
            })?;

            match detector::classify(&image, &pattern, threshold) {
                DetectionOutcome::Failed => {
                    let reason = detector::linear_correlation(&image, &pattern)
                        .err()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| format!("invalid threshold {threshold}"));
                    bail!("Detection failed: {reason}");
                }
                outcome => println!("{outcome}"),
            }
        }

        Commands::ToGray { input, output } => {
            let image = image_handler::load(&input, ChannelFormat::Color)
                .with_context(|| format!("Error opening input file `{}`", input.display()))?;
            image_handler::save(&image.to_grayscale(), &output)?;
            info!("Grayscale image written to {}", output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_robustness_filter_is_opt_in() {
        let cli = Cli::try_parse_from(["refmark", "gen-reference", "-i", "in.png", "-o", "ref.png"])
            .unwrap();
        match cli.command {
            Commands::GenReference {
                robustness_threshold,
                ..
            } => assert_eq!(robustness_threshold, None),
            _ => panic!("expected gen-reference"),
        }

        let command = Cli::command();
        let help = command
            .find_subcommand("gen-reference")
            .and_then(|sub| {
                sub.get_arguments()
                    .find(|arg| arg.get_id() == "robustness_threshold")
            })
            .and_then(|arg| arg.get_long_help().or(arg.get_help()))
            .map(|help| help.to_string())
            .unwrap();
        assert!(help.contains("filter is skipped"), "help: {help}");
    }
}
