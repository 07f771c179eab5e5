use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use digitread::{DebugConfig, Recognizer, RecognizerConfig, RtenClassifier, model_info};

#[derive(Parser)]
#[command(name = "digitread")]
#[command(about = "Recognize handwritten digits in images")]
struct Cli {
    /// JSON settings file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Classifier model file (overrides the config)
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Save debug images to directory (must be empty)
    #[arg(long, value_name = "DIR", global = true)]
    debug_out: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize a single digit
    Predict {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },
    /// Locate and recognize every digit, left to right
    PredictMulti {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },
    /// Describe the configured model file
    ModelInfo,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => RecognizerConfig::load(path)?,
        None => RecognizerConfig::default(),
    };
    if let Some(model) = args.model.clone() {
        config.model_path = model;
    }
    config.validate()?;

    let image_path = match &args.command {
        Command::ModelInfo => {
            let info = model_info(&config.model_path, &config.model_description);
            return print_json(&info, args.pretty);
        }
        Command::Predict { image_path } | Command::PredictMulti { image_path } => image_path,
    };

    info!(model = %config.model_path.display(), "Loading classifier");
    let classifier = RtenClassifier::load(&config.model_path, config.input_layout, config.apply_softmax)?;

    let mut recognizer = Recognizer::new(Arc::new(classifier), &config);
    if let Some(debug_dir) = args.debug_out {
        recognizer = recognizer.with_debug(DebugConfig::new(debug_dir)?);
    }

    let bytes = std::fs::read(image_path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", image_path.display(), e))?;

    match args.command {
        Command::Predict { .. } => print_json(&recognizer.predict_bytes(&bytes)?, args.pretty),
        Command::PredictMulti { .. } => print_json(&recognizer.predict_multi_bytes(&bytes)?, args.pretty),
        Command::ModelInfo => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}
