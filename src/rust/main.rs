use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use tagclass::{Dataset, ModelError, ModelManager, Prediction, ServiceConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding model artifacts
    #[arg(long, env = "TAGCLASS_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on a JSON dataset and save it
    Train {
        #[arg(short, long)]
        model_type: String,
        /// Algorithm family; defaults to the configured one
        #[arg(short, long)]
        algorithm: Option<String>,
        #[arg(short, long)]
        dataset: PathBuf,
        /// Replace an existing model of the same type
        #[arg(long)]
        retrain: bool,
        #[arg(long)]
        ngram_max: Option<usize>,
        #[arg(long)]
        min_df: Option<usize>,
        #[arg(long)]
        max_df: Option<f32>,
    },
    /// Classify a text with a saved model
    Classify {
        #[arg(short, long)]
        model_type: String,
        text: String,
    },
    /// List saved models
    List,
    /// Show the metadata of a saved model
    Info { model_type: String },
    /// Delete a saved model
    Delete { model_type: String },
    /// List the registered algorithm families
    Types,
}

#[derive(Serialize)]
struct ClassifyResponse {
    #[serde(flatten)]
    prediction: Prediction,
    processing_time_ms: f64,
}

async fn run(args: Args) -> Result<()> {
    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.models_dir {
        config.models_dir = Some(dir);
    }
    let manager = ModelManager::new(config.models_dir())
        .with_context(|| format!("Cannot open models directory {:?}", config.models_dir()))?;

    match args.command {
        Command::Train {
            model_type,
            algorithm,
            dataset,
            retrain,
            ngram_max,
            min_df,
            max_df,
        } => {
            if manager.is_available(&model_type) && !retrain {
                bail!(
                    "Model '{}' already exists. Use --retrain to overwrite it",
                    model_type
                );
            }
            let algorithm = algorithm.unwrap_or_else(|| config.default_algorithm.clone());
            let mut vectorizer = config.vectorizer_for(&algorithm);
            if let Some(n) = ngram_max {
                vectorizer.ngram_range.1 = n;
            }
            if let Some(n) = min_df {
                vectorizer.min_df = n;
            }
            if let Some(f) = max_df {
                vectorizer.max_df = f;
            }

            let data = Dataset::from_file(&dataset)?;
            let start = Instant::now();
            let metadata = manager
                .train(&model_type, &algorithm, data.documents, data.labels, vectorizer)
                .await?;
            info!("Training took {:?}", start.elapsed());
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "model_type": model_type,
                    "metadata": metadata,
                }))?
            );
        }
        Command::Classify { model_type, text } => {
            let start = Instant::now();
            let classifier = manager.load(&model_type, false).await?;
            let prediction = classifier.predict(&text).map_err(ModelError::from)?;
            let response = ClassifyResponse {
                prediction,
                processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::List => {
            let mut models = Vec::new();
            for model_type in manager.list_available().await? {
                let metadata = manager.get_model_info(&model_type).await?;
                models.push(json!({
                    "model_type": model_type,
                    "is_loaded": manager.is_loaded(&model_type).await,
                    "metadata": metadata,
                }));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "available_models": models,
                    "total_count": models.len(),
                }))?
            );
        }
        Command::Info { model_type } => {
            let metadata = manager.get_model_info(&model_type).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "model_type": model_type,
                    "status": format!("{:?}", manager.status(&model_type).await),
                    "metadata": metadata,
                }))?
            );
        }
        Command::Delete { model_type } => {
            let deleted = manager.delete(&model_type).await?;
            if !deleted {
                info!("Nothing stored under '{}'", model_type);
            }
            println!("{}", json!({ "model_type": model_type, "deleted": deleted }));
        }
        Command::Types => {
            println!(
                "{}",
                json!({ "supported_types": manager.factory().list_types() })
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        match e.downcast_ref::<ModelError>() {
            Some(model_error) => error!("{:?}: {}", model_error.kind(), model_error),
            None => error!("{:#}", e),
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
