//! Rating Registry command line
//!
//! Entry point for training runs, predictions, data loading, bucket sync
//! and registry inspection.

mod config;
mod sync;
mod telemetry;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rating_registry_core::ModelVersion;
use rating_registry_pipeline::{Predictor, RatingInput, TrainingPipeline, TrainingPipelineConfig};
use rating_registry_store::{dump_csv, FileDocumentStore, ModelRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::sync::BucketSync;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the training pipeline and promote the model if it improves
    Train,

    /// Predict a CSV file or every CSV file of a directory
    Predict {
        /// Input CSV file
        #[arg(long, conflicts_with = "input_dir", required_unless_present = "input_dir")]
        input: Option<PathBuf>,

        /// Directory of input CSV files
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Output directory (defaults to paths.prediction_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Predict the rating of a single restaurant
    PredictOne(PredictOneArgs),

    /// Load a CSV file into the document store
    Dump {
        /// CSV file to load
        #[arg(long)]
        csv: PathBuf,

        /// Database name (defaults to ingestion.database)
        #[arg(long)]
        database: Option<String>,

        /// Collection name (defaults to ingestion.collection)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Sync local directories with the bucket
    Sync {
        /// Bucket name (overrides sync.bucket)
        #[arg(long, env = "BUCKET_NAME")]
        bucket: Option<String>,

        #[command(subcommand)]
        action: SyncAction,
    },

    /// Inspect the model registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
}

#[derive(Args, Debug)]
struct PredictOneArgs {
    #[arg(long, default_value = "Yes")]
    online_order: String,
    #[arg(long, default_value = "No")]
    book_table: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    rest_type: String,
    #[arg(long)]
    cuisines: String,
    #[arg(long, default_value_t = 500.0)]
    approx_cost: f64,
    #[arg(long, default_value_t = 100)]
    votes: u32,
}

impl From<PredictOneArgs> for RatingInput {
    fn from(args: PredictOneArgs) -> Self {
        Self {
            online_order: args.online_order,
            book_table: args.book_table,
            location: args.location,
            rest_type: args.rest_type,
            cuisines: args.cuisines,
            approx_cost: args.approx_cost,
            votes: args.votes,
        }
    }
}

#[derive(Subcommand, Debug)]
enum SyncAction {
    /// Upload run artifacts and the registry
    PushArtifacts,
    /// Download the registry
    PullModels,
    /// Download batch prediction inputs
    PullInputs,
    /// Upload batch prediction outputs
    PushPredictions,
}

#[derive(Subcommand, Debug)]
enum RegistryAction {
    /// List promoted versions
    List,
    /// Show the latest version
    Latest,
    /// Recompute checksums of a version (latest when omitted)
    Verify {
        #[arg(long)]
        version: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_dir, &cli.environment)
        .with_context(|| format!("Failed to load configuration from {}", cli.config_dir.display()))?;

    let mut telemetry_config = telemetry::TelemetryConfig::from(&config.logging);
    if let Some(level) = &cli.log_level {
        telemetry_config = telemetry_config.with_log_level(level.clone());
    }
    if cli.json_logs {
        telemetry_config = telemetry_config.with_json_format(true);
    }
    telemetry::init_with_config(telemetry_config);

    info!(environment = %cli.environment, "Starting rating registry");

    match cli.command {
        Command::Train => train(&config),
        Command::Predict {
            input,
            input_dir,
            output_dir,
        } => predict(&config, input, input_dir, output_dir),
        Command::PredictOne(args) => predict_one(&config, args.into()),
        Command::Dump {
            csv,
            database,
            collection,
        } => dump(&config, csv, database, collection),
        Command::Sync { bucket, action } => run_sync(&config, bucket, action),
        Command::Registry { action } => registry(&config, action),
    }
}

fn train(config: &AppConfig) -> Result<()> {
    let pipeline_config = TrainingPipelineConfig::new(
        &config.paths.artifact_root,
        &config.paths.registry_root,
        config.pipeline_settings(),
    )
    .context("Invalid training configuration")?;
    let store = Arc::new(FileDocumentStore::new(&config.document_store.root));

    let outcome = TrainingPipeline::new(pipeline_config, store)
        .run()
        .context("Training pipeline failed")?;

    println!(
        "run {}: train R2 {:.4}, test R2 {:.4}, promoted {}",
        outcome.run_id,
        outcome.trainer.r2_train_score(),
        outcome.trainer.r2_test_score(),
        outcome.pusher
    );
    Ok(())
}

fn load_predictor(config: &AppConfig) -> Result<Predictor> {
    let registry = ModelRegistry::open(&config.paths.registry_root)
        .context("Failed to open model registry")?;
    Predictor::from_registry(&registry, config.schema.clone()).context("Failed to load model")
}

fn predict(
    config: &AppConfig,
    input: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let predictor = load_predictor(config)?;
    let output_dir = output_dir.unwrap_or_else(|| config.paths.prediction_dir.clone());

    let outputs = match (input, input_dir) {
        (Some(input), _) => vec![predictor
            .start_batch_prediction(&input, &output_dir)
            .with_context(|| format!("Batch prediction failed for {}", input.display()))?],
        (None, Some(dir)) => predictor
            .batch_predict_dir(&dir, &output_dir)
            .with_context(|| format!("Batch prediction failed for {}", dir.display()))?,
        (None, None) => bail!("either --input or --input-dir is required"),
    };

    for output in outputs {
        println!("{}", output.display());
    }
    Ok(())
}

fn predict_one(config: &AppConfig, input: RatingInput) -> Result<()> {
    let predictor = load_predictor(config)?;
    let rating = predictor
        .predict_one(&input)
        .context("Prediction failed")?;
    println!("{:.1}", rating);
    Ok(())
}

fn dump(
    config: &AppConfig,
    csv: PathBuf,
    database: Option<String>,
    collection: Option<String>,
) -> Result<()> {
    let database = database.unwrap_or_else(|| config.ingestion.database.clone());
    let collection = collection.unwrap_or_else(|| config.ingestion.collection.clone());
    let store = FileDocumentStore::new(&config.document_store.root);

    let inserted = dump_csv(&store, &database, &collection, &csv)
        .with_context(|| format!("Failed to load {}", csv.display()))?;
    println!("inserted {} documents into {}/{}", inserted, database, collection);
    Ok(())
}

fn run_sync(config: &AppConfig, bucket: Option<String>, action: SyncAction) -> Result<()> {
    let sync = BucketSync::from_config(&config.sync, bucket)?;
    let paths = &config.paths;
    match action {
        SyncAction::PushArtifacts => sync.push_artifacts(&paths.artifact_root, &paths.registry_root),
        SyncAction::PullModels => sync.pull_models(&paths.registry_root),
        SyncAction::PullInputs => sync.pull_inputs(&paths.input_dir),
        SyncAction::PushPredictions => sync.push_predictions(&paths.prediction_dir),
    }
    .context("Bucket sync failed")
}

fn registry(config: &AppConfig, action: RegistryAction) -> Result<()> {
    let registry = ModelRegistry::open(&config.paths.registry_root)
        .context("Failed to open model registry")?;

    match action {
        RegistryAction::List => {
            for (version, manifest) in registry.manifests() {
                match manifest {
                    Some(manifest) => println!("{}\t{}", version, manifest.provenance),
                    None => println!("{}\t<no manifest>", version),
                }
            }
        }
        RegistryAction::Latest => match registry.latest_dir() {
            Some(dir) => println!("{}", dir.display()),
            None => bail!("no model has been promoted to {}", registry.root().display()),
        },
        RegistryAction::Verify { version } => {
            let version = match version {
                Some(number) => ModelVersion::new(number),
                None => registry.latest_version().with_context(|| {
                    format!("no model has been promoted to {}", registry.root().display())
                })?,
            };
            let manifest = registry
                .verify(version)
                .with_context(|| format!("Verification of version {} failed", version))?;
            println!("version {} ok ({} artifacts)", version, manifest.checksums.len());
        }
    }
    Ok(())
}
