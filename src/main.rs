//! Channel earnings estimation CLI
//!
//! Train on a channel statistics snapshot and serve yearly earnings
//! estimates for single channels.

use clap::{Parser, Subcommand};
use earncast::{Config, Result};

#[derive(Parser)]
#[command(name = "earncast")]
#[command(about = "Creator channel earnings estimation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an earnings model from the configured CSV snapshot
    Train {
        /// Override the dataset path
        #[arg(long)]
        dataset: Option<String>,
        /// Override the artifact output path
        #[arg(long)]
        output: Option<String>,
        /// Override the number of trees
        #[arg(long)]
        trees: Option<usize>,
    },
    /// Estimate yearly earnings for one channel record
    Predict {
        /// JSON file with one channel record
        input: Option<String>,
        /// Inline JSON record
        #[arg(long)]
        json: Option<String>,
        /// Override the artifact path
        #[arg(long)]
        artifact: Option<String>,
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show artifact information
    Info {
        /// Override the artifact path
        #[arg(long)]
        artifact: Option<String>,
    },
    /// Show ranked feature importances
    Importances {
        /// Number of features to show
        #[arg(long)]
        top: Option<usize>,
        /// Override the artifact path
        #[arg(long)]
        artifact: Option<String>,
    },
    /// Show held-out evaluation metrics
    Accuracy {
        /// Override the artifact path
        #[arg(long)]
        artifact: Option<String>,
    },
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Train {
            dataset,
            output,
            trees,
        } => commands::train(&config, dataset, output, trees),
        Commands::Predict {
            input,
            json,
            artifact,
            format,
        } => commands::predict(&config, input, json, artifact, format),
        Commands::Model { action } => match action {
            ModelCommands::Info { artifact } => commands::model_info(&config, artifact),
            ModelCommands::Importances { top, artifact } => {
                commands::model_importances(&config, top, artifact)
            }
            ModelCommands::Accuracy { artifact } => commands::model_accuracy(&config, artifact),
        },
        Commands::Init { force } => commands::init(&cli.config, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use earncast::model::TrainedArtifact;
    use earncast::predict::service::format_estimate;
    use earncast::predict::PredictionService;
    use earncast::{EarncastError, RawRecord};

    pub fn init(config_path: &str, force: bool) -> Result<()> {
        if std::path::Path::new(config_path).exists() && !force {
            println!(
                "Config already exists at {}; pass --force to overwrite",
                config_path
            );
            return Ok(());
        }

        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Place a channel statistics CSV at data/youtube_channels.csv");
        println!("  3. Run 'earncast train' to train the model");
        println!("  4. Run 'earncast predict channel.json' to estimate earnings");

        Ok(())
    }

    pub fn train(
        config: &Config,
        dataset: Option<String>,
        output: Option<String>,
        trees: Option<usize>,
    ) -> Result<()> {
        let mut run_config = config.clone();
        if let Some(path) = dataset {
            run_config.data.dataset_path = path;
        }
        if let Some(path) = output {
            run_config.data.artifact_path = path;
        }
        if let Some(n) = trees {
            run_config.training.n_estimators = n;
        }

        println!("Training on {}...", run_config.data.dataset_path);
        let report = earncast::training::train(&run_config)?;
        let artifact = &report.artifact;

        println!("\nTraining complete! ({:.1}s)", report.elapsed.as_secs_f64());
        println!("  Artifact: {}", run_config.data.artifact_path);
        println!("  Rows:     {} loaded, {} kept", artifact.meta.dataset_rows, artifact.meta.cleaned_rows);
        println!("  Split:    {} train / {} test", artifact.meta.train_rows, artifact.metrics.test_rows);
        println!("  Target:   {}", artifact.meta.target_column);
        println!("  RMSE:     {:.4}", artifact.metrics.rmse);
        println!("  R²:       {:.4}", artifact.metrics.r2);

        let top = artifact.feature_importances(run_config.training.top_importances);
        if !top.is_empty() {
            println!("\nTop features:");
            for (name, score) in top {
                println!("  {:<40} {:.4}", name, score);
            }
        }

        Ok(())
    }

    pub fn predict(
        config: &Config,
        input: Option<String>,
        json: Option<String>,
        artifact: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let raw = match (input, json) {
            (Some(path), _) => std::fs::read_to_string(&path)?,
            (None, Some(inline)) => inline,
            (None, None) => {
                println!("Usage: earncast predict <RECORD.json>");
                println!("       earncast predict --json '{{\"subscribers\": 245000000, \"category\": \"Music\"}}'");
                return Ok(());
            }
        };
        let record: RawRecord = serde_json::from_str(&raw)?;

        let service = load_service(config, artifact)?;
        let estimate = service.predict(&record)?;

        match format {
            OutputFormat::Text => println!("{}", format_estimate(&estimate)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&estimate)?),
        }

        Ok(())
    }

    pub fn model_info(config: &Config, artifact_path: Option<String>) -> Result<()> {
        let path = artifact_path.unwrap_or_else(|| config.data.artifact_path.clone());
        let artifact = load_artifact(&path)?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:       {}", path);
        println!("  Trained:    {}", artifact.meta.trained_at.format("%Y-%m-%d %H:%M UTC"));
        println!("  Target:     {}", artifact.meta.target_column);
        println!("  Rows:       {} loaded, {} kept", artifact.meta.dataset_rows, artifact.meta.cleaned_rows);
        println!("  Split:      {} train / {} test", artifact.meta.train_rows, artifact.metrics.test_rows);
        println!("  Seed:       {}", artifact.meta.seed);
        println!("  Medians:    {}", artifact.medians.len());
        println!("  RMSE:       {:.4}", artifact.metrics.rmse);
        println!("  R²:         {:.4}", artifact.metrics.r2);
        println!("  Features:   {}", artifact.feature_names.len());
        for line in artifact.vocabulary_summary() {
            println!("    {}", line);
        }

        Ok(())
    }

    pub fn model_importances(
        config: &Config,
        top: Option<usize>,
        artifact_path: Option<String>,
    ) -> Result<()> {
        let path = artifact_path.unwrap_or_else(|| config.data.artifact_path.clone());
        let artifact = load_artifact(&path)?;
        let limit = top.unwrap_or(config.training.top_importances);
        let ranked = artifact.feature_importances(limit);

        if ranked.is_empty() {
            println!("No importances available for this artifact");
            return Ok(());
        }

        println!("{:<40} {:>10}", "Feature", "Importance");
        println!("{}", "-".repeat(51));
        for (name, score) in ranked {
            println!("{:<40} {:>10.4}", name, score);
        }

        Ok(())
    }

    pub fn model_accuracy(config: &Config, artifact_path: Option<String>) -> Result<()> {
        let path = artifact_path.unwrap_or_else(|| config.data.artifact_path.clone());
        let artifact = load_artifact(&path)?;
        let metrics = &artifact.metrics;

        println!("Held-Out Evaluation");
        println!("───────────────────────────────");
        println!("  RMSE:      {:.4}", metrics.rmse);
        println!("  R²:        {:.4}", metrics.r2);
        println!("  Test rows: {}", metrics.test_rows);

        if !metrics.samples.is_empty() {
            println!("\n{:>16} {:>16}", "Actual", "Predicted");
            println!("{}", "-".repeat(33));
            for (actual, predicted) in &metrics.samples {
                println!("{:>16.2} {:>16.2}", actual, predicted);
            }
        }

        Ok(())
    }

    fn load_artifact(path: &str) -> Result<TrainedArtifact> {
        if !std::path::Path::new(path).exists() {
            return Err(EarncastError::NotReady);
        }
        TrainedArtifact::load(path)
    }

    fn load_service(config: &Config, artifact_path: Option<String>) -> Result<PredictionService> {
        let path = artifact_path.unwrap_or_else(|| config.data.artifact_path.clone());
        if !std::path::Path::new(&path).exists() {
            return Err(EarncastError::NotReady);
        }
        let service = PredictionService::new(config);
        service.load_from(&path)?;
        Ok(service)
    }
}
