//! Animal shelter outcome CLI
//!
//! Train an outcome classifier on shelter records, predict outcome
//! probabilities for new animals and serve predictions over HTTP.

use clap::{Parser, Subcommand};
use shelter::predict::OutputFormat;
use shelter::{Config, KeyColumn, Result};

#[derive(Parser)]
#[command(name = "shelter")]
#[command(about = "Animal shelter outcome prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Train the outcome model on a labelled CSV
    Train {
        /// Training data (CSV with an OutcomeType column)
        input: String,
        /// Where to write the model (defaults to data.model_path)
        model: Option<String>,
    },
    /// Predict outcome probabilities for a CSV of animals
    Predict {
        /// Animals to score (CSV)
        input: String,
        /// Trained model (defaults to data.model_path)
        model: Option<String>,
        /// Output file; printed to stdout when omitted
        output: Option<String>,
        /// Output format
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
        /// Column used to key the output rows (name or id)
        #[arg(long)]
        key: Option<KeyColumn>,
    },
    /// Serve predictions over HTTP
    Serve {
        /// Trained model (defaults to data.model_path)
        #[arg(long)]
        model: Option<String>,
        /// Listen address (defaults to server.listen_addr)
        #[arg(long)]
        addr: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
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

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Train { input, model } => commands::train(&config, &input, model),
        Commands::Predict {
            input,
            model,
            output,
            format,
            key,
        } => commands::predict(&config, &input, model, output, format, key),
        Commands::Serve { model, addr } => commands::serve(&config, model, addr),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use shelter::predict::{predict_from_path, PredictionFormat, Predictor};
    use shelter::serve::{AppState, ModelService};
    use shelter::training::train_from_path;
    use shelter::{InferenceBackend, ShelterError};
    use std::io::Write;
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn model_path(config: &Config, model: Option<String>) -> PathBuf {
        PathBuf::from(model.unwrap_or_else(|| config.data.model_path.clone()))
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("output")?;
        println!("Created output/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'shelter train data/train.csv' to train the model");
        println!("  3. Run 'shelter predict data/test.csv' to score new animals");
        println!("  4. Run 'shelter serve' to start the HTTP API");

        Ok(())
    }

    pub fn train(config: &Config, input: &str, model: Option<String>) -> Result<()> {
        let model_path = model_path(config, model);
        let report = train_from_path(Path::new(input), &model_path, config)?;

        println!("\n=== Training Summary ===");
        println!("Rows:     {}", report.n_rows);
        println!("Classes:  {}", report.classes.join(", "));
        println!("Features: {}", report.feature_names.len());

        if !report.grid.is_empty() {
            println!("\nCross-validated log-loss:");
            for point in &report.grid {
                let marker = if point.regularization == report.regularization {
                    " *"
                } else {
                    ""
                };
                println!("  {}{}", point, marker);
            }
        }

        println!("\nChosen C:  {}", report.regularization);
        println!("Train fit: {}", report.train_metrics);
        println!("Model saved to {}", model_path.display());
        Ok(())
    }

    pub fn predict(
        config: &Config,
        input: &str,
        model: Option<String>,
        output: Option<String>,
        format: OutputFormat,
        key: Option<KeyColumn>,
    ) -> Result<()> {
        let model_path = model_path(config, model);
        let key = key.unwrap_or(config.data.key_column);

        let predictions = predict_from_path(Path::new(input), &model_path, key)?;
        let bytes = format.formatter().render(&predictions)?;

        match output {
            Some(path) => {
                if let Some(parent) = Path::new(&path).parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &bytes)?;
                println!("Wrote {} predictions to {}", predictions.len(), path);
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    pub fn serve(config: &Config, model: Option<String>, addr: Option<String>) -> Result<()> {
        let model_path = model_path(config, model);
        let addr = addr.unwrap_or_else(|| config.server.listen_addr.clone());
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| ShelterError::Config(format!("Invalid listen address {}: {}", addr, e)))?;

        let predictor = Predictor::<InferenceBackend>::load(&model_path, &Default::default())?
            .with_key(config.data.key_column);
        predictor.check_schema(&config.features)?;
        let state = AppState::new(Arc::new(ModelService::new(predictor)));

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(shelter::serve::run(addr, state))
    }
}
