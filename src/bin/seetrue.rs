//! SeeTrue CLI - command-line interface for the SeeTrue engine
//!
//! Commands:
//! - clean: run the cleaning pipeline on a recording export
//! - classify: run a full classification job against a classifier endpoint
//! - schema: print the canonical column set and accepted header aliases

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use seetrue_engine::config::DEFAULT_CLASSIFIER_ENDPOINT;
use seetrue_engine::{
    clean_file, schema, write_cleaned_csv, Engine, EngineConfig, HttpClassifier,
    DEFAULT_BATCH_SIZE, ENGINE_VERSION,
};

/// SeeTrue - clean eye-tracking exports and classify session activity
#[derive(Parser)]
#[command(name = "seetrue")]
#[command(author = "SeeTrue Labs")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Clean eye-tracking exports and classify session activity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cleaning pipeline and write the cleaned CSV
    Clean {
        /// Input CSV path (`;`-delimited export)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the cleaned CSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Submit a recording for classification and wait for the result
    Classify {
        /// Input CSV path
        #[arg(short, long)]
        input: PathBuf,

        /// Classifier prediction endpoint
        #[arg(long, default_value = DEFAULT_CLASSIFIER_ENDPOINT)]
        endpoint: String,

        /// Rows per classifier call
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Directory the upload is staged in while the job runs
        #[arg(long, default_value = "staging")]
        staging_dir: PathBuf,

        /// Keep the cleaned copy next to the staged file
        #[arg(long)]
        keep_cleaned: bool,
    },

    /// Print the canonical column set and accepted header aliases
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Clean { input, output } => {
            let table = clean_file(&input)?;
            write_cleaned_csv(&table, &output)?;

            eprintln!(
                "cleaned {} rows into {} ({} columns, {} flags)",
                table.n_rows,
                output.display(),
                table.retained_columns().len(),
                table.flags.len()
            );
            for flag in &table.flags {
                eprintln!("  flag: {flag:?}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Classify {
            input,
            endpoint,
            batch_size,
            staging_dir,
            keep_cleaned,
        } => {
            let contents = std::fs::read(&input)?;
            let file_name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.csv".to_string());

            let config = EngineConfig::default()
                .with_classifier_endpoint(endpoint.clone())
                .with_batch_size(batch_size)
                .with_staging_dir(staging_dir)
                .with_persist_cleaned(keep_cleaned);
            let classifier = Arc::new(HttpClassifier::new(endpoint)?);
            let engine = Engine::new(config, classifier);

            let receipt = engine.submit(&file_name, &contents, Some(batch_size)).await?;
            eprintln!("{} (key {})", receipt.message, receipt.key);

            let view = loop {
                let view = engine.result(&receipt.key).await?;
                if view.status.is_terminal() {
                    break view;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            };

            println!("{}", serde_json::to_string_pretty(&view)?);
            match view.status {
                seetrue_engine::JobStatus::Complete => Ok(ExitCode::SUCCESS),
                _ => Ok(ExitCode::FAILURE),
            }
        }

        Commands::Schema { json } => {
            if json {
                let value = serde_json::json!({
                    "canonical_columns": schema::CANONICAL_COLUMNS,
                    "header_aliases": schema::column_mapping()
                        .iter()
                        .map(|(alias, canonical)| serde_json::json!({
                            "alias": alias,
                            "canonical": canonical,
                        }))
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("canonical columns:");
                for column in schema::CANONICAL_COLUMNS {
                    println!("  {column}");
                }
                println!("accepted header aliases (after normalization):");
                for (alias, canonical) in schema::column_mapping() {
                    println!("  {alias} -> {canonical}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
