//! argo-prep - ARGO-DeepMSI data preparation
//!
//! Builds the clinical and slide tables consumed by the MSI training
//! pipeline from REDCap records, Halo Link exports and the feature cache.

use anyhow::{Context, Result};
use argo_common::config::TomlConfig;
use argo_common::StatusVocabulary;
use argo_prep::settings::resolve_redcap_credentials;
use argo_prep::workflow::{self, RecordSource};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line arguments for argo-prep
#[derive(Parser, Debug)]
#[command(name = "argo-prep")]
#[command(about = "Prepare clinical and slide tables for MSI prediction")]
#[command(version)]
struct Args {
    /// Configuration file (default: ARGO_CONFIG, then ~/.config/argo-prep/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (overrides [logging] level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// REDCap API URL
    #[arg(long, global = true)]
    redcap_url: Option<String>,

    /// REDCap API token
    #[arg(long, global = true)]
    redcap_token: Option<String>,

    /// Read records from a saved REDCap JSON export instead of the API
    #[arg(long, global = true, value_name = "FILE")]
    redcap_json: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage 0: build, reconcile, chart and split the cohort tables
    Process,
    /// Stage 2: report feature extraction progress and write training tables
    Evaluate,
    /// Write the legacy per-institution cohort tables
    Collect {
        /// Status vocabulary version (overrides [clinical] settings)
        #[arg(long)]
        vocabulary: Option<String>,
    },
    /// Rewrite a clinical table's status labels for the training tool
    Relabel {
        /// Clinical table to relabel (default: <tables>/2/all_clinical_table.csv)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file (default: <input stem>_<[relabel] output_suffix>.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check raw and processed slide files per institution
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is resolved before logging so its level can apply; the source
    // and any load error are reported after the subscriber is up.
    let resolved = TomlConfig::resolve(args.config.as_deref());
    let level = args
        .log_level
        .clone()
        .or_else(|| resolved.as_ref().ok().map(|(c, _)| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    info!(
        "argo-prep v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (config, source) = resolved.context("Failed to load configuration")?;
    source.log();

    match &args.command {
        Command::Process => {
            let records = record_source(&args, &config)?;
            let outcome = workflow::run_process(&config, &records)
                .await
                .context("process failed")?;
            let audit = &outcome.audit;
            info!(
                "Processing complete: {} patients, {} slides across {} sites",
                audit.final_patients,
                audit.final_slides,
                outcome.sites.len()
            );
            info!(
                "Dropped {} patients without status, {} orphan slides, {} patients without slides",
                audit.patients_missing_status(),
                audit.orphan_slides(),
                audit.patients_without_slides()
            );
        }
        Command::Evaluate => {
            let outcome = workflow::run_evaluate(&config).context("evaluate failed")?;
            println!("{}", outcome.console_table);
            info!(
                "Processing analysis complete: {}/{} slides have features",
                outcome.processed_slides, outcome.total_slides
            );
        }
        Command::Collect { vocabulary } => {
            let records = record_source(&args, &config)?;
            let vocabulary = vocabulary
                .as_deref()
                .map(|version| {
                    StatusVocabulary::builtin(version)
                        .with_context(|| format!("unknown status vocabulary '{}'", version))
                })
                .transpose()?;
            let cohorts = workflow::run_collect(&config, &records, vocabulary)
                .await
                .context("collect failed")?;
            for cohort in &cohorts {
                info!(
                    "{}: {} patients, {} slides",
                    cohort.name,
                    cohort.clinical.len(),
                    cohort.slides.len()
                );
            }
        }
        Command::Relabel { input, output } => {
            let input = input.clone().unwrap_or_else(|| {
                workflow::OutputLayout::from_config(&config.paths)
                    .tables(workflow::Stage::Evaluate)
                    .join(workflow::evaluate::ALL_CLINICAL_FILE)
            });
            let written = workflow::run_relabel(&input, output.as_deref(), &config.relabel)
                .with_context(|| format!("relabel of {} failed", input.display()))?;
            info!("Saved relabeled table to {}", written.display());
        }
        Command::Validate => {
            info!("Starting validation...");
            let reports = workflow::run_validate(&config).context("validate failed")?;
            for report in &reports {
                print!("{}", report.render());
            }
            if reports.iter().any(|r| !r.is_clean()) {
                warn!("Validation found missing files or processing errors");
            }
        }
    }

    Ok(())
}

/// Saved export when given, otherwise the REDCap API
fn record_source(args: &Args, config: &TomlConfig) -> Result<RecordSource> {
    if let Some(path) = &args.redcap_json {
        return Ok(RecordSource::File(path.clone()));
    }
    let credentials = resolve_redcap_credentials(
        args.redcap_url.as_deref(),
        args.redcap_token.as_deref(),
        &config.redcap,
    )?;
    Ok(RecordSource::Api(credentials))
}
