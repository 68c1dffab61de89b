//! # Enrich a landing zone and persist partitioned Parquet
//! chain-etl run --input data/raw --output data/output
//!
//! # Enrich and report quality without writing anything
//! chain-etl validate --input data/raw
//!
//! # Summarize previously persisted partitions
//! chain-etl inspect --output data/output
//!
//! With `--config pipeline.toml` to override rates and thresholds, and
//! `--as-of YYYY-MM-DD` to pin the valuation date (defaults to today).

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use chain_etl::config::PipelineConfig;
use chain_etl::data::ChainLoader;
use chain_etl::pipeline;
use chain_etl::quality::QualityReport;

#[derive(Parser)]
#[command(name = "chain-etl")]
#[command(about = "Options-chain enrichment pipeline with a data-quality gate")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Valuation date (YYYY-MM-DD); defaults to today
    #[arg(long, global = true)]
    as_of: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich raw chain files and persist Parquet if the quality gate passes
    Run {
        /// Directory containing *_options_raw.csv files
        #[arg(short, long, default_value = "data/raw")]
        input: String,

        /// Root directory for partitioned Parquet output
        #[arg(short, long, default_value = "data/output")]
        output: String,
    },

    /// Enrich raw chain files and print the quality report, writing nothing
    Validate {
        /// Directory containing *_options_raw.csv files
        #[arg(short, long, default_value = "data/raw")]
        input: String,
    },

    /// Summarize an existing partitioned output directory
    Inspect {
        /// Root directory of partitioned Parquet output
        #[arg(short, long, default_value = "data/output")]
        output: String,
    },
}

fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_path(p).with_context(|| format!("loading config {}", p)),
        None => Ok(PipelineConfig::default()),
    }
}

fn parse_as_of(arg: Option<&str>) -> Result<NaiveDate> {
    match arg {
        Some(s) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").context("Invalid --as-of date format")
        }
        None => Ok(Utc::now().date_naive()),
    }
}

fn print_report(report: &QualityReport) {
    println!("\n---- Quality Report ----");
    for outcome in &report.outcomes {
        println!("  {}", outcome.summary());
    }
    println!("  {}", report.summary());
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chain_etl=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    let as_of = parse_as_of(cli.as_of.as_deref())?;

    match cli.command {
        Commands::Run { input, output } => {
            let outcome = pipeline::run(input.as_ref(), output.as_ref(), as_of, &cfg)?;
            print_report(&outcome.report);

            if !outcome.persisted {
                bail!("quality gate failed: output was not persisted");
            }
            println!(
                "\nPersisted {} records across {} partitions under {}",
                outcome.record_count,
                outcome.written_files.len(),
                output
            );
        }
        Commands::Validate { input } => {
            let batch = ChainLoader::new(input.as_str()).load_batch()?;
            let (_, report) = pipeline::enrich_and_evaluate(batch, as_of, &cfg)?;
            print_report(&report);

            if !report.passed() {
                bail!("quality gate failed");
            }
        }
        Commands::Inspect { output } => {
            let summaries = pipeline::inspect_output(output.as_ref())?;

            println!("\n---- Partitions under {} ----", output);
            for summary in &summaries {
                println!("  {}", summary.summary());
            }
            let rows: usize = summaries.iter().map(|s| s.rows).sum();
            let iv_nulls: usize = summaries.iter().map(|s| s.iv_nulls).sum();
            println!(
                "  {} partitions, {} rows total ({} null IV)",
                summaries.len(),
                rows,
                iv_nulls
            );
        }
    }

    Ok(())
}
