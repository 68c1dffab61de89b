//! End-to-end batch pipeline.
//!
//! load -> enrich -> quality gate -> persist. The quality verdict gates
//! persistence: an ERROR-level report blocks the Parquet write but the
//! report is still returned in full for diagnosis. WARN findings are logged
//! and persistence proceeds.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::{LazyFrame, PolarsError, ScanArgsParquet};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::data::{ChainLoader, ChainWriter, LoaderError, OptionContractRecord, WriterError};
use crate::metrics::enrich_batch;
use crate::quality::{QualityEngine, QualityError, QualityReport};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Load failed: {0}")]
    Loader(#[from] LoaderError),

    #[error("Quality evaluation failed: {0}")]
    Quality(#[from] QualityError),

    #[error("Write failed: {0}")]
    Writer(#[from] WriterError),

    #[error("No partitioned output under {0}")]
    NoOutput(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a pipeline run produced. `persisted` is false when the quality
/// gate failed; the report is always present.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub record_count: usize,
    pub report: QualityReport,
    pub persisted: bool,
    pub written_files: Vec<PathBuf>,
}

/// Enrich a raw batch and evaluate quality, without touching storage.
/// Shared by the full run and the validate-only command.
pub fn enrich_and_evaluate(
    records: Vec<OptionContractRecord>,
    as_of: NaiveDate,
    cfg: &PipelineConfig,
) -> Result<(Vec<OptionContractRecord>, QualityReport), PipelineError> {
    info!(records = records.len(), %as_of, "enriching batch");
    let enriched = enrich_batch(records, as_of, cfg);

    let engine = QualityEngine::new(cfg.quality.clone());
    let report = engine.evaluate(&enriched)?;
    Ok((enriched, report))
}

/// Full pipeline: read the landing zone, derive metrics, evaluate quality,
/// and persist partitioned Parquet when the batch passes.
pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    as_of: NaiveDate,
    cfg: &PipelineConfig,
) -> Result<PipelineOutcome, PipelineError> {
    let loader = ChainLoader::new(input_dir);
    let batch = loader.load_batch()?;
    let record_count = batch.len();

    let (enriched, report) = enrich_and_evaluate(batch, as_of, cfg)?;

    if !report.passed() {
        warn!(
            errors = report.error_count(),
            warnings = report.warn_count(),
            "quality gate failed, batch will not be persisted"
        );
        return Ok(PipelineOutcome {
            record_count,
            report,
            persisted: false,
            written_files: Vec::new(),
        });
    }

    let writer = ChainWriter::new(output_dir);
    let written_files = writer.write_batch(&enriched)?;
    info!(
        partitions = written_files.len(),
        warnings = report.warn_count(),
        "batch persisted"
    );

    Ok(PipelineOutcome {
        record_count,
        report,
        persisted: true,
        written_files,
    })
}

/// Row counts and IV coverage for one persisted partition.
#[derive(Debug)]
pub struct PartitionSummary {
    pub ticker: String,
    pub expiration: String,
    pub rows: usize,
    pub iv_nulls: usize,
    pub path: PathBuf,
}

impl PartitionSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} rows ({} null IV) - {}",
            self.ticker,
            self.expiration,
            self.rows,
            self.iv_nulls,
            self.path.display()
        )
    }
}

/// List hive-style partition directories (`<prefix>=<value>`) under a path,
/// sorted for deterministic output.
fn partition_values(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>, PipelineError> {
    let mut values = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(value) = name.strip_prefix(prefix) {
            values.push((value.to_string(), entry.path()));
        }
    }
    values.sort();
    Ok(values)
}

/// Read back a partitioned output directory and summarize each
/// ticker/expiration partition: row count and how many rows carry a null
/// implied volatility.
pub fn inspect_output(output_dir: &Path) -> Result<Vec<PartitionSummary>, PipelineError> {
    if !output_dir.exists() {
        return Err(PipelineError::NoOutput(output_dir.display().to_string()));
    }

    let mut summaries = Vec::new();
    for (ticker, ticker_dir) in partition_values(output_dir, "ticker=")? {
        for (expiration, expiration_dir) in partition_values(&ticker_dir, "expiration=")? {
            for entry in fs::read_dir(&expiration_dir)? {
                let path = entry?.path();
                if path.extension().map(|x| x == "parquet").unwrap_or(false) {
                    let df = LazyFrame::scan_parquet(&path, ScanArgsParquet::default())?
                        .collect()?;
                    summaries.push(PartitionSummary {
                        ticker: ticker.clone(),
                        expiration: expiration.clone(),
                        rows: df.height(),
                        iv_nulls: df.column("implied_volatility")?.null_count(),
                        path,
                    });
                }
            }
        }
    }

    if summaries.is_empty() {
        return Err(PipelineError::NoOutput(output_dir.display().to_string()));
    }
    Ok(summaries)
}
