//! Loader for raw options-chain CSV files.
//!
//! Reads `*_options_raw.csv` files from a landing-zone directory into
//! `OptionContractRecord`s. One row per contract with columns:
//! - contract_symbol, ticker, expiration, option_type
//! - strike, spot_price, bid, ask, last_price
//! - volume, open_interest, fetch_timestamp, yf_implied_volatility
//!
//! Columns are cast explicitly rather than trusting schema inference: a
//! column with occasional junk values would otherwise come back as strings
//! with a far worse error message downstream.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use super::types::{OptionContractRecord, OptionType};

/// Required columns in the raw CSV files.
pub const EXPECTED_COLUMNS: &[&str] = &[
    "contract_symbol",
    "ticker",
    "expiration",
    "option_type",
    "strike",
    "spot_price",
    "bid",
    "ask",
    "last_price",
    "volume",
    "open_interest",
    "fetch_timestamp",
    "yf_implied_volatility",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("No raw files found under {0}")]
    NoInputFiles(String),

    #[error("Missing required column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads the raw CSV landing zone into contract records.
pub struct ChainLoader {
    input_dir: PathBuf,
}

impl ChainLoader {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    /// List raw files (`*_options_raw.csv`), sorted for deterministic batch
    /// ordering.
    pub fn raw_files(&self) -> Result<Vec<PathBuf>, LoaderError> {
        if !self.input_dir.exists() {
            return Err(LoaderError::NoInputFiles(
                self.input_dir.display().to_string(),
            ));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.input_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().ends_with("_options_raw.csv") {
                files.push(entry.path());
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(LoaderError::NoInputFiles(
                self.input_dir.display().to_string(),
            ));
        }
        Ok(files)
    }

    /// Load every raw file into a single ingestion batch.
    pub fn load_batch(&self) -> Result<Vec<OptionContractRecord>, LoaderError> {
        let mut records = Vec::new();
        for path in self.raw_files()? {
            let mut file_records = self.load_file(&path)?;
            info!(
                file = %path.display(),
                rows = file_records.len(),
                "loaded raw chain file"
            );
            records.append(&mut file_records);
        }
        Ok(records)
    }

    /// Load one raw CSV file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<OptionContractRecord>, LoaderError> {
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()?
            .collect()?;

        self.check_columns(&df, path)?;

        let typed = df
            .lazy()
            .with_columns([
                col("strike").cast(DataType::Float64),
                col("spot_price").cast(DataType::Float64),
                col("bid").cast(DataType::Float64),
                col("ask").cast(DataType::Float64),
                col("last_price").cast(DataType::Float64),
                col("volume").cast(DataType::Int64),
                col("open_interest").cast(DataType::Int64),
                col("yf_implied_volatility").cast(DataType::Float64),
            ])
            .collect()?;

        dataframe_to_records(&typed)
    }

    fn check_columns(&self, df: &DataFrame, path: &Path) -> Result<(), LoaderError> {
        let present: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        for column in EXPECTED_COLUMNS {
            if !present.iter().any(|c| c == column) {
                return Err(LoaderError::MissingColumn {
                    file: path.display().to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Parse a fetch timestamp: RFC 3339 first, then a bare UTC datetime.
fn parse_fetch_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert a typed DataFrame into contract records.
///
/// Identity fields (symbol, ticker, expiration, option type, timestamp) are
/// required; a row missing one is a malformed-schema error, not a quality
/// finding. Quote fields stay optional so partial records reach the quality
/// report.
fn dataframe_to_records(df: &DataFrame) -> Result<Vec<OptionContractRecord>, LoaderError> {
    let symbol_col = df.column("contract_symbol")?.str()?;
    let ticker_col = df.column("ticker")?.str()?;
    let expiration_col = df.column("expiration")?.str()?;
    let opt_type_col = df.column("option_type")?.str()?;
    let strike_col = df.column("strike")?.f64()?;
    let spot_col = df.column("spot_price")?.f64()?;
    let bid_col = df.column("bid")?.f64()?;
    let ask_col = df.column("ask")?.f64()?;
    let last_col = df.column("last_price")?.f64()?;
    let volume_col = df.column("volume")?.i64()?;
    let oi_col = df.column("open_interest")?.i64()?;
    let fetch_col = df.column("fetch_timestamp")?.str()?;
    let yf_iv_col = df.column("yf_implied_volatility")?.f64()?;

    let mut records = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let contract_symbol = symbol_col
            .get(idx)
            .ok_or_else(|| LoaderError::InvalidData(format!("row {}: null contract_symbol", idx)))?;
        let ticker = ticker_col
            .get(idx)
            .ok_or_else(|| LoaderError::InvalidData(format!("row {}: null ticker", idx)))?;

        let expiration = expiration_col
            .get(idx)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| {
                LoaderError::InvalidData(format!("{}: unparseable expiration", contract_symbol))
            })?;

        let option_type = opt_type_col
            .get(idx)
            .and_then(OptionType::from_str)
            .ok_or_else(|| {
                LoaderError::InvalidData(format!("{}: unknown option_type", contract_symbol))
            })?;

        let fetch_timestamp = fetch_col
            .get(idx)
            .and_then(parse_fetch_timestamp)
            .ok_or_else(|| {
                LoaderError::InvalidData(format!("{}: unparseable fetch_timestamp", contract_symbol))
            })?;

        let strike = strike_col
            .get(idx)
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| {
                LoaderError::InvalidData(format!("{}: missing strike", contract_symbol))
            })?;
        let spot_price = spot_col
            .get(idx)
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| {
                LoaderError::InvalidData(format!("{}: missing spot_price", contract_symbol))
            })?;

        let mut record = OptionContractRecord::new(
            contract_symbol,
            ticker,
            expiration,
            option_type,
            strike,
            spot_price,
            fetch_timestamp,
        );

        record.bid = bid_col.get(idx).and_then(Decimal::from_f64_retain);
        record.ask = ask_col.get(idx).and_then(Decimal::from_f64_retain);
        record.last_price = last_col.get(idx).and_then(Decimal::from_f64_retain);
        record.volume = volume_col.get(idx).unwrap_or(0);
        record.open_interest = oi_col.get(idx).unwrap_or(0);
        record.yf_implied_volatility = yf_iv_col.get(idx);

        records.push(record);
    }

    Ok(records)
}
