//! Partitioned Parquet writer for enriched batches.
//!
//! Output layout is hive-style, partitioned by ticker then expiration:
//!
//! ```text
//! <out>/ticker=SPY/expiration=2025-07-18/part-0.parquet
//! ```
//!
//! so a query for one ticker/expiry reads one directory instead of the
//! whole dataset. Files are zstd-compressed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tracing::{info, warn};

use super::types::OptionContractRecord;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Nothing to write: empty batch")]
    EmptyBatch,

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes enriched records as partitioned Parquet.
pub struct ChainWriter {
    output_dir: PathBuf,
}

impl ChainWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Persist a batch, one file per (ticker, expiration) partition.
    /// Returns the written file paths.
    pub fn write_batch(
        &self,
        records: &[OptionContractRecord],
    ) -> Result<Vec<PathBuf>, WriterError> {
        if records.is_empty() {
            return Err(WriterError::EmptyBatch);
        }

        // BTreeMap for deterministic partition order
        let mut partitions: BTreeMap<(String, NaiveDate), Vec<&OptionContractRecord>> =
            BTreeMap::new();
        for record in records {
            partitions
                .entry((record.ticker.clone(), record.expiration))
                .or_default()
                .push(record);
        }

        let mut written = Vec::with_capacity(partitions.len());
        for ((ticker, expiration), partition) in &partitions {
            match self.write_partition(ticker, *expiration, partition) {
                Ok(path) => written.push(path),
                Err(e) => {
                    // A batch persists whole or not at all
                    warn!(
                        ticker = %ticker,
                        expiration = %expiration,
                        rolled_back = written.len(),
                        "partition write failed, removing partial batch"
                    );
                    remove_written(&written);
                    return Err(e);
                }
            }
        }

        Ok(written)
    }

    fn write_partition(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        partition: &[&OptionContractRecord],
    ) -> Result<PathBuf, WriterError> {
        let dir = self
            .output_dir
            .join(format!("ticker={}", ticker))
            .join(format!("expiration={}", expiration));
        fs::create_dir_all(&dir)?;

        let path = dir.join("part-0.parquet");
        let mut df = records_to_dataframe(partition)?;
        write_parquet(&path, &mut df)?;

        info!(
            ticker = %ticker,
            expiration = %expiration,
            rows = partition.len(),
            file = %path.display(),
            "wrote partition"
        );
        Ok(path)
    }
}

/// Best-effort removal of partition files and their now-empty directories.
fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        let _ = fs::remove_file(path);
        if let Some(expiration_dir) = path.parent() {
            let _ = fs::remove_dir(expiration_dir);
            if let Some(ticker_dir) = expiration_dir.parent() {
                let _ = fs::remove_dir(ticker_dir);
            }
        }
    }
}

fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<(), WriterError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(Some(ZstdLevel::try_new(3)?)))
        .finish(df)?;
    Ok(())
}

/// Flatten records into the output schema: raw columns first, derived
/// analytics after, nulls preserved as nulls (never sentinels).
fn records_to_dataframe(records: &[&OptionContractRecord]) -> Result<DataFrame, WriterError> {
    let n = records.len();
    let mut contract_symbol: Vec<&str> = Vec::with_capacity(n);
    let mut ticker: Vec<&str> = Vec::with_capacity(n);
    let mut expiration: Vec<String> = Vec::with_capacity(n);
    let mut option_type: Vec<&str> = Vec::with_capacity(n);
    let mut strike: Vec<f64> = Vec::with_capacity(n);
    let mut spot_price: Vec<f64> = Vec::with_capacity(n);
    let mut bid: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut ask: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut last_price: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut volume: Vec<i64> = Vec::with_capacity(n);
    let mut open_interest: Vec<i64> = Vec::with_capacity(n);
    let mut fetch_timestamp: Vec<String> = Vec::with_capacity(n);
    let mut yf_iv: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut dte: Vec<Option<i32>> = Vec::with_capacity(n);
    let mut moneyness: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut mid_price: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut spread_pct: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut volume_oi_ratio: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut implied_volatility: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut is_put: Vec<i32> = Vec::with_capacity(n);

    for r in records {
        contract_symbol.push(&r.contract_symbol);
        ticker.push(&r.ticker);
        expiration.push(r.expiration.to_string());
        option_type.push(r.option_type.as_str());
        strike.push(r.strike.to_f64().unwrap_or_default());
        spot_price.push(r.spot_price.to_f64().unwrap_or_default());
        bid.push(r.bid.and_then(|d| d.to_f64()));
        ask.push(r.ask.and_then(|d| d.to_f64()));
        last_price.push(r.last_price.and_then(|d| d.to_f64()));
        volume.push(r.volume);
        open_interest.push(r.open_interest);
        fetch_timestamp.push(r.fetch_timestamp.to_rfc3339());
        yf_iv.push(r.yf_implied_volatility);
        dte.push(r.dte);
        moneyness.push(r.moneyness);
        mid_price.push(r.mid_price.and_then(|d| d.to_f64()));
        spread_pct.push(r.bid_ask_spread_pct);
        volume_oi_ratio.push(r.volume_oi_ratio);
        implied_volatility.push(r.implied_volatility);
        is_put.push(r.is_put());
    }

    let df = DataFrame::new(vec![
        Series::new("contract_symbol".into(), contract_symbol).into(),
        Series::new("ticker".into(), ticker).into(),
        Series::new("expiration".into(), expiration).into(),
        Series::new("option_type".into(), option_type).into(),
        Series::new("strike".into(), strike).into(),
        Series::new("spot_price".into(), spot_price).into(),
        Series::new("bid".into(), bid).into(),
        Series::new("ask".into(), ask).into(),
        Series::new("last_price".into(), last_price).into(),
        Series::new("volume".into(), volume).into(),
        Series::new("open_interest".into(), open_interest).into(),
        Series::new("fetch_timestamp".into(), fetch_timestamp).into(),
        Series::new("yf_implied_volatility".into(), yf_iv).into(),
        Series::new("dte".into(), dte).into(),
        Series::new("moneyness".into(), moneyness).into(),
        Series::new("mid_price".into(), mid_price).into(),
        Series::new("bid_ask_spread_pct".into(), spread_pct).into(),
        Series::new("volume_oi_ratio".into(), volume_oi_ratio).into(),
        Series::new("implied_volatility".into(), implied_volatility).into(),
        Series::new("is_put".into(), is_put).into(),
    ])?;

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(symbol: &str, ticker: &str, expiration: NaiveDate) -> OptionContractRecord {
        let mut r = OptionContractRecord::new(
            symbol,
            ticker,
            expiration,
            OptionType::Call,
            dec!(500),
            dec!(495),
            Utc::now(),
        );
        r.bid = Some(dec!(4.80));
        r.ask = Some(dec!(5.20));
        r.dte = Some(30);
        r.implied_volatility = Some(0.21);
        r
    }

    #[test]
    fn test_partitioned_layout() {
        let out = std::env::temp_dir().join(format!(
            "chain_etl_writer_test_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        ));

        let june = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let july = NaiveDate::from_ymd_opt(2025, 7, 18).unwrap();
        let batch = vec![
            record("SPY1", "SPY", june),
            record("SPY2", "SPY", july),
            record("QQQ1", "QQQ", june),
        ];

        let written = ChainWriter::new(&out).write_batch(&batch).unwrap();
        assert_eq!(written.len(), 3);
        assert!(out
            .join("ticker=SPY")
            .join("expiration=2025-06-20")
            .join("part-0.parquet")
            .exists());
        assert!(out
            .join("ticker=QQQ")
            .join("expiration=2025-06-20")
            .join("part-0.parquet")
            .exists());

        std::fs::remove_dir_all(&out).unwrap();
    }

    #[test]
    fn test_empty_batch_rejected() {
        let writer = ChainWriter::new(std::env::temp_dir());
        assert!(matches!(
            writer.write_batch(&[]),
            Err(WriterError::EmptyBatch)
        ));
    }

    #[test]
    fn test_failed_batch_leaves_no_partial_output() {
        let out = std::env::temp_dir().join(format!(
            "chain_etl_writer_rollback_test_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&out).unwrap();
        // A plain file where the SPY partition directory should go makes
        // create_dir_all fail after the QQQ partition has been written
        std::fs::write(out.join("ticker=SPY"), b"not a directory").unwrap();

        let july = NaiveDate::from_ymd_opt(2025, 7, 18).unwrap();
        let batch = vec![record("QQQ1", "QQQ", july), record("SPY1", "SPY", july)];

        let result = ChainWriter::new(&out).write_batch(&batch);
        assert!(matches!(result, Err(WriterError::Io(_))));
        assert!(!out
            .join("ticker=QQQ")
            .join("expiration=2025-07-18")
            .join("part-0.parquet")
            .exists());
        assert!(!out.join("ticker=QQQ").exists());

        std::fs::remove_dir_all(&out).unwrap();
    }

    #[test]
    fn test_dataframe_preserves_nulls() {
        let june = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let mut r = record("SPY1", "SPY", june);
        r.bid = None;
        r.implied_volatility = None;

        let df = records_to_dataframe(&[&r]).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("bid").unwrap().null_count(), 1);
        assert_eq!(df.column("implied_volatility").unwrap().null_count(), 1);
        assert_eq!(df.column("strike").unwrap().null_count(), 0);
    }
}
