//! Data-quality rule registry.
//!
//! Rules are data, not control flow: each entry names a condition, a scope
//! (per-record or batch-aggregate) and a severity, and the engine walks the
//! tables. Adding or removing a rule never touches evaluation logic.
//!
//! Severity follows one line: WARN marks a single bad observation (stale
//! quote, illiquid contract), ERROR marks a structural pipeline problem
//! (crossed quotes, expired rows in output, the IV solver degrading en
//! masse).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;
use crate::data::OptionContractRecord;

/// Finding severity. ERROR blocks downstream persistence; WARN is
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Whether a rule looks at one record or at the batch as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Record,
    Batch,
}

/// A per-record rule: the predicate returns true when the record violates
/// the rule.
pub struct RecordRule {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub predicate: fn(&OptionContractRecord, &QualityConfig) -> bool,
}

/// A batch-aggregate rule: the observed rate is compared against a
/// configured threshold after the per-record pass.
pub struct AggregateRule {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub observed_rate: fn(&[OptionContractRecord]) -> f64,
    pub threshold: fn(&QualityConfig) -> f64,
}

fn null_or_zero_bid(r: &OptionContractRecord, _cfg: &QualityConfig) -> bool {
    match r.bid {
        None => true,
        Some(b) => b <= Decimal::ZERO,
    }
}

fn bid_ask_inversion(r: &OptionContractRecord, _cfg: &QualityConfig) -> bool {
    matches!((r.bid, r.ask), (Some(b), Some(a)) if b > a)
}

fn negative_dte(r: &OptionContractRecord, _cfg: &QualityConfig) -> bool {
    r.dte.map_or(false, |d| d < 0)
}

fn volume_oi_outlier(r: &OptionContractRecord, cfg: &QualityConfig) -> bool {
    r.volume_oi_ratio
        .map_or(false, |ratio| ratio > cfg.volume_oi_outlier_threshold)
}

fn iv_null_rate_threshold(cfg: &QualityConfig) -> f64 {
    cfg.iv_null_rate_threshold
}

fn iv_null_rate(records: &[OptionContractRecord]) -> f64 {
    let nulls = records
        .iter()
        .filter(|r| r.implied_volatility.is_none())
        .count();
    nulls as f64 / records.len() as f64
}

/// All per-record rules, evaluated in order.
pub const RECORD_RULES: &[RecordRule] = &[
    RecordRule {
        name: "null_or_zero_bid",
        description: "Bid is null or zero - contract is stale or illiquid",
        severity: Severity::Warn,
        predicate: null_or_zero_bid,
    },
    RecordRule {
        name: "bid_ask_inversion",
        description: "Bid exceeds ask - crossed quote, hard data error",
        severity: Severity::Error,
        predicate: bid_ask_inversion,
    },
    RecordRule {
        name: "negative_dte",
        description: "Expired contract (DTE < 0) present in output",
        severity: Severity::Error,
        predicate: negative_dte,
    },
    RecordRule {
        name: "volume_oi_outlier",
        description: "Volume exceeds the open-interest outlier threshold - unusual activity or stale OI",
        severity: Severity::Warn,
        predicate: volume_oi_outlier,
    },
];

/// All batch-aggregate rules.
pub const AGGREGATE_RULES: &[AggregateRule] = &[AggregateRule {
    name: "iv_null_rate",
    description: "Fraction of contracts with null implied volatility exceeds tolerance - \
                  some nulls are expected deep OTM/ITM, high rates indicate a systemic issue",
    severity: Severity::Error,
    observed_rate: iv_null_rate,
    threshold: iv_null_rate_threshold,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn record() -> OptionContractRecord {
        OptionContractRecord::new(
            "AAPL250620P00200000",
            "AAPL",
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            OptionType::Put,
            dec!(200),
            dec!(195.5),
            Utc::now(),
        )
    }

    #[test]
    fn test_null_or_zero_bid() {
        let cfg = QualityConfig::default();
        let mut r = record();
        assert!(null_or_zero_bid(&r, &cfg));

        r.bid = Some(dec!(0));
        assert!(null_or_zero_bid(&r, &cfg));

        r.bid = Some(dec!(0.05));
        assert!(!null_or_zero_bid(&r, &cfg));
    }

    #[test]
    fn test_bid_ask_inversion_requires_both_sides() {
        let cfg = QualityConfig::default();
        let mut r = record();
        r.bid = Some(dec!(5));
        assert!(!bid_ask_inversion(&r, &cfg));

        r.ask = Some(dec!(3));
        assert!(bid_ask_inversion(&r, &cfg));

        r.ask = Some(dec!(5));
        assert!(!bid_ask_inversion(&r, &cfg));
    }

    #[test]
    fn test_negative_dte_only_fires_when_derived() {
        let cfg = QualityConfig::default();
        let mut r = record();
        // Not yet enriched: no finding
        assert!(!negative_dte(&r, &cfg));

        r.dte = Some(-3);
        assert!(negative_dte(&r, &cfg));

        r.dte = Some(0);
        assert!(!negative_dte(&r, &cfg));
    }

    #[test]
    fn test_volume_oi_outlier_threshold() {
        let cfg = QualityConfig::default();
        let mut r = record();
        r.volume_oi_ratio = Some(0.9);
        assert!(!volume_oi_outlier(&r, &cfg));

        r.volume_oi_ratio = Some(1.5);
        assert!(volume_oi_outlier(&r, &cfg));

        // Undefined ratio (zero OI) is not an outlier
        r.volume_oi_ratio = None;
        assert!(!volume_oi_outlier(&r, &cfg));
    }

    #[test]
    fn test_iv_null_rate_aggregate() {
        let mut batch = Vec::new();
        for i in 0..10 {
            let mut r = record();
            r.contract_symbol = format!("AAPL{}", i);
            if i < 3 {
                r.implied_volatility = None;
            } else {
                r.implied_volatility = Some(0.25);
            }
            batch.push(r);
        }
        assert!((iv_null_rate(&batch) - 0.3).abs() < 1e-12);
    }
}
