//! Core record types for the options-chain pipeline.
//!
//! One `OptionContractRecord` is one quoted contract at one fetch instant.
//! Raw market fields are captured as acquired and never recomputed; derived
//! analytics are `Option` fields written exclusively by the metrics engine,
//! so a missing value is an observable state rather than a sentinel.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }

    /// Intrinsic value at the given spot.
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (spot - strike).max(0.0),
            Self::Put => (strike - spot).max(0.0),
        }
    }
}

/// A single quoted option contract.
///
/// Raw fields come from the market-data feed. Derived fields start as
/// `None` and are populated by [`crate::metrics::compute_metrics`]; the
/// engine takes the record by value and returns an augmented copy, so raw
/// fields are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContractRecord {
    // --- Identity ---
    /// Exchange contract symbol, unique within a fetch batch.
    pub contract_symbol: String,

    /// Underlying ticker (e.g., "SPY").
    pub ticker: String,

    /// Contract expiration date.
    pub expiration: NaiveDate,

    /// Call or put.
    pub option_type: OptionType,

    // --- Raw market fields ---
    /// Strike price.
    pub strike: Decimal,

    /// Underlying spot price at fetch time.
    pub spot_price: Decimal,

    /// Bid price, if the feed supplied one.
    pub bid: Option<Decimal>,

    /// Ask price, if the feed supplied one.
    pub ask: Option<Decimal>,

    /// Last traded price. Can be stale for illiquid contracts, so it is
    /// never used as the IV solver input.
    pub last_price: Option<Decimal>,

    /// Trading volume.
    pub volume: i64,

    /// Open interest.
    pub open_interest: i64,

    /// Instant the quote was fetched.
    pub fetch_timestamp: DateTime<Utc>,

    /// Implied volatility as reported by the upstream feed. Reference only,
    /// for comparison against our own inversion.
    pub yf_implied_volatility: Option<f64>,

    // --- Derived fields (metrics engine only) ---
    /// Days to expiration. Negative for expired contracts; surfaced, not
    /// clamped, so the quality layer can flag them.
    pub dte: Option<i32>,

    /// Strike / spot.
    pub moneyness: Option<f64>,

    /// (bid + ask) / 2, exact.
    pub mid_price: Option<Decimal>,

    /// (ask - bid) / mid.
    pub bid_ask_spread_pct: Option<f64>,

    /// Volume / open interest.
    pub volume_oi_ratio: Option<f64>,

    /// Black-Scholes implied volatility at the mid price.
    pub implied_volatility: Option<f64>,
}

impl OptionContractRecord {
    /// Create a record with raw identity and market fields; derived fields
    /// start empty.
    pub fn new(
        contract_symbol: impl Into<String>,
        ticker: impl Into<String>,
        expiration: NaiveDate,
        option_type: OptionType,
        strike: Decimal,
        spot_price: Decimal,
        fetch_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            contract_symbol: contract_symbol.into(),
            ticker: ticker.into(),
            expiration,
            option_type,
            strike,
            spot_price,
            bid: None,
            ask: None,
            last_price: None,
            volume: 0,
            open_interest: 0,
            fetch_timestamp,
            yf_implied_volatility: None,
            dte: None,
            moneyness: None,
            mid_price: None,
            bid_ask_spread_pct: None,
            volume_oi_ratio: None,
            implied_volatility: None,
        }
    }

    /// Put flag as an integer, for downstream put/call aggregation.
    pub fn is_put(&self) -> i32 {
        match self.option_type {
            OptionType::Put => 1,
            OptionType::Call => 0,
        }
    }
}
