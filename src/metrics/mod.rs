//! Metrics engine.
//!
//! Pure per-contract analytics:
//! - DTE, moneyness, mid price
//! - Bid-ask spread %, volume/OI ratio
//! - Implied volatility via Black-Scholes inversion

pub mod black_scholes;
pub mod engine;

pub use black_scholes::BlackScholes;
pub use engine::{
    compute_dte, compute_metrics, compute_mid, compute_moneyness, compute_spread_pct,
    compute_volume_oi_ratio, enrich_batch,
};
