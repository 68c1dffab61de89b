//! Options-chain enrichment pipeline.
//!
//! Takes raw options-chain quotes, derives per-contract analytics (DTE,
//! moneyness, mid price, spread %, volume/OI ratio, Black-Scholes implied
//! volatility), runs a severity-classified data-quality rule set over the
//! enriched batch, and persists partitioned Parquet only when the batch
//! passes the quality gate.

pub mod config;
pub mod data;
pub mod metrics;
pub mod pipeline;
pub mod quality;

// Re-export commonly used types
pub use config::{PipelineConfig, QualityConfig, SolverConfig};
pub use data::{ChainLoader, ChainWriter, OptionContractRecord, OptionType};
pub use metrics::{compute_metrics, enrich_batch, BlackScholes};
pub use pipeline::{PartitionSummary, PipelineError, PipelineOutcome};
pub use quality::{QualityEngine, QualityError, QualityReport, RuleOutcome, Severity};
