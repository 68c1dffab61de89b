//! Quality engine.
//!
//! Rule registry, per-batch evaluation, and the severity-classified report
//! whose verdict gates persistence.

pub mod engine;
pub mod report;
pub mod rules;

pub use engine::{QualityEngine, QualityError};
pub use report::{QualityReport, RuleOutcome};
pub use rules::{RuleScope, Severity, AGGREGATE_RULES, RECORD_RULES};
