//! Quality rule evaluation.
//!
//! Two passes over an enriched batch: every per-record rule collects its
//! violating symbols, then the batch-aggregate rules run as a single
//! reduction. Malformed data is exactly what this engine exists to report,
//! so it never errors on bad values; it errors only on structural contract
//! violations (empty batch, duplicate symbol) that indicate an upstream
//! bug.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::QualityConfig;
use crate::data::OptionContractRecord;

use super::report::{QualityReport, RuleOutcome};
use super::rules::{RuleScope, AGGREGATE_RULES, RECORD_RULES};

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("Empty batch: quality evaluation requires at least one record")]
    EmptyBatch,

    #[error("Duplicate contract_symbol within batch: {0}")]
    DuplicateSymbol(String),
}

/// Evaluates the rule registry against enriched batches.
pub struct QualityEngine {
    cfg: QualityConfig,
}

impl QualityEngine {
    pub fn new(cfg: QualityConfig) -> Self {
        Self { cfg }
    }

    /// Run all rules against a batch and produce the report.
    pub fn evaluate(
        &self,
        batch: &[OptionContractRecord],
    ) -> Result<QualityReport, QualityError> {
        if batch.is_empty() {
            return Err(QualityError::EmptyBatch);
        }
        self.check_unique_symbols(batch)?;

        let total = batch.len();
        let mut outcomes = Vec::with_capacity(RECORD_RULES.len() + AGGREGATE_RULES.len());

        // Pass 1: per-record rules
        for rule in RECORD_RULES {
            let violating_symbols: Vec<String> = batch
                .iter()
                .filter(|r| (rule.predicate)(r, &self.cfg))
                .map(|r| r.contract_symbol.clone())
                .collect();
            let failed_count = violating_symbols.len();

            outcomes.push(RuleOutcome {
                rule: rule.name.to_string(),
                description: rule.description.to_string(),
                severity: rule.severity,
                scope: RuleScope::Record,
                failed_count,
                total_count: total,
                violating_symbols,
                observed_rate: None,
                passed: failed_count == 0,
            });
        }

        // Pass 2: batch aggregates (the only reduction step)
        for rule in AGGREGATE_RULES {
            let observed = (rule.observed_rate)(batch);
            let threshold = (rule.threshold)(&self.cfg);
            let failed_count = (observed * total as f64).round() as usize;

            outcomes.push(RuleOutcome {
                rule: rule.name.to_string(),
                description: rule.description.to_string(),
                severity: rule.severity,
                scope: RuleScope::Batch,
                failed_count,
                total_count: total,
                violating_symbols: Vec::new(),
                observed_rate: Some(observed),
                passed: observed <= threshold,
            });
        }

        let report = QualityReport {
            record_count: total,
            outcomes,
        };

        for outcome in report.failed_outcomes() {
            warn!("{}", outcome.summary());
        }
        debug!("{}", report.summary());

        Ok(report)
    }

    fn check_unique_symbols(
        &self,
        batch: &[OptionContractRecord],
    ) -> Result<(), QualityError> {
        let mut seen = HashSet::with_capacity(batch.len());
        for record in batch {
            if !seen.insert(record.contract_symbol.as_str()) {
                return Err(QualityError::DuplicateSymbol(
                    record.contract_symbol.clone(),
                ));
            }
        }
        Ok(())
    }
}
