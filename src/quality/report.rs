//! Quality report types.
//!
//! One `RuleOutcome` per registry rule, collected into a `QualityReport`
//! whose verdict gates downstream persistence.

use serde::Serialize;

use super::rules::{RuleScope, Severity};

/// How many violating symbols a summary line shows before truncating.
const SUMMARY_SAMPLE: usize = 3;

/// Result of evaluating a single rule against a batch.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub description: String,
    pub severity: Severity,
    pub scope: RuleScope,
    /// Number of violating records (record scope) or of records counted
    /// toward the rate (batch scope).
    pub failed_count: usize,
    pub total_count: usize,
    /// Contract symbols of violating records. Empty for batch-scope rules.
    pub violating_symbols: Vec<String>,
    /// Observed rate for batch-scope rules.
    pub observed_rate: Option<f64>,
    pub passed: bool,
}

impl RuleOutcome {
    pub fn failure_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.failed_count as f64 / self.total_count as f64
    }

    /// One status line:
    /// `[ERROR] bid_ask_inversion: 2/100 rows flagged (2.0%) [SPY..., ...]`
    pub fn summary(&self) -> String {
        let status = if self.passed {
            "PASS"
        } else {
            self.severity.as_str()
        };

        let mut line = format!(
            "[{:5}] {}: {}/{} rows flagged ({:.1}%)",
            status,
            self.rule,
            self.failed_count,
            self.total_count,
            self.failure_rate() * 100.0
        );

        if let Some(rate) = self.observed_rate {
            line.push_str(&format!(" rate={:.3}", rate));
        }

        if !self.passed && !self.violating_symbols.is_empty() {
            let sample: Vec<&str> = self
                .violating_symbols
                .iter()
                .take(SUMMARY_SAMPLE)
                .map(String::as_str)
                .collect();
            let suffix = if self.violating_symbols.len() > SUMMARY_SAMPLE {
                ", ..."
            } else {
                ""
            };
            line.push_str(&format!(" [{}{}]", sample.join(", "), suffix));
        }

        line
    }
}

/// Complete quality report for one batch.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub record_count: usize,
    pub outcomes: Vec<RuleOutcome>,
}

impl QualityReport {
    /// Overall verdict: true iff no ERROR-severity rule triggered.
    /// WARN findings are recorded but never fail the batch.
    pub fn passed(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|o| !o.passed && o.severity == Severity::Error)
    }

    pub fn failed_outcomes(&self) -> Vec<&RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.passed && o.severity == Severity::Error)
            .count()
    }

    pub fn warn_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.passed && o.severity == Severity::Warn)
            .count()
    }

    pub fn outcome(&self, rule: &str) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule == rule)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records: {} ERROR(s), {} WARNING(s) -> {}",
            self.record_count,
            self.error_count(),
            self.warn_count(),
            if self.passed() { "PASS" } else { "FAIL" }
        )
    }
}
