//! Candle data validation.
//!
//! Checks rows against the OHLC invariants:
//! - high >= max(open, close), low <= min(open, close), high >= low
//! - Non-negative prices and volume
//! - Every numeric cell parsed
//!
//! Upstream data may violate these. Violating rows are flagged and logged,
//! never corrected or dropped.

use std::collections::BTreeMap;

use log::warn;

use crate::models::{CandleIssue, TimeSeries};

/// Which invariants to report.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Flag high/low inconsistent with open/close.
    pub check_ohlc: bool,
    /// Flag negative prices or volume.
    pub check_negative: bool,
    /// Flag cells that could not be parsed.
    pub check_unparseable: bool,
    /// Rows described individually in the log before summarizing.
    pub max_logged_rows: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            check_ohlc: true,
            check_negative: true,
            check_unparseable: true,
            max_logged_rows: 3,
        }
    }
}

/// Outcome of inspecting one series.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Rows with at least one reported issue.
    pub flagged_rows: usize,
    pub issues: BTreeMap<CandleIssue, usize>,
}

/// Candle data validator.
#[derive(Clone, Debug, Default)]
pub struct CandleValidator {
    config: ValidatorConfig,
}

impl CandleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    fn reports(&self, issue: CandleIssue) -> bool {
        match issue {
            CandleIssue::HighBelowBody | CandleIssue::LowAboveBody | CandleIssue::HighBelowLow => {
                self.config.check_ohlc
            }
            CandleIssue::NegativePrice | CandleIssue::NegativeVolume => self.config.check_negative,
            CandleIssue::UnparseableField => self.config.check_unparseable,
        }
    }

    /// Inspect every row of `series` and log what was found.
    pub fn inspect(&self, series: &TimeSeries) -> ValidationReport {
        let mut report = ValidationReport::default();

        for candle in series.candles() {
            let issues: Vec<CandleIssue> = candle
                .issues()
                .into_iter()
                .filter(|issue| self.reports(*issue))
                .collect();
            if issues.is_empty() {
                continue;
            }

            report.flagged_rows += 1;
            if report.flagged_rows <= self.config.max_logged_rows {
                let described: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                warn!(
                    "Candle validation warning for {} {} at {}: {}",
                    series.provider,
                    candle.symbol,
                    candle.open_time,
                    described.join("; ")
                );
            }
            for issue in issues {
                *report.issues.entry(issue).or_insert(0) += 1;
            }
        }

        if report.flagged_rows > self.config.max_logged_rows {
            warn!(
                "{} {}: {} of {} rows flagged ({:?})",
                series.provider,
                series.symbol,
                report.flagged_rows,
                series.len(),
                report.issues
            );
        }
        report
    }
}
