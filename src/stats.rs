//! In-memory statistics for periodic summary reports

use crate::monitor::CycleReport;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Differential statistics of one symbol over a summary period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStats {
    /// Instrument symbol
    pub symbol: String,
    /// Cycles in which the symbol was rated
    pub checks: u64,
    /// Cycles in which the symbol was below the threshold
    pub alerts: u64,
    /// Most recent differential
    pub current: Decimal,
    /// Lowest differential seen
    pub min: Decimal,
    /// Highest differential seen
    pub max: Decimal,
    sum: Decimal,
}

impl SymbolStats {
    fn new(symbol: &str, differential: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            checks: 0,
            alerts: 0,
            current: differential,
            min: differential,
            max: differential,
            sum: Decimal::ZERO,
        }
    }

    fn observe(&mut self, differential: Decimal, below_threshold: bool) {
        self.checks += 1;
        if below_threshold {
            self.alerts += 1;
        }
        self.current = differential;
        self.min = self.min.min(differential);
        self.max = self.max.max(differential);
        self.sum += differential;
    }

    /// Mean differential over the period
    pub fn average(&self) -> Decimal {
        if self.checks == 0 {
            Decimal::ZERO
        } else {
            self.sum / Decimal::from(self.checks)
        }
    }

    /// Share of checks that alerted, in percent
    pub fn alert_rate(&self) -> Decimal {
        if self.checks == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(self.alerts) * Decimal::ONE_HUNDRED / Decimal::from(self.checks)
        }
    }
}

/// Aggregated view of a summary period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Start of the period
    pub period_start: DateTime<Utc>,
    /// End of the period
    pub period_end: DateTime<Utc>,
    /// Cycles recorded
    pub total_checks: u64,
    /// Cycles whose report carried at least one error
    pub failed_checks: u64,
    /// Cycles that found no hedged pair
    pub empty_checks: u64,
    /// Below-threshold observations over all symbols
    pub total_alerts: u64,
    /// Per-symbol statistics in first-seen order
    pub symbols: Vec<SymbolStats>,
}

impl SummaryReport {
    /// Render the summary as plain monospace text
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Funding spread summary {} - {}",
            self.period_start.format("%Y-%m-%d %H:%M"),
            self.period_end.format("%H:%M UTC")
        );
        let _ = writeln!(
            out,
            "Checks: {} (failed {}, no pairs {})",
            self.total_checks, self.failed_checks, self.empty_checks
        );
        let _ = writeln!(out, "Alerts: {}", self.total_alerts);

        for stats in &self.symbols {
            let _ = writeln!(out, "\n{}", stats.symbol);
            let _ = writeln!(out, "├ Current {}", crate::monitor::format_percent(stats.current));
            let _ = writeln!(
                out,
                "├ Average {}",
                crate::monitor::format_percent(stats.average())
            );
            let _ = writeln!(
                out,
                "├ Range   {} .. {}",
                crate::monitor::format_percent(stats.min),
                crate::monitor::format_percent(stats.max)
            );
            let _ = writeln!(
                out,
                "└ Alerts  {}/{} ({}%)",
                stats.alerts,
                stats.checks,
                stats.alert_rate().round_dp(1)
            );
        }

        out.trim_end().to_string()
    }
}

/// Accumulates cycle reports between two summaries
#[derive(Debug, Clone)]
pub struct StatisticsCollector {
    period_start: DateTime<Utc>,
    total_checks: u64,
    failed_checks: u64,
    empty_checks: u64,
    symbols: IndexMap<String, SymbolStats>,
}

impl StatisticsCollector {
    /// Start an empty period at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            period_start: now,
            total_checks: 0,
            failed_checks: 0,
            empty_checks: 0,
            symbols: IndexMap::new(),
        }
    }

    /// Fold one cycle report into the period
    pub fn record(&mut self, report: &CycleReport) {
        self.total_checks += 1;
        if !report.is_clean() {
            self.failed_checks += 1;
        }
        if report.rated_pairs.is_empty() {
            self.empty_checks += 1;
        }

        for rated in &report.rated_pairs {
            self.symbols
                .entry(rated.symbol().to_string())
                .or_insert_with(|| SymbolStats::new(rated.symbol(), rated.differential))
                .observe(rated.differential, rated.below_threshold);
        }
    }

    /// Number of cycles recorded in the current period
    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    /// Snapshot of the current period ending at `now`
    pub fn summary(&self, now: DateTime<Utc>) -> SummaryReport {
        SummaryReport {
            period_start: self.period_start,
            period_end: now,
            total_checks: self.total_checks,
            failed_checks: self.failed_checks,
            empty_checks: self.empty_checks,
            total_alerts: self.symbols.values().map(|s| s.alerts).sum(),
            symbols: self.symbols.values().cloned().collect(),
        }
    }

    /// Discard everything and start a new period at `now`
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }
}
