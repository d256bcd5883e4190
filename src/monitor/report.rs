//! Cycle report assembly and text rendering

use super::types::{CycleError, CycleReport, Position, RatedPair};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;

/// Assemble a cycle report. Pair and error order is kept as given, nothing is filtered.
pub fn build(
    rated_pairs: Vec<RatedPair>,
    errors: Vec<CycleError>,
    timestamp: DateTime<Utc>,
) -> CycleReport {
    CycleReport {
        timestamp,
        rated_pairs,
        errors,
        unmatched: Vec::new(),
    }
}

impl CycleReport {
    /// Attach the positions the matcher left unpaired
    pub fn with_unmatched(mut self, unmatched: Vec<Position>) -> Self {
        self.unmatched = unmatched;
        self
    }

    /// Render the report as plain monospace text
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Funding spread report {}",
            self.timestamp.format("%Y-%m-%d %H:%M UTC")
        );

        if self.rated_pairs.is_empty() {
            let _ = writeln!(out, "\nNo hedged pairs found");
        }

        for rated in &self.rated_pairs {
            let long = rated.pair.long_leg();
            let short = rated.pair.short_leg();
            let marker = if rated.below_threshold { " [ALERT]" } else { "" };

            let _ = writeln!(out, "\n{} x{}{}", rated.symbol(), long.quantity, marker);
            let long_rate = format_percent(rated.long_rate().rate);
            let short_rate = format_percent(rated.short_rate().rate);
            let _ = writeln!(out, "├ Long  {:<8} {}", long.exchange, long_rate);
            let _ = writeln!(out, "├ Short {:<8} {}", short.exchange, short_rate);
            let _ = writeln!(out, "└ Diff  {:<8} {}", "", format_percent(rated.differential));
        }

        if !self.unmatched.is_empty() {
            let _ = writeln!(out, "\nUnmatched positions:");
            for position in &self.unmatched {
                let _ = writeln!(out, "- {}", position);
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            for error in &self.errors {
                let _ = writeln!(out, "- {}", error);
            }
        }

        out.trim_end().to_string()
    }
}

/// Format a rate fraction as a signed percentage with four decimals (`+0.0125%`)
pub fn format_percent(rate: Decimal) -> String {
    let percent = (rate * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    let sign = if percent.is_sign_negative() && !percent.is_zero() { '-' } else { '+' };
    format!("{}{:.4}%", sign, percent.abs())
}
