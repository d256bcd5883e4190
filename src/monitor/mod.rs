//! Monitoring pipeline: pair matching, rate join, differential evaluation,
//! report building and the cycle scheduler

pub mod matcher;
pub mod rates;
pub mod report;
pub mod scheduler;
pub mod types;

pub use matcher::{match_positions, MatchOutcome, PairMatcher};
pub use rates::{differential, evaluate, rate_pairs, RateJoiner};
pub use report::{build as build_report, format_percent};
pub use scheduler::{CycleScheduler, SchedulerState};
pub use types::*;
