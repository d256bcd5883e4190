//! Domain types shared by the monitoring pipeline

use crate::{connectors::Exchange, FetchError, RateUnavailable};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Long position
    Long,
    /// Short position
    Short,
}

impl Direction {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Open position snapshot fetched once per cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Exchange holding the position
    pub exchange: Exchange,
    /// Instrument symbol (e.g. "BTCUSDT")
    pub symbol: String,
    /// Position side
    pub direction: Direction,
    /// Absolute position size in contract units
    pub quantity: Decimal,
}

impl Position {
    /// Create a position snapshot
    pub fn new(
        exchange: Exchange,
        symbol: impl Into<String>,
        direction: Direction,
        quantity: Decimal,
    ) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            direction,
            quantity: quantity.abs(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.exchange, self.symbol, self.direction, self.quantity)
    }
}

/// Two hedged legs on different exchanges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitragePair {
    /// Shared instrument symbol
    pub symbol: String,
    /// Leg taken from the first exchange's position list
    pub leg_a: Position,
    /// Leg taken from the second exchange's position list
    pub leg_b: Position,
}

impl ArbitragePair {
    /// The short leg of the pair
    pub fn short_leg(&self) -> &Position {
        if self.leg_a.direction == Direction::Short {
            &self.leg_a
        } else {
            &self.leg_b
        }
    }

    /// The long leg of the pair
    pub fn long_leg(&self) -> &Position {
        if self.leg_a.direction == Direction::Long {
            &self.leg_a
        } else {
            &self.leg_b
        }
    }
}

/// Current funding rate of one instrument on one exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRate {
    /// Exchange quoting the rate
    pub exchange: Exchange,
    /// Instrument symbol
    pub symbol: String,
    /// Rate as a fraction per funding interval (0.000125 = 0.0125%)
    pub rate: Decimal,
    /// When the exchange produced the quote
    pub as_of: DateTime<Utc>,
    /// Funding interval of the instrument in hours
    pub interval_hours: u32,
    /// Next settlement time, when the exchange reports it
    pub next_funding_time: Option<DateTime<Utc>>,
}

/// A pair with both funding rates attached, before evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedPair {
    /// Matched legs
    pub pair: ArbitragePair,
    /// Rate of `pair.leg_a`
    pub rate_a: FundingRate,
    /// Rate of `pair.leg_b`
    pub rate_b: FundingRate,
}

/// Fully evaluated pair for one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedPair {
    /// Matched legs
    pub pair: ArbitragePair,
    /// Rate of `pair.leg_a`
    pub rate_a: FundingRate,
    /// Rate of `pair.leg_b`
    pub rate_b: FundingRate,
    /// Short-leg rate minus long-leg rate
    pub differential: Decimal,
    /// Whether the differential fell strictly below the threshold
    pub below_threshold: bool,
}

impl RatedPair {
    /// Instrument symbol
    pub fn symbol(&self) -> &str {
        &self.pair.symbol
    }

    /// Rate paid or received by the short leg
    pub fn short_rate(&self) -> &FundingRate {
        if self.pair.leg_a.direction == Direction::Short {
            &self.rate_a
        } else {
            &self.rate_b
        }
    }

    /// Rate paid or received by the long leg
    pub fn long_rate(&self) -> &FundingRate {
        if self.pair.leg_a.direction == Direction::Long {
            &self.rate_a
        } else {
            &self.rate_b
        }
    }
}

/// A non-fatal failure recorded during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleError {
    /// An exchange's position list could not be fetched
    PositionsUnavailable {
        /// Exchange that failed
        exchange: Exchange,
        /// Failure description
        reason: String,
    },
    /// One leg's funding rate could not be fetched; the pair was dropped
    RateUnavailable {
        /// Exchange that failed
        exchange: Exchange,
        /// Instrument symbol of the dropped pair
        symbol: String,
        /// Failure description
        reason: String,
    },
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::PositionsUnavailable { exchange, reason } => {
                write!(f, "{} positions unavailable: {}", exchange, reason)
            }
            CycleError::RateUnavailable { exchange, symbol, reason } => {
                write!(f, "{} {} funding rate unavailable: {}", exchange, symbol, reason)
            }
        }
    }
}

impl From<FetchError> for CycleError {
    fn from(err: FetchError) -> Self {
        CycleError::PositionsUnavailable {
            exchange: err.exchange,
            reason: err.reason,
        }
    }
}

impl From<RateUnavailable> for CycleError {
    fn from(err: RateUnavailable) -> Self {
        CycleError::RateUnavailable {
            exchange: err.exchange,
            symbol: err.symbol,
            reason: err.reason,
        }
    }
}

/// Everything a single cycle produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    /// Rated pairs in matcher discovery order
    pub rated_pairs: Vec<RatedPair>,
    /// Errors in the order they were recorded
    pub errors: Vec<CycleError>,
    /// Positions the matcher could not pair
    pub unmatched: Vec<Position>,
}

impl CycleReport {
    /// No error was recorded during the cycle
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Pairs whose differential fell below the threshold
    pub fn alerts(&self) -> impl Iterator<Item = &RatedPair> {
        self.rated_pairs.iter().filter(|p| p.below_threshold)
    }

    /// At least one pair is below the threshold
    pub fn has_alerts(&self) -> bool {
        self.alerts().next().is_some()
    }
}
