//! Funding rate join, differential and threshold evaluation

use super::types::{ArbitragePair, CycleError, Direction, FundingRate, JoinedPair, RatedPair};
use crate::{connectors::Exchange, RateUnavailable};
use rust_decimal::Decimal;
use tracing::warn;

/// Attaches both legs' funding rates to every matched pair
#[derive(Debug, Clone, Copy, Default)]
pub struct RateJoiner {
    normalize_to_hours: Option<u32>,
}

impl RateJoiner {
    /// Create a joiner; with `normalize_to_hours` set, every rate is rescaled to
    /// that funding interval before it is attached
    pub fn new(normalize_to_hours: Option<u32>) -> Self {
        Self { normalize_to_hours }
    }

    /// Join pairs with rates. A pair with any failing leg lookup is dropped and
    /// recorded as exactly one error; the remaining pairs are unaffected.
    pub fn join<F>(
        &self,
        pairs: Vec<ArbitragePair>,
        mut lookup: F,
    ) -> (Vec<JoinedPair>, Vec<CycleError>)
    where
        F: FnMut(Exchange, &str) -> Result<FundingRate, RateUnavailable>,
    {
        let mut joined = Vec::with_capacity(pairs.len());
        let mut errors = Vec::new();

        for pair in pairs {
            let rate_a = lookup(pair.leg_a.exchange, &pair.symbol);
            let rate_b = lookup(pair.leg_b.exchange, &pair.symbol);

            match (rate_a, rate_b) {
                (Ok(rate_a), Ok(rate_b)) => joined.push(JoinedPair {
                    rate_a: self.normalize(rate_a),
                    rate_b: self.normalize(rate_b),
                    pair,
                }),
                (Err(err), Ok(_)) | (Ok(_), Err(err)) => {
                    warn!(
                        symbol = %pair.symbol,
                        error = %err,
                        "Dropping pair without funding rate"
                    );
                    errors.push(err.into());
                }
                (Err(err), Err(second)) => {
                    warn!(
                        symbol = %pair.symbol,
                        error = %err,
                        also = %second,
                        "Dropping pair, both rates unavailable"
                    );
                    errors.push(err.into());
                }
            }
        }

        (joined, errors)
    }

    fn normalize(&self, mut rate: FundingRate) -> FundingRate {
        if let Some(target) = self.normalize_to_hours {
            if rate.interval_hours != 0 && rate.interval_hours != target {
                rate.rate = rate.rate * Decimal::from(target) / Decimal::from(rate.interval_hours);
                rate.interval_hours = target;
            }
        }
        rate
    }
}

/// Short-leg rate minus long-leg rate, whichever exchange holds each role
pub fn differential(joined: &JoinedPair) -> Decimal {
    match joined.pair.leg_a.direction {
        Direction::Short => joined.rate_a.rate - joined.rate_b.rate,
        Direction::Long => joined.rate_b.rate - joined.rate_a.rate,
    }
}

/// Whether a differential is strictly below the threshold
pub fn evaluate(differential: Decimal, threshold: Decimal) -> bool {
    differential < threshold
}

/// Compute differential and alert flag of every joined pair, preserving order
pub fn rate_pairs(joined: Vec<JoinedPair>, threshold: Decimal) -> Vec<RatedPair> {
    joined
        .into_iter()
        .map(|j| {
            let differential = differential(&j);
            RatedPair {
                below_threshold: evaluate(differential, threshold),
                differential,
                pair: j.pair,
                rate_a: j.rate_a,
                rate_b: j.rate_b,
            }
        })
        .collect()
}
