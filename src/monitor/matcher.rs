//! Reconstructs hedged position pairs from two per-exchange position lists

use super::types::{ArbitragePair, Position};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Result of matching two position lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Hedged pairs in discovery order
    pub pairs: Vec<ArbitragePair>,
    /// Positions left without a counterpart
    pub unmatched: Vec<Position>,
}

/// Pairs same-symbol, opposite-direction, equal-quantity legs across two exchanges
#[derive(Debug, Clone, Copy, Default)]
pub struct PairMatcher {
    tolerance: Decimal,
}

impl PairMatcher {
    /// Create a matcher accepting quantity differences up to `tolerance`
    pub fn new(tolerance: Decimal) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// Match the positions of exchange A against those of exchange B.
    ///
    /// Symbols are visited in first-appearance order of `positions_a`. When a symbol
    /// holds several legs, A-legs are taken largest first and each is paired with the
    /// unmatched opposite-direction B-leg whose quantity is closest, within tolerance.
    /// Ties go to the larger B-leg, then to the earlier one in input order.
    pub fn match_positions(
        &self,
        positions_a: &[Position],
        positions_b: &[Position],
    ) -> MatchOutcome {
        let grouped_a = group_by_symbol(positions_a);
        let mut grouped_b = group_by_symbol(positions_b);
        let mut outcome = MatchOutcome::default();

        for (symbol, mut legs_a) in grouped_a {
            let Some(mut legs_b) = grouped_b.shift_remove(symbol) else {
                outcome.unmatched.extend(legs_a.into_iter().cloned());
                continue;
            };

            legs_a.sort_by(|x, y| y.quantity.cmp(&x.quantity));
            legs_b.sort_by(|x, y| y.quantity.cmp(&x.quantity));
            let mut taken = vec![false; legs_b.len()];

            for leg_a in legs_a {
                let best = legs_b
                    .iter()
                    .enumerate()
                    .filter(|(i, leg_b)| {
                        !taken[*i]
                            && leg_b.exchange != leg_a.exchange
                            && leg_b.direction == leg_a.direction.opposite()
                            && (leg_a.quantity - leg_b.quantity).abs() <= self.tolerance
                    })
                    .min_by_key(|(_, leg_b)| (leg_a.quantity - leg_b.quantity).abs())
                    .map(|(i, _)| i);

                match best {
                    Some(i) => {
                        taken[i] = true;
                        outcome.pairs.push(ArbitragePair {
                            symbol: symbol.to_string(),
                            leg_a: leg_a.clone(),
                            leg_b: legs_b[i].clone(),
                        });
                    }
                    None => outcome.unmatched.push(leg_a.clone()),
                }
            }

            outcome.unmatched.extend(
                legs_b
                    .into_iter()
                    .zip(taken)
                    .filter(|(_, used)| !used)
                    .map(|(leg, _)| leg.clone()),
            );
        }

        for (_, legs_b) in grouped_b {
            outcome.unmatched.extend(legs_b.into_iter().cloned());
        }

        outcome
    }
}

/// Match two position lists with an exact quantity match and return the pairs only
pub fn match_positions(positions_a: &[Position], positions_b: &[Position]) -> Vec<ArbitragePair> {
    PairMatcher::default().match_positions(positions_a, positions_b).pairs
}

fn group_by_symbol(positions: &[Position]) -> IndexMap<&str, Vec<&Position>> {
    let mut grouped: IndexMap<&str, Vec<&Position>> = IndexMap::new();
    for position in positions {
        grouped.entry(position.symbol.as_str()).or_default().push(position);
    }
    grouped
}
