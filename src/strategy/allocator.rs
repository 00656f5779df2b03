//! Capital allocation: turns per-ticker spread signals into cash percentages.
//!
//! The normalizer ranks signals, converts them into shares of their total,
//! forces the top share to dominate the runner-up by [`DOMINANCE_FACTOR`],
//! takes the surplus back out of the other entries, clamps negatives and
//! renormalizes so the result always sums to 100.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Minimum ratio between the leader's share and the runner-up's share.
pub const DOMINANCE_FACTOR: Decimal = dec!(1.2);

const HUNDRED: Decimal = dec!(100);

/// Inputs the normalizer refuses to allocate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no signals to allocate")]
    Empty,
    #[error("ticker {0} appears more than once")]
    DuplicateTicker(String),
    #[error("signals sum to zero")]
    ZeroTotal,
    #[error("every share was clamped to zero")]
    Degenerate,
    #[error("allocation arithmetic overflowed")]
    Overflow,
}

/// Allocated share of cash for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Ticker symbol (e.g., "AAPL")
    pub ticker: String,
    /// Raw signal the share was derived from
    pub signal: Decimal,
    /// Percentage of cash, 0-100
    pub percentage: Decimal,
    /// Position in the ranking (1 = largest signal)
    pub rank: usize,
}

/// Normalize raw signals into percentage allocations summing to 100.
///
/// `signals` is in discovery order; equal signals keep that order when ranked,
/// so the earlier ticker wins a tie for the top spot. The result is in rank
/// order (largest signal first).
///
/// # Errors
/// Empty input, duplicate tickers and a zero signal total are rejected, as is
/// the case where clamping leaves nothing to renormalize. Signals whose shares
/// fall outside `Decimal` range give [`AllocationError::Overflow`].
pub fn correct_allocate_percentages(
    signals: &[(String, Decimal)],
) -> Result<Vec<Allocation>, AllocationError> {
    if signals.is_empty() {
        return Err(AllocationError::Empty);
    }

    let mut seen = HashSet::with_capacity(signals.len());
    for (ticker, _) in signals {
        if !seen.insert(ticker.as_str()) {
            return Err(AllocationError::DuplicateTicker(ticker.clone()));
        }
    }

    let total = checked_sum(signals.iter().map(|(_, signal)| signal))?;
    if total.is_zero() {
        return Err(AllocationError::ZeroTotal);
    }

    // sort_by is stable
    let mut ranked: Vec<usize> = (0..signals.len()).collect();
    ranked.sort_by(|&a, &b| signals[b].1.cmp(&signals[a].1));

    let mut shares = ranked
        .iter()
        .map(|&idx| percent_of(signals[idx].1, total))
        .collect::<Result<Vec<_>, _>>()?;

    if shares.len() > 1 {
        let floor = shares[1]
            .checked_mul(DOMINANCE_FACTOR)
            .ok_or(AllocationError::Overflow)?;
        if shares[0] <= floor {
            shares[0] = floor;
        }
    }

    let extra = checked_sum(&shares)?
        .checked_sub(HUNDRED)
        .ok_or(AllocationError::Overflow)?;
    debug!(%total, %extra, "Applying dominance floor");

    // The non-leader sum is re-read after every adjustment.
    for i in 1..shares.len() {
        let rest = checked_sum(&shares[1..])?;
        if rest.is_zero() {
            continue;
        }
        let delta = shares[i]
            .checked_div(rest)
            .and_then(|ratio| ratio.checked_mul(extra))
            .ok_or(AllocationError::Overflow)?;
        shares[i] = shares[i]
            .checked_sub(delta)
            .ok_or(AllocationError::Overflow)?;
    }

    for share in shares.iter_mut() {
        if *share < Decimal::ZERO {
            *share = Decimal::ZERO;
        }
    }

    let clamped_total = checked_sum(&shares)?;
    if clamped_total.is_zero() {
        return Err(AllocationError::Degenerate);
    }

    ranked
        .into_iter()
        .zip(shares)
        .enumerate()
        .map(|(pos, (idx, share))| {
            Ok(Allocation {
                ticker: signals[idx].0.clone(),
                signal: signals[idx].1,
                percentage: percent_of(share, clamped_total)?,
                rank: pos + 1,
            })
        })
        .collect()
}

fn checked_sum<'a>(
    values: impl IntoIterator<Item = &'a Decimal>,
) -> Result<Decimal, AllocationError> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, value| {
        acc.checked_add(*value).ok_or(AllocationError::Overflow)
    })
}

/// `part / whole * 100`
fn percent_of(part: Decimal, whole: Decimal) -> Result<Decimal, AllocationError> {
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .ok_or(AllocationError::Overflow)
}

/// Keyed view of an allocation: ticker -> percentage.
pub fn percentage_map(allocations: &[Allocation]) -> BTreeMap<String, Decimal> {
    allocations
        .iter()
        .map(|a| (a.ticker.clone(), a.percentage))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    const TOLERANCE: Decimal = dec!(0.000001);

    fn signals(entries: &[(&str, Decimal)]) -> Vec<(String, Decimal)> {
        entries
            .iter()
            .map(|(ticker, signal)| (ticker.to_string(), *signal))
            .collect()
    }

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} got {}",
            expected,
            actual
        );
    }

    fn total(allocations: &[Allocation]) -> Decimal {
        allocations.iter().map(|a| a.percentage).sum()
    }

    // =========================================================================
    // Scenario Tests
    // =========================================================================

    #[test]
    fn test_clear_leader_is_not_inflated() {
        let input = signals(&[("AAA", dec!(30)), ("BBB", dec!(20)), ("CCC", dec!(10))]);
        let allocations = correct_allocate_percentages(&input).unwrap();
        let map = percentage_map(&allocations);

        assert_close(map["AAA"], dec!(50), TOLERANCE);
        assert_close(map["BBB"], dec!(33.333333), TOLERANCE);
        assert_close(map["CCC"], dec!(16.666667), TOLERANCE);
        assert_close(total(&allocations), dec!(100), TOLERANCE);
    }

    #[test]
    fn test_narrow_leader_is_inflated_and_rest_shrinks() {
        let input = signals(&[("AAA", dec!(21)), ("BBB", dec!(20)), ("CCC", dec!(10))]);
        let allocations = correct_allocate_percentages(&input).unwrap();
        let map = percentage_map(&allocations);

        // Raw shares are 41.18 / 39.22 / 19.61
        assert!(map["AAA"] > dec!(41.18));
        assert!(map["BBB"] < dec!(39.21));
        assert!(map["CCC"] < dec!(19.60));

        assert_close(map["AAA"], dec!(47.124825), dec!(0.00001));
        assert_close(map["BBB"], dec!(35.343619), dec!(0.00001));
        assert_close(map["CCC"], dec!(17.531557), dec!(0.00001));

        // Runner-ups keep roughly their 2:1 relationship
        let ratio = map["BBB"] / map["CCC"];
        assert!(ratio > dec!(1.98) && ratio < dec!(2.03));

        assert!(map["AAA"] >= map["BBB"] * DOMINANCE_FACTOR);
        assert_close(total(&allocations), dec!(100), TOLERANCE);
    }

    #[test]
    fn test_shrink_below_zero_is_clamped() {
        // A negative spread makes the non-leader pool small enough that
        // taking the surplus back drives CCC under zero.
        let input = signals(&[("AAA", dec!(50)), ("BBB", dec!(45)), ("CCC", dec!(-40))]);
        let allocations = correct_allocate_percentages(&input).unwrap();
        let map = percentage_map(&allocations);

        assert_eq!(map["CCC"], Decimal::ZERO);
        assert_close(map["AAA"], dec!(85.714286), dec!(0.00001));
        assert_close(map["BBB"], dec!(14.285714), dec!(0.00001));
        assert_close(total(&allocations), dec!(100), TOLERANCE);
    }

    #[test]
    fn test_single_entry_gets_everything() {
        let allocations = correct_allocate_percentages(&signals(&[("AAA", dec!(3.7))])).unwrap();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].percentage, dec!(100));

        let negative = correct_allocate_percentages(&signals(&[("AAA", dec!(-2))])).unwrap();
        assert_eq!(negative[0].percentage, dec!(100));
    }

    #[test]
    fn test_negative_total_keeps_inversion() {
        // Total is -5, so the positive spread gets a negative raw share.
        let input = signals(&[("AAA", dec!(5)), ("BBB", dec!(-10))]);
        let map = percentage_map(&correct_allocate_percentages(&input).unwrap());

        assert_close(map["AAA"], dec!(100), TOLERANCE);
        assert_eq!(map["BBB"], Decimal::ZERO);
    }

    #[test]
    fn test_leader_at_exact_floor_is_untouched() {
        let input = signals(&[
            ("AAA", dec!(1.5)),
            ("BBB", dec!(1.25)),
            ("CCC", dec!(0.75)),
            ("DDD", dec!(0.5)),
        ]);
        let map = percentage_map(&correct_allocate_percentages(&input).unwrap());

        assert_close(map["AAA"], dec!(37.5), TOLERANCE);
        assert_close(map["BBB"], dec!(31.25), TOLERANCE);
        assert_close(map["CCC"], dec!(18.75), TOLERANCE);
        assert_close(map["DDD"], dec!(12.5), TOLERANCE);
    }

    // =========================================================================
    // Ordering Tests
    // =========================================================================

    #[test]
    fn test_result_is_in_rank_order() {
        let input = signals(&[("CCC", dec!(10)), ("AAA", dec!(30)), ("BBB", dec!(20))]);
        let allocations = correct_allocate_percentages(&input).unwrap();

        let tickers: Vec<&str> = allocations.iter().map(|a| a.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(allocations[0].rank, 1);
        assert_eq!(allocations[2].rank, 3);
        assert_eq!(allocations[2].signal, dec!(10));
    }

    #[test]
    fn test_permuting_input_gives_same_mapping() {
        let a = signals(&[("AAA", dec!(21)), ("BBB", dec!(20)), ("CCC", dec!(10))]);
        let b = signals(&[("CCC", dec!(10)), ("AAA", dec!(21)), ("BBB", dec!(20))]);
        let c = signals(&[("BBB", dec!(20)), ("CCC", dec!(10)), ("AAA", dec!(21))]);

        let map_a = percentage_map(&correct_allocate_percentages(&a).unwrap());
        let map_b = percentage_map(&correct_allocate_percentages(&b).unwrap());
        let map_c = percentage_map(&correct_allocate_percentages(&c).unwrap());

        assert_eq!(map_a, map_b);
        assert_eq!(map_a, map_c);
    }

    #[test]
    fn test_tie_goes_to_earlier_ticker() {
        let first = percentage_map(
            &correct_allocate_percentages(&signals(&[("AAA", dec!(10)), ("BBB", dec!(10))]))
                .unwrap(),
        );
        assert_close(first["AAA"], dec!(60), TOLERANCE);
        assert_close(first["BBB"], dec!(40), TOLERANCE);

        let swapped = percentage_map(
            &correct_allocate_percentages(&signals(&[("BBB", dec!(10)), ("AAA", dec!(10))]))
                .unwrap(),
        );
        assert_close(swapped["BBB"], dec!(60), TOLERANCE);
        assert_close(swapped["AAA"], dec!(40), TOLERANCE);
    }

    // =========================================================================
    // Invariant Tests
    // =========================================================================

    #[test]
    fn test_invariants_hold_across_inputs() {
        let cases = vec![
            signals(&[("A", dec!(1)), ("B", dec!(2)), ("C", dec!(3)), ("D", dec!(4))]),
            signals(&[("A", dec!(0.37)), ("B", dec!(12.9)), ("C", dec!(0))]),
            signals(&[("A", dec!(-1.5)), ("B", dec!(4.25)), ("C", dec!(2.1))]),
            signals(&[("A", dec!(7)), ("B", dec!(6.9)), ("C", dec!(6.8)), ("D", dec!(6.7))]),
            signals(&[("A", dec!(-3)), ("B", dec!(-4))]),
        ];

        for input in cases {
            let allocations = correct_allocate_percentages(&input).unwrap();
            assert_eq!(allocations.len(), input.len());
            assert_close(total(&allocations), dec!(100), TOLERANCE);

            for allocation in &allocations {
                assert!(allocation.percentage >= Decimal::ZERO, "{:?}", allocation);
                assert!(allocation.percentage <= dec!(100), "{:?}", allocation);
            }

            let top = allocations[0].percentage;
            let second = allocations[1].percentage;
            assert!(
                top + TOLERANCE >= second * DOMINANCE_FACTOR,
                "leader {} vs runner-up {} for {:?}",
                top,
                second,
                input
            );
        }
    }

    // =========================================================================
    // Degenerate Input Tests
    // =========================================================================

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(
            correct_allocate_percentages(&[]),
            Err(AllocationError::Empty)
        );
    }

    #[test]
    fn test_zero_total_rejected() {
        let input = signals(&[("AAA", dec!(5)), ("BBB", dec!(-5))]);
        assert_eq!(
            correct_allocate_percentages(&input),
            Err(AllocationError::ZeroTotal)
        );

        let zeros = signals(&[("AAA", dec!(0)), ("BBB", dec!(0))]);
        assert_eq!(
            correct_allocate_percentages(&zeros),
            Err(AllocationError::ZeroTotal)
        );
    }

    #[test]
    fn test_duplicate_ticker_rejected() {
        let input = signals(&[("AAA", dec!(5)), ("AAA", dec!(3))]);
        assert_eq!(
            correct_allocate_percentages(&input),
            Err(AllocationError::DuplicateTicker("AAA".to_string()))
        );
    }

    #[test]
    fn test_huge_signals_with_tiny_total_rejected() {
        // Total is 0.00000001, so the leader's raw share is 1e29 percent.
        let input = signals(&[
            ("AAA", dec!(10000000000000000000)),
            ("BBB", dec!(-9999999999999999999.99999999)),
        ]);
        assert_eq!(
            correct_allocate_percentages(&input),
            Err(AllocationError::Overflow)
        );
    }

    #[test]
    fn test_signal_sum_out_of_range_rejected() {
        let input = signals(&[("AAA", Decimal::MAX), ("BBB", Decimal::MAX)]);
        assert_eq!(
            correct_allocate_percentages(&input),
            Err(AllocationError::Overflow)
        );
    }
}
