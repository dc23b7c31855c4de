//! Weight validation
//!
//! Every weight-mutating path in the ledger funnels through these helpers so
//! that the range check and the 10000 bps sum check live in one place.

use thiserror::Error;

use super::ledger::LedgerError;
use super::token::TokenId;

/// 100% expressed in basis points
pub const MAX_BPS: u32 = 10_000;

/// Reject a single weight outside 0..=10000
pub fn validate_weight(token: &TokenId, weight_bps: u32) -> Result<(), LedgerError> {
    if weight_bps > MAX_BPS {
        return Err(LedgerError::InvalidWeight {
            token: token.clone(),
            weight_bps,
        });
    }
    Ok(())
}

/// Sum weights without wrapping. Overflow is reported as an invalid sum.
pub fn total_weight<I>(weights: I) -> Result<u32, LedgerError>
where
    I: IntoIterator<Item = u32>,
{
    weights.into_iter().try_fold(0u32, |acc, w| {
        acc.checked_add(w)
            .ok_or(LedgerError::WeightSumInvalid { total_bps: u64::from(acc) + u64::from(w) })
    })
}

/// The ledger invariant: a committed weight set allocates exactly 100%
pub fn ensure_full_allocation(total_bps: u32) -> Result<(), LedgerError> {
    if total_bps != MAX_BPS {
        return Err(LedgerError::WeightSumInvalid {
            total_bps: u64::from(total_bps),
        });
    }
    Ok(())
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Nothing to normalize")]
    Empty,

    #[error("Invalid weight for {0}: {1} (must be finite and non-negative)")]
    InvalidValue(TokenId, f64),

    #[error("Weights sum to zero, cannot rescale")]
    ZeroTotal,
}

/// Rescale arbitrary slider values so they sum to exactly 10000 bps.
///
/// Uses largest-remainder rounding, ties broken by input order. This is a
/// convenience for presentation layers; the ledger re-validates whatever
/// it is given.
pub fn normalize_to_bps(values: &[(TokenId, f64)]) -> Result<Vec<(TokenId, u32)>, NormalizeError> {
    if values.is_empty() {
        return Err(NormalizeError::Empty);
    }

    for (token, value) in values {
        if !value.is_finite() || *value < 0.0 {
            return Err(NormalizeError::InvalidValue(token.clone(), *value));
        }
    }

    let total: f64 = values.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        return Err(NormalizeError::ZeroTotal);
    }

    let scaled: Vec<f64> = values
        .iter()
        .map(|(_, v)| v / total * f64::from(MAX_BPS))
        .collect();
    let mut assigned: Vec<u32> = scaled.iter().map(|s| s.floor() as u32).collect();

    let floor_sum: u32 = assigned.iter().sum();
    let deficit = MAX_BPS.saturating_sub(floor_sum) as usize;

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = scaled[a] - scaled[a].floor();
        let rb = scaled[b] - scaled[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &idx in order.iter().cycle().take(deficit) {
        assigned[idx] += 1;
    }

    // Float noise can push the floors one past 100%
    let mut excess = floor_sum.saturating_sub(MAX_BPS);
    while excess > 0 {
        if let Some(max_idx) = (0..assigned.len()).max_by_key(|&i| assigned[i]) {
            assigned[max_idx] -= 1;
        }
        excess -= 1;
    }

    Ok(values
        .iter()
        .map(|(token, _)| token.clone())
        .zip(assigned)
        .collect())
}
