//! Allocation Drift
//!
//! Compares actual allocations against the ledger's target weights and
//! decides whether a rebalance is warranted. All figures are in basis points.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ledger::PortfolioSummary;
use super::token::TokenId;

/// Per-token drift above this is MEDIUM (2%)
pub const DEFAULT_MEDIUM_DRIFT_BPS: u32 = 200;

/// Per-token drift above this is HIGH, and triggers a rebalance (5%)
pub const DEFAULT_HIGH_DRIFT_BPS: u32 = 500;

/// Portfolio-wide max drift above this is HIGH (10%)
pub const DEFAULT_CRITICAL_DRIFT_BPS: u32 = 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriftError {
    #[error("Drift thresholds must be strictly increasing: medium {0}, high {1}, critical {2}")]
    UnorderedThresholds(u32, u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriftLevel {
    Low,
    Medium,
    High,
}

impl DriftLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftLevel::Low => "LOW",
            DriftLevel::Medium => "MEDIUM",
            DriftLevel::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftThresholds {
    pub medium_bps: u32,
    pub high_bps: u32,
    pub critical_bps: u32,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            medium_bps: DEFAULT_MEDIUM_DRIFT_BPS,
            high_bps: DEFAULT_HIGH_DRIFT_BPS,
            critical_bps: DEFAULT_CRITICAL_DRIFT_BPS,
        }
    }
}

impl DriftThresholds {
    pub fn new(medium_bps: u32, high_bps: u32, critical_bps: u32) -> Result<Self, DriftError> {
        if !(medium_bps < high_bps && high_bps < critical_bps) {
            return Err(DriftError::UnorderedThresholds(medium_bps, high_bps, critical_bps));
        }
        Ok(Self {
            medium_bps,
            high_bps,
            critical_bps,
        })
    }

    fn token_level(&self, drift_bps: u32) -> DriftLevel {
        if drift_bps > self.high_bps {
            DriftLevel::High
        } else if drift_bps > self.medium_bps {
            DriftLevel::Medium
        } else {
            DriftLevel::Low
        }
    }

    /// Targeted but not held, or held at 0: never LOW
    fn missing_level(&self, target_bps: u32) -> DriftLevel {
        if target_bps > self.high_bps {
            DriftLevel::High
        } else {
            DriftLevel::Medium
        }
    }

    fn portfolio_level(&self, max_drift_bps: u32) -> DriftLevel {
        if max_drift_bps > self.critical_bps {
            DriftLevel::High
        } else if max_drift_bps > self.high_bps {
            DriftLevel::Medium
        } else {
            DriftLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDrift {
    pub token: TokenId,
    pub current_bps: u32,
    pub target_bps: u32,
    pub drift_bps: u32,
    pub level: DriftLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub entries: Vec<TokenDrift>,
    pub max_drift_bps: u32,
    pub total_drift_bps: u32,
    pub needs_rebalance: bool,
    pub level: DriftLevel,
}

/// Measure drift of `current` holdings (token, bps) against `targets`.
///
/// Held tokens come first in the order given, followed by targeted tokens
/// that are not held at all. A targeted token held at 0 bps is graded as
/// missing.
pub fn analyze_drift(
    current: &[(TokenId, u32)],
    targets: &PortfolioSummary,
    thresholds: &DriftThresholds,
) -> DriftReport {
    let mut entries = Vec::with_capacity(current.len().max(targets.len()));

    for (token, current_bps) in current {
        let target_bps = targets.weight_of(token).unwrap_or(0);
        let drift_bps = current_bps.abs_diff(target_bps);
        let level = if *current_bps == 0 && target_bps > 0 {
            thresholds.missing_level(target_bps)
        } else {
            thresholds.token_level(drift_bps)
        };
        entries.push(TokenDrift {
            token: token.clone(),
            current_bps: *current_bps,
            target_bps,
            drift_bps,
            level,
        });
    }

    for (token, target_bps) in targets.entries() {
        if current.iter().any(|(held, _)| held == token) {
            continue;
        }
        entries.push(TokenDrift {
            token: token.clone(),
            current_bps: 0,
            target_bps,
            drift_bps: target_bps,
            level: thresholds.missing_level(target_bps),
        });
    }

    let max_drift_bps = entries.iter().map(|e| e.drift_bps).max().unwrap_or(0);
    let total_drift_bps = entries
        .iter()
        .fold(0u32, |acc, e| acc.saturating_add(e.drift_bps));

    let report = DriftReport {
        max_drift_bps,
        total_drift_bps,
        needs_rebalance: max_drift_bps > thresholds.high_bps,
        level: thresholds.portfolio_level(max_drift_bps),
        entries,
    };

    tracing::debug!(
        max_drift_bps = report.max_drift_bps,
        total_drift_bps = report.total_drift_bps,
        needs_rebalance = report.needs_rebalance,
        "Drift analyzed"
    );
    report
}
