//! Ledger Integration Tests
//!
//! End-to-end scenarios through the public API:
//! 1. Owner workflows (update, add+update, remove+update) under both weight policies
//! 2. Oracle -> SignalStrategy -> ledger rebalance
//! 3. LedgerService commit/persist/reload
//! 4. Long mixed operation sequences under both weight policies
//!
//! All tests are deterministic and use temp directories for any file I/O.

use signalstack_ledger::adapters::oracle::SignalStrategy;
use signalstack_ledger::application::LedgerService;
use signalstack_ledger::config::Config;
use signalstack_ledger::domain::{
    analyze_drift, normalize_to_bps, AccountId, DriftThresholds, LedgerError, LedgerPolicy,
    LedgerStore, PersistError, PortfolioSummary, TokenId, WeightPolicy, WeightedTokenLedger,
    MAX_BPS,
};
use signalstack_ledger::ports::StrategyPort;

// ============================================================================
// Test Fixtures
// ============================================================================

fn owner() -> AccountId {
    AccountId::from("0xOwner")
}

fn oracle() -> AccountId {
    AccountId::from("0xOracle")
}

fn t(id: &str) -> TokenId {
    TokenId::from(id)
}

fn ids(list: &[&str]) -> Vec<TokenId> {
    list.iter().map(|s| t(s)).collect()
}

/// Fresh ledger seeded with WETH 5000 / TK1 3000 / TK2 2000
fn deployed(policy: WeightPolicy) -> WeightedTokenLedger {
    let policy = LedgerPolicy {
        weights: policy,
        ..LedgerPolicy::default()
    };
    let mut ledger = WeightedTokenLedger::with_policy(owner(), policy);
    match policy.weights {
        WeightPolicy::Deferred => {
            ledger.add_supported_token(&owner(), t("WETH"), 5000).unwrap();
            ledger.add_supported_token(&owner(), t("TK1"), 3000).unwrap();
            ledger.add_supported_token(&owner(), t("TK2"), 2000).unwrap();
        }
        WeightPolicy::Strict => {
            // Strict deployments seed through a zero-weight add + full update
            ledger.add_supported_token(&owner(), t("WETH"), 10_000).unwrap();
            ledger.add_supported_token(&owner(), t("TK1"), 0).unwrap();
            ledger.add_supported_token(&owner(), t("TK2"), 0).unwrap();
            ledger
                .update_target_weights(&owner(), &ids(&["WETH", "TK1", "TK2"]), &[5000, 3000, 2000])
                .unwrap();
        }
    }
    ledger
}

/// Weights proportional to `shape(i)` over `tokens`, summing to 10000
fn spread(tokens: &[TokenId], shape: impl Fn(usize) -> f64) -> Vec<u32> {
    let values: Vec<(TokenId, f64)> = tokens
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), shape(i)))
        .collect();
    normalize_to_bps(&values)
        .unwrap()
        .into_iter()
        .map(|(_, w)| w)
        .collect()
}

fn assert_stable(summary: &PortfolioSummary) {
    let sum: u64 = summary.target_weights.iter().map(|w| u64::from(*w)).sum();
    assert_eq!(sum, u64::from(MAX_BPS));
    assert!(summary.is_balanced());
}

// ============================================================================
// Owner workflows
// ============================================================================

#[test]
fn test_update_target_weights_scenario() {
    for policy in [WeightPolicy::Deferred, WeightPolicy::Strict] {
        let mut ledger = deployed(policy);
        assert_stable(&ledger.portfolio_summary());

        ledger
            .update_target_weights(&owner(), &ids(&["WETH", "TK1", "TK2"]), &[6000, 3000, 1000])
            .unwrap();

        let summary = ledger.portfolio_summary();
        assert_eq!(summary.tokens, ids(&["WETH", "TK1", "TK2"]));
        assert_eq!(summary.target_weights, vec![6000, 3000, 1000]);
        assert_stable(&summary);
    }
}

#[test]
fn test_add_token_after_rebalance_deferred() {
    let mut ledger = deployed(WeightPolicy::Deferred);
    ledger
        .update_target_weights(&owner(), &ids(&["WETH", "TK1", "TK2"]), &[4000, 3000, 3000])
        .unwrap();
    ledger.add_supported_token(&owner(), t("TK3"), 1000).unwrap();
    assert!(ledger.is_supported(&t("TK3")));
    assert_eq!(ledger.portfolio_summary().target_weights[3], 1000);

    ledger
        .update_target_weights(
            &owner(),
            &ids(&["WETH", "TK1", "TK2", "TK3"]),
            &[3000, 3000, 3000, 1000],
        )
        .unwrap();

    let summary = ledger.portfolio_summary();
    assert_eq!(summary.weight_of(&t("TK3")), Some(1000));
    assert_stable(&summary);

    // Remove TK1, then restore the invariant across the remaining set
    ledger.remove_supported_token(&owner(), &t("TK1")).unwrap();
    assert!(!ledger.is_supported(&t("TK1")));
    ledger
        .update_target_weights(&owner(), &ids(&["WETH", "TK2", "TK3"]), &[5000, 3000, 2000])
        .unwrap();
    assert_eq!(ledger.portfolio_summary().target_weights, vec![5000, 3000, 2000]);
    assert_stable(&ledger.portfolio_summary());
}

#[test]
fn test_add_token_after_rebalance_strict() {
    let mut ledger = deployed(WeightPolicy::Strict);
    ledger
        .update_target_weights(&owner(), &ids(&["WETH", "TK1", "TK2"]), &[4000, 3000, 3000])
        .unwrap();

    // The deferred workflow is refused outright under strict enforcement
    let before = ledger.portfolio_summary();
    assert_eq!(
        ledger.add_supported_token(&owner(), t("TK3"), 1000),
        Err(LedgerError::WeightSumInvalid { total_bps: 11_000 })
    );
    assert_eq!(ledger.portfolio_summary(), before);

    // Strict equivalent: add at zero, then move weight onto it in one update
    ledger.add_supported_token(&owner(), t("TK3"), 0).unwrap();
    assert_stable(&ledger.portfolio_summary());
    ledger
        .update_target_weights(
            &owner(),
            &ids(&["WETH", "TK1", "TK2", "TK3"]),
            &[3000, 3000, 3000, 1000],
        )
        .unwrap();

    let summary = ledger.portfolio_summary();
    assert_eq!(summary.weight_of(&t("TK3")), Some(1000));
    assert_stable(&summary);
}

#[test]
fn test_failed_update_leaves_summary_unchanged() {
    for policy in [WeightPolicy::Deferred, WeightPolicy::Strict] {
        let mut ledger = deployed(policy);
        let before = ledger.portfolio_summary();

        for (tokens, weights) in [
            (ids(&["WETH", "TK1", "TK2"]), vec![6000, 3000, 2000]),
            (ids(&["WETH", "TK1", "TK2"]), vec![0, 0, 0]),
            (ids(&["WETH", "TK1"]), vec![6000, 4000]),
            (ids(&["WETH", "TK1", "TK9"]), vec![6000, 3000, 1000]),
            (ids(&["WETH", "TK1", "TK2"]), vec![6000, 4000]),
        ] {
            assert!(ledger.update_target_weights(&owner(), &tokens, &weights).is_err());
            assert_eq!(ledger.portfolio_summary(), before);
        }
    }
}

#[test]
fn test_duplicate_and_unknown_tokens() {
    let mut ledger = deployed(WeightPolicy::Deferred);
    let before = ledger.portfolio_summary();

    assert_eq!(
        ledger.add_supported_token(&owner(), t("WETH"), 0),
        Err(LedgerError::DuplicateToken(t("WETH")))
    );
    assert_eq!(
        ledger.remove_supported_token(&owner(), &t("TK3")),
        Err(LedgerError::UnknownToken(t("TK3")))
    );
    assert_eq!(ledger.portfolio_summary(), before);
}

// ============================================================================
// Strategy flow
// ============================================================================

#[test]
fn test_strategy_rebalance_scenario() {
    let mut ledger = deployed(WeightPolicy::Deferred);
    let strategy = SignalStrategy::new(AccountId::from("signalstack"), oracle());
    ledger
        .set_strategy(&owner(), strategy.strategy_id(), true)
        .unwrap();

    strategy
        .publish_weights(&oracle(), ids(&["WETH", "TK1", "TK2"]), vec![7000, 2000, 1000])
        .unwrap();
    ledger.execute_strategy_rebalance(&owner(), &strategy).unwrap();

    let summary = ledger.portfolio_summary();
    assert_eq!(summary.weight_of(&t("WETH")), Some(7000));
    assert_eq!(summary.weight_of(&t("TK1")), Some(2000));
    assert_eq!(summary.weight_of(&t("TK2")), Some(1000));
    assert_stable(&summary);
}

#[test]
fn test_strategy_not_set_until_registered() {
    let mut ledger = deployed(WeightPolicy::Deferred);
    let strategy = SignalStrategy::new(AccountId::from("signalstack"), oracle());
    strategy
        .publish_weights(&oracle(), ids(&["WETH", "TK1", "TK2"]), vec![7000, 2000, 1000])
        .unwrap();

    assert_eq!(
        ledger.execute_strategy_rebalance(&owner(), &strategy),
        Err(LedgerError::StrategyNotSet)
    );

    ledger
        .set_strategy(&owner(), AccountId::from("signalstack"), true)
        .unwrap();
    ledger.execute_strategy_rebalance(&owner(), &strategy).unwrap();

    ledger
        .set_strategy(&owner(), AccountId::from("signalstack"), false)
        .unwrap();
    assert_eq!(
        ledger.execute_strategy_rebalance(&owner(), &strategy),
        Err(LedgerError::StrategyNotSet)
    );
}

#[test]
fn test_strategy_vector_must_cover_supported_set() {
    let mut ledger = deployed(WeightPolicy::Deferred);
    let strategy = SignalStrategy::new(AccountId::from("signalstack"), oracle());
    ledger
        .set_strategy(&owner(), strategy.strategy_id(), true)
        .unwrap();
    ledger.add_supported_token(&owner(), t("TK3"), 0).unwrap();

    // Valid on its own, but omits TK3
    strategy
        .publish_weights(&oracle(), ids(&["WETH", "TK1", "TK2"]), vec![7000, 2000, 1000])
        .unwrap();
    assert_eq!(
        ledger.execute_strategy_rebalance(&owner(), &strategy),
        Err(LedgerError::TokenSetMismatch {
            missing: ids(&["TK3"]),
            duplicated: vec![],
        })
    );
}

// ============================================================================
// Service + persistence
// ============================================================================

#[tokio::test]
async fn test_service_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::in_dir(dir.path());
    let service = LedgerService::new(deployed(WeightPolicy::Deferred), Some(store.clone()));

    service
        .update_target_weights(&owner(), &ids(&["WETH", "TK1", "TK2"]), &[6000, 3000, 1000])
        .await
        .unwrap();
    service
        .set_strategy(&owner(), AccountId::from("signalstack"), true)
        .await
        .unwrap();

    let reloaded = store.load().unwrap().unwrap();
    assert_eq!(reloaded.portfolio_summary(), service.summary());
    assert_eq!(reloaded.owner(), &owner());

    let restarted = LedgerService::new(reloaded, Some(store));
    let err = restarted
        .add_supported_token(&AccountId::from("user"), t("TK3"), 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::Unauthorized { .. })
    ));
}

#[test]
fn test_drift_against_ledger_targets() {
    let ledger = deployed(WeightPolicy::Deferred);
    let report = analyze_drift(
        &[(t("WETH"), 5600), (t("TK1"), 2900), (t("TK2"), 1500)],
        &ledger.portfolio_summary(),
        &DriftThresholds::default(),
    );
    assert_eq!(report.max_drift_bps, 600);
    assert!(report.needs_rebalance);
}

#[test]
fn test_tampered_store_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::in_dir(dir.path());
    store.save(&deployed(WeightPolicy::Deferred)).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();

    let mut oversized = saved.clone();
    oversized["tokens"][1]["target_weight_bps"] = serde_json::json!(20_000);
    std::fs::write(store.path(), oversized.to_string()).unwrap();
    assert!(matches!(store.load(), Err(PersistError::InvalidState(_))));

    let mut duplicated = saved.clone();
    let first = duplicated["tokens"][0].clone();
    duplicated["tokens"].as_array_mut().unwrap().push(first);
    std::fs::write(store.path(), duplicated.to_string()).unwrap();
    assert!(matches!(store.load(), Err(PersistError::InvalidState(_))));

    std::fs::write(store.path(), saved.to_string()).unwrap();
    assert!(store.load().unwrap().unwrap().is_balanced());
}

// ============================================================================
// Mixed sequences
// ============================================================================

#[test]
fn test_mixed_operation_sequence_stays_balanced() {
    for policy in [WeightPolicy::Deferred, WeightPolicy::Strict] {
        let mut ledger = deployed(policy);
        let strategy = SignalStrategy::new(AccountId::from("signalstack"), oracle());
        ledger
            .set_strategy(&owner(), strategy.strategy_id(), true)
            .unwrap();

        for round in 0..5 {
            // Add
            let added = t(&format!("TK{}", round + 3));
            match policy {
                WeightPolicy::Deferred => {
                    ledger.add_supported_token(&owner(), added.clone(), 500).unwrap();
                    assert!(!ledger.is_balanced());
                }
                WeightPolicy::Strict => {
                    ledger.add_supported_token(&owner(), added.clone(), 0).unwrap();
                    assert_stable(&ledger.portfolio_summary());
                }
            }
            let tokens = ledger.portfolio_summary().tokens;
            ledger
                .update_target_weights(&owner(), &tokens, &spread(&tokens, |_| 1.0))
                .unwrap();
            assert_stable(&ledger.portfolio_summary());

            // Strategy rebalance
            let weights = spread(&tokens, |i| (i + 1) as f64);
            strategy
                .publish_weights(&oracle(), tokens.clone(), weights.clone())
                .unwrap();
            ledger.execute_strategy_rebalance(&owner(), &strategy).unwrap();
            assert_eq!(ledger.portfolio_summary().target_weights, weights);
            assert_stable(&ledger.portfolio_summary());

            // Rejected update
            let before = ledger.portfolio_summary();
            let mut over = weights.clone();
            over[0] += 1;
            assert_eq!(
                ledger.update_target_weights(&owner(), &tokens, &over),
                Err(LedgerError::WeightSumInvalid { total_bps: 10_001 })
            );
            assert_eq!(ledger.portfolio_summary(), before);

            // Remove the oldest token after WETH
            let removed = tokens[1].clone();
            match policy {
                WeightPolicy::Deferred => {
                    ledger.remove_supported_token(&owner(), &removed).unwrap();
                    assert!(!ledger.is_balanced());
                }
                WeightPolicy::Strict => {
                    assert!(matches!(
                        ledger.remove_supported_token(&owner(), &removed),
                        Err(LedgerError::WeightSumInvalid { .. })
                    ));
                    assert_eq!(ledger.portfolio_summary(), before);

                    let mut drained = weights.clone();
                    drained[0] += drained[1];
                    drained[1] = 0;
                    ledger
                        .update_target_weights(&owner(), &tokens, &drained)
                        .unwrap();
                    assert_stable(&ledger.portfolio_summary());
                    ledger.remove_supported_token(&owner(), &removed).unwrap();
                    assert_stable(&ledger.portfolio_summary());
                }
            }
            let remaining = ledger.portfolio_summary().tokens;
            assert!(!remaining.contains(&removed));
            assert!(remaining.contains(&added));
            ledger
                .update_target_weights(&owner(), &remaining, &spread(&remaining, |_| 1.0))
                .unwrap();
            assert_stable(&ledger.portfolio_summary());
        }

        assert_eq!(ledger.portfolio_summary().len(), 3);
        assert_eq!(ledger.policy().weights, policy);
        assert!(ledger.validate().is_ok());
    }
}

#[tokio::test]
async fn test_strict_config_seeds_and_serves() {
    let config: Config = toml::from_str(
        r#"
[ledger]
owner = "0xOwner"
weight_policy = "strict"

[strategy]
id = "signalstack"
oracle = "0xOracle"

[[tokens]]
id = "WETH"
weight_bps = 5000

[[tokens]]
id = "TK1"
weight_bps = 3000

[[tokens]]
id = "TK2"
weight_bps = 2000
"#,
    )
    .unwrap();
    config.validate().unwrap();

    let ledger = config.seed_ledger().unwrap();
    assert_eq!(ledger.policy().weights, WeightPolicy::Strict);
    assert_stable(&ledger.portfolio_summary());

    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::in_dir(dir.path());
    let service = LedgerService::new(ledger, Some(store.clone()));

    // Strict enforcement is live after seeding
    let err = service
        .add_supported_token(&owner(), t("TK3"), 1000)
        .await
        .unwrap_err();
    assert_eq!(
        err.ledger_error(),
        Some(&LedgerError::WeightSumInvalid { total_bps: 11_000 })
    );

    service.add_supported_token(&owner(), t("TK3"), 0).await.unwrap();
    service
        .update_target_weights(
            &owner(),
            &ids(&["WETH", "TK1", "TK2", "TK3"]),
            &[4000, 3000, 2000, 1000],
        )
        .await
        .unwrap();

    let reloaded = store.load().unwrap().unwrap();
    assert_eq!(reloaded.policy().weights, WeightPolicy::Strict);
    assert_stable(&reloaded.portfolio_summary());
}
