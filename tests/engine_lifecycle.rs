//! End-to-end lifecycle scenarios over the simulated machine: the full
//! submit -> wait -> provisional -> claim -> reconcile path, exercised
//! through the public API only.

use reelspin::adapter::simulated::SIM_PLAYER;
use reelspin::{
    AdapterFactory, EngineSettings, MachineConfig, MachineType, PaylineSet, Paytable,
    QueueSettings, ReelLayout, SettingsBuilder, SimulatedAdapter, SlotAdapter, SpinEngine,
    SpinStatus, Symbol, WinRule,
};
use reelspin::paytable::PaytableEntry;
use std::sync::Arc;
use std::time::Duration;

fn fast_queue() -> QueueSettings {
    QueueSettings {
        poll_interval_ms: 10,
        max_poll_attempts: 500,
        claim_window_rounds: 1_000,
        claim_timeout_ms: 2_000,
    }
}

fn settings(machine: MachineType) -> EngineSettings {
    SettingsBuilder::new()
        .machine(machine)
        .queue(fast_queue())
        .build()
}

fn engine_over(adapter: Arc<SimulatedAdapter>) -> SpinEngine {
    SpinEngine::new(adapter, fast_queue())
}

/// A machine whose reels carry only the top symbol: every spin is a
/// guaranteed five-of-a-kind on every payline.
fn single_symbol_machine() -> MachineConfig {
    MachineConfig {
        win_rule: WinRule::Paylines,
        layout: ReelLayout::new("A".repeat(40), 5, 8, 3).unwrap(),
        paylines: PaylineSet::new(vec![
            vec![1, 1, 1, 1, 1],
            vec![0, 0, 0, 0, 0],
            vec![2, 2, 2, 2, 2],
        ]),
        paytable: Paytable::new(vec![
            PaytableEntry {
                symbol: Symbol('A'),
                run_length: 3,
                multiplier: 100,
            },
            PaytableEntry {
                symbol: Symbol('A'),
                run_length: 4,
                multiplier: 1_000,
            },
            PaytableEntry {
                symbol: Symbol('A'),
                run_length: 5,
                multiplier: 10_000,
            },
        ]),
        min_stake_per_line: 1_000,
        max_stake_per_line: 100_000_000,
        max_lines: 3,
        max_payout_multiplier: 10_000,
    }
}

#[tokio::test]
async fn full_lifecycle_produces_verified_outcome() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));
    let engine = engine_over(adapter.clone());

    let id = engine.submit_spin(1_000_000, 20).await.unwrap();
    let outcome = engine
        .wait_for_completion(&id, Duration::from_secs(10))
        .await
        .unwrap();

    assert!(outcome.verified);
    assert!(outcome.claim_tx_id.is_some());
    assert_eq!(outcome.grid.reel_count(), 5);
    assert_eq!(outcome.grid.window_height(), 3);

    let spin = engine.spin(&id).unwrap();
    assert_eq!(spin.status, SpinStatus::Completed);
    let commitment = spin.commitment.unwrap();
    assert_eq!(commitment.claim_round, commitment.submit_round + 1);
    assert_eq!(outcome.seed_round, commitment.claim_round);
}

#[tokio::test]
async fn submission_pays_total_stake_plus_fee() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));
    let engine = engine_over(adapter.clone());

    // One-unit stake over 20 lines.
    let id = engine.submit_spin(1_000_000, 20).await.unwrap();
    engine
        .wait_for_completion(&id, Duration::from_secs(10))
        .await
        .unwrap();

    let payments = adapter.ledger().payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(
        payments[0].amount,
        20_000_000 + adapter.ledger().min_fee()
    );
}

#[tokio::test]
async fn contract_error_on_claim_still_completes_unverified() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    adapter.ledger().set_fail_claims(true);
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));
    let engine = engine_over(adapter.clone());

    let id = engine.submit_spin(1_000_000, 20).await.unwrap();
    let outcome = engine
        .wait_for_completion(&id, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(engine.spin(&id).unwrap().status, SpinStatus::Completed);
    assert!(!outcome.verified);
    assert!(outcome.claim_tx_id.is_none());
    // The payout is still recomputable from the grid the player saw.
    assert_eq!(
        outcome.total_payout,
        outcome.winning_lines.iter().map(|l| l.payout).sum::<u64>()
    );
}

#[tokio::test]
async fn forced_five_of_a_kind_pays_exact_line_amount() {
    let adapter = Arc::new(SimulatedAdapter::new(
        single_symbol_machine(),
        &settings(MachineType::Simulated),
    ));
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));
    let engine = engine_over(adapter.clone());

    let id = engine.submit_spin(1_000_000, 3).await.unwrap();
    let outcome = engine
        .wait_for_completion(&id, Duration::from_secs(10))
        .await
        .unwrap();

    // Every line is A x5 at 10000x: exactly 10,000,000,000 per line.
    assert_eq!(outcome.winning_lines.len(), 3);
    for line in &outcome.winning_lines {
        assert_eq!(line.symbol, Symbol('A'));
        assert_eq!(line.run_length, 5);
        assert_eq!(line.payout, 10_000_000_000);
    }
    assert_eq!(outcome.total_payout, 30_000_000_000);
    assert!(outcome.verified);
}

#[tokio::test]
async fn outcome_information_never_regresses() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(10));
    let engine = engine_over(adapter.clone());

    let id = engine.submit_spin(10_000, 20).await.unwrap();

    // Observe the outcome repeatedly while the spin progresses: the
    // verified flag may flip false -> true but never back.
    let mut saw_verified = false;
    loop {
        if let Some(outcome) = engine.current_outcome(&id) {
            if saw_verified {
                assert!(outcome.verified, "verified outcome regressed");
            }
            saw_verified |= outcome.verified;
        }
        let spin = engine.spin(&id).unwrap();
        if spin.status == SpinStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.current_outcome(&id).unwrap().verified);
}

#[tokio::test]
async fn payout_never_exceeds_configured_ceiling() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(10));
    let engine = engine_over(adapter.clone());

    let stake = 10_000u64;
    let lines = 20u32;
    let config = {
        adapter.initialize().await.unwrap();
        adapter.machine_config().unwrap()
    };
    let ceiling = config.max_payout_multiplier * stake * lines as u64;

    for _ in 0..10 {
        let id = engine.submit_spin(stake, lines).await.unwrap();
        let outcome = engine
            .wait_for_completion(&id, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(outcome.total_payout <= ceiling);
    }
}

#[tokio::test]
async fn ways_machine_completes_and_reconciles() {
    let factory = AdapterFactory::new(settings(MachineType::WaysToWin));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));
    let engine = engine_over(adapter.clone());

    let id = engine.submit_spin(10_000, 1).await.unwrap();
    let outcome = engine
        .wait_for_completion(&id, Duration::from_secs(10))
        .await
        .unwrap();

    assert!(outcome.verified);
    for line in &outcome.winning_lines {
        assert!(line.pattern.is_empty());
        assert!(line.ways >= 1);
    }
}

#[tokio::test]
async fn initialization_fetches_config_once_across_spins() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(10));
    let engine = engine_over(adapter.clone());

    for _ in 0..3 {
        let id = engine.submit_spin(10_000, 5).await.unwrap();
        engine
            .wait_for_completion(&id, Duration::from_secs(10))
            .await
            .unwrap();
    }

    assert_eq!(adapter.ledger().config_fetch_count(), 1);
}

#[tokio::test]
async fn balances_reconcile_after_session() {
    let factory = AdapterFactory::new(settings(MachineType::Simulated));
    let adapter = factory.create_simulated();
    let _miner = adapter.ledger().spawn_miner(Duration::from_millis(10));
    let engine = engine_over(adapter.clone());

    let start = adapter.balance(SIM_PLAYER).await.unwrap();
    let stake = 10_000u64;
    let lines = 10u32;
    let mut won = 0u64;
    let mut staked = 0u64;

    for _ in 0..5 {
        let id = engine.submit_spin(stake, lines).await.unwrap();
        let outcome = engine
            .wait_for_completion(&id, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(outcome.verified);
        won += outcome.total_payout;
        staked += stake * lines as u64 + adapter.ledger().min_fee();
    }

    let end = adapter.balance(SIM_PLAYER).await.unwrap();
    assert_eq!(end, start - staked + won);
}
