//! Demo binary: spins the simulated machine end-to-end and logs the
//! lifecycle. Doubles as executable documentation of the caller-facing API.

use clap::Parser;
use reelspin::{
    AdapterFactory, EngineSettings, MachineType, SettingsBuilder, SlotAdapter, SpinEngine,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reelspin-sim", about = "Spin the simulated slot machine")]
struct Args {
    /// Number of spins to run
    #[arg(long, default_value_t = 10)]
    spins: u32,

    /// Stake per line in smallest units
    #[arg(long, default_value_t = 1_000_000)]
    stake: u64,

    /// Active paylines
    #[arg(long, default_value_t = 20)]
    lines: u32,

    /// Evaluate with the ways-to-win rule instead of fixed paylines
    #[arg(long, default_value_t = false)]
    ways: bool,

    /// Milliseconds between simulated rounds
    #[arg(long, default_value_t = 100)]
    round_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let machine = if args.ways {
        MachineType::WaysToWin
    } else {
        MachineType::Simulated
    };
    let settings: EngineSettings = SettingsBuilder::new().machine(machine).build();

    let factory = AdapterFactory::new(settings.clone());
    let adapter = factory.create_simulated();
    let _miner = adapter
        .ledger()
        .spawn_miner(Duration::from_millis(args.round_ms));

    let engine = SpinEngine::new(adapter.clone(), settings.queue.clone());

    let mut total_staked: u64 = 0;
    let mut total_won: u64 = 0;
    let mut unverified = 0u32;

    for i in 0..args.spins {
        let id = engine.submit_spin(args.stake, args.lines).await?;
        let outcome = engine
            .wait_for_completion(&id, Duration::from_secs(30))
            .await?;

        total_staked += args.stake * args.lines as u64;
        total_won += outcome.total_payout;
        if !outcome.verified {
            unverified += 1;
        }

        tracing::info!(
            spin = i + 1,
            payout = outcome.total_payout,
            verified = outcome.verified,
            lines_won = outcome.winning_lines.len(),
            "Result"
        );
        println!("--- spin {} ---\n{}", i + 1, outcome.grid);
    }

    let balance = adapter
        .balance(reelspin::adapter::simulated::SIM_PLAYER)
        .await?;
    tracing::info!(
        total_staked,
        total_won,
        unverified,
        balance,
        "Session finished"
    );
    println!("{}", serde_json::to_string_pretty(&engine.queue_state())?);
    Ok(())
}
