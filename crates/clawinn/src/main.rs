//! clawinn - Marketplace Simulator
//!
//! Seeds (or resumes) a marketplace of autonomous agents and runs the tick
//! loop until Ctrl-C or the requested duration elapses.

mod cli;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use clawinn_core::{
    ChannelBroadcaster, MarketEvent, MarketStore, MemoryStore, ScriptedContent, SimConfig,
};
use clawinn_sim::{Marketplace, seed_marketplace};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, RunArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("clawinn=info".parse()?);
    tracing_subscriber::registry()
        .with(filter)
        .with(cli.log_json.then(|| fmt::layer().json()))
        .with((!cli.log_json).then(fmt::layer))
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::InitConfig { output } => init_config(&output)?,
        Commands::Stats { state } => print_stats(&state).await?,
    }

    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "loading config");
            SimConfig::load(path)?
        }
        None => SimConfig::default(),
    };
    let config = args.apply(config);

    let store = open_store(args.state.as_deref())?;
    let events = ChannelBroadcaster::default();
    let subscription = events.subscribe();

    let mut builder = Marketplace::builder(store, ScriptedContent, events).config(config);
    if let Some(seed) = args.seed {
        info!(seed, "using fixed seed");
        builder = builder.seed(seed);
    }
    let market = builder.build()?;

    if market.store().stats().await?.total_agents == 0 {
        seed_marketplace(
            market.store(),
            &market.config().population,
            market.rng(),
            market.clock(),
        )
        .await?;
    }
    market.repair().await?;

    let logger = tokio::spawn(log_events(subscription));

    let scheduler = market.scheduler();
    scheduler.start();

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
                () = tokio::time::sleep(Duration::from_secs(secs)) => info!(secs, "run duration elapsed"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("interrupted");
        }
    }

    scheduler.shutdown().await;
    logger.abort();

    let stats = market.store().stats().await?;
    info!(
        ticks = scheduler.ticks_completed(),
        phase_failures = scheduler.phase_failures(),
        agents = stats.total_agents,
        credits = stats.total_credits_in_circulation,
        in_flight = market.coordinator().active_count(),
        "simulation stopped"
    );

    if let Some(path) = &args.state {
        market.store().save_snapshot(path)?;
        info!(state = %path.display(), "saved state");
    }
    Ok(())
}

fn open_store(state: Option<&Path>) -> anyhow::Result<MemoryStore> {
    match state {
        Some(path) if path.exists() => {
            let store = MemoryStore::load_snapshot(path)?;
            info!(state = %path.display(), "resumed from snapshot");
            Ok(store)
        }
        _ => Ok(MemoryStore::new()),
    }
}

async fn log_events(mut rx: broadcast::Receiver<MarketEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => debug!(event = event.name(), payload = %json, "market event"),
                Err(e) => warn!(event = event.name(), error = %e, "unserializable event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    SimConfig::default().save(output)?;
    println!("Config written to {}", output.display());
    Ok(())
}

async fn print_stats(state: &Path) -> anyhow::Result<()> {
    let store = MemoryStore::load_snapshot(state)?;
    let stats = store.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_config_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clawinn.json");
        init_config(&path).unwrap();
        let loaded = SimConfig::load(&path).unwrap();
        assert_eq!(loaded.tick_interval_ms, SimConfig::default().tick_interval_ms);
    }

    #[test]
    fn missing_state_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(Some(&dir.path().join("absent.json"))).unwrap();
        assert!(store.snapshot().agents.is_empty());
    }

    #[tokio::test]
    async fn stats_reads_a_saved_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.json");
        MemoryStore::new().save_snapshot(&path).unwrap();
        print_stats(&path).await.unwrap();
        let store = open_store(Some(&path)).unwrap();
        assert_eq!(store.stats().await.unwrap().total_agents, 0);
    }
}
