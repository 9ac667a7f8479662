use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{load_keys, AppConfig, Keys};
use mev::{ExecutionReport, SubmitMode, Trigger};
use network::Shutdown;
use sniper::{logging, output, pipeline, Cli, Command, TriggerRouter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use watcher::{
    read_lock_array, BlockTiming, ChainMonitor, EventDispatcher, PendingTxWatcher, Supervisor,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init(&cfg.logging)?;

    // keys are read from the environment once, and only by modes that sign
    let keys = if cli.command.needs_keys() {
        Some(load_keys(&cfg.keys)?)
    } else {
        None
    };

    match cli.command {
        Command::Watch { simulate, .. } => watch(&cfg, keys, simulate).await,
        Command::Fire => fire(&cfg, keys, SubmitMode::Send).await,
        Command::Simulate => fire(&cfg, keys, SubmitMode::Simulate).await,
        Command::Locks { max_entries } => locks(&cfg, max_entries).await,
        Command::Head => head(&cfg).await,
    }
}

/// `keys` is `None` in observe-only mode.
async fn watch(cfg: &AppConfig, keys: Option<Keys>, simulate: bool) -> Result<()> {
    info!("🚀 Starting watch pipeline for {:?}", cfg.watcher.contract_address);

    let (client, chain_id) = pipeline::connect(&cfg.chain).await?;
    let table = Arc::new(pipeline::signature_table(cfg)?);
    let selector = pipeline::selector_trigger(cfg)?;

    let executor = match keys {
        Some(keys) => Some(Arc::new(pipeline::executor(cfg, client.clone(), keys, chain_id)?)),
        None => {
            info!("👀 Observe-only mode, no bundles will be built");
            None
        }
    };
    let mode = SubmitMode::from_simulate_flag(simulate || cfg.relay.simulate);

    let shutdown = Shutdown::new();
    let restart = &cfg.watcher.restart;
    let buffer = cfg.watcher.event_buffer;

    let (event_tx, event_rx) = mpsc::channel(buffer);
    let dispatcher = EventDispatcher::new(client.clone(), table, buffer)
        .with_from_block(cfg.watcher.from_block)
        .start(cfg.watcher.contract_address, restart, event_tx);

    let (pending, pending_rx) = if cfg.watcher.subscribe_pending {
        if selector.is_none() {
            info!("🔍 No pending_selector configured, pending transactions are inspected only");
        }
        let (tx, rx) = mpsc::channel(buffer);
        let watcher = PendingTxWatcher::new(client.clone(), buffer, cfg.watcher.lookup_workers)
            .with_trigger(selector);
        let handle = watcher.start(restart, tx);
        (Some((handle, watcher.stats())), Some(rx))
    } else {
        if selector.is_some() {
            warn!("⚠️ watcher.pending_selector is set but subscribe_pending is off");
        }
        (None, None)
    };

    let monitor = ChainMonitor::new(
        client.clone(),
        Duration::from_secs(cfg.watcher.poll_interval_secs.max(1)),
    );
    let poller = tokio::spawn({
        let monitor = monitor.clone();
        let signal = shutdown.signal();
        async move { monitor.run_poller(signal).await }
    });

    let heads = cfg.watcher.subscribe_heads.then(|| {
        let (timing_tx, mut timing_rx) = mpsc::channel::<BlockTiming>(16);
        let supervisor = Supervisor::new("newHeads", restart, shutdown.signal());
        let signal = shutdown.signal();
        let monitor = monitor.clone();

        tokio::spawn(async move {
            while let Some(timing) = timing_rx.recv().await {
                debug!(block = timing.number, gap = ?timing.since_previous, "Block timing");
            }
        });
        tokio::spawn(async move {
            supervisor
                .run(|| {
                    let monitor = monitor.clone();
                    let out = timing_tx.clone();
                    let signal = signal.clone();
                    async move { monitor.run_head_timing(buffer, &out, &signal).await }
                })
                .await
        })
    });

    let router = TriggerRouter::new(executor, mode, cfg.bundle.trigger_events.clone());
    let mut router_task = tokio::spawn(router.run(event_rx, pending_rx, shutdown.signal()));
    info!("✅ Pipeline running, press Ctrl+C to stop");

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("🛑 Interrupt received, shutting down");
            None
        }
        joined = &mut router_task => Some(joined),
    };
    shutdown.trigger();

    let stats = match finished {
        Some(joined) => joined,
        None => router_task.await,
    }
    .context("Trigger router task failed")?;

    let pending_stats = match pending {
        Some((handle, stats)) => {
            if let Err(e) = handle.stop().await {
                error!("❌ Pending watcher ended with error: {}", e);
            }
            Some(stats.snapshot())
        }
        None => None,
    };
    if let Some(heads) = heads {
        match heads.await {
            Ok(Err(e)) => error!("❌ Head feed ended with error: {}", e),
            Err(e) => error!("❌ Head feed task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    if let Err(e) = poller.await {
        error!("❌ Head poller task failed: {}", e);
    }

    let dispatch_stats = dispatcher.stats();
    let dispatched = dispatcher.stop().await;
    info!(
        router = ?stats,
        dispatcher = ?dispatch_stats,
        pending = ?pending_stats,
        last_head = ?monitor.last_sampled(),
        "📊 Final statistics"
    );
    dispatched.context("Log subscription failed")?;
    Ok(())
}

async fn fire(cfg: &AppConfig, keys: Option<Keys>, mode: SubmitMode) -> Result<()> {
    let keys = keys.context("Signing keys were not loaded")?;
    let (client, chain_id) = pipeline::connect(&cfg.chain).await?;
    let executor = pipeline::executor(cfg, client, keys, chain_id)?;

    let report = executor
        .execute(&Trigger::manual(), mode)
        .await
        .context("Bundle execution failed")?;
    println!("{}", serde_json::to_string_pretty(&output::report_json(&report))?);

    if let ExecutionReport::Rejected { code, message, .. } = report {
        bail!("Relay rejected the bundle ({code}): {message}");
    }
    Ok(())
}

async fn locks(cfg: &AppConfig, max_entries: Option<u64>) -> Result<()> {
    let storage = cfg
        .storage
        .as_ref()
        .context("The locks mode needs a [storage] section")?;
    let (client, _) = pipeline::connect(&cfg.chain).await?;

    let entries = read_lock_array(
        client.as_ref(),
        storage.contract_address,
        storage.base_slot,
        max_entries.unwrap_or(storage.max_entries),
    )
    .await
    .context("Failed to read lock array")?;

    info!("📋 Read {} lock entries", entries.len());
    for (index, entry) in entries.iter().enumerate() {
        println!("{}", output::lock_json(index, entry));
    }
    Ok(())
}

async fn head(cfg: &AppConfig) -> Result<()> {
    let (client, _) = pipeline::connect(&cfg.chain).await?;
    let height = client
        .block_number()
        .await
        .context("Failed to read block number")?;
    println!("{height}");
    Ok(())
}
