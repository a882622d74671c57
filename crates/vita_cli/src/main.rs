use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vita_core::{wall_now, SelfState, VitaConfig};
use vita_runtime::{take_restart_marker, EventQueue, SilenceDetector, SnapshotStore, TickRuntime};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, default_value = "vita.toml")]
    config: String,

    /// Tick interval in seconds (overrides config file)
    #[arg(long)]
    tick_interval: Option<f64>,

    /// Snapshot every N ticks (overrides config file)
    #[arg(long)]
    snapshot_period: Option<u64>,

    /// Snapshot directory (overrides config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Remove existing snapshots before starting
    #[arg(long, value_parser = ["yes", "no"], default_value = "no")]
    clear_data: String,

    /// Consume a dev-mode restart marker if present
    #[arg(long)]
    restart: bool,

    /// Path of the restart marker file
    #[arg(long, default_value = "data/restart_marker.json")]
    restart_marker: PathBuf,

    /// Disable the silence detector
    #[arg(long)]
    no_silence: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Log file path (additional to stderr)
    #[arg(long)]
    log_file: Option<String>,
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if let Some(ref log_path) = args.log_file {
        let path = std::path::Path::new(log_path);
        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or(std::path::Path::new(".")),
            path.file_name().unwrap_or(std::ffi::OsStr::new("vita.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the writer lives for the program's lifetime
        std::mem::forget(guard);

        if args.log_json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
        }
    } else if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolve the starting state and queued events: restart marker first,
/// then the newest snapshot, then cold defaults.
fn resolve_startup(args: &Args, config: &VitaConfig) -> (SelfState, Vec<vita_core::Event>) {
    if args.restart {
        if let Some(payload) = take_restart_marker(&args.restart_marker) {
            if let Some(state) = payload.state {
                info!(life_id = %state.life_id, ticks = state.ticks, "resuming from restart marker");
                return (state, payload.events);
            }
            warn!("restart marker carried no state; trying snapshots");
        }
    }

    let store = SnapshotStore::new(config.snapshots.dir.clone(), config.snapshots.keep);
    if let Some((state, events)) = store.load_latest() {
        info!(life_id = %state.life_id, ticks = state.ticks, "resuming from snapshot");
        return (state, events);
    }

    let state = SelfState::default();
    info!(life_id = %state.life_id, "cold start");
    (state, Vec::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let mut config = VitaConfig::load_or_default(&args.config);
    if let Some(v) = args.tick_interval {
        config.runtime.tick_interval_secs = v;
    }
    if let Some(v) = args.snapshot_period {
        config.runtime.snapshot_period = v;
    }
    if let Some(ref dir) = args.data_dir {
        config.snapshots.dir = dir.clone();
    }
    if args.no_silence {
        config.silence.enabled = false;
    }

    if args.clear_data == "yes" && config.snapshots.dir.exists() {
        std::fs::remove_dir_all(&config.snapshots.dir)
            .map_err(|e| anyhow::anyhow!("failed to clear data dir: {e}"))?;
        info!(dir = %config.snapshots.dir.display(), "cleared snapshot data");
    }

    let (state, restored_events) = resolve_startup(&args, &config);

    let queue = Arc::new(EventQueue::new(config.queue.capacity));
    queue.restore(restored_events);

    let silence_config = config.silence.clone();
    let runtime = TickRuntime::new(config, state, Arc::clone(&queue));
    let stop = runtime.stop_handle();

    // Silence detector runs beside the loop, feeding the queue like any
    // other producer.
    if silence_config.enabled {
        let queue = Arc::clone(&queue);
        let stop = stop.clone();
        let mut detector = SilenceDetector::new(&silence_config, wall_now());
        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs_f64(
                silence_config.check_interval_secs.max(0.1),
            );
            loop {
                tokio::time::sleep(interval).await;
                if stop.is_stopped() {
                    break;
                }
                if let Some(event) = detector.check_silence_period(wall_now()) {
                    queue.push(event);
                }
            }
        });
    }

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("stop signal received");
                stop.stop();
            }
        });
    }

    let state_handle = runtime.run().await;
    let state = state_handle
        .read()
        .unwrap_or_else(|e| e.into_inner());
    info!(
        ticks = state.ticks,
        age = state.age,
        energy = state.energy,
        "clean stop"
    );
    Ok(())
}
