//! vnidmgrd - VNID allocation repair daemon
//!
//! Main entry point. Wires the repair controller against the in-memory
//! registries (standalone mode, pending real cluster store wiring) and runs
//! reconciliation cycles until shutdown.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use osdn_vnid::{contiguous_store, RangeAllocationRecord};
use osdn_vnidmgrd::{
    MemoryNetNamespaceRegistry, MemoryRangeRegistry, Repair, RepairError, VnidmgrdConfig,
    DEFAULT_FETCH_ATTEMPTS, DEFAULT_FETCH_DELAY_SECS, DEFAULT_REPAIR_INTERVAL_SECS,
};

/// VNID allocation repair daemon
#[derive(Parser, Debug)]
#[command(name = "vnidmgrd", about = "VNID allocation repair daemon")]
struct Args {
    /// First allocatable VNID
    #[arg(long, default_value_t = 200)]
    range_base: u32,

    /// Number of allocatable VNIDs
    #[arg(long, default_value_t = 4096)]
    range_size: u32,

    /// Seconds between repair cycles
    #[arg(long, default_value_t = DEFAULT_REPAIR_INTERVAL_SECS)]
    repair_interval_secs: u64,

    /// Attempts to fetch the persisted record at cycle start
    #[arg(long, default_value_t = DEFAULT_FETCH_ATTEMPTS)]
    fetch_attempts: u32,

    /// Seconds between fetch attempts
    #[arg(long, default_value_t = DEFAULT_FETCH_DELAY_SECS)]
    fetch_delay_secs: u64,
}

impl Args {
    fn into_config(self) -> VnidmgrdConfig {
        VnidmgrdConfig {
            range_base: self.range_base,
            range_size: self.range_size,
            repair_interval_secs: self.repair_interval_secs,
            fetch_attempts: self.fetch_attempts,
            fetch_delay_secs: self.fetch_delay_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Args::parse();
    info!("--- Starting vnidmgrd (Rust) ---");

    match run_daemon(args.into_config()).await {
        Ok(()) => {
            info!("vnidmgrd: exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "vnidmgrd: exiting with error");
            Err(e.into())
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}

async fn run_daemon(config: VnidmgrdConfig) -> osdn_vnidmgrd::Result<()> {
    // Standalone mode: in-memory registries seeded with an empty record.
    // TODO: replace with cluster-backed registries once the store client
    // crate lands.
    let range = config
        .range()
        .map_err(|e| RepairError::Config(e.to_string()))?;
    let netns_registry = Arc::new(MemoryNetNamespaceRegistry::new());
    let range_registry = Arc::new(MemoryRangeRegistry::with_record(
        RangeAllocationRecord::new(range.to_string()),
    ));

    let repair = Repair::new(config, contiguous_store, netns_registry, range_registry)?;
    info!(range = %repair.range(), "vnidmgrd: repair controller initialized");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("vnidmgrd: received SIGINT/SIGTERM");
                shutdown.cancel();
            }
        });
    }

    repair.run_until(shutdown).await;
    info!("vnidmgrd: graceful shutdown complete");
    Ok(())
}
