//! Key Server Binary
//!
//! Serves a local key server over TCP for `KeyServerRemote` clients.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use keyserver::network::Server;
use keyserver::{Config, KeyServerLocal, StorageMode, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// Key server
#[derive(Parser, Debug)]
#[command(name = "keyserver")]
#[command(about = "Serve key server halves from a local store")]
#[command(version)]
struct Args {
    /// Log file for durable storage (in-memory if omitted)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7461")]
    listen: String,

    /// Number of connection worker threads
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// fsync after this many writes (1 = every write)
    #[arg(long, default_value = "1")]
    sync_every: usize,

    /// Dead log records tolerated before the log is rewritten
    #[arg(long, default_value = "4096")]
    compaction_threshold: usize,

    /// Close client connections idle this long (0 = never)
    #[arg(long, default_value = "30000")]
    read_timeout_ms: u64,

    /// Give up on a client that stops reading for this long (0 = never)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keyserver=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("keyserver v{}", keyserver::VERSION);

    let sync_strategy = if args.sync_every <= 1 {
        SyncStrategy::EveryWrite
    } else {
        SyncStrategy::EveryNEntries {
            count: args.sync_every,
        }
    };

    let builder = Config::builder()
        .listen_addr(&args.listen)
        .worker_threads(args.workers)
        .sync_strategy(sync_strategy)
        .compaction_threshold(args.compaction_threshold)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms);
    let config = match &args.db {
        Some(path) => builder.db_file(path),
        None => builder.memory(),
    }
    .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let storage = match &args.db {
        Some(path) => {
            tracing::info!("Storage: {}", path.display());
            StorageMode::File(path.clone())
        }
        None => {
            tracing::warn!("Storage: in-memory, nothing will survive a restart");
            StorageMode::Memory
        }
    };

    let store = match KeyServerLocal::open(storage, &config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store opened with {} entries", store.engine().entry_count());

    let mut server = Server::new(config, store);
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
