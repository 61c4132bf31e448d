//! devlink - Account linking for devices without a keyboard
//!
//! A TV or set-top box asks for a short code, the user types it on their phone
//! together with their OAuth login, and the device picks up the token.

use anyhow::Result;
use clap::Parser;
use devlink_auth::{CodeGenerator, CodeRegistry, LinkRegistry, LinkingManager};
use devlink_core::{Config, DEFAULT_CODE_TTL_SECS};
use devlink_server::{create_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Value of `DEBUG` that turns on debug mode, besides `*`
const DEBUG_ID: &str = "devlink";

/// devlink - Link devices to user accounts with short activation codes
#[derive(Parser, Debug)]
#[command(name = "devlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Seconds an activation code stays valid
    #[arg(short = 't', long, default_value_t = DEFAULT_CODE_TTL_SECS)]
    code_ttl: u64,

    /// Smallest raw code value (before the check digit)
    #[arg(long, default_value = "1000")]
    code_min: u32,

    /// Largest raw code value (before the check digit)
    #[arg(long, default_value = "9999")]
    code_max: u32,

    /// Seconds between sweeps of expired codes
    #[arg(long, default_value = "60")]
    sweep_interval: u64,

    /// Account link storage file (default: platform data dir)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Serve static files from this directory instead of the built-in pages
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Debug mode: enables /browse and debug logging
    /// Also enabled by DEBUG=devlink or DEBUG=*
    #[arg(short, long)]
    debug: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let debug_mode = args.debug
        || std::env::var("DEBUG")
            .map(|v| v == DEBUG_ID || v == "*")
            .unwrap_or(false);

    // Initialize logging
    let log_level = if args.verbose || debug_mode {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("devlink v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::new()
        .with_port(args.port)
        .with_code_ttl(args.code_ttl)
        .with_code_range(args.code_min..=args.code_max)
        .with_sweep_interval(args.sweep_interval)
        .with_data_file(args.data_file)
        .with_public_dir(args.public_dir)
        .with_debug(debug_mode);
    config.validate()?;

    // Initialize registries and linking manager
    info!("Initializing link storage...");
    let links = match &config.data_file {
        Some(path) => LinkRegistry::with_path(path.clone()).await,
        None => LinkRegistry::new().await,
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize link storage: {}", e))?;
    info!(
        "Link storage: {:?} ({} linked devices)",
        links.path(),
        links.link_count().await
    );
    let links = Arc::new(links);
    let codes = Arc::new(CodeRegistry::new(config.code_ttl_secs));
    let generator = CodeGenerator::new(config.code_range.clone());
    let linking = Arc::new(LinkingManager::new(generator, codes.clone(), links));

    info!(
        "Codes expire after {} seconds (sweep every {}s)",
        linking.code_ttl_secs(),
        config.sweep_interval_secs
    );

    // Spawn task evicting expired codes
    let sweep_every = Duration::from_secs(config.sweep_interval_secs);
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let removed = codes.purge_expired().await;
            if removed > 0 {
                debug!("Evicted {} expired codes", removed);
            }
        }
    });

    if config.debug {
        info!("Debug mode on: registry listing available at /browse");
    }

    let state = Arc::new(AppState::new(config.clone(), linking));
    let router = create_router(state);

    // Start HTTP server
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on port {}", config.port);
    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    sweeper.abort();

    info!("Goodbye!");
    Ok(())
}
