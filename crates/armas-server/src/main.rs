//! Armas access-control server — entry point.
//!
//! Serves the HTTP API that lists devices on the local network, blocks and
//! unblocks their forwarded traffic through `iptables`, and schedules timed
//! blocks.
//!
//! # Usage
//!
//! ```text
//! armas-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Config file [default: ~/.config/armas/config.toml]
//!   --bind <ADDR>       Override server.bind_address
//!   --port <PORT>       Override server.port
//!   --api-key <KEY>     Override server.api_key
//!   --dry-run           Keep deny rules in memory instead of calling iptables
//!   --init-config       Write the effective configuration to --config and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable         | Flag        |
//! |------------------|-------------|
//! | `ARMAS_CONFIG`   | `--config`  |
//! | `ARMAS_BIND`     | `--bind`    |
//! | `ARMAS_PORT`     | `--port`    |
//! | `ARMAS_API_KEY`  | `--api-key` |
//! | `RUST_LOG`       | overrides `server.log_level` |
//!
//! CLI arguments win over environment variables, which win over the file.
//!
//! # Privileges
//!
//! Both `iptables` and `arp-scan` need root.  With `filter.use_sudo = true`
//! (the default) they are run through `sudo`, which needs a passwordless
//! sudoers entry for the service user.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use armas_server::application::access_control::AccessController;
use armas_server::application::device_inventory::DeviceInventory;
use armas_server::application::policy_store::{AccessPolicyStore, PacketFilter};
use armas_server::infrastructure::discovery::{ArpScanSource, JsonDeviceNameStore};
use armas_server::infrastructure::http::{router, ApiState};
use armas_server::infrastructure::packet_filter::{InMemoryFilter, IptablesFilter};
use armas_server::infrastructure::storage::config::{
    config_file_path, load_config, save_config, AppConfig, DEFAULT_API_KEY,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Armas network access-control server.
#[derive(Debug, Parser)]
#[command(
    name = "armas-server",
    about = "Per-device internet blocking with timed blocks, over an HTTP API",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ARMAS_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the HTTP server to.
    #[arg(long, env = "ARMAS_BIND")]
    bind: Option<String>,

    /// TCP port for the HTTP server.
    #[arg(long, env = "ARMAS_PORT")]
    port: Option<u16>,

    /// Shared secret clients must send in the `X-API-Key` header.
    #[arg(long, env = "ARMAS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Keep deny rules in memory instead of calling iptables.
    #[arg(long)]
    dry_run: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    /// Resolves the config path, loads the file, and applies CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if no config path can be determined or the file
    /// exists but cannot be read or parsed.
    fn load(&self) -> anyhow::Result<(PathBuf, AppConfig)> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config_file_path().context("no --config given and no config directory")?,
        };
        let config = load_config(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok((path, self.apply_overrides(config)))
    }

    fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(bind) = &self.bind {
            config.server.bind_address.clone_from(bind);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(key) = &self.api_key {
            config.server.api_key.clone_from(key);
        }
        config
    }
}

/// The socket address the HTTP server listens on.
///
/// # Errors
///
/// Returns an error if `bind_address` is not an IP address.
fn listen_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    let raw = format!("{}:{}", config.server.bind_address, config.server.port);
    raw.parse()
        .with_context(|| format!("invalid bind address: '{raw}'"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config_path, config) = cli.load()?;

    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    if cli.init_config {
        save_config(&config_path, &config)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        info!("wrote configuration to {}", config_path.display());
        return Ok(());
    }

    let addr = listen_addr(&config)?;
    if config.server.api_key == DEFAULT_API_KEY {
        warn!("server.api_key is still the default; set a secret before exposing the API");
    }

    // ── Wiring ────────────────────────────────────────────────────────────────
    let filter: Arc<dyn PacketFilter> = if cli.dry_run {
        warn!("dry run: deny rules are kept in memory, no traffic is actually blocked");
        Arc::new(InMemoryFilter::new())
    } else {
        Arc::new(IptablesFilter::from_config(&config.filter))
    };
    let store = AccessPolicyStore::new(filter)
        .with_max_unblock_attempts(config.filter.max_unblock_attempts);
    let controller = Arc::new(AccessController::new(store));

    let inventory = Arc::new(DeviceInventory::new(
        Arc::new(ArpScanSource::new(&config.network, config.filter.use_sudo)),
        Arc::new(JsonDeviceNameStore::new(&config.network.devices_file)),
    ));

    let state = ApiState::new(
        Arc::clone(&controller),
        inventory,
        config.server.api_key.as_str(),
    );
    let app = router(state, &config.server.cors_origins);

    // ── Serve ─────────────────────────────────────────────────────────────────
    info!("Armas access-control API starting on {addr}");
    info!("network range: {}", config.network.range);
    info!("interface: {}", config.network.interface);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Timers are not persisted; anything still pending is dropped here.
    controller.shutdown();
    info!("Armas access-control API stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => {
            error!("failed to listen for Ctrl+C signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
