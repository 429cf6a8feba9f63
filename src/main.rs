use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dew_server::BridgeOrchestrator;
use dew_settings::{apply_env_overrides, load_settings_file, resolve_logging, settings_path, BridgeSettings};
use dew_telemetry::{init_tracing, TelemetryConfig};

/// Server name used by the single-server shortcut flags.
const DEFAULT_SERVER: &str = "main";

/// Bridge ElDewrito game server chat and joins to WebSocket subscribers.
#[derive(Debug, Parser)]
#[command(name = "dewbridge", version)]
struct Cli {
    /// Settings file (defaults to ~/.dewbridge/settings.json).
    #[arg(long, env = "DEW_CONFIG")]
    config: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Game server address.
    #[arg(long)]
    server_address: Option<String>,

    /// Game server stats (HTTP) port.
    #[arg(long)]
    stats_port: Option<u16>,

    /// Game server RCON (WebSocket) port.
    #[arg(long)]
    rcon_port: Option<u16>,

    /// RCON password.
    #[arg(long, env = "DEW_RCON_PASSWORD", hide_env_values = true)]
    rcon_password: Option<String>,

    /// Port subscribers connect to.
    #[arg(long)]
    listen_port: Option<u16>,
}

impl Cli {
    /// Flags that describe where the default server is. The password alone
    /// does not, so it never conjures a server on its own.
    fn has_server_location(&self) -> bool {
        self.server_address.is_some() || self.stats_port.is_some() || self.rcon_port.is_some()
    }

    /// Layer command line flags over loaded settings. With no servers
    /// configured anywhere, a single default server is bridged.
    fn apply(&self, settings: &mut BridgeSettings) {
        if self.has_server_location() || settings.servers.is_empty() {
            let _ = settings.servers.entry(DEFAULT_SERVER.to_owned()).or_default();
        }
        match settings.servers.get_mut(DEFAULT_SERVER) {
            Some(server) => {
                if let Some(address) = &self.server_address {
                    server.address = address.clone();
                }
                if let Some(port) = self.stats_port {
                    server.stats_port = port;
                }
                if let Some(port) = self.rcon_port {
                    server.rcon_port = port;
                }
                if let Some(password) = &self.rcon_password {
                    server.rcon_password = password.clone();
                }
            }
            None if self.rcon_password.is_some() => {
                tracing::warn!(server = DEFAULT_SERVER, "rcon password given but no such server is configured, ignoring");
            }
            None => {}
        }
        if let Some(port) = self.listen_port {
            settings.listen.port = port;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_file(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;

    // Tracing goes up first so the override pass below can report bad values.
    let logging = resolve_logging(&settings.logging);
    init_tracing(&TelemetryConfig {
        log_level: logging.level,
        json: logging.json || cli.json_logs,
    });

    apply_env_overrides(&mut settings);
    cli.apply(&mut settings);
    tracing::info!(path = %path.display(), servers = settings.servers.len(), "starting dewbridge");

    let bridge = BridgeOrchestrator::new(settings)
        .context("invalid settings")?
        .start()
        .await
        .context("failed to start bridge")?;

    tracing::info!(addr = %bridge.local_addr, "dewbridge ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    bridge.shutdown().await;
    Ok(())
}
