//! Settings types. Every struct deserializes with defaults so a settings
//! file only needs the keys it wants to change.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use dew_core::{DecodeErrorPolicy, RosterPolicy};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Listener path segment reserved for the health check.
pub const HEALTH_PATH: &str = "health";

/// Root settings document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    pub listen: ListenSettings,
    /// Bridged servers keyed by display name.
    pub servers: BTreeMap<String, ServerConfig>,
    pub session: SessionSettings,
    pub hub: HubSettings,
    pub reconnect: ReconnectSettings,
    pub logging: LoggingSettings,
}

impl BridgeSettings {
    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(SettingsError::InvalidValue("no servers configured".into()));
        }
        for (name, server) in &self.servers {
            if name.trim().is_empty() {
                return Err(SettingsError::InvalidValue("server name must not be empty".into()));
            }
            if server.address.trim().is_empty() {
                return Err(SettingsError::InvalidValue(format!("server {name}: address is empty")));
            }
            if server.stats_port == 0 || server.rcon_port == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "server {name}: statsPort and rconPort must be non-zero"
                )));
            }
        }
        if self.session.poll_interval_ms < 100 {
            return Err(SettingsError::InvalidValue(format!(
                "session.pollIntervalMs must be at least 100, got {}",
                self.session.poll_interval_ms
            )));
        }
        if self.hub.queue_capacity == 0 || self.hub.subscriber_queue == 0 {
            return Err(SettingsError::InvalidValue("hub queue sizes must be non-zero".into()));
        }
        if self.reconnect.base_delay_ms == 0 || self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(SettingsError::InvalidValue(
                "reconnect.maxDelayMs must be >= reconnect.baseDelayMs > 0".into(),
            ));
        }
        if matches!(&self.listen.shared_secret, Some(s) if s.is_empty() || s.contains('/')) {
            return Err(SettingsError::InvalidValue(
                "listen.sharedSecret must be non-empty and contain no '/'".into(),
            ));
        }
        if self.listen.shared_secret.as_deref() == Some(HEALTH_PATH) {
            return Err(SettingsError::InvalidValue(format!(
                "listen.sharedSecret must not be {HEALTH_PATH:?}, that path is the health check"
            )));
        }
        Ok(())
    }
}

/// Where subscribers connect.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListenSettings {
    pub address: String,
    pub port: u16,
    /// When set, subscribers must connect to `/<sharedSecret>`.
    pub shared_secret: Option<String>,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 5000,
            shared_secret: None,
        }
    }
}

impl fmt::Debug for ListenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenSettings")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One game server to bridge.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub address: String,
    pub stats_port: u16,
    pub rcon_port: u16,
    pub rcon_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            stats_port: 11775,
            rcon_port: 11776,
            rcon_password: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn rcon_url(&self) -> String {
        format!("ws://{}:{}", self.address, self.rcon_port)
    }

    pub fn stats_url(&self) -> String {
        format!("http://{}:{}/", self.address, self.stats_port)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("stats_port", &self.stats_port)
            .field("rcon_port", &self.rcon_port)
            .field("rcon_password", &"<redacted>")
            .finish()
    }
}

/// Per-session behaviour, shared by all servers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub poll_interval_ms: u64,
    pub handshake_timeout_ms: u64,
    pub announce_initial_roster: bool,
    pub on_decode_error: DecodeErrorPolicy,
    pub publish_raw_lines: bool,
    pub publish_stats: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            handshake_timeout_ms: 45_000,
            announce_initial_roster: true,
            on_decode_error: DecodeErrorPolicy::KeepPrevious,
            publish_raw_lines: false,
            publish_stats: false,
        }
    }
}

impl SessionSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn roster_policy(&self) -> RosterPolicy {
        RosterPolicy {
            announce_initial_roster: self.announce_initial_roster,
            on_decode_error: self.on_decode_error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Pending hub commands before new broadcasts are dropped.
    pub queue_capacity: usize,
    /// Pending messages per subscriber before it is considered too slow.
    pub subscriber_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            subscriber_queue: 256,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter_factor: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive. `RUST_LOG` wins when set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_server() -> BridgeSettings {
        let mut settings = BridgeSettings::default();
        let _ = settings.servers.insert("main".into(), ServerConfig::default());
        settings
    }

    #[test]
    fn defaults_match_legacy_flags() {
        let server = ServerConfig::default();
        assert_eq!(server.address, "127.0.0.1");
        assert_eq!(server.stats_port, 11775);
        assert_eq!(server.rcon_port, 11776);
        assert_eq!(BridgeSettings::default().listen.port, 5000);
        assert_eq!(SessionSettings::default().poll_interval(), Duration::from_secs(5));
        assert_eq!(SessionSettings::default().handshake_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn urls_are_built_from_ports() {
        let server = ServerConfig {
            address: "10.1.2.3".into(),
            stats_port: 1,
            rcon_port: 2,
            rcon_password: "pw".into(),
        };
        assert_eq!(server.rcon_url(), "ws://10.1.2.3:2");
        assert_eq!(server.stats_url(), "http://10.1.2.3:1/");
    }

    #[test]
    fn debug_redacts_secrets() {
        let server = ServerConfig {
            rcon_password: "hunter2".into(),
            ..Default::default()
        };
        assert!(!format!("{server:?}").contains("hunter2"));

        let listen = ListenSettings {
            shared_secret: Some("s3cret".into()),
            ..Default::default()
        };
        assert!(!format!("{listen:?}").contains("s3cret"));
    }

    #[test]
    fn validate_requires_a_server() {
        let err = BridgeSettings::default().validate().unwrap_err();
        assert!(err.to_string().contains("no servers"));
        assert!(one_server().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_ports() {
        let mut settings = one_server();
        settings.servers.get_mut("main").unwrap().rcon_port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_tiny_poll_interval() {
        let mut settings = one_server();
        settings.session.poll_interval_ms = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_secret_with_slash() {
        let mut settings = one_server();
        settings.listen.shared_secret = Some("a/b".into());
        assert!(settings.validate().is_err());
        settings.listen.shared_secret = Some("token".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_secret_shadowed_by_health_route() {
        let mut settings = one_server();
        settings.listen.shared_secret = Some("health".into());
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("health check"), "got: {err}");
        settings.listen.shared_secret = Some("healthy".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn roster_policy_follows_session_settings() {
        let session = SessionSettings {
            announce_initial_roster: false,
            on_decode_error: DecodeErrorPolicy::Reset,
            ..Default::default()
        };
        let policy = session.roster_policy();
        assert!(!policy.announce_initial_roster);
        assert_eq!(policy.on_decode_error, DecodeErrorPolicy::Reset);
    }
}
