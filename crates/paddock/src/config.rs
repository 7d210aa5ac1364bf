//! Server configuration, loaded from `paddock.toml`.
//!
//! ```toml
//! listen_addr = "0.0.0.0:9000"
//! idle_timeout_secs = 30
//!
//! [lobby]
//! min_players = 2
//! max_players = 6
//! slot_count = 8
//! countdown_secs = 10
//!
//! [[lobby.maps]]
//! name = "Harbor Loop"
//! scene_id = "harbor_loop"
//! difficulty = "Easy"
//!
//! [[lobby.vehicles]]
//! name = "Roadster"
//! asset_id = "vehicles/roadster"
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::path::Path;
use std::time::Duration;

use paddock_lobby::{ConfigError, LobbyConfig};
use paddock_protocol::{MapOption, VehicleOption};
use paddock_tick::TickPolicy;
use serde::Deserialize;

use crate::PaddockError;

/// Environment variable that overrides [`ServerConfig::listen_addr`].
pub const LISTEN_ADDR_ENV: &str = "PADDOCK_LISTEN_ADDR";

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// How long a new connection may take to send `Hello`.
    pub handshake_timeout_secs: u64,
    /// Connections silent for longer than this are dropped.
    pub idle_timeout_secs: u64,
    pub lobby: LobbySection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout_secs: 5,
            idle_timeout_secs: 15,
            lobby: LobbySection::default(),
        }
    }
}

/// The `[lobby]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LobbySection {
    pub min_players: usize,
    pub max_players: usize,
    pub slot_count: usize,
    pub countdown_secs: u64,
    pub tick_interval_ms: u64,
    pub tick_policy: TickPolicySetting,
    pub collaborator_timeout_secs: u64,
    pub maps: Vec<MapOption>,
    pub vehicles: Vec<VehicleOption>,
}

impl Default for LobbySection {
    fn default() -> Self {
        let defaults = LobbyConfig::default();
        Self {
            min_players: defaults.min_players,
            max_players: defaults.max_players,
            slot_count: defaults.slot_count,
            countdown_secs: defaults.countdown_duration.as_secs(),
            tick_interval_ms: defaults.tick_interval.as_millis() as u64,
            tick_policy: defaults.tick_policy.into(),
            collaborator_timeout_secs: defaults.collaborator_timeout.as_secs(),
            maps: defaults.maps,
            vehicles: defaults.vehicles,
        }
    }
}

/// TOML spelling of [`TickPolicy`]: `"skip"` or `"drop"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickPolicySetting {
    #[default]
    Skip,
    Drop,
}

impl From<TickPolicySetting> for TickPolicy {
    fn from(setting: TickPolicySetting) -> Self {
        match setting {
            TickPolicySetting::Skip => TickPolicy::Skip,
            TickPolicySetting::Drop => TickPolicy::Drop,
        }
    }
}

impl From<TickPolicy> for TickPolicySetting {
    fn from(policy: TickPolicy) -> Self {
        match policy {
            TickPolicy::Skip => TickPolicySetting::Skip,
            TickPolicy::Drop => TickPolicySetting::Drop,
        }
    }
}

impl ServerConfig {
    /// Reads `path`, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PaddockError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PaddockError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PaddockError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `PADDOCK_LISTEN_ADDR` if it is set and non-blank.
    pub fn apply_env_overrides(&mut self) {
        self.override_listen_addr(std::env::var(LISTEN_ADDR_ENV).ok());
    }

    fn override_listen_addr(&mut self, value: Option<String>) {
        if let Some(addr) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::info!(%addr, "listen address overridden by {LISTEN_ADDR_ENV}");
            self.listen_addr = addr;
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Builds the lobby configuration and validates it.
    pub fn lobby_config(&self) -> Result<LobbyConfig, ConfigError> {
        let lobby = &self.lobby;
        let config = LobbyConfig {
            min_players: lobby.min_players,
            max_players: lobby.max_players,
            slot_count: lobby.slot_count,
            countdown_duration: Duration::from_secs(lobby.countdown_secs),
            tick_interval: Duration::from_millis(lobby.tick_interval_ms),
            tick_policy: lobby.tick_policy.into(),
            collaborator_timeout: Duration::from_secs(lobby.collaborator_timeout_secs),
            vehicles: lobby.vehicles.clone(),
            maps: lobby.maps.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}
