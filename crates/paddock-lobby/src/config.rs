//! Lobby configuration and its startup validation.

use std::time::Duration;

use paddock_protocol::{Difficulty, MapOption, VehicleOption};
use paddock_tick::{TickConfig, TickPolicy};

use crate::ConfigError;

/// Configuration for one lobby.
///
/// Validated once when the lobby is spawned; see [`LobbyConfig::validate`].
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Fewest participants a race may start with.
    pub min_players: usize,
    /// Most participants admitted at once.
    pub max_players: usize,
    /// Grid positions available. Must be at least `max_players`.
    pub slot_count: usize,
    /// Countdown length, restored in full on every start.
    pub countdown_duration: Duration,
    /// Amount taken off the countdown per tick.
    pub tick_interval: Duration,
    pub tick_policy: TickPolicy,
    /// How long a pending lobby waits for its collaborators.
    pub collaborator_timeout: Duration,
    pub vehicles: Vec<VehicleOption>,
    pub maps: Vec<MapOption>,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 4,
            slot_count: 4,
            countdown_duration: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            tick_policy: TickPolicy::Skip,
            collaborator_timeout: Duration::from_secs(10),
            vehicles: default_vehicles(),
            maps: default_maps(),
        }
    }
}

impl LobbyConfig {
    /// Checks every constraint a session relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maps.is_empty() {
            return Err(ConfigError::EmptyMapCatalog);
        }
        if self.vehicles.is_empty() {
            return Err(ConfigError::EmptyVehicleCatalog);
        }
        if self.slot_count == 0 {
            return Err(ConfigError::ZeroSlots);
        }
        if self.min_players == 0 {
            return Err(ConfigError::ZeroMinPlayers);
        }
        if self.min_players > self.max_players {
            return Err(ConfigError::MinAboveMax {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if self.max_players > self.slot_count {
            return Err(ConfigError::MaxAboveSlots {
                max: self.max_players,
                slots: self.slot_count,
            });
        }
        if self.countdown_duration.is_zero() {
            return Err(ConfigError::ZeroCountdown);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if let Some(index) = self
            .maps
            .iter()
            .position(|m| m.scene_id.trim().is_empty())
        {
            return Err(ConfigError::EmptySceneId { index });
        }
        Ok(())
    }

    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            interval: self.tick_interval,
            policy: self.tick_policy,
        }
    }
}

fn default_vehicles() -> Vec<VehicleOption> {
    vec![
        VehicleOption::new("Roadster", "vehicles/roadster"),
        VehicleOption::new("Rally", "vehicles/rally"),
        VehicleOption::new("Buggy", "vehicles/buggy"),
        VehicleOption::new("Muscle", "vehicles/muscle"),
    ]
}

fn default_maps() -> Vec<MapOption> {
    vec![
        MapOption::new("Harbor Loop", "harbor_loop").with_difficulty(Difficulty::Easy),
        MapOption::new("Canyon Run", "canyon_run"),
        MapOption::new("Summit Pass", "summit_pass")
            .with_difficulty(Difficulty::Hard)
            .with_laps(2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LobbyConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.countdown_duration, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_catalogs_are_rejected() {
        let config = LobbyConfig {
            maps: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyMapCatalog));

        let config = LobbyConfig {
            vehicles: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyVehicleCatalog));
    }

    #[test]
    fn test_capacity_bounds_are_checked() {
        let zero = LobbyConfig {
            slot_count: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroSlots));

        let inverted = LobbyConfig {
            min_players: 3,
            max_players: 2,
            ..Default::default()
        };
        assert_eq!(
            inverted.validate(),
            Err(ConfigError::MinAboveMax { min: 3, max: 2 })
        );

        let oversized = LobbyConfig {
            max_players: 6,
            ..Default::default()
        };
        assert_eq!(
            oversized.validate(),
            Err(ConfigError::MaxAboveSlots { max: 6, slots: 4 })
        );
    }

    #[test]
    fn test_zero_timings_are_rejected() {
        let config = LobbyConfig {
            countdown_duration: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCountdown));

        let config = LobbyConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickInterval));
    }

    #[test]
    fn test_blank_scene_id_is_rejected() {
        let mut config = LobbyConfig::default();
        config.maps.push(MapOption::new("Nowhere", "  "));
        assert_eq!(config.validate(), Err(ConfigError::EmptySceneId { index: 3 }));
    }
}
