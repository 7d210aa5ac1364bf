//! Static catalog entries: the maps players vote on and the vehicles they
//! pick from. Read-only for the lifetime of a session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How demanding a track is. Purely informational for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "Easy"),
            Self::Medium => write!(f, "Medium"),
            Self::Hard => write!(f, "Hard"),
        }
    }
}

/// One votable map.
///
/// `scene_id` is what the scene-transport collaborator loads once the
/// countdown expires; everything else is shown in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scene_id: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_laps")]
    pub laps: u32,
    /// Race time limit in seconds.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u32,
    #[serde(default = "default_true")]
    pub checkpoints: bool,
}

fn default_laps() -> u32 {
    3
}

fn default_time_limit_secs() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

impl MapOption {
    /// A map with default difficulty, lap count and time limit.
    pub fn new(name: impl Into<String>, scene_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            scene_id: scene_id.into(),
            difficulty: Difficulty::default(),
            laps: default_laps(),
            time_limit_secs: default_time_limit_secs(),
            checkpoints: true,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_laps(mut self, laps: u32) -> Self {
        self.laps = laps;
        self
    }
}

/// One selectable vehicle. `asset_id` is opaque to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleOption {
    pub name: String,
    #[serde(default)]
    pub asset_id: String,
}

impl VehicleOption {
    pub fn new(name: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_id: asset_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_option_defaults_fill_missing_fields() {
        let map: MapOption =
            serde_json::from_str(r#"{"name":"Harbor","scene_id":"harbor_loop"}"#).unwrap();
        assert_eq!(map.difficulty, Difficulty::Medium);
        assert_eq!(map.laps, 3);
        assert_eq!(map.time_limit_secs, 600);
        assert!(map.checkpoints);
        assert!(map.description.is_empty());
    }

    #[test]
    fn test_difficulty_serializes_pascal_case() {
        let json = serde_json::to_string(&Difficulty::Hard).unwrap();
        assert_eq!(json, "\"Hard\"");
        assert_eq!(Difficulty::Easy.to_string(), "Easy");
    }

    #[test]
    fn test_map_option_builders() {
        let map = MapOption::new("Canyon", "canyon_run")
            .with_difficulty(Difficulty::Hard)
            .with_laps(5);
        assert_eq!(map.laps, 5);
        assert_eq!(map.difficulty, Difficulty::Hard);
        assert_eq!(map.scene_id, "canyon_run");
    }
}
