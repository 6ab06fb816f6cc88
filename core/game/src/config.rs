//! Game defaults.

use serde::{Deserialize, Serialize};

/// Defaults applied to a new player and to unreadable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Stars granted to a new player.
    pub initial_stars: u64,
    /// Profile name of a new player.
    pub player_name: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_stars: 100,
            player_name: "Player".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: GameConfig = serde_json::from_str(r#"{"initial_stars": 500}"#).unwrap();
        assert_eq!(config.initial_stars, 500);
        assert_eq!(config.player_name, "Player");
    }
}
