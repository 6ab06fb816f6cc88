//! Game data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::config::GameConfig;

/// A collectible as it appears in the player's collection.
///
/// Catalog fields this client does not know about are kept in `extra` and
/// written back unchanged. Missing known fields decode as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NftRef {
    pub fn new(name: impl Into<String>, img: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            img: img.into(),
            tier: tier.into(),
            price: None,
            extra: Map::new(),
        }
    }

    pub fn with_price(mut self, price: u64) -> Self {
        self.price = Some(price);
        self
    }
}

/// Outcome of one finished battle.
///
/// History is append-only, so records written by other clients decode even
/// when known fields are missing; unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRecord {
    #[serde(default)]
    pub opponent: String,
    #[serde(default)]
    pub won: bool,
    #[serde(default)]
    pub stars_delta: i64,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BattleRecord {
    /// Record a battle that just ended.
    pub fn new(opponent: impl Into<String>, won: bool, stars_delta: i64) -> Self {
        Self {
            opponent: opponent.into(),
            won,
            stars_delta,
            timestamp: Utc::now(),
            extra: Map::new(),
        }
    }
}

/// Player profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub avatar: String,
    pub level: u32,
    pub join_date: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Fresh profile for a player joining now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: "👤".to_string(),
            level: 1,
            join_date: Utc::now(),
            extra: Map::new(),
        }
    }
}

/// Partial profile update. Only the fields that are set are changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl ProfileUpdate {
    /// Check if the update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar.is_none() && self.level.is_none()
    }

    /// Merge into `profile`.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(level) = self.level {
            profile.level = level;
        }
    }
}

/// Complete game state. This is also the backup format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub stars: u64,
    pub collection: Vec<NftRef>,
    pub active_battle_nft: Option<NftRef>,
    pub total_stars_earned: u64,
    pub battle_history: Vec<BattleRecord>,
    pub user_profile: UserProfile,
}

impl GameData {
    /// State of a brand new player.
    pub fn new(config: &GameConfig) -> Self {
        Self {
            stars: config.initial_stars,
            collection: Vec::new(),
            active_battle_nft: None,
            total_stars_earned: 0,
            battle_history: Vec::new(),
            user_profile: UserProfile::new(config.player_name.clone()),
        }
    }
}

/// A debit larger than the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientBalance {
    pub requested: u64,
    pub available: u64,
}

impl fmt::Display for InsufficientBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient stars: requested {}, available {}",
            self.requested, self.available
        )
    }
}

/// Result of a debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Stars were spent; `remaining` is the new balance.
    Applied { remaining: u64 },
    /// Nothing was spent.
    Declined(InsufficientBalance),
}

impl DebitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DebitOutcome::Applied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_nft_fields_preserved() {
        let raw = json!({
            "name": "Siber",
            "img": "siber.png",
            "tier": "rare",
            "price": 250,
            "power": 17,
            "element": "ice"
        });
        let nft: NftRef = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(nft.price, Some(250));
        assert_eq!(nft.extra["power"], 17);

        assert_eq!(serde_json::to_value(&nft).unwrap(), raw);
    }

    #[test]
    fn test_partial_battle_record_keeps_extra_fields() {
        let raw = json!({"opponent": "bot", "arena": "ice"});
        let record: BattleRecord = serde_json::from_value(raw).unwrap();

        assert_eq!(record.opponent, "bot");
        assert!(!record.won);
        assert_eq!(record.timestamp, DateTime::<Utc>::default());
        assert_eq!(serde_json::to_value(&record).unwrap()["arena"], "ice");
    }

    #[test]
    fn test_battle_record_camel_case() {
        let record = BattleRecord::new("bot", true, 15);
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["starsDelta"], 15);
        assert_eq!(encoded["won"], true);
    }

    #[test]
    fn test_profile_update_merges() {
        let mut profile = UserProfile::new("Player");
        let update = ProfileUpdate {
            name: Some("Nova".to_string()),
            level: Some(4),
            ..ProfileUpdate::default()
        };
        update.apply_to(&mut profile);

        assert_eq!(profile.name, "Nova");
        assert_eq!(profile.level, 4);
        assert_eq!(profile.avatar, "👤");
    }

    #[test]
    fn test_new_player_state() {
        let data = GameData::new(&GameConfig::default());
        assert_eq!(data.stars, 100);
        assert_eq!(data.total_stars_earned, 0);
        assert!(data.collection.is_empty());
        assert!(data.active_battle_nft.is_none());

        let encoded = serde_json::to_value(&data).unwrap();
        assert!(encoded.get("activeBattleNft").is_some());
        assert!(encoded.get("userProfile").is_some());
    }
}
