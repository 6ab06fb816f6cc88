//! Per-field text encoding of the game state.
//!
//! Every field is stored under its own key. Counts are stored as decimal
//! text, everything else as JSON. Decoding never fails: absent or
//! unreadable text yields the field's default.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use starsync_common::{Error, Result, StoreKey};

use crate::config::GameConfig;
use crate::model::{GameData, UserProfile};

/// A persisted field of [`GameData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameField {
    Stars,
    Collection,
    ActiveBattleNft,
    TotalStarsEarned,
    BattleHistory,
    UserProfile,
}

impl GameField {
    /// Every field, in load order.
    pub const ALL: [GameField; 6] = [
        GameField::Stars,
        GameField::Collection,
        GameField::ActiveBattleNft,
        GameField::TotalStarsEarned,
        GameField::BattleHistory,
        GameField::UserProfile,
    ];

    /// Store key of the field.
    pub fn key(self) -> &'static str {
        match self {
            GameField::Stars => "stars",
            GameField::Collection => "collection",
            GameField::ActiveBattleNft => "activeBattleNft",
            GameField::TotalStarsEarned => "totalStarsEarned",
            GameField::BattleHistory => "battleHistory",
            GameField::UserProfile => "userProfile",
        }
    }

    pub fn store_key(self) -> Result<StoreKey> {
        StoreKey::new(self.key())
    }
}

impl fmt::Display for GameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Encode one field of `data`.
pub fn encode_field(data: &GameData, field: GameField) -> Result<String> {
    match field {
        GameField::Stars => Ok(data.stars.to_string()),
        GameField::TotalStarsEarned => Ok(data.total_stars_earned.to_string()),
        GameField::Collection => encode_json(&data.collection),
        GameField::ActiveBattleNft => encode_json(&data.active_battle_nft),
        GameField::BattleHistory => encode_json(&data.battle_history),
        GameField::UserProfile => encode_json(&data.user_profile),
    }
}

/// Decode `raw` into one field of `data`.
pub fn decode_field(data: &mut GameData, field: GameField, raw: Option<&str>, config: &GameConfig) {
    match field {
        GameField::Stars => data.stars = decode_count(field, raw, config.initial_stars),
        GameField::TotalStarsEarned => data.total_stars_earned = decode_count(field, raw, 0),
        GameField::Collection => data.collection = decode_list(field, raw),
        GameField::ActiveBattleNft => data.active_battle_nft = decode_json(field, raw, || None),
        GameField::BattleHistory => data.battle_history = decode_list(field, raw),
        GameField::UserProfile => {
            data.user_profile =
                decode_json(field, raw, || UserProfile::new(config.player_name.clone()))
        }
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn decode_count(field: GameField, raw: Option<&str>, default: u64) -> u64 {
    let Some(raw) = raw else {
        debug!(field = %field, "No stored value, using default");
        return default;
    };

    match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(e) => {
            warn!(field = %field, "Unreadable stored value {:?}, using default: {}", raw, e);
            default
        }
    }
}

fn decode_json<T: DeserializeOwned>(
    field: GameField,
    raw: Option<&str>,
    default: impl FnOnce() -> T,
) -> T {
    let Some(raw) = raw else {
        debug!(field = %field, "No stored value, using default");
        return default();
    };

    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(field = %field, "Unreadable stored value, using default: {}", e);
            default()
        }
    }
}

/// Decode a JSON array item by item.
///
/// Items that are not records are skipped with a warning instead of
/// discarding the whole list.
fn decode_list<T: DeserializeOwned>(field: GameField, raw: Option<&str>) -> Vec<T> {
    let items: Vec<Value> = decode_json(field, raw, Vec::new);
    let total = items.len();

    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(field = %field, index, "Skipping unreadable item: {}", e);
                None
            }
        })
        .collect();

    if decoded.len() < total {
        warn!(field = %field, "Kept {} of {} stored items", decoded.len(), total);
    }
    decoded
}
