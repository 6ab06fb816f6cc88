//! StarSync game state
//!
//! The player's stars, collection, battle history and profile, kept in
//! memory and written through the dual store field by field.

pub mod codec;
pub mod config;
pub mod manager;
pub mod model;

pub use codec::GameField;
pub use config::GameConfig;
pub use manager::GameDataManager;
pub use model::{
    BattleRecord, DebitOutcome, GameData, InsufficientBalance, NftRef, ProfileUpdate, UserProfile,
};
