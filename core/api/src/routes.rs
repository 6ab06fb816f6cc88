//! Request builders for the game backend's endpoints.

use chrono::Utc;
use serde_json::{json, Value};

use crate::request::ApiRequest;

/// Endpoint catalogue bound to one player.
#[derive(Debug, Clone)]
pub struct Routes {
    user_id: String,
}

impl Routes {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn user_profile(&self) -> ApiRequest {
        ApiRequest::get(format!("users/{}", self.user_id))
    }

    pub fn update_user_profile(&self, profile: Value) -> ApiRequest {
        ApiRequest::put(format!("users/{}", self.user_id), profile)
    }

    pub fn user_stats(&self) -> ApiRequest {
        ApiRequest::get(format!("users/{}/stats", self.user_id))
    }

    pub fn find_opponent(&self, nft: Value) -> ApiRequest {
        ApiRequest::post("battle/find", json!({ "userId": self.user_id, "nft": nft }))
    }

    /// Submit a finished battle. Fields of `battle` are merged next to the
    /// player id; a non-object `battle` is sent under `"result"`.
    pub fn submit_battle_result(&self, battle: Value) -> ApiRequest {
        let payload = match battle {
            Value::Object(mut fields) => {
                fields.insert("userId".to_string(), Value::String(self.user_id.clone()));
                Value::Object(fields)
            }
            other => json!({ "userId": self.user_id, "result": other }),
        };
        ApiRequest::post("battle/result", payload)
    }

    pub fn battle_history(&self, limit: u32) -> ApiRequest {
        ApiRequest::get(format!("users/{}/battles?limit={}", self.user_id, limit))
    }

    pub fn user_collection(&self) -> ApiRequest {
        ApiRequest::get(format!("users/{}/collection", self.user_id))
    }

    pub fn buy_nft(&self, nft_id: &str, price: u64) -> ApiRequest {
        ApiRequest::post(
            "nft/buy",
            json!({ "userId": self.user_id, "nftId": nft_id, "price": price }),
        )
    }

    pub fn sell_nft(&self, nft_id: &str, price: u64) -> ApiRequest {
        ApiRequest::post(
            "nft/sell",
            json!({ "userId": self.user_id, "nftId": nft_id, "price": price }),
        )
    }

    pub fn shop_items(&self) -> ApiRequest {
        ApiRequest::get("shop/items")
    }

    pub fn purchase_stars(&self, amount: u64, payment_data: Value) -> ApiRequest {
        ApiRequest::post(
            "shop/stars",
            json!({ "userId": self.user_id, "amount": amount, "paymentData": payment_data }),
        )
    }

    pub fn leaderboard(&self, kind: &str, limit: u32) -> ApiRequest {
        ApiRequest::get(format!("leaderboard/{}?limit={}", kind, limit))
    }

    pub fn friends(&self) -> ApiRequest {
        ApiRequest::get(format!("users/{}/friends", self.user_id))
    }

    pub fn invite_friend(&self, friend_data: Value) -> ApiRequest {
        ApiRequest::post(
            "social/invite",
            json!({ "userId": self.user_id, "friendData": friend_data }),
        )
    }

    /// Push a full game-data snapshot to the backend.
    pub fn sync_game_data(&self, data: Value) -> ApiRequest {
        ApiRequest::post(
            "sync",
            json!({
                "userId": self.user_id,
                "data": data,
                "timestamp": Utc::now().timestamp_millis(),
            }),
        )
    }
}
