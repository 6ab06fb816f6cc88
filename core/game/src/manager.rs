//! Game state aggregate backed by the dual store.

use futures::future::try_join_all;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use starsync_common::{Error, Result, StoreKey};
use starsync_sync::DualStore;

use crate::codec::{decode_field, encode_field, GameField};
use crate::config::GameConfig;
use crate::model::{
    BattleRecord, DebitOutcome, GameData, InsufficientBalance, NftRef, ProfileUpdate, UserProfile,
};

/// In-memory game state with write-through persistence.
///
/// Getters read memory only. Every mutation updates memory first and then
/// writes the affected fields through the [`DualStore`]; mutations are
/// serialized so check-and-write sequences (such as a debit) are atomic.
///
/// If a write-through fails with a local-store error the in-memory change
/// is kept and the error is returned.
pub struct GameDataManager {
    store: Arc<DualStore>,
    config: GameConfig,
    data: RwLock<GameData>,
    mutation: Mutex<()>,
}

impl GameDataManager {
    /// Create a manager holding new-player state. Call [`init`](Self::init)
    /// to load what was persisted.
    pub fn new(store: Arc<DualStore>, config: GameConfig) -> Self {
        let data = GameData::new(&config);
        Self {
            store,
            config,
            data: RwLock::new(data),
            mutation: Mutex::new(()),
        }
    }

    /// Load persisted state, persisting defaults if loading fails.
    pub async fn init(&self) -> Result<()> {
        match self.load_all().await {
            Ok(()) => {
                info!("Game data loaded successfully");
                Ok(())
            }
            Err(e) => {
                error!("Error loading game data: {}", e);
                self.save_all().await
            }
        }
    }

    /// Read every field concurrently and replace the in-memory state.
    ///
    /// Unreadable fields fall back to their defaults.
    ///
    /// # Errors
    /// - `LocalStore` if a field could not be read from the local store
    pub async fn load_all(&self) -> Result<()> {
        let _guard = self.mutation.lock().await;

        let keys = field_keys(&GameField::ALL)?;
        let values = try_join_all(keys.iter().map(|key| self.store.read(key))).await?;

        let mut data = GameData::new(&self.config);
        for (field, raw) in GameField::ALL.into_iter().zip(values) {
            decode_field(&mut data, field, raw.as_deref(), &self.config);
        }
        *self.write_data() = data;
        Ok(())
    }

    /// Write every field concurrently.
    pub async fn save_all(&self) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.persist(&GameField::ALL).await
    }

    pub fn stars(&self) -> u64 {
        self.read_data().stars
    }

    pub fn collection(&self) -> Vec<NftRef> {
        self.read_data().collection.clone()
    }

    pub fn active_battle_nft(&self) -> Option<NftRef> {
        self.read_data().active_battle_nft.clone()
    }

    pub fn total_stars_earned(&self) -> u64 {
        self.read_data().total_stars_earned
    }

    pub fn battle_history(&self) -> Vec<BattleRecord> {
        self.read_data().battle_history.clone()
    }

    pub fn user_profile(&self) -> UserProfile {
        self.read_data().user_profile.clone()
    }

    /// Copy of the whole state.
    pub fn snapshot(&self) -> GameData {
        self.read_data().clone()
    }

    /// Overwrite the balance. Does not count as earned stars.
    pub async fn set_stars(&self, amount: u64) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.write_data().stars = amount;
        self.persist(&[GameField::Stars]).await
    }

    /// Add earned stars. Returns the new balance.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero amount, or if the balance or the earned
    ///   total would overflow; nothing changes
    pub async fn credit(&self, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(Error::InvalidInput("Credit amount must be positive".to_string()));
        }

        let _guard = self.mutation.lock().await;
        let balance = {
            let mut data = self.write_data();
            let (Some(stars), Some(total)) = (
                data.stars.checked_add(amount),
                data.total_stars_earned.checked_add(amount),
            ) else {
                return Err(Error::InvalidInput(format!(
                    "Crediting {} stars would overflow",
                    amount
                )));
            };
            data.stars = stars;
            data.total_stars_earned = total;
            stars
        };

        debug!(amount, balance, "Credited stars");
        self.persist(&[GameField::Stars, GameField::TotalStarsEarned])
            .await?;
        Ok(balance)
    }

    /// Spend stars if the balance covers `amount`.
    ///
    /// A declined debit changes nothing and is not an error.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero amount
    pub async fn debit(&self, amount: u64) -> Result<DebitOutcome> {
        if amount == 0 {
            return Err(Error::InvalidInput("Debit amount must be positive".to_string()));
        }

        let _guard = self.mutation.lock().await;
        let remaining = {
            let mut data = self.write_data();
            if data.stars < amount {
                let shortfall = InsufficientBalance {
                    requested: amount,
                    available: data.stars,
                };
                debug!("Debit declined: {}", shortfall);
                return Ok(DebitOutcome::Declined(shortfall));
            }
            data.stars -= amount;
            data.stars
        };

        debug!(amount, remaining, "Debited stars");
        self.persist(&[GameField::Stars]).await?;
        Ok(DebitOutcome::Applied { remaining })
    }

    pub async fn add_to_collection(&self, nft: NftRef) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.write_data().collection.push(nft);
        self.persist(&[GameField::Collection]).await
    }

    /// Remove and return the collectible at `index`.
    ///
    /// # Errors
    /// - `OutOfRange` if there is no such position; the collection is
    ///   unchanged
    pub async fn remove_from_collection(&self, index: usize) -> Result<NftRef> {
        let _guard = self.mutation.lock().await;
        let removed = {
            let mut data = self.write_data();
            let len = data.collection.len();
            if index >= len {
                return Err(Error::OutOfRange { index, len });
            }
            data.collection.remove(index)
        };

        self.persist(&[GameField::Collection]).await?;
        Ok(removed)
    }

    pub async fn set_active_battle_nft(&self, nft: Option<NftRef>) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.write_data().active_battle_nft = nft;
        self.persist(&[GameField::ActiveBattleNft]).await
    }

    pub async fn append_battle_record(&self, record: BattleRecord) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.write_data().battle_history.push(record);
        self.persist(&[GameField::BattleHistory]).await
    }

    /// Merge `update` into the profile and return the result.
    pub async fn update_user_profile(&self, update: ProfileUpdate) -> Result<UserProfile> {
        let _guard = self.mutation.lock().await;
        let profile = {
            let mut data = self.write_data();
            update.apply_to(&mut data.user_profile);
            data.user_profile.clone()
        };

        self.persist(&[GameField::UserProfile]).await?;
        Ok(profile)
    }

    /// Serialize the whole state as a backup blob.
    pub fn export_snapshot(&self) -> Result<String> {
        serde_json::to_string(&*self.read_data())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Replace the whole state with a backup blob and persist every field.
    ///
    /// # Errors
    /// - `InvalidImport` if the blob is not a complete game state; nothing
    ///   changes
    /// - `LocalStore` if the imported state could not be persisted
    pub async fn import_snapshot(&self, blob: &str) -> Result<()> {
        let imported: GameData = serde_json::from_str(blob).map_err(|e| {
            warn!("Rejected game data import: {}", e);
            Error::InvalidImport(e.to_string())
        })?;

        let _guard = self.mutation.lock().await;
        *self.write_data() = imported;
        info!("Imported game data");
        self.persist(&GameField::ALL).await
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Write the current value of `fields` through the store, concurrently.
    ///
    /// Callers hold the mutation lock.
    async fn persist(&self, fields: &[GameField]) -> Result<()> {
        let keys = field_keys(fields)?;
        let values = {
            let data = self.read_data();
            fields
                .iter()
                .map(|field| encode_field(&data, *field))
                .collect::<Result<Vec<_>>>()?
        };

        try_join_all(
            keys.iter()
                .zip(values.iter())
                .map(|(key, value)| self.store.write(key, value)),
        )
        .await?;
        Ok(())
    }

    fn read_data(&self) -> RwLockReadGuard<'_, GameData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, GameData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn field_keys(fields: &[GameField]) -> Result<Vec<StoreKey>> {
    fields.iter().map(|field| field.store_key()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use starsync_storage::{LocalStore, MemoryLocalStore, MemoryRemoteStore};
    use starsync_sync::Connectivity;

    struct Fixture {
        local: Arc<MemoryLocalStore>,
        remote: Arc<MemoryRemoteStore>,
        connectivity: Connectivity,
        store: Arc<DualStore>,
    }

    impl Fixture {
        fn new(online: bool) -> Self {
            let local = Arc::new(MemoryLocalStore::new());
            let remote = Arc::new(MemoryRemoteStore::new());
            let connectivity = Connectivity::new(online);
            let store = Arc::new(
                DualStore::new(local.clone(), remote.clone(), connectivity.clone()).unwrap(),
            );
            Self {
                local,
                remote,
                connectivity,
                store,
            }
        }

        async fn manager(&self) -> GameDataManager {
            let manager = GameDataManager::new(self.store.clone(), GameConfig::default());
            manager.init().await.unwrap();
            manager
        }

        /// A manager over the same local store after a restart.
        async fn restarted(&self) -> GameDataManager {
            let store = Arc::new(
                DualStore::new(
                    self.local.clone(),
                    self.remote.clone(),
                    self.connectivity.clone(),
                )
                .unwrap(),
            );
            let manager = GameDataManager::new(store, GameConfig::default());
            manager.init().await.unwrap();
            manager
        }
    }

    fn nft(name: &str) -> NftRef {
        NftRef::new(name, format!("{}.png", name), "common")
    }

    fn key(name: &str) -> StoreKey {
        StoreKey::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_new_player_defaults() {
        let f = Fixture::new(true);
        let manager = f.manager().await;

        assert_eq!(manager.stars(), 100);
        assert_eq!(manager.total_stars_earned(), 0);
        assert!(manager.collection().is_empty());
        assert_eq!(manager.user_profile().name, "Player");
    }

    #[tokio::test]
    async fn test_credit_updates_balance_and_total() {
        let f = Fixture::new(true);
        let manager = f.manager().await;

        assert_eq!(manager.credit(25).await.unwrap(), 125);
        assert_eq!(manager.total_stars_earned(), 25);
        assert_eq!(f.remote.peek("stars").as_deref(), Some("125"));
        assert_eq!(f.remote.peek("totalStarsEarned").as_deref(), Some("25"));
    }

    #[tokio::test]
    async fn test_debit_over_balance_declined() {
        let f = Fixture::new(true);
        let manager = f.manager().await;

        let outcome = manager.debit(150).await.unwrap();
        assert_eq!(
            outcome,
            DebitOutcome::Declined(InsufficientBalance {
                requested: 150,
                available: 100
            })
        );
        assert_eq!(manager.stars(), 100);
        assert_eq!(f.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_debit_to_zero_survives_reload() {
        let f = Fixture::new(true);
        let manager = f.manager().await;

        assert_eq!(
            manager.debit(100).await.unwrap(),
            DebitOutcome::Applied { remaining: 0 }
        );

        let reloaded = f.restarted().await;
        assert_eq!(reloaded.stars(), 0);
    }

    #[tokio::test]
    async fn test_zero_amounts_rejected() {
        let f = Fixture::new(true);
        let manager = f.manager().await;

        assert!(matches!(manager.credit(0).await, Err(Error::InvalidInput(_))));
        assert!(matches!(manager.debit(0).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_credit_overflow_rejected() {
        let f = Fixture::new(true);
        let manager = f.manager().await;
        manager.set_stars(u64::MAX - 1).await.unwrap();

        assert!(matches!(manager.credit(5).await, Err(Error::InvalidInput(_))));
        assert_eq!(manager.stars(), u64::MAX - 1);
        assert_eq!(manager.total_stars_earned(), 0);
    }

    #[tokio::test]
    async fn test_remove_out_of_range_leaves_collection() {
        let f = Fixture::new(true);
        let manager = f.manager().await;
        for name in ["a", "b", "c"] {
            manager.add_to_collection(nft(name)).await.unwrap();
        }

        let err = manager.remove_from_collection(5).await.unwrap_err();
        assert!(matches!(err, Error::OutOfRange { index: 5, len: 3 }));
        assert_eq!(manager.collection().len(), 3);

        let removed = manager.remove_from_collection(1).await.unwrap();
        assert_eq!(removed.name, "b");
        let names: Vec<String> = manager.collection().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = Fixture::new(true);
        let manager = source.manager().await;
        manager.credit(40).await.unwrap();
        manager.add_to_collection(nft("siber").with_price(250)).await.unwrap();
        manager.set_active_battle_nft(Some(nft("siber"))).await.unwrap();
        manager
            .append_battle_record(BattleRecord::new("bot", true, 12))
            .await
            .unwrap();
        let blob = manager.export_snapshot().unwrap();

        let target = Fixture::new(true);
        let other = target.manager().await;
        other.import_snapshot(&blob).await.unwrap();
        assert_eq!(other.snapshot(), manager.snapshot());

        let reloaded = target.restarted().await;
        assert_eq!(reloaded.snapshot(), manager.snapshot());
    }

    #[tokio::test]
    async fn test_malformed_import_leaves_state() {
        let f = Fixture::new(true);
        let manager = f.manager().await;
        manager.credit(5).await.unwrap();
        let before = manager.snapshot();

        for blob in ["not json", "{\"stars\": 3}", "[]"] {
            let err = manager.import_snapshot(blob).await.unwrap_err();
            assert!(matches!(err, Error::InvalidImport(_)));
        }
        assert_eq!(manager.snapshot(), before);
    }

    #[tokio::test]
    async fn test_offline_debit_then_reconnect() {
        let f = Fixture::new(true);
        let manager = f.manager().await;
        f.connectivity.set_online(false);

        manager.debit(30).await.unwrap();
        assert_eq!(manager.stars(), 70);
        assert_eq!(f.local.get(&key("stars")).unwrap().as_deref(), Some("70"));
        assert!(f.remote.peek("stars").is_none());

        f.connectivity.set_online(true);
        let report = f.store.reconcile().await;
        assert!(report.is_complete());
        assert_eq!(f.remote.peek("stars").as_deref(), Some("70"));
    }

    #[tokio::test]
    async fn test_unreadable_field_falls_back() {
        let f = Fixture::new(false);
        f.local.set(&key("stars"), "plenty").unwrap();
        f.local.set(&key("battleHistory"), "[{").unwrap();
        f.local.set(&key("totalStarsEarned"), "12").unwrap();

        let manager = f.manager().await;
        assert_eq!(manager.stars(), 100);
        assert!(manager.battle_history().is_empty());
        assert_eq!(manager.total_stars_earned(), 12);
    }

    #[tokio::test]
    async fn test_append_keeps_history_with_odd_records() {
        let f = Fixture::new(false);
        let stored = r#"[
            {"opponent": "bot", "won": true, "starsDelta": 10, "timestamp": "2026-01-02T03:04:05Z"},
            {"opponent": "rival", "mode": "ranked"},
            "garbage"
        ]"#;
        f.local.set(&key("battleHistory"), stored).unwrap();

        let manager = f.manager().await;
        assert_eq!(manager.battle_history().len(), 2);

        manager
            .append_battle_record(BattleRecord::new("boss", false, -5))
            .await
            .unwrap();

        let history = f.restarted().await.battle_history();
        let opponents: Vec<&str> = history.iter().map(|r| r.opponent.as_str()).collect();
        assert_eq!(opponents, vec!["bot", "rival", "boss"]);
        assert_eq!(history[1].extra["mode"], "ranked");
    }

    #[tokio::test]
    async fn test_local_failure_propagates() {
        let f = Fixture::new(true);
        let manager = f.manager().await;
        f.local.set_read_only(true);

        let err = manager.add_to_collection(nft("a")).await.unwrap_err();
        assert!(matches!(err, Error::LocalStore(_)));
    }

    #[tokio::test]
    async fn test_profile_update_persists() {
        let f = Fixture::new(true);
        let manager = f.manager().await;
        let update = ProfileUpdate {
            avatar: Some("🦊".to_string()),
            ..ProfileUpdate::default()
        };
        manager.update_user_profile(update).await.unwrap();

        let reloaded = f.restarted().await;
        assert_eq!(reloaded.user_profile().avatar, "🦊");
        assert_eq!(reloaded.user_profile().name, "Player");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Credit(u64),
        Debit(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..500).prop_map(Op::Credit),
            (1u64..500).prop_map(Op::Debit),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_accounting(ops in prop::collection::vec(op(), 1..30)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let f = Fixture::new(true);
                let manager = f.manager().await;
                let mut expected_stars = 100u64;
                let mut expected_total = 0u64;

                for op in ops {
                    let earned_before = manager.total_stars_earned();
                    match op {
                        Op::Credit(n) => {
                            manager.credit(n).await.unwrap();
                            expected_stars += n;
                            expected_total += n;
                        }
                        Op::Debit(n) => {
                            let outcome = manager.debit(n).await.unwrap();
                            if expected_stars >= n {
                                assert!(outcome.is_applied());
                                expected_stars -= n;
                            } else {
                                assert!(!outcome.is_applied());
                            }
                        }
                    }
                    assert!(manager.total_stars_earned() >= earned_before);
                    assert_eq!(manager.stars(), expected_stars);
                    assert_eq!(manager.total_stars_earned(), expected_total);
                }
            });
        }
    }
}
