//! Snapshot persistence
//!
//! A pool is persisted as a single bincode-encoded [`PoolSnapshot`]. Writes go
//! to a temporary file that is then renamed over the previous snapshot, so a
//! crash mid-write leaves the last good snapshot in place.

use crate::{
    error::Result,
    pool::PoolSnapshot,
    Config,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Open the store, creating the data directory if needed
    pub fn open(config: &Config) -> Result<Self> {
        let dir = &config.storage.data_dir;
        fs::create_dir_all(dir)?;

        Ok(Self {
            path: dir.join(&config.storage.snapshot_file),
        })
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a snapshot, replacing the previous one
    pub fn save(&self, snapshot: &PoolSnapshot) -> Result<()> {
        let bytes = bincode::serialize(snapshot)?;
        let tmp = self.path.with_extension("tmp");

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            pool = %snapshot.pool_id,
            path = %self.path.display(),
            bytes = bytes.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Read the last snapshot, if any
    pub fn load(&self) -> Result<Option<PoolSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: PoolSnapshot = bincode::deserialize(&bytes)?;

        tracing::debug!(pool = %snapshot.pool_id, path = %self.path.display(), "Snapshot loaded");
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetLedger, TokenLedger};
    use crate::pool::ReservePool;
    use crate::types::{AccountId, TokenMetadata};
    use std::sync::Arc;

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.join("nested").join("pool");
        config
    }

    #[test]
    fn test_load_missing_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&config(temp_dir.path())).unwrap();
        assert!(store.path().parent().unwrap().is_dir());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_restore_pool() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = config(temp_dir.path());
        let store = SnapshotStore::open(&config).unwrap();

        let admin = AccountId::new("admin");
        let alice = AccountId::new("alice");
        let meta = TokenMetadata {
            name: "Token".to_string(),
            symbol: "TKN".to_string(),
            decimals: 18,
        };
        let token_a = Arc::new(TokenLedger::new("token-a".into(), admin.clone(), meta.clone()));
        let token_b = Arc::new(TokenLedger::new("token-b".into(), admin.clone(), meta));
        let pool =
            ReservePool::new("pool".into(), token_a.clone(), token_b.clone(), &config).unwrap();

        token_a.mint(&admin, &alice, 10).unwrap();
        token_b.mint(&admin, &alice, 40).unwrap();
        token_a.approve(&alice, pool.id(), 10).unwrap();
        token_b.approve(&alice, pool.id(), 40).unwrap();
        pool.add_liquidity(&alice, 10, 40).unwrap();

        store.save(&pool.snapshot()).unwrap();
        assert!(!store.path().with_extension("tmp").exists());

        let snapshot = store.load().unwrap().unwrap();
        let restored = ReservePool::restore(snapshot, token_a, token_b).unwrap();
        assert_eq!(restored.state(), pool.state());
        assert_eq!(restored.lp_token().balance_of(&alice), 20);
        restored.check_reserves().unwrap();
    }

    #[test]
    fn test_corrupt_snapshot_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&config(temp_dir.path())).unwrap();
        fs::write(store.path(), b"not a snapshot").unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), "serialization");
    }
}
