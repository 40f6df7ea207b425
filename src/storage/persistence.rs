//! Vault persistence layer
//!
//! Provides save/load functionality for vault snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::custody::Treasury;
use crate::vault::{validate_signer_config, Vault, VaultState};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub vault_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".vault_data"),
            vault_file: "vault.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// The unit written to disk: engine state plus the balances it custodies
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub state: VaultState,
    pub treasury: Treasury,
    pub saved_at: DateTime<Utc>,
}

impl VaultSnapshot {
    pub fn new(state: VaultState, treasury: Treasury) -> Self {
        Self {
            state,
            treasury,
            saved_at: Utc::now(),
        }
    }

    pub fn from_vault(vault: &Vault<Treasury>) -> Self {
        Self::new(vault.state().clone(), vault.custody().clone())
    }

    pub fn into_vault(self) -> Vault<Treasury> {
        Vault::from_state(self.state, self.treasury)
    }

    /// Reject snapshots whose registry could never have been produced by the
    /// engine
    pub fn validate(&self) -> Result<(), StorageError> {
        let registry = self.state.registry();
        if registry.is_initialized() {
            validate_signer_config(registry.signers(), registry.threshold())
                .map_err(|e| StorageError::InvalidData(format!("signer registry: {}", e)))?;
        }

        for (index, action) in self.state.ledger().iter().enumerate() {
            if action.id != index as u64 {
                return Err(StorageError::InvalidData(format!(
                    "action at position {} has id {}",
                    index, action.id
                )));
            }
        }

        Ok(())
    }
}

/// Vault snapshot storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn vault_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.vault_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.vault_file, index))
    }

    /// Save a snapshot to disk
    pub fn save(&self, snapshot: &VaultSnapshot) -> Result<(), StorageError> {
        let path = self.vault_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        // Write to temporary file first
        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.vault_file));
        if let Err(e) = save_to_file(snapshot, &temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        // Atomic rename
        fs::rename(&temp_path, &path)?;

        log::debug!(
            "Saved vault {} ({} actions) to {}",
            snapshot.state.address,
            snapshot.state.ledger().len(),
            path.display()
        );
        Ok(())
    }

    /// Load the snapshot from disk
    pub fn load(&self) -> Result<VaultSnapshot, StorageError> {
        let path = self.vault_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Vault file not found: {}",
                path.display()
            )));
        }

        let snapshot = load_from_file(&path)?;
        log::debug!("Loaded vault {} from {}", snapshot.state.address, path.display());
        Ok(snapshot)
    }

    /// Check if a saved vault exists
    pub fn exists(&self) -> bool {
        self.vault_path().exists()
    }

    /// Delete the saved vault
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.vault_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Rotate backup files
    fn rotate_backups(&self) -> Result<(), StorageError> {
        // Delete oldest backup
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift existing backups
        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Restore from a backup
    pub fn restore_backup(&self, backup_index: usize) -> Result<VaultSnapshot, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        load_from_file(&backup_path)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|&i| self.backup_path(i).exists())
            .collect()
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.vault_path();

        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}

/// Save a snapshot to a specific file path
///
/// Returns only once the bytes have reached the disk.
pub fn save_to_file(snapshot: &VaultSnapshot, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Load and validate a snapshot from a specific file path
pub fn load_from_file(path: &Path) -> Result<VaultSnapshot, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let snapshot: VaultSnapshot = serde_json::from_reader(reader)?;
    snapshot.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::crypto::{derive_vault_address, KeyPair};
    use crate::vault::ProposalRequest;

    fn storage_in(dir: &Path, max_backups: usize) -> Storage {
        let config = StorageConfig {
            data_dir: dir.to_path_buf(),
            max_backups,
            ..Default::default()
        };
        Storage::new(config).unwrap()
    }

    fn sample_vault() -> (Vault<Treasury>, Vec<KeyPair>) {
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let signers: Vec<Address> = keys.iter().map(KeyPair::address).collect();
        let address = derive_vault_address(&signers, 2);

        let mut treasury = Treasury::new();
        treasury.deposit(&address, 5000).unwrap();

        let mut vault = Vault::new(address, treasury);
        vault.initialize(signers, 2).unwrap();
        (vault, keys)
    }

    #[test]
    fn test_save_load_vault() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);

        let (mut vault, keys) = sample_vault();
        let proposer = keys[0].address();
        let id = vault
            .propose(&proposer, ProposalRequest::native(1000, Address::new("bob")))
            .unwrap();
        let digest = vault.digest(id).unwrap();

        storage.save(&VaultSnapshot::from_vault(&vault)).unwrap();
        assert!(storage.exists());

        let mut loaded = storage.load().unwrap().into_vault();
        assert_eq!(loaded.address(), vault.address());
        assert_eq!(loaded.registry(), vault.registry());
        assert_eq!(loaded.next_id(), 1);
        assert_eq!(loaded.balance(), 5000);
        assert_eq!(loaded.digest(id).unwrap(), digest);

        // Signatures gathered before the save still execute after the load
        let sigs: Vec<Vec<u8>> = keys[1..]
            .iter()
            .map(|k| k.sign_recoverable(digest.as_bytes()).unwrap())
            .collect();
        loaded.execute(&proposer, id, &sigs).unwrap();
        assert_eq!(loaded.balance(), 4000);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);

        assert!(!storage.exists());
        assert!(matches!(storage.load(), Err(StorageError::InvalidData(_))));
    }

    #[test]
    fn test_load_rejects_corrupt_registry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);

        let (vault, _) = sample_vault();
        let mut json = serde_json::to_value(VaultSnapshot::from_vault(&vault)).unwrap();
        json["state"]["registry"]["threshold"] = serde_json::json!(9);
        fs::write(
            temp_dir.path().join("vault.json"),
            serde_json::to_vec(&json).unwrap(),
        )
        .unwrap();

        assert!(matches!(storage.load(), Err(StorageError::InvalidData(_))));
    }

    #[test]
    fn test_backup_rotation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 3);

        let (mut vault, keys) = sample_vault();
        let proposer = keys[0].address();

        // Save multiple times
        for amount in 1..=5u128 {
            storage.save(&VaultSnapshot::from_vault(&vault)).unwrap();
            vault
                .propose(&proposer, ProposalRequest::native(amount, Address::new("bob")))
                .unwrap();
        }

        assert_eq!(storage.list_backups(), vec![0, 1, 2]);

        // Backup 0 holds the state before the last save
        let restored = storage.restore_backup(0).unwrap();
        assert_eq!(restored.state.ledger().len(), 3);
        assert!(storage.restore_backup(7).is_err());

        let stats = storage.stats().unwrap();
        assert_eq!(stats.backup_count, 3);
        assert!(stats.file_size > 0);
    }

    #[test]
    fn test_backups_disabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            backup_enabled: false,
            ..Default::default()
        };
        let storage = Storage::new(config).unwrap();
        let (vault, _) = sample_vault();

        storage.save(&VaultSnapshot::from_vault(&vault)).unwrap();
        storage.save(&VaultSnapshot::from_vault(&vault)).unwrap();
        assert!(storage.list_backups().is_empty());

        storage.delete().unwrap();
        assert!(!storage.exists());
    }

    #[test]
    fn test_restore_backup_replaces_corrupt_vault() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 3);
        let (vault, _) = sample_vault();

        storage.save(&VaultSnapshot::from_vault(&vault)).unwrap();
        storage.save(&VaultSnapshot::from_vault(&vault)).unwrap();
        fs::write(temp_dir.path().join("vault.json"), b"{\"state\": {").unwrap();
        assert!(matches!(
            storage.load(),
            Err(StorageError::SerializationError(_))
        ));

        let snapshot = storage.restore_backup(0).unwrap();
        storage.save(&snapshot).unwrap();
        assert_eq!(storage.load().unwrap().state.address, *vault.address());
        assert!(!temp_dir.path().join("vault.json.tmp").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_errors_are_reported() {
        // Every write to /dev/full fails with ENOSPC
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let (vault, _) = sample_vault();
        let result = save_to_file(&VaultSnapshot::from_vault(&vault), full);
        assert!(result.is_err());
    }

    #[test]
    fn test_file_helpers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.json");
        let (vault, _) = sample_vault();

        save_to_file(&VaultSnapshot::from_vault(&vault), &path).unwrap();
        let snapshot = load_from_file(&path).unwrap();
        assert_eq!(snapshot.state.registry().description(), "2-of-3");
    }
}
