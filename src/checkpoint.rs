//! Resume support: a small versioned JSON record persisted every few units.
//!
//! Two states only: fresh (no file, or an unreadable one) and resuming. The
//! file is deleted when a run completes; a crash or interrupt always leaves
//! one behind for the next invocation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::OperationType;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Persisted progress marker. `last_index` is the index of the next unit to
/// process: resuming a checkpoint with `last_index == K` starts the loop at
/// K, so the unit that was in flight when the run died is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub last_index: usize,
    pub processed: u64,
    pub succeeded: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: OperationType,
}

impl Checkpoint {
    pub fn new(last_index: usize, processed: u64, succeeded: u64, operation: OperationType) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            last_index,
            processed,
            succeeded,
            timestamp: Utc::now(),
            operation,
        }
    }
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the checkpoint if present. A corrupt or version-mismatched file
    /// is logged and treated as absent.
    pub fn load(&self) -> Option<Checkpoint> {
        if !self.path.exists() {
            info!("No checkpoint found, starting fresh");
            return None;
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read checkpoint {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str::<Checkpoint>(&raw) {
            Ok(cp) if cp.version == CHECKPOINT_VERSION => {
                info!(
                    "Checkpoint loaded: resuming at index {} ({} processed so far)",
                    cp.last_index, cp.processed
                );
                Some(cp)
            }
            Ok(cp) => {
                warn!("Checkpoint version {} unsupported, starting fresh", cp.version);
                None
            }
            Err(e) => {
                warn!("Corrupt checkpoint, starting fresh: {e}");
                None
            }
        }
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating checkpoint dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing checkpoint {}", self.path.display()))?;
        info!("Checkpoint saved: next index {}", checkpoint.last_index);
        Ok(())
    }

    /// Remove the checkpoint after a successful full run.
    pub fn clear(&self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove checkpoint {}: {e}", self.path.display());
            } else {
                info!("Checkpoint cleared");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir().join(format!("inmo-scout-{tag}-{}-{nanos}.json", std::process::id()))
    }

    #[test]
    fn roundtrip_preserves_resume_index_exactly() {
        let path = temp_path("roundtrip");
        let store = CheckpointStore::new(path.clone());
        let cp = Checkpoint::new(42, 40, 37, OperationType::Venta);
        store.save(&cp).unwrap();

        let loaded = store.load().expect("checkpoint should load");
        // The loop must start at exactly this index, not K+1 or K-1.
        assert_eq!(loaded.last_index, 42);
        assert_eq!(loaded.succeeded, 37);
        assert_eq!(loaded.operation, OperationType::Venta);

        store.clear();
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_falls_back_to_fresh() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{ not json at all").unwrap();
        let store = CheckpointStore::new(path.clone());
        assert!(store.load().is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_fresh() {
        let store = CheckpointStore::new(temp_path("missing"));
        assert!(store.load().is_none());
    }
}
