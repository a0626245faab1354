//! Strategy state snapshots on disk
//!
//! A snapshot is a JSON document holding the [`StrategyState`] together with
//! a blake3 checksum of its canonical encoding. Writes go to a temporary file
//! that is renamed over the target, so a crash never leaves a torn snapshot.

use crate::error::{Result, StrategyError};
use crate::persistence::logging::{OperationType, PersistenceLogger};
use crate::state::StrategyState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Hex blake3 digest of the JSON-encoded state
    pub checksum: String,
    /// The state
    pub state: StrategyState,
}

impl StateSnapshot {
    /// Snapshot `state` now
    pub fn new(state: &StrategyState) -> Result<Self> {
        Ok(Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            checksum: state_checksum(state)?,
            state: state.clone(),
        })
    }

    /// Check the version and recompute the checksum
    pub fn verify(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StrategyError::Corrupted(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }

        let actual = state_checksum(&self.state)?;
        let matches = actual == self.checksum;
        PersistenceLogger::log_consistency_check_result(
            OperationType::VerifyChecksum.to_string(),
            matches,
            format!("recorded {}, computed {}", self.checksum, actual),
        );

        if !matches {
            return Err(StrategyError::Corrupted(format!(
                "checksum mismatch: recorded {}, computed {}",
                self.checksum, actual
            )));
        }

        Ok(())
    }
}

/// Milliseconds since `started`, saturating
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Hex blake3 digest of the JSON encoding of `state`
pub fn state_checksum(state: &StrategyState) -> Result<String> {
    let encoded = serde_json::to_vec(state)?;
    Ok(blake3::hash(&encoded).to_hex().to_string())
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot has been written
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write `state`, replacing any previous snapshot
    pub fn save(&self, state: &StrategyState) -> Result<()> {
        let started = Instant::now();
        let context = self.path.display().to_string();
        PersistenceLogger::log_operation_start(OperationType::PersistState, context.as_str());

        let result = self.write_snapshot(state);
        let elapsed = elapsed_ms(started);

        match result {
            Ok(size) => {
                PersistenceLogger::log_operation_success(OperationType::PersistState, size, elapsed, context);
                Ok(())
            }
            Err(err) => {
                PersistenceLogger::log_operation_failure(
                    OperationType::PersistState,
                    0,
                    elapsed,
                    context,
                    err.to_string(),
                );
                Err(err)
            }
        }
    }

    fn write_snapshot(&self, state: &StrategyState) -> Result<u64> {
        let snapshot = StateSnapshot::new(state)?;
        let encoded = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &encoded)?;
        fs::rename(&tmp, &self.path)?;

        Ok(encoded.len() as u64)
    }

    /// Read, verify and return the stored state
    pub fn load(&self) -> Result<StrategyState> {
        let started = Instant::now();
        let context = self.path.display().to_string();
        PersistenceLogger::log_operation_start(OperationType::RecoverState, context.as_str());

        let result = self.read_snapshot();
        let elapsed = elapsed_ms(started);

        match result {
            Ok((state, size)) => {
                PersistenceLogger::log_operation_success(OperationType::RecoverState, size, elapsed, context);
                Ok(state)
            }
            Err(err) => {
                PersistenceLogger::log_operation_failure(
                    OperationType::RecoverState,
                    0,
                    elapsed,
                    context,
                    err.to_string(),
                );
                Err(err)
            }
        }
    }

    fn read_snapshot(&self) -> Result<(StrategyState, u64)> {
        let bytes = fs::read(&self.path)?;
        let snapshot: StateSnapshot = serde_json::from_slice(&bytes)?;

        snapshot.verify()?;

        let consistency = snapshot.state.verify_consistency();
        PersistenceLogger::log_consistency_check_result(
            OperationType::VerifyConsistency.to_string(),
            consistency.is_ok(),
            format!(
                "{} tickets, pending withdrawals {}",
                snapshot.state.queue.len(),
                snapshot.state.queue.pending_withdrawals()
            ),
        );
        consistency?;

        Ok((snapshot.state, bytes.len() as u64))
    }
}
