//! Persistence for strategy state
//!
//! This module provides:
//! - Atomic JSON snapshots of the strategy state with a blake3 checksum
//! - Recovery with checksum and accounting-invariant verification
//! - Structured logging of every persistence operation

pub mod logging;
pub mod store;

pub use logging::{OperationStatus, OperationType, PersistenceLogEntry, PersistenceLogger};
pub use store::{state_checksum, StateSnapshot, StateStore, SNAPSHOT_VERSION};
