//! Structured logging for snapshot operations
//!
//! Every save, load and consistency check is logged with its operation type,
//! status, payload size and duration so operators can follow what the store
//! did without reading the snapshot files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info};

/// Operation type for structured logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationType {
    /// Strategy state written to disk
    PersistState,
    /// Strategy state read back from disk
    RecoverState,
    /// Snapshot checksum verification
    VerifyChecksum,
    /// Accounting invariant verification
    VerifyConsistency,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::PersistState => write!(f, "PersistState"),
            OperationType::RecoverState => write!(f, "RecoverState"),
            OperationType::VerifyChecksum => write!(f, "VerifyChecksum"),
            OperationType::VerifyConsistency => write!(f, "VerifyConsistency"),
        }
    }
}

/// Operation status for structured logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationStatus {
    /// Operation started
    Started,
    /// Operation completed successfully
    Success,
    /// Operation failed
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Started => write!(f, "Started"),
            OperationStatus::Success => write!(f, "Success"),
            OperationStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Structured log entry for persistence operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceLogEntry {
    /// Operation type
    pub operation_type: OperationType,
    /// Operation status
    pub status: OperationStatus,
    /// Data size in bytes
    pub data_size_bytes: u64,
    /// Timestamp of operation
    pub timestamp: DateTime<Utc>,
    /// Duration in milliseconds (if completed)
    pub duration_ms: Option<u64>,
    /// Additional context
    pub context: String,
    /// Error message (if failed)
    pub error_message: Option<String>,
}

impl fmt::Display for PersistenceLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation={} status={} data_size={} bytes timestamp={} context={}",
            self.operation_type, self.status, self.data_size_bytes, self.timestamp, self.context
        )?;
        if let Some(duration) = self.duration_ms {
            write!(f, " duration={}ms", duration)?;
        }
        if let Some(error) = &self.error_message {
            write!(f, " error={}", error)?;
        }
        Ok(())
    }
}

/// Logger for persistence operations
pub struct PersistenceLogger;

impl PersistenceLogger {
    /// Log an operation start
    pub fn log_operation_start(operation_type: OperationType, context: impl Into<String>) -> PersistenceLogEntry {
        let entry = PersistenceLogEntry {
            operation_type,
            status: OperationStatus::Started,
            data_size_bytes: 0,
            timestamp: Utc::now(),
            duration_ms: None,
            context: context.into(),
            error_message: None,
        };

        info!(
            operation = %operation_type,
            context = %entry.context,
            "Persistence operation started"
        );

        entry
    }

    /// Log an operation success
    pub fn log_operation_success(
        operation_type: OperationType,
        data_size_bytes: u64,
        duration_ms: u64,
        context: impl Into<String>,
    ) -> PersistenceLogEntry {
        let entry = PersistenceLogEntry {
            operation_type,
            status: OperationStatus::Success,
            data_size_bytes,
            timestamp: Utc::now(),
            duration_ms: Some(duration_ms),
            context: context.into(),
            error_message: None,
        };

        info!(
            operation = %operation_type,
            data_size = data_size_bytes,
            duration_ms = duration_ms,
            context = %entry.context,
            "Persistence operation completed successfully"
        );
        debug!("Persistence log entry: {}", entry);

        entry
    }

    /// Log an operation failure
    pub fn log_operation_failure(
        operation_type: OperationType,
        data_size_bytes: u64,
        duration_ms: u64,
        context: impl Into<String>,
        error_message: impl Into<String>,
    ) -> PersistenceLogEntry {
        let entry = PersistenceLogEntry {
            operation_type,
            status: OperationStatus::Failed,
            data_size_bytes,
            timestamp: Utc::now(),
            duration_ms: Some(duration_ms),
            context: context.into(),
            error_message: Some(error_message.into()),
        };

        error!(
            operation = %operation_type,
            data_size = data_size_bytes,
            duration_ms = duration_ms,
            context = %entry.context,
            error = entry.error_message.as_deref().unwrap_or_default(),
            "Persistence operation failed"
        );
        debug!("Persistence log entry: {}", entry);

        entry
    }

    /// Log a consistency check result
    pub fn log_consistency_check_result(check_type: impl Into<String>, is_consistent: bool, details: impl Into<String>) {
        let check = check_type.into();
        let detail = details.into();

        if is_consistent {
            info!(
                check_type = %check,
                details = %detail,
                "Consistency check passed"
            );
        } else {
            error!(
                check_type = %check,
                details = %detail,
                "Consistency check failed"
            );
        }
    }
}
