//! Typed error definitions for media_vault.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Device bridge unavailable: {0}")]
    BridgeUnavailable(String),

    #[error("Backup root is not usable: {path}: {context}")]
    BackupRootInvalid { path: PathBuf, context: String },

    #[error("Failed to enumerate device folder {folder}: {source}")]
    Enumeration {
        folder: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to prepare destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Insufficient disk space under {dest}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        required: u64,
        available: u64,
        dest: PathBuf,
    },

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl VaultError {
    /// Stable numeric code, logged as a structured field.
    pub fn code(&self) -> u32 {
        match self {
            VaultError::BridgeUnavailable(_) => 10,
            VaultError::BackupRootInvalid { .. } => 11,
            VaultError::Enumeration { .. } => 20,
            VaultError::Destination { .. } => 21,
            VaultError::InsufficientSpace { .. } => 30,
            VaultError::Interrupted => 130,
        }
    }

    /// Short machine-friendly kind for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::BridgeUnavailable(_) => "bridge_unavailable",
            VaultError::BackupRootInvalid { .. } => "backup_root_invalid",
            VaultError::Enumeration { .. } => "enumeration",
            VaultError::Destination { .. } => "destination",
            VaultError::InsufficientSpace { .. } => "insufficient_space",
            VaultError::Interrupted => "interrupted",
        }
    }
}
