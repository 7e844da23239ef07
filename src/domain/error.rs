//! Error types shared across the engine.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Per-intent validation failures. These never abort a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid destination address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },
}

/// Failures talking to the network or producing a transaction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Configuration load or validation failure. Always process-fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigError::Invalid(errors.to_string())
    }
}
