//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use solana_commitment_config::CommitmentLevel;
use solana_sdk::{hash::Hash, signature::Signature, transaction::Transaction};
use tokio::sync::mpsc;

use super::error::AppError;
use super::types::{SignatureState, SubmitOptions};

/// Network gateway used by every transfer worker.
///
/// Shared across workers behind an `Arc`; each call is a self-contained request.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    /// Fetch a recent blockhash at the given commitment
    async fn get_checkpoint(&self, commitment: CommitmentLevel) -> Result<Hash, AppError>;

    /// Submit a signed transaction, returning its signature
    async fn submit(
        &self,
        transaction: &Transaction,
        options: SubmitOptions,
    ) -> Result<Signature, AppError>;

    /// Query the confirmation state of a submitted signature
    async fn get_status(&self, signature: &Signature) -> Result<SignatureState, AppError>;

    /// Check RPC connectivity
    async fn health_check(&self) -> Result<(), AppError> {
        Err(AppError::NotSupported(
            "health_check not implemented".to_string(),
        ))
    }
}

/// Source of new-slot notifications for the triggered runner
#[async_trait]
pub trait SlotSource: Send + Sync {
    /// Start a subscription. The receiver closes when the upstream stream ends.
    async fn subscribe(&self) -> Result<mpsc::Receiver<u64>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockchainError;

    struct MinimalGateway;

    #[async_trait]
    impl NetworkGateway for MinimalGateway {
        async fn get_checkpoint(&self, _commitment: CommitmentLevel) -> Result<Hash, AppError> {
            Ok(Hash::default())
        }

        async fn submit(
            &self,
            _transaction: &Transaction,
            _options: SubmitOptions,
        ) -> Result<Signature, AppError> {
            Err(AppError::Blockchain(BlockchainError::RpcError(
                "unavailable".to_string(),
            )))
        }

        async fn get_status(&self, _signature: &Signature) -> Result<SignatureState, AppError> {
            Ok(SignatureState::Absent)
        }
    }

    #[tokio::test]
    async fn test_gateway_health_check_not_supported_by_default() {
        let gateway = MinimalGateway;
        let result = gateway.health_check().await;
        assert!(matches!(result, Err(AppError::NotSupported(_))));
    }
}
