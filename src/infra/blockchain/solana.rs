//! JSON-RPC network gateway backed by the Solana SDK client.

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::{hash::Hash, signature::Signature, transaction::Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::domain::{AppError, BlockchainError, NetworkGateway, SignatureState, SubmitOptions};

/// Configuration for the RPC gateway
#[derive(Debug, Clone, Copy)]
pub struct RpcGatewayConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Default commitment for calls that don't take one explicitly
    pub commitment: CommitmentLevel,
}

impl Default for RpcGatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            commitment: CommitmentLevel::Finalized,
        }
    }
}

/// Shared by every worker in a run; the underlying client is safe to use
/// concurrently.
pub struct RpcNetworkGateway {
    client: SolanaRpcClient,
    rpc_url: String,
}

impl RpcNetworkGateway {
    pub fn new(rpc_url: &str, config: RpcGatewayConfig) -> Self {
        let client = SolanaRpcClient::new_with_timeout_and_commitment(
            rpc_url.to_string(),
            config.timeout,
            CommitmentConfig {
                commitment: config.commitment,
            },
        );
        info!(rpc_url = %rpc_url, timeout_secs = config.timeout.as_secs(), "Created RPC network gateway");
        Self {
            client,
            rpc_url: rpc_url.to_string(),
        }
    }

    pub fn with_defaults(rpc_url: &str) -> Self {
        Self::new(rpc_url, RpcGatewayConfig::default())
    }

    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl NetworkGateway for RpcNetworkGateway {
    #[instrument(skip(self))]
    async fn get_checkpoint(&self, commitment: CommitmentLevel) -> Result<Hash, AppError> {
        let (hash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(CommitmentConfig { commitment })
            .await
            .map_err(map_solana_client_error)?;
        debug!(blockhash = %hash, last_valid_block_height, "Fetched latest blockhash");
        Ok(hash)
    }

    #[instrument(skip(self, transaction), fields(signature = %transaction.signatures[0]))]
    async fn submit(
        &self,
        transaction: &Transaction,
        options: SubmitOptions,
    ) -> Result<Signature, AppError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(options.preflight_commitment),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(map_solana_client_error)
    }

    #[instrument(skip(self))]
    async fn get_status(&self, signature: &Signature) -> Result<SignatureState, AppError> {
        let response = self
            .client
            .get_signature_statuses(std::slice::from_ref(signature))
            .await
            .map_err(map_solana_client_error)?;

        let state = match response.value.into_iter().next().flatten() {
            None => SignatureState::Absent,
            Some(status) => match status.err {
                Some(err) => SignatureState::Errored(format!("{:?}", err)),
                None => SignatureState::Confirmed,
            },
        };
        Ok(state)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let slot = self
            .client
            .get_slot()
            .await
            .map_err(map_solana_client_error)?;
        debug!(slot, "RPC node reachable");
        Ok(())
    }
}

/// Map a Solana client error onto the domain error kinds
pub(crate) fn map_solana_client_error(err: ClientError) -> AppError {
    use solana_client::client_error::ClientErrorKind;

    let msg = err.to_string();

    match err.kind() {
        ClientErrorKind::RpcError(_) => {
            if msg.contains("insufficient") || msg.contains("InsufficientFunds") {
                AppError::Blockchain(BlockchainError::InsufficientFunds)
            } else {
                AppError::Blockchain(BlockchainError::RpcError(msg))
            }
        }
        ClientErrorKind::Io(_) => AppError::Blockchain(BlockchainError::Connection(msg)),
        ClientErrorKind::Reqwest(_) => {
            if msg.contains("timeout") || msg.contains("timed out") {
                AppError::Blockchain(BlockchainError::Timeout(msg))
            } else {
                AppError::Blockchain(BlockchainError::Connection(msg))
            }
        }
        ClientErrorKind::TransactionError(_) => {
            AppError::Blockchain(BlockchainError::TransactionFailed(msg))
        }
        _ => AppError::Blockchain(BlockchainError::RpcError(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        let gateway = RpcNetworkGateway::with_defaults("https://api.devnet.solana.com");
        assert_eq!(gateway.rpc_url(), "https://api.devnet.solana.com");
    }

    #[test]
    fn test_gateway_config_default() {
        let config = RpcGatewayConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.commitment, CommitmentLevel::Finalized);
    }

    #[tokio::test]
    async fn test_unreachable_node_maps_to_blockchain_error() {
        let gateway = RpcNetworkGateway::new(
            "http://127.0.0.1:1",
            RpcGatewayConfig {
                timeout: Duration::from_secs(2),
                ..RpcGatewayConfig::default()
            },
        );

        let result = gateway.get_checkpoint(CommitmentLevel::Finalized).await;
        assert!(matches!(result, Err(AppError::Blockchain(_))));
    }
}
