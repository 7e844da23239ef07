//! Transaction construction and signing for a single transfer.
//!
//! No network I/O happens here: the caller supplies the blockhash, so
//! freshness policy lives in the worker.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use ed25519_dalek::SigningKey;
use secrecy::zeroize::Zeroizing;
use secrecy::{ExposeSecret, SecretString};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    signer::{Signer, keypair::Keypair},
    transaction::Transaction,
};
use solana_system_interface::instruction as system_instruction;

use crate::domain::{AppError, BlockchainError, TransferIntent, ValidationError};

/// A signed transfer ready for submission
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub transaction: Transaction,
    /// Fee payer and source of funds
    pub payer: Pubkey,
    pub destination: Pubkey,
    pub amount: u64,
    /// Blockhash the transaction was signed against
    pub checkpoint: Hash,
}

impl PreparedTransaction {
    /// The payer signature, which is also the transaction id
    pub fn signature(&self) -> Signature {
        self.transaction.signatures[0]
    }
}

/// Builds single-instruction SOL transfers paid by the source account
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionBuilder;

impl TransactionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode, validate and sign in one step
    pub fn build(
        &self,
        intent: &TransferIntent,
        checkpoint: Hash,
    ) -> Result<PreparedTransaction, AppError> {
        let source = keypair_from_base64(&intent.source_key)?;
        let destination = parse_address(&intent.destination)?;
        self.build_signed(&source, &destination, intent.amount, checkpoint)
    }

    /// Sign a transfer for an already-decoded source and destination
    pub fn build_signed(
        &self,
        source: &Keypair,
        destination: &Pubkey,
        amount: u64,
        checkpoint: Hash,
    ) -> Result<PreparedTransaction, AppError> {
        validate_amount(amount)?;

        let payer = source.pubkey();
        let instruction = system_instruction::transfer(&payer, destination, amount);
        let mut transaction = Transaction::new_with_payer(&[instruction], Some(&payer));
        transaction
            .try_sign(&[source], checkpoint)
            .map_err(|e| AppError::Blockchain(BlockchainError::Signing(e.to_string())))?;

        Ok(PreparedTransaction {
            transaction,
            payer,
            destination: *destination,
            amount,
            checkpoint,
        })
    }
}

/// Decode a base64 key into a Solana keypair.
///
/// Accepts a 32-byte ed25519 seed or a 64-byte keypair (seed followed by the
/// public key). A 64-byte keypair whose public half does not match the seed
/// is rejected.
pub fn keypair_from_base64(secret: &SecretString) -> Result<Keypair, ValidationError> {
    let key_bytes = Zeroizing::new(
        BASE64_STANDARD
            .decode(secret.expose_secret().trim())
            .map_err(|e| ValidationError::InvalidKey(format!("not valid base64: {}", e)))?,
    );

    let signing_key = match key_bytes.len() {
        32 => {
            let seed: [u8; 32] = key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| ValidationError::InvalidKey("invalid seed".to_string()))?;
            SigningKey::from_bytes(&seed)
        }
        64 => {
            let keypair: [u8; 64] = key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| ValidationError::InvalidKey("invalid keypair".to_string()))?;
            SigningKey::from_keypair_bytes(&keypair).map_err(|_| {
                ValidationError::InvalidKey(
                    "public key half does not match the secret seed".to_string(),
                )
            })?
        }
        n => {
            return Err(ValidationError::InvalidKey(format!(
                "expected 32 or 64 bytes, got {}",
                n
            )));
        }
    };

    let keypair_bytes = Zeroizing::new(signing_key.to_keypair_bytes());
    Keypair::try_from(keypair_bytes.as_slice())
        .map_err(|e| ValidationError::InvalidKey(format!("failed to create keypair: {}", e)))
}

/// Parse a base58 address into a public key
pub fn parse_address(address: &str) -> Result<Pubkey, ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidAddress("address is empty".to_string()));
    }

    let bytes = bs58::decode(trimmed)
        .into_vec()
        .map_err(|e| ValidationError::InvalidAddress(format!("'{}' is not base58: {}", trimmed, e)))?;

    let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        ValidationError::InvalidAddress(format!(
            "'{}' decodes to {} bytes, expected 32",
            trimmed,
            v.len()
        ))
    })?;

    Ok(Pubkey::new_from_array(array))
}

pub fn validate_amount(amount: u64) -> Result<(), ValidationError> {
    if amount == 0 {
        return Err(ValidationError::InvalidAmount(
            "amount must be greater than 0 lamports".to_string(),
        ));
    }
    Ok(())
}
