//! Mock implementations for testing.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use ed25519_dalek::SigningKey;
use rand::Rng;
use rand::rngs::OsRng;
use secrecy::SecretString;
use solana_commitment_config::CommitmentLevel;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::domain::{
    AppError, BlockchainError, NetworkGateway, SignatureState, SlotSource, SubmitOptions,
    TransferIntent,
};

/// Simulated per-call latency
#[derive(Debug, Clone, Copy, Default)]
pub enum MockLatency {
    #[default]
    None,
    Fixed(Duration),
    /// Uniformly random in `[min, max]`, drawn per call
    Random { min: Duration, max: Duration },
}

impl MockLatency {
    fn draw(&self) -> Option<Duration> {
        match *self {
            MockLatency::None => None,
            MockLatency::Fixed(d) => Some(d),
            MockLatency::Random { min, max } => {
                let ms = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis()) as u64;
                Some(Duration::from_millis(ms))
            }
        }
    }
}

/// Scriptable network gateway.
///
/// Defaults: blockhash and submission succeed, the first status query
/// reports `Confirmed`.
pub struct MockGateway {
    checkpoint_failure: Option<String>,
    submit_failure: Option<String>,
    status_failure: Option<String>,
    statuses: Mutex<VecDeque<SignatureState>>,
    fallback_status: SignatureState,
    latency: MockLatency,
    checkpoint_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    submitted: Mutex<Vec<Transaction>>,
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            checkpoint_failure: None,
            submit_failure: None,
            status_failure: None,
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: SignatureState::Confirmed,
            latency: MockLatency::None,
            checkpoint_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_checkpoint_failure(mut self, message: impl Into<String>) -> Self {
        self.checkpoint_failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_submit_failure(mut self, message: impl Into<String>) -> Self {
        self.submit_failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_status_failure(mut self, message: impl Into<String>) -> Self {
        self.status_failure = Some(message.into());
        self
    }

    /// Statuses returned in order before falling back to the default
    #[must_use]
    pub fn with_statuses(self, statuses: Vec<SignatureState>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    /// Status stays `Absent` forever
    #[must_use]
    pub fn never_confirming(mut self) -> Self {
        self.fallback_status = SignatureState::Absent;
        self
    }

    /// Status reports an on-chain error
    #[must_use]
    pub fn rejecting(mut self, reason: impl Into<String>) -> Self {
        self.fallback_status = SignatureState::Errored(reason.into());
        self
    }

    #[must_use]
    pub fn with_fixed_latency(mut self, latency: Duration) -> Self {
        self.latency = MockLatency::Fixed(latency);
        self
    }

    #[must_use]
    pub fn with_random_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = MockLatency::Random { min, max };
        self
    }

    pub fn checkpoint_calls(&self) -> usize {
        self.checkpoint_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.checkpoint_calls() + self.submit_calls() + self.status_calls()
    }

    /// Destination of each accepted transfer, in arrival order
    pub fn submitted_destinations(&self) -> Vec<Pubkey> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.message.account_keys[1])
            .collect()
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.latency.draw() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkGateway for MockGateway {
    async fn get_checkpoint(&self, _commitment: CommitmentLevel) -> Result<Hash, AppError> {
        self.checkpoint_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if let Some(msg) = &self.checkpoint_failure {
            return Err(AppError::Blockchain(BlockchainError::RpcError(msg.clone())));
        }
        Ok(Hash::new_from_array(rand::random()))
    }

    async fn submit(
        &self,
        transaction: &Transaction,
        _options: SubmitOptions,
    ) -> Result<Signature, AppError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if let Some(msg) = &self.submit_failure {
            return Err(AppError::Blockchain(BlockchainError::RpcError(msg.clone())));
        }
        self.submitted.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn get_status(&self, _signature: &Signature) -> Result<SignatureState, AppError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if let Some(msg) = &self.status_failure {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                msg.clone(),
            )));
        }
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback_status.clone()))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Slot source that emits a fixed list of slots
pub struct MockSlotSource {
    slots: Vec<u64>,
    interval: Duration,
    hold_open: bool,
    fail_subscribe: bool,
}

impl MockSlotSource {
    #[must_use]
    pub fn new(slots: Vec<u64>, interval: Duration) -> Self {
        Self {
            slots,
            interval,
            hold_open: false,
            fail_subscribe: false,
        }
    }

    /// Keep the stream open after the last slot until the receiver drops
    #[must_use]
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }
}

#[async_trait]
impl SlotSource for MockSlotSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<u64>, AppError> {
        if self.fail_subscribe {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                "Mock subscription refused".to_string(),
            )));
        }

        let (tx, rx) = mpsc::channel(16);
        let slots = self.slots.clone();
        let interval = self.interval;
        let hold_open = self.hold_open;
        tokio::spawn(async move {
            for slot in slots {
                tokio::time::sleep(interval).await;
                if tx.send(slot).await.is_err() {
                    return;
                }
            }
            if hold_open {
                tx.closed().await;
            }
        });
        Ok(rx)
    }
}

/// Fresh intent with a random source key and destination.
///
/// Returns the intent along with the source and destination public keys.
pub fn test_intent(amount: u64) -> (TransferIntent, Pubkey, Pubkey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let source = Pubkey::new_from_array(signing_key.verifying_key().to_bytes());
    let destination = Pubkey::new_from_array(rand::random());
    let intent = TransferIntent::new(
        SecretString::from(BASE64_STANDARD.encode(signing_key.to_bytes())),
        destination.to_string(),
        amount,
    );
    (intent, source, destination)
}

/// Base64 seed for a fresh key, with its public key
pub fn test_source_key() -> (SecretString, Pubkey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let pubkey = Pubkey::new_from_array(signing_key.verifying_key().to_bytes());
    (
        SecretString::from(BASE64_STANDARD.encode(signing_key.to_bytes())),
        pubkey,
    )
}
