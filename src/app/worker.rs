//! End-to-end pipeline for one transfer: validate, fetch blockhash, sign,
//! submit, poll.

use std::sync::Arc;

use solana_commitment_config::CommitmentLevel;
use solana_sdk::signer::Signer;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::app::builder::{TransactionBuilder, keypair_from_base64, parse_address, validate_amount};
use crate::app::poller::{ConfirmationPoller, PollPolicy};
use crate::app::shutdown::Shutdown;
use crate::domain::{NetworkGateway, SubmitOptions, TransferIntent, TransferOutcome, TransferResult};

/// Per-transfer settings shared by every worker in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub poll: PollPolicy,
    /// Commitment used when fetching the blockhash
    pub checkpoint_commitment: CommitmentLevel,
    pub submit: SubmitOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            checkpoint_commitment: CommitmentLevel::Finalized,
            submit: SubmitOptions::default(),
        }
    }
}

/// Fields of a result that fill in as the pipeline advances
struct Progress {
    index: usize,
    amount: u64,
    source: Option<String>,
    destination: Option<String>,
    signature: Option<String>,
    started: Instant,
}

impl Progress {
    fn finish(self, outcome: TransferOutcome) -> TransferResult {
        TransferResult {
            index: self.index,
            source: self.source,
            destination: self.destination,
            amount: self.amount,
            signature: self.signature,
            outcome,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Runs one intent to a terminal result. Never resubmits.
pub struct TransferWorker {
    gateway: Arc<dyn NetworkGateway>,
    builder: TransactionBuilder,
    poller: ConfirmationPoller,
    config: WorkerConfig,
}

impl TransferWorker {
    #[must_use]
    pub fn new(gateway: Arc<dyn NetworkGateway>, config: WorkerConfig) -> Self {
        Self {
            gateway,
            builder: TransactionBuilder::new(),
            poller: ConfirmationPoller::new(config.poll),
            config,
        }
    }

    /// Every path through here produces exactly one `TransferResult`.
    #[instrument(skip(self, intent, shutdown), fields(amount = intent.amount))]
    pub async fn run(
        &self,
        index: usize,
        intent: &TransferIntent,
        mut shutdown: Shutdown,
    ) -> TransferResult {
        let mut progress = Progress {
            index,
            amount: intent.amount,
            source: None,
            destination: None,
            signature: None,
            started: Instant::now(),
        };

        if shutdown.is_triggered() {
            debug!("Shutdown before start, skipping transfer");
            return progress.finish(TransferOutcome::Cancelled);
        }

        let source = match keypair_from_base64(&intent.source_key) {
            Ok(keypair) => keypair,
            Err(e) => {
                warn!(error = %e, "Source key rejected");
                return progress.finish(TransferOutcome::PrecursorFailed(e.to_string()));
            }
        };
        progress.source = Some(source.pubkey().to_string());

        let destination = match parse_address(&intent.destination) {
            Ok(pubkey) => pubkey,
            Err(e) => {
                warn!(error = %e, "Destination rejected");
                return progress.finish(TransferOutcome::PrecursorFailed(e.to_string()));
            }
        };
        progress.destination = Some(destination.to_string());

        if let Err(e) = validate_amount(intent.amount) {
            warn!(error = %e, "Amount rejected");
            return progress.finish(TransferOutcome::PrecursorFailed(e.to_string()));
        }

        let checkpoint = tokio::select! {
            checkpoint = self.gateway.get_checkpoint(self.config.checkpoint_commitment) => checkpoint,
            _ = shutdown.triggered() => {
                return progress.finish(TransferOutcome::Cancelled);
            }
        };
        let checkpoint = match checkpoint {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "Blockhash fetch failed");
                return progress.finish(TransferOutcome::PrecursorFailed(format!(
                    "checkpoint fetch failed: {}",
                    e
                )));
            }
        };

        let prepared = match self
            .builder
            .build_signed(&source, &destination, intent.amount, checkpoint)
        {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "Transaction build failed");
                return progress.finish(TransferOutcome::PrecursorFailed(e.to_string()));
            }
        };

        // Last point where stopping leaves nothing on-chain
        if shutdown.is_triggered() {
            return progress.finish(TransferOutcome::Cancelled);
        }

        // The payer signature is the transaction id, known before sending
        let signature = prepared.signature();
        progress.signature = Some(signature.to_string());

        let submitted = tokio::select! {
            submitted = self.gateway.submit(&prepared.transaction, self.config.submit) => submitted,
            _ = shutdown.triggered() => {
                warn!(signature = %signature, "Shutdown during submission, transaction may still land");
                return progress.finish(TransferOutcome::Cancelled);
            }
        };
        if let Err(e) = submitted {
            warn!(error = %e, "Submission failed");
            progress.signature = None;
            return progress.finish(TransferOutcome::PrecursorFailed(format!(
                "submission rejected: {}",
                e
            )));
        }
        info!(
            signature = %signature,
            from = %prepared.payer,
            to = %prepared.destination,
            "Transaction submitted"
        );

        let report = self
            .poller
            .poll(self.gateway.as_ref(), &signature, &mut shutdown)
            .await;
        progress.finish(report.outcome)
    }
}
