//! Fixed-interval confirmation polling for a submitted transaction.
//!
//! Polling only reads status. A transaction is never resubmitted from here.

use std::time::Duration;

use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::app::shutdown::Shutdown;
use crate::domain::{NetworkGateway, SignatureState, TransferOutcome};

/// Default wait between status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of status queries before giving up
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 20;

/// Retry budget for one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Terminal poll result and the number of status queries it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: TransferOutcome,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationPoller {
    policy: PollPolicy,
}

impl ConfirmationPoller {
    #[must_use]
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Query status until a terminal state, budget exhaustion, or shutdown.
    ///
    /// Each attempt is one status query followed by one interval wait, so an
    /// exhausted budget takes `max_attempts * interval`. Shutdown is observed
    /// during both the query and the wait.
    pub async fn poll(
        &self,
        gateway: &dyn NetworkGateway,
        signature: &Signature,
        shutdown: &mut Shutdown,
    ) -> PollReport {
        let mut attempts = 0;

        while attempts < self.policy.max_attempts {
            if shutdown.is_triggered() {
                return self.report(TransferOutcome::Cancelled, attempts);
            }
            attempts += 1;

            let status = tokio::select! {
                status = gateway.get_status(signature) => status,
                _ = shutdown.triggered() => {
                    return self.report(TransferOutcome::Cancelled, attempts);
                }
            };

            match status {
                Ok(SignatureState::Confirmed) => {
                    info!(signature = %signature, attempts, "Transaction confirmed");
                    return self.report(TransferOutcome::Confirmed, attempts);
                }
                Ok(SignatureState::Errored(reason)) => {
                    warn!(signature = %signature, attempts, reason = %reason, "Transaction failed on-chain");
                    return self.report(TransferOutcome::Rejected(reason), attempts);
                }
                Ok(SignatureState::Absent) => {
                    debug!(signature = %signature, attempts, "Transaction not yet observed");
                }
                Err(e) => {
                    warn!(signature = %signature, attempts, error = %e, "Status query failed");
                    return self.report(
                        TransferOutcome::PollError(format!("status query failed: {}", e)),
                        attempts,
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                _ = shutdown.triggered() => {
                    return self.report(TransferOutcome::Cancelled, attempts);
                }
            }
        }

        warn!(
            signature = %signature,
            attempts,
            "Confirmation not observed within poll budget"
        );
        self.report(TransferOutcome::TimedOut, attempts)
    }

    fn report(&self, outcome: TransferOutcome, attempts: u32) -> PollReport {
        PollReport { outcome, attempts }
    }
}
