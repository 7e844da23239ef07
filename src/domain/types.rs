//! Domain types for transfer intents, outcomes and batch reports.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Serialize, Serializer};
use solana_commitment_config::CommitmentLevel;
use uuid::Uuid;

/// A single transfer instruction.
///
/// The source key stays encoded until a worker decodes it, so a malformed key
/// or address fails only its own transfer.
#[derive(Debug)]
pub struct TransferIntent {
    /// Base64-encoded ed25519 seed or keypair. Never logged.
    pub source_key: SecretString,
    /// Base58 destination address
    pub destination: String,
    /// Amount in lamports
    pub amount: u64,
}

impl TransferIntent {
    #[must_use]
    pub fn new(source_key: SecretString, destination: impl Into<String>, amount: u64) -> Self {
        Self {
            source_key,
            destination: destination.into(),
            amount,
        }
    }
}

/// Observed state of a submitted signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// Not yet seen by the cluster
    Absent,
    /// Landed without error
    Confirmed,
    /// Landed but failed execution
    Errored(String),
}

/// Options forwarded with every `sendTransaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: CommitmentLevel,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: CommitmentLevel::Finalized,
        }
    }
}

/// Terminal outcome of one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Transaction landed without error
    Confirmed,
    /// Transaction landed but failed on-chain
    Rejected(String),
    /// Confirmation not observed within the poll budget. The transfer may still land.
    TimedOut,
    /// Failed before or during submission; nothing reached the chain
    PrecursorFailed(String),
    /// A status query failed after a successful submission
    PollError(String),
    /// Stopped by shutdown
    Cancelled,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected(_) => "rejected",
            Self::TimedOut => "timed_out",
            Self::PrecursorFailed(_) => "precursor_failed",
            Self::PollError(_) => "poll_error",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected(r) | Self::PrecursorFailed(r) | Self::PollError(r) => Some(r),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.as_str(), reason),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

/// Terminal record for one intent. Exactly one exists per intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResult {
    /// Position of the originating intent in the batch
    pub index: usize,
    /// Source public key, once the key was decoded
    pub source: Option<String>,
    /// Destination public key, once the address was parsed
    pub destination: Option<String>,
    pub amount: u64,
    /// Present only when submission succeeded
    pub signature: Option<String>,
    pub outcome: TransferOutcome,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_duration_ms")]
    pub elapsed: Duration,
}

/// Aggregate statistics over a non-empty result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub timed_out: usize,
    pub precursor_failed: usize,
    pub poll_errors: usize,
    pub cancelled: usize,
    /// Sum of every worker's elapsed time
    #[serde(rename = "total_elapsed_ms", serialize_with = "serialize_duration_ms")]
    pub total_elapsed: Duration,
    /// Fastest confirmed transfer
    #[serde(rename = "min_elapsed_ms", serialize_with = "serialize_option_duration_ms")]
    pub min_elapsed: Option<Duration>,
    /// Slowest confirmed transfer
    #[serde(rename = "max_elapsed_ms", serialize_with = "serialize_option_duration_ms")]
    pub max_elapsed: Option<Duration>,
    #[serde(rename = "average_elapsed_ms", serialize_with = "serialize_duration_ms")]
    pub average_elapsed: Duration,
}

impl BatchStats {
    /// Returns `None` for an empty result set.
    pub fn from_results(results: &[TransferResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let mut stats = Self {
            total: results.len(),
            confirmed: 0,
            rejected: 0,
            timed_out: 0,
            precursor_failed: 0,
            poll_errors: 0,
            cancelled: 0,
            total_elapsed: Duration::ZERO,
            min_elapsed: None,
            max_elapsed: None,
            average_elapsed: Duration::ZERO,
        };

        for result in results {
            stats.total_elapsed += result.elapsed;
            match result.outcome {
                TransferOutcome::Confirmed => {
                    stats.confirmed += 1;
                    stats.min_elapsed = Some(
                        stats
                            .min_elapsed
                            .map_or(result.elapsed, |m| m.min(result.elapsed)),
                    );
                    stats.max_elapsed = Some(
                        stats
                            .max_elapsed
                            .map_or(result.elapsed, |m| m.max(result.elapsed)),
                    );
                }
                TransferOutcome::Rejected(_) => stats.rejected += 1,
                TransferOutcome::TimedOut => stats.timed_out += 1,
                TransferOutcome::PrecursorFailed(_) => stats.precursor_failed += 1,
                TransferOutcome::PollError(_) => stats.poll_errors += 1,
                TransferOutcome::Cancelled => stats.cancelled += 1,
            }
        }

        // total is non-zero here
        stats.average_elapsed =
            stats.total_elapsed / u32::try_from(stats.total).unwrap_or(u32::MAX);
        Some(stats)
    }

    pub fn failed(&self) -> usize {
        self.total - self.confirmed
    }
}

/// Summary section of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "stats", rename_all = "snake_case")]
pub enum BatchSummary {
    /// No intents were supplied
    Empty,
    Completed(BatchStats),
}

/// Outcome of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wall-clock time of the whole run
    #[serde(rename = "wall_clock_ms", serialize_with = "serialize_duration_ms")]
    pub wall_clock: Duration,
    /// Results in intent order
    pub results: Vec<TransferResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    #[must_use]
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        wall_clock: Duration,
        mut results: Vec<TransferResult>,
    ) -> Self {
        results.sort_by_key(|r| r.index);
        let summary = match BatchStats::from_results(&results) {
            Some(stats) => BatchSummary::Completed(stats),
            None => BatchSummary::Empty,
        };
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            wall_clock,
            results,
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.summary, BatchSummary::Empty)
    }

    /// True when every transfer confirmed. Vacuously true for an empty batch.
    pub fn all_confirmed(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_confirmed())
    }

    pub fn stats(&self) -> Option<&BatchStats> {
        match &self.summary {
            BatchSummary::Completed(stats) => Some(stats),
            BatchSummary::Empty => None,
        }
    }
}

fn serialize_duration_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn serialize_option_duration_ms<S: Serializer>(
    d: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}
