//! Slot-driven runner: one transfer per observed slot, never overlapping.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::app::shutdown::{Shutdown, shutdown_channel};
use crate::app::worker::TransferWorker;
use crate::domain::{
    AppError, BatchReport, SlotSource, TransferIntent, TransferOutcome, TransferResult,
};

pub struct SlotTrigger {
    source: Arc<dyn SlotSource>,
    worker: Arc<TransferWorker>,
    max_transfers: Option<usize>,
}

impl SlotTrigger {
    #[must_use]
    pub fn new(
        source: Arc<dyn SlotSource>,
        worker: Arc<TransferWorker>,
        max_transfers: Option<usize>,
    ) -> Self {
        Self {
            source,
            worker,
            max_transfers,
        }
    }

    /// Start a transfer of `intent` on each new slot.
    ///
    /// Slots arriving while a transfer is in flight are skipped. A closed
    /// slot stream cancels the in-flight transfer just like `shutdown` does.
    /// Reaching `max_transfers` lets the last transfer finish normally.
    pub async fn run(
        &self,
        intent: Arc<TransferIntent>,
        mut shutdown: Shutdown,
    ) -> Result<BatchReport, AppError> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let start = Instant::now();
        let span = info_span!("slot_trigger", run_id = %run_id);

        let mut slots = self.source.subscribe().await?;
        span.in_scope(|| info!(max_transfers = ?self.max_transfers, "Subscribed to slot updates"));

        // Fires on outer shutdown or when the slot stream closes
        let (stop, worker_shutdown) = shutdown_channel();
        let mut in_flight: JoinSet<TransferResult> = JoinSet::new();
        let mut in_flight_index = None;
        let mut results = Vec::new();
        let mut started = 0usize;

        loop {
            let limit_reached = self.max_transfers.is_some_and(|max| started >= max);
            if limit_reached && in_flight.is_empty() {
                span.in_scope(|| info!(started, "Transfer limit reached"));
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    span.in_scope(|| info!("Shutdown requested, stopping slot trigger"));
                    stop.trigger();
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    let index = in_flight_index.take().unwrap_or(started.saturating_sub(1));
                    results.push(collect(index, intent.amount, joined));
                }
                slot = slots.recv(), if !limit_reached => {
                    let Some(slot) = slot else {
                        span.in_scope(|| info!("Slot stream closed, cancelling in-flight transfer"));
                        stop.trigger();
                        break;
                    };
                    if !in_flight.is_empty() {
                        debug!(parent: &span, slot, "Transfer still in flight, skipping slot");
                        continue;
                    }

                    let index = started;
                    started += 1;
                    in_flight_index = Some(index);
                    debug!(parent: &span, slot, index, "Slot observed, starting transfer");

                    let worker = Arc::clone(&self.worker);
                    let intent = Arc::clone(&intent);
                    let shutdown = worker_shutdown.clone();
                    in_flight.spawn(
                        async move { worker.run(index, &intent, shutdown).await }
                            .instrument(info_span!(parent: &span, "transfer", index, slot)),
                    );
                }
            }
        }

        // Workers observe `stop` within one poll interval
        while let Some(joined) = in_flight.join_next().await {
            let index = in_flight_index.take().unwrap_or(started.saturating_sub(1));
            results.push(collect(index, intent.amount, joined));
        }

        let report = BatchReport::new(run_id, started_at, start.elapsed(), results);
        span.in_scope(|| {
            info!(
                transfers = report.results.len(),
                all_confirmed = report.all_confirmed(),
                "Slot trigger finished"
            )
        });
        Ok(report)
    }
}

fn collect(
    index: usize,
    amount: u64,
    joined: Result<TransferResult, tokio::task::JoinError>,
) -> TransferResult {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!(index, error = %e, "Transfer worker lost");
            TransferResult {
                index,
                source: None,
                destination: None,
                amount,
                signature: None,
                outcome: TransferOutcome::PrecursorFailed(format!("worker aborted: {}", e)),
                elapsed: std::time::Duration::ZERO,
            }
        }
    }
}
