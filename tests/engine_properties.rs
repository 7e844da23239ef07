//! End-to-end behaviour of the transfer engine against a scripted gateway.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use solana_bulk_transfer::app::{
    Orchestrator, PollPolicy, WorkerConfig, pair_sources, shutdown_channel,
};
use solana_bulk_transfer::domain::{NetworkGateway, SignatureState, TransferOutcome};
use solana_bulk_transfer::test_utils::{MockGateway, test_intent, test_source_key};
use tokio::time::Instant;

fn orchestrator(gateway: &Arc<MockGateway>) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(gateway) as Arc<dyn NetworkGateway>,
        &WorkerConfig::default(),
    )
}

// ============================================================================
// ONE RESULT PER INTENT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_result_count_matches_intent_count() {
    for n in [0usize, 1, 7, 25] {
        let gateway = Arc::new(MockGateway::new());
        let (_trigger, shutdown) = shutdown_channel();
        let intents = (0..n).map(|_| test_intent(1_000).0).collect();

        let report = orchestrator(&gateway).run_all(intents, shutdown).await;

        assert_eq!(report.results.len(), n);
        assert_eq!(report.is_empty(), n == 0);
        let indices: Vec<_> = report.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..n).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_empty_batch_is_success() {
    let gateway = Arc::new(MockGateway::new());
    let (_trigger, shutdown) = shutdown_channel();

    let report = orchestrator(&gateway).run_all(vec![], shutdown).await;

    assert!(report.is_empty());
    assert!(report.stats().is_none());
    assert!(report.all_confirmed());
    assert_eq!(solana_bulk_transfer::report::exit_code(&report), 0);
}

// ============================================================================
// PER-INTENT FAILURES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_malformed_key_or_address_never_submits() {
    let gateway = Arc::new(MockGateway::new());
    let (_trigger, shutdown) = shutdown_channel();

    let (mut bad_key, _, _) = test_intent(1_000);
    bad_key.source_key = SecretString::from("!!!not-base64!!!");
    let (mut short_key, _, _) = test_intent(1_000);
    short_key.source_key = SecretString::from("AAAA");
    let (mut bad_address, _, _) = test_intent(1_000);
    bad_address.destination = "0OIl".to_string();
    let (mut short_address, _, _) = test_intent(1_000);
    short_address.destination = bs58::encode([1u8; 16]).into_string();

    let report = orchestrator(&gateway)
        .run_all(vec![bad_key, short_key, bad_address, short_address], shutdown)
        .await;

    for result in &report.results {
        assert!(
            matches!(result.outcome, TransferOutcome::PrecursorFailed(_)),
            "intent {} got {:?}",
            result.index,
            result.outcome
        );
        assert!(result.signature.is_none());
    }
    assert_eq!(gateway.submit_calls(), 0);
    assert_eq!(report.stats().unwrap().precursor_failed, 4);
}

#[tokio::test(start_paused = true)]
async fn test_one_bad_intent_does_not_affect_others() {
    let gateway = Arc::new(MockGateway::new());
    let (_trigger, shutdown) = shutdown_channel();
    let (good_a, _, _) = test_intent(1_000);
    let (mut bad, _, _) = test_intent(1_000);
    bad.destination = "nope".to_string();
    let (good_b, _, _) = test_intent(1_000);

    let report = orchestrator(&gateway)
        .run_all(vec![good_a, bad, good_b], shutdown)
        .await;

    assert_eq!(report.results[0].outcome, TransferOutcome::Confirmed);
    assert!(matches!(
        report.results[1].outcome,
        TransferOutcome::PrecursorFailed(_)
    ));
    assert_eq!(report.results[2].outcome, TransferOutcome::Confirmed);
    assert_eq!(gateway.submit_calls(), 2);
    assert_eq!(solana_bulk_transfer::report::exit_code(&report), 1);
}

// ============================================================================
// CONFIRMATION OUTCOMES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_confirmed_on_first_query_polls_once() {
    let gateway = Arc::new(MockGateway::new());
    let (_trigger, shutdown) = shutdown_channel();

    let report = orchestrator(&gateway)
        .run_all(vec![test_intent(1_000).0], shutdown)
        .await;

    assert_eq!(report.results[0].outcome, TransferOutcome::Confirmed);
    assert_eq!(gateway.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_never_observed_times_out_after_full_budget() {
    let gateway = Arc::new(MockGateway::new().never_confirming());
    let (_trigger, shutdown) = shutdown_channel();

    let report = orchestrator(&gateway)
        .run_all(vec![test_intent(1_000).0], shutdown)
        .await;

    let result = &report.results[0];
    assert_eq!(result.outcome, TransferOutcome::TimedOut);
    assert!(result.signature.is_some());
    assert_eq!(gateway.status_calls(), 20);
    assert!(result.elapsed >= Duration::from_millis(500) * 20);
    assert!(result.elapsed < Duration::from_millis(500) * 21);
}

#[tokio::test(start_paused = true)]
async fn test_custom_poll_budget_is_honoured() {
    let gateway = Arc::new(MockGateway::new().never_confirming());
    let (_trigger, shutdown) = shutdown_channel();
    let config = WorkerConfig {
        poll: PollPolicy {
            interval: Duration::from_millis(100),
            max_attempts: 5,
        },
        ..WorkerConfig::default()
    };
    let orchestrator = Orchestrator::new(Arc::clone(&gateway) as Arc<dyn NetworkGateway>, &config);

    let report = orchestrator.run_all(vec![test_intent(1).0], shutdown).await;

    assert_eq!(report.results[0].outcome, TransferOutcome::TimedOut);
    assert_eq!(gateway.status_calls(), 5);
    assert!(report.results[0].elapsed >= Duration::from_millis(500));
    assert!(report.results[0].elapsed < Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_on_chain_error_is_distinct_outcome() {
    let gateway = Arc::new(MockGateway::new().with_statuses(vec![
        SignatureState::Absent,
        SignatureState::Errored("InstructionError(0, Custom(1))".to_string()),
    ]));
    let (_trigger, shutdown) = shutdown_channel();

    let report = orchestrator(&gateway)
        .run_all(vec![test_intent(1_000).0], shutdown)
        .await;

    let outcome = &report.results[0].outcome;
    assert_eq!(
        *outcome,
        TransferOutcome::Rejected("InstructionError(0, Custom(1))".to_string())
    );
    assert_ne!(*outcome, TransferOutcome::TimedOut);
    assert!(!matches!(outcome, TransferOutcome::PrecursorFailed(_)));

    let stats = report.stats().unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.timed_out, 0);
    assert_eq!(stats.precursor_failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_status_query_failure_is_poll_error() {
    let gateway = Arc::new(MockGateway::new().with_status_failure("connection reset"));
    let (_trigger, shutdown) = shutdown_channel();

    let report = orchestrator(&gateway)
        .run_all(vec![test_intent(1_000).0], shutdown)
        .await;

    assert!(matches!(
        report.results[0].outcome,
        TransferOutcome::PollError(_)
    ));
    assert_eq!(gateway.status_calls(), 1);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_workers_run_in_parallel() {
    let gateway = Arc::new(
        MockGateway::new()
            .with_random_latency(Duration::from_millis(50), Duration::from_millis(800)),
    );
    let (_trigger, shutdown) = shutdown_channel();
    let intents = (0..20).map(|_| test_intent(1_000).0).collect();
    let start = Instant::now();

    let report = orchestrator(&gateway).run_all(intents, shutdown).await;
    let wall_clock = start.elapsed();

    let stats = report.stats().unwrap();
    assert_eq!(stats.confirmed, 20);
    let slowest = stats.max_elapsed.unwrap();

    // Closer to the slowest worker than to the serial sum
    assert!(wall_clock >= slowest);
    assert!(wall_clock < slowest + Duration::from_millis(100));
    assert!(wall_clock * 4 < stats.total_elapsed);
}

// ============================================================================
// PAIRING
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_extra_sources_all_pay_first_destination() {
    let gateway = Arc::new(MockGateway::new());
    let (_trigger, shutdown) = shutdown_channel();
    let sources: Vec<_> = (0..3).map(|_| test_source_key().0).collect();
    let (_, _, destination) = test_intent(1);
    let destinations = vec![destination.to_string()];

    let intents = pair_sources(sources, &destinations, 5_000).unwrap();
    let report = orchestrator(&gateway).run_all(intents, shutdown).await;

    assert_eq!(report.results.len(), 3);
    for result in &report.results {
        assert_eq!(result.destination.as_deref(), Some(destinations[0].as_str()));
        assert_eq!(result.amount, 5_000);
    }
    let submitted = gateway.submitted_destinations();
    assert_eq!(submitted.len(), 3);
    assert!(submitted.iter().all(|d| *d == destination));
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_poll_within_one_interval() {
    let gateway = Arc::new(MockGateway::new().never_confirming());
    let (trigger, shutdown) = shutdown_channel();
    let orchestrator = orchestrator(&gateway);
    let intents = (0..3).map(|_| test_intent(1_000).0).collect();

    let handle = tokio::spawn(async move { orchestrator.run_all(intents, shutdown).await });

    tokio::time::sleep(Duration::from_millis(1_250)).await;
    assert!(gateway.status_calls() >= 3);
    let cancelled_at = Instant::now();
    trigger.trigger();
    let report = handle.await.unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_millis(500));
    for result in &report.results {
        assert_eq!(result.outcome, TransferOutcome::Cancelled);
        // already submitted, so the signature is kept for reconciliation
        assert!(result.signature.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_submission_leaves_nothing_on_chain() {
    let gateway = Arc::new(MockGateway::new().with_fixed_latency(Duration::from_secs(10)));
    let (trigger, shutdown) = shutdown_channel();
    let orchestrator = orchestrator(&gateway);
    let intents = (0..4).map(|_| test_intent(1_000).0).collect();

    let handle = tokio::spawn(async move { orchestrator.run_all(intents, shutdown).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.trigger();
    let report = handle.await.unwrap();

    assert_eq!(report.results.len(), 4);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.outcome == TransferOutcome::Cancelled && r.signature.is_none())
    );
    assert_eq!(gateway.submit_calls(), 0);
}

#[tokio::test]
async fn test_unstarted_workers_never_touch_gateway() {
    let gateway = Arc::new(MockGateway::new());
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();
    let intents = (0..5).map(|_| test_intent(1_000).0).collect();

    let report = orchestrator(&gateway).run_all(intents, shutdown).await;

    assert_eq!(report.stats().unwrap().cancelled, 5);
    assert_eq!(gateway.total_calls(), 0);
}
