//! Concurrent bulk SOL transfers with per-transfer confirmation tracking.
//!
//! A batch of transfer intents is fanned out to one worker each. Every worker
//! fetches a blockhash, signs and submits its own transaction, then polls the
//! signature until it confirms, fails on-chain, or runs out of attempts. The
//! run ends with one result per intent and aggregate timing statistics.

pub mod app;
pub mod config;
pub mod domain;
pub mod infra;
pub mod report;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
