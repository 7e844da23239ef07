//! Application layer: transaction assembly, per-transfer workers and the
//! runners that fan them out.

pub mod builder;
pub mod orchestrator;
pub mod poller;
pub mod shutdown;
pub mod trigger;
pub mod worker;

pub use builder::{PreparedTransaction, TransactionBuilder, keypair_from_base64, parse_address};
pub use orchestrator::{Orchestrator, pair_sources};
pub use poller::{ConfirmationPoller, PollPolicy, PollReport};
pub use shutdown::{Shutdown, ShutdownTrigger, shutdown_channel};
pub use trigger::SlotTrigger;
pub use worker::{TransferWorker, WorkerConfig};
