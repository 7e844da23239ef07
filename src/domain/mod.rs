//! Domain layer containing core types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, BlockchainError, ConfigError, ValidationError};
pub use traits::{NetworkGateway, SlotSource};
pub use types::{
    BatchReport, BatchStats, BatchSummary, SignatureState, SubmitOptions, TransferIntent,
    TransferOutcome, TransferResult,
};
