//! Solana network implementations of the domain gateway traits.

pub mod pubsub;
pub mod solana;

pub use pubsub::PubsubSlotSource;
pub use solana::{RpcGatewayConfig, RpcNetworkGateway};
