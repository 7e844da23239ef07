//! Infrastructure layer implementations.

pub mod blockchain;

pub use blockchain::{PubsubSlotSource, RpcGatewayConfig, RpcNetworkGateway};
