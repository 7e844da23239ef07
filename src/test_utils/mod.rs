//! Test doubles for the network gateway and slot source.

pub mod mocks;

pub use mocks::{
    MockGateway, MockLatency, MockSlotSource, test_intent, test_source_key,
};
