//! Chain module - RPC adapter and token call helpers

pub mod erc20;
pub mod provider;

pub use provider::{ChainProvider, ChainRpc};
