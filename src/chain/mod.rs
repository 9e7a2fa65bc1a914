//! Chain-facing side: where current delegation balances come from.

mod cosmos;
mod reader;

pub use cosmos::CosmosRestReader;
pub use reader::{ChainReader, DelegationEntry};

#[cfg(test)]
pub(crate) use reader::MockChainReader;
