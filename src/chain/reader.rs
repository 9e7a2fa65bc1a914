use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Current delegation of one delegator to one validator as reported by the
/// chain. `amount` is the balance in the smallest denomination, still as the
/// decimal string the chain returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub validator_address: String,
    pub delegator_address: String,
    pub denom: String,
    pub amount: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
/// Source of current delegation balances for the tracked validators.
///
/// Network backed and unreliable: callers treat every error as a failed
/// attempt.
pub trait ChainReader: Send + Sync {
    async fn fetch_delegations(&self) -> anyhow::Result<Vec<DelegationEntry>>;
}
