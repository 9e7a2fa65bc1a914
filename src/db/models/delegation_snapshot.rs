use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One observation of a delegator's balance with a validator.
///
/// Append-only: every hourly run writes a new row per delegation.
/// `change` is the difference to the previous row of the same
/// (validator, delegator) pair, or 0 for the first observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationSnapshot {
    pub id: i64,
    pub validator_address: String,
    pub delegator_address: String,
    /// Balance in the smallest denomination (e.g. uatom)
    pub amount: i64,
    pub change: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDelegationSnapshot {
    pub validator_address: String,
    pub delegator_address: String,
    pub amount: i64,
    pub change: i64,
    /// Stamped in the reference timezone
    pub timestamp: DateTime<FixedOffset>,
}

/// Newest snapshot amount of a (validator, delegator) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestSnapshot {
    pub validator_address: String,
    pub delegator_address: String,
    pub amount: i64,
}

/// Balance change of a new observation against the previous one.
///
/// The first observation of a pair is its baseline and carries no change.
pub fn balance_change(previous: Option<i64>, current: i64) -> i64 {
    match previous {
        Some(previous) => current.saturating_sub(previous),
        None => 0,
    }
}

/// Ordering of a delegator's history. Every order is newest/largest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySort {
    #[default]
    Date,
    Amount,
    Change,
}

impl HistorySort {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistorySort::Date => "date",
            HistorySort::Amount => "amount",
            HistorySort::Change => "change",
        }
    }
}

impl fmt::Display for HistorySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key {0:?}, expected one of: date, amount, change")]
pub struct ParseHistorySortError(pub String);

impl FromStr for HistorySort {
    type Err = ParseHistorySortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" | "timestamp" => Ok(HistorySort::Date),
            "amount" => Ok(HistorySort::Amount),
            "change" => Ok(HistorySort::Change),
            _ => Err(ParseHistorySortError(s.to_string())),
        }
    }
}
