//! Request parameters and response items of the read operations.
//!
//! Requests are part of the cache key, so their serialized form must stay
//! stable: field order is key order.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{DailyAggregate, DelegationSnapshot, HistorySort},
    utils::{format_date, format_timestamp, DATE_FORMAT},
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Page of a validator-wide listing (hourly snapshots or daily aggregates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPageRequest {
    pub validator_address: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl ValidatorPageRequest {
    pub fn new(validator_address: impl Into<String>) -> Self {
        Self {
            validator_address: validator_address.into(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn page(mut self, page: i64, limit: i64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }
}

pub type HourlySnapshotRequest = ValidatorPageRequest;
pub type DailySnapshotRequest = ValidatorPageRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorHistoryRequest {
    pub validator_address: String,
    pub delegator_address: String,
    #[serde(default)]
    pub sort_by: HistorySort,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl DelegatorHistoryRequest {
    pub fn new(validator_address: impl Into<String>, delegator_address: impl Into<String>) -> Self {
        Self {
            validator_address: validator_address.into(),
            delegator_address: delegator_address.into(),
            sort_by: HistorySort::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn sort_by(mut self, sort_by: HistorySort) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn page(mut self, page: i64, limit: i64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }
}

/// Hourly observation of one delegator. `address` is the delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlySnapshotItem {
    pub address: String,
    pub amount: i64,
    pub change: i64,
    pub date: String,
    pub timestamp: String,
}

impl HourlySnapshotItem {
    pub fn from_snapshot(snapshot: &DelegationSnapshot, offset: FixedOffset) -> Self {
        Self {
            address: snapshot.delegator_address.clone(),
            amount: snapshot.amount,
            change: snapshot.change,
            date: format_date(&snapshot.timestamp, offset),
            timestamp: format_timestamp(&snapshot.timestamp, offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshotItem {
    pub address: String,
    pub date: String,
    pub total: i64,
}

impl From<&DailyAggregate> for DailySnapshotItem {
    fn from(aggregate: &DailyAggregate) -> Self {
        Self {
            address: aggregate.delegator_address.clone(),
            date: aggregate.date.format(DATE_FORMAT).to_string(),
            total: aggregate.total_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorHistoryItem {
    pub timestamp: String,
    pub amount: i64,
    pub change: i64,
}

impl DelegatorHistoryItem {
    pub fn from_snapshot(snapshot: &DelegationSnapshot, offset: FixedOffset) -> Self {
        Self {
            timestamp: format_timestamp(&snapshot.timestamp, offset),
            amount: snapshot.amount,
            change: snapshot.change,
        }
    }
}
