use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily rollup of a delegator's latest known balance with a validator.
///
/// Population: the daily job copies the amount of the newest snapshot of
/// every (validator, delegator) pair. Rows are appended, never updated, so a
/// second run on the same day produces a second row for that date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub id: i64,
    pub validator_address: String,
    pub delegator_address: String,
    pub date: NaiveDate,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDailyAggregate {
    pub validator_address: String,
    pub delegator_address: String,
    pub date: NaiveDate,
    pub total_amount: i64,
}
