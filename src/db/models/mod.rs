mod daily_aggregate;
mod delegation_snapshot;

pub use daily_aggregate::{DailyAggregate, NewDailyAggregate};
pub use delegation_snapshot::{
    balance_change, DelegationSnapshot, HistorySort, LatestSnapshot, NewDelegationSnapshot,
    ParseHistorySortError,
};
