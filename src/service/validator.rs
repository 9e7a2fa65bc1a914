use std::sync::Arc;

use anyhow::Context;
use chrono::FixedOffset;

use super::{
    dto::{
        DailySnapshotItem, DailySnapshotRequest, DelegatorHistoryItem, DelegatorHistoryRequest,
        HourlySnapshotItem, HourlySnapshotRequest,
    },
    offset, to_pagination, AppError, Pagination,
};
use crate::{
    cache::{namespace, CacheAside},
    db::SnapshotQueries,
};

/// Validator delegation views served through the read cache.
///
/// Read entry point for an external transport (an HTTP router, say); the
/// tracker binary itself only runs the write-side jobs.
///
/// On a miss each view loads its page and the total count concurrently.
/// Both calls always run to completion; if either failed the read fails with
/// 422 and nothing is cached.
#[derive(Clone)]
pub struct QueryService {
    queries: Arc<dyn SnapshotQueries>,
    cache: CacheAside,
    offset: FixedOffset,
}

impl QueryService {
    /// `offset` is the reference timezone dates are rendered in.
    pub fn new(queries: Arc<dyn SnapshotQueries>, cache: CacheAside, offset: FixedOffset) -> Self {
        Self {
            queries,
            cache,
            offset,
        }
    }

    pub async fn hourly_snapshots(
        &self,
        req: &HourlySnapshotRequest,
    ) -> Result<Pagination<HourlySnapshotItem>, AppError> {
        self.cache
            .get_or_set(namespace::HOURLY_SNAPSHOT, req, move || async move {
                let validator = req.validator_address.as_str();
                let (rows, total) = tokio::join!(
                    self.queries
                        .snapshots_by_validator(validator, req.limit, offset(req.page, req.limit)),
                    self.queries.count_snapshots_by_validator(validator),
                );

                let rows = rows
                    .with_context(|| format!("Failed to load hourly snapshots of {}", validator))
                    .map_err(AppError::unprocessable)?;
                let total = total
                    .with_context(|| format!("Failed to count hourly snapshots of {}", validator))
                    .map_err(AppError::unprocessable)?;

                let data = rows
                    .iter()
                    .map(|s| HourlySnapshotItem::from_snapshot(s, self.offset))
                    .collect();
                Ok::<_, AppError>(to_pagination(data, req.page, req.limit, total))
            })
            .await
    }

    pub async fn daily_snapshots(
        &self,
        req: &DailySnapshotRequest,
    ) -> Result<Pagination<DailySnapshotItem>, AppError> {
        self.cache
            .get_or_set(namespace::DAILY_SNAPSHOT, req, move || async move {
                let validator = req.validator_address.as_str();
                let (rows, total) = tokio::join!(
                    self.queries.daily_aggregates_by_validator(
                        validator,
                        req.limit,
                        offset(req.page, req.limit)
                    ),
                    self.queries.count_daily_aggregates_by_validator(validator),
                );

                let rows = rows
                    .with_context(|| format!("Failed to load daily aggregates of {}", validator))
                    .map_err(AppError::unprocessable)?;
                let total = total
                    .with_context(|| format!("Failed to count daily aggregates of {}", validator))
                    .map_err(AppError::unprocessable)?;

                let data = rows.iter().map(DailySnapshotItem::from).collect();
                Ok::<_, AppError>(to_pagination(data, req.page, req.limit, total))
            })
            .await
    }

    pub async fn delegator_history(
        &self,
        req: &DelegatorHistoryRequest,
    ) -> Result<Pagination<DelegatorHistoryItem>, AppError> {
        self.cache
            .get_or_set(namespace::DELEGATOR_HISTORY, req, move || async move {
                let validator = req.validator_address.as_str();
                let delegator = req.delegator_address.as_str();
                let (rows, total) = tokio::join!(
                    self.queries.delegator_history(
                        validator,
                        delegator,
                        req.sort_by,
                        req.limit,
                        offset(req.page, req.limit)
                    ),
                    self.queries.count_delegator_history(validator, delegator),
                );

                let rows = rows
                    .with_context(|| {
                        format!("Failed to load history of {} with {}", delegator, validator)
                    })
                    .map_err(AppError::unprocessable)?;
                let total = total
                    .with_context(|| {
                        format!("Failed to count history of {} with {}", delegator, validator)
                    })
                    .map_err(AppError::unprocessable)?;

                let data = rows
                    .iter()
                    .map(|s| DelegatorHistoryItem::from_snapshot(s, self.offset))
                    .collect();
                Ok::<_, AppError>(to_pagination(data, req.page, req.limit, total))
            })
            .await
    }
}
