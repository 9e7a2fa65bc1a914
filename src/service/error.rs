use thiserror::Error;

/// Status every failed read is reported with.
pub const UNPROCESSABLE_ENTITY: u16 = 422;

/// Failure of a read operation as reported to API callers.
#[derive(Debug, Error)]
#[error("{message} ({status})")]
pub struct AppError {
    pub status: u16,
    pub message: String,
    #[source]
    pub cause: anyhow::Error,
}

impl AppError {
    pub fn unprocessable(cause: anyhow::Error) -> Self {
        Self {
            status: UNPROCESSABLE_ENTITY,
            message: format!("{:#}", cause),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use anyhow::Context;

    use super::*;

    #[test]
    fn test_unprocessable_keeps_cause() {
        let cause = Err::<(), _>(anyhow::anyhow!("connection reset"))
            .context("Failed to count snapshots")
            .unwrap_err();
        let err = AppError::unprocessable(cause);

        assert_eq!(err.status, UNPROCESSABLE_ENTITY);
        assert_eq!(err.message, "Failed to count snapshots: connection reset");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Failed to count snapshots".to_string())
        );
        assert_eq!(
            err.to_string(),
            "Failed to count snapshots: connection reset (422)"
        );
    }
}
