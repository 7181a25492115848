pub mod analysis_job;
pub mod cleanup_job;
pub mod reconciliation_job;

pub use analysis_job::{AnalysisJob, DuplicateAnalyzer};
pub use cleanup_job::CleanupJob;
pub use reconciliation_job::ReconciliationJob;

use crate::domain::ports::{Alert, Notifier};
use crate::utils::error::{InventoryError, Result};
use std::future::Future;
use std::time::Duration;

/// Bounds one store call.
pub(crate) async fn timed<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(InventoryError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

/// Alert delivery never fails a job.
pub(crate) async fn dispatch<I>(notifier: &dyn Notifier, alerts: I) -> usize
where
    I: IntoIterator<Item = Option<Alert>>,
{
    let mut sent = 0;
    for alert in alerts.into_iter().flatten() {
        match notifier.send(&alert).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::warn!("Failed to send '{}' alert: {}", alert.subject, e),
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_reports_operation_on_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        };
        let err = timed("count_by_value(L1)", Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        match err {
            InventoryError::Timeout { operation, .. } => assert_eq!(operation, "count_by_value(L1)"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timed_passes_result_through() {
        let value = timed("fast", Duration::from_secs(1), async { Ok::<_, InventoryError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
