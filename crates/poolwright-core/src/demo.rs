//! Built-in demo workload

use std::time::Duration;

use serde_json::json;

use crate::task::TaskWork;

/// Seconds slept by [`sleep_task`] when no duration is given
pub const DEFAULT_DEMO_SECONDS: u64 = 5;

/// Sleep for `seconds`, then report how long it took
///
/// Stops early with an error if the task is cancelled mid-sleep, which
/// leaves the task `Cancelled`.
pub fn sleep_task(seconds: u64) -> TaskWork {
    TaskWork::from_async(move |ctx| async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                Ok(json!(format!("Task completed after {} seconds", seconds)))
            }
            _ = ctx.cancelled() => {
                anyhow::bail!("cancelled after start")
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskContext;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_task_reports_duration() {
        let ctx = TaskContext::new(Uuid::now_v7(), CancellationToken::new());
        let value = sleep_task(3).run(ctx).await.unwrap();
        assert_eq!(value, json!("Task completed after 3 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_task_stops_on_cancel() {
        let token = CancellationToken::new();
        let ctx = TaskContext::new(Uuid::now_v7(), token.clone());
        token.cancel();
        assert!(sleep_task(60).run(ctx).await.is_err());
    }
}
