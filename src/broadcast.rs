use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn a background task that deletes sessions idle for longer than
/// `max_idle`, checking every `every`
pub fn spawn_idle_sweeper(
    state: Arc<AppState>,
    max_idle: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let removed = state.sweep_idle(max_idle).await;
            if !removed.is_empty() {
                tracing::info!(
                    "Idle sweep removed {} session(s), {} remain",
                    removed.len(),
                    state.session_count().await
                );
            }
        }
    })
}
