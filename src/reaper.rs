use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that periodically drops finished, cancelled and
/// idle sessions from memory. They stay in the store and reload on demand.
pub fn spawn_session_reaper(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let reaped = state.reap_sessions().await;
            if reaped > 0 {
                tracing::info!(
                    "Reaped {} sessions, {} still loaded",
                    reaped,
                    state.session_count().await
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameConfig;

    #[tokio::test]
    async fn test_reaper_evicts_cancelled_sessions() {
        let state = Arc::new(AppState::in_memory(GameConfig::default()));
        let code = state.create_session(None).await.unwrap();
        state.create_session(None).await.unwrap();
        state.cancel(&code).await.unwrap();

        spawn_session_reaper(state.clone(), Duration::from_millis(20));

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while state.session_count().await > 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok());
        assert!(!state.sessions.read().await.contains_key(&code));
    }
}
