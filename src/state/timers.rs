use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use super::AppState;
use crate::host::HostAction;

impl AppState {
    /// Queue `action` for the timer pump after `delay`
    pub(super) fn spawn_timer(&self, delay: Duration, action: HostAction) -> AbortHandle {
        let tx = self.timer_tx.clone();
        tracing::debug!("{} scheduled in {:?}", action.name(), delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(action).is_err() {
                tracing::warn!("Timer fired but the timer pump is gone");
            }
        })
        .abort_handle()
    }
}

/// Spawn the background task that feeds fired timers back into the lobby.
///
/// Timer actions carry the round they were armed for, so one that fires
/// after the round moved on is rejected by the reducer and dropped here.
pub fn spawn_timer_pump(state: Arc<AppState>) {
    tokio::spawn(async move {
        let Some(mut rx) = state.timer_rx.lock().await.take() else {
            tracing::warn!("Timer pump already running");
            return;
        };

        while let Some(action) = rx.recv().await {
            let name = action.name();
            if let Err(e) = state.dispatch(action, None).await {
                tracing::debug!("Timer {} ignored: {}", name, e);
            }
        }
    });
}
