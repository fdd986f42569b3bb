use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// Process-level stand-in for a device reset. Scheduling a restart shuts
/// the daemon down cleanly; the supervisor relaunches it, which re-reads
/// the persisted settings at boot.
#[derive(Clone)]
pub struct RestartHandle {
    tx: watch::Sender<bool>,
}

impl RestartHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Requests shutdown after `delay`, leaving time for an in-flight
    /// HTTP response to flush before the listener goes away.
    pub fn schedule(&self, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("restart requested, shutting down");
            let _ = tx.send(true);
        });
    }

    /// Resolves once a restart has been requested, however long ago.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_the_scheduled_delay() {
        let handle = RestartHandle::new();
        handle.schedule(Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("restart never fired");
    }

    #[tokio::test]
    async fn late_waiters_still_observe_the_request() {
        let handle = RestartHandle::new();
        handle.schedule(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("restart request was lost");
    }
}
