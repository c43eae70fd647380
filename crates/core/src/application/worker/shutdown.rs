// Worker Shutdown Token

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Shutdown signal for graceful termination
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal (also returns if the sender is gone)
    pub async fn wait(&mut self) {
        if self.is_shutdown() {
            return;
        }
        let _ = self.rx.changed().await;
    }

    /// Sleep for `duration` unless shutdown arrives first.
    /// Returns true when interrupted by shutdown.
    pub async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = sleep(duration) => false,
            _ = self.wait() => true,
        }
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all holders of a token
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_interrupted_by_shutdown() {
        let (tx, mut token) = shutdown_channel();
        let handle = tokio::spawn(async move { token.sleep_or_shutdown(Duration::from_secs(30)).await });
        tx.shutdown();
        let interrupted = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(interrupted);
    }

    #[tokio::test]
    async fn test_sleep_completes_without_shutdown() {
        let (_tx, mut token) = shutdown_channel();
        assert!(!token.sleep_or_shutdown(Duration::from_millis(5)).await);
        assert!(!token.is_shutdown());
    }

    #[tokio::test]
    async fn test_late_clone_sees_shutdown() {
        let (tx, token) = shutdown_channel();
        tx.shutdown();
        let mut late = token.clone();
        assert!(late.is_shutdown());
        late.wait().await;
    }
}
