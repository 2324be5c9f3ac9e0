//! Cooperative shutdown signal shared by every wait in the control loop

use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Sender half, flipped once by the signal handler
pub type ShutdownTrigger = watch::Sender<bool>;

/// Receiver half held by the loop
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Create a connected trigger/signal pair
    pub fn channel() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `delay` unless shutdown is requested first
    /// Returns true if sleep completed, false if shutdown requested
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        if self.is_requested() {
            return false;
        }

        let deadline = tokio::time::sleep(delay);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return true,
                changed = self.rx.changed() => match changed {
                    Ok(()) if *self.rx.borrow() => {
                        info!("Shutdown signal received during wait");
                        return false;
                    }
                    Ok(()) => continue,
                    // Trigger dropped: nobody can request shutdown any more
                    Err(_) => {
                        (&mut deadline).await;
                        return true;
                    }
                },
            }
        }
    }
}
