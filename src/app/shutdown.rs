//! Cancellation signal shared by every in-flight worker.

use tokio::sync::watch;

/// Sending half, held by whoever decides to stop the run
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace succeeds even when every receiver is gone
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half, cloned into each worker
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered. Never resolves if the trigger is
    /// dropped without firing.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_all_subscribers() {
        let (trigger, shutdown) = shutdown_channel();
        let mut a = shutdown.clone();
        let mut b = trigger.subscribe();
        assert!(!a.is_triggered());

        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), a.triggered())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), b.triggered())
            .await
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_subscriber_created_after_trigger_sees_it() {
        let (trigger, _shutdown) = shutdown_channel();
        trigger.trigger();
        let late = trigger.subscribe();
        assert!(late.is_triggered());
    }

    #[test]
    fn test_waiter_is_woken_by_trigger() {
        let (trigger, mut shutdown) = shutdown_channel();
        let mut waiting = tokio_test::task::spawn(shutdown.triggered());
        tokio_test::assert_pending!(waiting.poll());

        trigger.trigger();

        assert!(waiting.is_woken());
        tokio_test::assert_ready!(waiting.poll());
    }

    #[test]
    fn test_never_stays_pending() {
        let mut never = Shutdown::never();
        let mut waiting = tokio_test::task::spawn(never.triggered());
        tokio_test::assert_pending!(waiting.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_never_fires() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);
        let waited = tokio::time::timeout(Duration::from_secs(5), shutdown.triggered()).await;
        assert!(waited.is_err());
        assert!(!shutdown.is_triggered());
    }
}
