//! Cancellable repeating triggers that feed the coordinator's event channel.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sends an event on every tick until cancelled, dropped, or the channel closes.
///
/// The first tick fires immediately.
pub struct RepeatingTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    pub fn spawn<E, F>(
        name: &'static str,
        period: Duration,
        tx: mpsc::UnboundedSender<E>,
        event: F,
    ) -> Self
    where
        E: Send + 'static,
        F: Fn() -> E + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if tx.send(event()).is_err() {
                            tracing::debug!("{} task stopping: channel closed", name);
                            break;
                        }
                    }
                    _ = &mut cancel_rx => {
                        tracing::debug!("{} task cancelled", name);
                        break;
                    }
                }
            }
        });

        Self {
            cancel: Some(cancel_tx),
            handle,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut task = RepeatingTask::spawn("test", Duration::from_millis(10), tx, || 7u8);

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, Some(7));

        task.cancel();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !task.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drop_stops_task_and_closes_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = RepeatingTask::spawn("test", Duration::from_millis(10), tx, || ());
        assert_eq!(rx.recv().await, Some(()));

        drop(task);

        // Once the task exits its sender is dropped and recv drains to None.
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let task = RepeatingTask::spawn("test", Duration::from_millis(10), tx, || ());
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !task.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
