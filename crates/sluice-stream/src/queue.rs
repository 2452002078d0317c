//! Bounded per-session queues between the worker and the multiplexer.

use sluice_common::{SluiceError, StreamSettings};
use tokio::sync::mpsc;

use crate::cancel::Cancellation;
use crate::message::Message;

/// Why an enqueue gave up without delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abandoned {
    /// Cancellation fired while waiting for capacity.
    Cancelled,
    /// The consumer is gone.
    Closed,
}

/// Producer half. Dropping it closes both queues.
#[derive(Debug)]
pub struct QueueSender {
    data: mpsc::Sender<Message>,
    errors: mpsc::Sender<SluiceError>,
}

/// Consumer half, owned by the multiplexer.
#[derive(Debug)]
pub struct QueueReceiver {
    pub(crate) data: mpsc::Receiver<Message>,
    pub(crate) errors: mpsc::Receiver<SluiceError>,
}

/// Create the data and error queues for one session.
pub fn session_queues(settings: &StreamSettings) -> (QueueSender, QueueReceiver) {
    let (data_tx, data_rx) = mpsc::channel(settings.data_capacity);
    let (error_tx, error_rx) = mpsc::channel(settings.error_capacity);
    (
        QueueSender {
            data: data_tx,
            errors: error_tx,
        },
        QueueReceiver {
            data: data_rx,
            errors: error_rx,
        },
    )
}

impl QueueSender {
    /// Enqueue a data message, waiting for capacity unless cancelled first.
    pub async fn send_data(&self, message: Message, cancel: &Cancellation) -> Result<(), Abandoned> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Abandoned::Cancelled),
            sent = self.data.send(message) => sent.map_err(|_| Abandoned::Closed),
        }
    }

    /// Enqueue a fatal fault. Dropped if the session is already cancelled.
    pub async fn send_fatal(&self, fault: SluiceError, cancel: &Cancellation) -> Result<(), Abandoned> {
        if cancel.is_fired() {
            return Err(Abandoned::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Abandoned::Cancelled),
            sent = self.errors.send(fault) => sent.map_err(|_| Abandoned::Closed),
        }
    }
}

impl QueueReceiver {
    pub async fn recv_data(&mut self) -> Option<Message> {
        self.data.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelReason;
    use std::time::Duration;

    fn tiny() -> StreamSettings {
        StreamSettings {
            data_capacity: 1,
            error_capacity: 1,
            ..StreamSettings::default()
        }
    }

    #[tokio::test]
    async fn blocked_send_is_released_by_cancellation() {
        let (tx, _rx) = session_queues(&tiny());
        let cancel = Cancellation::new();
        tx.send_data(Message::content("a", None, "1"), &cancel).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.fire(CancelReason::ClientDisconnected);
        });

        let blocked = tx.send_data(Message::content("a", None, "2"), &cancel);
        let outcome = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("send must not hang after cancellation");
        assert_eq!(outcome, Err(Abandoned::Cancelled));
    }

    #[tokio::test]
    async fn dropping_sender_closes_both_queues() {
        let (tx, mut rx) = session_queues(&tiny());
        drop(tx);
        assert!(rx.recv_data().await.is_none());
        assert!(rx.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn fatal_is_dropped_after_cancellation() {
        let (tx, mut rx) = session_queues(&tiny());
        let cancel = Cancellation::new();
        cancel.fire(CancelReason::Aborted);
        let sent = tx.send_fatal(SluiceError::internal("boom"), &cancel).await;
        assert_eq!(sent, Err(Abandoned::Cancelled));
        drop(tx);
        assert!(rx.errors.recv().await.is_none());
    }
}
