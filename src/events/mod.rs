use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::LineId;

/// Domain events published by the quotation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    QuotationOpened(i64),
    LineAdded {
        quotation_id: i64,
        line_id: LineId,
        merged: bool,
    },
    LineRemoved {
        quotation_id: i64,
        line_id: LineId,
    },
    LineRestored {
        quotation_id: i64,
        line_id: LineId,
    },
    QuotationSaved {
        quotation_id: i64,
        line_count: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when nobody is listening.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Creates an event channel with the given buffer capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (sender, mut rx) = channel(8);
        sender.send_or_log(Event::QuotationOpened(3)).await;
        sender
            .send_or_log(Event::QuotationSaved {
                quotation_id: 3,
                line_count: 2,
            })
            .await;

        assert!(matches!(rx.recv().await, Some(Event::QuotationOpened(3))));
        assert!(matches!(
            rx.recv().await,
            Some(Event::QuotationSaved { quotation_id: 3, line_count: 2 })
        ));
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_receiver() {
        let (sender, rx) = channel(1);
        drop(rx);
        // Must not panic.
        sender.send_or_log(Event::QuotationOpened(1)).await;
    }
}
