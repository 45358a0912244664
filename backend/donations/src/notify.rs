//! Post-commit notifications.
//!
//! Ledger transitions push messages onto a bounded channel after their
//! transaction commits; a background worker hands them to a [`Notifier`].
//! Nothing here can fail or delay the transition that produced the message.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::DonationType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    DonationConfirmed {
        donation_id: String,
        donor_email: String,
        donor_name: Option<String>,
        amount: i64,
        currency: String,
        campaign_title: Option<String>,
        receipt_code: Option<String>,
        method: DonationType,
    },
}

/// Delivery backend (e-mail, chat, …).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log. Used when no delivery backend is wired in.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            "notification: {}",
            serde_json::to_string(notification).unwrap_or_default()
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue without waiting. A full or closed queue drops the message.
    pub fn publish(&self, notification: Notification) {
        if let Err(e) = self.sender.try_send(notification) {
            warn!("Dropping notification: {e}");
        }
    }
}

/// Drain the queue until every sender is gone.
pub async fn run(mut receiver: mpsc::Receiver<Notification>, notifier: Arc<dyn Notifier>) {
    while let Some(notification) = receiver.recv().await {
        if let Err(e) = notifier.deliver(&notification).await {
            warn!("Notification delivery failed: {e:#}");
        }
    }
    info!("Notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample(id: &str) -> Notification {
        Notification::DonationConfirmed {
            donation_id: id.to_string(),
            donor_email: "d@example.org".into(),
            donor_name: None,
            amount: 1_000,
            currency: "NGN".into(),
            campaign_title: Some("Roof".into()),
            receipt_code: None,
            method: DonationType::Online,
        }
    }

    struct Flaky {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Notifier for Flaky {
        async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
            let Notification::DonationConfirmed { donation_id, .. } = notification;
            self.seen.lock().unwrap().push(donation_id.clone());
            if donation_id == "bad" {
                anyhow::bail!("smtp down");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_survives_delivery_failures() {
        let (queue, rx) = NotificationQueue::new(8);
        let notifier = Arc::new(Flaky {
            seen: Mutex::new(Vec::new()),
        });

        queue.publish(sample("bad"));
        queue.publish(sample("good"));
        drop(queue);

        run(rx, notifier.clone()).await;
        assert_eq!(*notifier.seen.lock().unwrap(), vec!["bad", "good"]);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (queue, mut rx) = NotificationQueue::new(1);
        queue.publish(sample("first"));
        queue.publish(sample("second"));

        assert_eq!(rx.recv().await, Some(sample("first")));
        assert!(rx.try_recv().is_err());
    }
}
