//! Outbound notifications.
//!
//! Services publish a [`Notification`] after their transaction commits. A
//! background worker hands each message to a [`Notifier`]. Delivery failures
//! are logged and never reach the operation that published the message.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use userverse_core::{CompanyId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    UserRegistered {
        user_id: UserId,
        email: String,
        display_name: String,
    },
    CompanyInvite {
        company_id: CompanyId,
        company_name: Option<String>,
        email: String,
        role_name: String,
        invited_by: String,
    },
    PasswordResetRequested {
        user_id: UserId,
        email: String,
        otp: String,
    },
    RoleDeleted {
        company_id: CompanyId,
        role_name: String,
        replacement_role_name: String,
        users_reassigned: u64,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::UserRegistered { .. } => "user_registered",
            Notification::CompanyInvite { .. } => "company_invite",
            Notification::PasswordResetRequested { .. } => "password_reset_requested",
            Notification::RoleDeleted { .. } => "role_deleted",
        }
    }
}

/// Delivery backend (email, webhook, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Records notifications through `tracing` instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        // One-time passwords stay out of the logs.
        let target = match notification {
            Notification::UserRegistered { email, .. }
            | Notification::CompanyInvite { email, .. }
            | Notification::PasswordResetRequested { email, .. } => Some(email.as_str()),
            Notification::RoleDeleted { .. } => None,
        };
        info!(kind = notification.kind(), recipient = ?target, "notification delivered");
        Ok(())
    }
}

/// Publishing side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// A queue plus its receiving end, for callers that drain it themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A queue drained by a background task delivering to `notifier`.
    pub fn spawn(notifier: Arc<dyn Notifier>) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel();
        let handle = tokio::spawn(run_worker(rx, notifier));
        (queue, handle)
    }

    /// Fire-and-forget. A closed queue is logged, not reported.
    pub fn publish(&self, notification: Notification) {
        let kind = notification.kind();
        if self.tx.send(notification).is_err() {
            warn!(kind, "notification queue closed; message dropped");
        }
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Notification>, notifier: Arc<dyn Notifier>) {
    while let Some(notification) = rx.recv().await {
        if let Err(e) = notifier.deliver(&notification).await {
            warn!(kind = notification.kind(), error = %e, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Flaky {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Notifier for Flaky {
        async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(notification.kind());
            anyhow::bail!("smtp down")
        }
    }

    fn registered() -> Notification {
        Notification::UserRegistered {
            user_id: UserId::new(),
            email: "a@x.com".into(),
            display_name: "Ada".into(),
        }
    }

    #[tokio::test]
    async fn worker_survives_delivery_failures() {
        let notifier = Arc::new(Flaky::default());
        let (queue, handle) = NotificationQueue::spawn(notifier.clone());

        queue.publish(registered());
        queue.publish(registered());
        drop(queue);
        handle.await.unwrap();

        assert_eq!(notifier.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn publishing_to_closed_queue_does_not_panic() {
        let (queue, rx) = NotificationQueue::channel();
        drop(rx);
        queue.publish(registered());
    }

    #[test]
    fn serialises_with_kind_tag() {
        let json = serde_json::to_value(registered()).unwrap();
        assert_eq!(json["kind"], "user_registered");
    }
}
