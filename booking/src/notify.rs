//! Notification boundary.
//!
//! Email and push delivery live outside this crate. Committed hold
//! transitions hand a [`HoldNotification`] to whatever [`Notifier`] the
//! environment carries; a failed delivery is logged and never undoes the
//! transition.

use crate::types::{EventId, HoldId, UserId};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happened to the hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Hold placed
    HoldCreated,
    /// Organizer confirmed
    HoldConfirmed,
    /// Administrator approved; event published
    HoldApproved,
    /// Hold cancelled
    HoldCancelled,
    /// Expiry pushed back
    HoldExtended,
    /// Hold aged out
    HoldExpired,
}

/// Message for the hold's organizer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldNotification {
    /// What happened
    pub kind: NotificationKind,
    /// The hold
    pub hold_id: HoldId,
    /// Its event
    pub event_id: EventId,
    /// Recipient (the hold's creator)
    pub recipient: UserId,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Delivery failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The channel rejected or lost the message
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers hold notifications
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    fn notify(&self, notification: HoldNotification) -> BoxFuture<'_, Result<(), NotifyError>>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: HoldNotification) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(async move {
            let payload = serde_json::to_string(&notification)
                .map_err(|e| NotifyError::Delivery(e.to_string()))?;
            tracing::info!(
                hold_id = %notification.hold_id,
                recipient = %notification.recipient,
                payload = %payload,
                "Hold notification"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_notifier_accepts_every_kind() {
        for kind in [
            NotificationKind::HoldCreated,
            NotificationKind::HoldConfirmed,
            NotificationKind::HoldApproved,
            NotificationKind::HoldCancelled,
            NotificationKind::HoldExtended,
            NotificationKind::HoldExpired,
        ] {
            let notification = HoldNotification {
                kind,
                hold_id: HoldId::new(),
                event_id: EventId::new(),
                recipient: UserId::new(),
                at: Utc::now(),
            };
            TracingNotifier.notify(notification).await.unwrap();
        }
    }

    #[test]
    fn payload_uses_snake_case_kinds() {
        let json = serde_json::to_value(NotificationKind::HoldApproved).unwrap();
        assert_eq!(json, "hold_approved");
    }
}
