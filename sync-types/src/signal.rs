//! Change topics and inbound remote change signals.

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Topics published on the change bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Data may have changed; subscribers should refresh.
    DataChanged,
}

/// Kind of remote push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    /// A database-wide subscription fired.
    Database,
    /// A zone subscription fired.
    RecordZone,
    /// A query subscription fired.
    Query,
    /// A read-receipt notification (carries no data change).
    ReadNotification,
}

/// A push payload telling us the remote store changed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChangeSignal {
    /// What kind of subscription produced the signal.
    #[serde(rename = "notificationType")]
    pub kind: SignalKind,
    /// Subscription that fired, if reported.
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Zone the change happened in, if reported.
    #[serde(default)]
    pub zone_name: Option<String>,
}

impl RemoteChangeSignal {
    /// Create a signal of the given kind.
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            subscription_id: None,
            zone_name: None,
        }
    }

    /// Parse a signal from a JSON push payload.
    pub fn from_json(payload: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Whether the signal indicates a data change.
    pub fn is_data_change(&self) -> bool {
        matches!(
            self.kind,
            SignalKind::Database | SignalKind::RecordZone | SignalKind::Query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zone_signal() {
        let signal = RemoteChangeSignal::from_json(
            r#"{"notificationType":"recordZone","subscriptionId":"items","zoneName":"ItemsZone"}"#,
        )
        .unwrap();

        assert_eq!(signal.kind, SignalKind::RecordZone);
        assert_eq!(signal.subscription_id.as_deref(), Some("items"));
        assert_eq!(signal.zone_name.as_deref(), Some("ItemsZone"));
        assert!(signal.is_data_change());
    }

    #[test]
    fn read_notification_is_not_a_change() {
        let signal = RemoteChangeSignal::from_json(r#"{"notificationType":"readNotification"}"#)
            .unwrap();
        assert!(!signal.is_data_change());
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(matches!(
            RemoteChangeSignal::from_json("not json"),
            Err(SyncError::Serialization(_))
        ));
    }
}
