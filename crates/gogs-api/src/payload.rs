//! Inbound webhook payloads.

use serde::Deserialize;
use tracing::error;

/// Owner block of a webhook repository.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadOwner {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Repository block of a webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRepository {
    pub name: String,
    pub owner: PayloadOwner,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub private: Option<bool>,
}

/// Push (and push-shaped) event payload.
///
/// Only the fields needed to find the configured sources are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref", default)]
    pub ref_name: Option<String>,
    pub repository: PayloadRepository,
}

impl PushEvent {
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.repository.owner.username
    }

    #[must_use]
    pub fn repository_name(&self) -> &str {
        &self.repository.name
    }
}

/// Decode a push payload, logging and returning `None` when it is malformed.
#[must_use]
pub fn push_event_from_payload(payload: &str) -> Option<PushEvent> {
    match serde_json::from_str::<PushEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            error!(error = %e, "Can not read hook payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_push() {
        let event = push_event_from_payload(
            r#"{"ref":"refs/heads/main","repository":{"owner":{"username":"alice"},"name":"proj"}}"#,
        )
        .unwrap();
        assert_eq!(event.ref_name.as_deref(), Some("refs/heads/main"));
        assert_eq!(event.owner(), "alice");
        assert_eq!(event.repository_name(), "proj");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let event = push_event_from_payload(
            r#"{
                "ref": "refs/heads/dev",
                "before": "000",
                "after": "abc",
                "commits": [{"id": "abc", "message": "wip"}],
                "pusher": {"username": "alice"},
                "repository": {
                    "id": 3,
                    "name": "proj",
                    "full_name": "acme/proj",
                    "owner": {"id": 9, "username": "acme", "email": "ops@acme.test"},
                    "watchers_count": 4
                }
            }"#,
        )
        .unwrap();
        assert_eq!(event.owner(), "acme");
        assert_eq!(event.repository.full_name.as_deref(), Some("acme/proj"));
    }

    #[test]
    fn test_malformed_payload_is_absent() {
        assert!(push_event_from_payload("{not json").is_none());
        assert!(push_event_from_payload(r#"{"ref":"refs/heads/main"}"#).is_none());
        assert!(push_event_from_payload("").is_none());
    }
}
