//! Routes decoded server events to their handlers.
//!
//! Each handler may update the [`SessionContext`] and yields at most one line
//! for the collaborator's log.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

use roomchat_core::codec::decode;
use roomchat_core::messages::{value_text, BroadcastMessage, PrivateMessage, ServerEvent, Welcome};

use crate::session::SessionContext;

/// What to do with events the router has no handler for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownEventPolicy {
    /// Emit an `unrecognized event '<name>'` line.
    #[default]
    Log,
    /// Drop silently (still traced at debug).
    Ignore,
}

/// Time zone used to render broadcast timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host's local zone.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Render epoch milliseconds (UTC) as `HH:MM:SS` in this zone.
    pub fn format_time(&self, millis: i64) -> String {
        let utc: DateTime<Utc> = DateTime::from_timestamp_millis(millis).unwrap_or_default();
        match self {
            Self::Local => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
            Self::Fixed(offset) => utc.with_timezone(offset).format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    policy: UnknownEventPolicy,
    zone: DisplayZone,
}

impl Router {
    pub fn new(policy: UnknownEventPolicy, zone: DisplayZone) -> Self {
        Self { policy, zone }
    }

    pub fn policy(&self) -> UnknownEventPolicy {
        self.policy
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Decode a text frame and route it. Malformed frames produce an error
    /// line and are otherwise dropped.
    pub fn route_text(&self, text: &str, session: &mut SessionContext) -> Option<String> {
        match decode(text) {
            Ok(envelope) => self.route(ServerEvent::from_envelope(envelope), session),
            Err(e) => {
                tracing::warn!("dropping frame: {e}");
                Some(format!("[ERROR] {e}"))
            }
        }
    }

    pub fn route(&self, event: ServerEvent, session: &mut SessionContext) -> Option<String> {
        tracing::debug!(event = event.event_name(), "routing server event");
        match event {
            ServerEvent::Welcome(welcome) => Some(self.on_welcome(welcome, session)),
            ServerEvent::Message(msg) => Some(self.on_broadcast(&msg)),
            ServerEvent::PrivateMessage(msg) => Some(on_private(&msg)),
            ServerEvent::Error(payload) => Some(format!("[ERROR] {}", value_text(&payload))),
            ServerEvent::Unknown { event, .. } => match self.policy {
                UnknownEventPolicy::Log => Some(format!("unrecognized event '{event}'")),
                UnknownEventPolicy::Ignore => {
                    tracing::debug!(%event, "ignoring unrecognized event");
                    None
                }
            },
        }
    }

    fn on_welcome(&self, welcome: Welcome, session: &mut SessionContext) -> String {
        if session.set_client_id(&welcome.id) {
            tracing::info!(client_id = %welcome.id, "assigned client id");
        }
        if welcome.message.is_empty() {
            format!("[WELCOME] client id {}", welcome.id)
        } else {
            welcome.message
        }
    }

    fn on_broadcast(&self, msg: &BroadcastMessage) -> String {
        format!(
            "[BROADCAST] {} - {} ({}): {}",
            self.zone.format_time(msg.timestamp),
            msg.username,
            msg.from,
            msg.message
        )
    }
}

fn on_private(msg: &PrivateMessage) -> String {
    format!("[PRIVATE] {} ({}): {}", msg.username, msg.from, msg.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> DisplayZone {
        DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    fn session() -> SessionContext {
        SessionContext::new("", "room1", "12345")
    }

    #[test]
    fn epoch_zero_in_fixed_zones() {
        assert_eq!(utc().format_time(0), "00:00:00");
        let plus7 = DisplayZone::Fixed(FixedOffset::east_opt(7 * 3600).unwrap());
        assert_eq!(plus7.format_time(0), "07:00:00");
    }

    #[test]
    fn broadcast_line() {
        let router = Router::new(UnknownEventPolicy::Log, utc());
        let mut s = session();
        let line = router
            .route_text(
                r#"["message",{"from":"u1","username":"Ann","message":"hi","timestamp":0}]"#,
                &mut s,
            )
            .unwrap();
        assert_eq!(line, "[BROADCAST] 00:00:00 - Ann (u1): hi");
        assert_eq!(s, session());
    }

    #[test]
    fn broadcast_with_missing_fields() {
        let router = Router::new(UnknownEventPolicy::Log, utc());
        let line = router.route_text(r#"["message",42]"#, &mut session()).unwrap();
        assert_eq!(line, "[BROADCAST] 00:00:00 -  (): ");
    }

    #[test]
    fn welcome_stores_id() {
        let router = Router::default();
        let mut s = session();
        let line = router
            .route_text(r#"["welcome",{"id":"c-1","message":"Welcome!"}]"#, &mut s)
            .unwrap();
        assert_eq!(line, "Welcome!");
        assert_eq!(s.client_id(), Some("c-1"));

        let line = router.route_text(r#"["welcome",{"id":""}]"#, &mut s).unwrap();
        assert_eq!(line, "[WELCOME] client id ");
        assert_eq!(s.client_id(), Some("c-1"));
    }

    #[test]
    fn private_line() {
        let router = Router::default();
        let line = router
            .route_text(
                r#"["privateMessage",{"from":"u7","username":"Bo","message":"yo"}]"#,
                &mut session(),
            )
            .unwrap();
        assert_eq!(line, "[PRIVATE] Bo (u7): yo");
    }

    #[test]
    fn error_leaves_session_alone() {
        let router = Router::default();
        let mut s = session();
        s.set_client_id("c-1");
        let before = s.clone();
        let line = router.route_text(r#"["error","bad token"]"#, &mut s).unwrap();
        assert_eq!(line, "[ERROR] bad token");
        assert_eq!(s, before);

        let line = router
            .route_text(r#"["error",{"code":4}]"#, &mut s)
            .unwrap();
        assert_eq!(line, r#"[ERROR] {"code":4}"#);
    }

    #[test]
    fn malformed_frame_is_reported() {
        let router = Router::default();
        let line = router.route_text("not json", &mut session()).unwrap();
        assert!(line.starts_with("[ERROR] "), "{line}");
        assert!(line.contains("malformed envelope"), "{line}");
    }

    #[test]
    fn unknown_event_policy() {
        let mut s = session();
        let log = Router::new(UnknownEventPolicy::Log, DisplayZone::Local);
        assert_eq!(
            log.route_text(r#"["typing",{}]"#, &mut s).as_deref(),
            Some("unrecognized event 'typing'")
        );

        let ignore = Router::new(UnknownEventPolicy::Ignore, DisplayZone::Local);
        assert_eq!(ignore.route_text(r#"["typing",{}]"#, &mut s), None);
    }

    #[test]
    fn typed_events_route_directly() {
        let router = Router::new(UnknownEventPolicy::Log, utc());
        let mut s = session();
        let line = router.route(
            ServerEvent::Error(serde_json::json!({"reason": "room full"})),
            &mut s,
        );
        assert_eq!(line.as_deref(), Some(r#"[ERROR] {"reason":"room full"}"#));

        let line = router.route(
            ServerEvent::Message(BroadcastMessage {
                from: "u3".into(),
                username: "Cy".into(),
                message: "late".into(),
                id: "m9".into(),
                timestamp: 3_600_000,
            }),
            &mut s,
        );
        assert_eq!(line.as_deref(), Some("[BROADCAST] 01:00:00 - Cy (u3): late"));
    }
}
