//! Inbound payload model.
//!
//! A [`Payload`] is the immutable, dot-addressable event body received from
//! the platform, tagged with a [`PayloadType`] fixed at construction. The
//! type determines which field of the payload is used as the routing
//! identifier.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("unsupported request body format: `{0}`")]
    UnsupportedContentType(String),

    #[error("failed to parse request body as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The closed set of inbound payload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    AppRateLimited,
    BlockActions,
    BlockSuggestion,
    Command,
    EventCallback,
    InteractiveMessage,
    MessageAction,
    Shortcut,
    Unknown,
    UrlVerification,
    ViewClosed,
    ViewSubmission,
    WorkflowStepEdit,
}

impl PayloadType {
    /// Maps a wire-format `type` value to a payload type. Unrecognized
    /// values map to `Unknown` rather than failing.
    pub fn from_name(name: &str) -> Self {
        match name {
            "app_rate_limited" => Self::AppRateLimited,
            "block_actions" => Self::BlockActions,
            "block_suggestion" => Self::BlockSuggestion,
            "command" => Self::Command,
            "event_callback" => Self::EventCallback,
            "interactive_message" => Self::InteractiveMessage,
            "message_action" => Self::MessageAction,
            "shortcut" => Self::Shortcut,
            "url_verification" => Self::UrlVerification,
            "view_closed" => Self::ViewClosed,
            "view_submission" => Self::ViewSubmission,
            "workflow_step_edit" => Self::WorkflowStepEdit,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppRateLimited => "app_rate_limited",
            Self::BlockActions => "block_actions",
            Self::BlockSuggestion => "block_suggestion",
            Self::Command => "command",
            Self::EventCallback => "event_callback",
            Self::InteractiveMessage => "interactive_message",
            Self::MessageAction => "message_action",
            Self::Shortcut => "shortcut",
            Self::Unknown => "unknown",
            Self::UrlVerification => "url_verification",
            Self::ViewClosed => "view_closed",
            Self::ViewSubmission => "view_submission",
            Self::WorkflowStepEdit => "workflow_step_edit",
        }
    }

    /// Dot-path of the field whose value identifies the payload for
    /// routing. `url_verification` and `unknown` payloads have none.
    pub fn id_field(&self) -> Option<&'static str> {
        match self {
            Self::BlockActions => Some("actions.0.action_id"),
            Self::BlockSuggestion => Some("action_id"),
            Self::Command => Some("command"),
            Self::EventCallback => Some("event.type"),
            Self::MessageAction => Some("callback_id"),
            Self::Shortcut => Some("callback_id"),
            Self::ViewClosed => Some("view.callback_id"),
            Self::ViewSubmission => Some("view.callback_id"),
            Self::WorkflowStepEdit => Some("callback_id"),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, dot-addressable tree of values parsed from an inbound body.
#[derive(Debug, Clone)]
pub struct Payload {
    kind: PayloadType,
    data: Value,
}

impl Payload {
    /// Wraps already-parsed data. The type is fixed here: an explicit
    /// `type` field wins, a `command` field implies a command payload, and
    /// anything else is unknown.
    pub fn new(data: Value) -> Self {
        let kind = match data.get("type").and_then(Value::as_str) {
            Some(name) => PayloadType::from_name(name),
            None if data.get("command").is_some() => PayloadType::Command,
            None => PayloadType::Unknown,
        };

        Payload { kind, data }
    }

    /// Parses a raw POST body into a payload.
    ///
    /// Supports `application/json` and `application/x-www-form-urlencoded`
    /// bodies; a form body may carry the real payload as an embedded JSON
    /// string under the `payload` key (interactive payloads arrive this
    /// way).
    pub fn from_http_request(body: &[u8], content_type: &str) -> Result<Self, PayloadError> {
        // Parameters like `; charset=utf-8` are irrelevant here.
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        let data = match media_type.as_str() {
            "application/json" => serde_json::from_slice(body)?,
            "application/x-www-form-urlencoded" => {
                let mut map = Map::new();
                for (key, value) in url::form_urlencoded::parse(body) {
                    map.insert(key.into_owned(), Value::String(value.into_owned()));
                }
                match map.get("payload").and_then(Value::as_str) {
                    Some(inner) => serde_json::from_str(inner)?,
                    None => Value::Object(map),
                }
            }
            other => return Err(PayloadError::UnsupportedContentType(other.to_string())),
        };

        Ok(Payload::new(data))
    }

    pub fn kind(&self) -> PayloadType {
        self.kind
    }

    pub fn is_type(&self, kind: PayloadType) -> bool {
        self.kind == kind
    }

    /// Gets a value by key or dot-separated path. Numeric path segments
    /// index into arrays.
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.data, path)
    }

    /// Gets a string value by dot-path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Returns the first non-null value among the given paths.
    pub fn get_one_of(&self, paths: &[&str]) -> Option<&Value> {
        paths.iter().find_map(|path| self.get(path))
    }

    /// The identifier used for route indexing, per the payload type's id
    /// field. Leading slashes are trimmed so `/deploy` indexes as `deploy`.
    pub fn type_id(&self) -> Option<String> {
        let field = self.kind.id_field()?;
        let id = self.get_str(field)?;
        Some(id.trim_start_matches('/').to_string())
    }

    pub fn app_id(&self) -> Option<&str> {
        self.get_str("api_app_id")
    }

    pub fn team_id(&self) -> Option<&str> {
        self.get_one_of(&[
            "authorizations.0.team_id",
            "team.id",
            "team_id",
            "event.team",
            "user.team_id",
        ])
        .and_then(Value::as_str)
    }

    pub fn enterprise_id(&self) -> Option<&str> {
        self.get_one_of(&[
            "authorizations.0.enterprise_id",
            "enterprise.id",
            "enterprise_id",
            "team.enterprise_id",
        ])
        .and_then(Value::as_str)
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.get_one_of(&["channel.id", "channel_id", "event.channel", "event.item.channel"])
            .and_then(Value::as_str)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get_one_of(&["user.id", "user_id", "event.user"])
            .and_then(Value::as_str)
    }

    pub fn response_url(&self) -> Option<&str> {
        self.get_one_of(&["response_url", "response_urls.0.response_url"])
            .and_then(Value::as_str)
    }

    /// Identifying fields for log records.
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "payload_type": self.kind.as_str(),
            "payload_id_field": self.kind.id_field(),
            "payload_id_value": self.type_id(),
        })
    }

    pub fn as_value(&self) -> &Value {
        &self.data
    }

    pub fn into_value(self) -> Value {
        self.data
    }
}

fn get_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_fixed_at_construction() {
        let payload = Payload::new(json!({"type": "block_actions"}));
        assert_eq!(payload.kind(), PayloadType::BlockActions);

        let payload = Payload::new(json!({"command": "/test", "text": "hi"}));
        assert_eq!(payload.kind(), PayloadType::Command);

        let payload = Payload::new(json!({"something": "else"}));
        assert_eq!(payload.kind(), PayloadType::Unknown);

        let payload = Payload::new(json!({"type": "brand_new_type"}));
        assert_eq!(payload.kind(), PayloadType::Unknown);
    }

    #[test]
    fn test_dot_path_access() {
        let payload = Payload::new(json!({
            "type": "block_actions",
            "actions": [{"action_id": "approve", "value": "42"}],
            "user": {"id": "U1"}
        }));
        assert_eq!(payload.get_str("actions.0.action_id"), Some("approve"));
        assert_eq!(payload.get_str("user.id"), Some("U1"));
        assert!(payload.get("actions.1.action_id").is_none());
        assert!(payload.get("actions.x").is_none());
        assert!(payload.get("missing.deep.path").is_none());
    }

    #[test]
    fn test_type_id_trims_slashes() {
        let payload = Payload::new(json!({"command": "/deploy", "text": ""}));
        assert_eq!(payload.type_id().as_deref(), Some("deploy"));

        let payload = Payload::new(json!({
            "type": "block_actions",
            "actions": [{"action_id": "btn-1"}]
        }));
        assert_eq!(payload.type_id().as_deref(), Some("btn-1"));

        let payload = Payload::new(json!({"type": "url_verification", "challenge": "c"}));
        assert_eq!(payload.type_id(), None);
    }

    #[test]
    fn test_from_json_body() {
        let body = br#"{"type":"event_callback","event":{"type":"app_mention"}}"#;
        let payload = Payload::from_http_request(body, "application/json").unwrap();
        assert_eq!(payload.kind(), PayloadType::EventCallback);
        assert_eq!(payload.type_id().as_deref(), Some("app_mention"));
    }

    #[test]
    fn test_from_form_body() {
        let body = b"command=%2Ftest&text=hello+world&user_id=U1";
        let payload =
            Payload::from_http_request(body, "application/x-www-form-urlencoded").unwrap();
        assert_eq!(payload.kind(), PayloadType::Command);
        assert_eq!(payload.get_str("text"), Some("hello world"));
        assert_eq!(payload.user_id(), Some("U1"));
    }

    #[test]
    fn test_from_form_body_with_embedded_payload() {
        let inner = json!({"type": "shortcut", "callback_id": "do_thing"}).to_string();
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("payload", &inner)
            .finish();
        let payload =
            Payload::from_http_request(body.as_bytes(), "application/x-www-form-urlencoded")
                .unwrap();
        assert_eq!(payload.kind(), PayloadType::Shortcut);
        assert_eq!(payload.type_id().as_deref(), Some("do_thing"));
    }

    #[test]
    fn test_unsupported_content_type() {
        let err = Payload::from_http_request(b"x", "text/plain").unwrap_err();
        assert!(matches!(err, PayloadError::UnsupportedContentType(_)));
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let body = br#"{"type":"url_verification","challenge":"c"}"#;
        let payload =
            Payload::from_http_request(body, "application/json; charset=utf-8").unwrap();
        assert_eq!(payload.kind(), PayloadType::UrlVerification);
    }
}
