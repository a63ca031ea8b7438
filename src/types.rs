use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation-identity parameter names fanned out on outbound turns.
pub const THREAD_ID_KEYS: [&str; 3] = ["thread_id", "conversation_id", "chat_id"];

/// Field names sniffed for a conversation identifier on inbound bodies.
/// Some servers reply with a bare `id`, which is never sent outbound.
pub const RESPONSE_THREAD_ID_KEYS: [&str; 4] = ["thread_id", "conversation_id", "chat_id", "id"];

/// One decoded event from the wire, independent of which event vocabulary
/// the service speaks.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A streamed partial-text token for the in-progress agent turn.
    Token { text: String },
    ToolStart(ToolEvent),
    ToolComplete(ToolEvent),
    ToolError(ToolEvent),
    /// No further tokens for this turn. Carries the server-assigned
    /// conversation identifier when the closing frame includes one.
    TurnEnd { thread_id: Option<String> },
    /// A frame that could not be classified. Preserved verbatim so debug
    /// mode and tests can observe malformed input.
    Unknown {
        event: Option<String>,
        data: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub name: String,
    pub phase: ToolPhase,
    /// `params` for start, `output` for complete, `error` for error,
    /// whichever vocabulary the frame arrived in.
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    Start,
    Complete,
    Error,
}

/// An agent advertised by the service or declared in the local config file.
/// Wire rows may carry `key` instead of `id` and omit `name`/`description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireAgent")]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
struct WireAgent {
    #[serde(alias = "key", default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
}

impl From<WireAgent> for AgentInfo {
    fn from(wire: WireAgent) -> Self {
        let name = wire
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| wire.id.clone());
        Self {
            id: wire.id,
            name,
            description: wire.description,
        }
    }
}

/// Pull a conversation identifier out of a response body or frame payload,
/// whichever candidate field name the service used.
pub fn extract_thread_id(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    RESPONSE_THREAD_ID_KEYS.iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_info_accepts_key_alias_and_fills_name() {
        let agent: AgentInfo =
            serde_json::from_value(json!({ "key": "sallyC", "description": "CRM helper" }))
                .expect("agent row should deserialize");
        assert_eq!(agent.id, "sallyC");
        assert_eq!(agent.name, "sallyC");
        assert_eq!(agent.description, "CRM helper");
    }

    #[test]
    fn test_agent_info_prefers_explicit_name() {
        let agent: AgentInfo =
            serde_json::from_value(json!({ "id": "sallyC", "name": "Sally", "description": "" }))
                .expect("agent row should deserialize");
        assert_eq!(agent.name, "Sally");
    }

    #[test]
    fn test_extract_thread_id_checks_every_candidate_key() {
        for key in RESPONSE_THREAD_ID_KEYS {
            let body = json!({ key: "t-42" });
            assert_eq!(extract_thread_id(&body).as_deref(), Some("t-42"));
        }
        assert_eq!(extract_thread_id(&json!({ "other": "x" })), None);
        assert_eq!(extract_thread_id(&json!("not an object")), None);
    }

    #[test]
    fn test_extract_thread_id_prefers_thread_id_over_alternates() {
        let body = json!({ "chat_id": "c-1", "thread_id": "t-1" });
        assert_eq!(extract_thread_id(&body).as_deref(), Some("t-1"));

        let body = json!({ "id": "i-1", "chat_id": "c-1" });
        assert_eq!(extract_thread_id(&body).as_deref(), Some("c-1"));
    }
}
