//! Message and Conversation domain types.
//!
//! The ordered message list is the entire model-visible context: the user
//! asks, the assistant answers or requests tools, tool results are fed back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content; absent when the turn only carries tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// If this is a tool result, the name of the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Create an assistant turn that requests tool execution.
    ///
    /// Empty narration is stored as `None`.
    pub fn assistant_with_tool_calls(
        content: Option<String>,
        tool_calls: Vec<MessageToolCall>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content.filter(|c| !c.is_empty()));
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Tool, Some(content.into()));
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(name.into());
        msg
    }

    /// The text content, or `""` when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as raw JSON text
    pub arguments: String,
}

/// An ordered, append-only sequence of messages owned by one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Verify that every tool result answers a call issued earlier by the
    /// assistant, and that every issued call is answered before the next
    /// non-tool turn.
    pub fn check_tool_links(&self) -> Result<()> {
        let mut issued: Vec<&str> = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for (position, message) in self.messages.iter().enumerate() {
            if message.role != Role::Tool && !pending.is_empty() {
                return Err(unanswered(position, &pending));
            }
            match message.role {
                Role::Assistant => {
                    let ids = message.tool_calls.iter().map(|tc| tc.id.as_str());
                    issued.extend(ids.clone());
                    pending.extend(ids);
                }
                Role::Tool => {
                    let Some(call_id) = message.tool_call_id.as_deref() else {
                        return Err(Error::InvalidConversation(format!(
                            "tool message at position {position} has no tool_call_id"
                        )));
                    };
                    if !issued.contains(&call_id) {
                        return Err(Error::InvalidConversation(format!(
                            "tool message at position {position} answers unknown call '{call_id}'"
                        )));
                    }
                    pending.retain(|id| *id != call_id);
                }
                Role::System | Role::User => {}
            }
        }
        if !pending.is_empty() {
            return Err(unanswered(self.messages.len(), &pending));
        }
        Ok(())
    }
}

fn unanswered(position: usize, pending: &[&str]) -> Error {
    Error::InvalidConversation(format!(
        "tool calls {} have no result before position {position}",
        pending.join(", ")
    ))
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: "get_weather".into(),
            arguments: r#"{"city":"Manila"}"#.into(),
        }
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Kumusta?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Kumusta?");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_call_turn_drops_empty_narration() {
        let msg = Message::assistant_with_tool_calls(Some(String::new()), vec![call("c1")]);
        assert!(msg.content.is_none());
        assert_eq!(msg.text(), "");

        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"content\""));
    }

    #[test]
    fn tool_result_carries_link_and_name() {
        let msg = Message::tool_result("c1", "get_weather", "{}");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(msg.name.as_deref(), Some("get_weather"));
    }

    #[test]
    fn linked_tool_results_pass() {
        let mut conv = Conversation::new();
        conv.push(Message::user("weather?"));
        conv.push(Message::assistant_with_tool_calls(None, vec![call("c1")]));
        conv.push(Message::tool_result("c1", "get_weather", "{}"));
        assert!(conv.check_tool_links().is_ok());
    }

    #[test]
    fn orphan_tool_result_is_rejected() {
        let mut conv = Conversation::new();
        conv.push(Message::user("weather?"));
        conv.push(Message::tool_result("c9", "get_weather", "{}"));
        let err = conv.check_tool_links().unwrap_err();
        assert!(matches!(err, Error::InvalidConversation(_)));
        assert!(err.to_string().contains("c9"));
    }

    #[test]
    fn tool_result_before_its_call_is_rejected() {
        let mut conv = Conversation::new();
        conv.push(Message::tool_result("c1", "get_weather", "{}"));
        conv.push(Message::assistant_with_tool_calls(None, vec![call("c1")]));
        assert!(conv.check_tool_links().is_err());
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;
        conv.push(Message::user("First message"));
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn unanswered_tool_call_is_rejected() {
        let mut conv = Conversation::new();
        conv.push(Message::user("translate this poem"));
        conv.push(Message::assistant_with_tool_calls(None, vec![call("c1")]));
        conv.push(Message::user("never mind"));
        let err = conv.check_tool_links().unwrap_err();
        assert!(err.to_string().contains("c1"));
    }

    #[test]
    fn trailing_unanswered_tool_call_is_rejected() {
        let mut conv = Conversation::new();
        conv.push(Message::user("weather?"));
        conv.push(Message::assistant_with_tool_calls(None, vec![call("c1"), call("c2")]));
        conv.push(Message::tool_result("c1", "get_weather", "{}"));
        let err = conv.check_tool_links().unwrap_err();
        assert!(err.to_string().contains("c2"));

        conv.push(Message::tool_result("c2", "get_weather", "{}"));
        assert!(conv.check_tool_links().is_ok());
    }
}
