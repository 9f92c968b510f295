//! Values that flow through plugin pipelines.
//!
//! These mirror the shapes produced by the chat transport: a [`Message`] for
//! each chat turn, [`StreamPart`]s while a response streams in, and a
//! [`Conversation`] for CRUD on whole threads. The `*Event` enums select
//! which pipeline stage a dispatch call targets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Messages ────────────────────────────────────────────────────────────────

/// Author role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Free-form annotations added by the host or by plugins.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            metadata: Map::new(),
            created_at: None,
        }
    }

    /// Shorthand for a user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    /// Shorthand for an assistant message.
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content)
    }
}

/// Which way a message travels relative to the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageDirection {
    /// Received from the model, about to be displayed.
    Incoming,
    /// Written by the user, about to be sent.
    Outgoing,
}

// ─── Streaming ───────────────────────────────────────────────────────────────

/// One part of a streamed model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamPart {
    TextDelta {
        id: String,
        delta: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        output: Value,
    },
    #[serde(rename_all = "camelCase")]
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
    /// Provider-specific part the plugin system does not interpret.
    Data {
        name: String,
        data: Value,
    },
}

impl StreamPart {
    /// Shorthand for a text delta.
    pub fn text(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }
}

/// Error reported by the chat transport while streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StreamError {}

/// Stage of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A part arrived; it is threaded through every stream plugin.
    Part(StreamPart),
    Start,
    End,
    Error(StreamError),
}

// ─── Conversations ───────────────────────────────────────────────────────────

/// A chat thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            messages: Vec::new(),
            metadata: Map::new(),
            updated_at: None,
        }
    }
}

/// Conversation CRUD notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    Create(Conversation),
    Update(Conversation),
    /// Carries the id of the deleted conversation.
    Delete(String),
}

// ─── Agents ──────────────────────────────────────────────────────────────────

/// One step of a multi-step agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    pub agent_id: String,
    pub step_number: u32,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Stage of an agent run.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The step is about to execute.
    BeforeStep(AgentStep),
    /// The step produced its output.
    AfterStep(AgentStep),
    /// The step failed; carries the step and the failure.
    Error(AgentStep, StreamError),
}

// ─── Analytics ───────────────────────────────────────────────────────────────

/// A named analytics event with arbitrary properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
