//! Sample plugins used by the demo.

use std::sync::atomic::{AtomicUsize, Ordering};

use conciergus::prelude::*;
use serde_json::{Value, json};

fn metadata(id: &str, name: &str, description: &str) -> PluginMetadata {
    PluginMetadata::new(id, name, "0.1.0", Author::new("Conciergus Contributors"))
        .with_description(description)
        .with_license("MPL-2.0")
}

// ============================================================================
// Profanity filter (message)
// ============================================================================

/// Masks configured words in both directions.
pub struct ProfanityFilter {
    metadata: PluginMetadata,
}

impl ProfanityFilter {
    pub fn new() -> Self {
        Self {
            metadata: metadata(
                "profanity-filter",
                "Profanity Filter",
                "Masks configured words in chat messages",
            )
            .with_keywords(["moderation", "filter"]),
        }
    }

    fn mask(&self, text: &str, ctx: &PluginContext) -> String {
        let words: Vec<String> = ctx.option("words").unwrap_or_default();
        let mask: String = ctx.option("mask").unwrap_or_else(|| "*".to_string());

        text.split(' ')
            .map(|token| {
                let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
                if !bare.is_empty() && words.iter().any(|w| w.eq_ignore_ascii_case(bare)) {
                    token.replace(bare, &mask.repeat(bare.chars().count()))
                } else {
                    token.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Plugin for ProfanityFilter {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn default_config(&self) -> Option<PluginConfigPatch> {
        Some(
            PluginConfigPatch::new()
                .priority(50)
                .option("words", json!(["damn"]))
                .option("mask", "#"),
        )
    }

    fn config_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "object",
                    "required": ["words"],
                    "properties": {
                        "words": { "type": "array", "items": { "type": "string" } },
                        "mask": { "type": "string" }
                    }
                }
            }
        }))
    }

    async fn on_enable(&self, ctx: &PluginContext) -> HookResult {
        let words: Vec<String> = ctx.option("words").unwrap_or_default();
        ctx.logger()
            .info(format_args!("filtering {} word(s)", words.len()));
        Ok(())
    }

    fn as_message_plugin(&self) -> Option<&dyn MessagePlugin> {
        Some(self)
    }
}

#[async_trait]
impl MessagePlugin for ProfanityFilter {
    async fn process_message(
        &self,
        mut message: Message,
        ctx: &PluginContext,
    ) -> HookResult<Message> {
        message.content = self.mask(&message.content, ctx);
        Ok(message)
    }

    async fn process_outgoing_message(
        &self,
        mut message: Message,
        ctx: &PluginContext,
    ) -> HookResult<Message> {
        message.content = self.mask(&message.content, ctx);
        Ok(message)
    }
}

// ============================================================================
// Shouter (message)
// ============================================================================

/// Upper-cases assistant replies.
pub struct Shouter {
    metadata: PluginMetadata,
}

impl Shouter {
    pub fn new() -> Self {
        Self {
            metadata: metadata("shouter", "Shouter", "Upper-cases assistant replies"),
        }
    }
}

#[async_trait]
impl Plugin for Shouter {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn as_message_plugin(&self) -> Option<&dyn MessagePlugin> {
        Some(self)
    }
}

#[async_trait]
impl MessagePlugin for Shouter {
    async fn process_message(
        &self,
        mut message: Message,
        _ctx: &PluginContext,
    ) -> HookResult<Message> {
        if message.role == Role::Assistant {
            message.content = message.content.to_uppercase();
        }
        Ok(message)
    }
}

// ============================================================================
// Token counter (stream)
// ============================================================================

/// Counts streamed text deltas and records the total when a stream ends.
pub struct TokenCounter {
    metadata: PluginMetadata,
    current: AtomicUsize,
}

impl TokenCounter {
    pub const FINISHED: &'static str = "stream:finished";

    pub fn new() -> Self {
        Self {
            metadata: metadata(
                "token-counter",
                "Token Counter",
                "Counts streamed text deltas",
            )
            .with_min_host_version("0.1.0"),
            current: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Plugin for TokenCounter {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn as_stream_plugin(&self) -> Option<&dyn StreamPlugin> {
        Some(self)
    }
}

#[async_trait]
impl StreamPlugin for TokenCounter {
    async fn process_stream_part(
        &self,
        part: StreamPart,
        _ctx: &PluginContext,
    ) -> HookResult<StreamPart> {
        if matches!(part, StreamPart::TextDelta { .. }) {
            self.current.fetch_add(1, Ordering::Relaxed);
        }
        Ok(part)
    }

    async fn on_stream_start(&self, _ctx: &PluginContext) -> HookResult {
        self.current.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn on_stream_end(&self, ctx: &PluginContext) -> HookResult {
        let count = self.current.load(Ordering::Relaxed);
        let total: usize = ctx.storage().get("total").await.unwrap_or(0);
        ctx.storage().set("total", &(total + count)).await;
        ctx.events().emit(Self::FINISHED, vec![json!(count), json!(total + count)]);
        Ok(())
    }

    async fn on_stream_error(&self, error: &StreamError, ctx: &PluginContext) -> HookResult {
        ctx.logger().warn(format_args!("stream failed: {error}"));
        Ok(())
    }
}

// ============================================================================
// Conversation titler (conversation)
// ============================================================================

/// Titles new conversations after their first user message.
pub struct ConversationTitler {
    metadata: PluginMetadata,
}

impl ConversationTitler {
    const MAX_TITLE: usize = 32;

    pub fn new() -> Self {
        Self {
            metadata: metadata(
                "conversation-titler",
                "Conversation Titler",
                "Derives conversation titles from the first user message",
            ),
        }
    }
}

#[async_trait]
impl Plugin for ConversationTitler {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn as_conversation_plugin(&self) -> Option<&dyn ConversationPlugin> {
        Some(self)
    }
}

#[async_trait]
impl ConversationPlugin for ConversationTitler {
    async fn on_conversation_create(
        &self,
        mut conversation: Conversation,
        _ctx: &PluginContext,
    ) -> HookResult<Conversation> {
        if conversation.title.is_none() {
            conversation.title = conversation
                .messages
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.chars().take(Self::MAX_TITLE).collect());
        }
        Ok(conversation)
    }

    async fn on_conversation_delete(
        &self,
        conversation_id: &str,
        ctx: &PluginContext,
    ) -> HookResult {
        ctx.logger()
            .debug(format_args!("conversation {conversation_id} deleted"));
        Ok(())
    }
}

// ============================================================================
// Analytics logger (analytics)
// ============================================================================

/// Counts tracked events per name in plugin storage.
pub struct AnalyticsLogger {
    metadata: PluginMetadata,
}

impl AnalyticsLogger {
    pub fn new() -> Self {
        Self {
            metadata: metadata(
                "analytics-logger",
                "Analytics Logger",
                "Counts analytics events by name",
            )
            .with_dependency("token-counter", "^0.1"),
        }
    }
}

#[async_trait]
impl Plugin for AnalyticsLogger {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn as_analytics_plugin(&self) -> Option<&dyn AnalyticsPlugin> {
        Some(self)
    }
}

#[async_trait]
impl AnalyticsPlugin for AnalyticsLogger {
    async fn track_event(&self, event: &AnalyticsEvent, ctx: &PluginContext) -> HookResult {
        let count: u64 = ctx.storage().get(&event.name).await.unwrap_or(0);
        ctx.storage().set(&event.name, &(count + 1)).await;
        ctx.logger()
            .info(format_args!("{} (seen {} times)", event.name, count + 1));
        Ok(())
    }
}
