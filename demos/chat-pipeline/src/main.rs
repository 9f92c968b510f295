//! Chat Pipeline Example
//!
//! Pushes a few chat turns through the Conciergus plugin pipelines:
//!
//! ```text
//! user text ──outgoing──▶ profanity-filter ──▶ "model" reply
//!                                                  │
//!        ┌─────────────── stream parts ◀───────────┘
//!        ▼
//!   token-counter ──▶ incoming message ──▶ profanity-filter ──▶ shouter
//! ```
//!
//! Each run also creates a conversation (titled by `conversation-titler`),
//! tracks analytics events, and changes plugin config at runtime.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p chat-pipeline -- --config demos/chat-pipeline/conciergus.toml -m "well heck" --shout
//! ```

mod plugins;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use conciergus::framework::utils::{generate_id, now_millis};
use conciergus::framework::ManagerEvent;
use conciergus::prelude::*;
use serde_json::json;
use tracing::{error, info};

use plugins::{AnalyticsLogger, ConversationTitler, ProfanityFilter, Shouter, TokenCounter};

#[derive(Parser, Debug)]
#[command(name = "chat-pipeline", about = "Run chat turns through Conciergus plugins")]
struct Args {
    /// Configuration file (defaults to searching the current directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production".
    #[arg(short, long)]
    profile: Option<String>,

    /// User messages to send; repeat for several turns.
    #[arg(short, long = "message", default_values_t = [
        "hello there".to_string(),
        "what the darn is a plugin".to_string(),
    ])]
    messages: Vec<String>,

    /// Enable the shouter plugin even if the config disables it.
    #[arg(long)]
    shout: bool,
}

/// Stand-in for a model: echoes the prompt back, one word per stream part.
fn fake_reply(prompt: &str) -> Vec<String> {
    format!("you said: {prompt}")
        .split(' ')
        .map(|w| format!("{w} "))
        .collect()
}

async fn chat_turn(manager: &PluginManager, text: &str) -> (Message, Message) {
    let outgoing = manager
        .execute_message_plugins(Message::user(generate_id(), text), MessageDirection::Outgoing)
        .await;
    info!(content = %outgoing.content, "Sending user message");

    let reply_id = generate_id();
    manager.execute_stream_plugins(StreamEvent::Start).await;
    let mut streamed = String::new();
    for word in fake_reply(&outgoing.content) {
        let part = manager
            .execute_stream_plugins(StreamEvent::Part(StreamPart::text(&reply_id, word)))
            .await;
        if let Some(StreamPart::TextDelta { delta, .. }) = part {
            streamed.push_str(&delta);
        }
    }
    manager.execute_stream_plugins(StreamEvent::End).await;

    let mut reply = Message::assistant(reply_id, streamed.trim_end());
    reply.created_at = Some(now_millis());
    let shown = manager
        .execute_message_plugins(reply, MessageDirection::Incoming)
        .await;

    manager
        .execute_analytics_plugins(&AnalyticsEvent {
            name: "message_sent".into(),
            properties: Default::default(),
            timestamp: now_millis(),
        })
        .await;

    (outgoing, shown)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ConciergusRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build().await?;

    runtime
        .register_plugins([
            Arc::new(TokenCounter::new()) as Arc<dyn Plugin>,
            Arc::new(ProfanityFilter::new()),
            Arc::new(Shouter::new()),
            Arc::new(ConversationTitler::new()),
            Arc::new(AnalyticsLogger::new()),
        ])
        .await?;

    let manager = runtime.manager();
    manager
        .events()
        .on(ManagerEvent::CONFIG_UPDATED, |event: &ManagerEvent| {
            info!(plugin = %event.plugin_id(), "Plugin configuration changed");
        });
    if let Some(ctx) = manager.get_context("token-counter").await {
        ctx.events().on(TokenCounter::FINISHED, |event| {
            info!(args = ?event.args, "Stream finished (tokens, running total)");
        });
    }
    if args.shout {
        manager.enable("shouter").await?;
    }

    // ─── Chat turns ──────────────────────────────────────────────────────────

    let mut conversation = Conversation::new(generate_id());
    for text in &args.messages {
        let (sent, shown) = chat_turn(&manager, text).await;
        println!("> {}", sent.content);
        println!("< {}", shown.content);
        conversation.messages.push(sent);
        conversation.messages.push(shown);
    }

    if let Some(created) = manager
        .execute_conversation_plugins(ConversationEvent::Create(conversation))
        .await
    {
        println!(
            "conversation {} titled {:?} ({} messages)",
            created.id,
            created.title.as_deref().unwrap_or("<untitled>"),
            created.messages.len()
        );
        manager
            .execute_conversation_plugins(ConversationEvent::Delete(created.id))
            .await;
    }

    // ─── Runtime configuration ───────────────────────────────────────────────

    manager
        .update_config(
            "profanity-filter",
            PluginConfigPatch::new().option("words", json!(["hello"])).option("mask", "?"),
        )
        .await?;
    let (_, shown) = chat_turn(&manager, "hello again").await;
    println!("< {}", shown.content);

    if let Err(e) = manager
        .update_config(
            "profanity-filter",
            PluginConfigPatch::new().option("words", "not-a-list"),
        )
        .await
    {
        error!(error = %e, "Rejected config update, previous config kept");
    }

    let stats = runtime.stats().await;
    println!(
        "{} plugin(s) registered, {} enabled, storage: {}",
        stats.plugins.registered, stats.plugins.enabled, stats.storage_backend
    );

    runtime.shutdown().await;
    Ok(())
}
