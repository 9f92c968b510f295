//! Publish/subscribe channels.
//!
//! [`EventBus`] is a plain synchronous pub/sub primitive keyed by event
//! name. Two channels are built on top of it:
//!
//! - [`PluginEventEmitter`]: one per plugin. Every emission is wrapped in a
//!   [`PluginEvent`] envelope carrying the plugin id and a timestamp before
//!   listeners see it.
//! - The manager's global channel, carrying [`ManagerEvent`]s such as
//!   `plugin:registered`.
//!
//! Listeners run synchronously inside `emit`, outside the internal lock, so a
//! listener may subscribe or unsubscribe without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::plugin::PluginConfig;
use crate::utils::now_millis;

/// Handle returned by `on`/`once`, used to unsubscribe.
pub type ListenerId = u64;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerEntry<E> {
    id: ListenerId,
    listener: Listener<E>,
    once: bool,
}

// =============================================================================
// EventBus
// =============================================================================

/// Name-keyed publish/subscribe channel.
pub struct EventBus<E> {
    listeners: Mutex<HashMap<String, Vec<ListenerEntry<E>>>>,
    next_id: AtomicU64,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribes `listener` to `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(listener), false)
    }

    /// Subscribes `listener` for the next emission of `event` only.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(listener), true)
    }

    /// Removes a listener. Returns `false` if it was not subscribed.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Delivers `payload` to every listener of `event`, in subscription
    /// order. Returns the number of listeners invoked.
    pub fn emit(&self, event: &str, payload: &E) -> usize {
        let to_call: Vec<Listener<E>> = {
            let mut listeners = self.listeners.lock();
            let Some(entries) = listeners.get_mut(event) else {
                return 0;
            };
            let called = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                listeners.remove(event);
            }
            called
        };

        for listener in &to_call {
            listener(payload);
        }
        to_call.len()
    }

    /// Removes the listeners of `event`, or of every event when `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut listeners = self.listeners.lock();
        match event {
            Some(name) => {
                listeners.remove(name);
            }
            None => listeners.clear(),
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    fn subscribe(&self, event: &str, listener: Listener<E>, once: bool) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(ListenerEntry { id, listener, once });
        id
    }
}

// =============================================================================
// PluginEventEmitter
// =============================================================================

/// Envelope delivered to listeners of a [`PluginEventEmitter`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEvent {
    pub plugin_id: String,
    /// Event name the emission was made under.
    pub event: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// The arguments passed to `emit`.
    pub args: Vec<Value>,
}

/// A plugin's private event channel.
///
/// ```rust
/// use conciergus_framework::PluginEventEmitter;
/// use serde_json::json;
///
/// let events = PluginEventEmitter::new("counter");
/// events.on("tick", |e| assert_eq!(e.plugin_id, "counter"));
/// assert_eq!(events.emit("tick", vec![json!(1)]), 1);
/// ```
pub struct PluginEventEmitter {
    plugin_id: String,
    bus: EventBus<PluginEvent>,
}

impl PluginEventEmitter {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            bus: EventBus::new(),
        }
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&PluginEvent) + Send + Sync + 'static,
    {
        self.bus.on(event, listener)
    }

    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&PluginEvent) + Send + Sync + 'static,
    {
        self.bus.once(event, listener)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.bus.off(event, id)
    }

    /// Wraps `args` in a [`PluginEvent`] and delivers it.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> usize {
        let envelope = PluginEvent {
            plugin_id: self.plugin_id.clone(),
            event: event.to_string(),
            timestamp: now_millis(),
            args,
        };
        self.bus.emit(event, &envelope)
    }

    pub fn remove_all_listeners(&self, event: Option<&str>) {
        self.bus.remove_all_listeners(event);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.bus.listener_count(event)
    }
}

impl std::fmt::Debug for PluginEventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEventEmitter")
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ManagerEvent
// =============================================================================

/// Notifications published on the manager's global channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    Registered { id: String },
    Unregistered { id: String },
    Enabled { id: String },
    Disabled { id: String },
    ConfigUpdated {
        id: String,
        old: PluginConfig,
        new: PluginConfig,
    },
}

impl ManagerEvent {
    pub const REGISTERED: &'static str = "plugin:registered";
    pub const UNREGISTERED: &'static str = "plugin:unregistered";
    pub const ENABLED: &'static str = "plugin:enabled";
    pub const DISABLED: &'static str = "plugin:disabled";
    pub const CONFIG_UPDATED: &'static str = "plugin:config-updated";

    /// Channel name this event is published under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered { .. } => Self::REGISTERED,
            Self::Unregistered { .. } => Self::UNREGISTERED,
            Self::Enabled { .. } => Self::ENABLED,
            Self::Disabled { .. } => Self::DISABLED,
            Self::ConfigUpdated { .. } => Self::CONFIG_UPDATED,
        }
    }

    /// Id of the plugin the event concerns.
    pub fn plugin_id(&self) -> &str {
        match self {
            Self::Registered { id }
            | Self::Unregistered { id }
            | Self::Enabled { id }
            | Self::Disabled { id }
            | Self::ConfigUpdated { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_once_fires_a_single_time() {
        let bus: EventBus<u32> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.once("x", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit("x", &1), 1);
        assert_eq!(bus.emit("x", &2), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[test]
    fn test_off_and_remove_all() {
        let bus: EventBus<()> = EventBus::new();
        let a = bus.on("a", |_| {});
        bus.on("a", |_| {});
        bus.on("b", |_| {});

        assert!(bus.off("a", a));
        assert!(!bus.off("a", a));
        assert_eq!(bus.listener_count("a"), 1);

        bus.remove_all_listeners(Some("a"));
        assert_eq!(bus.listener_count("a"), 0);
        assert_eq!(bus.listener_count("b"), 1);

        bus.remove_all_listeners(None);
        assert_eq!(bus.emit("b", &()), 0);
    }

    #[test]
    fn test_listener_may_resubscribe_during_emit() {
        let bus: Arc<EventBus<()>> = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.on("tick", move |_| {
            inner.on("tock", |_| {});
        });
        bus.emit("tick", &());
        assert_eq!(bus.listener_count("tock"), 1);
    }

    #[test]
    fn test_plugin_emitter_wraps_args() {
        let emitter = PluginEventEmitter::new("greeter");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        emitter.on("greeted", move |e| sink.lock().push(e.clone()));

        emitter.emit("greeted", vec![json!("bob"), json!(2)]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].plugin_id, "greeter");
        assert_eq!(seen[0].event, "greeted");
        assert_eq!(seen[0].args, vec![json!("bob"), json!(2)]);
        assert!(seen[0].timestamp > 0);
    }

    #[test]
    fn test_manager_event_names() {
        let e = ManagerEvent::ConfigUpdated {
            id: "p".into(),
            old: PluginConfig::default(),
            new: PluginConfig::default(),
        };
        assert_eq!(e.name(), "plugin:config-updated");
        assert_eq!(e.plugin_id(), "p");
    }
}
