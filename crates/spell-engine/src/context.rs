//! Per-pass execution context handed to workers.
//!
//! [`WorkerContext`] carries the invocation payload, host-installed
//! [`Extensions`], the worker cache, and the display channel. One context
//! is built per node per pass.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{NullCache, WorkerCache};
use crate::error::{EngineError, Result};
use crate::events::{EventSink, NullEventSink, PassEvent};
use crate::node::NodeId;

/// The inbound event that initiated a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Who produced the event.
    pub sender: String,
    /// The agent observing the event.
    pub observer: String,
    /// Conversation or room the event belongs to.
    pub channel: String,
    /// Originating client or connector.
    pub client: String,
    /// Message text, if the event carries any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Named entities participating in the event.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

impl EventPayload {
    pub fn new(
        sender: impl Into<String>,
        observer: impl Into<String>,
        channel: impl Into<String>,
        client: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            observer: observer.into(),
            channel: channel.into(),
            client: client.into(),
            content: None,
            entities: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }
}

/// Typed map of host-installed services, keyed by string.
///
/// Hosts use extensions to hand side-channel clients to workers without the
/// engine knowing their concrete types. A value is retrieved with the exact
/// type it was inserted with; trait objects must be inserted pre-coerced
/// (e.g. as `Arc<dyn Store>`).
#[derive(Default)]
pub struct Extensions {
    inner: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a value under a key, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.inner.insert(key.into(), Box::new(value));
    }

    /// Retrieve a value by key, if present and of the requested type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.inner.get(key)?.downcast_ref::<T>()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("keys", &self.inner.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Execution context for one worker invocation.
pub struct WorkerContext {
    pass_id: String,
    node_id: NodeId,
    silent: bool,
    display_enabled: bool,
    payload: Option<Arc<EventPayload>>,
    extensions: Arc<Extensions>,
    cache: Arc<dyn WorkerCache>,
    sink: Arc<dyn EventSink>,
    displayed: AtomicBool,
}

impl WorkerContext {
    /// Context with no payload, empty extensions, a null cache, and a null
    /// sink. The engine layers the real collaborators on with the `with_*`
    /// builders.
    pub fn new(pass_id: impl Into<String>, node_id: impl Into<NodeId>) -> Self {
        Self {
            pass_id: pass_id.into(),
            node_id: node_id.into(),
            silent: false,
            display_enabled: true,
            payload: None,
            extensions: Arc::new(Extensions::new()),
            cache: Arc::new(NullCache),
            sink: Arc::new(NullEventSink),
            displayed: AtomicBool::new(false),
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Enable or disable the display channel for this node. The engine sets
    /// this from the component's `display` flag.
    pub fn with_display(mut self, enabled: bool) -> Self {
        self.display_enabled = enabled;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Arc<EventPayload>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_extensions(mut self, extensions: impl Into<Arc<Extensions>>) -> Self {
        self.extensions = extensions.into();
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn WorkerCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn pass_id(&self) -> &str {
        &self.pass_id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    /// The inbound event for this pass, if the invocation carried one.
    pub fn payload(&self) -> Option<&EventPayload> {
        self.payload.as_deref()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Retrieve a required extension, failing with [`EngineError::ExtensionNotFound`]
    /// when it was never installed.
    pub fn extension<T: Any + Send + Sync>(&self, key: &str) -> Result<&T> {
        self.extensions
            .get::<T>(key)
            .ok_or_else(|| EngineError::ExtensionNotFound(key.to_string()))
    }

    pub fn cache(&self) -> &dyn WorkerCache {
        self.cache.as_ref()
    }

    /// Surface a human-readable result for this node.
    ///
    /// Delivery is suppressed when the component did not opt in to display,
    /// when the invocation is silent, or when the node already displayed
    /// once this pass. Sink failures are ignored.
    pub fn display(&self, message: impl Into<String>) {
        if !self.display_enabled || self.silent {
            return;
        }
        if self.displayed.swap(true, Ordering::Relaxed) {
            return;
        }
        let _ = self.sink.send(PassEvent::NodeDisplay {
            node_id: self.node_id.clone(),
            pass_id: self.pass_id.clone(),
            message: message.into(),
        });
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("pass_id", &self.pass_id)
            .field("node_id", &self.node_id)
            .field("silent", &self.silent)
            .field("display_enabled", &self.display_enabled)
            .finish()
    }
}
