//! Event store access for recall components.
//!
//! Recall nodes read prior events through the [`EventStore`] trait. Hosts
//! install a store into the engine's extensions under [`EVENT_STORE_KEY`],
//! pre-coerced to `Arc<dyn EventStore>`:
//!
//! ```ignore
//! let store: Arc<dyn EventStore> = Arc::new(HttpEventStore::new("http://localhost:8001"));
//! let mut extensions = Extensions::new();
//! extensions.insert(EVENT_STORE_KEY, store);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spell_engine::{EngineError, Result};

/// Extension key under which hosts install an `Arc<dyn EventStore>`.
pub const EVENT_STORE_KEY: &str = "event_store";

/// A stored event, as returned by the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    pub observer: String,
    pub channel: String,
    pub client: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Filter for an event store query.
///
/// Serialized field names match the store's wire parameters, including the
/// mixed `maxCount` / `max_time_diff` casing the store expects. A
/// `max_time_diff` of `-1` (or `0`) means unbounded; the value is passed
/// through untouched for the store to interpret. `entities` collapses into
/// a single comma-joined parameter, since a query string cannot carry a
/// sequence field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventQuery {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    pub observer: String,
    pub channel: String,
    pub client: String,
    #[serde(serialize_with = "join_entities")]
    pub entities: Vec<String>,
    #[serde(rename = "maxCount")]
    pub max_count: i64,
    pub max_time_diff: i64,
}

fn join_entities<S: serde::Serializer>(
    entities: &[String],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&entities.join(","))
}

/// Read access to previously recorded events.
///
/// `Ok(None)` means the store had nothing for the query or politely
/// declined; recall nodes treat it as an empty result, not a failure.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn query(&self, query: &EventQuery) -> Result<Option<Vec<EventRecord>>>;
}

/// Event store backed by the platform's HTTP event service.
#[derive(Debug, Clone)]
pub struct HttpEventStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEventStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/event", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EventStore for HttpEventStore {
    async fn query(&self, query: &EventQuery) -> Result<Option<Vec<EventRecord>>> {
        let response = self
            .client
            .get(self.endpoint())
            .query(query)
            .send()
            .await
            .map_err(|err| EngineError::failed(format!("event store request failed: {err}")))?;

        // Non-success is an empty recall, never a node failure.
        if !response.status().is_success() {
            log::warn!(
                "Event store returned {} for recall query, treating as empty",
                response.status()
            );
            return Ok(None);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| EngineError::failed(format!("event store response unreadable: {err}")))?;

        // The store wraps records in an `event` field.
        match body.get("event") {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(events) => {
                let records: Vec<EventRecord> = serde_json::from_value(events.clone())?;
                Ok(Some(records))
            }
        }
    }
}
