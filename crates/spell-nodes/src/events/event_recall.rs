//! Recall of prior events matching the current event's identities.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use spell_engine::{
    BuildResult, Component, ComponentCategory, ComponentMetadata, ControlSpec, EngineError,
    EventPayload, NodeShape, OutputMap, PortSpec, Result, SocketType, WorkerContext,
    WorkerInputs, WorkerNode,
};

use super::store::{EventQuery, EventStore, EVENT_STORE_KEY};

/// Queries the event store for prior events involving the same sender,
/// observer, channel, client, and entities as the inbound event, and emits
/// them as a JSON string.
///
/// The `type` control filters by event kind (lowercased breed like `chat`,
/// defaulting to `none`), `max_count` bounds the result size, and
/// `max_time_diff` bounds event age, with `-1` meaning unbounded. An empty
/// or unavailable store yields an empty string, not a failure.
pub struct EventRecall;

impl EventRecall {
    pub const PORT_EVENT: &'static str = "event";
    pub const PORT_TRIGGER: &'static str = "trigger";
    pub const PORT_OUTPUT: &'static str = "output";

    pub const CONTROL_NAME: &'static str = "name";
    pub const CONTROL_TYPE: &'static str = "type";
    pub const CONTROL_MAX_COUNT: &'static str = "max_count";
    pub const CONTROL_MAX_TIME_DIFF: &'static str = "max_time_diff";

    const DEFAULT_TYPE: &'static str = "none";
    const DEFAULT_MAX_COUNT: i64 = 10;
    const DEFAULT_MAX_TIME_DIFF: i64 = -1;

    /// The event this invocation recalls against: the `event` input when it
    /// carries a value, otherwise the pass payload.
    fn resolve_event(inputs: &WorkerInputs, cx: &WorkerContext) -> Result<EventPayload> {
        match inputs
            .first(Self::PORT_EVENT)
            .filter(|value| !value.is_null())
        {
            Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                EngineError::InvalidInputType {
                    port: Self::PORT_EVENT.to_string(),
                    expected: "event object".to_string(),
                }
            }),
            None => cx.payload().cloned().ok_or_else(|| {
                EngineError::failed(
                    "no event available: connect an event input or invoke with a payload",
                )
            }),
        }
    }
}

#[async_trait]
impl Component for EventRecall {
    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            name: "event-recall".to_string(),
            label: "Event Recall".to_string(),
            category: ComponentCategory::Event,
            info: "Recalls stored events matching the inbound event's identities".to_string(),
            display: true,
            run_from_cache: true,
        }
    }

    fn build(&self, shape: &mut NodeShape) -> BuildResult<()> {
        shape
            .add_input(PortSpec::new(Self::PORT_EVENT, "Event", SocketType::Event))?
            .add_input(
                PortSpec::new(Self::PORT_TRIGGER, "Trigger", SocketType::Trigger).multi(),
            )?
            .add_output(PortSpec::new(Self::PORT_OUTPUT, "Events", SocketType::Any))?
            .add_output(PortSpec::new(
                Self::PORT_TRIGGER,
                "Trigger",
                SocketType::Trigger,
            ))?
            .add_control(ControlSpec::text(Self::CONTROL_NAME, "Name"))?
            .add_control(ControlSpec::text(Self::CONTROL_TYPE, "Type"))?
            .add_control(ControlSpec::number(Self::CONTROL_MAX_COUNT, "Max Count"))?
            .add_control(ControlSpec::number(
                Self::CONTROL_MAX_TIME_DIFF,
                "Max Time Diff",
            ))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: WorkerNode,
        inputs: WorkerInputs,
        cx: WorkerContext,
    ) -> Result<OutputMap> {
        let event = Self::resolve_event(&inputs, &cx)?;

        let event_type = node
            .control_str(Self::CONTROL_TYPE)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_TYPE.to_string());
        let max_count = node
            .control_i64(Self::CONTROL_MAX_COUNT)
            .unwrap_or(Self::DEFAULT_MAX_COUNT);
        let max_time_diff = node
            .control_i64(Self::CONTROL_MAX_TIME_DIFF)
            .unwrap_or(Self::DEFAULT_MAX_TIME_DIFF);

        let query = EventQuery {
            event_type,
            sender: event.sender,
            observer: event.observer,
            channel: event.channel,
            client: event.client,
            entities: event.entities,
            max_count,
            max_time_diff,
        };

        log::debug!(
            "EventRecall {}: querying store (type={}, max_count={}, max_time_diff={})",
            node.id(),
            query.event_type,
            query.max_count,
            query.max_time_diff
        );

        let store = cx.extension::<Arc<dyn EventStore>>(EVENT_STORE_KEY)?;
        let conversation = match store.query(&query).await? {
            Some(records) => serde_json::to_string(&records)?,
            None => String::new(),
        };

        if conversation.is_empty() {
            cx.display("no prior events found");
        } else {
            cx.display(conversation.clone());
        }

        let mut outputs = OutputMap::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), Value::String(conversation));
        Ok(outputs)
    }
}

inventory::submit!(spell_engine::ComponentEntry(|| Arc::new(EventRecall)));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::store::EventRecord;
    use serde_json::json;
    use spell_engine::Extensions;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Store that records queries and replies with a fixed result.
    struct FixedStore {
        records: Option<Vec<EventRecord>>,
        queries: Mutex<Vec<EventQuery>>,
    }

    impl FixedStore {
        fn new(records: Option<Vec<EventRecord>>) -> Arc<Self> {
            Arc::new(Self {
                records,
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<EventQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventStore for FixedStore {
        async fn query(&self, query: &EventQuery) -> Result<Option<Vec<EventRecord>>> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.records.clone())
        }
    }

    fn record(content: &str) -> EventRecord {
        EventRecord {
            event_type: "chat".to_string(),
            sender: "u1".to_string(),
            observer: "o1".to_string(),
            channel: "c1".to_string(),
            client: "sys".to_string(),
            content: content.to_string(),
            entities: Vec::new(),
            date: None,
        }
    }

    fn context_with(store: Arc<FixedStore>) -> WorkerContext {
        let mut extensions = Extensions::new();
        extensions.insert(EVENT_STORE_KEY, store as Arc<dyn EventStore>);
        let payload = EventPayload::new("u1", "o1", "c1", "sys")
            .with_entities(vec!["u1".to_string(), "o1".to_string()]);
        WorkerContext::new("pass-1", "recall-1")
            .with_extensions(extensions)
            .with_payload(payload)
    }

    fn controls(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn worker_node(data: BTreeMap<String, Value>) -> WorkerNode {
        WorkerNode::new("recall-1", "event-recall", data)
    }

    #[tokio::test]
    async fn test_recalls_and_serializes_records() {
        let records = vec![record("hello"), record("again")];
        let store = FixedStore::new(Some(records.clone()));
        let data = controls(&[
            ("type", json!("chat")),
            ("max_count", json!("10")),
            ("max_time_diff", json!("-1")),
        ]);

        let outputs = EventRecall
            .worker(
                worker_node(data),
                WorkerInputs::new(),
                context_with(store.clone()),
            )
            .await
            .unwrap();

        let expected = serde_json::to_string(&records).unwrap();
        assert_eq!(outputs[EventRecall::PORT_OUTPUT], json!(expected));

        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].event_type, "chat");
        assert_eq!(queries[0].sender, "u1");
        assert_eq!(queries[0].observer, "o1");
        assert_eq!(queries[0].channel, "c1");
        assert_eq!(queries[0].client, "sys");
        assert_eq!(queries[0].entities, vec!["u1", "o1"]);
        assert_eq!(queries[0].max_count, 10);
        assert_eq!(queries[0].max_time_diff, -1);
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_string() {
        let store = FixedStore::new(None);
        let outputs = EventRecall
            .worker(
                worker_node(BTreeMap::new()),
                WorkerInputs::new(),
                context_with(store),
            )
            .await
            .unwrap();
        assert_eq!(outputs[EventRecall::PORT_OUTPUT], json!(""));
    }

    #[tokio::test]
    async fn test_control_defaults() {
        let store = FixedStore::new(Some(Vec::new()));
        EventRecall
            .worker(
                worker_node(BTreeMap::new()),
                WorkerInputs::new(),
                context_with(store.clone()),
            )
            .await
            .unwrap();

        let queries = store.queries();
        assert_eq!(queries[0].event_type, "none");
        assert_eq!(queries[0].max_count, 10);
        assert_eq!(queries[0].max_time_diff, -1);
    }

    #[tokio::test]
    async fn test_type_control_normalized() {
        let store = FixedStore::new(Some(Vec::new()));
        let data = controls(&[("type", json!("  CHAT "))]);
        EventRecall
            .worker(worker_node(data), WorkerInputs::new(), context_with(store.clone()))
            .await
            .unwrap();
        assert_eq!(store.queries()[0].event_type, "chat");

        let blank = FixedStore::new(Some(Vec::new()));
        let data = controls(&[("type", json!("   "))]);
        EventRecall
            .worker(worker_node(data), WorkerInputs::new(), context_with(blank.clone()))
            .await
            .unwrap();
        assert_eq!(blank.queries()[0].event_type, "none");
    }

    #[tokio::test]
    async fn test_max_time_diff_passed_through_unchanged() {
        let store = FixedStore::new(Some(Vec::new()));
        let data = controls(&[("max_time_diff", json!("86400"))]);
        EventRecall
            .worker(worker_node(data), WorkerInputs::new(), context_with(store.clone()))
            .await
            .unwrap();
        assert_eq!(store.queries()[0].max_time_diff, 86400);
    }

    #[tokio::test]
    async fn test_event_input_beats_payload() {
        let store = FixedStore::new(Some(Vec::new()));
        let mut inputs = WorkerInputs::new();
        inputs.push(
            EventRecall::PORT_EVENT,
            json!({
                "sender": "other-sender",
                "observer": "other-observer",
                "channel": "other-channel",
                "client": "other-client",
                "entities": ["other-sender", "other-observer"]
            }),
        );

        EventRecall
            .worker(worker_node(BTreeMap::new()), inputs, context_with(store.clone()))
            .await
            .unwrap();

        assert_eq!(store.queries()[0].sender, "other-sender");
        assert_eq!(store.queries()[0].observer, "other-observer");
        assert_eq!(
            store.queries()[0].entities,
            vec!["other-sender", "other-observer"]
        );
    }

    #[tokio::test]
    async fn test_null_event_input_falls_back_to_payload() {
        let store = FixedStore::new(Some(Vec::new()));
        let mut inputs = WorkerInputs::new();
        inputs.push(EventRecall::PORT_EVENT, Value::Null);

        EventRecall
            .worker(worker_node(BTreeMap::new()), inputs, context_with(store.clone()))
            .await
            .unwrap();

        assert_eq!(store.queries()[0].sender, "u1");
    }

    #[tokio::test]
    async fn test_malformed_event_input_rejected() {
        let store = FixedStore::new(Some(Vec::new()));
        let mut inputs = WorkerInputs::new();
        inputs.push(EventRecall::PORT_EVENT, json!("not an event"));

        let result = EventRecall
            .worker(worker_node(BTreeMap::new()), inputs, context_with(store))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidInputType { port, .. }) if port == "event"
        ));
    }

    #[tokio::test]
    async fn test_missing_store_extension_fails() {
        let cx = WorkerContext::new("pass-1", "recall-1")
            .with_payload(EventPayload::new("u1", "o1", "c1", "sys"));
        let result = EventRecall
            .worker(worker_node(BTreeMap::new()), WorkerInputs::new(), cx)
            .await;
        assert!(matches!(
            result,
            Err(EngineError::ExtensionNotFound(key)) if key == EVENT_STORE_KEY
        ));
    }

    #[test]
    fn test_shape_declares_recall_surface() {
        let shape = EventRecall.describe().unwrap();
        assert_eq!(shape.input("event").unwrap().socket, SocketType::Event);
        assert!(shape.input("trigger").unwrap().multi);
        assert_eq!(shape.output("output").unwrap().socket, SocketType::Any);
        assert!(shape.output("trigger").unwrap().socket.is_trigger());
        assert_eq!(shape.controls().len(), 4);
        assert!(shape.control("max_time_diff").is_some());
    }
}
