//! Entry node that surfaces the pass's inbound event.

use std::sync::Arc;

use async_trait::async_trait;
use spell_engine::{
    BuildResult, Component, ComponentCategory, ComponentMetadata, EngineError, NodeShape,
    OutputMap, PortSpec, Result, SocketType, WorkerContext, WorkerInputs, WorkerNode,
};

/// Provides the event payload the pass was invoked with. Spells that react
/// to inbound events start here: the `event` output feeds recall and
/// processing nodes, and the `trigger` output fires the rest of the graph.
pub struct EventInput;

impl EventInput {
    pub const PORT_EVENT: &'static str = "event";
    pub const PORT_TRIGGER: &'static str = "trigger";
}

#[async_trait]
impl Component for EventInput {
    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            name: "event-input".to_string(),
            label: "Event Input".to_string(),
            category: ComponentCategory::Event,
            info: "Provides the inbound event that initiated the pass".to_string(),
            display: false,
            run_from_cache: false,
        }
    }

    fn build(&self, shape: &mut NodeShape) -> BuildResult<()> {
        shape
            .add_output(PortSpec::new(
                Self::PORT_EVENT,
                "Event",
                SocketType::Event,
            ))?
            .add_output(PortSpec::new(
                Self::PORT_TRIGGER,
                "Trigger",
                SocketType::Trigger,
            ))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: WorkerNode,
        _inputs: WorkerInputs,
        cx: WorkerContext,
    ) -> Result<OutputMap> {
        let payload = cx
            .payload()
            .ok_or_else(|| EngineError::failed("no event payload supplied for this pass"))?;
        log::debug!(
            "EventInput {}: surfacing event from sender '{}'",
            node.id(),
            payload.sender
        );
        let mut outputs = OutputMap::new();
        outputs.insert(
            Self::PORT_EVENT.to_string(),
            serde_json::to_value(payload)?,
        );
        Ok(outputs)
    }
}

inventory::submit!(spell_engine::ComponentEntry(|| Arc::new(EventInput)));
