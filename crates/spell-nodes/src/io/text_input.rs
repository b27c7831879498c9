//! Static text source.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use spell_engine::{
    BuildResult, Component, ComponentCategory, ComponentMetadata, ControlSpec, NodeShape,
    OutputMap, PortSpec, Result, SocketType, WorkerContext, WorkerInputs, WorkerNode,
};

/// Emits the text authored in its `text` control. Useful for prompts,
/// fixed parameters, and wiring test fixtures.
pub struct TextInput;

impl TextInput {
    pub const PORT_TEXT: &'static str = "text";
    pub const PORT_TRIGGER: &'static str = "trigger";
    pub const CONTROL_TEXT: &'static str = "text";
}

#[async_trait]
impl Component for TextInput {
    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            name: "text-input".to_string(),
            label: "Text Input".to_string(),
            category: ComponentCategory::Io,
            info: "Emits authored text".to_string(),
            display: false,
            run_from_cache: false,
        }
    }

    fn build(&self, shape: &mut NodeShape) -> BuildResult<()> {
        shape
            .add_input(
                PortSpec::new(Self::PORT_TRIGGER, "Trigger", SocketType::Trigger).multi(),
            )?
            .add_output(PortSpec::new(Self::PORT_TEXT, "Text", SocketType::String))?
            .add_output(PortSpec::new(
                Self::PORT_TRIGGER,
                "Trigger",
                SocketType::Trigger,
            ))?
            .add_control(ControlSpec::text(Self::CONTROL_TEXT, "Text"))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: WorkerNode,
        _inputs: WorkerInputs,
        _cx: WorkerContext,
    ) -> Result<OutputMap> {
        let text = node.control_str(Self::CONTROL_TEXT).unwrap_or_default();
        log::debug!("TextInput {}: emitting {} chars", node.id(), text.len());
        let mut outputs = OutputMap::new();
        outputs.insert(Self::PORT_TEXT.to_string(), Value::String(text.to_string()));
        Ok(outputs)
    }
}

inventory::submit!(spell_engine::ComponentEntry(|| Arc::new(TextInput)));
