//! Terminal node that displays and forwards a spell's result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use spell_engine::{
    BuildResult, Component, ComponentCategory, ComponentMetadata, NodeShape, OutputMap,
    PortSpec, Result, SocketType, WorkerContext, WorkerInputs, WorkerNode,
};

/// Renders its input as text, surfaces it through the display channel, and
/// forwards it so downstream connectors can pick it up.
pub struct Output;

impl Output {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_TRIGGER: &'static str = "trigger";
    pub const PORT_OUTPUT: &'static str = "output";

    fn render(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl Component for Output {
    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            name: "output".to_string(),
            label: "Output".to_string(),
            category: ComponentCategory::Io,
            info: "Displays and forwards the final value of a spell".to_string(),
            display: true,
            run_from_cache: false,
        }
    }

    fn build(&self, shape: &mut NodeShape) -> BuildResult<()> {
        shape
            .add_input(PortSpec::new(Self::PORT_INPUT, "Input", SocketType::Any))?
            .add_input(
                PortSpec::new(Self::PORT_TRIGGER, "Trigger", SocketType::Trigger).multi(),
            )?
            .add_output(PortSpec::new(
                Self::PORT_OUTPUT,
                "Output",
                SocketType::String,
            ))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: WorkerNode,
        inputs: WorkerInputs,
        cx: WorkerContext,
    ) -> Result<OutputMap> {
        let value = inputs.first(Self::PORT_INPUT).cloned().unwrap_or(Value::Null);
        let text = Self::render(&value);
        log::debug!("Output {}: forwarding {} chars", node.id(), text.len());
        cx.display(text.clone());
        let mut outputs = OutputMap::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), Value::String(text));
        Ok(outputs)
    }
}

inventory::submit!(spell_engine::ComponentEntry(|| Arc::new(Output)));
