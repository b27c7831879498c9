//! Fan-in joiner for text values.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use spell_engine::{
    BuildResult, Component, ComponentCategory, ComponentMetadata, ControlSpec, NodeShape,
    OutputMap, PortSpec, Result, SocketType, WorkerContext, WorkerInputs, WorkerNode,
};

/// Joins every value arriving on its multi `items` input into one string,
/// separated by the `separator` control. Non-string values are rendered as
/// JSON; nulls from untaken branches are dropped.
pub struct Join;

impl Join {
    pub const PORT_ITEMS: &'static str = "items";
    pub const PORT_TEXT: &'static str = "text";
    pub const CONTROL_SEPARATOR: &'static str = "separator";

    const DEFAULT_SEPARATOR: &'static str = " ";
}

#[async_trait]
impl Component for Join {
    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            name: "join".to_string(),
            label: "Join".to_string(),
            category: ComponentCategory::Processing,
            info: "Joins every arriving value into one string".to_string(),
            display: false,
            run_from_cache: false,
        }
    }

    fn build(&self, shape: &mut NodeShape) -> BuildResult<()> {
        shape
            .add_input(PortSpec::new(Self::PORT_ITEMS, "Items", SocketType::Any).multi())?
            .add_output(PortSpec::new(Self::PORT_TEXT, "Text", SocketType::String))?
            .add_control(ControlSpec::text(Self::CONTROL_SEPARATOR, "Separator"))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: WorkerNode,
        inputs: WorkerInputs,
        _cx: WorkerContext,
    ) -> Result<OutputMap> {
        let separator = node
            .control_str(Self::CONTROL_SEPARATOR)
            .unwrap_or(Self::DEFAULT_SEPARATOR);
        let parts: Vec<String> = inputs
            .all(Self::PORT_ITEMS)
            .iter()
            .filter(|value| !value.is_null())
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        log::debug!("Join {}: joining {} values", node.id(), parts.len());
        let mut outputs = OutputMap::new();
        outputs.insert(
            Self::PORT_TEXT.to_string(),
            Value::String(parts.join(separator)),
        );
        Ok(outputs)
    }
}

inventory::submit!(spell_engine::ComponentEntry(|| Arc::new(Join)));
