//! The component contract: metadata, builder, and worker.
//!
//! A component is a reusable node definition. Its `build` method declares
//! the node's shape (ports and controls) and its `worker` method runs once
//! per node per pass, turning resolved inputs into output values.
//!
//! # Example
//!
//! ```ignore
//! struct Uppercase;
//!
//! #[async_trait]
//! impl Component for Uppercase {
//!     fn metadata(&self) -> ComponentMetadata {
//!         ComponentMetadata {
//!             name: "uppercase".to_string(),
//!             label: "Uppercase".to_string(),
//!             category: ComponentCategory::Processing,
//!             info: "Uppercases its text input".to_string(),
//!             display: false,
//!             run_from_cache: false,
//!         }
//!     }
//!
//!     fn build(&self, shape: &mut NodeShape) -> BuildResult<()> {
//!         shape
//!             .add_input(PortSpec::new("text", "Text", SocketType::String))?
//!             .add_output(PortSpec::new("text", "Text", SocketType::String))?;
//!         Ok(())
//!     }
//!
//!     async fn worker(
//!         &self,
//!         _node: WorkerNode,
//!         inputs: WorkerInputs,
//!         _cx: WorkerContext,
//!     ) -> Result<OutputMap> {
//!         let text = inputs.first("text").and_then(|v| v.as_str()).unwrap_or("");
//!         let mut outputs = OutputMap::new();
//!         outputs.insert("text".to_string(), text.to_uppercase().into());
//!         Ok(outputs)
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::WorkerContext;
use crate::error::{BuildResult, Result};
use crate::node::{NodeShape, WorkerInputs, WorkerNode};

/// Values produced by one worker invocation, keyed by output port name.
///
/// Ports the worker leaves unwritten propagate as JSON `null` to their
/// downstream consumers.
pub type OutputMap = HashMap<String, Value>;

/// Palette grouping for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Event ingestion and recall.
    Event,
    /// Inputs and outputs at the spell boundary.
    Io,
    /// Control-flow utilities.
    Flow,
    /// Value transformation.
    Processing,
}

/// Static description of a component, served to editors and clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    /// Registry identity. Spell descriptions reference this name.
    pub name: String,
    /// Human-readable label shown in editors.
    pub label: String,
    pub category: ComponentCategory,
    /// One-line description of what the component does.
    pub info: String,
    /// Whether the node surfaces its result through the display channel.
    pub display: bool,
    /// Whether repeated invocations with identical controls and inputs may
    /// be served from the worker cache.
    pub run_from_cache: bool,
}

/// A reusable node definition: shape builder plus async worker.
#[async_trait]
pub trait Component: Send + Sync {
    /// Static metadata for this component.
    fn metadata(&self) -> ComponentMetadata;

    /// Declare the node's ports and controls.
    ///
    /// Must be deterministic: the engine rebuilds shapes on every compile
    /// and expects the same result each time.
    fn build(&self, shape: &mut NodeShape) -> BuildResult<()>;

    /// Execute the node. Runs at most once per node per pass.
    async fn worker(
        &self,
        node: WorkerNode,
        inputs: WorkerInputs,
        cx: WorkerContext,
    ) -> Result<OutputMap>;

    /// The shape this component declares, built fresh.
    fn describe(&self) -> BuildResult<NodeShape> {
        let mut shape = NodeShape::new();
        self.build(&mut shape)?;
        Ok(shape)
    }
}
