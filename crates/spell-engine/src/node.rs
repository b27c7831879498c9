//! Node shapes, ports, controls, and the values handed to workers.
//!
//! A component's builder populates a [`NodeShape`]: the declared input and
//! output ports plus the controls an editor would render for the node. At
//! execution time a worker receives a [`WorkerNode`] (identity and authored
//! control values) and a [`WorkerInputs`] map (resolved upstream values, in
//! arrival order per port).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BuildResult, StructuralError};
use crate::socket::SocketType;

/// Unique identifier for a node within a spell.
pub type NodeId = String;

/// A declared input or output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    /// Port name, unique per direction within a node.
    pub name: String,
    /// Human-readable label shown in editors.
    pub label: String,
    /// Socket carried by the port.
    pub socket: SocketType,
    /// Whether the port accepts multiple connections.
    #[serde(default)]
    pub multi: bool,
}

impl PortSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        socket: SocketType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            socket,
            multi: false,
        }
    }

    /// Allow multiple connections on this port. Multi data inputs collect a
    /// fan-in and are never treated as required.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// A non-multi data port must be satisfied by a connection or a seeded
    /// value before the node can run.
    pub fn is_required(&self) -> bool {
        !self.multi && !self.socket.is_trigger()
    }
}

/// The widget kind an editor renders for a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlKind {
    Text,
    Number,
    Select { options: Vec<String> },
}

/// An authored configuration field on a node.
///
/// Control values live in the node's `data` map under the control key and
/// reach the worker through [`WorkerNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSpec {
    pub key: String,
    pub label: String,
    pub kind: ControlKind,
}

impl ControlSpec {
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: ControlKind::Text,
        }
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: ControlKind::Number,
        }
    }

    pub fn select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: ControlKind::Select { options },
        }
    }
}

/// The declared surface of a node: ports and controls.
///
/// Built by a component's `build` method. Port names are unique per
/// direction; the same name may appear as both an input and an output
/// (components commonly declare `trigger` on both sides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeShape {
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    controls: Vec<ControlSpec>,
}

impl NodeShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input port. Rejects duplicate names.
    pub fn add_input(&mut self, port: PortSpec) -> BuildResult<&mut Self> {
        if self.inputs.iter().any(|p| p.name == port.name) {
            return Err(StructuralError::DuplicatePort { port: port.name });
        }
        self.inputs.push(port);
        Ok(self)
    }

    /// Declare an output port. Rejects duplicate names.
    pub fn add_output(&mut self, port: PortSpec) -> BuildResult<&mut Self> {
        if self.outputs.iter().any(|p| p.name == port.name) {
            return Err(StructuralError::DuplicatePort { port: port.name });
        }
        self.outputs.push(port);
        Ok(self)
    }

    /// Declare a control. Rejects duplicate keys.
    pub fn add_control(&mut self, control: ControlSpec) -> BuildResult<&mut Self> {
        if self.controls.iter().any(|c| c.key == control.key) {
            return Err(StructuralError::DuplicateControl { key: control.key });
        }
        self.controls.push(control);
        Ok(self)
    }

    pub fn input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn control(&self, key: &str) -> Option<&ControlSpec> {
        self.controls.iter().find(|c| c.key == key)
    }

    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    pub fn controls(&self) -> &[ControlSpec] {
        &self.controls
    }
}

/// The node identity and authored data handed to a worker.
#[derive(Debug, Clone)]
pub struct WorkerNode {
    id: NodeId,
    component: String,
    data: BTreeMap<String, Value>,
}

impl WorkerNode {
    pub fn new(
        id: impl Into<NodeId>,
        component: impl Into<String>,
        data: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the component this node was instantiated from.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The full authored data map, keyed by control key.
    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn control(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Control value as a string, if present and textual.
    pub fn control_str(&self, key: &str) -> Option<&str> {
        self.data.get(key)?.as_str()
    }

    /// Control value as an integer. Accepts both JSON numbers and numeric
    /// strings, since editors commonly author numbers as text.
    pub fn control_i64(&self, key: &str) -> Option<i64> {
        match self.data.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Resolved input values for one worker invocation, keyed by input port.
///
/// Each port maps to the values that arrived on it: the seeded value first
/// (if any), then one value per connection in declaration order. Trigger
/// ports never appear here.
#[derive(Debug, Clone, Default)]
pub struct WorkerInputs {
    values: HashMap<String, Vec<Value>>,
}

impl WorkerInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to a port's arrival list.
    pub fn push(&mut self, port: impl Into<String>, value: Value) {
        self.values.entry(port.into()).or_default().push(value);
    }

    /// The first value that arrived on a port. For non-multi ports this is
    /// the only value.
    pub fn first(&self, port: &str) -> Option<&Value> {
        self.values.get(port).and_then(|v| v.first())
    }

    /// Every value that arrived on a port, empty if none did.
    pub fn all(&self, port: &str) -> &[Value] {
        self.values.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, port: &str) -> bool {
        self.values.contains_key(port)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The underlying port map, used when fingerprinting inputs.
    pub fn as_map(&self) -> &HashMap<String, Vec<Value>> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_rejects_duplicate_ports_per_direction() {
        let mut shape = NodeShape::new();
        shape
            .add_input(PortSpec::new("event", "Event", SocketType::Event))
            .unwrap();
        let err = shape
            .add_input(PortSpec::new("event", "Event Again", SocketType::Any))
            .unwrap_err();
        assert!(matches!(err, StructuralError::DuplicatePort { port } if port == "event"));

        // Same name is fine on the other direction.
        shape
            .add_output(PortSpec::new("event", "Event", SocketType::Event))
            .unwrap();
        assert!(shape.input("event").is_some());
        assert!(shape.output("event").is_some());
    }

    #[test]
    fn test_shape_rejects_duplicate_controls() {
        let mut shape = NodeShape::new();
        shape
            .add_control(ControlSpec::text("name", "Name"))
            .unwrap();
        let err = shape
            .add_control(ControlSpec::number("name", "Name"))
            .unwrap_err();
        assert!(matches!(err, StructuralError::DuplicateControl { key } if key == "name"));
    }

    #[test]
    fn test_builder_calls_chain() {
        let mut shape = NodeShape::new();
        shape
            .add_input(PortSpec::new("trigger", "Trigger", SocketType::Trigger).multi())
            .unwrap()
            .add_output(PortSpec::new("output", "Output", SocketType::String))
            .unwrap()
            .add_control(ControlSpec::select(
                "mode",
                "Mode",
                vec!["first".to_string(), "last".to_string()],
            ))
            .unwrap();
        assert_eq!(shape.inputs().len(), 1);
        assert_eq!(shape.outputs().len(), 1);
        assert_eq!(shape.controls().len(), 1);
        assert!(shape.input("trigger").unwrap().multi);
    }

    #[test]
    fn test_required_excludes_trigger_and_multi() {
        let required = PortSpec::new("event", "Event", SocketType::Event);
        let fan_in = PortSpec::new("items", "Items", SocketType::String).multi();
        let trigger = PortSpec::new("trigger", "Trigger", SocketType::Trigger);
        assert!(required.is_required());
        assert!(!fan_in.is_required());
        assert!(!trigger.is_required());
    }

    #[test]
    fn test_worker_node_control_parsing() {
        let mut data = BTreeMap::new();
        data.insert("max_count".to_string(), json!("10"));
        data.insert("max_time_diff".to_string(), json!(-1));
        data.insert("type".to_string(), json!("chat"));
        data.insert("flag".to_string(), json!(true));
        let node = WorkerNode::new("recall-1", "event-recall", data);

        assert_eq!(node.control_i64("max_count"), Some(10));
        assert_eq!(node.control_i64("max_time_diff"), Some(-1));
        assert_eq!(node.control_str("type"), Some("chat"));
        assert_eq!(node.control_i64("type"), None);
        assert_eq!(node.control_i64("flag"), None);
        assert_eq!(node.control_i64("absent"), None);
        assert_eq!(node.component(), "event-recall");
    }

    #[test]
    fn test_worker_inputs_arrival_order() {
        let mut inputs = WorkerInputs::new();
        inputs.push("items", json!("a"));
        inputs.push("items", json!("b"));
        inputs.push("text", json!("hello"));

        assert_eq!(inputs.first("items"), Some(&json!("a")));
        assert_eq!(inputs.all("items"), &[json!("a"), json!("b")]);
        assert_eq!(inputs.all("missing"), &[] as &[Value]);
        assert!(inputs.first("missing").is_none());
        assert!(inputs.contains("text"));
        assert_eq!(inputs.len(), 2);
    }
}
