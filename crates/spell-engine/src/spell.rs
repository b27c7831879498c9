//! Serialized spell descriptions.
//!
//! A spell is the portable, editor-authored form of a graph: nodes keyed by
//! id, each naming its component, its authored control data, and the
//! connections arriving at its input ports. Descriptions are plain data;
//! [`crate::graph::SpellGraph::compile`] turns them into something runnable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::NodeId;

/// One end of a connection: an output port on a source node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSource {
    /// Source node id.
    pub node: NodeId,
    /// Output port on the source node.
    pub output: String,
}

/// A node as authored: component reference, control data, and inbound
/// connections keyed by input port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
    /// Component name this node instantiates.
    #[serde(default)]
    pub component: String,
    /// Authored control values, keyed by control key.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Connections arriving at each input port, in declaration order.
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<ConnectionSource>>,
}

/// A complete serialized spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellDescription {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, NodeDescription>,
}

impl SpellDescription {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeDescription> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Fluent construction of spell descriptions, mostly for hosts and tests.
///
/// Connections may be declared before their target node; compilation
/// reports the dangling reference if the node never materializes.
#[derive(Debug, Clone)]
pub struct SpellBuilder {
    description: SpellDescription,
}

impl SpellBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            description: SpellDescription::new(id, name),
        }
    }

    /// Add a node with no authored data.
    pub fn add_node(self, id: impl Into<NodeId>, component: impl Into<String>) -> Self {
        self.add_node_with_data(id, component, Value::Null)
    }

    /// Add a node with authored control data. A JSON object becomes the
    /// node's data map; any other value leaves the map empty.
    pub fn add_node_with_data(
        mut self,
        id: impl Into<NodeId>,
        component: impl Into<String>,
        data: Value,
    ) -> Self {
        let data = match data {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        let entry = self.description.nodes.entry(id.into()).or_default();
        entry.component = component.into();
        entry.data = data;
        self
    }

    /// Connect an output port on `source` to an input port on `target`.
    pub fn connect(
        mut self,
        source: impl Into<NodeId>,
        output: impl Into<String>,
        target: impl Into<NodeId>,
        input: impl Into<String>,
    ) -> Self {
        self.description
            .nodes
            .entry(target.into())
            .or_default()
            .inputs
            .entry(input.into())
            .or_default()
            .push(ConnectionSource {
                node: source.into(),
                output: output.into(),
            });
        self
    }

    pub fn build(self) -> SpellDescription {
        self.description
    }
}
