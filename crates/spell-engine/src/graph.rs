//! Compiling spell descriptions into runnable graphs.
//!
//! Compilation resolves every node's component, runs its builder to obtain
//! the declared shape, validates every connection against those shapes, and
//! rejects cycles. All structural errors are collected into one
//! [`CompileError`] rather than reported one at a time.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use crate::component::{Component, ComponentMetadata};
use crate::error::{CompileError, StructuralError};
use crate::node::{NodeId, NodeShape};
use crate::registry::ComponentRegistry;
use crate::socket::SocketType;
use crate::spell::SpellDescription;

/// A node resolved against its component, ready to execute.
pub struct NodeInstance {
    pub id: NodeId,
    pub component: Arc<dyn Component>,
    pub metadata: ComponentMetadata,
    pub shape: NodeShape,
    pub data: BTreeMap<String, Value>,
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("id", &self.id)
            .field("component", &self.metadata.name)
            .finish()
    }
}

/// A validated connection between two ports.
///
/// `socket` is the destination port's socket; connections whose destination
/// is a trigger port gate activation instead of carrying data.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub source: NodeId,
    pub source_port: String,
    pub target: NodeId,
    pub target_port: String,
    pub socket: SocketType,
}

impl Connection {
    /// Whether this connection gates activation rather than carrying data.
    pub fn is_trigger(&self) -> bool {
        self.socket.is_trigger()
    }
}

/// A compiled, validated spell.
#[derive(Debug)]
pub struct SpellGraph {
    id: String,
    name: String,
    nodes: BTreeMap<NodeId, NodeInstance>,
    connections: Vec<Connection>,
}

impl SpellGraph {
    /// Compile a description against a registry.
    ///
    /// Runs every component builder, validates ports, sockets, and
    /// multiplicity, and checks for cycles. Returns every structural error
    /// found; a graph is only produced when there are none.
    pub fn compile(
        description: &SpellDescription,
        registry: &ComponentRegistry,
    ) -> Result<Self, CompileError> {
        let mut errors = Vec::new();
        let mut nodes: BTreeMap<NodeId, NodeInstance> = BTreeMap::new();

        for (id, desc) in &description.nodes {
            match registry.lookup(&desc.component) {
                None => errors.push(StructuralError::UnknownComponent {
                    node: id.clone(),
                    component: desc.component.clone(),
                }),
                Some(component) => {
                    let mut shape = NodeShape::new();
                    match component.build(&mut shape) {
                        Err(err) => errors.push(StructuralError::BuilderFailed {
                            node: id.clone(),
                            component: desc.component.clone(),
                            message: err.to_string(),
                        }),
                        Ok(()) => {
                            let metadata = component.metadata();
                            nodes.insert(
                                id.clone(),
                                NodeInstance {
                                    id: id.clone(),
                                    component,
                                    metadata,
                                    shape,
                                    data: desc.data.clone(),
                                },
                            );
                        }
                    }
                }
            }
        }

        let mut connections = Vec::new();
        for (id, desc) in &description.nodes {
            let Some(target) = nodes.get(id) else {
                // Node failed to resolve above; its error is already recorded.
                continue;
            };
            for (port_name, sources) in &desc.inputs {
                let Some(input) = target.shape.input(port_name) else {
                    errors.push(StructuralError::UnknownInputPort {
                        node: id.clone(),
                        port: port_name.clone(),
                    });
                    continue;
                };
                if !input.multi && sources.len() > 1 {
                    errors.push(StructuralError::TooManyConnections {
                        node: id.clone(),
                        port: port_name.clone(),
                        count: sources.len(),
                    });
                }
                for source in sources {
                    let Some(source_node) = nodes.get(&source.node) else {
                        if !description.nodes.contains_key(&source.node) {
                            errors.push(StructuralError::UnknownNode {
                                node: source.node.clone(),
                                referenced_by: id.clone(),
                            });
                        }
                        continue;
                    };
                    let Some(output) = source_node.shape.output(&source.output) else {
                        errors.push(StructuralError::UnknownOutputPort {
                            node: source.node.clone(),
                            port: source.output.clone(),
                        });
                        continue;
                    };
                    if !input.socket.accepts(&output.socket) {
                        errors.push(StructuralError::IncompatibleSockets {
                            source_node: source.node.clone(),
                            source_port: source.output.clone(),
                            source_socket: output.socket,
                            target: id.clone(),
                            target_port: port_name.clone(),
                            target_socket: input.socket,
                        });
                        continue;
                    }
                    connections.push(Connection {
                        source: source.node.clone(),
                        source_port: source.output.clone(),
                        target: id.clone(),
                        target_port: port_name.clone(),
                        socket: input.socket,
                    });
                }
            }
        }

        if has_cycle(description, &connections) {
            errors.push(StructuralError::CycleDetected);
        }

        if !errors.is_empty() {
            log::warn!(
                "Spell '{}' failed to compile: {} structural error(s)",
                description.id,
                errors.len()
            );
            return Err(CompileError { errors });
        }

        log::debug!(
            "Compiled spell '{}': {} nodes, {} connections",
            description.id,
            nodes.len(),
            connections.len()
        );
        Ok(Self {
            id: description.id.clone(),
            name: description.name.clone(),
            nodes,
            connections,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Every connection arriving at a node, in description order.
    pub fn incoming<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.target == node)
    }

    /// Every connection leaving a node.
    pub fn outgoing<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.source == node)
    }
}

/// Kahn's algorithm over the resolved connections. Nodes that failed to
/// resolve still participate by id so a cycle among them is not masked.
fn has_cycle(description: &SpellDescription, connections: &[Connection]) -> bool {
    let mut in_degree: HashMap<&str, usize> = description
        .nodes
        .keys()
        .map(|id| (id.as_str(), 0))
        .collect();
    for connection in connections {
        if let Some(count) = in_degree.get_mut(connection.target.as_str()) {
            *count += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut visited = 0;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        for connection in connections.iter().filter(|c| c.source == id) {
            if let Some(count) = in_degree.get_mut(connection.target.as_str()) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(connection.target.as_str());
                }
            }
        }
    }

    visited < description.nodes.len()
}
