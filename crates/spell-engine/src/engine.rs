//! Pass execution over compiled spells.
//!
//! A pass walks a [`SpellGraph`] once: every node moves through
//! PENDING -> READY -> RUNNING and settles as COMPLETED or FAILED. A node
//! becomes ready when every data connection into it has a COMPLETED source
//! and, if it has trigger connections, at least one trigger source has
//! completed. Ready nodes with no mutual dependencies run concurrently; the
//! engine drains their futures as they settle and schedules whatever became
//! ready in the meantime.
//!
//! Failures are never thrown past the pass boundary. A failed node marks
//! its data-dependent consumers failed with provenance, trigger-only
//! consumers whose every trigger source failed are marked failed as well,
//! and the rest of the graph keeps running. The caller reads the outcome
//! from the returned [`PassReport`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheKey, NullCache, WorkerCache};
use crate::component::OutputMap;
use crate::context::{EventPayload, Extensions, WorkerContext};
use crate::error::Result;
use crate::events::{EventSink, NullEventSink, PassEvent};
use crate::graph::SpellGraph;
use crate::node::{NodeId, WorkerInputs, WorkerNode};

/// Execution state of one node within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting on upstream nodes.
    Pending,
    /// Activation conditions met, about to be dispatched.
    Ready,
    /// Worker in flight.
    Running,
    /// Worker finished or outputs served from cache.
    Completed,
    /// Worker failed, inputs unresolvable, or an upstream dependency failed.
    Failed,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Failed)
    }
}

/// Why a node ended the pass FAILED.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FailureReason {
    /// A non-multi data input had neither a connection nor a seeded value.
    #[serde(rename_all = "camelCase")]
    MissingInput { port: String },
    /// An upstream source this node depends on did not complete.
    #[serde(rename_all = "camelCase")]
    Upstream { port: String, source: NodeId },
    /// The node's own worker returned an error.
    #[serde(rename_all = "camelCase")]
    Worker { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingInput { port } => {
                write!(f, "required input '{port}' has no connection and no seeded value")
            }
            FailureReason::Upstream { port, source } => {
                write!(f, "upstream node '{source}' feeding '{port}' did not complete")
            }
            FailureReason::Worker { message } => write!(f, "{message}"),
        }
    }
}

/// A node that failed, with the reason recorded for the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub node: NodeId,
    pub reason: FailureReason,
}

/// Everything a single pass is invoked with.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    payload: Option<EventPayload>,
    silent: bool,
    seeds: HashMap<NodeId, HashMap<String, Value>>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the inbound event that initiated this pass.
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Suppress every display emission for this pass.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Seed an input port with an externally supplied value. Seeded values
    /// arrive before connection values on the same port.
    pub fn seed(
        mut self,
        node: impl Into<NodeId>,
        port: impl Into<String>,
        value: Value,
    ) -> Self {
        self.seeds
            .entry(node.into())
            .or_default()
            .insert(port.into(), value);
        self
    }
}

/// Outcome of one pass: terminal state per node, outputs of completed
/// nodes, and the recorded failures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub pass_id: String,
    pub states: BTreeMap<NodeId, NodeState>,
    pub outputs: BTreeMap<NodeId, OutputMap>,
    pub failures: Vec<NodeFailure>,
}

impl PassReport {
    /// The value a completed node wrote to one of its output ports.
    pub fn output(&self, node: &str, port: &str) -> Option<&Value> {
        self.outputs.get(node)?.get(port)
    }

    pub fn state(&self, node: &str) -> Option<NodeState> {
        self.states.get(node).copied()
    }

    pub fn failure(&self, node: &str) -> Option<&NodeFailure> {
        self.failures.iter().find(|f| f.node == node)
    }

    /// True when every node completed.
    pub fn succeeded(&self) -> bool {
        self.states.values().all(|s| *s == NodeState::Completed)
    }
}

type NodeFuture = BoxFuture<'static, (NodeId, Result<OutputMap>)>;

/// Mutable bookkeeping for one pass.
struct Pass {
    pass_id: String,
    silent: bool,
    payload: Option<Arc<EventPayload>>,
    seeds: HashMap<NodeId, HashMap<String, Value>>,
    states: BTreeMap<NodeId, NodeState>,
    outputs: BTreeMap<NodeId, OutputMap>,
    failures: Vec<NodeFailure>,
    /// Keys awaiting a `put` once the node's worker settles.
    cache_keys: HashMap<NodeId, CacheKey>,
}

impl Pass {
    fn state(&self, node: &str) -> NodeState {
        self.states.get(node).copied().unwrap_or(NodeState::Pending)
    }
}

/// Executes passes over compiled spells.
///
/// The engine owns the collaborators shared by every pass: the worker
/// cache, the event sink, and host extensions. `run` borrows the graph
/// immutably, so one engine can execute many spells and many concurrent
/// passes.
pub struct SpellEngine {
    cache: Arc<dyn WorkerCache>,
    sink: Arc<dyn EventSink>,
    extensions: Arc<Extensions>,
}

impl SpellEngine {
    /// Engine with no cache, no sink, and no extensions.
    pub fn new() -> Self {
        Self {
            cache: Arc::new(NullCache),
            sink: Arc::new(NullEventSink),
            extensions: Arc::new(Extensions::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn WorkerCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Arc::new(extensions);
        self
    }

    /// Execute one pass and report how every node settled.
    pub async fn run(&self, graph: &SpellGraph, invocation: Invocation) -> PassReport {
        let Invocation {
            payload,
            silent,
            seeds,
        } = invocation;
        let pass_id = format!("pass-{}", uuid::Uuid::new_v4());
        let started = Instant::now();
        log::info!(
            "Pass {} starting over spell '{}' ({} nodes)",
            pass_id,
            graph.id(),
            graph.node_count()
        );

        let mut pass = Pass {
            pass_id: pass_id.clone(),
            silent,
            payload: payload.map(Arc::new),
            seeds,
            states: graph
                .nodes()
                .map(|n| (n.id.clone(), NodeState::Pending))
                .collect(),
            outputs: BTreeMap::new(),
            failures: Vec::new(),
            cache_keys: HashMap::new(),
        };

        self.emit(PassEvent::PassStarted {
            spell_id: graph.id().to_string(),
            pass_id: pass_id.clone(),
        });

        self.fail_unresolvable(graph, &mut pass);

        let mut running: FuturesUnordered<NodeFuture> = FuturesUnordered::new();
        self.schedule_ready(graph, &mut pass, &mut running);

        while let Some((node_id, result)) = running.next().await {
            match result {
                Ok(outputs) => {
                    if let Some(key) = pass.cache_keys.remove(&node_id) {
                        self.cache.put(key, outputs.clone());
                    }
                    self.complete_node(&mut pass, &node_id, outputs, false);
                }
                Err(err) => self.fail_node(
                    &mut pass,
                    &node_id,
                    FailureReason::Worker {
                        message: err.to_string(),
                    },
                ),
            }
            self.schedule_ready(graph, &mut pass, &mut running);
        }

        // A compiled graph always drains. Anything left non-terminal here
        // is a scheduling bug, not an authoring error.
        let stranded: Vec<NodeId> = pass
            .states
            .iter()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        for id in stranded {
            log::warn!("Node '{id}' never reached a terminal state");
            self.fail_node(
                &mut pass,
                &id,
                FailureReason::Worker {
                    message: "node never became ready".to_string(),
                },
            );
        }

        let completed = pass
            .states
            .values()
            .filter(|s| **s == NodeState::Completed)
            .count();
        let failed = pass.states.len() - completed;
        self.emit(PassEvent::PassCompleted {
            spell_id: graph.id().to_string(),
            pass_id: pass_id.clone(),
            completed,
            failed,
        });
        log::info!(
            "Pass {} finished in {:?}: {} completed, {} failed",
            pass_id,
            started.elapsed(),
            completed,
            failed
        );

        PassReport {
            pass_id,
            states: pass.states,
            outputs: pass.outputs,
            failures: pass.failures,
        }
    }

    /// Fail every node with a required input that nothing connects to and
    /// nothing seeded. Runs once, before any scheduling.
    fn fail_unresolvable(&self, graph: &SpellGraph, pass: &mut Pass) {
        let mut doomed = Vec::new();
        for instance in graph.nodes() {
            for port in instance.shape.inputs() {
                if !port.is_required() {
                    continue;
                }
                let connected = graph
                    .incoming(&instance.id)
                    .any(|c| c.target_port == port.name);
                let seeded = pass
                    .seeds
                    .get(&instance.id)
                    .is_some_and(|s| s.contains_key(&port.name));
                if !connected && !seeded {
                    doomed.push((
                        instance.id.clone(),
                        FailureReason::MissingInput {
                            port: port.name.clone(),
                        },
                    ));
                    break;
                }
            }
        }
        for (id, reason) in doomed {
            self.fail_node(pass, &id, reason);
        }
    }

    /// Propagate failures to pending consumers until nothing changes, then
    /// dispatch every node whose activation conditions are met. Cache hits
    /// complete inline and may make further nodes ready, so the scan
    /// repeats until quiescent.
    fn schedule_ready(
        &self,
        graph: &SpellGraph,
        pass: &mut Pass,
        running: &mut FuturesUnordered<NodeFuture>,
    ) {
        loop {
            self.propagate_failures(graph, pass);

            let ready: Vec<NodeId> = pass
                .states
                .iter()
                .filter(|(_, state)| **state == NodeState::Pending)
                .map(|(id, _)| id.clone())
                .filter(|id| Self::is_ready(graph, pass, id))
                .collect();
            if ready.is_empty() {
                return;
            }

            for id in ready {
                pass.states.insert(id.clone(), NodeState::Ready);
                self.dispatch(graph, pass, &id, running);
            }
        }
    }

    /// Activation check: every data source COMPLETED, and at least one
    /// trigger source COMPLETED when trigger connections exist.
    fn is_ready(graph: &SpellGraph, pass: &Pass, node: &str) -> bool {
        let mut has_trigger = false;
        let mut trigger_fired = false;
        for connection in graph.incoming(node) {
            if connection.is_trigger() {
                has_trigger = true;
                if pass.state(&connection.source) == NodeState::Completed {
                    trigger_fired = true;
                }
            } else if pass.state(&connection.source) != NodeState::Completed {
                return false;
            }
        }
        !has_trigger || trigger_fired
    }

    /// Serve the node from cache when possible, otherwise launch its worker.
    fn dispatch(
        &self,
        graph: &SpellGraph,
        pass: &mut Pass,
        id: &str,
        running: &mut FuturesUnordered<NodeFuture>,
    ) {
        let Some(instance) = graph.node(id) else {
            return;
        };
        let inputs = Self::resolve_inputs(graph, pass, id);
        let worker_node = WorkerNode::new(
            id.to_string(),
            instance.metadata.name.clone(),
            instance.data.clone(),
        );

        if instance.metadata.run_from_cache {
            match CacheKey::compute(&worker_node, &inputs) {
                Ok(key) => {
                    if let Some(outputs) = self.cache.get(&key) {
                        log::debug!("Node '{id}' served from cache");
                        self.complete_node(pass, id, outputs, true);
                        return;
                    }
                    pass.cache_keys.insert(id.to_string(), key);
                }
                Err(err) => {
                    log::warn!("Cache key for node '{id}' failed, running uncached: {err}");
                }
            }
        }

        pass.states.insert(id.to_string(), NodeState::Running);
        self.emit(PassEvent::NodeStarted {
            node_id: id.to_string(),
            pass_id: pass.pass_id.clone(),
        });
        log::debug!("Node '{id}' running component '{}'", instance.metadata.name);

        let mut cx = WorkerContext::new(pass.pass_id.clone(), id.to_string())
            .with_silent(pass.silent)
            .with_display(instance.metadata.display)
            .with_extensions(self.extensions.clone())
            .with_cache(self.cache.clone())
            .with_event_sink(self.sink.clone());
        if let Some(payload) = &pass.payload {
            cx = cx.with_payload(payload.clone());
        }

        let component = instance.component.clone();
        let node_id = id.to_string();
        running.push(Box::pin(async move {
            let result = component.worker(worker_node, inputs, cx).await;
            (node_id, result)
        }));
    }

    /// Gather the values arriving at each data input: the seeded value
    /// first, then one value per connection in declaration order. A
    /// completed source that left an output port unwritten contributes
    /// JSON null.
    fn resolve_inputs(graph: &SpellGraph, pass: &Pass, id: &str) -> WorkerInputs {
        let mut inputs = WorkerInputs::new();
        let Some(instance) = graph.node(id) else {
            return inputs;
        };
        for port in instance.shape.inputs() {
            if port.socket.is_trigger() {
                continue;
            }
            if let Some(seed) = pass.seeds.get(id).and_then(|s| s.get(&port.name)) {
                inputs.push(port.name.clone(), seed.clone());
            }
            for connection in graph.incoming(id).filter(|c| c.target_port == port.name) {
                let value = pass
                    .outputs
                    .get(&connection.source)
                    .and_then(|outputs| outputs.get(&connection.source_port))
                    .cloned()
                    .unwrap_or(Value::Null);
                inputs.push(port.name.clone(), value);
            }
        }
        inputs
    }

    /// Mark pending consumers of failed nodes failed, to a fixpoint. A data
    /// consumer fails as soon as any of its sources fails; a trigger
    /// consumer fails only once every trigger source is terminal and none
    /// completed.
    fn propagate_failures(&self, graph: &SpellGraph, pass: &mut Pass) {
        loop {
            let mut doomed: Vec<(NodeId, FailureReason)> = Vec::new();
            for (id, state) in &pass.states {
                if *state != NodeState::Pending {
                    continue;
                }
                if let Some(connection) = graph
                    .incoming(id)
                    .find(|c| !c.is_trigger() && pass.state(&c.source) == NodeState::Failed)
                {
                    doomed.push((
                        id.clone(),
                        FailureReason::Upstream {
                            port: connection.target_port.clone(),
                            source: connection.source.clone(),
                        },
                    ));
                    continue;
                }
                let triggers: Vec<_> = graph.incoming(id).filter(|c| c.is_trigger()).collect();
                if triggers.is_empty() {
                    continue;
                }
                let fired = triggers
                    .iter()
                    .any(|c| pass.state(&c.source) == NodeState::Completed);
                let all_terminal = triggers
                    .iter()
                    .all(|c| pass.state(&c.source).is_terminal());
                if all_terminal && !fired {
                    let first = triggers[0];
                    doomed.push((
                        id.clone(),
                        FailureReason::Upstream {
                            port: first.target_port.clone(),
                            source: first.source.clone(),
                        },
                    ));
                }
            }
            if doomed.is_empty() {
                return;
            }
            for (id, reason) in doomed {
                self.fail_node(pass, &id, reason);
            }
        }
    }

    fn complete_node(&self, pass: &mut Pass, id: &str, outputs: OutputMap, from_cache: bool) {
        pass.states.insert(id.to_string(), NodeState::Completed);
        pass.outputs.insert(id.to_string(), outputs);
        self.emit(PassEvent::NodeCompleted {
            node_id: id.to_string(),
            pass_id: pass.pass_id.clone(),
            from_cache,
        });
    }

    fn fail_node(&self, pass: &mut Pass, id: &str, reason: FailureReason) {
        log::warn!("Node '{id}' failed: {reason}");
        pass.states.insert(id.to_string(), NodeState::Failed);
        self.emit(PassEvent::NodeFailed {
            node_id: id.to_string(),
            pass_id: pass.pass_id.clone(),
            error: reason.to_string(),
        });
        pass.failures.push(NodeFailure {
            node: id.to_string(),
            reason,
        });
    }

    fn emit(&self, event: PassEvent) {
        let _ = self.sink.send(event);
    }
}

impl Default for SpellEngine {
    fn default() -> Self {
        Self::new()
    }
}
