//! Typed node-graph execution engine for Grimoire spells.
//!
//! A spell is a dataflow graph authored in a visual editor: nodes
//! instantiate reusable components, typed sockets constrain which ports may
//! connect, and trigger connections gate activation order. This crate
//! compiles serialized spells against a component registry and executes
//! them pass by pass:
//!
//! - **Components** declare their shape (ports, controls) in a builder and
//!   do their work in an async worker ([`Component`]).
//! - **Compilation** validates every node and connection up front,
//!   collecting all structural errors ([`SpellGraph::compile`]).
//! - **Execution** runs each node at most once per pass, dispatching nodes
//!   concurrently as their inputs resolve ([`SpellEngine::run`]).
//! - **Caching** lets idempotent components skip re-execution when their
//!   controls and inputs are unchanged ([`WorkerCache`]).
//! - **Events** stream node lifecycle transitions and display output to the
//!   host ([`EventSink`]).
//!
//! # Example
//!
//! ```ignore
//! let registry = ComponentRegistry::with_builtins();
//! let graph = SpellGraph::compile(&description, &registry)?;
//! let engine = SpellEngine::new().with_cache(Arc::new(MemoryCache::new()));
//! let report = engine
//!     .run(&graph, Invocation::new().with_payload(payload))
//!     .await;
//! if let Some(value) = report.output("output-1", "output") {
//!     println!("{value}");
//! }
//! ```

pub mod cache;
pub mod component;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod node;
pub mod registry;
pub mod socket;
pub mod spell;

// Re-export key types
pub use cache::{CacheKey, CacheStats, MemoryCache, NullCache, WorkerCache};
pub use component::{Component, ComponentCategory, ComponentMetadata, OutputMap};
pub use context::{EventPayload, Extensions, WorkerContext};
pub use engine::{FailureReason, Invocation, NodeFailure, NodeState, PassReport, SpellEngine};
pub use error::{BuildResult, CompileError, EngineError, Result, StructuralError};
pub use events::{EventError, EventSink, NullEventSink, PassEvent, VecEventSink};
pub use graph::{Connection, NodeInstance, SpellGraph};
pub use node::{ControlKind, ControlSpec, NodeId, NodeShape, PortSpec, WorkerInputs, WorkerNode};
pub use registry::{ComponentEntry, ComponentRegistry, PaletteEntry};
pub use socket::SocketType;
pub use spell::{ConnectionSource, NodeDescription, SpellBuilder, SpellDescription};
