//! Built-in node components for the Grimoire spell engine.
//!
//! Components are grouped by category:
//!
//! - [`events`]: event ingress and recall against the platform event store
//! - [`io`]: text sources, fan-in joining, and spell output
//!
//! Every component registers itself at link time through `inventory`, so
//! [`spell_engine::ComponentRegistry::with_builtins`] picks up the whole
//! set when this crate is linked into the binary.

pub mod events;
pub mod io;

pub use events::{
    EventInput, EventQuery, EventRecall, EventRecord, EventStore, HttpEventStore,
    EVENT_STORE_KEY,
};
pub use io::{Join, Output, TextInput};
