//! Event components: ingress and recall.

pub mod event_input;
pub mod event_recall;
pub mod store;

pub use event_input::EventInput;
pub use event_recall::EventRecall;
pub use store::{EventQuery, EventRecord, EventStore, HttpEventStore, EVENT_STORE_KEY};
