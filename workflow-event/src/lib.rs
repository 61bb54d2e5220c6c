//! Workflow lifecycle event types: event type + execution envelope + payload.
//!
//! This crate defines the wire shape of a single workflow event. It does not
//! depend on the engine; the engine constructs `WorkflowEvent` values and the
//! bus fans them out. Transports may re-serialize with `to_json`.

pub mod event;

pub use event::{EventType, WorkflowEvent};
