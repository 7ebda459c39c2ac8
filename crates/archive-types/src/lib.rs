//! Shared shapes for the room archiver.
//!
//! `events` describes what the fetch layer hands to the archiver;
//! `models` describes what ends up in the per-room store.

pub mod events;
pub mod models;

pub use events::{Attachment, EventKind, IncomingEvent, is_placeholder_category};
pub use models::{MediaRecord, MessageRecord};
