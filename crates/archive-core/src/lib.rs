//! Ingest, classify, dedupe and persist pipeline for archived room events.
//!
//! A run takes events that are already in chronological order, decides per
//! event whether it is new, upgrades an earlier placeholder, or is already
//! archived, pulls attached media through the content-addressed
//! [`MediaStore`], and writes rows through a batched, transactional writer.

pub mod classify;
pub mod error;
pub mod hash;
pub mod layout;
pub mod media;
pub mod pipeline;
pub mod record;
pub mod sniff;

pub use classify::{Decision, EventClassifier, ReconcilePolicy};
pub use error::{ArchiveError, MediaError};
pub use layout::RoomLayout;
pub use media::MediaStore;
pub use pipeline::{EventOutcome, MediaFetcher, Outcome, Pipeline, PipelineOptions, RunReport};
pub use record::{BuiltRecord, RecordBuilder, StandardRecordBuilder};
