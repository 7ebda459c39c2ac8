use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use archive_db::{BatchedWriter, Database, StoreError};
use archive_types::{Attachment, IncomingEvent};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{Decision, EventClassifier, ReconcilePolicy};
use crate::error::{ArchiveError, MediaError};
use crate::layout::RoomLayout;
use crate::media::MediaStore;
use crate::record::{RecordBuilder, StandardRecordBuilder};

/// Source of attachment bytes. The only part of a run that waits on I/O.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Write the (decrypted) content behind `attachment` to `dest`.
    async fn fetch(&self, attachment: &Attachment, dest: &Path) -> Result<(), MediaError>;
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Fetch and archive attachments. When off, `media_ref` stays empty.
    pub media: bool,
    pub policy: ReconcilePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            media: true,
            policy: ReconcilePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
    Skipped,
    /// Media or payload for this event could not be processed; nothing was written.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub event_id: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<EventOutcome>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Transactions committed during the run
    pub commits: usize,
    /// Annotated payloads of every inserted or updated event, in run order
    pub processed: Vec<Value>,
}

impl RunReport {
    fn record(&mut self, event_id: &str, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(EventOutcome {
            event_id: event_id.to_string(),
            outcome,
        });
    }
}

/// One archival pass over a room.
///
/// Owns the batching queues and media store for exactly one run; build a new
/// pipeline per room and per pass. Events are handled strictly in order since
/// each decision depends on the writes before it.
pub struct Pipeline<'a, B = StandardRecordBuilder> {
    layout: &'a RoomLayout,
    classifier: EventClassifier,
    media: Option<MediaStore<'a>>,
    writer: BatchedWriter<'a>,
    builder: B,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a, StandardRecordBuilder> {
    pub fn new(db: &'a Database, layout: &'a RoomLayout, options: PipelineOptions) -> Self {
        Self::with_builder(db, layout, options, StandardRecordBuilder)
    }
}

impl<'a, B: RecordBuilder> Pipeline<'a, B> {
    pub fn with_builder(
        db: &'a Database,
        layout: &'a RoomLayout,
        options: PipelineOptions,
        builder: B,
    ) -> Self {
        Self {
            layout,
            classifier: EventClassifier::new(options.policy),
            media: options
                .media
                .then(|| MediaStore::new(db, layout.media_dir())),
            writer: BatchedWriter::new(db),
            builder,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between events once `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Archive `events`, which must already be in ascending chronological order.
    ///
    /// Store failures end the run after a last attempt to flush what is queued.
    /// Media failures only drop the event they belong to. Cancellation is
    /// checked before each event; queued rows are flushed before returning
    /// [`ArchiveError::Interrupted`].
    pub async fn run<I, F>(mut self, events: I, fetcher: &F) -> Result<RunReport, ArchiveError>
    where
        I: IntoIterator<Item = IncomingEvent>,
        F: MediaFetcher + ?Sized,
    {
        info!(
            "Archiving into {} (policy: {})",
            self.layout.root().display(),
            self.classifier.policy()
        );
        let mut report = RunReport::default();

        for event in events {
            // Hashing and store writes never suspend; give signal handlers a turn
            tokio::task::yield_now().await;
            if self.cancel.is_cancelled() {
                return Err(self.interrupt(&report));
            }

            let stored = match self.writer.lookup_category(&event.event_id) {
                Ok(stored) => stored,
                Err(e) => return Err(self.abort(e)),
            };
            let decision = self.classifier.classify(event.kind, stored.as_deref());
            debug!("{} ({}): {:?}", event.event_id, event.kind, decision);

            if decision == Decision::Skip {
                report.record(&event.event_id, Outcome::Skipped);
                continue;
            }

            let resolved = self.media_ref_for(&event, fetcher).await;
            let media_ref = match resolved {
                Ok(token) => token,
                Err(MediaError::Store(e)) => return Err(self.abort(e)),
                Err(e) => {
                    warn!("Skipping {}: {}", event.event_id, e);
                    report.record(&event.event_id, Outcome::Failed(e.to_string()));
                    continue;
                }
            };

            let built = match self.builder.build(&event, &media_ref) {
                Ok(built) => built,
                Err(e) => {
                    warn!("Skipping {}: cannot serialize payload: {}", event.event_id, e);
                    report.record(&event.event_id, Outcome::Failed(e.to_string()));
                    continue;
                }
            };
            let (queued, outcome) = match decision {
                Decision::Insert => (self.writer.enqueue_insert(built.record), Outcome::Inserted),
                _ => (self.writer.enqueue_update(built.record), Outcome::Updated),
            };
            if let Err(e) = queued {
                return Err(self.abort(e));
            }
            report.processed.push(built.payload);
            report.record(&event.event_id, outcome);
        }

        if let Err(e) = self.writer.flush() {
            return Err(self.abort(e));
        }
        report.commits = self.writer.commits();

        info!(
            "Run complete: {} inserted, {} updated, {} skipped, {} failed, {} commit(s)",
            report.inserted, report.updated, report.skipped, report.failed, report.commits
        );
        Ok(report)
    }

    /// Empty when media is disabled or the event has no attachment.
    async fn media_ref_for<F>(
        &self,
        event: &IncomingEvent,
        fetcher: &F,
    ) -> Result<String, MediaError>
    where
        F: MediaFetcher + ?Sized,
    {
        let (Some(store), Some(attachment)) = (&self.media, &event.attachment) else {
            return Ok(String::new());
        };

        let temp = self.layout.temp_file_path();
        if let Err(e) = fetcher.fetch(attachment, &temp).await {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
        if let Some(ts) = event.origin_server_ts {
            if let Err(e) = set_modified(&temp, ts) {
                debug!("Could not set mtime on {}: {}", temp.display(), e);
            }
        }

        store.resolve(&temp)
    }

    fn interrupt(&mut self, report: &RunReport) -> ArchiveError {
        let handled = report.outcomes.len();
        warn!("Run cancelled after {} event(s), flushing queued rows", handled);
        if let Err(e) = self.writer.flush() {
            error!("Flush after cancellation failed: {}", e);
            return ArchiveError::Store(e);
        }
        ArchiveError::Interrupted { handled }
    }

    fn abort(&mut self, cause: StoreError) -> ArchiveError {
        error!("Store failure, aborting run: {}", cause);
        if let Err(e) = self.writer.flush() {
            error!("Final flush after store failure also failed: {}", e);
        }
        ArchiveError::Store(cause)
    }
}

/// Stamp a downloaded file with the event's origin time.
fn set_modified(path: &Path, millis: i64) -> std::io::Result<()> {
    let Ok(millis) = u64::try_from(millis) else {
        return Ok(());
    };
    let time: SystemTime = UNIX_EPOCH + Duration::from_millis(millis);
    File::options().write(true).open(path)?.set_modified(time)
}
