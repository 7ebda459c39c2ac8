use archive_types::MessageRecord;
use tracing::{debug, info, warn};

use crate::Database;
use crate::error::Result;
use crate::queries::{insert_messages, update_messages};

/// Queue length at which a queue is committed on its own.
pub const BATCH_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// Buffers message writes and commits them in transactions.
///
/// A record is durable only once the transaction holding it has committed,
/// either because its queue reached [`BATCH_THRESHOLD`] or on [`flush`].
/// Anything still queued when the writer is dropped is lost and will be
/// re-derived by the next run over the same events.
///
/// [`flush`]: BatchedWriter::flush
pub struct BatchedWriter<'a> {
    db: &'a Database,
    inserts: Vec<MessageRecord>,
    updates: Vec<MessageRecord>,
    commits: usize,
}

impl<'a> BatchedWriter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            inserts: Vec::with_capacity(BATCH_THRESHOLD),
            updates: Vec::with_capacity(BATCH_THRESHOLD),
            commits: 0,
        }
    }

    pub fn enqueue_insert(&mut self, record: MessageRecord) -> Result<()> {
        self.inserts.push(record);
        if self.inserts.len() >= BATCH_THRESHOLD {
            self.commit(WriteKind::Insert)?;
        }
        Ok(())
    }

    /// Queue an update. If the row is itself still waiting to be inserted,
    /// the pending insert is replaced instead, so the update can never run
    /// ahead of the insert it depends on.
    pub fn enqueue_update(&mut self, record: MessageRecord) -> Result<()> {
        if let Some(pending) = self
            .inserts
            .iter_mut()
            .find(|r| r.event_id == record.event_id)
        {
            debug!("Folding update for {} into pending insert", record.event_id);
            *pending = record;
            return Ok(());
        }

        if let Some(pending) = self
            .updates
            .iter_mut()
            .find(|r| r.event_id == record.event_id)
        {
            *pending = record;
            return Ok(());
        }

        self.updates.push(record);
        if self.updates.len() >= BATCH_THRESHOLD {
            self.commit(WriteKind::Update)?;
        }
        Ok(())
    }

    /// Commit both queues, inserts first.
    pub fn flush(&mut self) -> Result<()> {
        self.commit(WriteKind::Insert)?;
        self.commit(WriteKind::Update)?;
        Ok(())
    }

    /// Category of `event_id` as it will be once everything queued is
    /// committed: pending writes win over the stored row.
    pub fn lookup_category(&self, event_id: &str) -> Result<Option<String>> {
        if let Some(category) = self.pending_category(event_id) {
            return Ok(Some(category.to_string()));
        }
        self.db.message_category(event_id)
    }

    pub fn pending_category(&self, event_id: &str) -> Option<&str> {
        self.updates
            .iter()
            .chain(self.inserts.iter())
            .find(|r| r.event_id == event_id)
            .map(|r| r.category.as_str())
    }

    pub fn pending(&self, kind: WriteKind) -> usize {
        match kind {
            WriteKind::Insert => self.inserts.len(),
            WriteKind::Update => self.updates.len(),
        }
    }

    /// Number of transactions committed by this writer.
    pub fn commits(&self) -> usize {
        self.commits
    }

    fn commit(&mut self, kind: WriteKind) -> Result<()> {
        let queue = match kind {
            WriteKind::Insert => &mut self.inserts,
            WriteKind::Update => &mut self.updates,
        };
        if queue.is_empty() {
            return Ok(());
        }

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            match kind {
                WriteKind::Insert => insert_messages(&tx, &queue[..])?,
                WriteKind::Update => update_messages(&tx, &queue[..])?,
            }
            tx.commit()?;
            Ok(())
        })?;

        info!("Committed {} {:?} row(s)", queue.len(), kind);
        queue.clear();
        self.commits += 1;
        Ok(())
    }
}

impl Drop for BatchedWriter<'_> {
    fn drop(&mut self) {
        let lost = self.inserts.len() + self.updates.len();
        if lost > 0 {
            warn!("Batched writer dropped with {} uncommitted row(s)", lost);
        }
    }
}
