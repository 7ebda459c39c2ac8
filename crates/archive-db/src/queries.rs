use archive_types::{MediaRecord, MessageRecord};
use rusqlite::{Connection, OptionalExtension, Row, Transaction};

use crate::Database;
use crate::error::Result;

const MESSAGE_COLUMNS: &str = "EVENT_ID, CATEGORY, DATE, BODY, SENDER, MEDIA_UUID, SOURCE";

impl Database {
    // -- Messages --

    pub fn message_by_id(&self, event_id: &str) -> Result<Option<MessageRecord>> {
        self.with_conn(|conn| query_message_by_id(conn, event_id))
    }

    /// Category of the stored row, without pulling the full source payload.
    pub fn message_category(&self, event_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let category = conn
                .query_row(
                    "SELECT CATEGORY FROM MESSAGE WHERE EVENT_ID = ?1",
                    [event_id],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?;
            // A NULL category still means the row exists
            Ok(category.map(Option::unwrap_or_default))
        })
    }

    /// Rows whose DATE falls in `[from, to]`, oldest first.
    pub fn messages_between(&self, from: &str, to: &str) -> Result<Vec<MessageRecord>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM MESSAGE
                 WHERE DATE >= ?1 AND DATE <= ?2
                 ORDER BY DATE ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([from, to], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn message_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM MESSAGE", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    // -- Media --

    pub fn media_by_hash(&self, hash: &str) -> Result<Vec<MediaRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT UUID, HASH, SIZE FROM MEDIA WHERE HASH = ?1")?;
            let rows = stmt
                .query_map([hash], |row| {
                    Ok(MediaRecord {
                        uuid: row.get(0)?,
                        hash: row.get(1)?,
                        size: row.get::<_, i64>(2)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Media rows are committed immediately so the next hash lookup sees them.
    pub fn insert_media(&self, media: &MediaRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO MEDIA (UUID, HASH, SIZE) VALUES (?1, ?2, ?3)",
                rusqlite::params![media.uuid, media.hash, media.size as i64],
            )?;
            Ok(())
        })
    }

    pub fn media_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM MEDIA", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }
}

pub(crate) fn insert_messages(tx: &Transaction<'_>, records: &[MessageRecord]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO MESSAGE (EVENT_ID, CATEGORY, DATE, BODY, SENDER, MEDIA_UUID, SOURCE)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for r in records {
        stmt.execute(rusqlite::params![
            r.event_id,
            r.category,
            r.timestamp,
            r.body,
            r.sender,
            r.media_ref,
            r.source,
        ])?;
    }
    Ok(())
}

pub(crate) fn update_messages(tx: &Transaction<'_>, records: &[MessageRecord]) -> Result<()> {
    let mut stmt = tx.prepare(
        "UPDATE MESSAGE
         SET CATEGORY = ?1, DATE = ?2, BODY = ?3, SENDER = ?4, MEDIA_UUID = ?5, SOURCE = ?6
         WHERE EVENT_ID = ?7",
    )?;
    for r in records {
        stmt.execute(rusqlite::params![
            r.category,
            r.timestamp,
            r.body,
            r.sender,
            r.media_ref,
            r.source,
            r.event_id,
        ])?;
    }
    Ok(())
}

fn query_message_by_id(conn: &Connection, event_id: &str) -> Result<Option<MessageRecord>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM MESSAGE WHERE EVENT_ID = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([event_id], message_from_row).optional()?;
    Ok(row)
}

// Legacy rows may hold NULLs in any column
fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    Ok(MessageRecord {
        event_id: text(0)?,
        category: text(1)?,
        timestamp: text(2)?,
        body: text(3)?,
        sender: text(4)?,
        media_ref: text(5)?,
        source: text(6)?,
    })
}
