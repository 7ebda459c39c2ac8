use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Archive store: running migration v1 (initial schema)");
        // IF NOT EXISTS so stores created before versioning are adopted as-is
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS MESSAGE (
                EVENT_ID    TEXT,
                CATEGORY    TEXT,
                DATE        TEXT,
                BODY        TEXT,
                SENDER      TEXT,
                MEDIA_UUID  TEXT,
                SOURCE      TEXT
            );

            CREATE TABLE IF NOT EXISTS MEDIA (
                UUID        TEXT,
                HASH        TEXT,
                SIZE        INT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS index_eventid ON MESSAGE (EVENT_ID);
            CREATE INDEX IF NOT EXISTS index_date ON MESSAGE (DATE);
            CREATE INDEX IF NOT EXISTS index_media ON MEDIA (HASH);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
