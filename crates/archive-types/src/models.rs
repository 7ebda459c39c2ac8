use serde::{Deserialize, Serialize};

/// One archived event, flattened for the MESSAGE table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub event_id: String,
    pub category: String,
    /// `YYYY-MM-DD HH:MM:SS.mmm`, empty when the event carried no origin time
    pub timestamp: String,
    pub body: String,
    pub sender: String,
    /// Empty, `<uuid>` or `<uuid>.<ext>`
    pub media_ref: String,
    /// Serialized payload
    pub source: String,
}

/// One archived blob in the MEDIA table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub uuid: String,
    pub hash: String,
    pub size: u64,
}
