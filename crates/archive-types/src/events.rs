use std::fmt;

use serde::{Deserialize, Serialize};

/// Substrings that mark a category as a placeholder.
const PLACEHOLDER_MARKERS: &[&str] = &["BadEvent", "Unknown"];

/// Structural kind of a room event, decided by the fetch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    RoomMessageText,
    RoomMessageNotice,
    RoomMessageEmote,
    RoomMessageFormatted,
    RoomMessageImage,
    RoomMessageVideo,
    RoomMessageAudio,
    RoomMessageFile,
    RoomEncryptedMedia,
    StickerEvent,
    RoomMemberEvent,
    RoomAvatarEvent,
    RoomNameEvent,
    RoomTopicEvent,
    RoomCreateEvent,
    PowerLevelsEvent,
    RedactedEvent,
    /// Encrypted event we hold no session key for
    MegolmEvent,
    UnknownEvent,
    UnknownEncryptedEvent,
    BadEvent,
}

impl EventKind {
    /// Category tag persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoomMessageText => "RoomMessageText",
            Self::RoomMessageNotice => "RoomMessageNotice",
            Self::RoomMessageEmote => "RoomMessageEmote",
            Self::RoomMessageFormatted => "RoomMessageFormatted",
            Self::RoomMessageImage => "RoomMessageImage",
            Self::RoomMessageVideo => "RoomMessageVideo",
            Self::RoomMessageAudio => "RoomMessageAudio",
            Self::RoomMessageFile => "RoomMessageFile",
            Self::RoomEncryptedMedia => "RoomEncryptedMedia",
            Self::StickerEvent => "StickerEvent",
            Self::RoomMemberEvent => "RoomMemberEvent",
            Self::RoomAvatarEvent => "RoomAvatarEvent",
            Self::RoomNameEvent => "RoomNameEvent",
            Self::RoomTopicEvent => "RoomTopicEvent",
            Self::RoomCreateEvent => "RoomCreateEvent",
            Self::PowerLevelsEvent => "PowerLevelsEvent",
            Self::RedactedEvent => "RedactedEvent",
            Self::MegolmEvent => "MegolmEvent",
            Self::UnknownEvent => "UnknownEvent",
            Self::UnknownEncryptedEvent => "UnknownEncryptedEvent",
            Self::BadEvent => "BadEvent",
        }
    }

    /// True when the fetch layer could not work out what this event really is.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            Self::UnknownEvent | Self::UnknownEncryptedEvent | Self::BadEvent
        )
    }

    /// Kinds whose payload can point at downloadable content.
    pub fn may_carry_media(&self) -> bool {
        matches!(
            self,
            Self::RoomMessageImage
                | Self::RoomMessageVideo
                | Self::RoomMessageAudio
                | Self::RoomMessageFile
                | Self::RoomEncryptedMedia
                | Self::StickerEvent
                | Self::RoomMemberEvent
                | Self::RoomAvatarEvent
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placeholder test for a category string read back from the store.
///
/// Works on raw strings so rows written with older, longer type names
/// (for example `"events.UnknownEvent"`) are still recognised.
pub fn is_placeholder_category(category: &str) -> bool {
    PLACEHOLDER_MARKERS.iter().any(|m| category.contains(m))
}

/// Downloadable content referenced by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Content URI, e.g. `mxc://example.org/AbCdEf`
    pub url: String,
}

/// One event as handed over by the fetch layer, already in chronological position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub event_id: String,
    pub kind: EventKind,
    /// Milliseconds since the Unix epoch
    pub origin_server_ts: Option<i64>,
    pub sender: String,
    /// Current display name of the sender, if they are still in the room
    pub sender_display_name: Option<String>,
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    /// Full original payload
    pub source: serde_json::Value,
}
