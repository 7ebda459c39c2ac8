use archive_types::{IncomingEvent, MessageRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A row ready for the writer plus the annotated payload kept for export.
#[derive(Debug, Clone)]
pub struct BuiltRecord {
    pub record: MessageRecord,
    pub payload: Value,
}

/// Flattens an event, after its media has been resolved, into a store row.
pub trait RecordBuilder {
    fn build(
        &self,
        event: &IncomingEvent,
        media_ref: &str,
    ) -> Result<BuiltRecord, serde_json::Error>;
}

/// Default builder: category from the event kind, UTC millisecond timestamps,
/// and a pretty-printed payload annotated with `_sender_name`, `_date` and
/// `_file_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRecordBuilder;

impl RecordBuilder for StandardRecordBuilder {
    fn build(
        &self,
        event: &IncomingEvent,
        media_ref: &str,
    ) -> Result<BuiltRecord, serde_json::Error> {
        let timestamp = event
            .origin_server_ts
            .and_then(format_timestamp)
            .unwrap_or_default();

        let mut payload = event.source.clone();
        if let Value::Object(map) = &mut payload {
            if let Some(name) = &event.sender_display_name {
                map.insert(
                    "_sender_name".into(),
                    Value::String(format!("{} <{}>", name, event.sender)),
                );
            }
            if !timestamp.is_empty() {
                map.insert("_date".into(), Value::String(timestamp.clone()));
            }
            if !media_ref.is_empty() {
                map.insert("_file_path".into(), Value::String(media_ref.to_string()));
            }
        }

        let record = MessageRecord {
            event_id: event.event_id.clone(),
            category: event.kind.as_str().to_string(),
            timestamp,
            body: event.body.clone().unwrap_or_default(),
            sender: event.sender.clone(),
            media_ref: media_ref.to_string(),
            source: serde_json::to_string_pretty(&payload)?,
        };

        Ok(BuiltRecord { record, payload })
    }
}

/// Milliseconds since the epoch as `YYYY-MM-DD HH:MM:SS.mmm` (UTC).
pub fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_types::EventKind;
    use serde_json::json;

    fn event() -> IncomingEvent {
        IncomingEvent {
            event_id: "$abc".into(),
            kind: EventKind::RoomMessageImage,
            origin_server_ts: Some(1_700_000_000_123),
            sender: "@carol:example.org".into(),
            sender_display_name: Some("Carol".into()),
            body: Some("cat.png".into()),
            attachment: None,
            source: json!({ "event_id": "$abc", "type": "m.room.message" }),
        }
    }

    #[test]
    fn formats_millis() {
        assert_eq!(
            format_timestamp(1_700_000_000_123).as_deref(),
            Some("2023-11-14 22:13:20.123")
        );
        assert_eq!(format_timestamp(0).as_deref(), Some("1970-01-01 00:00:00.000"));
    }

    #[test]
    fn builds_annotated_record() {
        let built = StandardRecordBuilder.build(&event(), "u1.png").unwrap();

        assert_eq!(built.record.category, "RoomMessageImage");
        assert_eq!(built.record.timestamp, "2023-11-14 22:13:20.123");
        assert_eq!(built.record.body, "cat.png");
        assert_eq!(built.record.media_ref, "u1.png");
        assert_eq!(built.payload["_file_path"], "u1.png");
        assert_eq!(built.payload["_date"], "2023-11-14 22:13:20.123");
        assert_eq!(built.payload["_sender_name"], "Carol <@carol:example.org>");

        let stored: Value = serde_json::from_str(&built.record.source).unwrap();
        assert_eq!(stored, built.payload);
    }

    #[test]
    fn absent_fields_stay_empty() {
        let mut ev = event();
        ev.origin_server_ts = None;
        ev.sender_display_name = None;
        ev.body = None;

        let built = StandardRecordBuilder.build(&ev, "").unwrap();
        assert_eq!(built.record.timestamp, "");
        assert_eq!(built.record.body, "");
        assert!(built.payload.get("_date").is_none());
        assert!(built.payload.get("_file_path").is_none());
        assert!(built.payload.get("_sender_name").is_none());
    }
}
