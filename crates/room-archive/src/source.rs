use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use archive_core::{MediaError, MediaFetcher};
use archive_types::{Attachment, EventKind, IncomingEvent};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

/// A room as left on disk by the fetch layer.
///
/// ```text
/// room.json      {"room_id": "!abc:example.org"}
/// back.json      raw events, newest first (backward pagination)
/// front.json     raw events, oldest first (forward pagination, optional)
/// members.json   current members by user id (optional), see [`Member`]
/// media/<server>/<media id>
/// ```
pub struct DumpSource {
    dir: PathBuf,
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct RoomInfo {
    room_id: String,
}

/// A current member entry: either just a display name or a full profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Member {
    Name(String),
    Profile {
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        avatar_url: Option<String>,
    },
}

impl Member {
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name.as_str()),
            Self::Profile { display_name, .. } => display_name.as_deref(),
        }
    }

    pub fn avatar_url(&self) -> Option<&str> {
        match self {
            Self::Name(_) => None,
            Self::Profile { avatar_url, .. } => avatar_url.as_deref().filter(|u| !u.is_empty()),
        }
    }
}

/// Everything the archiver needs from one room's dump.
pub struct RoomDump {
    /// Ascending chronological order
    pub events: Vec<IncomingEvent>,
    pub members: HashMap<String, Member>,
}

impl DumpSource {
    pub async fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Dump directory {} does not exist", dir.display());
        }
        let info: RoomInfo = read_json(&dir.join("room.json")).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            room_id: info.room_id,
        })
    }

    /// Rooms under `root`: `root` itself when it holds a `room.json`, otherwise
    /// every child directory that does. Sorted by room id.
    pub async fn discover(root: &Path) -> Result<Vec<Self>> {
        if root.join("room.json").is_file() {
            return Ok(vec![Self::open(root).await?]);
        }
        if !root.is_dir() {
            bail!("Dump directory {} does not exist", root.display());
        }

        let mut rooms = Vec::new();
        let mut entries = fs::read_dir(root)
            .await
            .with_context(|| format!("listing {}", root.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.join("room.json").is_file() {
                debug!("Ignoring {}: no room.json", path.display());
                continue;
            }
            rooms.push(Self::open(&path).await?);
        }
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        info!("Found {} room dump(s) in {}", rooms.len(), root.display());
        Ok(rooms)
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn load(&self) -> Result<RoomDump> {
        let back: Vec<Value> = read_json(&self.dir.join("back.json")).await?;
        let front: Vec<Value> = read_optional(&self.dir.join("front.json")).await?;
        let members: HashMap<String, Member> =
            read_optional(&self.dir.join("members.json")).await?;
        info!(
            "{}: {} backward and {} forward events, {} current member(s)",
            self.room_id,
            back.len(),
            front.len(),
            members.len()
        );

        let events = chronological(back, front)
            .into_iter()
            .filter_map(|raw| {
                let event = to_incoming(raw, &members);
                if event.is_none() {
                    warn!("Dropping dump entry without an event_id");
                }
                event
            })
            .collect();
        Ok(RoomDump { events, members })
    }

    pub fn fetcher(&self) -> DumpMediaFetcher {
        DumpMediaFetcher {
            root: self.dir.join("media"),
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

async fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path).await
}

/// Backward pages arrive newest first; reverse them and append the forward pages.
pub fn chronological<T>(mut newest_first: Vec<T>, oldest_first: Vec<T>) -> Vec<T> {
    newest_first.reverse();
    newest_first.extend(oldest_first);
    newest_first
}

/// Map one raw event to what the archiver consumes. `None` without an id.
pub fn to_incoming(raw: Value, members: &HashMap<String, Member>) -> Option<IncomingEvent> {
    let event_id = raw.get("event_id")?.as_str()?.to_string();
    let kind = classify_raw(&raw);
    let content = raw.get("content");
    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);

    let sender = text(raw.get("sender")).unwrap_or_default();
    let attachment = media_url(kind, content).map(|url| Attachment { url });

    Some(IncomingEvent {
        event_id,
        kind,
        origin_server_ts: raw.get("origin_server_ts").and_then(Value::as_i64),
        sender_display_name: members
            .get(&sender)
            .and_then(Member::display_name)
            .map(str::to_string),
        sender,
        body: text(content.and_then(|c| c.get("body"))),
        attachment,
        source: raw,
    })
}

/// Structural kind from `type` / `content.msgtype`.
pub fn classify_raw(raw: &Value) -> EventKind {
    let Some(event_type) = raw.get("type").and_then(Value::as_str) else {
        return EventKind::BadEvent;
    };
    if raw.get("sender").and_then(Value::as_str).is_none() {
        return EventKind::BadEvent;
    }
    if raw.pointer("/unsigned/redacted_because").is_some() {
        return EventKind::RedactedEvent;
    }

    let content = raw.get("content");
    match event_type {
        "m.room.message" => {
            let encrypted = content.and_then(|c| c.get("file")).is_some();
            match content.and_then(|c| c.get("msgtype")).and_then(Value::as_str) {
                Some("m.image" | "m.video" | "m.audio" | "m.file") if encrypted => {
                    EventKind::RoomEncryptedMedia
                }
                Some("m.text") => EventKind::RoomMessageText,
                Some("m.notice") => EventKind::RoomMessageNotice,
                Some("m.emote") => EventKind::RoomMessageEmote,
                Some("m.image") => EventKind::RoomMessageImage,
                Some("m.video") => EventKind::RoomMessageVideo,
                Some("m.audio") => EventKind::RoomMessageAudio,
                Some("m.file") => EventKind::RoomMessageFile,
                Some(_) if content.and_then(|c| c.get("formatted_body")).is_some() => {
                    EventKind::RoomMessageFormatted
                }
                Some(_) => EventKind::UnknownEvent,
                None => EventKind::BadEvent,
            }
        }
        "m.sticker" => EventKind::StickerEvent,
        "m.room.member" => EventKind::RoomMemberEvent,
        "m.room.avatar" => EventKind::RoomAvatarEvent,
        "m.room.name" => EventKind::RoomNameEvent,
        "m.room.topic" => EventKind::RoomTopicEvent,
        "m.room.create" => EventKind::RoomCreateEvent,
        "m.room.power_levels" => EventKind::PowerLevelsEvent,
        "m.room.encrypted" => EventKind::MegolmEvent,
        _ => EventKind::UnknownEvent,
    }
}

/// Content URI the event points at, if its kind can carry media.
fn media_url(kind: EventKind, content: Option<&Value>) -> Option<String> {
    if !kind.may_carry_media() {
        return None;
    }
    let content = content?;
    let url = match kind {
        EventKind::RoomMemberEvent => content.get("avatar_url"),
        EventKind::RoomEncryptedMedia => content.pointer("/file/url"),
        _ => content.get("url"),
    };
    url.and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// A single path component: no separators, not `.` or `..`.
pub fn is_safe_component(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}

/// Serves `mxc://<server>/<id>` from `<dump>/media/<server>/<id>`.
pub struct DumpMediaFetcher {
    root: PathBuf,
}

impl DumpMediaFetcher {
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let rest = url.strip_prefix("mxc://")?;
        let (server, media_id) = rest.split_once('/')?;
        if !is_safe_component(server) || !is_safe_component(media_id) {
            return None;
        }
        Some(self.root.join(server).join(media_id))
    }
}

#[async_trait]
impl MediaFetcher for DumpMediaFetcher {
    async fn fetch(&self, attachment: &Attachment, dest: &Path) -> Result<(), MediaError> {
        let src = self.resolve(&attachment.url).ok_or_else(|| {
            MediaError::Fetch(format!("unsupported content URI {}", attachment.url))
        })?;
        fs::copy(&src, dest)
            .await
            .map_err(|e| MediaError::Fetch(format!("{}: {}", src.display(), e)))?;
        Ok(())
    }
}
