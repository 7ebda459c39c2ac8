use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use archive_core::{PipelineOptions, ReconcilePolicy};
use regex::Regex;

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub dump_dir: PathBuf,
    pub rooms: RoomSelection,
    pub output_dir: PathBuf,
    pub no_media: bool,
    pub policy: ReconcilePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dump_dir: PathBuf = lookup("ARCHIVE_DUMP_DIR")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("ARCHIVE_DUMP_DIR is not set"))?
            .into();
        let all_rooms = match lookup("ARCHIVE_ALL_ROOMS") {
            Some(v) => parse_bool(&v).context("ARCHIVE_ALL_ROOMS")?,
            None => false,
        };
        let rooms = RoomSelection::new(
            &lookup("ARCHIVE_ROOMS").unwrap_or_default(),
            &lookup("ARCHIVE_ROOM_REGEX").unwrap_or_default(),
            all_rooms,
        )?;
        let output_dir: PathBuf = lookup("ARCHIVE_OUTPUT_DIR")
            .unwrap_or_else(|| ".".into())
            .into();
        let no_media = match lookup("ARCHIVE_NO_MEDIA") {
            Some(v) => parse_bool(&v).context("ARCHIVE_NO_MEDIA")?,
            None => false,
        };
        let policy = match lookup("ARCHIVE_RECONCILE") {
            Some(v) => v
                .parse::<ReconcilePolicy>()
                .map_err(|e| anyhow!("ARCHIVE_RECONCILE: {}", e))?,
            None => ReconcilePolicy::default(),
        };

        Ok(Self {
            dump_dir,
            rooms,
            output_dir,
            no_media,
            policy,
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            media: !self.no_media,
            policy: self.policy,
        }
    }
}

/// Which rooms of the dump to archive: explicit ids plus patterns matched
/// against the start of the room id.
#[derive(Debug, Clone)]
pub struct RoomSelection {
    ids: Vec<String>,
    patterns: Vec<Regex>,
}

impl RoomSelection {
    /// `ids` is comma separated, `patterns` whitespace separated; `all` adds `.*`.
    pub fn new(ids: &str, patterns: &str, all: bool) -> Result<Self> {
        let ids: Vec<String> = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        let mut sources: Vec<&str> = patterns.split_whitespace().collect();
        if all {
            sources.push(".*");
        }
        let patterns = sources
            .into_iter()
            .map(|p| {
                Regex::new(&format!("^(?:{p})"))
                    .map_err(|e| anyhow!("ARCHIVE_ROOM_REGEX: invalid pattern '{}': {}", p, e))
            })
            .collect::<Result<Vec<_>>>()?;

        if ids.is_empty() && patterns.is_empty() {
            bail!("No rooms selected: set ARCHIVE_ROOMS, ARCHIVE_ROOM_REGEX or ARCHIVE_ALL_ROOMS");
        }
        Ok(Self { ids, patterns })
    }

    pub fn matches(&self, room_id: &str) -> bool {
        self.ids.iter().any(|id| id == room_id) || self.patterns.iter().any(|p| p.is_match(room_id))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{}'", other)),
    }
}
