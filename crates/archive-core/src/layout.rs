use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ArchiveError;

/// On-disk layout of one archived room:
///
/// ```text
/// <output>/<short id>/data.db
///                    /media/
///                    /temp/          (per run, removed by teardown)
///                    /currentavatars/
///                    /messages.json
/// ```
#[derive(Debug, Clone)]
pub struct RoomLayout {
    root: PathBuf,
}

impl RoomLayout {
    /// Create the room directory with its `media/` and `temp/` children.
    pub fn prepare(output_dir: &Path, room_id: &str) -> Result<Self, ArchiveError> {
        let layout = Self {
            root: output_dir.join(short_room_id(room_id)),
        };
        for dir in [layout.root.clone(), layout.media_dir(), layout.temp_dir()] {
            fs::create_dir_all(&dir).map_err(|source| ArchiveError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        info!("Room directory ready at {}", layout.root.display());
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("data.db")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Latest avatar of each current member, one file per user id.
    pub fn current_avatars_dir(&self) -> PathBuf {
        self.root.join("currentavatars")
    }

    pub fn export_path(&self) -> PathBuf {
        self.root.join("messages.json")
    }

    /// Fresh, unused path in the temp directory for one download.
    pub fn temp_file_path(&self) -> PathBuf {
        unused_path(self.temp_dir().join(Uuid::new_v4().simple().to_string()))
    }

    /// Remove the per-run temp directory and anything left in it.
    pub fn teardown(&self) -> Result<(), ArchiveError> {
        let temp = self.temp_dir();
        match fs::remove_dir_all(&temp) {
            Ok(()) => {
                debug!("Removed {}", temp.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArchiveError::Io { path: temp, source }),
        }
    }
}

/// `!AbCdEf:example.org` -> `AbCdEf`
pub fn short_room_id(room_id: &str) -> &str {
    let local = room_id.split(':').next().unwrap_or(room_id);
    local.trim_start_matches('!')
}

/// `name`, or `name(1)`, `name(2)`, ... whichever does not exist yet.
fn unused_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

    (1..)
        .map(|i| parent.join(format!("{stem}({i}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids() {
        assert_eq!(short_room_id("!AbCdEf:example.org"), "AbCdEf");
        assert_eq!(short_room_id("!plain"), "plain");
        assert_eq!(short_room_id("noBang:host:8448"), "noBang");
    }

    #[test]
    fn prepare_and_teardown() {
        let out = tempfile::tempdir().unwrap();
        let layout = RoomLayout::prepare(out.path(), "!room:example.org").unwrap();

        assert_eq!(layout.root(), out.path().join("room"));
        assert!(layout.media_dir().is_dir());
        assert!(layout.temp_dir().is_dir());
        assert_eq!(layout.db_path(), out.path().join("room").join("data.db"));
        assert_eq!(
            layout.current_avatars_dir(),
            out.path().join("room").join("currentavatars")
        );

        fs::write(layout.temp_file_path(), b"leftover").unwrap();
        layout.teardown().unwrap();
        assert!(!layout.temp_dir().exists());
        assert!(layout.media_dir().is_dir());

        // Second teardown is harmless
        layout.teardown().unwrap();
    }

    #[test]
    fn colliding_names_get_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("file.bin");
        fs::write(&base, b"x").unwrap();
        fs::write(dir.path().join("file(1).bin"), b"x").unwrap();

        assert_eq!(unused_path(base), dir.path().join("file(2).bin"));
        assert_eq!(
            unused_path(dir.path().join("fresh")),
            dir.path().join("fresh")
        );
    }
}
