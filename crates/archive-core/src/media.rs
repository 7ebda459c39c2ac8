use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use archive_db::Database;
use archive_types::MediaRecord;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::MediaError;
use crate::hash::ContentAddress;
use crate::sniff::sniff_extension;

/// Content-addressed media archive for one room.
///
/// Blobs live flat in `dir` as `<uuid>` or `<uuid>.<ext>`; the MEDIA table
/// maps content hash and size to the uuid. Dedup relies on every insert being
/// visible to the next lookup, so a store must not be shared between runs.
pub struct MediaStore<'a> {
    db: &'a Database,
    dir: PathBuf,
}

impl<'a> MediaStore<'a> {
    pub fn new(db: &'a Database, dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            dir: dir.into(),
        }
    }

    /// Take ownership of `candidate` and return the media token for its content.
    ///
    /// Known content (same hash and size) deletes the candidate and returns the
    /// existing token. New content is moved into the store under a fresh id.
    pub fn resolve(&self, candidate: &Path) -> Result<String, MediaError> {
        let read_err = |source| MediaError::Read {
            path: candidate.to_path_buf(),
            source,
        };

        let address = ContentAddress::of(candidate).map_err(read_err)?;
        // Identical bytes sniff identically, so a hit recovers the original extension
        let extension = sniff_extension(candidate).map_err(read_err)?;

        let existing = self.db.media_by_hash(&address.hash)?;
        if let Some(hit) = existing.iter().find(|m| m.size == address.size) {
            let token = media_token(&hit.uuid, extension);
            fs::remove_file(candidate).map_err(|source| MediaError::Discard {
                path: candidate.to_path_buf(),
                source,
            })?;
            if !self.dir.join(&token).exists() {
                warn!("Media {} is registered but missing from {}", token, self.dir.display());
            }
            debug!("Media dedup hit {} for {}", token, address.hash);
            return Ok(token);
        }

        let uuid = Uuid::new_v4().simple().to_string();
        let token = media_token(&uuid, extension);
        let dest = self.dir.join(&token);
        relocate(candidate, &dest).map_err(|source| MediaError::Relocate {
            from: candidate.to_path_buf(),
            to: dest.clone(),
            source,
        })?;

        let record = MediaRecord {
            uuid,
            hash: address.hash,
            size: address.size,
        };
        if let Err(e) = self.db.insert_media(&record) {
            // Keep disk and store in step: no blob without a row
            if let Err(rm) = fs::remove_file(&dest) {
                warn!("Failed to remove {} after store error: {}", dest.display(), rm);
            }
            return Err(e.into());
        }

        info!("Archived new media {} ({} bytes)", token, record.size);
        Ok(token)
    }
}

/// `<uuid>.<ext>`, or the bare uuid when the type is unknown.
pub fn media_token(uuid: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{uuid}.{ext}"),
        None => uuid.to_string(),
    }
}

/// Rename, falling back to copy + delete across filesystems.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(_) => {
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01";

    struct Fixture {
        _root: tempfile::TempDir,
        temp: PathBuf,
        media: PathBuf,
        db: Database,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let temp = root.path().join("temp");
        let media = root.path().join("media");
        fs::create_dir_all(&temp).unwrap();
        fs::create_dir_all(&media).unwrap();
        Fixture {
            _root: root,
            temp,
            media,
            db: Database::open_in_memory().unwrap(),
        }
    }

    fn candidate(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn new_content_is_moved_with_extension() {
        let f = fixture();
        let store = MediaStore::new(&f.db, &f.media);
        let file = candidate(&f.temp, "a", PNG);

        let token = store.resolve(&file).unwrap();
        assert!(token.ends_with(".png"));
        assert!(!file.exists());
        assert_eq!(fs::read(f.media.join(&token)).unwrap(), PNG);
        assert_eq!(f.db.media_count().unwrap(), 1);
    }

    #[test]
    fn unknown_type_gets_bare_uuid() {
        let f = fixture();
        let store = MediaStore::new(&f.db, &f.media);
        let file = candidate(&f.temp, "a", b"plain bytes");

        let token = store.resolve(&file).unwrap();
        assert!(!token.contains('.'));
        assert_eq!(token.len(), 32);
        assert!(f.media.join(&token).exists());
    }

    #[test]
    fn identical_bytes_dedupe() {
        let f = fixture();
        let store = MediaStore::new(&f.db, &f.media);
        let first = candidate(&f.temp, "a", PNG);
        let second = candidate(&f.temp, "b", PNG);

        let t1 = store.resolve(&first).unwrap();
        let t2 = store.resolve(&second).unwrap();

        assert_eq!(t1, t2);
        assert!(!second.exists(), "duplicate must be deleted");
        assert_eq!(f.db.media_count().unwrap(), 1);
        assert_eq!(fs::read_dir(&f.media).unwrap().count(), 1);
    }

    #[test]
    fn same_hash_different_size_registers_twice() {
        let f = fixture();
        let store = MediaStore::new(&f.db, &f.media);
        let file = candidate(&f.temp, "a", b"payload");
        let hash = crate::hash::content_hash(&file).unwrap();

        // A row that collides on hash but not on size
        f.db.insert_media(&MediaRecord {
            uuid: "collider".into(),
            hash: hash.clone(),
            size: 999,
        })
        .unwrap();

        let token = store.resolve(&file).unwrap();
        assert_ne!(token, "collider");
        assert_eq!(f.db.media_by_hash(&hash).unwrap().len(), 2);
    }

    #[test]
    fn missing_candidate_fails_without_store_entry() {
        let f = fixture();
        let store = MediaStore::new(&f.db, &f.media);

        let err = store.resolve(&f.temp.join("ghost")).unwrap_err();
        assert!(matches!(err, MediaError::Read { .. }));
        assert_eq!(f.db.media_count().unwrap(), 0);
    }

    #[test]
    fn unwritable_destination_fails_without_store_entry() {
        let f = fixture();
        let store = MediaStore::new(&f.db, f.media.join("does-not-exist"));
        let file = candidate(&f.temp, "a", PNG);

        let err = store.resolve(&file).unwrap_err();
        assert!(matches!(err, MediaError::Relocate { .. }));
        assert_eq!(f.db.media_count().unwrap(), 0);
        assert!(file.exists());
    }
}
