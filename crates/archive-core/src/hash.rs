use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer for streaming hashes.
const BLOCK_SIZE: usize = 64 * 1024;

/// Content address of a file: hex SHA-256 of its bytes plus its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAddress {
    pub hash: String,
    pub size: u64,
}

impl ContentAddress {
    pub fn of(path: &Path) -> io::Result<Self> {
        Ok(Self {
            hash: content_hash(path)?,
            size: content_size(path)?,
        })
    }
}

/// Streaming SHA-256 of a file, hex encoded.
pub fn content_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn content_size(path: &Path) -> io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        let abc = dir.path().join("abc");
        std::fs::write(&abc, b"abc").unwrap();

        assert_eq!(
            content_hash(&empty).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            ContentAddress::of(&abc).unwrap(),
            ContentAddress {
                hash: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into(),
                size: 3,
            }
        );
    }

    #[test]
    fn spans_multiple_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big");
        let data: Vec<u8> = (0..BLOCK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let expected = hex::encode(Sha256::digest(&data));
        assert_eq!(content_hash(&path).unwrap(), expected);
        assert_eq!(content_size(&path).unwrap(), data.len() as u64);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ContentAddress::of(&dir.path().join("nope")).is_err());
    }
}
