use std::io;
use std::path::Path;

/// Guess a file extension from the file's leading bytes.
///
/// Returns `Ok(None)` for content that matches no known signature.
pub fn sniff_extension(path: &Path) -> io::Result<Option<&'static str>> {
    Ok(infer::get_from_path(path)?.map(|kind| kind.extension()))
}

pub fn extension_for(head: &[u8]) -> Option<&'static str> {
    infer::get(head).map(|kind| kind.extension())
}
