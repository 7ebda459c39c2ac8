use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use archive_core::MediaFetcher;
use archive_types::Attachment;
use tokio::fs;
use tracing::{info, warn};

use crate::source::{Member, is_safe_component};

/// Snapshot each current member's avatar into `dir/<user id>`, replacing the
/// previous snapshot. Failed downloads are logged and skipped.
pub async fn save_current_avatars<F>(
    dir: &Path,
    members: &HashMap<String, Member>,
    fetcher: &F,
) -> Result<usize>
where
    F: MediaFetcher + ?Sized,
{
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let mut saved = 0;
    for (user_id, member) in members {
        let Some(url) = member.avatar_url() else {
            continue;
        };
        if !is_safe_component(user_id) {
            warn!("Skipping avatar for unusable user id {:?}", user_id);
            continue;
        }
        let attachment = Attachment {
            url: url.to_string(),
        };
        match fetcher.fetch(&attachment, &dir.join(user_id)).await {
            Ok(()) => saved += 1,
            Err(e) => warn!("Could not save avatar of {}: {}", user_id, e),
        }
    }

    info!("Saved {} current avatar(s) to {}", saved, dir.display());
    Ok(saved)
}
