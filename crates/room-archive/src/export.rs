use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tracing::info;

/// Write the annotated payloads of this run as a pretty-printed JSON array.
///
/// Nothing is written when the run changed nothing, so an earlier export is
/// left alone.
pub async fn write_processed(path: &Path, processed: &[Value]) -> Result<bool> {
    if processed.is_empty() {
        return Ok(false);
    }
    let json = serde_json::to_string_pretty(processed).context("serializing export")?;
    fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {} event(s) to {}", processed.len(), path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_array_in_run_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let processed = vec![json!({ "event_id": "$1" }), json!({ "event_id": "$2" })];

        assert!(write_processed(&path, &processed).await.unwrap());

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, processed);
    }

    #[tokio::test]
    async fn empty_run_keeps_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, "[1]").unwrap();

        assert!(!write_processed(&path, &[]).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1]");
    }
}
