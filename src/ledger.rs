//! Processed-item ledger persisted as JSON.
//!
//! Lets repeated `detect-*` runs skip items that already produced output.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerData {
    processed: BTreeSet<String>,
}

/// Set of processed item keys, saved after every insert.
#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    data: LedgerData,
}

impl ProcessedLedger {
    /// Load from disk. A missing or corrupt file yields an empty ledger.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                LedgerData::default()
            }),
            Err(_) => LedgerData::default(),
        };
        debug!(path = %path.display(), entries = data.processed.len(), "ledger loaded");
        Self { path, data }
    }

    pub fn material_key(course_id: &str, material_id: &str) -> String {
        format!("material:{}:{}", course_id, material_id)
    }

    pub fn announcement_key(course_id: &str, announcement_id: &str) -> String {
        format!("announcement:{}:{}", course_id, announcement_id)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.processed.contains(key)
    }

    pub fn len(&self) -> usize {
        self.data.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.processed.is_empty()
    }

    /// Record `key` and write the ledger through.
    pub async fn insert(&mut self, key: String) -> Result<()> {
        if self.data.processed.insert(key) {
            self.save().await?;
        }
        Ok(())
    }

    /// Write to a temp file, sync, then rename over the target.
    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path).await?;
        f.write_all(json.as_bytes()).await?;
        f.sync_all().await?;
        drop(f);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".processed.json");

        let mut ledger = ProcessedLedger::load(&path).await;
        assert!(ledger.is_empty());
        ledger
            .insert(ProcessedLedger::material_key("c1", "m1"))
            .await
            .unwrap();

        let reloaded = ProcessedLedger::load(&path).await;
        assert!(reloaded.contains("material:c1:m1"));
        assert!(!reloaded.contains(&ProcessedLedger::announcement_key("c1", "m1")));
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "not json").unwrap();

        let ledger = ProcessedLedger::load(&path).await;
        assert!(ledger.is_empty());
    }
}
