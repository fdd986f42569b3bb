use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::Context;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use airdry_common::{ConfigUpdate, GatewayConfig, MAX_DOCUMENT_BYTES};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Persistence for the settings document plus the admin file listing.
/// Writes are serialized behind one async lock.
#[derive(Clone)]
pub struct ConfigStore {
    data_dir: Arc<PathBuf>,
    config_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl ConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let config_path = data_dir.join(CONFIG_FILE);
        Self {
            data_dir: Arc::new(data_dir),
            config_path: Arc::new(config_path),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Never fails: storage unavailable, file absent, file oversized, and
    /// parse failure all fall back to defaults with `ok = false`. The file
    /// length is checked against the cap before the bytes are read.
    pub async fn load(&self) -> (GatewayConfig, bool) {
        let _guard = self.lock.lock().await;

        let meta = match tokio::fs::metadata(self.config_path.as_ref()).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("no persisted settings, using defaults");
                return (GatewayConfig::default(), false);
            }
            Err(err) => {
                warn!("settings storage unavailable, using defaults: {err}");
                return (GatewayConfig::default(), false);
            }
        };

        if meta.len() > MAX_DOCUMENT_BYTES as u64 {
            warn!(
                "persisted settings are {} bytes (cap {}), using defaults",
                meta.len(),
                MAX_DOCUMENT_BYTES
            );
            return (GatewayConfig::default(), false);
        }

        let raw = match tokio::fs::read(self.config_path.as_ref()).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("persisted settings unreadable, using defaults: {err}");
                return (GatewayConfig::default(), false);
            }
        };

        match GatewayConfig::from_document(&raw) {
            Ok(config) => (config, true),
            Err(err) => {
                warn!("persisted settings rejected, using defaults: {err}");
                (GatewayConfig::default(), false)
            }
        }
    }

    /// Persists the full document. Compact encoding keeps a fully
    /// populated document under the load cap.
    pub async fn save(&self, config: &GatewayConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create data directory {}", parent.display())
            })?;
        }
        let payload = serde_json::to_vec(config)?;
        tokio::fs::write(self.config_path.as_ref(), payload)
            .await
            .with_context(|| format!("failed writing {}", self.config_path.display()))?;
        Ok(())
    }

    /// Merges the partial update into `current`, then persists the full
    /// result. The merge always lands in memory; only persistence can
    /// fail, and the caller decides how to report that.
    pub async fn apply_update(
        &self,
        current: &mut GatewayConfig,
        update: ConfigUpdate,
    ) -> anyhow::Result<()> {
        current.merge(update);
        self.save(current).await
    }

    pub async fn list_files(&self) -> anyhow::Result<Vec<FileEntry>> {
        let mut dir = tokio::fs::read_dir(self.data_dir.as_ref())
            .await
            .with_context(|| format!("failed to read {}", self.data_dir.display()))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
