use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tracing::{info, warn};

const CHUNK_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const STAGED_IMAGE: &str = "firmware.bin";

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("staged image is empty")]
    EmptyImage,
    #[error("sha256 mismatch (expected {expected}, got {actual})")]
    DigestMismatch { expected: String, actual: String },
    #[error("sidecar digest must be 64 hex characters")]
    MalformedSidecar,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct AppliedUpdate {
    pub bytes: u64,
    pub sha256: String,
}

/// Watches the staging area for firmware images pushed there by an
/// external transport. Verification and install happen here; delivery
/// does not. A rejected image is discarded so it is not retried forever.
pub struct UpdateAgent {
    staging_path: PathBuf,
    sidecar_path: PathBuf,
    install_path: PathBuf,
    last_poll: Option<Instant>,
}

impl UpdateAgent {
    pub fn new(data_dir: &Path) -> Self {
        let staging_dir = data_dir.join("update");
        Self {
            staging_path: staging_dir.join(STAGED_IMAGE),
            sidecar_path: staging_dir.join(format!("{STAGED_IMAGE}.sha256")),
            install_path: data_dir.join(STAGED_IMAGE),
            last_poll: None,
        }
    }

    /// Main-loop service hook. Cheap on the hot path: most calls return
    /// immediately because the poll interval has not elapsed.
    pub async fn service(&mut self) -> Option<AppliedUpdate> {
        let now = Instant::now();
        if let Some(last) = self.last_poll {
            if now.duration_since(last) < POLL_INTERVAL {
                return None;
            }
        }
        self.last_poll = Some(now);

        match self.try_apply().await {
            Ok(applied) => applied,
            Err(err) => {
                warn!("staged update rejected: {err}");
                let _ = tokio::fs::remove_file(&self.staging_path).await;
                let _ = tokio::fs::remove_file(&self.sidecar_path).await;
                None
            }
        }
    }

    async fn try_apply(&self) -> Result<Option<AppliedUpdate>, UpdateError> {
        if tokio::fs::metadata(&self.staging_path).await.is_err() {
            return Ok(None);
        }

        let (bytes, digest) = self.digest_staged().await?;
        if bytes == 0 {
            return Err(UpdateError::EmptyImage);
        }

        if let Some(expected) = self.sidecar_digest().await? {
            if digest != expected {
                return Err(UpdateError::DigestMismatch {
                    expected,
                    actual: digest,
                });
            }
        }

        tokio::fs::rename(&self.staging_path, &self.install_path).await?;
        let _ = tokio::fs::remove_file(&self.sidecar_path).await;
        info!(bytes, sha256 = %digest, "firmware image verified and installed");
        Ok(Some(AppliedUpdate {
            bytes,
            sha256: digest,
        }))
    }

    async fn digest_staged(&self) -> Result<(u64, String), UpdateError> {
        let mut file = tokio::fs::File::open(&self.staging_path).await?;
        let mut hasher = Sha256::new();
        let mut total = 0_u64;
        let mut chunk = [0_u8; CHUNK_SIZE];

        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read]);
            total = total.saturating_add(read as u64);
        }

        Ok((total, hex_digest(hasher)))
    }

    async fn sidecar_digest(&self) -> Result<Option<String>, UpdateError> {
        let raw = match tokio::fs::read_to_string(&self.sidecar_path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let value = raw.trim().to_ascii_lowercase();
        if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(UpdateError::MalformedSidecar);
        }
        Ok(Some(value))
    }
}

fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
