use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use image::ImageFormat;
use tracing::{debug, info, warn};

use super::{CapturedImage, ImageError, ImageProvider};
use crate::session::SessionId;

pub const CAPTURE_FILE_NAME: &str = "latest.jpg";

/// Reads the newest frame dropped by the capture devices.
///
/// Each device writes `<capture_root>/<device>/latest.jpg`; the most recently
/// modified one wins. When an asset directory is configured, the chosen frame
/// is re-encoded under [`SessionId::asset_file_name`] so it can be served
/// under the session's public image URL.
#[derive(Debug, Clone)]
pub struct FsImageProvider {
    capture_root: PathBuf,
    asset_dir: Option<PathBuf>,
}

impl FsImageProvider {
    pub fn new(capture_root: impl Into<PathBuf>) -> Self {
        Self {
            capture_root: capture_root.into(),
            asset_dir: None,
        }
    }

    pub fn with_asset_dir(mut self, asset_dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(asset_dir.into());
        self
    }

    async fn newest_capture(&self) -> Result<Option<PathBuf>, ImageError> {
        let mut entries = match tokio::fs::read_dir(&self.capture_root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(root = %self.capture_root.display(), "Capture root does not exist");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let candidate = entry.path().join(CAPTURE_FILE_NAME);
            let metadata = match tokio::fs::metadata(&candidate).await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            let modified = metadata.modified()?;
            if newest.as_ref().is_none_or(|(best, _)| modified > *best) {
                newest = Some((modified, candidate));
            }
        }

        Ok(newest.map(|(_, path)| path))
    }

    async fn publish(&self, session_id: &SessionId, bytes: Vec<u8>) -> Result<(), ImageError> {
        let Some(asset_dir) = self.asset_dir.clone() else {
            return Ok(());
        };
        let Some(file_name) = session_id.asset_file_name() else {
            warn!(session_id = %session_id, "Session id cannot name a file; skipping asset publish");
            return Ok(());
        };

        let target = asset_dir.join(file_name);
        let written = target.clone();
        tokio::task::spawn_blocking(move || encode_png(&bytes, &asset_dir, &target))
            .await
            .map_err(|e| ImageError::Task(e.to_string()))??;

        info!(path = %written.display(), "Published session image");
        Ok(())
    }
}

fn encode_png(bytes: &[u8], asset_dir: &Path, target: &Path) -> Result<(), ImageError> {
    std::fs::create_dir_all(asset_dir)?;
    let decoded = image::load_from_memory(bytes)?;
    decoded.save_with_format(target, ImageFormat::Png)?;
    Ok(())
}

#[async_trait]
impl ImageProvider for FsImageProvider {
    async fn latest_image(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<CapturedImage>, ImageError> {
        let Some(path) = self.newest_capture().await? else {
            debug!(session_id = %session_id, "No captured image available");
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path).await?;
        debug!(session_id = %session_id, path = %path.display(), size = bytes.len(), "Loaded captured image");

        if let Err(err) = self.publish(session_id, bytes.clone()).await {
            warn!(session_id = %session_id, error = %err, "Failed to publish session image");
        }

        Ok(Some(CapturedImage::new(bytes).with_source(path)))
    }
}
