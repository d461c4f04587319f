use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::config::RipConfig;
use crate::error::EncodeError;
use crate::tools::AacEncoder;

/// `faac`-backed AAC encoder. One process per track; the pool runs several
/// of these concurrently while the drive extracts the next track.
pub struct Faac {
    bin: PathBuf,
}

impl Faac {
    pub fn new(cfg: &RipConfig) -> Self {
        Faac {
            bin: cfg.faac_bin.clone(),
        }
    }
}

#[async_trait]
impl AacEncoder for Faac {
    async fn encode(&self, raw: &Path) -> Result<PathBuf, EncodeError> {
        let out = raw.with_extension("aac");
        debug!("encoding {} -> {}", raw.display(), out.display());
        let output = Command::new(&self.bin)
            .arg("-o")
            .arg(&out)
            .arg(raw)
            .output()
            .await
            .map_err(|e| EncodeError::Spawn {
                tool: self.bin.display().to_string(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(EncodeError::Tool {
                tool: self.bin.display().to_string(),
                code: output.status.code().unwrap_or(-1),
                input: raw.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(out)
    }
}
