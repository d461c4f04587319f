use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::config::RipConfig;
use crate::error::{MuxError, TagError};
use crate::tools::{AacCat, ChapterMuxer, MetadataTagger, TagFields};

/// Stream concatenation via `MP4Box -cat`.
pub struct Mp4BoxCat {
    bin: PathBuf,
}

impl Mp4BoxCat {
    pub fn new(cfg: &RipConfig) -> Self {
        Mp4BoxCat {
            bin: cfg.mp4box_bin.clone(),
        }
    }
}

#[async_trait]
impl AacCat for Mp4BoxCat {
    async fn concatenate(&self, inputs: &[PathBuf], out: &Path) -> Result<(), MuxError> {
        let mut cmd = Command::new(&self.bin);
        for input in inputs {
            cmd.arg("-cat").arg(input);
        }
        cmd.arg("-new").arg(out);
        debug!("concatenating {} streams into {}", inputs.len(), out.display());
        let output = cmd.output().await.map_err(|e| MuxError::Spawn {
            tool: self.bin.display().to_string(),
            source: e,
        })?;
        if !output.status.success() {
            return Err(MuxError::Tool {
                tool: self.bin.display().to_string(),
                code: output.status.code().unwrap_or(-1),
                action: format!("concatenating into {}", out.display()),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

/// Chapter muxing via `MP4Box -add … -chap …`.
pub struct Mp4BoxMuxer {
    bin: PathBuf,
}

impl Mp4BoxMuxer {
    pub fn new(cfg: &RipConfig) -> Self {
        Mp4BoxMuxer {
            bin: cfg.mp4box_bin.clone(),
        }
    }
}

#[async_trait]
impl ChapterMuxer for Mp4BoxMuxer {
    async fn mux(&self, stream: &Path, chapters: &Path, out: &Path) -> Result<(), MuxError> {
        debug!("muxing {} + {} -> {}", stream.display(), chapters.display(), out.display());
        let output = Command::new(&self.bin)
            .arg("-add")
            .arg(stream)
            .arg("-chap")
            .arg(chapters)
            .arg("-new")
            .arg(out)
            .output()
            .await
            .map_err(|e| MuxError::Spawn {
                tool: self.bin.display().to_string(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(MuxError::Tool {
                tool: self.bin.display().to_string(),
                code: output.status.code().unwrap_or(-1),
                action: format!("muxing {}", out.display()),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

/// Metadata tagging via `mp4tags`.
pub struct Mp4Tags {
    bin: PathBuf,
}

impl Mp4Tags {
    pub fn new(cfg: &RipConfig) -> Self {
        Mp4Tags {
            bin: cfg.mp4tags_bin.clone(),
        }
    }
}

#[async_trait]
impl MetadataTagger for Mp4Tags {
    async fn tag(&self, container: &Path, fields: &TagFields) -> Result<(), TagError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-A")
            .arg(&fields.album)
            .arg("-a")
            .arg(&fields.artist)
            .arg("-y")
            .arg(fields.year.to_string())
            .arg("-g")
            .arg(&fields.genre)
            .arg("-s")
            .arg(&fields.song);
        if let Some(track) = fields.track {
            cmd.arg("-t").arg(track.to_string());
        }
        if let Some((number, total)) = fields.disc {
            cmd.arg("-d")
                .arg(number.to_string())
                .arg("-D")
                .arg(total.to_string());
        }
        cmd.arg(container);
        debug!("tagging {}", container.display());
        let output = cmd.output().await.map_err(|e| TagError::Spawn {
            tool: self.bin.display().to_string(),
            source: e,
        })?;
        if !output.status.success() {
            return Err(TagError::Tool {
                tool: self.bin.display().to_string(),
                code: output.status.code().unwrap_or(-1),
                container: container.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}
