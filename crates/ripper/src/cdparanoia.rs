use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use crate::config::RipConfig;
use crate::error::ReaderError;
use crate::status::{DiscToc, TocEntry, TrackId};
use crate::timecode::Timecode;
use crate::tools::{DiscReader, MediumProbe, TrayControl};

/// `cdparanoia`-backed disc reader. The query report (`-Q`) is the one
/// collaborator output this crate parses as text.
pub struct Cdparanoia {
    bin: PathBuf,
    device: PathBuf,
}

impl Cdparanoia {
    pub fn new(cfg: &RipConfig) -> Self {
        Cdparanoia {
            bin: cfg.cdparanoia_bin.clone(),
            device: cfg.device.clone(),
        }
    }

    fn tool(&self) -> String {
        self.bin.display().to_string()
    }
}

#[async_trait]
impl DiscReader for Cdparanoia {
    async fn list_tracks(&self) -> Result<DiscToc, ReaderError> {
        let output = Command::new(&self.bin)
            .arg("-Q")
            .arg("-d")
            .arg(&self.device)
            .output()
            .await
            .map_err(|e| ReaderError::Spawn {
                tool: self.tool(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(ReaderError::Tool {
                tool: self.tool(),
                code: output.status.code().unwrap_or(-1),
                action: "querying the table of contents".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        // the query report is printed on stderr
        let report = String::from_utf8_lossy(&output.stderr);
        parse_query_report(&report)
    }

    async fn extract(&self, track: TrackId, dir: &Path) -> Result<PathBuf, ReaderError> {
        let out = crate::track::raw_path(dir, track);
        debug!("extracting track {} to {}", track, out.display());
        let output = Command::new(&self.bin)
            .arg("-d")
            .arg(&self.device)
            .arg("-w")
            .arg(track.to_string())
            .arg(&out)
            .output()
            .await
            .map_err(|e| ReaderError::Spawn {
                tool: self.tool(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(ReaderError::Tool {
                tool: self.tool(),
                code: output.status.code().unwrap_or(-1),
                action: format!("extracting track {}", track),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl MediumProbe for Cdparanoia {
    async fn is_present(&self) -> bool {
        match Command::new(&self.bin)
            .arg("-Q")
            .arg("-d")
            .arg(&self.device)
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(e) => {
                warn!("medium probe failed to launch {}: {}", self.tool(), e);
                false
            }
        }
    }
}

/// Parse a `cdparanoia -Q` table-of-contents report. Track lines carry two
/// bracketed `mm:ss.ff` addresses (length then begin); the `TOTAL` line
/// carries the full disc length.
fn parse_query_report(report: &str) -> Result<DiscToc, ReaderError> {
    let mut tracks: Vec<TocEntry> = Vec::new();
    let mut total = None;
    let mut in_table = false;

    for line in report.lines() {
        let line = line.trim();
        if line.starts_with("===") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        if let Some(rest) = line.strip_prefix("TOTAL") {
            total = Some(bracketed_msf(rest).next().ok_or_else(|| ReaderError::Toc {
                detail: format!("TOTAL line without a length: {:?}", line),
            })??);
            break;
        }
        let Some((num, rest)) = line.split_once('.') else {
            continue;
        };
        let Ok(track) = num.trim().parse::<TrackId>() else {
            continue;
        };
        // second bracketed address on a track line is the begin position
        let start = bracketed_msf(rest).nth(1).ok_or_else(|| ReaderError::Toc {
            detail: format!("track line without a begin address: {:?}", line),
        })??;
        tracks.push(TocEntry { track, start });
    }

    let total = total.ok_or_else(|| ReaderError::Toc {
        detail: "no TOTAL line in query report".to_string(),
    })?;
    if tracks.is_empty() {
        return Err(ReaderError::Toc {
            detail: "no audio tracks in query report".to_string(),
        });
    }
    tracks.sort_by_key(|e| e.track);
    Ok(DiscToc { tracks, total })
}

/// Iterate the `[mm:ss.ff]` addresses embedded in a line.
fn bracketed_msf(s: &str) -> impl Iterator<Item = Result<Timecode, ReaderError>> + '_ {
    s.split('[')
        .skip(1)
        .filter_map(|chunk| chunk.split(']').next())
        .map(|addr| {
            msf(addr).ok_or_else(|| ReaderError::Toc {
                detail: format!("bad msf address {:?}", addr),
            })
        })
}

fn msf(addr: &str) -> Option<Timecode> {
    let (minutes, rest) = addr.split_once(':')?;
    let (seconds, frames) = rest.split_once('.')?;
    Some(Timecode::from_msf(
        minutes.trim().parse().ok()?,
        seconds.parse().ok()?,
        frames.parse().ok()?,
    ))
}

/// Tray control via the `eject` utility.
pub struct EjectCli {
    bin: PathBuf,
    device: PathBuf,
}

impl EjectCli {
    pub fn new(cfg: &RipConfig) -> Self {
        EjectCli {
            bin: cfg.eject_bin.clone(),
            device: cfg.device.clone(),
        }
    }
}

#[async_trait]
impl TrayControl for EjectCli {
    async fn eject(&self) {
        match Command::new(&self.bin).arg(&self.device).output().await {
            Ok(output) if !output.status.success() => {
                warn!(
                    "eject exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => warn!("failed to launch {}: {}", self.bin.display(), e),
            _ => {}
        }
    }

    async fn retract(&self, retries: u32) {
        for attempt in 0..=retries {
            match Command::new(&self.bin)
                .arg("-t")
                .arg(&self.device)
                .output()
                .await
            {
                Ok(output) if output.status.success() => return,
                Ok(_) | Err(_) => {
                    debug!("tray retract attempt {} failed", attempt + 1);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        warn!("tray did not close after {} retries", retries);
    }
}
