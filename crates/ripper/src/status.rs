use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RipError;
use crate::timecode::{is_monotonic, Timecode};

/// File name of the durable status document inside the job working directory.
pub const STATUS_FILE: &str = "status.json";

pub type DiscId = u32;
pub type TrackId = u32;

/// Per-track progress: `rip → encode → ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Rip,
    Encode,
    Ready,
}

/// Per-disc progress: `cat → add → tag → cleanup → ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscStatus {
    Cat,
    Add,
    Tag,
    Cleanup,
    Ready,
}

impl DiscStatus {
    /// Next status in the forward-only stage order.
    pub fn next(self) -> Option<DiscStatus> {
        match self {
            DiscStatus::Cat => Some(DiscStatus::Add),
            DiscStatus::Add => Some(DiscStatus::Tag),
            DiscStatus::Tag => Some(DiscStatus::Cleanup),
            DiscStatus::Cleanup => Some(DiscStatus::Ready),
            DiscStatus::Ready => None,
        }
    }
}

/// One table-of-contents entry: a track and its chapter start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub track: TrackId,
    pub start: Timecode,
}

/// A disc's table of contents, fetched once from the drive and memoized
/// permanently. `total` is the full disc length, used to offset chapter
/// marks when discs are combined into a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscToc {
    pub tracks: Vec<TocEntry>,
    pub total: Timecode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track: TrackId,
    pub status: TrackStatus,
}

/// Durable progress ledger for one disc. A missing record means the disc is
/// untouched (implicitly at `cat` with no track work done).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscRecord {
    pub disc: DiscId,
    pub status: DiscStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc: Option<DiscToc>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

impl DiscRecord {
    pub fn new(disc: DiscId) -> Self {
        DiscRecord {
            disc,
            status: DiscStatus::Cat,
            toc: None,
            tracks: Vec::new(),
        }
    }

    pub fn track_status(&self, track: TrackId) -> Option<TrackStatus> {
        self.tracks
            .binary_search_by_key(&track, |t| t.track)
            .ok()
            .map(|i| self.tracks[i].status)
    }

    /// Record a track's status, inserting in ascending track order.
    pub fn set_track_status(&mut self, track: TrackId, status: TrackStatus) {
        match self.tracks.binary_search_by_key(&track, |t| t.track) {
            Ok(i) => self.tracks[i].status = status,
            Err(i) => self.tracks.insert(i, TrackRecord { track, status }),
        }
    }

    /// True iff the TOC is known and every listed track has reached `ready`.
    pub fn all_tracks_ready(&self) -> bool {
        match &self.toc {
            None => false,
            Some(toc) => {
                !toc.tracks.is_empty()
                    && toc
                        .tracks
                        .iter()
                        .all(|e| self.track_status(e.track) == Some(TrackStatus::Ready))
            }
        }
    }
}

/// The whole job's durable state document, one per book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookStatus {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub disc_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub discs: Vec<DiscRecord>,
}

impl BookStatus {
    pub fn new(title: &str, author: &str, year: i32, disc_count: u32) -> Self {
        let now = Utc::now();
        BookStatus {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: author.to_string(),
            year,
            disc_count,
            created_at: now,
            updated_at: now,
            discs: Vec::new(),
        }
    }

    pub fn disc(&self, disc: DiscId) -> Option<&DiscRecord> {
        self.discs
            .binary_search_by_key(&disc, |d| d.disc)
            .ok()
            .map(|i| &self.discs[i])
    }

    /// Fetch a disc's record, creating an untouched one on first use.
    pub fn disc_mut(&mut self, disc: DiscId) -> &mut DiscRecord {
        match self.discs.binary_search_by_key(&disc, |d| d.disc) {
            Ok(i) => &mut self.discs[i],
            Err(i) => {
                self.discs.insert(i, DiscRecord::new(disc));
                &mut self.discs[i]
            }
        }
    }

    /// Check structural invariants of a loaded document. A violation means
    /// the document was edited or corrupted and is unsafe to resume from.
    pub fn validate(&self) -> Result<(), RipError> {
        if self.disc_count == 0 {
            return Err(RipError::Consistency("disc count is zero".to_string()));
        }
        if !self.discs.windows(2).all(|w| w[0].disc < w[1].disc) {
            return Err(RipError::Consistency(
                "disc records out of order".to_string(),
            ));
        }
        for rec in &self.discs {
            if rec.disc == 0 || rec.disc > self.disc_count {
                return Err(RipError::Consistency(format!(
                    "disc {} outside 1..={}",
                    rec.disc, self.disc_count
                )));
            }
            if !rec.tracks.windows(2).all(|w| w[0].track < w[1].track) {
                return Err(RipError::Consistency(format!(
                    "disc {}: track records out of order",
                    rec.disc
                )));
            }
            match &rec.toc {
                None => {
                    if !rec.tracks.is_empty() {
                        return Err(RipError::Consistency(format!(
                            "disc {}: track records but no table of contents",
                            rec.disc
                        )));
                    }
                }
                Some(toc) => {
                    if !toc.tracks.windows(2).all(|w| w[0].track < w[1].track) {
                        return Err(RipError::Consistency(format!(
                            "disc {}: table of contents out of order",
                            rec.disc
                        )));
                    }
                    let starts: Vec<Timecode> = toc.tracks.iter().map(|e| e.start).collect();
                    if !is_monotonic(&starts) {
                        return Err(RipError::Consistency(format!(
                            "disc {}: chapter starts go backwards",
                            rec.disc
                        )));
                    }
                    for t in &rec.tracks {
                        if !toc.tracks.iter().any(|e| e.track == t.track) {
                            return Err(RipError::Consistency(format!(
                                "disc {}: track {} not in table of contents",
                                rec.disc, t.track
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn status_path(workdir: &Path) -> PathBuf {
        workdir.join(STATUS_FILE)
    }

    /// Load the status document from a job working directory, if present.
    pub fn load(workdir: &Path) -> Result<Option<BookStatus>, RipError> {
        let path = Self::status_path(workdir);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| RipError::io(&path, e))?;
        let status: BookStatus = serde_json::from_str(&content).map_err(|e| {
            RipError::Consistency(format!(
                "malformed status document {}: {}",
                path.display(),
                e
            ))
        })?;
        status.validate()?;
        debug!("loaded status document from {}", path.display());
        Ok(Some(status))
    }

    /// Persist the document. Written to a temp file then renamed so a crash
    /// mid-write never leaves a truncated document behind.
    pub fn save(&mut self, workdir: &Path) -> Result<(), RipError> {
        self.updated_at = Utc::now();
        let path = Self::status_path(workdir);
        let tmp = workdir.join(format!("{}.tmp", STATUS_FILE));
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| RipError::Consistency(format!("unserializable status document: {}", e)))?;
        fs::write(&tmp, body).map_err(|e| RipError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| RipError::io(&path, e))?;
        debug!("saved status document to {}", path.display());
        Ok(())
    }
}
