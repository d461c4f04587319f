use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::encode_pool::EncodeOutcome;
use crate::error::RipError;
use crate::status::{DiscRecord, TrackId, TrackStatus};

/// Raw audio artifact for a track, inside its disc's scratch directory.
pub fn raw_path(scratch: &Path, track: TrackId) -> PathBuf {
    scratch.join(format!("track_{:02}.wav", track))
}

/// Encoded artifact for a track, inside its disc's scratch directory.
pub fn encoded_path(scratch: &Path, track: TrackId) -> PathBuf {
    scratch.join(format!("track_{:02}.aac", track))
}

/// Ensure every TOC track has a record; fresh entries start at `rip`.
/// Tracks already recorded keep whatever durable state they reached.
pub fn seed_track_records(rec: &mut DiscRecord) {
    let ids: Vec<TrackId> = match &rec.toc {
        Some(toc) => toc.tracks.iter().map(|e| e.track).collect(),
        None => return,
    };
    for track in ids {
        if rec.track_status(track).is_none() {
            rec.set_track_status(track, TrackStatus::Rip);
        }
    }
}

/// Reset tracks whose intermediate artifacts vanished from the scratch
/// directory. A `ready` track needs its encoded artifact for the upcoming
/// concatenation; an `encode` track needs its raw artifact to restart the
/// encode. Returns true if anything regressed.
pub fn reconcile_artifacts(rec: &mut DiscRecord, scratch: &Path) -> bool {
    let mut changed = false;
    let snapshot: Vec<(TrackId, TrackStatus)> =
        rec.tracks.iter().map(|t| (t.track, t.status)).collect();
    for (track, status) in snapshot {
        let reset = match status {
            TrackStatus::Ready => !encoded_path(scratch, track).exists(),
            TrackStatus::Encode => !raw_path(scratch, track).exists(),
            TrackStatus::Rip => false,
        };
        if reset {
            debug!(
                "disc {} track {}: artifact missing, resetting to rip",
                rec.disc, track
            );
            rec.set_track_status(track, TrackStatus::Rip);
            changed = true;
        }
    }
    changed
}

/// `encode → ready`: apply a joined encode outcome and delete the raw
/// intermediate artifact.
pub fn finish_encode(rec: &mut DiscRecord, outcome: &EncodeOutcome) -> Result<(), RipError> {
    match fs::remove_file(&outcome.raw) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(RipError::io(&outcome.raw, e)),
    }
    rec.set_track_status(outcome.track, TrackStatus::Ready);
    debug!(
        "disc {} track {}: encoded to {}",
        rec.disc,
        outcome.track,
        outcome.encoded.display()
    );
    Ok(())
}
