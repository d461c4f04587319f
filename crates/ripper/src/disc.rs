use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::chapters;
use crate::config::RipConfig;
use crate::encode_pool::EncodePool;
use crate::error::RipError;
use crate::status::{BookStatus, DiscId, DiscRecord, DiscStatus, TrackStatus};
use crate::tools::{TagFields, Toolbox};
use crate::track;

/// Filesystem layout of one disc's processing area. Intermediates live in
/// the scratch directory; the finished container lands in the job working
/// directory so it survives scratch cleanup.
pub struct DiscPaths {
    pub scratch: PathBuf,
    pub combined: PathBuf,
    pub chapters: PathBuf,
    pub output: PathBuf,
}

impl DiscPaths {
    pub fn new(workdir: &Path, title: &str, disc: DiscId) -> Self {
        let scratch = workdir.join(format!("disc_{:02}", disc));
        DiscPaths {
            combined: scratch.join("combined.aac"),
            chapters: scratch.join(chapters::CHAPTER_FILE),
            output: workdir.join(format!("{} - Disc {:02}.m4b", title, disc)),
            scratch,
        }
    }
}

/// Triple completion check: durable status says `ready`, every track is
/// `ready`, and the output artifact actually exists. A document claiming
/// completion while the file is gone forces the disc back through its
/// stages instead of being trusted.
pub fn check(status: &BookStatus, disc: DiscId, workdir: &Path) -> bool {
    let Some(rec) = status.disc(disc) else {
        return false;
    };
    rec.status == DiscStatus::Ready
        && rec.all_tracks_ready()
        && DiscPaths::new(workdir, &status.title, disc).output.exists()
}

/// Walk completion claims backward until they match what is actually on
/// disk, then seed and reconcile the track records. The only regressions a
/// disc ever makes happen here, before any stage runs.
fn normalize(rec: &mut DiscRecord, paths: &DiscPaths) {
    if rec.status == DiscStatus::Ready && !paths.output.exists() {
        debug!("disc {}: output artifact missing, re-verifying", rec.disc);
        rec.status = DiscStatus::Cat;
    }
    if rec.status == DiscStatus::Cleanup && !paths.output.exists() {
        rec.status = DiscStatus::Cat;
    }
    if rec.status == DiscStatus::Tag && !paths.output.exists() {
        rec.status = DiscStatus::Add;
    }
    if rec.status == DiscStatus::Add && !paths.combined.exists() {
        rec.status = DiscStatus::Cat;
    }

    track::seed_track_records(rec);

    // any track needing work invalidates every downstream stage product
    if rec.status != DiscStatus::Cat
        && rec.tracks.iter().any(|t| t.status != TrackStatus::Ready)
    {
        debug!(
            "disc {}: track work pending, restarting stage chain at cat",
            rec.disc
        );
        rec.status = DiscStatus::Cat;
    }

    if rec.status == DiscStatus::Cat && paths.scratch.exists() {
        track::reconcile_artifacts(rec, &paths.scratch);
    }
}

/// Drive one disc from whatever durable state it is in to `ready`.
pub async fn run_disc(
    cfg: &RipConfig,
    tools: &Toolbox,
    status: &mut BookStatus,
    disc: DiscId,
    workdir: &Path,
) -> Result<(), RipError> {
    let title = status.title.clone();
    let author = status.author.clone();
    let year = status.year;
    let disc_count = status.disc_count;
    let paths = DiscPaths::new(workdir, &title, disc);
    let rec = status.disc_mut(disc);

    // the table of contents is fetched once and then treated as ground truth
    if rec.toc.is_none() {
        info!("disc {}: reading table of contents", disc);
        let toc = tools.reader.list_tracks().await?;
        if toc.tracks.is_empty() {
            return Err(RipError::Consistency(format!(
                "disc {}: empty table of contents",
                disc
            )));
        }
        rec.toc = Some(toc);
    }

    normalize(rec, &paths);

    let toc = match rec.toc.clone() {
        Some(toc) => toc,
        None => {
            return Err(RipError::Consistency(format!(
                "disc {}: table of contents vanished",
                disc
            )))
        }
    };

    // Per-track work, in ascending track order. Extraction is serial (one
    // drive), but each encode starts the moment its extraction finishes and
    // runs while the next track is still being pulled off the disc.
    let mut pool = EncodePool::new(Arc::clone(&tools.encoder));
    for entry in &toc.tracks {
        let track_status = match rec.track_status(entry.track) {
            Some(s) => s,
            None => {
                return Err(RipError::Consistency(format!(
                    "disc {}: track {} has no status record",
                    disc, entry.track
                )))
            }
        };
        match track_status {
            TrackStatus::Ready => {
                debug!("disc {} track {}: already ready", disc, entry.track);
            }
            TrackStatus::Encode => {
                // extraction survived an earlier run; only the encode is outstanding
                pool.submit(entry.track, track::raw_path(&paths.scratch, entry.track));
            }
            TrackStatus::Rip => {
                fs::create_dir_all(&paths.scratch)
                    .map_err(|e| RipError::io(&paths.scratch, e))?;
                info!("disc {} track {}: extracting", disc, entry.track);
                let raw = match tools.reader.extract(entry.track, &paths.scratch).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        // let in-flight encodes drain; their results are
                        // discarded so no track advances on a failed run
                        let _ = pool.join_all().await;
                        return Err(e.into());
                    }
                };
                rec.set_track_status(entry.track, TrackStatus::Encode);
                pool.submit(entry.track, raw);
            }
        }
    }

    // the one wait-all barrier per disc
    if !pool.is_empty() {
        info!("disc {}: waiting for {} encode job(s)", disc, pool.len());
    }
    let outcomes = pool.join_all().await?;
    for outcome in &outcomes {
        track::finish_encode(rec, outcome)?;
    }

    if !rec.all_tracks_ready() {
        return Err(RipError::Consistency(format!(
            "disc {}: tracks not all ready after encode barrier",
            disc
        )));
    }

    // stage chain: each arm performs one side effect and yields the next
    // status, so forward-only progress is structural
    let mut stages = 0;
    while rec.status != DiscStatus::Ready {
        stages += 1;
        if stages > 5 {
            return Err(RipError::Consistency(format!(
                "disc {}: stage machine failed to converge at {:?}",
                disc, rec.status
            )));
        }
        rec.status = match rec.status {
            DiscStatus::Cat => {
                let inputs: Vec<PathBuf> = toc
                    .tracks
                    .iter()
                    .map(|e| track::encoded_path(&paths.scratch, e.track))
                    .collect();
                for input in &inputs {
                    if !input.exists() {
                        return Err(RipError::Consistency(format!(
                            "disc {}: encoded artifact {} is missing",
                            disc,
                            input.display()
                        )));
                    }
                }
                info!("disc {}: concatenating {} tracks", disc, inputs.len());
                tools.concat.concatenate(&inputs, &paths.combined).await?;
                DiscStatus::Add
            }
            DiscStatus::Add => {
                let body = chapters::render_disc_chapters(disc, &toc);
                chapters::write_chapter_file(&paths.chapters, &body)?;
                info!("disc {}: muxing chaptered container", disc);
                tools
                    .muxer
                    .mux(&paths.combined, &paths.chapters, &paths.output)
                    .await?;
                DiscStatus::Tag
            }
            DiscStatus::Tag => {
                let fields = TagFields {
                    album: title.clone(),
                    artist: author.clone(),
                    year,
                    genre: cfg.genre.clone(),
                    song: format!("{} - Disc {:02}", title, disc),
                    track: Some(disc),
                    disc: Some((disc, disc_count)),
                };
                info!("disc {}: tagging container", disc);
                tools.tagger.tag(&paths.output, &fields).await?;
                DiscStatus::Cleanup
            }
            DiscStatus::Cleanup => {
                if paths.scratch.exists() {
                    fs::remove_dir_all(&paths.scratch)
                        .map_err(|e| RipError::io(&paths.scratch, e))?;
                }
                DiscStatus::Ready
            }
            DiscStatus::Ready => DiscStatus::Ready,
        };
    }

    info!("disc {}: ready", disc);
    Ok(())
}
