use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::error::{EncodeError, RipError};
use crate::status::TrackId;
use crate::tools::AacEncoder;

/// One submitted encode operation.
struct EncodeJob {
    track: TrackId,
    raw: PathBuf,
    handle: JoinHandle<Result<PathBuf, EncodeError>>,
}

/// Successful outcome of one encode job.
#[derive(Debug)]
pub struct EncodeOutcome {
    pub track: TrackId,
    pub raw: PathBuf,
    pub encoded: PathBuf,
}

/// Runs encode operations concurrently so that encoding track *k* overlaps
/// with extraction of track *k+1*. Jobs start the moment they are submitted;
/// the pool is implicitly bounded by disc size. Results are only applied to
/// the status document after the single `join_all` barrier.
pub struct EncodePool {
    encoder: Arc<dyn AacEncoder>,
    jobs: Vec<EncodeJob>,
}

impl EncodePool {
    pub fn new(encoder: Arc<dyn AacEncoder>) -> Self {
        EncodePool {
            encoder,
            jobs: Vec::new(),
        }
    }

    /// Start the encode for `track` immediately.
    pub fn submit(&mut self, track: TrackId, raw: PathBuf) {
        let encoder = Arc::clone(&self.encoder);
        let input = raw.clone();
        let handle = tokio::spawn(async move { encoder.encode(&input).await });
        debug!("submitted encode job for track {}", track);
        self.jobs.push(EncodeJob { track, raw, handle });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Wait-all barrier. Every job is awaited before the first failure is
    /// surfaced, and on failure no outcomes are returned at all, so no track
    /// advances past `encode`.
    pub async fn join_all(self) -> Result<Vec<EncodeOutcome>, RipError> {
        let mut outcomes = Vec::with_capacity(self.jobs.len());
        let mut first_failure: Option<RipError> = None;
        for job in self.jobs {
            match job.handle.await {
                Ok(Ok(encoded)) => outcomes.push(EncodeOutcome {
                    track: job.track,
                    raw: job.raw,
                    encoded,
                }),
                Ok(Err(e)) => {
                    warn!("encode job for track {} failed: {}", job.track, e);
                    if first_failure.is_none() {
                        first_failure = Some(e.into());
                    }
                }
                Err(join_err) => {
                    if first_failure.is_none() {
                        first_failure = Some(RipError::Consistency(format!(
                            "encode task for track {} died: {}",
                            job.track, join_err
                        )));
                    }
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }
}
