use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::chapters;
use crate::config::RipConfig;
use crate::disc;
use crate::error::{ReaderError, RipError};
use crate::status::{BookStatus, DiscId};
use crate::tools::{TagFields, Toolbox};

/// Interactive collaborator for physical media exchange. Kept behind a
/// trait so the pipeline is drivable without a console or a drive.
#[async_trait]
pub trait MediaPrompt: Send + Sync {
    /// Ask the operator to load `disc`. `Err(Interrupted)` aborts the job.
    async fn confirm_exchange(&self, disc: DiscId, title: &str) -> Result<(), RipError>;
}

/// Sequences the disc state machines across the whole book, skipping discs
/// that already verified complete, then consolidates and migrates the
/// output artifacts.
pub struct BookPipeline {
    cfg: RipConfig,
    tools: Toolbox,
    prompt: Arc<dyn MediaPrompt>,
}

impl BookPipeline {
    pub fn new(cfg: RipConfig, tools: Toolbox, prompt: Arc<dyn MediaPrompt>) -> Self {
        BookPipeline { cfg, tools, prompt }
    }

    /// Drive the whole book. On success the working directory (status
    /// document included) has been deleted and the outputs moved to their
    /// destination; on error the caller flushes the status document.
    pub async fn run(&self, status: &mut BookStatus, workdir: &Path) -> Result<(), RipError> {
        for d in 1..=status.disc_count {
            if disc::check(status, d, workdir) {
                info!("disc {}: already complete, skipping", d);
                continue;
            }
            self.exchange_medium(d, &status.title).await?;
            disc::run_disc(&self.cfg, &self.tools, status, d, workdir).await?;
            status.save(workdir)?;
        }

        let outputs = self.finalize(status, workdir).await?;
        self.migrate(&outputs)?;

        info!("removing working directory {}", workdir.display());
        fs::remove_dir_all(workdir).map_err(|e| RipError::io(workdir, e))?;
        Ok(())
    }

    async fn exchange_medium(&self, disc: DiscId, title: &str) -> Result<(), RipError> {
        self.tools.tray.eject().await;
        self.prompt.confirm_exchange(disc, title).await?;
        self.tools.tray.retract(self.cfg.tray_retract_retries).await;
        self.wait_for_medium().await
    }

    /// Bounded fixed-interval presence polling, interruptible by Ctrl-C.
    async fn wait_for_medium(&self) -> Result<(), RipError> {
        let interval = Duration::from_secs(self.cfg.poll_interval_secs);
        for attempt in 1..=self.cfg.poll_attempts {
            if self.tools.probe.is_present().await {
                return Ok(());
            }
            debug!(
                "medium not present (attempt {}/{})",
                attempt, self.cfg.poll_attempts
            );
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => return Err(RipError::Interrupted),
            }
        }
        Err(ReaderError::NoMedium {
            attempts: self.cfg.poll_attempts,
        }
        .into())
    }

    /// Produce the final artifact list: either the per-disc containers as
    /// they are, or one combined container built with the same
    /// cat → chapters → mux → tag chain at book granularity.
    async fn finalize(
        &self,
        status: &BookStatus,
        workdir: &Path,
    ) -> Result<Vec<PathBuf>, RipError> {
        let per_disc: Vec<PathBuf> = (1..=status.disc_count)
            .map(|d| disc::DiscPaths::new(workdir, &status.title, d).output)
            .collect();
        if !self.cfg.single_file {
            return Ok(per_disc);
        }

        info!(
            "combining {} discs into a single container",
            status.disc_count
        );
        let stream = workdir.join("book-combined.m4b");
        self.tools.concat.concatenate(&per_disc, &stream).await?;

        let mut tocs = Vec::new();
        for d in 1..=status.disc_count {
            let rec = status.disc(d).ok_or_else(|| {
                RipError::Consistency(format!("disc {} missing from status", d))
            })?;
            let toc = rec.toc.as_ref().ok_or_else(|| {
                RipError::Consistency(format!("disc {} has no table of contents", d))
            })?;
            tocs.push((d, toc));
        }
        let chapter_path = workdir.join("book-chapters.txt");
        chapters::write_chapter_file(&chapter_path, &chapters::render_book_chapters(&tocs))?;

        let output = workdir.join(format!("{}.m4b", status.title));
        self.tools
            .muxer
            .mux(&stream, &chapter_path, &output)
            .await?;

        let fields = TagFields {
            album: status.title.clone(),
            artist: status.author.clone(),
            year: status.year,
            genre: self.cfg.genre.clone(),
            song: status.title.clone(),
            track: None,
            disc: None,
        };
        self.tools.tagger.tag(&output, &fields).await?;
        Ok(vec![output])
    }

    /// Move outputs to the destination directory. An artifact already at
    /// the destination is treated as migrated by an earlier run.
    fn migrate(&self, outputs: &[PathBuf]) -> Result<(), RipError> {
        fs::create_dir_all(&self.cfg.dest_dir)
            .map_err(|e| RipError::io(&self.cfg.dest_dir, e))?;
        for src in outputs {
            let name = src.file_name().ok_or_else(|| {
                RipError::Consistency(format!("output artifact {} has no name", src.display()))
            })?;
            let dest = self.cfg.dest_dir.join(name);
            if dest.exists() {
                info!("{} already migrated, skipping", dest.display());
                continue;
            }
            if !src.exists() {
                return Err(RipError::Consistency(format!(
                    "output artifact {} is missing",
                    src.display()
                )));
            }
            // rename fails across filesystems, fall back to copy + unlink
            if fs::rename(src, &dest).is_err() {
                fs::copy(src, &dest).map_err(|e| RipError::io(&dest, e))?;
                fs::remove_file(src).map_err(|e| RipError::io(src, e))?;
            }
            info!("moved {} -> {}", src.display(), dest.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{DiscStatus, TrackStatus};
    use crate::tools::mock::{self, Call, MockPrompt};

    fn test_cfg(dest: &Path) -> RipConfig {
        let mut cfg = RipConfig::default_config();
        cfg.dest_dir = dest.to_path_buf();
        cfg.poll_interval_secs = 0;
        cfg
    }

    fn two_disc_status() -> BookStatus {
        BookStatus::new("Dune", "Frank Herbert", 1965, 2)
    }

    /// Mark a disc fully done in the document and create its output file,
    /// as a completed earlier run would have left it.
    fn complete_disc(status: &mut BookStatus, disc: DiscId, workdir: &Path) {
        let toc = mock::toc(&[(1, 0), (2, 190_000), (3, 435_000)], 613_000);
        let rec = status.disc_mut(disc);
        rec.toc = Some(toc.clone());
        rec.status = DiscStatus::Ready;
        for entry in &toc.tracks {
            rec.set_track_status(entry.track, TrackStatus::Ready);
        }
        let paths = disc::DiscPaths::new(workdir, &status.title, disc);
        fs::write(&paths.output, b"container").unwrap();
    }

    /// The resume scenario: disc 1 finished in a previous run, so the next
    /// invocation performs zero operations for it and goes straight to the
    /// disc 2 exchange prompt, leaving disc 1's document entry untouched.
    #[tokio::test]
    async fn test_resume_skips_completed_disc() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut status = two_disc_status();
        complete_disc(&mut status, 1, work.path());
        let disc1_before = serde_json::to_string(status.disc(1).unwrap()).unwrap();

        let kit = mock::kit(mock::toc(&[(1, 0), (2, 120_000)], 300_000));
        let prompt = Arc::new(MockPrompt::new());
        let pipeline = BookPipeline::new(test_cfg(dest.path()), kit.toolbox, prompt.clone());
        pipeline.run(&mut status, work.path()).await.unwrap();

        assert_eq!(*prompt.requested.lock().unwrap(), vec![2]);
        let calls = kit.log.calls();
        assert_eq!(
            calls.iter().filter(|c| **c == Call::ListTracks).count(),
            1,
            "only disc 2 is read"
        );
        assert_eq!(
            serde_json::to_string(status.disc(1).unwrap()).unwrap(),
            disc1_before,
            "completed disc entry must be byte-identical after resume"
        );

        // both containers migrated, working directory gone
        assert!(dest.path().join("Dune - Disc 01.m4b").exists());
        assert!(dest.path().join("Dune - Disc 02.m4b").exists());
        assert!(!work.path().exists());
    }

    #[tokio::test]
    async fn test_full_run_processes_discs_in_order() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut status = two_disc_status();

        let kit = mock::kit(mock::toc(&[(1, 0), (2, 120_000)], 300_000));
        let prompt = Arc::new(MockPrompt::new());
        let pipeline = BookPipeline::new(test_cfg(dest.path()), kit.toolbox, prompt.clone());
        pipeline.run(&mut status, work.path()).await.unwrap();

        assert_eq!(*prompt.requested.lock().unwrap(), vec![1, 2]);
        assert!(dest.path().join("Dune - Disc 01.m4b").exists());
        assert!(dest.path().join("Dune - Disc 02.m4b").exists());
    }

    #[tokio::test]
    async fn test_single_file_mode_consolidates() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut status = two_disc_status();

        let mut cfg = test_cfg(dest.path());
        cfg.single_file = true;
        let kit = mock::kit(mock::toc(&[(1, 0), (2, 120_000)], 300_000));
        let prompt = Arc::new(MockPrompt::new());
        let pipeline = BookPipeline::new(cfg, kit.toolbox, prompt);
        pipeline.run(&mut status, work.path()).await.unwrap();

        assert!(dest.path().join("Dune.m4b").exists());
        assert!(!dest.path().join("Dune - Disc 01.m4b").exists());

        // book-level pass: one concat of 2 containers and a disc-free tag
        let calls = kit.log.calls();
        assert!(calls.contains(&Call::Concat(2)));
        assert!(calls.contains(&Call::Tag("Dune".to_string())));
    }

    #[tokio::test]
    async fn test_migration_skips_existing_artifact() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut status = two_disc_status();
        // disc 1 already migrated by an earlier run
        fs::write(dest.path().join("Dune - Disc 01.m4b"), b"old").unwrap();
        complete_disc(&mut status, 1, work.path());

        let kit = mock::kit(mock::toc(&[(1, 0), (2, 120_000)], 300_000));
        let prompt = Arc::new(MockPrompt::new());
        let pipeline = BookPipeline::new(test_cfg(dest.path()), kit.toolbox, prompt);
        pipeline.run(&mut status, work.path()).await.unwrap();

        let kept = fs::read(dest.path().join("Dune - Disc 01.m4b")).unwrap();
        assert_eq!(kept, b"old", "existing artifact must not be overwritten");
    }

    /// User abort at the exchange prompt: the error is `Interrupted` and the
    /// working directory survives for the next invocation to resume from.
    #[tokio::test]
    async fn test_interrupt_at_prompt_keeps_workdir() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut status = two_disc_status();

        let kit = mock::kit(mock::toc(&[(1, 0)], 100_000));
        let prompt = Arc::new(MockPrompt {
            requested: std::sync::Mutex::new(Vec::new()),
            interrupt: true,
        });
        let pipeline = BookPipeline::new(test_cfg(dest.path()), kit.toolbox, prompt);
        let err = pipeline.run(&mut status, work.path()).await.unwrap_err();

        assert!(err.is_interrupted());
        assert!(work.path().exists());
        assert_eq!(
            kit.log.calls(),
            vec![Call::Eject],
            "no collaborator ran after the abort"
        );
    }
}
