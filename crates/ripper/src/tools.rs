use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::cdparanoia::{Cdparanoia, EjectCli};
use crate::config::RipConfig;
use crate::error::{EncodeError, MuxError, ReaderError, TagError};
use crate::faac::Faac;
use crate::mp4::{Mp4BoxCat, Mp4BoxMuxer, Mp4Tags};
use crate::status::{DiscToc, TrackId};

/// Reads the physical disc: table of contents and raw track extraction.
#[async_trait]
pub trait DiscReader: Send + Sync {
    async fn list_tracks(&self) -> Result<DiscToc, ReaderError>;

    /// Extract one track into `dir`, returning the raw audio artifact path.
    async fn extract(&self, track: TrackId, dir: &Path) -> Result<PathBuf, ReaderError>;
}

/// Polled check for whether a medium is loaded and readable.
#[async_trait]
pub trait MediumProbe: Send + Sync {
    async fn is_present(&self) -> bool;
}

/// Physical tray control. Failures are tolerated (the presence poll is the
/// authority on whether a disc actually arrived).
#[async_trait]
pub trait TrayControl: Send + Sync {
    async fn eject(&self);
    async fn retract(&self, retries: u32);
}

#[async_trait]
pub trait AacEncoder: Send + Sync {
    /// Encode a raw audio artifact, returning the encoded artifact path.
    async fn encode(&self, raw: &Path) -> Result<PathBuf, EncodeError>;
}

#[async_trait]
pub trait AacCat: Send + Sync {
    /// Concatenate `inputs` in the given order into `out`.
    async fn concatenate(&self, inputs: &[PathBuf], out: &Path) -> Result<(), MuxError>;
}

#[async_trait]
pub trait ChapterMuxer: Send + Sync {
    /// Wrap an audio stream plus a chapter marker file into a container.
    async fn mux(&self, stream: &Path, chapters: &Path, out: &Path) -> Result<(), MuxError>;
}

/// Metadata written by the tagging stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFields {
    pub album: String,
    pub artist: String,
    pub year: i32,
    pub genre: String,
    pub song: String,
    /// Track number, when tagging a per-disc container.
    pub track: Option<u32>,
    /// (disc number, total discs), absent for the combined book container.
    pub disc: Option<(u32, u32)>,
}

#[async_trait]
pub trait MetadataTagger: Send + Sync {
    async fn tag(&self, container: &Path, fields: &TagFields) -> Result<(), TagError>;
}

/// The full set of external collaborators the pipeline drives.
#[derive(Clone)]
pub struct Toolbox {
    pub reader: Arc<dyn DiscReader>,
    pub probe: Arc<dyn MediumProbe>,
    pub tray: Arc<dyn TrayControl>,
    pub encoder: Arc<dyn AacEncoder>,
    pub concat: Arc<dyn AacCat>,
    pub muxer: Arc<dyn ChapterMuxer>,
    pub tagger: Arc<dyn MetadataTagger>,
}

impl Toolbox {
    /// Wire up the command-line tool adapters from configuration.
    pub fn from_config(cfg: &RipConfig) -> Self {
        let cd = Arc::new(Cdparanoia::new(cfg));
        Toolbox {
            reader: cd.clone(),
            probe: cd,
            tray: Arc::new(EjectCli::new(cfg)),
            encoder: Arc::new(Faac::new(cfg)),
            concat: Arc::new(Mp4BoxCat::new(cfg)),
            muxer: Arc::new(Mp4BoxMuxer::new(cfg)),
            tagger: Arc::new(Mp4Tags::new(cfg)),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Barrier;

    use crate::error::RipError;
    use crate::status::TocEntry;
    use crate::timecode::Timecode;

    /// One observed collaborator invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        ListTracks,
        Extract(TrackId),
        Encode(TrackId),
        Concat(usize),
        Mux,
        Tag(String),
        Eject,
        Retract,
        Probe,
    }

    #[derive(Default)]
    pub struct Log(Mutex<Vec<Call>>);

    impl Log {
        pub fn push(&self, call: Call) {
            self.0.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().clone()
        }
    }

    pub fn toc(entries: &[(TrackId, u64)], total_ms: u64) -> DiscToc {
        DiscToc {
            tracks: entries
                .iter()
                .map(|&(track, ms)| TocEntry {
                    track,
                    start: Timecode::from_millis(ms),
                })
                .collect(),
            total: Timecode::from_millis(total_ms),
        }
    }

    fn track_from_artifact(path: &Path) -> TrackId {
        path.file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.rsplit('_').next())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub struct MockReader {
        pub log: Arc<Log>,
        pub toc: DiscToc,
    }

    #[async_trait]
    impl DiscReader for MockReader {
        async fn list_tracks(&self) -> Result<DiscToc, ReaderError> {
            self.log.push(Call::ListTracks);
            Ok(self.toc.clone())
        }

        async fn extract(&self, track: TrackId, dir: &Path) -> Result<PathBuf, ReaderError> {
            self.log.push(Call::Extract(track));
            let out = crate::track::raw_path(dir, track);
            fs::write(&out, b"raw").map_err(|e| ReaderError::Spawn {
                tool: "mock".to_string(),
                source: e,
            })?;
            Ok(out)
        }
    }

    pub struct MockProbe {
        pub log: Arc<Log>,
    }

    #[async_trait]
    impl MediumProbe for MockProbe {
        async fn is_present(&self) -> bool {
            self.log.push(Call::Probe);
            true
        }
    }

    pub struct MockTray {
        pub log: Arc<Log>,
    }

    #[async_trait]
    impl TrayControl for MockTray {
        async fn eject(&self) {
            self.log.push(Call::Eject);
        }

        async fn retract(&self, _retries: u32) {
            self.log.push(Call::Retract);
        }
    }

    pub struct MockEncoder {
        pub log: Arc<Log>,
        /// Fail the encode of this track.
        pub fail_track: Option<TrackId>,
        /// All encodes rendezvous here before returning; proves the barrier
        /// in the pool is only joined after every submission.
        pub barrier: Option<Arc<Barrier>>,
        pub delay: Option<Duration>,
    }

    #[async_trait]
    impl AacEncoder for MockEncoder {
        async fn encode(&self, raw: &Path) -> Result<PathBuf, EncodeError> {
            let track = track_from_artifact(raw);
            self.log.push(Call::Encode(track));
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_track == Some(track) {
                return Err(EncodeError::Tool {
                    tool: "mock".to_string(),
                    code: 1,
                    input: raw.to_path_buf(),
                    stderr: "simulated encode failure".to_string(),
                });
            }
            let out = raw.with_extension("aac");
            fs::write(&out, b"aac").map_err(|e| EncodeError::Spawn {
                tool: "mock".to_string(),
                source: e,
            })?;
            Ok(out)
        }
    }

    pub struct MockCat {
        pub log: Arc<Log>,
    }

    #[async_trait]
    impl AacCat for MockCat {
        async fn concatenate(&self, inputs: &[PathBuf], out: &Path) -> Result<(), MuxError> {
            self.log.push(Call::Concat(inputs.len()));
            fs::write(out, b"combined").map_err(|e| MuxError::Spawn {
                tool: "mock".to_string(),
                source: e,
            })?;
            Ok(())
        }
    }

    pub struct MockMuxer {
        pub log: Arc<Log>,
    }

    #[async_trait]
    impl ChapterMuxer for MockMuxer {
        async fn mux(&self, _stream: &Path, _chapters: &Path, out: &Path) -> Result<(), MuxError> {
            self.log.push(Call::Mux);
            fs::write(out, b"container").map_err(|e| MuxError::Spawn {
                tool: "mock".to_string(),
                source: e,
            })?;
            Ok(())
        }
    }

    pub struct MockTagger {
        pub log: Arc<Log>,
    }

    #[async_trait]
    impl MetadataTagger for MockTagger {
        async fn tag(&self, _container: &Path, fields: &TagFields) -> Result<(), TagError> {
            self.log.push(Call::Tag(fields.song.clone()));
            Ok(())
        }
    }

    /// A mock toolbox plus its shared call log.
    pub struct MockKit {
        pub log: Arc<Log>,
        pub toolbox: Toolbox,
    }

    pub fn kit(toc: DiscToc) -> MockKit {
        kit_with(toc, None, None, None)
    }

    pub fn kit_with(
        toc: DiscToc,
        fail_track: Option<TrackId>,
        barrier: Option<Arc<Barrier>>,
        delay: Option<Duration>,
    ) -> MockKit {
        let log = Arc::new(Log::default());
        let toolbox = Toolbox {
            reader: Arc::new(MockReader {
                log: log.clone(),
                toc,
            }),
            probe: Arc::new(MockProbe { log: log.clone() }),
            tray: Arc::new(MockTray { log: log.clone() }),
            encoder: Arc::new(MockEncoder {
                log: log.clone(),
                fail_track,
                barrier,
                delay,
            }),
            concat: Arc::new(MockCat { log: log.clone() }),
            muxer: Arc::new(MockMuxer { log: log.clone() }),
            tagger: Arc::new(MockTagger { log: log.clone() }),
        };
        MockKit { log, toolbox }
    }

    /// Prompt that records which discs were requested.
    pub struct MockPrompt {
        pub requested: Mutex<Vec<crate::status::DiscId>>,
        pub interrupt: bool,
    }

    impl MockPrompt {
        pub fn new() -> Self {
            MockPrompt {
                requested: Mutex::new(Vec::new()),
                interrupt: false,
            }
        }
    }

    #[async_trait]
    impl crate::pipeline::MediaPrompt for MockPrompt {
        async fn confirm_exchange(
            &self,
            disc: crate::status::DiscId,
            _title: &str,
        ) -> Result<(), RipError> {
            self.requested.lock().unwrap().push(disc);
            if self.interrupt {
                return Err(RipError::Interrupted);
            }
            Ok(())
        }
    }
}
