use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure of the disc reader collaborator (TOC listing, extraction, or
/// medium detection).
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with code {code} while {action}: {stderr}")]
    Tool {
        tool: String,
        code: i32,
        action: String,
        stderr: String,
    },
    #[error("unparseable table of contents: {detail}")]
    Toc { detail: String },
    #[error("no medium detected after {attempts} probe attempt(s)")]
    NoMedium { attempts: u32 },
}

/// Failure of the AAC encoder collaborator.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with code {code} encoding {}: {stderr}", .input.display())]
    Tool {
        tool: String,
        code: i32,
        input: PathBuf,
        stderr: String,
    },
}

/// Failure of the concatenation or container-muxing collaborators.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with code {code} while {action}: {stderr}")]
    Tool {
        tool: String,
        code: i32,
        action: String,
        stderr: String,
    },
}

/// Failure of the metadata tagging collaborator.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with code {code} tagging {}: {stderr}", .container.display())]
    Tool {
        tool: String,
        code: i32,
        container: PathBuf,
        stderr: String,
    },
}

/// Top-level error type for a ripping job. Collaborator failures are never
/// retried; they unwind to the CLI which flushes the status document and
/// exits non-zero.
#[derive(Debug, Error)]
pub enum RipError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    Tag(#[from] TagError),
    /// A state machine found itself with no valid forward transition, or the
    /// status document contradicts what is on disk. Always fatal.
    #[error("status inconsistency: {0}")]
    Consistency(String),
    /// User-initiated cancellation during an interactive wait.
    #[error("interrupted by user")]
    Interrupted,
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RipError {
    /// Wrap an i/o error with the path it happened at.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        RipError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for user-initiated aborts, false for genuine failures.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RipError::Interrupted)
    }
}
