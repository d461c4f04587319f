pub mod cdparanoia;
pub mod chapters;
pub mod config;
pub mod disc;
pub mod encode_pool;
pub mod error;
pub mod faac;
pub mod mp4;
pub mod pipeline;
pub mod status;
pub mod timecode;
pub mod tools;
pub mod track;

pub use config::RipConfig;
pub use error::RipError;
pub use pipeline::{BookPipeline, MediaPrompt};
pub use status::{BookStatus, DiscStatus, TrackStatus, STATUS_FILE};
pub use timecode::Timecode;
pub use tools::Toolbox;
