use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the audiobook ripping pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RipConfig {
    /// Directory under which per-book working directories are created
    pub work_root: PathBuf,
    /// Directory finished containers are moved to
    pub dest_dir: PathBuf,
    /// CD device node handed to the reader and tray tools
    pub device: PathBuf,
    /// Seconds between medium-presence probes after a disc exchange
    pub poll_interval_secs: u64,
    /// Number of presence probes before giving up on a disc swap
    pub poll_attempts: u32,
    /// Retry budget for closing the tray after an exchange
    pub tray_retract_retries: u32,
    /// Genre written by the tagging stage
    pub genre: String,
    /// Combine all discs into one container at the end of the job
    pub single_file: bool,
    /// Path to the cdparanoia binary
    pub cdparanoia_bin: PathBuf,
    /// Path to the faac binary
    pub faac_bin: PathBuf,
    /// Path to the MP4Box binary
    pub mp4box_bin: PathBuf,
    /// Path to the mp4tags binary
    pub mp4tags_bin: PathBuf,
    /// Path to the eject binary
    pub eject_bin: PathBuf,
}

impl Default for RipConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl RipConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            work_root: PathBuf::from("/tmp/bookrip"),
            dest_dir: PathBuf::from("."),
            device: PathBuf::from("/dev/cdrom"),
            poll_interval_secs: 5,
            poll_attempts: 24,
            tray_retract_retries: 3,
            genre: "Audiobook".to_string(),
            single_file: false,
            cdparanoia_bin: PathBuf::from("cdparanoia"),
            faac_bin: PathBuf::from("faac"),
            mp4box_bin: PathBuf::from("MP4Box"),
            mp4tags_bin: PathBuf::from("mp4tags"),
            eject_bin: PathBuf::from("eject"),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

                // Try JSON first, then TOML
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    let file_config: RipConfig = toml::from_str(&content).with_context(|| {
                        format!("Failed to parse TOML config: {}", config_path.display())
                    })?;
                    config = file_config;
                } else {
                    let file_config: RipConfig =
                        serde_json::from_str(&content).with_context(|| {
                            format!("Failed to parse JSON config: {}", config_path.display())
                        })?;
                    config = file_config;
                }
            }
        }

        Ok(config)
    }
}
