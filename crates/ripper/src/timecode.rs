use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// CD audio addresses positions in frames, 75 to the second.
const FRAMES_PER_SECOND: u64 = 75;

/// Millisecond-precision position used as a chapter start marker.
///
/// Formats as `HH:MM:SS.mmm`; parsing also accepts `MM:SS.mmm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timecode {
    millis: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid timecode {0:?}")]
pub struct TimecodeParseError(String);

impl Timecode {
    pub const ZERO: Timecode = Timecode { millis: 0 };

    pub fn from_millis(millis: u64) -> Self {
        Timecode { millis }
    }

    /// Build from a CD-style minutes:seconds:frames address.
    pub fn from_msf(minutes: u64, seconds: u64, frames: u64) -> Self {
        let millis = (minutes * 60 + seconds) * 1000 + frames * 1000 / FRAMES_PER_SECOND;
        Timecode { millis }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }
}

impl Add for Timecode {
    type Output = Timecode;

    fn add(self, rhs: Timecode) -> Timecode {
        Timecode {
            millis: self.millis.saturating_add(rhs.millis),
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.millis / 3_600_000;
        let minutes = self.millis / 60_000 % 60;
        let seconds = self.millis / 1000 % 60;
        let millis = self.millis % 1000;
        write!(f, "{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }
}

impl FromStr for Timecode {
    type Err = TimecodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TimecodeParseError(s.to_string());

        let (clock, frac) = match s.split_once('.') {
            Some((clock, frac)) => (clock, Some(frac)),
            None => (s, None),
        };

        let millis_part = match frac {
            None => 0,
            Some(frac) => {
                if frac.is_empty() || frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(bad());
                }
                // "5" means 500ms, "05" means 50ms
                let scale = 10u64.pow(3 - frac.len() as u32);
                frac.parse::<u64>().map_err(|_| bad())? * scale
            }
        };

        let fields: Vec<&str> = clock.split(':').collect();
        let (hours, minutes, seconds) = match fields.as_slice() {
            [h, m, sec] => (
                h.parse::<u64>().map_err(|_| bad())?,
                m.parse::<u64>().map_err(|_| bad())?,
                sec.parse::<u64>().map_err(|_| bad())?,
            ),
            [m, sec] => (
                0,
                m.parse::<u64>().map_err(|_| bad())?,
                sec.parse::<u64>().map_err(|_| bad())?,
            ),
            _ => return Err(bad()),
        };
        if seconds >= 60 || (fields.len() == 3 && minutes >= 60) {
            return Err(bad());
        }

        Ok(Timecode {
            millis: ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis_part,
        })
    }
}

impl Serialize for Timecode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timecode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// True iff chapter starts never go backwards across ascending tracks.
pub fn is_monotonic(starts: &[Timecode]) -> bool {
    starts.windows(2).all(|w| w[0] <= w[1])
}
