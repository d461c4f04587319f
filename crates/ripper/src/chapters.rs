use std::fs;
use std::path::Path;

use crate::error::RipError;
use crate::status::{DiscId, DiscToc};
use crate::timecode::Timecode;

/// File name of the chapter marker file inside a disc's scratch directory.
pub const CHAPTER_FILE: &str = "chapters.txt";

fn chapter_line(start: Timecode, disc: DiscId, track: u32) -> String {
    format!("{} Disc {:02} - Track {:02}\n", start, disc, track)
}

/// Render MP4Box "simple" chapter syntax for one disc: one
/// `HH:MM:SS.mmm <label>` line per track, ascending track order.
pub fn render_disc_chapters(disc: DiscId, toc: &DiscToc) -> String {
    let mut out = String::new();
    for entry in &toc.tracks {
        out.push_str(&chapter_line(entry.start, disc, entry.track));
    }
    out
}

/// Render the book-granularity chapter list: every disc's tracks, offset by
/// the running total length of the discs before it.
pub fn render_book_chapters(tocs: &[(DiscId, &DiscToc)]) -> String {
    let mut out = String::new();
    let mut offset = Timecode::ZERO;
    for (disc, toc) in tocs {
        for entry in &toc.tracks {
            out.push_str(&chapter_line(offset + entry.start, *disc, entry.track));
        }
        offset = offset + toc.total;
    }
    out
}

pub fn write_chapter_file(path: &Path, body: &str) -> Result<(), RipError> {
    fs::write(path, body).map_err(|e| RipError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TocEntry;
    use proptest::prelude::*;

    fn toc(entries: &[(u32, u64)], total_ms: u64) -> DiscToc {
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

    #[test]
    fn test_disc_chapter_lines() {
        let toc = toc(&[(1, 0), (2, 190_000)], 435_000);
        let body = render_disc_chapters(3, &toc);
        assert_eq!(
            body,
            "00:00:00.000 Disc 03 - Track 01\n00:03:10.000 Disc 03 - Track 02\n"
        );
    }

    #[test]
    fn test_book_chapters_offset_by_disc_totals() {
        // track lengths 03:10.000, 04:05.000, 02:58.000 on disc 1
        let d1 = toc(&[(1, 0), (2, 190_000), (3, 435_000)], 613_000);
        let d2 = toc(&[(1, 0), (2, 120_000)], 300_000);
        let body = render_book_chapters(&[(1, &d1), (2, &d2)]);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 5);
        // disc 2's first track starts where disc 1 ends
        assert_eq!(lines[3], "00:10:13.000 Disc 02 - Track 01");
        assert_eq!(lines[4], "00:12:13.000 Disc 02 - Track 02");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Chapter marks never go backwards, whatever the disc layout.
        #[test]
        fn test_chapter_marks_monotonic(
            mut starts1 in prop::collection::vec(0u64..1_000_000, 1..10),
            mut starts2 in prop::collection::vec(0u64..1_000_000, 1..10),
            total1 in 1_000_000u64..2_000_000,
        ) {
            starts1.sort_unstable();
            starts2.sort_unstable();
            let entries1: Vec<(u32, u64)> = starts1.iter().enumerate().map(|(i, &s)| (i as u32 + 1, s)).collect();
            let entries2: Vec<(u32, u64)> = starts2.iter().enumerate().map(|(i, &s)| (i as u32 + 1, s)).collect();
            let d1 = toc(&entries1, total1);
            let d2 = toc(&entries2, 1_000_000);
            let body = render_book_chapters(&[(1, &d1), (2, &d2)]);

            let marks: Vec<Timecode> = body
                .lines()
                .map(|l| l.split_whitespace().next().unwrap().parse().unwrap())
                .collect();
            prop_assert!(crate::timecode::is_monotonic(&marks));
        }
    }
}
