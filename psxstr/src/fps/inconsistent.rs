//! Catalogued irregular frame sequences.
//!
//! A handful of titles place frames on sectors with no regular period at
//! all. For those the exact per-frame sector spans are catalogued in
//! bundled flat text resources: a header line
//! `sectors/perFrame audioStart audioStride [loopSector]` followed by one
//! `start,end` sector pair per frame. A looping table jumps back to the
//! frame at `loopSector` after its last row, shifted by the length of the
//! pass just played.

use std::sync::OnceLock;

use crate::utils::errors::CatalogError;

#[derive(Debug, Clone)]
pub struct InconsistentFrameSequence {
    pub name: String,
    pub sectors_per_frame: f64,
    pub audio_start: u32,
    pub audio_stride: u32,
    pub loop_sector: Option<u32>,
    /// Per-frame (start, end) sector spans, relative to the movie start.
    pub frames: Vec<(u32, u32)>,
}

fn parse_sequence(name: &str, text: &str) -> Result<InconsistentFrameSequence, CatalogError> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| CatalogError::BadSequenceHeader(String::new()))?;
    let fields: Vec<&str> = header.split_whitespace().collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(CatalogError::BadSequenceHeader(header.to_string()));
    }
    let bad_header = || CatalogError::BadSequenceHeader(header.to_string());
    let sectors_per_frame: f64 = fields[0].parse().map_err(|_| bad_header())?;
    let audio_start: u32 = fields[1].parse().map_err(|_| bad_header())?;
    let audio_stride: u32 = fields[2].parse().map_err(|_| bad_header())?;
    let loop_sector = match fields.get(3) {
        Some(f) => Some(f.parse().map_err(|_| bad_header())?),
        None => None,
    };

    let mut frames = Vec::new();
    for (line_no, line) in lines {
        let bad_pair = || CatalogError::BadSectorPair {
            line: line_no + 1,
            text: line.to_string(),
        };
        let (start, end) = line.trim().split_once(',').ok_or_else(bad_pair)?;
        let start: u32 = start.trim().parse().map_err(|_| bad_pair())?;
        let end: u32 = end.trim().parse().map_err(|_| bad_pair())?;
        if end < start {
            return Err(bad_pair());
        }
        frames.push((start, end));
    }

    Ok(InconsistentFrameSequence {
        name: name.to_string(),
        sectors_per_frame,
        audio_start,
        audio_stride,
        loop_sector,
        frames,
    })
}

static SEQUENCE_CATALOG: OnceLock<Vec<InconsistentFrameSequence>> = OnceLock::new();

/// The bundled per-title irregular sequence tables.
pub fn sequence_catalog() -> &'static [InconsistentFrameSequence] {
    SEQUENCE_CATALOG.get_or_init(|| {
        let sources = [
            ("alice", include_str!("../../resources/seq/alice.txt")),
            ("dredd", include_str!("../../resources/seq/dredd.txt")),
        ];
        sources
            .iter()
            .filter_map(|(name, text)| match parse_sequence(name, text) {
                Ok(seq) => Some(seq),
                Err(e) => {
                    log::error!("bundled frame sequence {name:?} is malformed: {e}");
                    None
                }
            })
            .collect()
    })
}

/// Walks one catalogued table against observed frames.
pub struct SequenceTracker {
    seq: &'static InconsistentFrameSequence,
    index: usize,
    offset: u32,
    exhausted: bool,
}

impl SequenceTracker {
    pub fn new(seq: &'static InconsistentFrameSequence) -> Self {
        Self {
            seq,
            index: 0,
            offset: 0,
            exhausted: false,
        }
    }

    /// Checks the next observed frame span against the table. Once a
    /// non-looping table runs out of rows, no further frame matches.
    pub fn matches_next(&mut self, start_sector: u32, end_sector: u32) -> bool {
        if self.exhausted {
            return false;
        }
        if self.index == self.seq.frames.len() {
            let Some(loop_sector) = self.seq.loop_sector else {
                log::warn!(
                    "frame sequence {:?} ran out of rows without a loop marker at sector {}",
                    self.seq.name,
                    start_sector,
                );
                self.exhausted = true;
                return false;
            };
            let (_, last_end) = self.seq.frames[self.seq.frames.len() - 1];
            self.offset += last_end + 1 - loop_sector;
            self.index = self
                .seq
                .frames
                .iter()
                .position(|&(s, _)| s >= loop_sector)
                .unwrap_or(0);
        }

        let (start, end) = self.seq.frames[self.index];
        self.index += 1;
        (start + self.offset, end + self.offset) == (start_sector, end_sector)
    }
}

/// Finds the catalogued table that reproduces every observed frame span.
pub fn find_sequence_match(frames: &[(u32, u32)]) -> Option<&'static InconsistentFrameSequence> {
    if frames.len() < 2 {
        return None;
    }
    sequence_catalog().iter().find(|seq| {
        let mut tracker = SequenceTracker::new(seq);
        frames.iter().all(|&(s, e)| tracker.matches_next(s, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_tables_parse() {
        let catalog = sequence_catalog();
        assert_eq!(catalog.len(), 2);

        let alice = &catalog[0];
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.sectors_per_frame, 9.5);
        assert_eq!(alice.loop_sector, None);
        assert_eq!(alice.frames[1], (9, 18));

        let dredd = &catalog[1];
        assert_eq!(dredd.loop_sector, Some(12));
        assert_eq!(dredd.frames.len(), 4);
    }

    #[test]
    fn tracker_follows_the_table() {
        let alice = &sequence_catalog()[0];
        let mut tracker = SequenceTracker::new(alice);
        assert!(tracker.matches_next(0, 8));
        assert!(tracker.matches_next(9, 18));
        assert!(!tracker.matches_next(19, 28)); // table says (19, 27)
    }

    #[test]
    fn looping_table_wraps_with_a_shifted_offset() {
        let dredd = &sequence_catalog()[1];
        let mut tracker = SequenceTracker::new(dredd);
        for &(s, e) in &[(0, 10), (12, 22), (24, 34), (36, 46)] {
            assert!(tracker.matches_next(s, e));
        }
        // Rows exhausted; loop back to the row starting at sector 12,
        // shifted by the 35 sectors already played past it.
        assert!(tracker.matches_next(47, 57));
        assert!(tracker.matches_next(59, 69));
        assert!(tracker.matches_next(71, 81));
    }

    #[test]
    fn running_out_without_a_loop_marker_stops_matching() {
        let alice = &sequence_catalog()[0];
        let mut tracker = SequenceTracker::new(alice);
        for &(s, e) in &alice.frames {
            assert!(tracker.matches_next(s, e));
        }
        assert!(!tracker.matches_next(121, 129));
        assert!(!tracker.matches_next(131, 139));
    }

    #[test]
    fn catalog_lookup_by_observed_frames() {
        assert_eq!(
            find_sequence_match(&[(0, 8), (9, 18), (19, 27)]).map(|s| s.name.as_str()),
            Some("alice")
        );
        assert!(find_sequence_match(&[(0, 9), (10, 19)]).is_none());
        assert!(find_sequence_match(&[(0, 8)]).is_none());
    }

    #[test]
    fn malformed_resources_are_rejected() {
        assert!(matches!(
            parse_sequence("t", "10 32\n0,8\n"),
            Err(CatalogError::BadSequenceHeader(_))
        ));
        assert!(matches!(
            parse_sequence("t", "10 32 480\n0;8\n"),
            Err(CatalogError::BadSectorPair { line: 2, .. })
        ));
    }
}
