//! Whole-number sectors-per-frame detection.
//!
//! The detector assumes frames are laid out on a fixed integer period of
//! sectors, but neither the period nor its phase is known: the movie's
//! first frame need not start on a period boundary, and audio sectors can
//! push a frame's data away from the period edges. Every sector between
//! the end of frame 1 and the start of frame 2 (inclusive) is therefore a
//! candidate phase, each carrying its own set of plausible periods, and
//! every later frame boundary narrows those sets.

use std::collections::BTreeSet;

/// Periods longer than this are never considered (1 fps at 2x drive
/// speed is 150 sectors; double that for margin).
pub const MAX_SECTORS_PER_FRAME: u32 = 300;

struct Candidate {
    /// Hypothetical start sector of frame 2 (the phase).
    start: u32,
    /// Which multiple of the period the next boundary must land on.
    boundary_index: u32,
    possible: Vec<u32>,
}

/// Constraint-narrowing detector over observed frame boundaries.
///
/// Has no opinion before two frames have been seen.
#[derive(Default)]
pub struct WholeNumberSectorsPerFrame {
    frames_seen: u32,
    first_start: u32,
    prev_end: u32,
    candidates: Vec<Candidate>,
}

impl WholeNumberSectorsPerFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one frame's occupied sector span, in ascending order.
    pub fn add_frame(&mut self, start_sector: u32, end_sector: u32) {
        self.frames_seen += 1;
        match self.frames_seen {
            1 => self.first_start = start_sector,
            2 => {
                for start in (self.prev_end + 1)..=start_sector {
                    // The period covers at least the span from the first
                    // frame's start to this phase.
                    let min_period = start - self.first_start;
                    self.candidates.push(Candidate {
                        start,
                        boundary_index: 1,
                        possible: (min_period.max(1)..=MAX_SECTORS_PER_FRAME).collect(),
                    });
                }
            }
            _ => {
                let prev_end = self.prev_end;
                for candidate in &mut self.candidates {
                    let m = candidate.boundary_index;
                    let lo = prev_end + 1 - candidate.start;
                    let hi = start_sector - candidate.start;
                    candidate.possible.retain(|&n| (lo..=hi).contains(&(m * n)));
                    candidate.boundary_index += 1;
                }
                self.candidates.retain(|c| !c.possible.is_empty());
            }
        }
        self.prev_end = end_sector;
    }

    /// Surviving periods across all phases, with periods that are pure
    /// multiples of a smaller survivor removed.
    pub fn candidates(&self) -> BTreeSet<u32> {
        let all: BTreeSet<u32> = self
            .candidates
            .iter()
            .flat_map(|c| c.possible.iter().copied())
            .collect();
        all.iter()
            .copied()
            .filter(|&n| !all.iter().any(|&d| d < n && n % d == 0))
            .collect()
    }

    /// The detected period, once exactly one candidate survives.
    pub fn result(&self) -> Option<u32> {
        if self.frames_seen < 2 {
            return None;
        }
        let reduced = self.candidates();
        if reduced.len() == 1 {
            reduced.into_iter().next()
        } else {
            None
        }
    }
}
