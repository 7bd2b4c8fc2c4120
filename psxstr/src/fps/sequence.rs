//! Frame-layout diagram matching.
//!
//! As frames are discovered during indexing, the observed placement of
//! frame data on sectors is recorded as a diagram string, one symbol per
//! sector: `[` frame start, `.` frame middle, `]` frame end, `#` a frame
//! occupying a single sector, `x` a sector carrying no frame data. The
//! built diagram is then searched for inside a catalog of reference
//! diagrams from previously catalogued titles. Matching is structural:
//! non-frame sectors must align exactly, and every frame boundary the
//! reference declares must also be a boundary in the observation. The
//! reverse containment is not required; it only decides whether the match
//! is one-to-one (constant rate) or a reference frame spans several true
//! frames (variable rate).

use std::sync::OnceLock;

use crate::utils::errors::CatalogError;

/// One reference diagram from the bundled catalog.
#[derive(Debug, Clone)]
pub struct FpsDiagram {
    pub name: String,
    pub sectors_per_frame: f64,
    /// Looping diagrams describe one period of a repeating layout; the
    /// search may wrap around their end.
    pub loops: bool,
    pub diagram: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceMatch {
    pub name: &'static str,
    /// Offset into the reference diagram where the observation aligned.
    pub at_sector: usize,
    pub sectors_per_frame: f64,
    pub one_to_one: bool,
}

/// Observed frame-layout diagram, built incrementally.
#[derive(Debug, Default)]
pub struct FpsSequence {
    symbols: String,
    next_sector: u32,
}

impl FpsSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame's sector span. Sectors skipped since the last
    /// frame are recorded as non-frame sectors.
    pub fn add_frame(&mut self, start_sector: u32, end_sector: u32) {
        for _ in self.next_sector..start_sector {
            self.symbols.push('x');
        }
        let len = (end_sector - start_sector + 1) as usize;
        if len == 1 {
            self.symbols.push('#');
        } else {
            self.symbols.push('[');
            for _ in 0..len - 2 {
                self.symbols.push('.');
            }
            self.symbols.push(']');
        }
        self.next_sector = end_sector + 1;
    }

    pub fn as_str(&self) -> &str {
        &self.symbols
    }

    /// Searches the bundled catalog for a reference diagram containing
    /// this observation. A one-to-one match beats a variable-rate match;
    /// within each class the first catalog entry wins.
    pub fn find_match(&self) -> Option<SequenceMatch> {
        if self.symbols.is_empty() {
            return None;
        }
        let mut fallback = None;
        for diagram in diagram_catalog() {
            if let Some((at_sector, one_to_one)) = match_diagram(&self.symbols, diagram) {
                let m = SequenceMatch {
                    name: &diagram.name,
                    at_sector,
                    sectors_per_frame: diagram.sectors_per_frame,
                    one_to_one,
                };
                if one_to_one {
                    return Some(m);
                }
                fallback.get_or_insert(m);
            }
        }
        fallback
    }
}

/// Whether a frame boundary sits between sector `j` and `j + 1`.
fn frame_break(seq: &[u8], j: usize) -> bool {
    matches!(seq[j], b']' | b'#') || matches!(seq[j + 1], b'[' | b'#')
}

fn window_matches(needle: &[u8], hay: &[u8], offset: usize) -> Option<bool> {
    for (j, &n) in needle.iter().enumerate() {
        if (n == b'x') != (hay[offset + j] == b'x') {
            return None;
        }
    }
    // Every reference boundary must be observed.
    for j in 0..needle.len() - 1 {
        if frame_break(hay, offset + j) && !frame_break(needle, j) {
            return None;
        }
    }
    let one_to_one = (0..needle.len() - 1)
        .all(|j| !frame_break(needle, j) || frame_break(hay, offset + j));
    Some(one_to_one)
}

fn match_diagram(needle: &str, diagram: &FpsDiagram) -> Option<(usize, bool)> {
    let needle = needle.as_bytes();
    if needle.len() < 2 {
        return None;
    }

    let (hay, max_offset) = if diagram.loops {
        let mut extended = diagram.diagram.clone();
        while extended.len() < diagram.diagram.len() + needle.len() {
            extended.push_str(&diagram.diagram);
        }
        (extended, diagram.diagram.len())
    } else {
        if needle.len() > diagram.diagram.len() {
            return None;
        }
        (
            diagram.diagram.clone(),
            diagram.diagram.len() - needle.len() + 1,
        )
    };

    let hay = hay.as_bytes();
    (0..max_offset).find_map(|offset| {
        window_matches(needle, hay, offset).map(|one_to_one| (offset, one_to_one))
    })
}

fn parse_catalog(text: &str) -> Result<Vec<FpsDiagram>, CatalogError> {
    let mut catalog = Vec::new();
    let mut lines = text.lines().enumerate().peekable();

    while let Some((line_no, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (name, spf) = match (fields.next(), fields.next()) {
            (Some(name), Some(spf)) if !name.is_empty() => (name, spf),
            _ => {
                return Err(CatalogError::BadDiagramHeader {
                    line: line_no + 1,
                    text: line.to_string(),
                });
            }
        };
        let sectors_per_frame: f64 = spf.parse().map_err(|_| CatalogError::BadDiagramHeader {
            line: line_no + 1,
            text: line.to_string(),
        })?;
        let loops = fields.next() == Some("loops");

        let diagram = match lines.next() {
            Some((_, d)) if !d.trim().is_empty() => d.trim().to_string(),
            _ => {
                return Err(CatalogError::BadDiagramHeader {
                    line: line_no + 1,
                    text: line.to_string(),
                });
            }
        };
        if let Some(symbol) = diagram.chars().find(|c| !"[.]#x".contains(*c)) {
            return Err(CatalogError::BadDiagramSymbol {
                name: name.to_string(),
                symbol,
            });
        }

        catalog.push(FpsDiagram {
            name: name.to_string(),
            sectors_per_frame,
            loops,
            diagram,
        });
    }
    Ok(catalog)
}

static DIAGRAM_CATALOG: OnceLock<Vec<FpsDiagram>> = OnceLock::new();

/// The bundled reference diagram catalog.
pub fn diagram_catalog() -> &'static [FpsDiagram] {
    DIAGRAM_CATALOG.get_or_init(|| {
        parse_catalog(include_str!("../../resources/fps_diagrams.txt")).unwrap_or_else(|e| {
            log::error!("bundled FPS diagram catalog is malformed: {e}");
            Vec::new()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_places_frames_and_fillers() {
        let mut seq = FpsSequence::new();
        seq.add_frame(0, 3);
        seq.add_frame(5, 8);
        seq.add_frame(9, 9);
        assert_eq!(seq.as_str(), "[..]x[..]#");
    }

    #[test]
    fn known_diagram_matches_at_offset_zero() {
        let mut seq = FpsSequence::new();
        seq.add_frame(0, 3);
        seq.add_frame(5, 8);

        let m = seq.find_match().expect("triplet diagram should match");
        assert_eq!(m.at_sector, 0);
        assert_eq!(m.sectors_per_frame, 3.0);
        assert!(m.one_to_one);
    }

    #[test]
    fn looping_diagram_matches_across_its_end() {
        // Two 8-sector frames separated by two audio sectors only exist
        // in the catalog as the looping "xx[......]" layout.
        let mut seq = FpsSequence::new();
        seq.add_frame(0, 7);
        seq.add_frame(10, 17);
        assert_eq!(seq.as_str(), "[......]xx[......]");

        let m = seq.find_match().expect("looping diagram should match");
        assert_eq!(m.at_sector, 2);
        assert_eq!(m.sectors_per_frame, 10.0);
        assert!(m.one_to_one);
    }

    #[test]
    fn finer_observation_matches_but_is_not_one_to_one() {
        let reference = FpsDiagram {
            name: "wide".into(),
            sectors_per_frame: 8.0,
            loops: false,
            diagram: "[......][......]".into(),
        };
        // Two observed frames inside one reference frame.
        let matched = match_diagram("[..][..]", &reference).unwrap();
        assert_eq!(matched, (0, false));
    }

    #[test]
    fn reference_boundary_missing_from_observation_is_no_match() {
        let reference = FpsDiagram {
            name: "narrow".into(),
            sectors_per_frame: 4.0,
            loops: false,
            diagram: "[..][..]".into(),
        };
        // One long observed frame cannot satisfy the reference's break.
        assert_eq!(match_diagram("[......]", &reference), None);
    }

    #[test]
    fn non_frame_sectors_must_align() {
        let reference = FpsDiagram {
            name: "filler".into(),
            sectors_per_frame: 3.0,
            loops: false,
            diagram: "[..]x[..]".into(),
        };
        assert_eq!(match_diagram("[...][..]", &reference), None);
    }

    #[test]
    fn catalog_resource_parses() {
        let catalog = diagram_catalog();
        assert!(!catalog.is_empty());
        assert!(catalog.iter().any(|d| d.loops));
    }
}
