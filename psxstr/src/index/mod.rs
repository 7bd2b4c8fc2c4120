//! Disc indexing.
//!
//! One linear scan of the disc image locates every video stream on it.
//! The scanner fans each sector out to the registered per-format
//! listeners in registration order, synchronously; listeners accumulate
//! stream entries and never touch disc I/O. Entries carry sector spans,
//! dimensions, frame counts and the inferred sectors-per-frame. All
//! interval math is sector-number based.

use anyhow::anyhow;
use std::io::{Read, Seek};

use crate::demux::roadrash::{PacketReader, RoadRashPacket};
use crate::fps::StrFrameRateCalc;
use crate::log_or_err;
use crate::sector::str_video::{StrVideoSector, StrVideoSectorHeader};
use crate::sector::{CdSector, DiscImage};
use crate::utils::errors::PacketError;

/// A forward frame-number jump past this splits the stream; discs with
/// several movies back to back restart numbering nearby, not this far.
pub const FRAME_NUMBER_GAP_TOLERANCE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    StrVideo { version: u16 },
    RoadRash,
}

/// One discovered video stream.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub index: usize,
    pub kind: StreamKind,
    pub start_sector: u32,
    pub end_sector: u32,
    pub width: u16,
    pub height: u16,
    pub frame_count: u32,
    pub has_audio: bool,
    pub sectors_per_frame: Option<f64>,
}

impl StreamEntry {
    pub fn sector_count(&self) -> u32 {
        self.end_sector - self.start_sector + 1
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.sectors_per_frame
            .map(|spf| crate::fps::SECTORS_PER_SECOND / spf)
    }
}

/// Receives every disc sector, in order, during one scan.
pub trait SectorListener {
    fn feed_sector(&mut self, sector: &CdSector) -> anyhow::Result<()>;

    /// Called once after the last sector.
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Single-pass sector iterator over the registered listeners.
#[derive(Default)]
pub struct DiscScanner<'a> {
    listeners: Vec<&'a mut dyn SectorListener>,
}

impl<'a> DiscScanner<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: &'a mut dyn SectorListener) {
        self.listeners.push(listener);
    }

    /// Scans the whole image. `progress` is called after every sector
    /// with (sectors consumed, total).
    pub fn scan<R: Read + Seek>(
        &mut self,
        image: &mut DiscImage<R>,
        mut progress: impl FnMut(u32, u32),
    ) -> anyhow::Result<()> {
        let count = image.sector_count();
        for index in 0..count {
            let sector = image.sector(index)?;
            for listener in &mut self.listeners {
                listener.feed_sector(&sector)?;
            }
            progress(index + 1, count);
        }
        for listener in &mut self.listeners {
            listener.finish()?;
        }
        Ok(())
    }
}

/// Flattens per-listener entries into one list ordered by start sector.
pub fn merge_streams(lists: Vec<Vec<StreamEntry>>) -> Vec<StreamEntry> {
    let mut all: Vec<StreamEntry> = lists.into_iter().flatten().collect();
    all.sort_by_key(|e| e.start_sector);
    for (index, entry) in all.iter_mut().enumerate() {
        entry.index = index;
    }
    all
}

struct VidBuilder {
    start_sector: u32,
    end_sector: u32,
    width: u16,
    height: u16,
    version: u16,
    frame_count: u32,
    current_frame: u32,
    frame_start: u32,
    frame_end: u32,
    has_audio: bool,
    rate: StrFrameRateCalc,
}

impl VidBuilder {
    fn start(header: &StrVideoSectorHeader, sector: u32) -> Self {
        Self {
            start_sector: sector,
            end_sector: sector,
            width: header.width,
            height: header.height,
            version: header.version,
            frame_count: 1,
            current_frame: header.frame_number,
            frame_start: sector,
            frame_end: sector,
            has_audio: false,
            rate: StrFrameRateCalc::new(),
        }
    }

    /// Whether a chunk continues this stream or forces a split.
    fn matches(&self, header: &StrVideoSectorHeader) -> bool {
        (header.width, header.height) == (self.width, self.height)
            && header.version == self.version
            && header.frame_number >= self.current_frame
            && header.frame_number - self.current_frame <= FRAME_NUMBER_GAP_TOLERANCE
    }

    fn add_chunk(&mut self, header: &StrVideoSectorHeader, sector: u32) {
        if header.frame_number != self.current_frame {
            self.rate.add_frame(
                self.frame_start - self.start_sector,
                self.frame_end - self.start_sector,
            );
            self.current_frame = header.frame_number;
            self.frame_start = sector;
            self.frame_count += 1;
        }
        self.frame_end = sector;
        self.end_sector = sector;
    }

    fn finish(mut self, index: usize) -> StreamEntry {
        self.rate.add_frame(
            self.frame_start - self.start_sector,
            self.frame_end - self.start_sector,
        );
        let total = self.end_sector - self.start_sector + 1;
        StreamEntry {
            index,
            kind: StreamKind::StrVideo {
                version: self.version,
            },
            start_sector: self.start_sector,
            end_sector: self.end_sector,
            width: self.width,
            height: self.height,
            frame_count: self.frame_count,
            has_audio: self.has_audio,
            sectors_per_frame: self.rate.sectors_per_frame(total),
        }
    }
}

/// Indexes plain STR video streams.
pub struct StrVideoIndexer {
    fail_level: log::Level,
    builder: Option<VidBuilder>,
    streams: Vec<StreamEntry>,
}

impl StrVideoIndexer {
    pub fn new(strict: bool) -> Self {
        Self {
            fail_level: if strict {
                log::Level::Warn
            } else {
                log::Level::Error
            },
            builder: None,
            streams: Vec::new(),
        }
    }

    fn finish_current(&mut self) {
        if let Some(builder) = self.builder.take() {
            let index = self.streams.len();
            self.streams.push(builder.finish(index));
        }
    }

    pub fn streams(&self) -> &[StreamEntry] {
        &self.streams
    }

    pub fn into_streams(mut self) -> Vec<StreamEntry> {
        self.finish_current();
        self.streams
    }
}

impl SectorListener for StrVideoIndexer {
    fn feed_sector(&mut self, sector: &CdSector) -> anyhow::Result<()> {
        let Some(vid) = StrVideoSector::identify(sector) else {
            if sector.subheader().is_some_and(|s| s.audio()) {
                if let Some(builder) = &mut self.builder {
                    builder.has_audio = true;
                }
            }
            return Ok(());
        };

        let header = *vid.header();
        let split = match &self.builder {
            Some(builder) if !builder.matches(&header) => {
                if header.frame_number > builder.current_frame
                    && header.frame_number - builder.current_frame > FRAME_NUMBER_GAP_TOLERANCE
                {
                    log_or_err!(
                        self,
                        log::Level::Warn,
                        anyhow!(
                            "frame number jumped from {} to {} at sector {}; splitting video stream",
                            builder.current_frame,
                            header.frame_number,
                            sector.sector_number(),
                        ),
                    );
                }
                true
            }
            _ => false,
        };
        if split {
            self.finish_current();
        }

        match &mut self.builder {
            Some(builder) => builder.add_chunk(&header, sector.sector_number()),
            None => self.builder = Some(VidBuilder::start(&header, sector.sector_number())),
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.finish_current();
        Ok(())
    }
}

struct RrBuilder {
    reader: PacketReader,
    start_sector: u32,
    end_sector: u32,
    width: u16,
    height: u16,
    frame_count: u32,
    has_audio: bool,
}

enum DrainOutcome {
    NeedMore,
    Finished,
    Failed(PacketError),
}

impl RrBuilder {
    fn drain(&mut self) -> DrainOutcome {
        loop {
            match self.reader.next_packet() {
                Ok(Some(RoadRashPacket::Mdec(mdec))) => {
                    self.width = mdec.width;
                    self.height = mdec.height;
                    self.frame_count += 1;
                }
                Ok(Some(RoadRashPacket::Audio(_))) => self.has_audio = true,
                Ok(Some(RoadRashPacket::Vlc0 { .. })) => {}
                Ok(None) => {
                    return if self.reader.is_finished() {
                        DrainOutcome::Finished
                    } else {
                        DrainOutcome::NeedMore
                    };
                }
                Err(e) => return DrainOutcome::Failed(e),
            }
        }
    }

    fn finish(self, index: usize) -> StreamEntry {
        let total = self.end_sector - self.start_sector + 1;
        StreamEntry {
            index,
            kind: StreamKind::RoadRash,
            start_sector: self.start_sector,
            end_sector: self.end_sector,
            width: self.width,
            height: self.height,
            frame_count: self.frame_count,
            has_audio: self.has_audio,
            sectors_per_frame: (self.frame_count > 0)
                .then(|| total as f64 / self.frame_count as f64),
        }
    }
}

/// Indexes Road Rash packet streams. A movie runs from its VLC0 packet
/// to the end-of-stream sentinel; one entry per movie.
pub struct RoadRashIndexer {
    fail_level: log::Level,
    builder: Option<RrBuilder>,
    streams: Vec<StreamEntry>,
}

impl RoadRashIndexer {
    pub fn new(strict: bool) -> Self {
        Self {
            fail_level: if strict {
                log::Level::Warn
            } else {
                log::Level::Error
            },
            builder: None,
            streams: Vec::new(),
        }
    }

    fn finish_current(&mut self) {
        if let Some(builder) = self.builder.take() {
            let index = self.streams.len();
            self.streams.push(builder.finish(index));
        }
    }

    pub fn streams(&self) -> &[StreamEntry] {
        &self.streams
    }

    pub fn into_streams(mut self) -> Vec<StreamEntry> {
        self.finish_current();
        self.streams
    }
}

impl SectorListener for RoadRashIndexer {
    fn feed_sector(&mut self, sector: &CdSector) -> anyhow::Result<()> {
        if self.builder.is_none() {
            if !sector.user_data().starts_with(b"VLC0") {
                return Ok(());
            }
            self.builder = Some(RrBuilder {
                reader: PacketReader::new(),
                start_sector: sector.sector_number(),
                end_sector: sector.sector_number(),
                width: 0,
                height: 0,
                frame_count: 0,
                has_audio: false,
            });
        }

        let outcome = match self.builder.as_mut() {
            Some(builder) => {
                builder.reader.push_bytes(sector.user_data());
                builder.end_sector = sector.sector_number();
                builder.drain()
            }
            None => return Ok(()),
        };
        match outcome {
            DrainOutcome::NeedMore => {}
            DrainOutcome::Finished => self.finish_current(),
            DrainOutcome::Failed(e) => {
                log_or_err!(
                    self,
                    log::Level::Warn,
                    anyhow!(
                        "Road Rash stream broken at sector {}: {e}",
                        sector.sector_number(),
                    ),
                );
                self.finish_current();
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(builder) = &self.builder {
            if let Err(e) = builder.reader.finish() {
                log_or_err!(
                    self,
                    log::Level::Warn,
                    anyhow!("Road Rash stream ended mid-packet: {e}"),
                );
            }
        }
        self.finish_current();
        Ok(())
    }
}
