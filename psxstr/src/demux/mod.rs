//! Frame demultiplexing.
//!
//! A frame of STR video spans several disc sectors; each sector contributes
//! one chunk. The demuxer is a per-stream state machine that accumulates
//! chunks into frames and pushes completed frames to a listener. Structural
//! corruption (duplicate chunks, mid-frame dimension or chunk-count changes)
//! fails fast; everything else is recovered by flushing what exists.

use crate::sector::str_video::{STR_VIDEO_PAYLOAD_LEN, StrVideoSectorHeader};
use crate::utils::errors::DemuxError;
use crate::vlc::StrFrameHeader;

pub mod roadrash;

/// One sector's worth of frame data plus its parsed chunk header.
#[derive(Debug, Clone)]
pub struct VideoChunk {
    sector_number: u32,
    header: StrVideoSectorHeader,
    payload: Vec<u8>,
}

impl VideoChunk {
    pub fn new(sector_number: u32, header: StrVideoSectorHeader, payload: Vec<u8>) -> Self {
        Self {
            sector_number,
            header,
            payload,
        }
    }

    pub fn sector_number(&self) -> u32 {
        self.sector_number
    }

    pub fn header(&self) -> &StrVideoSectorHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A completed (possibly partial) frame handed to the demuxer's listener.
#[derive(Debug, Clone)]
pub struct DemuxedFrame {
    pub frame_number: u32,
    pub width: u16,
    pub height: u16,
    pub chunks_in_frame: u16,
    pub received_chunks: u16,
    pub start_sector: u32,
    pub end_sector: u32,
    frame_header: StrFrameHeader,
    slot_len: usize,
    chunks: Vec<Option<Vec<u8>>>,
}

impl DemuxedFrame {
    /// Whether every chunk slot was filled.
    pub fn is_complete(&self) -> bool {
        self.received_chunks == self.chunks_in_frame
    }

    /// The sector assumed to trigger display: the last-arriving chunk's.
    pub fn presentation_sector(&self) -> u32 {
        self.end_sector
    }

    /// The 8-byte bitstream header mirrored in this frame's chunk headers.
    pub fn frame_header(&self) -> StrFrameHeader {
        self.frame_header
    }

    /// Concatenates the chunk payloads in ascending chunk order. Missing
    /// chunks contribute exactly one zero-filled slot, so present chunks
    /// always land at their correct offset.
    pub fn demux_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.slot_len * self.chunks.len()];
        for (i, slot) in self.chunks.iter().enumerate() {
            if let Some(payload) = slot {
                let n = payload.len().min(self.slot_len);
                data[i * self.slot_len..i * self.slot_len + n].copy_from_slice(&payload[..n]);
            }
        }
        data
    }
}

struct PartialFrame {
    frame_number: u32,
    width: u16,
    height: u16,
    chunks_in_frame: u16,
    received_chunks: u16,
    start_sector: u32,
    end_sector: u32,
    frame_header: StrFrameHeader,
    slot_len: usize,
    chunks: Vec<Option<Vec<u8>>>,
}

impl PartialFrame {
    fn start(chunk: VideoChunk) -> Self {
        let header = *chunk.header();
        let slot_len = chunk.payload().len().max(STR_VIDEO_PAYLOAD_LEN);
        let mut chunks = vec![None; header.chunks_in_frame as usize];
        chunks[header.chunk_number as usize] = Some(chunk.payload);
        Self {
            frame_number: header.frame_number,
            width: header.width,
            height: header.height,
            chunks_in_frame: header.chunks_in_frame,
            received_chunks: 1,
            start_sector: chunk.sector_number,
            end_sector: chunk.sector_number,
            frame_header: header.frame_header(),
            slot_len,
            chunks,
        }
    }

    fn add(&mut self, chunk: VideoChunk) -> Result<(), DemuxError> {
        let header = chunk.header();
        if (header.width, header.height) != (self.width, self.height) {
            return Err(DemuxError::DimensionMismatch {
                frame: self.frame_number,
                old_w: self.width,
                old_h: self.height,
                new_w: header.width,
                new_h: header.height,
            });
        }
        if header.chunks_in_frame != self.chunks_in_frame {
            return Err(DemuxError::ChunkCountMismatch {
                frame: self.frame_number,
                old: self.chunks_in_frame,
                new: header.chunks_in_frame,
            });
        }
        if header.chunk_number >= self.chunks_in_frame {
            return Err(DemuxError::ChunkOutOfRange {
                frame: self.frame_number,
                chunk: header.chunk_number,
                count: self.chunks_in_frame,
            });
        }
        let slot = &mut self.chunks[header.chunk_number as usize];
        if slot.is_some() {
            return Err(DemuxError::DuplicateChunk {
                frame: self.frame_number,
                chunk: header.chunk_number,
            });
        }
        *slot = Some(chunk.payload);
        self.received_chunks += 1;
        self.start_sector = self.start_sector.min(chunk.sector_number);
        self.end_sector = self.end_sector.max(chunk.sector_number);
        Ok(())
    }

    fn is_full(&self) -> bool {
        self.received_chunks == self.chunks_in_frame
    }

    fn finish(self) -> DemuxedFrame {
        DemuxedFrame {
            frame_number: self.frame_number,
            width: self.width,
            height: self.height,
            chunks_in_frame: self.chunks_in_frame,
            received_chunks: self.received_chunks,
            start_sector: self.start_sector,
            end_sector: self.end_sector,
            frame_header: self.frame_header,
            slot_len: self.slot_len,
            chunks: self.chunks,
        }
    }
}

/// Chunk accumulation state machine for one elementary video stream.
///
/// Chunks of the current frame are stored at their chunk index. A chunk
/// belonging to a different frame number force-flushes the current frame
/// first; a full frame flushes immediately without waiting for an end
/// marker. [`FrameDemuxer::flush`] emits any partial frame when no more
/// sectors are coming; a partial frame is never silently dropped.
pub struct FrameDemuxer<F: FnMut(DemuxedFrame) -> anyhow::Result<()>> {
    current: Option<PartialFrame>,
    listener: F,
}

impl<F: FnMut(DemuxedFrame) -> anyhow::Result<()>> FrameDemuxer<F> {
    pub fn new(listener: F) -> Self {
        Self {
            current: None,
            listener,
        }
    }

    pub fn feed(&mut self, chunk: VideoChunk) -> Result<(), DemuxError> {
        let chunk = match &mut self.current {
            Some(current) if current.frame_number == chunk.header().frame_number => {
                current.add(chunk)?;
                None
            }
            _ => Some(chunk),
        };
        if let Some(chunk) = chunk {
            self.flush()?;
            self.current = Some(PartialFrame::start(chunk));
        }

        if self.current.as_ref().is_some_and(PartialFrame::is_full) {
            self.flush()?;
        }
        Ok(())
    }

    /// Emits the partial frame currently accumulating, if any.
    pub fn flush(&mut self) -> Result<(), DemuxError> {
        if let Some(frame) = self.current.take() {
            (self.listener)(frame.finish()).map_err(DemuxError::Listener)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn header(
        chunk_number: u16,
        chunks_in_frame: u16,
        frame_number: u32,
    ) -> StrVideoSectorHeader {
        StrVideoSectorHeader {
            chunk_number,
            chunks_in_frame,
            frame_number,
            used_demux_size: chunks_in_frame as u32 * 2016,
            width: 320,
            height: 240,
            run_length_code_count: 100,
            quant_scale: 2,
            version: 2,
        }
    }

    fn chunk(sector: u32, number: u16, count: u16, frame: u32, fill: u8) -> VideoChunk {
        VideoChunk::new(sector, header(number, count, frame), vec![fill; 2048])
    }

    #[test]
    fn frame_bytes_concatenate_in_chunk_order() -> anyhow::Result<()> {
        let frames = RefCell::new(Vec::new());
        let mut demuxer = FrameDemuxer::new(|f| {
            frames.borrow_mut().push(f);
            Ok(())
        });

        // Out of chunk order on purpose.
        demuxer.feed(chunk(101, 1, 2, 5, 0xBB))?;
        demuxer.feed(chunk(100, 0, 2, 5, 0xAA))?;

        let frames = frames.into_inner();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert!(frame.is_complete());
        assert_eq!(frame.frame_number, 5);
        assert_eq!((frame.start_sector, frame.end_sector), (100, 101));

        let data = frame.demux_data();
        assert_eq!(data.len(), 4096);
        assert!(data[..2048].iter().all(|&b| b == 0xAA));
        assert!(data[2048..].iter().all(|&b| b == 0xBB));
        Ok(())
    }

    #[test]
    fn missing_chunk_zero_fills_its_slot() -> anyhow::Result<()> {
        let frames = RefCell::new(Vec::new());
        let mut demuxer = FrameDemuxer::new(|f| {
            frames.borrow_mut().push(f);
            Ok(())
        });

        demuxer.feed(chunk(0, 0, 3, 1, 0x11))?;
        demuxer.feed(chunk(2, 2, 3, 1, 0x33))?;
        demuxer.flush()?;

        let frames = frames.into_inner();
        let frame = &frames[0];
        assert!(!frame.is_complete());
        assert_eq!(frame.received_chunks, 2);

        let data = frame.demux_data();
        assert_eq!(data.len(), 3 * 2048);
        assert!(data[..2048].iter().all(|&b| b == 0x11));
        assert!(data[2048..4096].iter().all(|&b| b == 0));
        assert!(data[4096..].iter().all(|&b| b == 0x33));
        Ok(())
    }

    #[test]
    fn new_frame_number_force_flushes_the_partial_frame() -> anyhow::Result<()> {
        let frames = RefCell::new(Vec::new());
        let mut demuxer = FrameDemuxer::new(|f| {
            frames.borrow_mut().push(f);
            Ok(())
        });

        demuxer.feed(chunk(0, 0, 2, 1, 0))?;
        demuxer.feed(chunk(1, 0, 2, 2, 0))?;
        demuxer.feed(chunk(2, 1, 2, 2, 0))?;

        let frames = frames.into_inner();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_number, 1);
        assert!(!frames[0].is_complete());
        assert_eq!(frames[1].frame_number, 2);
        assert!(frames[1].is_complete());
        Ok(())
    }

    #[test]
    fn duplicate_chunk_is_structural_corruption() {
        let mut demuxer = FrameDemuxer::new(|_| Ok(()));
        demuxer.feed(chunk(0, 0, 3, 9, 0)).unwrap();
        assert!(matches!(
            demuxer.feed(chunk(1, 0, 3, 9, 0)),
            Err(DemuxError::DuplicateChunk { frame: 9, chunk: 0 })
        ));
    }

    #[test]
    fn chunk_count_change_mid_frame_is_structural_corruption() {
        let mut demuxer = FrameDemuxer::new(|_| Ok(()));
        demuxer.feed(chunk(0, 0, 3, 9, 0)).unwrap();
        assert!(matches!(
            demuxer.feed(chunk(1, 1, 4, 9, 0)),
            Err(DemuxError::ChunkCountMismatch {
                frame: 9,
                old: 3,
                new: 4
            })
        ));
    }

    #[test]
    fn dimension_change_mid_frame_is_structural_corruption() {
        let mut demuxer = FrameDemuxer::new(|_| Ok(()));
        demuxer.feed(chunk(0, 0, 3, 9, 0)).unwrap();

        let mut h = header(1, 3, 9);
        h.width = 640;
        let bad = VideoChunk::new(1, h, vec![0; 2048]);
        assert!(matches!(
            demuxer.feed(bad),
            Err(DemuxError::DimensionMismatch { frame: 9, .. })
        ));
    }

    #[test]
    fn flush_with_nothing_pending_is_a_no_op() -> anyhow::Result<()> {
        let count = RefCell::new(0usize);
        let mut demuxer = FrameDemuxer::new(|_| {
            *count.borrow_mut() += 1;
            Ok(())
        });
        demuxer.flush()?;
        assert_eq!(count.into_inner(), 0);
        Ok(())
    }
}
