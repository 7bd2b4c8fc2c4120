//! STR video sector identification.
//!
//! Every video sector of an STR movie opens its user data with a 32-byte
//! chunk header. The header is fully self-validating; a sector whose user
//! data does not pass every check is simply not a video sector (discs
//! interleave audio and data sectors freely), so identification returns
//! `None` rather than an error.

use crate::demux::VideoChunk;
use crate::sector::CdSector;
use crate::utils::errors::HeaderError;
use crate::vlc::{STR_FRAME_MAGIC, StrFrameHeader};

pub const STR_VIDEO_SECTOR_MAGIC: u32 = 0x8001_0160;
pub const STR_VIDEO_HEADER_LEN: usize = 32;
/// User data bytes following the chunk header in a 2048-byte sector.
pub const STR_VIDEO_PAYLOAD_LEN: usize = 2016;

const MAX_DIMENSION: u16 = 1024;

/// The bit-exact 32-byte STR chunk header.
///
/// All fields little-endian: magic `0x80010160`, chunk number, chunks in
/// frame, frame number, used demux size, width, height, run-length code
/// count, the `0x3800` bitstream magic, quantization scale, version, and
/// four reserved bytes that must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrVideoSectorHeader {
    pub chunk_number: u16,
    pub chunks_in_frame: u16,
    pub frame_number: u32,
    pub used_demux_size: u32,
    pub width: u16,
    pub height: u16,
    pub run_length_code_count: u16,
    pub quant_scale: u16,
    pub version: u16,
}

impl StrVideoSectorHeader {
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < STR_VIDEO_HEADER_LEN {
            return Err(HeaderError::Truncated(data.len()));
        }

        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if magic != STR_VIDEO_SECTOR_MAGIC {
            return Err(HeaderError::InvalidSectorMagic(magic));
        }

        let chunk_number = u16::from_le_bytes([data[4], data[5]]);
        let chunks_in_frame = u16::from_le_bytes([data[6], data[7]]);
        let frame_number = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let used_demux_size = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
        let width = u16::from_le_bytes([data[16], data[17]]);
        let height = u16::from_le_bytes([data[18], data[19]]);
        let run_length_code_count = u16::from_le_bytes([data[20], data[21]]);
        let bitstream_magic = u16::from_le_bytes([data[22], data[23]]);
        let quant_scale = u16::from_le_bytes([data[24], data[25]]);
        let version = u16::from_le_bytes([data[26], data[27]]);

        if chunk_number >= chunks_in_frame {
            return Err(HeaderError::ChunkNumberOutOfRange {
                number: chunk_number,
                count: chunks_in_frame,
            });
        }
        if bitstream_magic != STR_FRAME_MAGIC {
            return Err(HeaderError::InvalidBitstreamMagic(bitstream_magic));
        }
        if !(2..=3).contains(&version) {
            return Err(HeaderError::InvalidVersion(version));
        }
        if !(1..=63).contains(&quant_scale) {
            return Err(HeaderError::InvalidQuantScale(quant_scale));
        }
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(HeaderError::InvalidDimensions { width, height });
        }
        let capacity = chunks_in_frame as u32 * STR_VIDEO_PAYLOAD_LEN as u32;
        if used_demux_size > capacity {
            return Err(HeaderError::DemuxSizeTooLarge {
                used: used_demux_size,
                capacity,
            });
        }
        if data[28..32] != [0, 0, 0, 0] {
            return Err(HeaderError::ReservedNotZero);
        }

        Ok(Self {
            chunk_number,
            chunks_in_frame,
            frame_number,
            used_demux_size,
            width,
            height,
            run_length_code_count,
            quant_scale,
            version,
        })
    }

    /// The 8-byte frame header this chunk's fields mirror.
    pub fn frame_header(&self) -> StrFrameHeader {
        StrFrameHeader {
            half_code_count: self.run_length_code_count,
            quant_scale: self.quant_scale,
            version: self.version,
        }
    }
}

/// A disc sector identified as carrying STR video.
#[derive(Debug, Clone)]
pub struct StrVideoSector {
    sector_number: u32,
    header: StrVideoSectorHeader,
    payload: Vec<u8>,
}

impl StrVideoSector {
    /// Checks whether a sector's user data opens with a valid STR chunk
    /// header. Non-video sectors return `None`.
    pub fn identify(sector: &CdSector) -> Option<Self> {
        let data = sector.user_data();
        let header = StrVideoSectorHeader::parse(data).ok()?;
        let end = data.len().min(STR_VIDEO_HEADER_LEN + STR_VIDEO_PAYLOAD_LEN);
        Some(Self {
            sector_number: sector.sector_number(),
            header,
            payload: data[STR_VIDEO_HEADER_LEN..end].to_vec(),
        })
    }

    pub fn sector_number(&self) -> u32 {
        self.sector_number
    }

    pub fn header(&self) -> &StrVideoSectorHeader {
        &self.header
    }

    pub fn into_chunk(self) -> VideoChunk {
        VideoChunk::new(self.sector_number, self.header, self.payload)
    }
}

#[cfg(test)]
pub(crate) fn build_header(
    chunk_number: u16,
    chunks_in_frame: u16,
    frame_number: u32,
    width: u16,
    height: u16,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(STR_VIDEO_HEADER_LEN);
    data.extend_from_slice(&STR_VIDEO_SECTOR_MAGIC.to_le_bytes());
    data.extend_from_slice(&chunk_number.to_le_bytes());
    data.extend_from_slice(&chunks_in_frame.to_le_bytes());
    data.extend_from_slice(&frame_number.to_le_bytes());
    data.extend_from_slice(&(chunks_in_frame as u32 * 2016 / 2).to_le_bytes());
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&0x0100u16.to_le_bytes());
    data.extend_from_slice(&STR_FRAME_MAGIC.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&[0; 4]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() -> anyhow::Result<()> {
        let data = build_header(1, 5, 42, 320, 240);
        let header = StrVideoSectorHeader::parse(&data)?;

        assert_eq!(header.chunk_number, 1);
        assert_eq!(header.chunks_in_frame, 5);
        assert_eq!(header.frame_number, 42);
        assert_eq!((header.width, header.height), (320, 240));
        assert_eq!(header.quant_scale, 2);
        assert_eq!(header.version, 2);
        assert_eq!(header.frame_header().quant_scale, 2);
        Ok(())
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let good = build_header(0, 5, 0, 320, 240);

        let mut bad = good.clone();
        bad[0] = 0x61;
        assert!(matches!(
            StrVideoSectorHeader::parse(&bad),
            Err(HeaderError::InvalidSectorMagic(_))
        ));

        let mut bad = good.clone();
        bad[4] = 5; // chunk_number == chunks_in_frame
        assert!(matches!(
            StrVideoSectorHeader::parse(&bad),
            Err(HeaderError::ChunkNumberOutOfRange { number: 5, count: 5 })
        ));

        let mut bad = good.clone();
        bad[26] = 4;
        assert!(matches!(
            StrVideoSectorHeader::parse(&bad),
            Err(HeaderError::InvalidVersion(4))
        ));

        let mut bad = good.clone();
        bad[16] = 0;
        bad[17] = 0;
        assert!(matches!(
            StrVideoSectorHeader::parse(&bad),
            Err(HeaderError::InvalidDimensions { width: 0, .. })
        ));

        let mut bad = good.clone();
        bad[29] = 1;
        assert!(matches!(
            StrVideoSectorHeader::parse(&bad),
            Err(HeaderError::ReservedNotZero)
        ));

        assert!(matches!(
            StrVideoSectorHeader::parse(&good[..20]),
            Err(HeaderError::Truncated(20))
        ));
    }

    #[test]
    fn identify_splits_header_and_payload() {
        let mut data = build_header(0, 1, 7, 16, 16);
        data.resize(2048, 0xCD);
        let sector = crate::sector::CdSector::new(123, None, data);

        let vid = StrVideoSector::identify(&sector).unwrap();
        assert_eq!(vid.sector_number(), 123);
        assert_eq!(vid.header().frame_number, 7);

        let chunk = vid.into_chunk();
        assert_eq!(chunk.payload().len(), STR_VIDEO_PAYLOAD_LEN);
        assert!(chunk.payload().iter().all(|&b| b == 0xCD));
    }

    #[test]
    fn non_video_sectors_are_not_identified() {
        let sector = crate::sector::CdSector::new(0, None, vec![0u8; 2048]);
        assert!(StrVideoSector::identify(&sector).is_none());
    }
}
