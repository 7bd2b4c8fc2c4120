//! Road Rash packet stream.
//!
//! Road Rash movies do not use the STR chunk layout. Their sectors carry a
//! continuous byte stream of packets, and a packet's payload may straddle
//! two physical sectors, so the reader keeps a persistent byte buffer fed
//! incrementally from successive sectors and runs a 2-state protocol over
//! it: read an 8-byte header, then read the declared payload. An all-zero
//! header is the end-of-stream sentinel.

use std::collections::VecDeque;

use crate::utils::errors::PacketError;
use crate::vlc::{STR_FRAME_HEADER_LEN, StrFrameHeader};

pub const PACKET_HEADER_LEN: usize = 8;
pub const PACKET_SIZE_MIN: u32 = 456;
pub const PACKET_SIZE_MAX: u32 = 14200;

const MAGIC_VLC0: u32 = u32::from_be_bytes(*b"VLC0");
const MAGIC_AU00: u32 = u32::from_be_bytes(*b"au00");
const MAGIC_AU01: u32 = u32::from_be_bytes(*b"au01");
const MAGIC_MDEC: u32 = u32::from_be_bytes(*b"MDEC");

/// Frame sizes Road Rash movies actually use.
pub const ROADRASH_DIMENSIONS: [(u16, u16); 4] =
    [(144, 112), (208, 144), (320, 144), (320, 224)];

pub const ROADRASH_SAMPLE_RATE: u32 = 22050;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChannel {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct MdecPacket {
    pub width: u16,
    pub height: u16,
    pub frame_number: u32,
    pub frame_header: StrFrameHeader,
    pub bitstream: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AudioPacket {
    pub channel: AudioChannel,
    /// Sample frame at which this packet is presented.
    pub presentation_sample_frame: u32,
    /// Raw 15-byte SPU sound units, back to back.
    pub data: Vec<u8>,
}

/// One demultiplexed packet, discriminated by the 4-byte magic.
#[derive(Debug, Clone)]
pub enum RoadRashPacket {
    /// The per-movie VLC table; always first in a movie.
    Vlc0 { table: Vec<u8> },
    Mdec(MdecPacket),
    Audio(AudioPacket),
}

#[derive(Clone, Copy)]
enum ReadState {
    Header,
    Payload { magic: u32, payload_len: usize },
}

/// Incremental packet reader over the cross-sector byte stream.
pub struct PacketReader {
    buffer: VecDeque<u8>,
    state: ReadState,
    finished: bool,
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketReader {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            state: ReadState::Header,
            finished: false,
        }
    }

    /// Appends one sector's worth (or any amount) of stream bytes.
    pub fn push_bytes(&mut self, data: &[u8]) {
        if !self.finished {
            self.buffer.extend(data);
        }
    }

    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the end-of-stream sentinel has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the next complete packet, or `None` when more bytes are
    /// needed or the stream has ended.
    pub fn next_packet(&mut self) -> Result<Option<RoadRashPacket>, PacketError> {
        loop {
            if self.finished {
                return Ok(None);
            }
            match self.state {
                ReadState::Header => {
                    if self.buffer.len() < PACKET_HEADER_LEN {
                        return Ok(None);
                    }
                    let mut header = [0u8; PACKET_HEADER_LEN];
                    for (i, b) in self.buffer.drain(..PACKET_HEADER_LEN).enumerate() {
                        header[i] = b;
                    }
                    if header == [0; PACKET_HEADER_LEN] {
                        self.finished = true;
                        return Ok(None);
                    }

                    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
                    if ![MAGIC_VLC0, MAGIC_AU00, MAGIC_AU01, MAGIC_MDEC].contains(&magic) {
                        return Err(PacketError::InvalidMagic(magic));
                    }
                    // The declared size includes this 8-byte header.
                    let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
                    if size % 4 != 0 {
                        return Err(PacketError::SizeNotAligned(size));
                    }
                    if !(PACKET_SIZE_MIN..=PACKET_SIZE_MAX).contains(&size) {
                        return Err(PacketError::SizeOutOfBounds(size));
                    }
                    self.state = ReadState::Payload {
                        magic,
                        payload_len: size as usize - PACKET_HEADER_LEN,
                    };
                }
                ReadState::Payload { magic, payload_len } => {
                    if self.buffer.len() < payload_len {
                        return Ok(None);
                    }
                    let payload: Vec<u8> = self.buffer.drain(..payload_len).collect();
                    self.state = ReadState::Header;
                    return Ok(Some(parse_payload(magic, payload)?));
                }
            }
        }
    }

    /// Checks that the stream did not end inside a packet. Call once the
    /// source has no more sectors.
    pub fn finish(&self) -> Result<(), PacketError> {
        if let ReadState::Payload { payload_len, .. } = &self.state {
            return Err(PacketError::TruncatedPacket {
                needed: *payload_len,
                available: self.buffer.len(),
            });
        }
        Ok(())
    }
}

fn parse_payload(magic: u32, payload: Vec<u8>) -> Result<RoadRashPacket, PacketError> {
    match magic {
        MAGIC_VLC0 => Ok(RoadRashPacket::Vlc0 { table: payload }),
        MAGIC_MDEC => parse_mdec(payload).map(RoadRashPacket::Mdec),
        MAGIC_AU00 => parse_audio(AudioChannel::Left, payload).map(RoadRashPacket::Audio),
        MAGIC_AU01 => parse_audio(AudioChannel::Right, payload).map(RoadRashPacket::Audio),
        _ => unreachable!("magic validated in the header state"),
    }
}

fn parse_mdec(payload: Vec<u8>) -> Result<MdecPacket, PacketError> {
    // width(2) height(2) frame_number(4) + the 8-byte sub-header.
    if payload.len() < 8 + STR_FRAME_HEADER_LEN {
        return Err(PacketError::MdecTooShort(payload.len()));
    }
    let width = u16::from_be_bytes([payload[0], payload[1]]);
    let height = u16::from_be_bytes([payload[2], payload[3]]);
    if !ROADRASH_DIMENSIONS.contains(&(width, height)) {
        return Err(PacketError::InvalidDimensions { width, height });
    }
    let frame_number = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let frame_header = StrFrameHeader::parse(&payload[8..])?;
    Ok(MdecPacket {
        width,
        height,
        frame_number,
        frame_header,
        bitstream: payload[8 + STR_FRAME_HEADER_LEN..].to_vec(),
    })
}

fn parse_audio(channel: AudioChannel, payload: Vec<u8>) -> Result<AudioPacket, PacketError> {
    if payload.len() < 8 {
        return Err(PacketError::MdecTooShort(payload.len()));
    }
    let presentation_sample_frame =
        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let a = u16::from_be_bytes([payload[4], payload[5]]);
    let b = u16::from_be_bytes([payload[6], payload[7]]);
    if (a, b) != (2048, 512) {
        return Err(PacketError::BadAudioSentinel(a, b));
    }
    Ok(AudioPacket {
        channel,
        presentation_sample_frame,
        data: payload[8..].to_vec(),
    })
}
