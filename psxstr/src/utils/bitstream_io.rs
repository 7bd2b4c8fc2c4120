//! Bitstream I/O for STR video payloads.
//!
//! STR bitstreams are sequences of little-endian 16-bit words whose bits are
//! consumed most-significant first within each word. Swapping every byte pair
//! up front turns that into a plain big-endian bit order, which is what the
//! reader below does before handing the buffer to `bitstream_io`.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, SignedInteger, UnsignedInteger};

/// Bit reader over one frame's compressed payload.
#[derive(Debug)]
pub struct MdecBitReader {
    bs: BitReader<io::Cursor<Vec<u8>>, BigEndian>,
    len: u64,
}

impl MdecBitReader {
    /// Builds a reader over `buf`, swapping each 16-bit word.
    ///
    /// A trailing odd byte is padded to a full word so the final bits remain
    /// reachable.
    pub fn from_slice(buf: &[u8]) -> Self {
        let mut swapped = Vec::with_capacity(buf.len() + 1);
        let mut chunks = buf.chunks_exact(2);
        for pair in &mut chunks {
            swapped.push(pair[1]);
            swapped.push(pair[0]);
        }
        if let [last] = chunks.remainder() {
            swapped.push(0);
            swapped.push(*last);
        }

        let len = (swapped.len() as u64) << 3;
        Self {
            bs: BitReader::new(io::Cursor::new(swapped)),
            len,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, n: u32) -> io::Result<S> {
        match self.bs.read_signed_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_s({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }
}
