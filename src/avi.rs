use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use crate::byteorder::{WriteBytesBe, WriteBytesLe};
use crate::{impl_u32_enum, join_bytes_le};
use psxstrd_macros::{ToBytes, riff_chunk};

/// AVIF_HASINDEX: the file carries an idx1 chunk.
pub const AVIF_HASINDEX: u32 = 0x10;
/// AVIIF_KEYFRAME: every uncompressed frame is a sync point.
pub const AVIIF_KEYFRAME: u32 = 0x10;

pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    fn write_all<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let chunk_data = self.chunk_data();
        writer.write_all(self.chunk_id())?;
        writer.write_all(&(chunk_data.len() as u32).to_le_bytes())?;
        writer.write_all(&chunk_data)?;

        // RIFF chunks are word-aligned.
        if chunk_data.len() % 2 == 1 {
            writer.write_all(&[0])?;
        }

        Ok(())
    }
}

#[derive(Debug, ToBytes)]
#[riff_chunk(b"avih")]
pub struct MainHeader {
    pub microsec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: u32,
    pub total_frames: u32,
    pub initial_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
    pub reserved: [u32; 4],
}

#[derive(Debug, ToBytes)]
#[riff_chunk(b"strh")]
pub struct StreamHeader {
    pub fcc_type: [u8; 4],
    pub fcc_handler: [u8; 4],
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
    /// rcFrame: left, top, right, bottom.
    pub frame: [u16; 4],
}

/// BITMAPINFOHEADER biCompression values.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// BI_RGB, uncompressed device-independent bitmap.
    Rgb = 0,
}

impl_u32_enum!(Compression);

#[derive(Debug, ToBytes)]
#[riff_chunk(b"strf")]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: i32,
    /// Positive height means a bottom-up bitmap.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: Compression,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

fn list_bytes(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut vec = Vec::with_capacity(body.len() + 12);
    vec.extend_from_slice(b"LIST");
    vec.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    vec.extend_from_slice(kind);
    vec.extend_from_slice(body);
    vec
}

fn chunk_bytes<C: RiffChunk>(chunk: &C) -> io::Result<Vec<u8>> {
    let mut vec = Vec::new();
    chunk.write_all(&mut vec)?;
    Ok(vec)
}

/// RIFF/AVI writer for a single uncompressed bottom-up BGR video stream.
///
/// The frame count and the chunk sizes are unknown until the last frame,
/// so the header is written with placeholders and patched by seeking back
/// in `finish()`.
pub struct AviWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    width: u32,
    height: u32,
    frame_rate: f64,
    riff_size_position: u64,
    total_frames_position: u64,
    stream_length_position: u64,
    movi_size_position: u64,
    /// Position of the "movi" fourcc; idx1 offsets are relative to it.
    movi_list_start: u64,
    frames_written: u32,
    data_written: u64,
    index: Vec<(u32, u32)>,
}

impl<W: Write + Seek> AviWriter<W> {
    pub fn new(writer: W, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            writer: BufWriter::new(writer),
            width,
            height,
            frame_rate,
            riff_size_position: 0,
            total_frames_position: 0,
            stream_length_position: 0,
            movi_size_position: 0,
            movi_list_start: 0,
            frames_written: 0,
            data_written: 0,
            index: Vec::new(),
        }
    }

    /// Bytes per DIB row, padded to a 4-byte boundary.
    fn row_stride(&self) -> usize {
        (self.width as usize * 3).next_multiple_of(4)
    }

    fn frame_size(&self) -> u32 {
        (self.row_stride() * self.height as usize) as u32
    }

    /// Write the RIFF header, the hdrl list and the movi list header.
    pub fn write_header(&mut self) -> io::Result<()> {
        let frame_size = self.frame_size();

        let avih = MainHeader {
            microsec_per_frame: (1_000_000.0 / self.frame_rate).round() as u32,
            max_bytes_per_sec: (frame_size as f64 * self.frame_rate).round() as u32,
            padding_granularity: 0,
            flags: AVIF_HASINDEX,
            total_frames: 0,
            initial_frames: 0,
            streams: 1,
            suggested_buffer_size: frame_size,
            width: self.width,
            height: self.height,
            reserved: [0; 4],
        };

        let strh = StreamHeader {
            fcc_type: *b"vids",
            fcc_handler: *b"DIB ",
            flags: 0,
            priority: 0,
            language: 0,
            initial_frames: 0,
            scale: 1000,
            rate: (self.frame_rate * 1000.0).round() as u32,
            start: 0,
            length: 0,
            suggested_buffer_size: frame_size,
            quality: 0,
            sample_size: 0,
            frame: [0, 0, self.width as u16, self.height as u16],
        };

        let strf = BitmapInfoHeader {
            size: 40,
            width: self.width as i32,
            height: self.height as i32,
            planes: 1,
            bit_count: 24,
            compression: Compression::Rgb,
            size_image: frame_size,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
        };

        self.writer.write_all(b"RIFF")?;
        self.riff_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // File size (patched later)
        self.writer.write_all(b"AVI ")?;

        let mut strl_body = chunk_bytes(&strh)?;
        strl_body.extend(chunk_bytes(&strf)?);

        let mut hdrl_body = chunk_bytes(&avih)?;
        hdrl_body.extend(list_bytes(b"strl", &strl_body));

        let hdrl_start = self.writer.stream_position()?;
        // dwTotalFrames sits 16 bytes into the avih data; dwLength sits 32
        // bytes into the strh data. Both are patched in finish().
        self.total_frames_position = hdrl_start + 12 + 8 + 16;
        self.stream_length_position = hdrl_start + 12 + 8 + 56 + 12 + 8 + 32;
        self.writer.write_all(&list_bytes(b"hdrl", &hdrl_body))?;

        self.writer.write_all(b"LIST")?;
        self.movi_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // movi size (patched later)
        self.movi_list_start = self.writer.stream_position()?;
        self.writer.write_all(b"movi")?;

        Ok(())
    }

    /// Write one frame of top-down RGB pixels as a bottom-up BGR DIB chunk.
    pub fn write_frame(&mut self, rgb: &[u8]) -> io::Result<()> {
        let row_len = self.width as usize * 3;
        if rgb.len() != row_len * self.height as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame pixel buffer does not match the configured dimensions",
            ));
        }

        let offset = self.writer.stream_position()? - self.movi_list_start;
        let frame_size = self.frame_size();

        self.writer.write_all(b"00dc")?;
        self.writer.write_all(&frame_size.to_le_bytes())?;

        let stride = self.row_stride();
        let padding = vec![0u8; stride - row_len];
        for row in rgb.chunks_exact(row_len).rev() {
            for pixel in row.chunks_exact(3) {
                self.writer.write_all(&[pixel[2], pixel[1], pixel[0]])?;
            }
            self.writer.write_all(&padding)?;
        }

        self.index.push((offset as u32, frame_size));
        self.frames_written += 1;
        self.data_written += frame_size as u64;
        Ok(())
    }

    /// Write the idx1 chunk and patch every placeholder size.
    pub fn finish(&mut self) -> io::Result<()> {
        let idx1_start = self.writer.stream_position()?;

        self.writer.write_all(b"idx1")?;
        self.writer
            .write_all(&(self.index.len() as u32 * 16).to_le_bytes())?;
        for &(offset, size) in &self.index {
            let entry = join_bytes_le!(*b"00dc", AVIIF_KEYFRAME, offset, size);
            self.writer.write_all(&entry)?;
        }

        let end_position = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer
            .write_all(&((end_position - 8) as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.movi_size_position))?;
        self.writer
            .write_all(&((idx1_start - self.movi_list_start + 4) as u32).to_le_bytes())?;

        self.writer
            .seek(SeekFrom::Start(self.total_frames_position))?;
        self.writer.write_all(&self.frames_written.to_le_bytes())?;

        self.writer
            .seek(SeekFrom::Start(self.stream_length_position))?;
        self.writer.write_all(&self.frames_written.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end_position))?;
        self.writer.flush()?;

        Ok(())
    }

    pub fn stats(&self) -> AviStats {
        AviStats {
            frames_written: self.frames_written,
            data_written: self.data_written,
        }
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

#[derive(Debug, Clone)]
pub struct AviStats {
    pub frames_written: u32,
    pub data_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_u32(buf: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    fn finished_buffer(writer: AviWriter<Cursor<Vec<u8>>>) -> io::Result<Vec<u8>> {
        Ok(writer.into_inner()?.into_inner())
    }

    #[test]
    fn header_layout() -> io::Result<()> {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 320, 240, 15.0);
        writer.write_header()?;
        writer.finish()?;
        let buf = finished_buffer(writer)?;

        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"AVI ");
        assert_eq!(&buf[12..16], b"LIST");
        assert_eq!(&buf[20..24], b"hdrl");
        assert_eq!(&buf[24..28], b"avih");
        assert_eq!(read_u32(&buf, 28), 56);
        assert_eq!(read_u32(&buf, 32), 66_667); // microseconds per frame
        assert_eq!(read_u32(&buf, 64), 320);
        assert_eq!(read_u32(&buf, 68), 240);

        // LIST strl follows the avih chunk.
        assert_eq!(&buf[88..92], b"LIST");
        assert_eq!(&buf[96..100], b"strl");
        assert_eq!(&buf[100..104], b"strh");
        assert_eq!(&buf[108..112], b"vids");
        assert_eq!(&buf[112..116], b"DIB ");
        assert_eq!(read_u32(&buf, 128), 1000); // scale
        assert_eq!(read_u32(&buf, 132), 15_000); // rate

        assert_eq!(&buf[164..168], b"strf");
        assert_eq!(read_u32(&buf, 172), 40);
        assert_eq!(u16::from_le_bytes([buf[186], buf[187]]), 24);

        Ok(())
    }

    #[test]
    fn frame_rows_are_flipped_and_swapped() -> io::Result<()> {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 2, 2, 25.0);
        writer.write_header()?;

        // Top row red then green, bottom row blue then white.
        writer.write_frame(&[
            255, 0, 0, 0, 255, 0, //
            0, 0, 255, 255, 255, 255,
        ])?;
        writer.finish()?;
        let buf = finished_buffer(writer)?;

        let movi = buf.windows(4).position(|w| w == b"movi").unwrap();
        assert_eq!(&buf[movi + 4..movi + 8], b"00dc");
        // 2 rows of 6 pixel bytes padded to an 8-byte stride.
        assert_eq!(read_u32(&buf, movi + 8), 16);
        let dib = &buf[movi + 12..movi + 28];
        assert_eq!(&dib[0..6], &[255, 0, 0, 255, 255, 255]); // bottom row, BGR
        assert_eq!(&dib[6..8], &[0, 0]);
        assert_eq!(&dib[8..14], &[0, 0, 255, 0, 255, 0]); // top row, BGR
        Ok(())
    }

    #[test]
    fn finish_patches_sizes_and_writes_the_index() -> io::Result<()> {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 2, 2, 25.0);
        writer.write_header()?;
        writer.write_frame(&[0u8; 12])?;
        writer.write_frame(&[255u8; 12])?;
        assert_eq!(writer.stats().frames_written, 2);
        writer.finish()?;
        let buf = finished_buffer(writer)?;

        assert_eq!(read_u32(&buf, 4) as usize, buf.len() - 8);
        // Patched frame counts: avih dwTotalFrames and strh dwLength.
        assert_eq!(read_u32(&buf, 48), 2);
        assert_eq!(read_u32(&buf, 140), 2);

        let idx1 = buf.windows(4).position(|w| w == b"idx1").unwrap();
        assert_eq!(read_u32(&buf, idx1 + 4), 32);
        assert_eq!(&buf[idx1 + 8..idx1 + 12], b"00dc");
        assert_eq!(read_u32(&buf, idx1 + 12), AVIIF_KEYFRAME);
        assert_eq!(read_u32(&buf, idx1 + 16), 4); // first chunk offset
        assert_eq!(read_u32(&buf, idx1 + 32), 4 + 8 + 16); // second chunk offset

        // The movi list runs up to idx1.
        let movi = buf.windows(4).position(|w| w == b"movi").unwrap();
        assert_eq!(read_u32(&buf, movi - 4) as usize, idx1 - movi + 4);
        Ok(())
    }
}
