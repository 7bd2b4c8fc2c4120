use std::io::{self, BufWriter, Seek, SeekFrom, Write};

/// RIFF/WAVE file writer for 16-bit PCM audio.
///
/// The data length is unknown until the last sample, so both size fields
/// are written as placeholders and patched by seeking back in `finish()`.
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u64,
    sample_rate: u32,
    channels: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            riff_size_position: 0,
            data_size_position: 0,
            data_written: 0,
            sample_rate: 44100,
            channels: 2,
        }
    }

    /// Configure audio format parameters
    pub fn configure_audio_format(&mut self, sample_rate: u32, channels: u32) -> io::Result<()> {
        if self.data_written > 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot change format after writing data",
            ));
        }

        self.sample_rate = sample_rate;
        self.channels = channels;
        Ok(())
    }

    /// Write the RIFF/WAVE header
    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(b"RIFF")?;
        self.riff_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // File size (patched later)
        self.writer.write_all(b"WAVE")?;

        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&16u32.to_le_bytes())?;

        self.writer.write_all(&1u16.to_le_bytes())?; // PCM format
        self.writer
            .write_all(&(self.channels as u16).to_le_bytes())?;
        self.writer.write_all(&self.sample_rate.to_le_bytes())?;

        let byte_rate = self.sample_rate * self.channels * 2;
        self.writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = self.channels * 2;
        self.writer.write_all(&(block_align as u16).to_le_bytes())?;
        self.writer.write_all(&16u16.to_le_bytes())?; // bits per sample

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // Data size (patched later)

        Ok(())
    }

    /// Write interleaved 16-bit samples as little-endian PCM
    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        for &sample in samples {
            self.writer.write_all(&sample.to_le_bytes())?;
            self.data_written += 2;
        }
        Ok(())
    }

    /// Finish writing and patch both size fields
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;

        let current_pos = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer
            .write_all(&(self.data_written as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer
            .write_all(&((current_pos - 8) as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(current_pos))?;
        self.writer.flush()?;

        Ok(())
    }

    /// Get the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    /// Get statistics about written data
    pub fn stats(&self) -> WavStats {
        WavStats {
            data_written: self.data_written,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// Statistics about WAV file writing
#[derive(Debug, Clone)]
pub struct WavStats {
    pub data_written: u64,
    pub sample_rate: u32,
    pub channels: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_layout() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));
        writer.configure_audio_format(22050, 2)?;
        writer.write_header()?;

        let buffer = writer.into_inner()?.into_inner();

        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(&buffer[8..12], b"WAVE");
        assert_eq!(&buffer[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(buffer[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes([buffer[20], buffer[21]]), 1);
        assert_eq!(u16::from_le_bytes([buffer[22], buffer[23]]), 2);
        assert_eq!(
            u32::from_le_bytes(buffer[24..28].try_into().unwrap()),
            22050
        );
        assert_eq!(
            u32::from_le_bytes(buffer[28..32].try_into().unwrap()),
            22050 * 4
        );
        assert_eq!(u16::from_le_bytes([buffer[32], buffer[33]]), 4);
        assert_eq!(u16::from_le_bytes([buffer[34], buffer[35]]), 16);
        assert_eq!(&buffer[36..40], b"data");
        Ok(())
    }

    #[test]
    fn samples_and_patched_sizes() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));
        writer.configure_audio_format(22050, 2)?;
        writer.write_header()?;

        writer.write_samples(&[0x1234, -2, 0, 257])?;
        assert_eq!(writer.stats().data_written, 8);
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(&buffer[44..52], &[0x34, 0x12, 0xFE, 0xFF, 0, 0, 1, 1]);
        assert_eq!(u32::from_le_bytes(buffer[40..44].try_into().unwrap()), 8);
        assert_eq!(
            u32::from_le_bytes(buffer[4..8].try_into().unwrap()) as usize,
            buffer.len() - 8
        );
        Ok(())
    }
}
