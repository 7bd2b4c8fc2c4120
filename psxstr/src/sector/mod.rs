//! Disc sector access.
//!
//! A disc image is either a plain 2048-byte-per-sector ISO or a raw
//! 2352-byte-per-sector dump. Raw sectors carry the CD-ROM sync pattern,
//! an address/mode header and, for mode 2 (XA), an 8-byte subheader in
//! front of the user data. The rest of the crate only ever sees
//! [`CdSector`] values; it never touches disc I/O itself.

use std::io::{Read, Seek, SeekFrom};

use crate::utils::errors::SectorError;

pub mod str_video;

pub const SECTOR_SIZE_ISO: u64 = 2048;
pub const SECTOR_SIZE_RAW: u64 = 2352;

const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// The 8-byte mode 2 (XA) subheader, minus its duplicate copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XaSubheader {
    pub file: u8,
    pub channel: u8,
    pub submode: u8,
    pub coding_info: u8,
}

impl XaSubheader {
    pub fn eof_marker(&self) -> bool {
        self.submode & 0x80 != 0
    }

    pub fn real_time(&self) -> bool {
        self.submode & 0x40 != 0
    }

    pub fn form2(&self) -> bool {
        self.submode & 0x20 != 0
    }

    pub fn data(&self) -> bool {
        self.submode & 0x08 != 0
    }

    pub fn audio(&self) -> bool {
        self.submode & 0x04 != 0
    }

    pub fn video(&self) -> bool {
        self.submode & 0x02 != 0
    }

    pub fn end_of_record(&self) -> bool {
        self.submode & 0x01 != 0
    }
}

/// One disc sector: its absolute index from the start of the image, the
/// XA subheader when the image carries one, and the user data bytes.
#[derive(Debug, Clone)]
pub struct CdSector {
    sector_number: u32,
    subheader: Option<XaSubheader>,
    user_data: Vec<u8>,
}

impl CdSector {
    pub fn new(sector_number: u32, subheader: Option<XaSubheader>, user_data: Vec<u8>) -> Self {
        Self {
            sector_number,
            subheader,
            user_data,
        }
    }

    pub fn sector_number(&self) -> u32 {
        self.sector_number
    }

    pub fn subheader(&self) -> Option<&XaSubheader> {
        self.subheader.as_ref()
    }

    pub fn user_data(&self) -> &[u8] {
        &self.user_data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageLayout {
    /// 2048 bytes per sector, user data only.
    Iso,
    /// 2352 bytes per sector: sync, address, mode, subheader, user data.
    Raw,
}

/// Sector source over a seekable disc image.
///
/// The layout is detected once at construction: an image whose size is a
/// multiple of 2352 and whose first sector opens with the 12-byte sync
/// pattern is raw; a multiple of 2048 is a plain ISO. Anything else is
/// rejected up front.
pub struct DiscImage<R: Read + Seek> {
    reader: R,
    layout: ImageLayout,
    sector_count: u32,
}

impl<R: Read + Seek> DiscImage<R> {
    pub fn new(mut reader: R) -> Result<Self, SectorError> {
        let len = reader.seek(SeekFrom::End(0))?;

        let layout = if len % SECTOR_SIZE_RAW == 0 && len > 0 {
            let mut sync = [0u8; 12];
            reader.seek(SeekFrom::Start(0))?;
            reader.read_exact(&mut sync)?;
            if sync == SYNC_PATTERN {
                ImageLayout::Raw
            } else if len % SECTOR_SIZE_ISO == 0 {
                ImageLayout::Iso
            } else {
                return Err(SectorError::MissingSync(0));
            }
        } else if len % SECTOR_SIZE_ISO == 0 {
            ImageLayout::Iso
        } else {
            return Err(SectorError::UnknownSectorSize(len));
        };

        let sector_size = match layout {
            ImageLayout::Iso => SECTOR_SIZE_ISO,
            ImageLayout::Raw => SECTOR_SIZE_RAW,
        };

        Ok(Self {
            reader,
            layout,
            sector_count: (len / sector_size) as u32,
        })
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    /// Whether the image carries XA subheaders (raw 2352-byte sectors).
    pub fn has_subheaders(&self) -> bool {
        self.layout == ImageLayout::Raw
    }

    pub fn sector(&mut self, index: u32) -> Result<CdSector, SectorError> {
        if index >= self.sector_count {
            return Err(SectorError::OutOfRange {
                index,
                count: self.sector_count,
            });
        }

        match self.layout {
            ImageLayout::Iso => {
                self.reader
                    .seek(SeekFrom::Start(index as u64 * SECTOR_SIZE_ISO))?;
                let mut user_data = vec![0u8; SECTOR_SIZE_ISO as usize];
                self.reader.read_exact(&mut user_data)?;
                Ok(CdSector::new(index, None, user_data))
            }
            ImageLayout::Raw => {
                self.reader
                    .seek(SeekFrom::Start(index as u64 * SECTOR_SIZE_RAW))?;
                let mut raw = [0u8; SECTOR_SIZE_RAW as usize];
                self.reader.read_exact(&mut raw)?;
                if raw[..12] != SYNC_PATTERN {
                    return Err(SectorError::MissingSync(index));
                }

                // Byte 15 is the mode; mode 2 sectors carry the XA
                // subheader at 16..24 (stored twice), user data at 24.
                let mode = raw[15];
                if mode == 2 {
                    let subheader = XaSubheader {
                        file: raw[16],
                        channel: raw[17],
                        submode: raw[18],
                        coding_info: raw[19],
                    };
                    // Form 2 sectors have 2324 user data bytes, form 1
                    // the usual 2048.
                    let data_len = if subheader.form2() { 2324 } else { 2048 };
                    Ok(CdSector::new(
                        index,
                        Some(subheader),
                        raw[24..24 + data_len].to_vec(),
                    ))
                } else {
                    Ok(CdSector::new(index, None, raw[16..16 + 2048].to_vec()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_sector(mode: u8, submode: u8, fill: u8) -> Vec<u8> {
        let mut s = vec![0u8; SECTOR_SIZE_RAW as usize];
        s[..12].copy_from_slice(&SYNC_PATTERN);
        s[15] = mode;
        if mode == 2 {
            s[18] = submode;
            s[22] = submode;
        }
        let data_start = if mode == 2 { 24 } else { 16 };
        for b in &mut s[data_start..data_start + 2048] {
            *b = fill;
        }
        s
    }

    #[test]
    fn iso_image_yields_plain_sectors() -> anyhow::Result<()> {
        let mut image = vec![0u8; 2048 * 3];
        image[2048] = 0xAB;
        let mut disc = DiscImage::new(Cursor::new(image))?;

        assert_eq!(disc.sector_count(), 3);
        assert!(!disc.has_subheaders());

        let sector = disc.sector(1)?;
        assert_eq!(sector.sector_number(), 1);
        assert!(sector.subheader().is_none());
        assert_eq!(sector.user_data()[0], 0xAB);
        Ok(())
    }

    #[test]
    fn raw_image_parses_the_xa_subheader() -> anyhow::Result<()> {
        let mut image = raw_sector(2, 0x48, 0x11);
        image.extend_from_slice(&raw_sector(2, 0x64, 0x22));
        let mut disc = DiscImage::new(Cursor::new(image))?;

        assert_eq!(disc.sector_count(), 2);
        assert!(disc.has_subheaders());

        let first = disc.sector(0)?;
        let sub = first.subheader().unwrap();
        assert!(sub.real_time() && sub.data());
        assert!(!sub.form2());
        assert_eq!(first.user_data().len(), 2048);
        assert_eq!(first.user_data()[0], 0x11);

        let second = disc.sector(1)?;
        let sub = second.subheader().unwrap();
        assert!(sub.form2() && sub.audio());
        assert_eq!(second.user_data().len(), 2324);
        Ok(())
    }

    #[test]
    fn out_of_range_and_odd_sizes_are_rejected() {
        let mut disc = DiscImage::new(Cursor::new(vec![0u8; 2048])).unwrap();
        assert!(matches!(
            disc.sector(1),
            Err(SectorError::OutOfRange { index: 1, count: 1 })
        ));

        assert!(matches!(
            DiscImage::new(Cursor::new(vec![0u8; 1000])),
            Err(SectorError::UnknownSectorSize(1000))
        ));
    }
}
