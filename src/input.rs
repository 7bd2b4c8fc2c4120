use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use psxstr::sector::DiscImage;

/// Open a disc image file with buffered reading.
///
/// Sector addressing needs random access, so unlike a plain bitstream
/// tool there is no stdin pipe mode here.
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<DiscImage<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("cannot open disc image {}", path.display()))?;
    let image = DiscImage::new(BufReader::new(file))
        .with_context(|| format!("{} is not a recognizable disc image", path.display()))?;

    log::debug!(
        "opened {}: {} sectors, subheaders: {}",
        path.display(),
        image.sector_count(),
        image.has_subheaders(),
    );

    Ok(image)
}
