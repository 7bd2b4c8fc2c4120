use std::path::Path;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, InfoArgs};
use crate::input::open_image;
use psxstr::index::{
    DiscScanner, RoadRashIndexer, StrVideoIndexer, StreamEntry, StreamKind, merge_streams,
};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Scanning disc image: {}", args.input.display());

    let mut image = open_image(&args.input)?;
    let sector_count = image.sector_count();

    let mut video = StrVideoIndexer::new(cli.strict);
    let mut roadrash = RoadRashIndexer::new(cli.strict);

    let pb = if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new(sector_count as u64));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} sectors ({percent}%)",
        )?);
        Some(pb)
    } else {
        None
    };

    {
        let mut scanner = DiscScanner::new();
        scanner.register(&mut video);
        scanner.register(&mut roadrash);
        scanner.scan(&mut image, |done, _| {
            if let Some(ref pb) = pb {
                pb.set_position(done as u64);
            }
        })?;
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let streams = merge_streams(vec![video.into_streams(), roadrash.into_streams()]);
    log::info!("Found {} video streams", streams.len());

    if args.yaml {
        let report = DiscReport::new(&args.input, sector_count, &streams);
        print!("{}", serde_yaml_ng::to_string(&report)?);
        return Ok(());
    }

    if streams.is_empty() {
        println!("No video streams found in the image.");
        return Ok(());
    }

    println!();
    println!("Disc Image Information");
    println!("======================");
    println!();
    println!("  Sectors                   {sector_count}");
    println!("  Video streams             {}", streams.len());
    println!();

    for entry in &streams {
        display_stream(entry);
    }

    Ok(())
}

fn kind_name(kind: StreamKind) -> String {
    match kind {
        StreamKind::StrVideo { version } => format!("STR v{version}"),
        StreamKind::RoadRash => "Road Rash".to_string(),
    }
}

fn display_stream(entry: &StreamEntry) {
    println!("Stream {}", entry.index);
    println!("  Format                    {}", kind_name(entry.kind));
    println!(
        "  Sectors                   {} - {} ({})",
        entry.start_sector,
        entry.end_sector,
        entry.sector_count(),
    );
    println!(
        "  Resolution                {}x{}",
        entry.width, entry.height
    );
    println!("  Frames                    {}", entry.frame_count);
    println!(
        "  Interleaved audio         {}",
        if entry.has_audio { "yes" } else { "no" }
    );

    match entry.frame_rate() {
        Some(fps) => {
            println!("  Frame rate                {fps:.3} fps");
            let duration = time_str(entry.frame_count as f64 / fps);
            println!("  Duration                  {duration}");
        }
        None => {
            println!("  Frame rate                unknown");
        }
    }
    println!();
}

fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3_600_000f64) as u64;
    let minutes = ((ms % 3_600_000f64) / 60_000f64) as u64;
    let seconds = ((ms % 60_000f64) / 1000f64) as u64;
    let millis = (ms % 1000f64) as u64;
    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[derive(Serialize)]
struct DiscReport {
    image: String,
    sector_count: u32,
    streams: Vec<StreamReport>,
}

#[derive(Serialize)]
struct StreamReport {
    index: usize,
    format: String,
    start_sector: u32,
    end_sector: u32,
    width: u16,
    height: u16,
    frame_count: u32,
    has_audio: bool,
    sectors_per_frame: Option<f64>,
    frames_per_second: Option<f64>,
}

impl DiscReport {
    fn new(image: &Path, sector_count: u32, streams: &[StreamEntry]) -> Self {
        Self {
            image: image.display().to_string(),
            sector_count,
            streams: streams
                .iter()
                .map(|entry| StreamReport {
                    index: entry.index,
                    format: kind_name(entry.kind),
                    start_sector: entry.start_sector,
                    end_sector: entry.end_sector,
                    width: entry.width,
                    height: entry.height,
                    frame_count: entry.frame_count,
                    has_audio: entry.has_audio,
                    sectors_per_frame: entry.sectors_per_frame,
                    frames_per_second: entry.frame_rate(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_to_yaml() -> Result<()> {
        let entry = StreamEntry {
            index: 0,
            kind: StreamKind::StrVideo { version: 2 },
            start_sector: 0,
            end_sector: 149,
            width: 320,
            height: 240,
            frame_count: 15,
            has_audio: false,
            sectors_per_frame: Some(10.0),
        };
        let report = DiscReport::new(Path::new("movie.str"), 150, &[entry]);
        let yaml = serde_yaml_ng::to_string(&report)?;

        assert!(yaml.contains("image: movie.str"));
        assert!(yaml.contains("format: STR v2"));
        assert!(yaml.contains("frames_per_second: 15"));
        Ok(())
    }

    #[test]
    fn durations_format_as_timestamps() {
        assert_eq!(time_str(0.0), "0:00:00.000");
        assert_eq!(time_str(61.25), "0:01:01.250");
        assert_eq!(time_str(3661.0), "1:01:01.000");
    }
}
