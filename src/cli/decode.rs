use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, DecodeArgs};
use crate::avi::AviWriter;
use crate::input::open_image;
use crate::wav::WavWriter;
use psxstr::audio::{SpuAdpcmDecoder, interleave_stereo};
use psxstr::demux::FrameDemuxer;
use psxstr::demux::roadrash::{
    AudioChannel, PacketReader, ROADRASH_SAMPLE_RATE, RoadRashPacket,
};
use psxstr::index::{
    DiscScanner, RoadRashIndexer, StrVideoIndexer, StreamEntry, StreamKind, merge_streams,
};
use psxstr::mdec::color::ChromaUpsample;
use psxstr::mdec::decode::{DecodeQuality, MdecDecoder};
use psxstr::sector::DiscImage;
use psxstr::sector::str_video::StrVideoSector;
use psxstr::vlc::roadrash::{BitStreamUncompressorRoadRash, RoadRashVlcTable};
use psxstr::vlc::strv2::BitStreamUncompressorStrV2;
use psxstr::vlc::strv3::BitStreamUncompressorStrV3;

/// Used when the frame rate of a stream cannot be inferred.
const DEFAULT_FRAME_RATE: f64 = 15.0;

fn create_path_with_extension(base_path: &Path, expected_ext: &str) -> PathBuf {
    if let Some(existing_ext) = base_path.extension() {
        if existing_ext == expected_ext {
            base_path.to_path_buf()
        } else {
            let mut path = base_path.to_path_buf();
            path.set_extension(expected_ext);
            path
        }
    } else {
        let mut path = base_path.to_path_buf();
        path.set_extension(expected_ext);
        path
    }
}

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding stream {} of {} (strict mode: {})",
        args.stream,
        args.input.display(),
        cli.strict,
    );

    let mut image = open_image(&args.input)?;

    // Index the image first so the stream selection matches `info` output.
    let mut video = StrVideoIndexer::new(cli.strict);
    let mut roadrash = RoadRashIndexer::new(cli.strict);
    {
        let mut scanner = DiscScanner::new();
        scanner.register(&mut video);
        scanner.register(&mut roadrash);
        scanner.scan(&mut image, |_, _| {})?;
    }
    let streams = merge_streams(vec![video.into_streams(), roadrash.into_streams()]);

    let entry = streams.get(args.stream).ok_or_else(|| {
        anyhow!(
            "stream index {} out of range, the image has {} video streams",
            args.stream,
            streams.len(),
        )
    })?;

    let frame_rate = match entry.frame_rate() {
        Some(fps) => fps,
        None => {
            log::warn!(
                "frame rate of stream {} is indeterminate, assuming {DEFAULT_FRAME_RATE} fps",
                entry.index,
            );
            DEFAULT_FRAME_RATE
        }
    };
    log::info!(
        "Stream {}: {}x{}, {} frames at {frame_rate:.3} fps",
        entry.index,
        entry.width,
        entry.height,
        entry.frame_count,
    );

    let base_path = args.output_path.clone().unwrap_or_else(|| args.input.clone());
    let video_path = create_path_with_extension(&base_path, "avi");
    log::info!("Creating video file: {}", video_path.display());

    let mut avi = AviWriter::new(
        File::create(&video_path)?,
        entry.width as u32,
        entry.height as u32,
        frame_rate,
    );
    avi.write_header()?;

    let pb = if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new(entry.sector_count() as u64));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} sectors ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("decoding");
        Some(pb)
    } else {
        None
    };

    // Checked between frames; nothing in-process sets it, an embedding
    // caller can from another thread.
    let cancel = AtomicBool::new(false);

    let session = DecodeSession {
        quality: args.quality.to_decode_quality(),
        upsample: args.upsample.to_chroma_upsample(),
        strict: cli.strict,
    };

    let frames_written = match entry.kind {
        StreamKind::StrVideo { .. } => {
            session.decode_str_stream(&mut image, entry, &mut avi, pb.as_ref(), &cancel)?
        }
        StreamKind::RoadRash => {
            let audio_path = entry
                .has_audio
                .then(|| create_path_with_extension(&base_path, "wav"));
            session.decode_roadrash_stream(
                &mut image,
                entry,
                &mut avi,
                audio_path.as_deref(),
                pb.as_ref(),
                &cancel,
            )?
        }
    };

    avi.finish()?;
    let stats = avi.stats();

    if let Some(ref pb) = pb {
        pb.finish_with_message(format!(
            "{frames_written} frames | {:.2} MB video",
            stats.data_written as f64 / 1_000_000.0,
        ));
    }
    log::info!(
        "Decoding complete: {frames_written} frames, {} bytes of video data",
        stats.data_written,
    );

    Ok(())
}

struct DecodeSession {
    quality: DecodeQuality,
    upsample: ChromaUpsample,
    strict: bool,
}

impl DecodeSession {
    fn decode_str_stream<R: Read + Seek>(
        &self,
        image: &mut DiscImage<R>,
        entry: &StreamEntry,
        avi: &mut AviWriter<File>,
        pb: Option<&ProgressBar>,
        cancel: &AtomicBool,
    ) -> Result<u32> {
        let mut decoder = MdecDecoder::new(
            entry.width as usize,
            entry.height as usize,
            self.quality,
        );
        let mut frames_written = 0u32;

        {
            let frames = &mut frames_written;
            let mut demuxer = FrameDemuxer::new(|frame| {
                if !frame.is_complete() {
                    log::warn!(
                        "frame {} is missing {} of {} chunks",
                        frame.frame_number,
                        frame.chunks_in_frame - frame.received_chunks,
                        frame.chunks_in_frame,
                    );
                }

                let data = frame.demux_data();
                let failure = match frame.frame_header().version {
                    3 => BitStreamUncompressorStrV3::new(&data)
                        .map(|mut stream| decoder.decode(&mut stream)),
                    _ => BitStreamUncompressorStrV2::new(&data)
                        .map(|mut stream| decoder.decode(&mut stream)),
                };
                match failure {
                    Ok(None) => {}
                    Ok(Some(e)) => {
                        if self.strict {
                            return Err(anyhow!("frame {}: {e}", frame.frame_number));
                        }
                        log::warn!(
                            "frame {}: {e}; remainder of the frame is blanked",
                            frame.frame_number,
                        );
                    }
                    Err(e) => {
                        if self.strict {
                            return Err(anyhow!("frame {}: {e}", frame.frame_number));
                        }
                        log::warn!(
                            "frame {} bitstream rejected: {e}; repeating the previous frame",
                            frame.frame_number,
                        );
                    }
                }

                avi.write_frame(&decoder.to_rgb(self.upsample))?;
                *frames += 1;
                if let Some(pb) = pb {
                    pb.set_position((frame.end_sector - entry.start_sector + 1) as u64);
                }
                Ok(())
            });

            for index in entry.start_sector..=entry.end_sector {
                if cancel.load(Ordering::Relaxed) {
                    log::warn!("decode cancelled at sector {index}");
                    break;
                }
                let sector = image.sector(index)?;
                if let Some(vid) = StrVideoSector::identify(&sector) {
                    demuxer.feed(vid.into_chunk())?;
                }
            }
            demuxer.flush()?;
        }

        Ok(frames_written)
    }

    fn decode_roadrash_stream<R: Read + Seek>(
        &self,
        image: &mut DiscImage<R>,
        entry: &StreamEntry,
        avi: &mut AviWriter<File>,
        audio_path: Option<&Path>,
        pb: Option<&ProgressBar>,
        cancel: &AtomicBool,
    ) -> Result<u32> {
        let mut reader = PacketReader::new();
        let mut table: Option<Arc<RoadRashVlcTable>> = None;
        let mut decoder = MdecDecoder::new(
            entry.width as usize,
            entry.height as usize,
            self.quality,
        );
        let mut left_decoder = SpuAdpcmDecoder::new();
        let mut right_decoder = SpuAdpcmDecoder::new();
        let mut left_samples = Vec::new();
        let mut right_samples = Vec::new();
        let mut frames_written = 0u32;

        'sectors: for index in entry.start_sector..=entry.end_sector {
            if cancel.load(Ordering::Relaxed) {
                log::warn!("decode cancelled at sector {index}");
                break;
            }
            let sector = image.sector(index)?;
            reader.push_bytes(sector.user_data());

            loop {
                let packet = match reader.next_packet() {
                    Ok(Some(packet)) => packet,
                    Ok(None) => break,
                    Err(e) => {
                        if self.strict {
                            return Err(anyhow!("packet stream broken at sector {index}: {e}"));
                        }
                        log::warn!("packet stream broken at sector {index}: {e}; stopping");
                        break 'sectors;
                    }
                };

                match packet {
                    RoadRashPacket::Vlc0 { table: raw } => {
                        table = Some(Arc::new(RoadRashVlcTable::parse(&raw)?));
                    }
                    RoadRashPacket::Mdec(mdec) => {
                        let Some(table) = table.as_ref() else {
                            return Err(anyhow!(
                                "MDEC packet at sector {index} before any VLC table"
                            ));
                        };
                        if (mdec.width, mdec.height) != (entry.width, entry.height) {
                            log::warn!(
                                "frame {} is {}x{}, expected {}x{}; skipped",
                                mdec.frame_number,
                                mdec.width,
                                mdec.height,
                                entry.width,
                                entry.height,
                            );
                            continue;
                        }

                        let mut stream = BitStreamUncompressorRoadRash::new(
                            &mdec.bitstream,
                            mdec.frame_header,
                            table.clone(),
                        );
                        if let Some(e) = decoder.decode(&mut stream) {
                            if self.strict {
                                return Err(anyhow!("frame {}: {e}", mdec.frame_number));
                            }
                            log::warn!(
                                "frame {}: {e}; remainder of the frame is blanked",
                                mdec.frame_number,
                            );
                        }
                        avi.write_frame(&decoder.to_rgb(self.upsample))?;
                        frames_written += 1;
                    }
                    RoadRashPacket::Audio(audio) => match audio.channel {
                        AudioChannel::Left => {
                            left_samples.extend(left_decoder.decode_all(&audio.data));
                        }
                        AudioChannel::Right => {
                            right_samples.extend(right_decoder.decode_all(&audio.data));
                        }
                    },
                }
            }

            if let Some(pb) = pb {
                pb.set_position((index - entry.start_sector + 1) as u64);
            }
            if reader.is_finished() {
                break;
            }
        }

        if let Err(e) = reader.finish() {
            if self.strict {
                return Err(e.into());
            }
            log::warn!("stream ended mid-packet: {e}");
        }

        if let Some(audio_path) = audio_path {
            if left_samples.is_empty() && right_samples.is_empty() {
                log::warn!("no audio packets decoded, skipping WAV output");
            } else {
                log::info!("Creating audio file: {}", audio_path.display());
                let mut wav = WavWriter::new(File::create(audio_path)?);
                wav.configure_audio_format(ROADRASH_SAMPLE_RATE, 2)?;
                wav.write_header()?;
                wav.write_samples(&interleave_stereo(&left_samples, &right_samples))?;
                wav.finish()?;
                log::info!(
                    "Wrote {} sample frames of stereo audio",
                    wav.stats().data_written / 4,
                );
            }
        }

        Ok(frames_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_replace_or_append_extensions() {
        assert_eq!(
            create_path_with_extension(Path::new("movie.str"), "avi"),
            PathBuf::from("movie.avi")
        );
        assert_eq!(
            create_path_with_extension(Path::new("movie.avi"), "avi"),
            PathBuf::from("movie.avi")
        );
        assert_eq!(
            create_path_with_extension(Path::new("movie"), "wav"),
            PathBuf::from("movie.wav")
        );
    }
}
