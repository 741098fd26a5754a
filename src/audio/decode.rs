// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoding of sound files into memory.
//!
//! Sounds are decoded entirely up front so that triggering them never touches the disk.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use rubato::{
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use super::LoadError;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// A sound decoded to interleaved f32 samples at the mixer's sample rate.
#[derive(Debug)]
pub struct DecodedSound {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedSound {
    /// Returns the number of frames in the sound.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Returns the playing time of the sound.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Decodes the file at the given path and converts it to the target sample rate.
/// Supports WAV, MP3, OGG, FLAC and the other formats symphonia knows about.
pub fn decode_file(path: &Path, target_sample_rate: u32) -> Result<DecodedSound, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoAudioTrack(path.display().to_string()))?;
    let track_id = track.id;
    let source_sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| LoadError::Unsupported("sample rate not specified".to_string()))?;

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skipped rather than failing the whole file.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count() as u16;
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if channels == 0 {
        return Err(LoadError::Unsupported(format!(
            "unable to determine channel count for {}",
            path.display()
        )));
    }

    let (samples, sample_rate) = if source_sample_rate != target_sample_rate {
        debug!(
            source_rate = source_sample_rate,
            target_rate = target_sample_rate,
            "Resampling sound"
        );
        (
            resample(&samples, channels, source_sample_rate, target_sample_rate)?,
            target_sample_rate,
        )
    } else {
        (samples, source_sample_rate)
    };

    let sound = DecodedSound {
        samples,
        channels,
        sample_rate,
    };
    info!(
        path = ?path,
        channels,
        sample_rate,
        duration_ms = sound.duration().as_millis(),
        "Sound decoded"
    );
    Ok(sound)
}

/// Converts interleaved samples from one rate to another with a sinc resampler.
/// The output is trimmed of the resampler's delay so it starts in step with the source.
fn resample(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, LoadError> {
    let channels = channel_count as usize;
    if channels == 0 || source_rate == 0 || samples.is_empty() {
        return Ok(Vec::new());
    }
    let failed = |_: rubato::ResampleError| LoadError::Resample(source_rate, target_rate);

    let ratio = target_rate as f64 / source_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, INPUT_BLOCK_SIZE, channels)
        .map_err(|_| LoadError::Resample(source_rate, target_rate))?;

    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| samples.iter().skip(channel).step_by(channels).copied().collect())
        .collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(target_frames + delay); channels];
    let mut scratch = resampler.output_buffer_allocate(true);
    let mut chunk: Vec<Vec<f32>> = vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels];

    let mut position = 0;
    while position < source_frames {
        let needed = resampler.input_frames_next();
        let end = (position + needed).min(source_frames);
        for (buffer, source) in chunk.iter_mut().zip(&planar) {
            buffer.clear();
            buffer.extend_from_slice(&source[position..end]);
        }

        let (consumed, produced) = if end - position == needed {
            resampler
                .process_into_buffer(&chunk, &mut scratch, None)
                .map_err(failed)?
        } else {
            let (_, produced) = resampler
                .process_partial_into_buffer(Some(&chunk as &[Vec<f32>]), &mut scratch, None)
                .map_err(failed)?;
            (end - position, produced)
        };
        position += consumed;
        append_planar(&mut output, &scratch, produced);
    }

    // Flush what is still inside the filter.
    while output[0].len() < target_frames + delay {
        let (_, produced) = resampler
            .process_partial_into_buffer(None, &mut scratch, None)
            .map_err(failed)?;
        if produced == 0 {
            break;
        }
        append_planar(&mut output, &scratch, produced);
    }

    let frames = output[0].len().saturating_sub(delay).min(target_frames);
    let mut interleaved = Vec::with_capacity(frames * channels);
    for frame in delay..delay + frames {
        interleaved.extend(output.iter().map(|channel| channel[frame]));
    }
    Ok(interleaved)
}

fn append_planar(output: &mut [Vec<f32>], scratch: &[Vec<f32>], frames: usize) {
    for (channel, produced) in output.iter_mut().zip(scratch) {
        channel.extend_from_slice(&produced[..frames]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_decode_wav() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tone.wav");
        write_wav(&path, &[0.5; 441], 1, 44100)?;

        let sound = decode_file(&path, 44100)?;
        assert_eq!(sound.channels, 1);
        assert_eq!(sound.sample_rate, 44100);
        assert_eq!(sound.frames(), 441);
        assert!((sound.samples[10] - 0.5).abs() < 0.001);
        Ok(())
    }

    #[test]
    fn test_decode_resamples_to_target() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stereo.wav");
        write_wav(&path, &[0.25; 2 * 22050], 2, 22050)?;

        let sound = decode_file(&path, 44100)?;
        assert_eq!(sound.channels, 2);
        assert_eq!(sound.sample_rate, 44100);
        assert_eq!(sound.frames(), 44100);
        assert!((sound.samples[44100] - 0.25).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn test_decode_missing_file() {
        let result = decode_file(Path::new("/nonexistent/sound.wav"), 44100);
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_decode_garbage_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not audio at all")?;

        assert!(decode_file(&path, 44100).is_err());
        Ok(())
    }

    #[test]
    fn test_resample_keeps_stereo_channels_apart() -> Result<(), Box<dyn std::error::Error>> {
        let source: Vec<f32> = (0..4800).flat_map(|_| [0.5f32, -0.5]).collect();
        let result = resample(&source, 2, 48000, 44100)?;

        assert_eq!(result.len(), 2 * 4410);
        let middle = 2 * 2205;
        assert!((result[middle] - 0.5).abs() < 0.01);
        assert!((result[middle + 1] + 0.5).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn test_resample_filters_above_target_nyquist() -> Result<(), Box<dyn std::error::Error>> {
        // 23kHz fits under 48kHz but not under 44.1kHz, so it must be filtered
        // out rather than folded back into the audible range.
        let source: Vec<f32> = (0..48000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 23000.0 * i as f32 / 48000.0).sin())
            .collect();
        let result = resample(&source, 1, 48000, 44100)?;

        let middle = &result[11025..33075];
        let rms = (middle.iter().map(|s| s * s).sum::<f32>() / middle.len() as f32).sqrt();
        assert!(rms < 0.05, "rms {}", rms);
        Ok(())
    }

    #[test]
    fn test_resample_empty() -> Result<(), Box<dyn std::error::Error>> {
        assert!(resample(&[], 2, 48000, 44100)?.is_empty());
        Ok(())
    }
}
