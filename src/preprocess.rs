//! Sample preparation for services that take raw audio rather than a
//! fingerprint: decode, down-mix to mono, resample to 44.1 kHz, keep the
//! first 12 seconds and encode as a 16-bit WAV.

use std::fs::{self, File};
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::PreprocessError;
use crate::wavfile::WavWriter;

pub const TARGET_RATE: u32 = 44100;
pub const SAMPLE_SECONDS: u32 = 12;
/// Anything smaller is not usable for identification.
pub const MIN_SAMPLE_BYTES: usize = 10_000;

/// Decode up to `max_seconds` of the first audio track of `path`, averaged
/// to a single channel. Returns the samples and their sample rate.
pub fn decode_mono(path: &Path, max_seconds: u32) -> Result<(Vec<f32>, u32), PreprocessError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PreprocessError::Decode(format!("failed to probe file: {}", e)))?;
    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(PreprocessError::NoAudioTrack)?;
        (track.id, track.codec_params.clone())
    };

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PreprocessError::Decode(format!("failed to create decoder: {}", e)))?;

    let mut rate = codec_params.sample_rate;
    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream, or a reset we do not need to follow
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(PreprocessError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let source_rate = *rate.get_or_insert(spec.rate);
        let channels = spec.channels.count().max(1);

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        mono.extend(
            buf.samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
        );

        if mono.len() >= (source_rate as usize) * (max_seconds as usize) {
            break;
        }
    }

    let rate = rate.ok_or_else(|| PreprocessError::Decode("no audio decoded".to_string()))?;
    Ok((mono, rate))
}

/// Linear-interpolation resampler.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || from_rate == to_rate {
        return input.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (input.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_idx = i as f64 / ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        out.push(s0 + (s1 - s0) * frac);
    }
    out
}

/// Resample mono audio to [`TARGET_RATE`], cut it to [`SAMPLE_SECONDS`] and
/// convert to 16-bit.
pub fn normalize(mono: &[f32], rate: u32) -> Vec<i16> {
    let mut resampled = resample_linear(mono, rate, TARGET_RATE);
    resampled.truncate((TARGET_RATE * SAMPLE_SECONDS) as usize);
    resampled
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Build the WAV bytes submitted for identification, using the system
/// temporary directory for the intermediate file.
pub fn prepare_sample(path: &Path) -> Result<Vec<u8>, PreprocessError> {
    prepare_sample_in(path, &std::env::temp_dir())
}

/// Like [`prepare_sample`], with the intermediate WAV created in `temp_dir`.
/// The intermediate file is always removed before returning.
pub fn prepare_sample_in(path: &Path, temp_dir: &Path) -> Result<Vec<u8>, PreprocessError> {
    let (mono, rate) = decode_mono(path, SAMPLE_SECONDS)?;
    let samples = normalize(&mono, rate);

    let mut temp = tempfile::Builder::new()
        .prefix("songtag-sample-")
        .suffix(".wav")
        .tempfile_in(temp_dir)?;
    let written = {
        let mut writer = WavWriter::new(temp.as_file_mut(), TARGET_RATE, 1)?;
        writer.write_samples(&samples)?;
        writer.finalize().map(|_| ())
    };
    let bytes = written.and_then(|_| fs::read(temp.path()));

    if let Err(e) = temp.close() {
        warn!("Could not remove temporary sample: {}", e);
    }

    let bytes = bytes?;
    if bytes.len() < MIN_SAMPLE_BYTES {
        return Err(PreprocessError::TooSmall { size: bytes.len() });
    }
    debug!("Prepared {} byte sample from {}", bytes.len(), path.display());
    Ok(bytes)
}
