//! Fixed-length microphone capture.
//!
//! Audio is read from a recorder subprocess (`arecord` for ALSA devices,
//! `pw-record` for PipeWire targets) as raw mono S16LE at 44.1 kHz and
//! written out as a WAV file. Recording blocks for the requested duration.

use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use log::{debug, info};

use crate::error::CaptureError;
use crate::wavfile::WavWriter;

pub const CAPTURE_RATE: u32 = 44100;
pub const CAPTURE_CHANNELS: u16 = 1;

/// Capture backend parsed from a source address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// ALSA device through `arecord`, e.g. "default" or "hw:1,0"
    Alsa(String),
    /// PipeWire target through `pw-record`; empty means the default source
    PipeWire(String),
}

/// Parse a capture address in the format "backend:device".
/// Examples: "alsa:hw:0,0", "alsa:default", "pwpipe:my.monitor", "hw:1,0"
pub fn parse_source(address: &str) -> Result<CaptureSource, CaptureError> {
    let address = address.trim();
    if address.is_empty() || address == "default" {
        return Ok(CaptureSource::Alsa("default".to_string()));
    }
    if address.starts_with("hw:") || address.starts_with("plughw:") {
        return Ok(CaptureSource::Alsa(address.to_string()));
    }

    match address.split_once(':') {
        Some((backend, device)) => match backend.to_lowercase().as_str() {
            "alsa" => Ok(CaptureSource::Alsa(device.to_string())),
            "pipewire" | "pw" | "pwpipe" => Ok(CaptureSource::PipeWire(device.to_string())),
            _ => Err(CaptureError::UnsupportedSource(address.to_string())),
        },
        None => Err(CaptureError::UnsupportedSource(address.to_string())),
    }
}

impl CaptureSource {
    fn command(&self) -> Command {
        match self {
            CaptureSource::Alsa(device) => {
                let mut cmd = Command::new("arecord");
                cmd.arg("-D")
                    .arg(device)
                    .arg("-r")
                    .arg(CAPTURE_RATE.to_string())
                    .arg("-c")
                    .arg(CAPTURE_CHANNELS.to_string())
                    .arg("-f")
                    .arg("S16_LE")
                    .arg("-t")
                    .arg("raw")
                    .arg("-q");
                cmd
            }
            CaptureSource::PipeWire(target) => {
                let mut cmd = Command::new("pw-record");
                if !target.is_empty() {
                    cmd.arg("--target").arg(target);
                }
                cmd.arg("--rate")
                    .arg(CAPTURE_RATE.to_string())
                    .arg("--channels")
                    .arg(CAPTURE_CHANNELS.to_string())
                    .arg("--format")
                    .arg("s16")
                    .arg("-");
                cmd
            }
        }
    }

    fn program(&self) -> &'static str {
        match self {
            CaptureSource::Alsa(_) => "arecord",
            CaptureSource::PipeWire(_) => "pw-record",
        }
    }
}

/// Bytes of raw audio making up `seconds` of capture.
pub fn clip_bytes(seconds: u32) -> usize {
    CAPTURE_RATE as usize * CAPTURE_CHANNELS as usize * 2 * seconds as usize
}

/// Record `seconds` of audio from `source` into a WAV file at `dest`.
pub fn record_clip(source: &CaptureSource, seconds: u32, dest: &Path) -> Result<(), CaptureError> {
    let mut child = source
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CaptureError::Spawn {
            program: source.program().to_string(),
            source: e,
        })?;

    info!("Recording {}s from {:?}...", seconds, source);
    let result = read_clip(&mut child, clip_bytes(seconds));

    let _ = child.kill();
    let _ = child.wait();

    let raw = result?;
    let mut writer = WavWriter::new(BufWriter::new(File::create(dest)?), CAPTURE_RATE, CAPTURE_CHANNELS)?;
    writer.write_raw(&raw)?;
    writer.finalize()?;
    debug!("Recording saved as {}", dest.display());
    Ok(())
}

fn read_clip(child: &mut Child, expected: usize) -> Result<Vec<u8>, CaptureError> {
    let stdout = child
        .stdout
        .as_mut()
        .ok_or_else(|| CaptureError::ShortRead { got: 0, expected })?;
    read_exact_or_short(stdout, expected)
}

/// Read exactly `expected` bytes, reporting how far a short stream got.
fn read_exact_or_short<R: Read>(reader: &mut R, expected: usize) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = vec![0u8; expected];
    let mut got = 0;
    while got < expected {
        match reader.read(&mut buffer[got..]) {
            Ok(0) => return Err(CaptureError::ShortRead { got, expected }),
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buffer)
}
