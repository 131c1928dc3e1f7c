//! WAV file I/O utilities: a 16-bit PCM writer and a header reader.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// WAV file header information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Duration of the data chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        let frame_size = (self.bits_per_sample / 8) as f64 * self.num_channels as f64;
        if frame_size == 0.0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.data_size as f64 / (self.sample_rate as f64 * frame_size)
    }
}

/// Read and parse a WAV header, leaving the reader at the start of the data chunk.
pub fn read_wav_header<R: Read + Seek>(reader: &mut R) -> Result<WavHeader, String> {
    let mut buf = [0u8; 36];
    reader
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read WAV header: {}", e))?;

    if &buf[0..4] != b"RIFF" || &buf[8..12] != b"WAVE" || &buf[12..16] != b"fmt " {
        return Err("Not a valid WAV file".to_string());
    }

    let num_channels = u16::from_le_bytes([buf[22], buf[23]]);
    let sample_rate = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);
    let bits_per_sample = u16::from_le_bytes([buf[34], buf[35]]);

    loop {
        let mut chunk_header = [0u8; 8];
        if reader.read_exact(&mut chunk_header).is_err() {
            return Err("Could not find data chunk".to_string());
        }

        let chunk_size = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]);

        if &chunk_header[0..4] == b"data" {
            return Ok(WavHeader {
                sample_rate,
                num_channels,
                bits_per_sample,
                data_size: chunk_size,
            });
        }

        reader
            .seek(SeekFrom::Current(chunk_size as i64))
            .map_err(|e| format!("Seek error: {}", e))?;
    }
}

/// Streaming 16-bit PCM WAV writer. The header is rewritten with the final
/// data size by [`WavWriter::finalize`].
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    data_size: usize,
    rate: u32,
    channels: u16,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut inner: W, rate: u32, channels: u16) -> io::Result<Self> {
        write_wav_header(&mut inner, 0, rate, channels, 16)?;
        Ok(WavWriter {
            inner,
            data_size: 0,
            rate,
            channels,
        })
    }

    /// Append interleaved samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        self.write_raw(&bytes)
    }

    /// Append already little-endian encoded sample bytes.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.data_size += bytes.len();
        Ok(())
    }

    pub fn finalize(mut self) -> io::Result<W> {
        self.inner.seek(SeekFrom::Start(0))?;
        write_wav_header(&mut self.inner, self.data_size, self.rate, self.channels, 16)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn write_wav_header<W: Write>(
    out: &mut W,
    data_size: usize,
    rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> io::Result<()> {
    let byte_rate = rate * channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = channels * (bits_per_sample / 8);

    out.write_all(b"RIFF")?;
    out.write_all(&((data_size + 36) as u32).to_le_bytes())?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_all(&16u32.to_le_bytes())?; // fmt chunk size
    out.write_all(&1u16.to_le_bytes())?; // audio format (1 = PCM)
    out.write_all(&channels.to_le_bytes())?;
    out.write_all(&rate.to_le_bytes())?;
    out.write_all(&byte_rate.to_le_bytes())?;
    out.write_all(&block_align.to_le_bytes())?;
    out.write_all(&bits_per_sample.to_le_bytes())?;
    out.write_all(b"data")?;
    out.write_all(&(data_size as u32).to_le_bytes())?;

    Ok(())
}
