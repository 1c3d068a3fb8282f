//! WAV file capture source.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat as WavSampleFormat, WavReader};
use tracing::{info, warn};

use super::{format::SampleFormat, CaptureSource};
use crate::engine::EngineConfig;
use crate::error::{AutorecError, Result};

/// Replays an integer PCM WAV file through the pipeline.
pub struct WavFileSource {
    reader: WavReader<BufReader<File>>,
    path: PathBuf,
    format: SampleFormat,
    channels: u16,
    sample_rate: u32,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path)?;
        let spec = reader.spec();
        if spec.sample_format != WavSampleFormat::Int {
            return Err(AutorecError::UnsupportedFormat(format!(
                "{}: floating-point WAV",
                path.display()
            )));
        }
        let format = SampleFormat::from_bits(spec.bits_per_sample)?;
        info!(
            path = %path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            format = %format,
            "opened WAV source"
        );
        Ok(Self {
            reader,
            path,
            format,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fail if the file's layout differs from what the pipeline will decode.
    ///
    /// A sample-rate mismatch only skews timing, so it is logged instead.
    pub fn check_matches(&self, config: &EngineConfig) -> Result<()> {
        if self.channels != config.channels {
            return Err(AutorecError::InvalidConfig(format!(
                "{} has {} channel(s), configuration expects {}",
                self.path.display(),
                self.channels,
                config.channels
            )));
        }
        if self.format != config.format {
            return Err(AutorecError::InvalidConfig(format!(
                "{} is {}, configuration expects {}",
                self.path.display(),
                self.format,
                config.format
            )));
        }
        if self.sample_rate != config.sample_rate {
            warn!(
                file_rate = self.sample_rate,
                config_rate = config.sample_rate,
                "WAV sample rate differs from configuration"
            );
        }
        Ok(())
    }
}

impl CaptureSource for WavFileSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let width = self.format.bytes_per_sample();
        let mut filled = 0;
        for (slot, sample) in buf
            .chunks_exact_mut(width)
            .zip(self.reader.samples::<i32>())
        {
            let sample = sample.map_err(|e| {
                AutorecError::Stream(format!("{}: {e}", self.path.display()))
            })?;
            self.format.encode_sample(sample, slot);
            filled += width;
        }
        Ok(filled)
    }

    fn describe(&self) -> String {
        format!("wav:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, bits: u16, samples: &[i32]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: bits,
            sample_format: WavSampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).expect("create wav");
        for &s in samples {
            writer.write_sample(s).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    fn config(channels: u16, format: SampleFormat) -> EngineConfig {
        EngineConfig {
            sample_rate: 8_000,
            channels,
            format,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn streams_samples_as_le_bytes_then_short_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("in.wav");
        write_wav(&path, 1, 16, &[1, -2, 300]);

        let mut source = WavFileSource::open(&path).expect("open");
        assert_eq!(source.format(), SampleFormat::S16);
        assert_eq!(source.sample_rate(), 8_000);

        let mut buf = [0u8; 4];
        assert_eq!(source.read_chunk(&mut buf).unwrap(), 4);
        let mut decoded = Vec::new();
        SampleFormat::S16.decode_into(&buf, &mut decoded);
        assert_eq!(decoded, vec![1, -2]);

        assert_eq!(source.read_chunk(&mut buf).unwrap(), 2);
        assert_eq!(source.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn twenty_four_bit_files_keep_their_width() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("in24.wav");
        write_wav(&path, 2, 24, &[-8_388_608, 8_388_607]);

        let mut source = WavFileSource::open(&path).expect("open");
        assert_eq!(source.format(), SampleFormat::S24);
        let mut buf = [0u8; 6];
        assert_eq!(source.read_chunk(&mut buf).unwrap(), 6);
        let mut decoded = Vec::new();
        SampleFormat::S24.decode_into(&buf, &mut decoded);
        assert_eq!(decoded, vec![-8_388_608, 8_388_607]);
    }

    #[test]
    fn layout_mismatch_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 16, &[0, 0]);
        let source = WavFileSource::open(&path).expect("open");

        assert!(source.check_matches(&config(2, SampleFormat::S16)).is_ok());
        assert!(matches!(
            source.check_matches(&config(1, SampleFormat::S16)),
            Err(AutorecError::InvalidConfig(_))
        ));
        assert!(matches!(
            source.check_matches(&config(2, SampleFormat::S32)),
            Err(AutorecError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(WavFileSource::open("/nonexistent/autorec/in.wav").is_err());
    }
}
