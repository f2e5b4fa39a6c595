use std::path::Path;

/// Write 8 kHz mono 16-bit PCM samples as a WAV file
pub(crate) fn write_wav(path: &Path, samples: &[i16]) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;

    for &sample in samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writes_a_readable_wav() {
        let dir = std::env::temp_dir().join("dialout-wav-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("recorded.wav");

        let samples: Vec<i16> = (0..800i16).map(|i| (i % 100) * 50).collect();
        write_wav(&path, &samples).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();

        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 16);

        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read, samples);

        std::fs::remove_file(&path).unwrap();
    }
}
