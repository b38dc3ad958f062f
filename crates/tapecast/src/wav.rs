//! WAV file sink: mono 16-bit PCM at the renderer's sample rate.

use std::path::Path;

use crate::block::TapeItem;
use crate::error::SinkError;
use crate::render::{RenderConfig, RenderState, SampleStream};

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * f32::from(i16::MAX)) as i16
}

/// Save already-rendered samples as a WAV file.
///
/// Input samples are f32 in the range -1.0 to +1.0.
///
/// # Errors
///
/// Any write failure from the WAV encoder.
pub fn save_samples(samples: &[f32], sample_rate: u32, path: &Path) -> Result<(), SinkError> {
    let mut writer = hound::WavWriter::create(path, wav_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(quantize(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Render an item sequence straight to a WAV file without buffering the
/// whole session, resuming automatically across stop-the-tape markers.
///
/// The file is finalized even when the stream's cancel token fires: what
/// was rendered up to the last whole edge is kept.
///
/// # Errors
///
/// Render failures or any write failure from the WAV encoder.
pub fn render_to_wav(
    items: &[TapeItem],
    config: RenderConfig,
    path: &Path,
) -> Result<(), SinkError> {
    let mut writer = hound::WavWriter::create(path, wav_spec(config.sample_rate))?;
    let mut stream = SampleStream::new(items, config);
    let mut buf = [0.0f32; 4096];

    loop {
        let (n, state) = stream.fill(&mut buf).map_err(SinkError::Render)?;
        for &sample in &buf[..n] {
            writer.write_sample(quantize(sample))?;
        }
        match state {
            RenderState::Running => {}
            RenderState::Stopped => stream.resume(),
            RenderState::Finished => break,
        }
    }

    tracing::info!(path = %path.display(), "WAV capture finished");
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, TimingProfile};
    use crate::render::render_to_vec;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    fn short_sequence() -> Vec<TapeItem> {
        let mut profile = TimingProfile::standard_for_flag(0xFF, 5);
        profile.pilot_count = 4;
        vec![TapeItem::Block(
            Block::new(vec![0xFF, 0x42], profile).unwrap(),
        )]
    }

    #[test]
    fn streamed_file_matches_buffered_render() {
        let items = short_sequence();
        let config = RenderConfig::default();

        let path = temp_path("tapecast_wav_stream_test.wav");
        render_to_wav(&items, config, &path).unwrap();

        let samples = render_to_vec(&items, config).unwrap();
        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, config.sample_rate);
        assert_eq!(reader.spec().channels, 1);

        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read.len(), samples.len());
        for (disk, rendered) in read.iter().zip(&samples) {
            assert_eq!(*disk, quantize(*rendered));
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn samples_are_clamped_before_quantizing() {
        assert_eq!(quantize(2.0), i16::MAX);
        assert_eq!(quantize(-2.0), -i16::MAX);
        assert_eq!(quantize(0.0), 0);
    }
}
