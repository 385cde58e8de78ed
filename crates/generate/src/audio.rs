//! Audio assembly for podcast episodes: decode the per-line WAV clips, trim
//! leading and trailing silence, and stitch them with a short pause between
//! lines.

use std::io::Cursor;

use thiserror::Error;

/// Samples quieter than the clip peak by this much are silence.
const TRIM_THRESHOLD_DB: f32 = 20.0;

/// Pause inserted between consecutive lines.
const GAP_MS: u32 = 250;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to decode audio clip: {0}")]
    Decode(#[from] hound::Error),

    #[error("no audio clips to combine")]
    Empty,

    #[error("audio clips disagree on format: {0}")]
    FormatMismatch(String),
}

/// A decoded clip: interleaved samples plus its format.
struct Clip {
    samples: Vec<i16>,
    spec: hound::WavSpec,
}

/// Combine per-line WAV clips into one file: trim silence at each clip's
/// head and tail, concatenate at the native sample rate, and insert a
/// 250 ms gap between lines.
pub fn stitch(clips: &[Vec<u8>]) -> Result<Vec<u8>, AudioError> {
    if clips.is_empty() {
        return Err(AudioError::Empty);
    }

    let mut decoded = Vec::with_capacity(clips.len());

    for bytes in clips {
        decoded.push(decode(bytes)?);
    }

    let spec = decoded[0].spec;

    for clip in &decoded[1..] {
        if clip.spec.sample_rate != spec.sample_rate
            || clip.spec.channels != spec.channels
            || clip.spec.bits_per_sample != spec.bits_per_sample
        {
            return Err(AudioError::FormatMismatch(format!(
                "{}Hz/{}ch/{}bit vs {}Hz/{}ch/{}bit",
                clip.spec.sample_rate,
                clip.spec.channels,
                clip.spec.bits_per_sample,
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample
            )));
        }
    }

    let gap_frames = (spec.sample_rate * GAP_MS / 1000) as usize;
    let gap_samples = gap_frames * spec.channels as usize;

    let mut combined: Vec<i16> = Vec::new();

    for (i, clip) in decoded.iter().enumerate() {
        if i > 0 {
            combined.extend(std::iter::repeat_n(0i16, gap_samples));
        }

        combined.extend_from_slice(trim_silence(&clip.samples, spec.channels as usize));
    }

    encode(&combined, spec)
}

fn decode(bytes: &[u8]) -> Result<Clip, AudioError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => reader.samples::<i16>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<_, _>>()?,
    };

    Ok(Clip {
        samples,
        spec: hound::WavSpec {
            sample_format: hound::SampleFormat::Int,
            bits_per_sample: 16,
            ..spec
        },
    })
}

/// Drop leading and trailing frames quieter than the clip peak minus the
/// threshold, frame-aligned so channels stay interleaved.
fn trim_silence(samples: &[i16], channels: usize) -> &[i16] {
    if samples.is_empty() {
        return samples;
    }

    let peak = samples.iter().map(|s| s.unsigned_abs() as f32).fold(0.0, f32::max);

    if peak == 0.0 {
        return &samples[..0];
    }

    let threshold = peak * 10f32.powf(-TRIM_THRESHOLD_DB / 20.0);

    let frames = samples.len() / channels;
    let loud = |frame: usize| -> bool {
        let start = frame * channels;
        samples[start..start + channels]
            .iter()
            .any(|s| s.unsigned_abs() as f32 >= threshold)
    };

    let Some(first) = (0..frames).find(|&f| loud(f)) else {
        return &samples[..0];
    };
    let last = (0..frames).rev().find(|&f| loud(f)).unwrap_or(first);

    &samples[first * channels..(last + 1) * channels]
}

fn encode(samples: &[i16], spec: hound::WavSpec) -> Result<Vec<u8>, AudioError> {
    let mut cursor = Cursor::new(Vec::new());

    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;

        for &sample in samples {
            writer.write_sample(sample)?;
        }

        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8000;

    fn mono_spec() -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// A clip with `lead` and `tail` silent frames around a loud body.
    fn clip(lead: usize, body: usize, tail: usize) -> Vec<u8> {
        let mut samples = vec![0i16; lead];
        samples.extend(std::iter::repeat_n(20000i16, body));
        samples.extend(std::iter::repeat_n(0i16, tail));

        encode(&samples, mono_spec()).unwrap()
    }

    fn decode_all(bytes: &[u8]) -> Vec<i16> {
        hound::WavReader::new(Cursor::new(bytes))
            .unwrap()
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn stitching_inserts_a_single_gap_between_lines() {
        let combined = stitch(&[clip(0, 100, 0), clip(0, 100, 0)]).unwrap();
        let samples = decode_all(&combined);

        let gap = (RATE / 4) as usize; // 250 ms at 8 kHz
        assert_eq!(samples.len(), 100 + gap + 100);

        // The gap is exactly between the two loud bodies.
        assert!(samples[..100].iter().all(|&s| s == 20000));
        assert!(samples[100..100 + gap].iter().all(|&s| s == 0));
        assert!(samples[100 + gap..].iter().all(|&s| s == 20000));
    }

    #[test]
    fn head_and_tail_silence_is_trimmed() {
        let combined = stitch(&[clip(50, 80, 70)]).unwrap();
        let samples = decode_all(&combined);

        assert_eq!(samples.len(), 80);
        assert!(samples.iter().all(|&s| s == 20000));
    }

    #[test]
    fn four_lines_have_three_gaps() {
        let clips: Vec<Vec<u8>> = (0..4).map(|_| clip(10, 60, 10)).collect();
        let combined = stitch(&clips).unwrap();
        let samples = decode_all(&combined);

        let gap = (RATE / 4) as usize;
        assert_eq!(samples.len(), 4 * 60 + 3 * gap);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(stitch(&[]), Err(AudioError::Empty)));
    }

    #[test]
    fn mismatched_sample_rates_are_rejected() {
        let other_spec = hound::WavSpec {
            sample_rate: 16000,
            ..mono_spec()
        };

        let mut samples = vec![20000i16; 50];
        samples.push(0);

        let other = encode(&samples, other_spec).unwrap();

        let err = stitch(&[clip(0, 50, 0), other]).unwrap_err();
        assert!(matches!(err, AudioError::FormatMismatch(_)));
    }

    #[test]
    fn quiet_tail_below_threshold_is_kept() {
        // A tail at half the peak is well above the -20 dB cutoff.
        let mut samples = vec![20000i16; 50];
        samples.extend(std::iter::repeat_n(10000i16, 25));

        let encoded = encode(&samples, mono_spec()).unwrap();
        let combined = stitch(&[encoded]).unwrap();

        assert_eq!(decode_all(&combined).len(), 75);
    }
}
