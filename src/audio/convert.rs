// Sample format conversion for captured audio
//
// The backend expects 16kHz mono PCM. Capture sources deliver whatever the
// device (or file) produces, so frames are decimated and downmixed here
// before they are chunked.

use super::backend::AudioFrame;

/// Convert a frame to the target rate and channel count
///
/// Only downsampling by an integer ratio and stereo → mono are supported;
/// anything else passes through unchanged.
pub fn to_target_format(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut converted = frame;

    if converted.channels != target_channels && target_channels == 1 {
        converted = downmix_to_mono(converted);
    }

    if converted.sample_rate != target_sample_rate {
        converted = decimate(converted, target_sample_rate);
    }

    converted
}

/// Downsample by keeping every Nth sample frame
fn decimate(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if target_rate == 0 || frame.sample_rate <= target_rate {
        return frame; // Can't upsample
    }

    let ratio = (frame.sample_rate / target_rate) as usize;
    if ratio <= 1 {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;
    let samples: Vec<i16> = frame
        .samples
        .chunks_exact(channels)
        .step_by(ratio)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples,
        sample_rate: target_rate,
        ..frame
    }
}

/// Average stereo pairs into a single channel
fn downmix_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame;
    }

    let samples = frame
        .samples
        .chunks_exact(2)
        .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
        .collect();

    AudioFrame {
        samples,
        channels: 1,
        ..frame
    }
}

/// Serialize samples as little-endian PCM bytes
pub fn samples_to_pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parse little-endian PCM bytes; a trailing odd byte is dropped
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
