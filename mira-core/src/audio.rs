use core::fmt::{self, Display};

/// Most channels a stream (and retained volume state) can carry.
pub const MAX_CHANNELS: usize = 8;

const SCALE: f32 = 32768.0; // i16::MIN.abs() as f32

/// Converts f32 sample to i16 at scale 32768.
/// Will clip if sample is < -1.0, or >= 1.0. This function's counterpart
/// in the other direction never produces 1.0 however.
pub fn f32_to_s16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0 - 1.0 / SCALE) * SCALE) as i16
}

/// Converts i16 sample to f32 at scale 32768.
/// The output remains strictly in the range [-1.0, 1.0) to prevent
/// clipping on the return trip.
pub fn s16_to_f32(sample: i16) -> f32 {
    sample as f32 / SCALE
}

/// Input sample format of a playback stream. Only signed 16-bit little
/// endian interleaved is supported; the variant set exists so further
/// formats extend a sum instead of touching the timing core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
    F32Le,
}

impl SampleFormat {
    /// Bytes per sample of one channel.
    pub fn sample_bytes(&self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::F32Le => 4,
        }
    }

    /// The conversion step from wire bytes into planar f32, or `None` if
    /// this format has no decoder.
    pub fn decoder(&self) -> Option<Decoder> {
        match self {
            SampleFormat::S16Le => Some(decode_s16le),
            SampleFormat::F32Le => None,
        }
    }
}

impl Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::S16Le => write!(f, "signed16 (little endian)"),
            SampleFormat::F32Le => write!(f, "float32 (little endian)"),
        }
    }
}

/// Decodes interleaved wire bytes into per-channel f32 buffers. `out` must
/// hold one buffer per channel, each at least `bytes.len() / stride` long.
pub type Decoder = fn(bytes: &[u8], out: &mut [Vec<f32>]);

fn decode_s16le(bytes: &[u8], out: &mut [Vec<f32>]) {
    let channels = out.len();

    // byte-wise decode: the wire buffer has no alignment guarantee
    for (i, sample) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes(sample.try_into().unwrap());
        out[i % channels][i / channels] = s16_to_f32(sample);
    }
}

/// Interleaves `frames` frames of planar audio into `out`, replacing its
/// contents.
pub fn interleave_into(planar: &[Vec<f32>], frames: usize, out: &mut Vec<f32>) {
    let channels = planar.len();
    out.clear();
    out.reserve(frames * channels);

    for frame in 0..frames {
        for plane in planar.iter() {
            out.push(plane[frame]);
        }
    }
}
