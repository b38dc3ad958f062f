//! Error taxonomy for the tape pipeline.
//!
//! Parse errors abort the whole load — a misparsed chunk boundary corrupts
//! all subsequent parsing, so no partial item sequence is ever returned.
//! Every variant carries enough context (offset, expected vs. found) to
//! diagnose a malformed file.

use thiserror::Error;

/// Malformed or truncated input, local to one loader.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Declared length runs past the end of the input.
    #[error("truncated {context} at offset {offset}: need {needed} bytes, {remaining} remain")]
    Truncated {
        context: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// The TZX signature bytes don't match.
    #[error("bad TZX signature (expected \"ZXTape!\" + 0x1A)")]
    BadSignature,

    /// A block's declared length is outside the valid range.
    #[error("block at offset {offset} has length {len}, minimum is {min}")]
    BadBlockLength {
        offset: usize,
        len: usize,
        min: usize,
    },

    /// A stored checksum doesn't match the XOR of the block's bytes.
    #[error("checksum mismatch at offset {offset}: expected ${expected:02X}, got ${found:02X}")]
    ChecksumMismatch {
        offset: usize,
        expected: u8,
        found: u8,
    },

    /// A chunk ID with no way to determine its length.
    #[error("unknown TZX chunk ${id:02X} at offset {offset} with no length field")]
    UnknownChunk { id: u8, offset: usize },

    /// Decompressed snapshot memory doesn't match the declared size.
    #[error("corrupt snapshot: declared {expected} bytes of RAM, got {found}")]
    CorruptSnapshot { expected: usize, found: usize },

    /// A snapshot header variant this loader doesn't recognise.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(String),

    /// A block that violates the model's invariants (e.g. no bytes).
    #[error("invalid block: {0}")]
    InvalidBlock(&'static str),

    /// A file extension no loader claims.
    #[error("unrecognised tape format: {0}")]
    UnknownFormat(String),

    /// The image file could not be read from disk.
    #[error("cannot read tape image: {0}")]
    Io(String),
}

/// A timing profile the pulse encoder can't emit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unsupported timing profile: {0}")]
    UnsupportedProfile(&'static str),
}

/// Sink-level failure reported by an audio device.
///
/// Never retried mid-stream: retrying would desynchronise a hardware
/// receiver expecting continuous timing.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio output device available")]
    Unavailable,

    #[error("audio sink underrun")]
    Underrun,

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Failure while writing rendered audio to a WAV file.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Failure while rendering an item sequence to samples.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("playback failed: {0}")]
    PlaybackFailed(#[from] DeviceError),

    /// Invariant violation inside the renderer — indicates a bug, never
    /// silently corrected.
    #[error("renderer invariant violated: {0}")]
    Logic(&'static str),
}
