//! Canonical tape data model: timing profiles, blocks, and tape items.
//!
//! A [`Block`] is one loadable unit: the bytes a receiver will see (leading
//! flag byte included when the source format carries one) plus the trailing
//! checksum octet and the timing profile that governs its pulse encoding.
//! Blocks are immutable once constructed; transforms copy.

use crate::error::ParseError;

/// Reference clock for all pulse durations: Z80 T-states at 3.5 MHz.
pub const REFERENCE_CLOCK: u32 = 3_500_000;

// ---------------------------------------------------------------------------
// Standard ROM timing constants (T-states)
// ---------------------------------------------------------------------------

/// Pilot pulse length (2168 T-states).
pub const PILOT_PULSE: u16 = 2168;

/// First sync pulse length (667 T-states).
pub const SYNC1_PULSE: u16 = 667;

/// Second sync pulse length (735 T-states).
pub const SYNC2_PULSE: u16 = 735;

/// Zero bit pulse length (855 T-states).
pub const ZERO_PULSE: u16 = 855;

/// One bit pulse length (1710 T-states).
pub const ONE_PULSE: u16 = 1710;

/// Pilot cycles for a header block (flag $00).
pub const HEADER_PILOT_COUNT: u16 = 8063;

/// Pilot cycles for a data block (flag $FF).
pub const DATA_PILOT_COUNT: u16 = 3223;

/// A set of pulse timing constants governing how a block's bits become
/// timed edges.
///
/// `pilot_count` counts full square-wave cycles: each cycle contributes two
/// edges of `pilot_pulse` T-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    /// Pilot pulse length in T-states.
    pub pilot_pulse: u16,
    /// Number of pilot cycles (two edges each).
    pub pilot_count: u16,
    /// First sync pulse length in T-states.
    pub sync1: u16,
    /// Second sync pulse length in T-states.
    pub sync2: u16,
    /// Zero bit pulse length in T-states.
    pub zero_pulse: u16,
    /// One bit pulse length in T-states.
    pub one_pulse: u16,
    /// Bits used in the final octet (1–8).
    pub used_bits: u8,
    /// Silence after the block, in milliseconds.
    pub pause_ms: u16,
    /// Turbo option: emit one edge per bit pair instead of two edges per
    /// bit, halving transmission time at the cost of ROM compatibility.
    pub compact_bits: bool,
}

impl TimingProfile {
    /// ROM-compatible standard profile. The pilot length depends on the
    /// block's flag byte: headers (flag $00) get the long pilot.
    #[must_use]
    pub fn standard_for_flag(flag: u8, pause_ms: u16) -> Self {
        let pilot_count = if flag == 0x00 {
            HEADER_PILOT_COUNT
        } else {
            DATA_PILOT_COUNT
        };
        Self {
            pilot_pulse: PILOT_PULSE,
            pilot_count,
            sync1: SYNC1_PULSE,
            sync2: SYNC2_PULSE,
            zero_pulse: ZERO_PULSE,
            one_pulse: ONE_PULSE,
            used_bits: 8,
            pause_ms,
            compact_bits: false,
        }
    }

    /// The custom fast-loading profile: ROM timings halved, short pilot.
    ///
    /// Doubles the effective baud rate; a turbo-aware loader stub is
    /// required on the receiving end.
    #[must_use]
    pub fn turbo(pause_ms: u16) -> Self {
        Self {
            pilot_pulse: PILOT_PULSE / 2,
            pilot_count: 1611,
            sync1: SYNC1_PULSE / 2,
            sync2: SYNC2_PULSE / 2,
            zero_pulse: ZERO_PULSE / 2,
            one_pulse: ONE_PULSE / 2,
            used_bits: 8,
            pause_ms,
            compact_bits: false,
        }
    }

    /// Whether this profile carries the exact ROM constant table (and can
    /// therefore be serialized as a TZX standard-speed chunk).
    #[must_use]
    pub fn is_standard(&self) -> bool {
        self.pilot_pulse == PILOT_PULSE
            && (self.pilot_count == HEADER_PILOT_COUNT || self.pilot_count == DATA_PILOT_COUNT)
            && self.sync1 == SYNC1_PULSE
            && self.sync2 == SYNC2_PULSE
            && self.zero_pulse == ZERO_PULSE
            && self.one_pulse == ONE_PULSE
            && self.used_bits == 8
            && !self.compact_bits
    }
}

/// XOR accumulator over a byte slice — the tape checksum.
#[must_use]
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &b| acc ^ b)
}

/// One unit of loadable data plus its encoding parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    bytes: Vec<u8>,
    flag: Option<u8>,
    checksum: u8,
    profile: TimingProfile,
}

impl Block {
    /// Construct a block whose first byte is the flag. The checksum is
    /// computed over all bytes.
    pub fn new(bytes: Vec<u8>, profile: TimingProfile) -> Result<Self, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::InvalidBlock("block has no bytes"));
        }
        let flag = Some(bytes[0]);
        let checksum = xor_checksum(&bytes);
        Ok(Self {
            bytes,
            flag,
            checksum,
            profile,
        })
    }

    /// Construct a block for a format that omits the flag byte.
    pub fn flagless(bytes: Vec<u8>, profile: TimingProfile) -> Result<Self, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::InvalidBlock("block has no bytes"));
        }
        let checksum = xor_checksum(&bytes);
        Ok(Self {
            bytes,
            flag: None,
            checksum,
            profile,
        })
    }

    /// Construct a block preserving a container-stored checksum verbatim.
    ///
    /// Turbo-speed chunks define their own checksum scheme, so the stored
    /// trailing octet is kept even when it differs from the XOR of the
    /// bytes — the writer must reproduce the container exactly.
    pub fn with_stored_checksum(
        bytes: Vec<u8>,
        checksum: u8,
        profile: TimingProfile,
    ) -> Result<Self, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::InvalidBlock("block has no bytes"));
        }
        let flag = Some(bytes[0]);
        Ok(Self {
            bytes,
            flag,
            checksum,
            profile,
        })
    }

    /// The loadable bytes, flag included (checksum excluded).
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload: bytes without the leading flag (when one is present).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        if self.flag.is_some() {
            &self.bytes[1..]
        } else {
            &self.bytes
        }
    }

    /// The leading flag byte, if the source format carried one.
    #[must_use]
    pub fn flag(&self) -> Option<u8> {
        self.flag
    }

    /// The trailing checksum octet as physically emitted.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Whether the stored checksum matches the XOR of the bytes.
    #[must_use]
    pub fn checksum_valid(&self) -> bool {
        self.checksum == xor_checksum(&self.bytes)
    }

    #[must_use]
    pub fn profile(&self) -> &TimingProfile {
        &self.profile
    }

    /// Number of loadable bytes (checksum excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Blocks are never empty; provided for completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Total bits transmitted: all bytes plus the checksum octet, with
    /// `used_bits` applied to the final octet.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + usize::from(self.profile.used_bits)
    }

    /// Copy of this block with a different timing profile.
    #[must_use]
    pub fn with_profile(&self, profile: TimingProfile) -> Self {
        Self {
            bytes: self.bytes.clone(),
            flag: self.flag,
            checksum: self.checksum,
            profile,
        }
    }
}

/// One entry in a tape session: a data block or a control event.
///
/// The sequence order is the playback order and is preserved end-to-end
/// through transform, render, and re-serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum TapeItem {
    /// A loadable data block.
    Block(Block),
    /// Pure tone: `count` cycles of a fixed pulse length.
    Tone { pulse_len: u16, count: u16 },
    /// Arbitrary pulse sequence (copy-protection schemes and the like).
    Pulses(Vec<u16>),
    /// Silence for a duration in milliseconds (always non-zero).
    Pause(u16),
    /// Stop and wait for the listener to resume the session.
    StopTheTape,
    /// Replay the items up to the matching [`TapeItem::LoopEnd`] this many
    /// times.
    LoopStart(u16),
    LoopEnd,
    /// Named group of blocks (metadata, preserved for re-serialization).
    GroupStart(String),
    GroupEnd,
    /// Free-text description (metadata, preserved for re-serialization).
    Text(String),
}
