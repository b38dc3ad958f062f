//! Pulse encoder — converts a block's bytes into a lazy sequence of timed
//! edges under the block's timing profile.
//!
//! The edge sequence for a block is: pilot tone (two edges per pilot
//! cycle), two sync edges, then the data bits MSB-first — each bit as two
//! equal pulses of the bit's length (or a single pulse in compact mode) —
//! and finally one silence edge for the profile's pause. The sequence is
//! wholly deterministic for a given block and profile; restarting means
//! constructing a fresh encoder.

use crate::block::{Block, REFERENCE_CLOCK, TimingProfile};
use crate::error::EncodeError;

/// A single timed logic-level transition. `duration` is in T-states at the
/// 3.5 MHz reference clock; `level` is the line level held for that time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEdge {
    pub level: bool,
    pub duration: u32,
}

/// T-states per millisecond at the reference clock.
const TSTATES_PER_MS: u32 = REFERENCE_CLOCK / 1000;

#[derive(Debug, Clone, Copy)]
enum Phase {
    Pilot { remaining: u32 },
    Sync1,
    Sync2,
    Bits { octet: usize, bit: u8, second: bool },
    Pause,
    Done,
}

/// Lazy edge sequence for one block.
pub struct PulseEncoder<'a> {
    bytes: &'a [u8],
    checksum: u8,
    profile: TimingProfile,
    level: bool,
    phase: Phase,
}

impl<'a> PulseEncoder<'a> {
    /// Build an encoder for `block`, validating its profile up front.
    ///
    /// # Errors
    ///
    /// `UnsupportedProfile` if the profile has a zero-length bit pulse —
    /// such a profile cannot carry data.
    pub fn new(block: &'a Block) -> Result<Self, EncodeError> {
        let mut profile = *block.profile();
        if profile.zero_pulse == 0 || profile.one_pulse == 0 {
            return Err(EncodeError::UnsupportedProfile("zero-length bit pulse"));
        }
        if profile.used_bits == 0 || profile.used_bits > 8 {
            profile.used_bits = 8;
        }

        let phase = if profile.pilot_count > 0 {
            Phase::Pilot {
                remaining: u32::from(profile.pilot_count) * 2,
            }
        } else {
            Phase::Sync1
        };

        Ok(Self {
            bytes: block.bytes(),
            checksum: block.checksum(),
            profile,
            level: false,
            phase,
        })
    }

    /// Octet at position `i`: data bytes first, checksum last.
    fn octet(&self, i: usize) -> u8 {
        if i < self.bytes.len() {
            self.bytes[i]
        } else {
            self.checksum
        }
    }

    /// Bits transmitted for the octet at position `i`. Only the final
    /// octet honours `used_bits`.
    fn bits_for(&self, i: usize) -> u8 {
        if i == self.bytes.len() {
            self.profile.used_bits
        } else {
            8
        }
    }

    fn bit_pulse(&self, octet: usize, bit: u8) -> u32 {
        let is_one = (self.octet(octet) >> bit) & 1 != 0;
        u32::from(if is_one {
            self.profile.one_pulse
        } else {
            self.profile.zero_pulse
        })
    }

    /// Move past the bit at (octet, bit) to the next phase.
    fn advance_bit(&mut self, octet: usize, bit: u8) {
        if bit > 0 {
            self.phase = Phase::Bits {
                octet,
                bit: bit - 1,
                second: false,
            };
        } else if octet < self.bytes.len() {
            let next = octet + 1;
            self.phase = Phase::Bits {
                octet: next,
                bit: self.bits_for(next) - 1,
                second: false,
            };
        } else {
            self.phase = Phase::Pause;
        }
    }

    fn toggled(&mut self, duration: u32) -> PulseEdge {
        self.level = !self.level;
        PulseEdge {
            level: self.level,
            duration,
        }
    }
}

impl Iterator for PulseEncoder<'_> {
    type Item = PulseEdge;

    fn next(&mut self) -> Option<PulseEdge> {
        match self.phase {
            Phase::Pilot { remaining } => {
                self.phase = if remaining <= 1 {
                    Phase::Sync1
                } else {
                    Phase::Pilot {
                        remaining: remaining - 1,
                    }
                };
                Some(self.toggled(u32::from(self.profile.pilot_pulse)))
            }
            Phase::Sync1 => {
                self.phase = Phase::Sync2;
                Some(self.toggled(u32::from(self.profile.sync1)))
            }
            Phase::Sync2 => {
                self.phase = Phase::Bits {
                    octet: 0,
                    bit: self.bits_for(0) - 1,
                    second: false,
                };
                Some(self.toggled(u32::from(self.profile.sync2)))
            }
            Phase::Bits { octet, bit, second } => {
                let pulse = self.bit_pulse(octet, bit);
                if self.profile.compact_bits || second {
                    self.advance_bit(octet, bit);
                } else {
                    self.phase = Phase::Bits {
                        octet,
                        bit,
                        second: true,
                    };
                }
                Some(self.toggled(pulse))
            }
            Phase::Pause => {
                self.phase = Phase::Done;
                if self.profile.pause_ms == 0 {
                    return None;
                }
                // Silence is a held low level, not a toggle.
                self.level = false;
                Some(PulseEdge {
                    level: false,
                    duration: u32::from(self.profile.pause_ms) * TSTATES_PER_MS,
                })
            }
            Phase::Done => None,
        }
    }
}

/// Edges for a pure tone: `count` pulses of a fixed length, starting from
/// the idle (low) level.
pub fn tone_edges(pulse_len: u16, count: u16) -> impl Iterator<Item = PulseEdge> {
    (0..count).map(move |i| PulseEdge {
        level: i % 2 == 0,
        duration: u32::from(pulse_len),
    })
}

/// Edges for an arbitrary pulse sequence, starting from the idle level.
pub fn pulse_list_edges(pulses: &[u16]) -> impl Iterator<Item = PulseEdge> + '_ {
    pulses.iter().enumerate().map(|(i, &len)| PulseEdge {
        level: i % 2 == 0,
        duration: u32::from(len),
    })
}
