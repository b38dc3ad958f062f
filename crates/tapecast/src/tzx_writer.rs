//! TZX tape-container writer — the inverse of the loader.
//!
//! Serializes an item sequence into the same binary chunk layout the
//! loader accepts. Any sequence the loader can produce round-trips
//! byte-for-byte through write → load → write.

use crate::block::{TapeItem, TimingProfile};
use crate::error::EncodeError;
use crate::tzx::MAGIC;

/// Version written to the header.
const MAJOR: u8 = 1;
const MINOR: u8 = 20;

/// Serialize a tape item sequence into TZX container bytes.
///
/// # Errors
///
/// `UnsupportedProfile` for a block whose profile the container cannot
/// express (compact bit encoding is a playback-only option).
pub fn write_tzx(items: &[TapeItem]) -> Result<Vec<u8>, EncodeError> {
    let mut out = MAGIC.to_vec();
    out.push(MAJOR);
    out.push(MINOR);

    for item in items {
        match item {
            TapeItem::Block(block) => write_block(&mut out, block)?,
            TapeItem::Tone { pulse_len, count } => {
                out.push(0x12);
                out.extend_from_slice(&pulse_len.to_le_bytes());
                out.extend_from_slice(&count.to_le_bytes());
            }
            TapeItem::Pulses(pulses) => {
                // The count field is one byte; longer sequences span chunks.
                for chunk in pulses.chunks(255) {
                    out.push(0x13);
                    out.push(chunk.len() as u8);
                    for pulse in chunk {
                        out.extend_from_slice(&pulse.to_le_bytes());
                    }
                }
            }
            TapeItem::Pause(ms) => {
                out.push(0x20);
                out.extend_from_slice(&ms.to_le_bytes());
            }
            TapeItem::StopTheTape => {
                out.push(0x20);
                out.extend_from_slice(&0u16.to_le_bytes());
            }
            TapeItem::LoopStart(repetitions) => {
                out.push(0x24);
                out.extend_from_slice(&repetitions.to_le_bytes());
            }
            TapeItem::LoopEnd => out.push(0x25),
            TapeItem::GroupStart(name) => {
                out.push(0x21);
                write_text(&mut out, name);
            }
            TapeItem::GroupEnd => out.push(0x22),
            TapeItem::Text(text) => {
                out.push(0x30);
                write_text(&mut out, text);
            }
        }
    }

    Ok(out)
}

fn write_text(out: &mut Vec<u8>, text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(255);
    out.push(len as u8);
    out.extend_from_slice(&bytes[..len]);
}

/// Whether a block can be serialized as a standard-speed chunk without
/// changing what a reload produces. ROM timing alone is not enough: the
/// $10 layout stores no timing fields, so the loader reconstructs the
/// pilot count from the flag and verifies the checksum as XOR — a block
/// whose stored checksum or pilot count wouldn't survive that must keep
/// the explicit $11 layout.
fn fits_standard_chunk(block: &crate::block::Block) -> bool {
    let profile = block.profile();
    profile.is_standard()
        && block.checksum_valid()
        && profile.pilot_count
            == TimingProfile::standard_for_flag(block.bytes()[0], profile.pause_ms).pilot_count
}

fn write_block(out: &mut Vec<u8>, block: &crate::block::Block) -> Result<(), EncodeError> {
    let profile = block.profile();
    let data_len = block.len() + 1; // trailing checksum octet

    if fits_standard_chunk(block) {
        out.push(0x10);
        out.extend_from_slice(&profile.pause_ms.to_le_bytes());
        out.extend_from_slice(&(data_len as u16).to_le_bytes());
    } else {
        if profile.compact_bits {
            return Err(EncodeError::UnsupportedProfile(
                "compact bit encoding has no container chunk",
            ));
        }
        out.push(0x11);
        write_turbo_header(out, profile, data_len);
    }

    out.extend_from_slice(block.bytes());
    out.push(block.checksum());
    Ok(())
}

fn write_turbo_header(out: &mut Vec<u8>, profile: &TimingProfile, data_len: usize) {
    out.extend_from_slice(&profile.pilot_pulse.to_le_bytes());
    out.extend_from_slice(&profile.sync1.to_le_bytes());
    out.extend_from_slice(&profile.sync2.to_le_bytes());
    out.extend_from_slice(&profile.zero_pulse.to_le_bytes());
    out.extend_from_slice(&profile.one_pulse.to_le_bytes());
    out.extend_from_slice(&profile.pilot_count.to_le_bytes());
    out.push(profile.used_bits);
    out.extend_from_slice(&profile.pause_ms.to_le_bytes());
    // 3-byte little-endian data length.
    out.push(data_len as u8);
    out.push((data_len >> 8) as u8);
    out.push((data_len >> 16) as u8);
}
