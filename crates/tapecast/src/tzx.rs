//! TZX tape-container loader.
//!
//! A TZX file starts with a 10-byte header (`"ZXTape!" + 0x1A + major +
//! minor`) followed by ID-tagged chunks. Data chunks are normalized into
//! [`Block`]s; tone, pulse, pause, loop, group and text chunks become the
//! corresponding control items so the whole session can be replayed or
//! re-serialized. Unknown chunk IDs with a recoverable length are skipped;
//! an unknown chunk with no way to determine its length aborts the parse.
//!
//! Reference: <https://worldofspectrum.net/TZXformat.html>

use crate::block::{Block, TapeItem, TimingProfile, xor_checksum};
use crate::error::ParseError;
use crate::loader::TapeLoader;

/// TZX header magic: "ZXTape!" + 0x1A.
pub(crate) const MAGIC: &[u8; 8] = b"ZXTape!\x1A";

/// Loader for the tagged-chunk tape-container format.
#[derive(Debug)]
pub struct TzxLoader;

impl TapeLoader for TzxLoader {
    fn load(&self, data: &[u8]) -> Result<Vec<TapeItem>, ParseError> {
        if data.len() < 10 {
            return Err(ParseError::Truncated {
                context: "TZX header",
                offset: 0,
                needed: 10,
                remaining: data.len(),
            });
        }
        if &data[0..8] != MAGIC {
            return Err(ParseError::BadSignature);
        }

        let mut items = Vec::new();
        let mut pos = 10;

        while pos < data.len() {
            let id = data[pos];
            let id_offset = pos;
            pos += 1;

            match id {
                0x10 => items.push(parse_standard_speed(data, &mut pos)?),
                0x11 => items.push(parse_turbo_speed(data, &mut pos)?),
                0x12 => {
                    need(data, pos, 4, "pure tone chunk")?;
                    let pulse_len = read_u16_le(data, pos);
                    let count = read_u16_le(data, pos + 2);
                    pos += 4;
                    items.push(TapeItem::Tone { pulse_len, count });
                }
                0x13 => {
                    need(data, pos, 1, "pulse sequence count")?;
                    let count = usize::from(data[pos]);
                    pos += 1;
                    need(data, pos, count * 2, "pulse sequence data")?;
                    let pulses = (0..count).map(|i| read_u16_le(data, pos + i * 2)).collect();
                    pos += count * 2;
                    items.push(TapeItem::Pulses(pulses));
                }
                0x20 => {
                    need(data, pos, 2, "pause chunk")?;
                    let duration_ms = read_u16_le(data, pos);
                    pos += 2;
                    // A zero-duration pause means "stop the tape".
                    items.push(if duration_ms == 0 {
                        TapeItem::StopTheTape
                    } else {
                        TapeItem::Pause(duration_ms)
                    });
                }
                0x21 => {
                    let name = read_text(data, &mut pos, "group start name")?;
                    items.push(TapeItem::GroupStart(name));
                }
                0x22 => items.push(TapeItem::GroupEnd),
                0x24 => {
                    need(data, pos, 2, "loop start chunk")?;
                    let repetitions = read_u16_le(data, pos);
                    pos += 2;
                    items.push(TapeItem::LoopStart(repetitions));
                }
                0x25 => items.push(TapeItem::LoopEnd),
                0x30 => {
                    let text = read_text(data, &mut pos, "text description")?;
                    items.push(TapeItem::Text(text));
                }
                _ => skip_unknown_chunk(id, id_offset, data, &mut pos)?,
            }
        }

        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn need(data: &[u8], pos: usize, n: usize, context: &'static str) -> Result<(), ParseError> {
    if pos + n > data.len() {
        Err(ParseError::Truncated {
            context,
            offset: pos,
            needed: n,
            remaining: data.len() - pos,
        })
    } else {
        Ok(())
    }
}

fn read_u16_le(data: &[u8], pos: usize) -> u16 {
    u16::from(data[pos]) | (u16::from(data[pos + 1]) << 8)
}

fn read_u24_le(data: &[u8], pos: usize) -> u32 {
    u32::from(data[pos]) | (u32::from(data[pos + 1]) << 8) | (u32::from(data[pos + 2]) << 16)
}

fn read_u32_le(data: &[u8], pos: usize) -> u32 {
    u32::from(read_u16_le(data, pos)) | (u32::from(read_u16_le(data, pos + 2)) << 16)
}

/// Length-prefixed text field (1-byte length).
fn read_text(data: &[u8], pos: &mut usize, context: &'static str) -> Result<String, ParseError> {
    need(data, *pos, 1, context)?;
    let len = usize::from(data[*pos]);
    *pos += 1;
    need(data, *pos, len, context)?;
    let text = String::from_utf8_lossy(&data[*pos..*pos + len]).to_string();
    *pos += len;
    Ok(text)
}

// ---------------------------------------------------------------------------
// Chunk parsers
// ---------------------------------------------------------------------------

/// Chunk $10: standard speed data (ROM timing). The chunk data is flag +
/// payload + checksum; the stored checksum must match the XOR of the rest.
fn parse_standard_speed(data: &[u8], pos: &mut usize) -> Result<TapeItem, ParseError> {
    need(data, *pos, 4, "standard speed header")?;
    let pause_ms = read_u16_le(data, *pos);
    let len = usize::from(read_u16_le(data, *pos + 2));
    *pos += 4;

    if len < 2 {
        return Err(ParseError::BadBlockLength {
            offset: *pos - 2,
            len,
            min: 2,
        });
    }
    need(data, *pos, len, "standard speed data")?;

    let bytes = data[*pos..*pos + len - 1].to_vec();
    let stored = data[*pos + len - 1];
    let computed = xor_checksum(&bytes);
    if stored != computed {
        return Err(ParseError::ChecksumMismatch {
            offset: *pos,
            expected: computed,
            found: stored,
        });
    }
    *pos += len;

    let profile = TimingProfile::standard_for_flag(bytes[0], pause_ms);
    Ok(TapeItem::Block(Block::new(bytes, profile)?))
}

/// Chunk $11: turbo speed data. Timing is read from the chunk itself; the
/// stored checksum is scheme-defined and preserved unverified.
fn parse_turbo_speed(data: &[u8], pos: &mut usize) -> Result<TapeItem, ParseError> {
    need(data, *pos, 18, "turbo speed header")?;
    let profile = TimingProfile {
        pilot_pulse: read_u16_le(data, *pos),
        sync1: read_u16_le(data, *pos + 2),
        sync2: read_u16_le(data, *pos + 4),
        zero_pulse: read_u16_le(data, *pos + 6),
        one_pulse: read_u16_le(data, *pos + 8),
        pilot_count: read_u16_le(data, *pos + 10),
        used_bits: data[*pos + 12],
        pause_ms: read_u16_le(data, *pos + 13),
        compact_bits: false,
    };
    let len = read_u24_le(data, *pos + 15) as usize;
    *pos += 18;

    if len < 2 {
        return Err(ParseError::BadBlockLength {
            offset: *pos - 3,
            len,
            min: 2,
        });
    }
    need(data, *pos, len, "turbo speed data")?;

    let bytes = data[*pos..*pos + len - 1].to_vec();
    let stored = data[*pos + len - 1];
    *pos += len;

    Ok(TapeItem::Block(Block::with_stored_checksum(
        bytes, stored, profile,
    )?))
}

/// Skip a chunk we don't model, using its known length layout or the
/// 4-byte length prefix convention. A chunk with no recoverable length is
/// a hard parse error — a misjudged boundary would corrupt everything
/// after it.
fn skip_unknown_chunk(
    id: u8,
    id_offset: usize,
    data: &[u8],
    pos: &mut usize,
) -> Result<(), ParseError> {
    let skip = match id {
        // $14: pure data — 7-byte header + 3-byte data length
        0x14 => {
            need(data, *pos, 10, "pure data header")?;
            10 + read_u24_le(data, *pos + 7) as usize
        }
        // $15: direct recording — 5-byte header + 3-byte data length
        0x15 => {
            need(data, *pos, 8, "direct recording header")?;
            8 + read_u24_le(data, *pos + 5) as usize
        }
        // $23: call sequence — 2-byte count × 2
        0x23 => {
            need(data, *pos, 2, "call sequence count")?;
            2 + usize::from(read_u16_le(data, *pos)) * 2
        }
        // $26: return from sequence — no data
        0x26 => 0,
        // $27/$28: select / jump — 2-byte length prefix
        0x27 | 0x28 => {
            need(data, *pos, 2, "chunk length")?;
            2 + usize::from(read_u16_le(data, *pos))
        }
        // $32: archive info — 2-byte length prefix
        0x32 => {
            need(data, *pos, 2, "archive info length")?;
            2 + usize::from(read_u16_le(data, *pos))
        }
        // $33: hardware type — 1-byte count × 3
        0x33 => {
            need(data, *pos, 1, "hardware type count")?;
            1 + usize::from(data[*pos]) * 3
        }
        // $35: custom info — 16-byte ID + 4-byte length
        0x35 => {
            need(data, *pos, 20, "custom info header")?;
            20 + read_u32_le(data, *pos + 16) as usize
        }
        // $5A: glue block — fixed 9 bytes
        0x5A => 9,
        // Anything else: the general extension rule is a 4-byte length
        // prefix. Without even that, the chunk boundary is unknowable.
        _ => {
            if *pos + 4 > data.len() {
                return Err(ParseError::UnknownChunk { id, offset: id_offset });
            }
            4 + read_u32_le(data, *pos) as usize
        }
    };

    need(data, *pos, skip, "unknown chunk body")?;
    *pos += skip;
    tracing::warn!(id, offset = id_offset, "skipped TZX chunk");
    Ok(())
}
