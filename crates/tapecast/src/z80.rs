//! .Z80 snapshot loader (version 1).
//!
//! **Version 1** (offset 6–7 PC ≠ 0): 30-byte header + one 48K memory
//! image, optionally RLE-compressed. Version 2/3 files store PC = 0 and
//! an extended header; those are rejected as unsupported.
//!
//! A snapshot is not a tape, so loading one synthesizes an equivalent
//! bootstrap sequence: the 48K image split into 16 KiB payload chunks,
//! each preceded by a standard code-file header block, followed by a
//! short machine-code stub that restores the registers and jumps to the
//! snapshot's PC. Played through the normal pulse pipeline, the sequence
//! loads like an ordinary tape.

use crate::block::{Block, TapeItem, TimingProfile};
use crate::error::ParseError;
use crate::loader::TapeLoader;

/// Fixed v1 header size.
const HEADER_SIZE: usize = 30;

/// 48K RAM image: $4000–$FFFF.
const RAM_SIZE: usize = 0xC000;

/// RAM base address on the target machine.
const RAM_BASE: u16 = 0x4000;

/// Payload chunk size for the synthesized blocks.
const CHUNK_SIZE: usize = 0x4000;

/// Load address of the register-restore stub (the printer buffer, safe
/// to overwrite after the image is in place).
const STUB_ORIGIN: u16 = 0x5B00;

/// Pause between synthesized blocks in milliseconds.
const BLOCK_PAUSE_MS: u16 = 1000;

/// Register state captured by the v1 header.
#[derive(Debug, Clone, Copy, Default)]
struct Registers {
    a: u8,
    bc: u16,
    de: u16,
    hl: u16,
    ix: u16,
    iy: u16,
    sp: u16,
    pc: u16,
    i: u8,
    iff1: bool,
    im: u8,
    border: u8,
}

/// Loader for v1 memory snapshots.
#[derive(Debug)]
pub struct Z80Loader;

impl TapeLoader for Z80Loader {
    fn load(&self, data: &[u8]) -> Result<Vec<TapeItem>, ParseError> {
        if data.len() < HEADER_SIZE {
            return Err(ParseError::Truncated {
                context: "Z80 header",
                offset: 0,
                needed: HEADER_SIZE,
                remaining: data.len(),
            });
        }

        let pc = u16::from(data[6]) | (u16::from(data[7]) << 8);
        if pc == 0 {
            // v2/v3 layouts move PC into an extended header.
            return Err(ParseError::UnsupportedVersion(
                "extended-header snapshot (v2/v3)".into(),
            ));
        }

        let (regs, compressed) = parse_header(data, pc);
        let body = &data[HEADER_SIZE..];

        let ram = if compressed {
            decompress_rle(strip_end_marker(body), RAM_SIZE)?
        } else if body.len() == RAM_SIZE {
            body.to_vec()
        } else {
            return Err(ParseError::CorruptSnapshot {
                expected: RAM_SIZE,
                found: body.len(),
            });
        };

        tracing::debug!(pc = regs.pc, compressed, "synthesizing snapshot bootstrap");
        Ok(bootstrap_items(&regs, &ram))
    }
}

fn parse_header(data: &[u8], pc: u16) -> (Registers, bool) {
    // Flags byte quirk: 255 means "treat as 1" in old files.
    let flags1 = if data[12] == 255 { 1 } else { data[12] };

    let regs = Registers {
        a: data[0],
        bc: u16::from(data[2]) | (u16::from(data[3]) << 8),
        hl: u16::from(data[4]) | (u16::from(data[5]) << 8),
        sp: u16::from(data[8]) | (u16::from(data[9]) << 8),
        i: data[10],
        de: u16::from(data[13]) | (u16::from(data[14]) << 8),
        iy: u16::from(data[23]) | (u16::from(data[24]) << 8),
        ix: u16::from(data[25]) | (u16::from(data[26]) << 8),
        iff1: data[27] != 0,
        im: data[29] & 0x03,
        border: (flags1 >> 1) & 0x07,
        pc,
    };

    (regs, flags1 & 0x20 != 0)
}

/// Drop the v1 compressed-stream terminator (`00 ED ED 00`) if present.
fn strip_end_marker(body: &[u8]) -> &[u8] {
    if body.len() >= 4 && body[body.len() - 4..] == [0x00, 0xED, 0xED, 0x00] {
        &body[..body.len() - 4]
    } else {
        body
    }
}

/// Expand the RLE stream to exactly `expected` bytes.
///
/// Escape sequence: `ED ED count value` = `count` repetitions of `value`.
/// No other byte sequence is an escape; a lone `ED` passes through
/// literally.
fn decompress_rle(src: &[u8], expected: usize) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::with_capacity(expected);
    let mut si = 0;

    while si < src.len() {
        if si + 3 < src.len() && src[si] == 0xED && src[si + 1] == 0xED {
            let count = usize::from(src[si + 2]);
            let value = src[si + 3];
            out.extend(std::iter::repeat_n(value, count));
            si += 4;
        } else {
            out.push(src[si]);
            si += 1;
        }
    }

    if out.len() == expected {
        Ok(out)
    } else {
        Err(ParseError::CorruptSnapshot {
            expected,
            found: out.len(),
        })
    }
}

/// Standard 17-byte code-file header block: type 3, padded name, length,
/// start address.
fn header_block(name: &str, length: u16, start: u16) -> Block {
    let mut bytes = Vec::with_capacity(18);
    bytes.push(0x00); // flag: header
    bytes.push(3); // type: code file
    let mut padded = [b' '; 10];
    for (dst, src) in padded.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    bytes.extend_from_slice(&padded);
    bytes.extend_from_slice(&length.to_le_bytes());
    bytes.extend_from_slice(&start.to_le_bytes());
    bytes.extend_from_slice(&32768u16.to_le_bytes()); // unused code param

    let profile = TimingProfile::standard_for_flag(0x00, BLOCK_PAUSE_MS);
    Block::new(bytes, profile).expect("header bytes are never empty")
}

fn data_block(payload: &[u8]) -> Block {
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(0xFF);
    bytes.extend_from_slice(payload);
    let profile = TimingProfile::standard_for_flag(0xFF, BLOCK_PAUSE_MS);
    Block::new(bytes, profile).expect("data bytes are never empty")
}

/// Machine code that restores the captured register state and jumps to
/// the snapshot's PC. Runs with interrupts disabled until the final EI.
fn stub_code(regs: &Registers) -> Vec<u8> {
    let mut code = Vec::with_capacity(40);
    code.push(0xF3); // DI
    code.push(0x3E); // LD A, border
    code.push(regs.border);
    code.push(0xD3); // OUT ($FE), A
    code.push(0xFE);
    code.push(0x3E); // LD A, i
    code.push(regs.i);
    code.extend_from_slice(&[0xED, 0x47]); // LD I, A
    code.extend_from_slice(match regs.im {
        0 => &[0xED, 0x46], // IM 0
        1 => &[0xED, 0x56], // IM 1
        _ => &[0xED, 0x5E], // IM 2
    });
    code.push(0xDD); // LD IX, nn
    code.push(0x21);
    code.extend_from_slice(&regs.ix.to_le_bytes());
    code.push(0xFD); // LD IY, nn
    code.push(0x21);
    code.extend_from_slice(&regs.iy.to_le_bytes());
    code.push(0x01); // LD BC, nn
    code.extend_from_slice(&regs.bc.to_le_bytes());
    code.push(0x11); // LD DE, nn
    code.extend_from_slice(&regs.de.to_le_bytes());
    code.push(0x21); // LD HL, nn
    code.extend_from_slice(&regs.hl.to_le_bytes());
    code.push(0x31); // LD SP, nn
    code.extend_from_slice(&regs.sp.to_le_bytes());
    code.push(0x3E); // LD A, n
    code.push(regs.a);
    if regs.iff1 {
        code.push(0xFB); // EI
    }
    code.push(0xC3); // JP pc
    code.extend_from_slice(&regs.pc.to_le_bytes());
    code
}

/// Header + data block pairs for the RAM chunks, then the restore stub.
fn bootstrap_items(regs: &Registers, ram: &[u8]) -> Vec<TapeItem> {
    let mut items = Vec::new();

    for (i, chunk) in ram.chunks(CHUNK_SIZE).enumerate() {
        let start = RAM_BASE + (i * CHUNK_SIZE) as u16;
        let name = format!("RAM{i}");
        items.push(TapeItem::Block(header_block(
            &name,
            chunk.len() as u16,
            start,
        )));
        items.push(TapeItem::Block(data_block(chunk)));
    }

    let stub = stub_code(regs);
    items.push(TapeItem::Block(header_block(
        "RUN",
        stub.len() as u16,
        STUB_ORIGIN,
    )));
    items.push(TapeItem::Block(data_block(&stub)));

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    /// v1 header with a given PC and flags byte, everything else zero.
    fn v1_header(pc: u16, flags1: u8) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_SIZE];
        header[6] = pc as u8;
        header[7] = (pc >> 8) as u8;
        header[12] = flags1;
        header
    }

    #[test]
    fn uncompressed_image_loads() {
        let mut data = v1_header(0x8000, 0);
        data.extend_from_slice(&[0xAA; RAM_SIZE]);
        let items = Z80Loader.load(&data).expect("valid snapshot");

        // 3 chunks + stub, each a header/data pair.
        assert_eq!(items.len(), 8);
        let TapeItem::Block(first_data) = &items[1] else {
            panic!("expected a block");
        };
        assert_eq!(first_data.flag(), Some(0xFF));
        assert_eq!(first_data.payload().len(), CHUNK_SIZE);
        assert!(first_data.payload().iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn compressed_image_loads() {
        let mut data = v1_header(0x8000, 0x20);
        // 48K of a single value: 192 runs of 255 bytes + one run of 192.
        for _ in 0..192 {
            data.extend_from_slice(&[0xED, 0xED, 255, 0x55]);
        }
        data.extend_from_slice(&[0xED, 0xED, 192, 0x55]);
        data.extend_from_slice(&[0x00, 0xED, 0xED, 0x00]); // end marker

        let items = Z80Loader.load(&data).expect("valid snapshot");
        let TapeItem::Block(first_data) = &items[1] else {
            panic!("expected a block");
        };
        assert!(first_data.payload().iter().all(|&b| b == 0x55));
    }

    #[test]
    fn stub_jumps_to_snapshot_pc() {
        let mut data = v1_header(0x9234, 0);
        data.extend_from_slice(&[0x00; RAM_SIZE]);
        let items = Z80Loader.load(&data).expect("valid snapshot");

        let TapeItem::Block(stub) = items.last().expect("stub block") else {
            panic!("expected a block");
        };
        let code = stub.payload();
        assert_eq!(&code[code.len() - 3..], &[0xC3, 0x34, 0x92]);
        assert_eq!(code[0], 0xF3); // starts with DI
    }

    #[test]
    fn header_blocks_describe_the_chunks() {
        let mut data = v1_header(0x8000, 0);
        data.extend_from_slice(&[0x00; RAM_SIZE]);
        let items = Z80Loader.load(&data).expect("valid snapshot");

        let TapeItem::Block(second_header) = &items[2] else {
            panic!("expected a block");
        };
        assert_eq!(second_header.flag(), Some(0x00));
        let bytes = second_header.bytes();
        assert_eq!(bytes[1], 3); // code file type
        // Start address of the second chunk.
        assert_eq!(&bytes[12..14], &(CHUNK_SIZE as u16).to_le_bytes());
        assert_eq!(&bytes[14..16], &0x8000u16.to_le_bytes());
    }

    #[test]
    fn zero_pc_is_unsupported_version() {
        let mut data = v1_header(0, 0);
        data.extend_from_slice(&[0x00; RAM_SIZE]);
        let err = Z80Loader.load(&data).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedVersion(_)));
    }

    #[test]
    fn short_header_is_truncated() {
        let err = Z80Loader.load(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Truncated {
                context: "Z80 header",
                ..
            }
        ));
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        // Declared 100 bytes, stream produces 99.
        let err = decompress_rle(&[0xED, 0xED, 99, 0x11], 100).unwrap_err();
        assert_eq!(
            err,
            ParseError::CorruptSnapshot {
                expected: 100,
                found: 99,
            }
        );
    }

    #[test]
    fn lone_ed_is_literal() {
        let out = decompress_rle(&[0xED, 0x47, 0x00], 3).expect("literal bytes");
        assert_eq!(out, &[0xED, 0x47, 0x00]);
    }

    #[test]
    fn flags_byte_255_reads_as_1() {
        // flags1 == 255 would otherwise claim compression and border 7.
        let mut data = v1_header(0x8000, 255);
        data.extend_from_slice(&[0x00; RAM_SIZE]);
        assert!(Z80Loader.load(&data).is_ok());
    }
}
