//! End-to-end pipeline tests: load → transform → serialize → render.

use tapecast::render::{RenderConfig, render_to_vec};
use tapecast::tap::TapLoader;
use tapecast::turbo::transform_items;
use tapecast::tzx::TzxLoader;
use tapecast::{TapeItem, TapeLoader, write_tzx};

/// Build a TZX image from chunk bodies.
fn tzx_image(chunks: &[&[u8]]) -> Vec<u8> {
    let mut data = b"ZXTape!\x1A".to_vec();
    data.push(1);
    data.push(20);
    for chunk in chunks {
        data.extend_from_slice(chunk);
    }
    data
}

/// Standard-speed data chunk ($10) with checksum appended.
fn standard_chunk(pause_ms: u16, bytes: &[u8]) -> Vec<u8> {
    let checksum = bytes.iter().fold(0u8, |acc, b| acc ^ b);
    let mut chunk = vec![0x10];
    chunk.extend_from_slice(&pause_ms.to_le_bytes());
    chunk.extend_from_slice(&((bytes.len() + 1) as u16).to_le_bytes());
    chunk.extend_from_slice(bytes);
    chunk.push(checksum);
    chunk
}

#[test]
fn tzx_survives_load_write_load_byte_for_byte() {
    let image = tzx_image(&[
        &[0x21, 0x04, b'G', b'a', b'm', b'e'], // group start
        &standard_chunk(1000, &[0x00, 0x03, b'A', b'B']),
        &[0x12, 0x78, 0x08, 0xB8, 0x0B], // pure tone
        &[0x13, 0x02, 0x9B, 0x02, 0xDF, 0x02], // pulse sequence
        &standard_chunk(500, &[0xFF, 0x10, 0x20]),
        &[0x24, 0x02, 0x00], // loop start ×2
        &[0x20, 0xF4, 0x01], // pause 500 ms
        &[0x25],             // loop end
        &[0x22],             // group end
        &[0x30, 0x05, b'h', b'e', b'l', b'l', b'o'],
        &[0x20, 0x00, 0x00], // stop the tape
    ]);

    let items = TzxLoader.load(&image).expect("first load");
    let written = write_tzx(&items).expect("write");
    let reloaded = TzxLoader.load(&written).expect("second load");
    let rewritten = write_tzx(&reloaded).expect("rewrite");

    assert_eq!(items, reloaded);
    assert_eq!(written, rewritten);
}

#[test]
fn turbo_chunks_round_trip_with_stored_checksum() {
    // Turbo-speed chunk ($11) with a deliberately non-XOR checksum byte.
    let mut chunk = vec![0x11];
    for field in [2100u16, 650, 700, 850, 1700, 4000] {
        chunk.extend_from_slice(&field.to_le_bytes());
    }
    chunk.push(6); // used bits in last byte
    chunk.extend_from_slice(&750u16.to_le_bytes());
    chunk.extend_from_slice(&[4, 0, 0]); // u24 data length
    chunk.extend_from_slice(&[0xFF, 0x01, 0x02, 0x77]);

    let image = tzx_image(&[&chunk]);
    let items = TzxLoader.load(&image).expect("load");
    let written = write_tzx(&items).expect("write");
    assert_eq!(written, image);
}

/// Turbo-speed chunk ($11) body with explicit timing fields.
fn turbo_chunk(fields: [u16; 6], used_bits: u8, pause_ms: u16, data: &[u8]) -> Vec<u8> {
    let mut chunk = vec![0x11];
    for field in fields {
        chunk.extend_from_slice(&field.to_le_bytes());
    }
    chunk.push(used_bits);
    chunk.extend_from_slice(&pause_ms.to_le_bytes());
    chunk.push(data.len() as u8);
    chunk.extend_from_slice(&[0, 0]); // upper u24 length bytes
    chunk.extend_from_slice(data);
    chunk
}

/// ROM constants in $11 field order: pilot, sync1, sync2, zero, one,
/// then the given pilot count.
fn rom_fields(pilot_count: u16) -> [u16; 6] {
    [2168, 667, 735, 855, 1710, pilot_count]
}

#[test]
fn rom_timed_turbo_chunk_keeps_stored_checksum_through_round_trip() {
    // A $11 chunk may carry ROM timing yet a scheme-defined checksum; it
    // must not be rewritten as a $10 chunk, whose loader verifies XOR.
    let image = tzx_image(&[&turbo_chunk(rom_fields(3223), 8, 1000, &[0xFF, 0x01, 0x77])]);

    let items = TzxLoader.load(&image).expect("load");
    let written = write_tzx(&items).expect("write");
    assert_eq!(written, image);

    let reloaded = TzxLoader.load(&written).expect("reload");
    assert_eq!(items, reloaded);
}

#[test]
fn rom_timed_turbo_chunk_keeps_flag_mismatched_pilot_count() {
    // Header-length pilot on a data flag only survives in the $11 layout:
    // a $10 reload would reconstruct the pilot count from the flag.
    let data = [0xFF, 0x01, 0xFF ^ 0x01];
    let image = tzx_image(&[&turbo_chunk(rom_fields(8063), 8, 1000, &data)]);

    let items = TzxLoader.load(&image).expect("load");
    let written = write_tzx(&items).expect("write");
    assert_eq!(written, image);

    let reloaded = TzxLoader.load(&written).expect("reload");
    assert_eq!(items, reloaded);
}

#[test]
fn tap_to_turbo_to_container_to_samples() {
    // A header/data pair in TAP form.
    let mut tap = Vec::new();
    let header = [0x00u8, 0x03, b'C', b'O', b'D', b'E'];
    tap.extend_from_slice(&(header.len() as u16).to_le_bytes());
    tap.extend_from_slice(&header);
    let data = [0xFFu8, 0xDE, 0xAD, 0xBE, 0xEF];
    tap.extend_from_slice(&(data.len() as u16).to_le_bytes());
    tap.extend_from_slice(&data);

    let items = TapLoader.load(&tap).expect("tap load");
    let turbo = transform_items(&items);

    // The turbo sequence serializes to TZX and back unchanged.
    let container = write_tzx(&turbo).expect("write");
    let reloaded = TzxLoader.load(&container).expect("reload");
    assert_eq!(turbo, reloaded);

    // Both renditions produce audio; turbo timing is shorter.
    let config = RenderConfig::default();
    let standard_audio = render_to_vec(&items, config).expect("render standard");
    let turbo_audio = render_to_vec(&turbo, config).expect("render turbo");
    assert!(!turbo_audio.is_empty());
    assert!(turbo_audio.len() < standard_audio.len());
}

#[test]
fn normalized_stop_marker_renders_and_serializes() {
    let image = tzx_image(&[
        &standard_chunk(0, &[0xFF, 0x55]),
        &[0x20, 0x00, 0x00],
        &standard_chunk(0, &[0xFF, 0xAA]),
    ]);
    let items = TzxLoader.load(&image).expect("load");
    assert!(items.contains(&TapeItem::StopTheTape));

    // Buffered rendering resumes across the marker.
    let samples = render_to_vec(&items, RenderConfig::default()).expect("render");
    assert!(!samples.is_empty());

    let written = write_tzx(&items).expect("write");
    assert_eq!(written, image);
}
