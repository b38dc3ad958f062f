//! Turbo transform — re-encodes standard blocks into the custom
//! fast-loading block format.
//!
//! A turbo block carries the same payload as its source but with a
//! synthesized envelope the turbo loader stub expects: a type tag
//! distinguishing header from data blocks and the payload length, placed
//! between the flag byte and the payload. The checksum is recomputed over
//! the new byte sequence and the timing profile is fixed to turbo.
//!
//! The transform is pure and deterministic: no I/O, payload bytes are
//! preserved exactly, only the envelope changes.

use crate::block::{Block, TapeItem, TimingProfile};

/// Envelope type tag for a header block (source flag $00).
pub const TAG_HEADER: u8 = 0x00;

/// Envelope type tag for a data block.
pub const TAG_DATA: u8 = 0xFF;

/// Flag synthesized for source blocks whose container format omitted one.
pub const SYNTHESIZED_FLAG: u8 = 0xFF;

/// Envelope bytes between the flag and the payload: tag + 16-bit length.
pub const ENVELOPE_LEN: usize = 3;

/// Re-encode one block into its turbo equivalent.
///
/// The output byte sequence is `flag, tag, len_lo, len_hi, payload…` with
/// the checksum recomputed over all of it. A source block with no flag is
/// normalized to an explicit synthesized data flag first.
#[must_use]
pub fn to_turbo(block: &Block) -> Block {
    let flag = block.flag().unwrap_or(SYNTHESIZED_FLAG);
    let payload = block.payload();
    let tag = if flag == 0x00 { TAG_HEADER } else { TAG_DATA };
    let len = payload.len() as u16;

    let mut bytes = Vec::with_capacity(1 + ENVELOPE_LEN + payload.len());
    bytes.push(flag);
    bytes.push(tag);
    bytes.push(len as u8);
    bytes.push((len >> 8) as u8);
    bytes.extend_from_slice(payload);

    let profile = TimingProfile::turbo(block.profile().pause_ms);
    Block::new(bytes, profile).expect("turbo bytes are never empty")
}

/// Map every block of an item sequence through [`to_turbo`], passing
/// control events through untouched. Order is preserved.
#[must_use]
pub fn transform_items(items: &[TapeItem]) -> Vec<TapeItem> {
    items
        .iter()
        .map(|item| match item {
            TapeItem::Block(block) => TapeItem::Block(to_turbo(block)),
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::xor_checksum;

    fn source_block(flag: u8, payload: &[u8]) -> Block {
        let mut bytes = vec![flag];
        bytes.extend_from_slice(payload);
        Block::new(bytes, TimingProfile::standard_for_flag(flag, 1000)).expect("valid block")
    }

    #[test]
    fn payload_is_preserved_exactly() {
        let src = source_block(0xFF, &[0x01, 0x02, 0x03, 0xFE]);
        let turbo = to_turbo(&src);
        assert_eq!(&turbo.bytes()[1 + ENVELOPE_LEN..], src.payload());
    }

    #[test]
    fn envelope_carries_tag_and_length() {
        let src = source_block(0xFF, &[0xAA; 300]);
        let turbo = to_turbo(&src);
        let bytes = turbo.bytes();
        assert_eq!(bytes[0], 0xFF); // flag
        assert_eq!(bytes[1], TAG_DATA);
        assert_eq!(bytes[2], (300u16 & 0xFF) as u8);
        assert_eq!(bytes[3], (300u16 >> 8) as u8);
    }

    #[test]
    fn header_flag_gets_header_tag() {
        let src = source_block(0x00, &[0x03, 0x10]);
        let turbo = to_turbo(&src);
        assert_eq!(turbo.bytes()[1], TAG_HEADER);
    }

    #[test]
    fn missing_flag_is_synthesized() {
        let src =
            Block::flagless(vec![0x12, 0x34], TimingProfile::standard_for_flag(0xFF, 0))
                .expect("valid block");
        let turbo = to_turbo(&src);
        assert_eq!(turbo.flag(), Some(SYNTHESIZED_FLAG));
        assert_eq!(&turbo.bytes()[1 + ENVELOPE_LEN..], &[0x12, 0x34]);
    }

    #[test]
    fn checksum_recomputed_over_new_bytes() {
        let src = source_block(0xFF, &[0x55, 0x66]);
        let turbo = to_turbo(&src);
        assert_eq!(turbo.checksum(), xor_checksum(turbo.bytes()));
        assert_ne!(turbo.checksum(), src.checksum());
    }

    #[test]
    fn profile_fixed_to_turbo_with_source_pause() {
        let src = source_block(0xFF, &[0x01]);
        let turbo = to_turbo(&src);
        assert!(!turbo.profile().is_standard());
        assert_eq!(turbo.profile().pause_ms, 1000);
    }

    #[test]
    fn transform_is_deterministic() {
        let src = source_block(0xFF, &[1, 2, 3]);
        assert_eq!(to_turbo(&src), to_turbo(&src));
    }

    #[test]
    fn control_items_pass_through() {
        let items = vec![
            TapeItem::GroupStart("level 1".into()),
            TapeItem::Block(source_block(0xFF, &[9])),
            TapeItem::Pause(500),
            TapeItem::GroupEnd,
        ];
        let out = transform_items(&items);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], items[0]);
        assert_eq!(out[2], items[2]);
        assert_eq!(out[3], items[3]);
        assert!(matches!(&out[1], TapeItem::Block(b) if !b.profile().is_standard()));
    }
}
