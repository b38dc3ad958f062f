//! TAP file loader.
//!
//! The flat raw format: sequential blocks, each preceded by a 2-byte
//! little-endian length word. The first payload byte is the flag ($00 =
//! header, $FF = data); the checksum is not stored in the file — it is
//! computed from the bytes and appended at encode time.

use crate::block::{Block, TapeItem, TimingProfile};
use crate::error::ParseError;
use crate::loader::TapeLoader;

/// Pause after each TAP block in milliseconds (the format itself carries
/// no pause information).
const DEFAULT_PAUSE_MS: u16 = 1000;

/// Loader for the length-prefixed raw block format.
#[derive(Debug)]
pub struct TapLoader;

impl TapeLoader for TapLoader {
    fn load(&self, data: &[u8]) -> Result<Vec<TapeItem>, ParseError> {
        let mut items = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            if offset + 2 > data.len() {
                return Err(ParseError::Truncated {
                    context: "TAP length word",
                    offset,
                    needed: 2,
                    remaining: data.len() - offset,
                });
            }

            let block_len =
                usize::from(data[offset]) | (usize::from(data[offset + 1]) << 8);
            let block_offset = offset;
            offset += 2;

            if block_len == 0 {
                return Err(ParseError::BadBlockLength {
                    offset: block_offset,
                    len: block_len,
                    min: 1,
                });
            }

            if offset + block_len > data.len() {
                return Err(ParseError::Truncated {
                    context: "TAP block",
                    offset: block_offset,
                    needed: block_len,
                    remaining: data.len() - offset,
                });
            }

            let bytes = data[offset..offset + block_len].to_vec();
            offset += block_len;

            let flag = bytes[0];
            let profile = TimingProfile::standard_for_flag(flag, DEFAULT_PAUSE_MS);
            items.push(TapeItem::Block(Block::new(bytes, profile)?));
        }

        Ok(items)
    }
}
