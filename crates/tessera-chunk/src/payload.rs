//! Section payload codec.
//!
//! A payload is `SECTION_VOLUME` little-endian `u16` cells in section index order, each
//! holding `legacy_id << 4 | data`.

use tessera_blocks::{Block, BlockRegistry};
use thiserror::Error;

use crate::section::{SECTION_VOLUME, SECTIONS_PER_CHUNK};

pub const SECTION_PAYLOAD_LEN: usize = SECTION_VOLUME * 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("section payload is {0} bytes, expected {SECTION_PAYLOAD_LEN}")]
    Length(usize),
    #[error("section index {0} is out of range (0..{SECTIONS_PER_CHUNK})")]
    SectionIndex(u8),
}

pub fn decode_section(raw: &[u8], reg: &BlockRegistry) -> Result<Vec<Block>, DecodeError> {
    if raw.len() != SECTION_PAYLOAD_LEN {
        return Err(DecodeError::Length(raw.len()));
    }
    let mut fallbacks = 0usize;
    let blocks = raw
        .chunks_exact(2)
        .map(|pair| {
            let v = u16::from_le_bytes([pair[0], pair[1]]);
            let legacy = v >> 4;
            if !reg.is_known_legacy(legacy) {
                fallbacks += 1;
            }
            reg.resolve_legacy(legacy, (v & 0x0F) as u8)
        })
        .collect();
    if fallbacks > 0 {
        log::warn!("section payload held {fallbacks} cells with unknown block ids");
    }
    Ok(blocks)
}

/// Encodes blocks as a payload. States without a legacy mapping are written as air.
pub fn encode_section(blocks: &[Block], reg: &BlockRegistry) -> Vec<u8> {
    let mut out = Vec::with_capacity(SECTION_PAYLOAD_LEN);
    for i in 0..SECTION_VOLUME {
        let b = blocks.get(i).copied().unwrap_or(Block::AIR);
        let (legacy, data) = reg.encode_legacy(b).unwrap_or((0, 0));
        let v = (legacy << 4) | u16::from(data & 0x0F);
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
