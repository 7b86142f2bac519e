//! Sections, chunks, and the client-side world store.
#![forbid(unsafe_code)]

pub mod chunk;
pub mod coord;
pub mod guard;
pub mod payload;
pub mod section;
pub mod world;

pub use chunk::Chunk;
pub use coord::{ChunkCoord, SectionKey};
pub use guard::BuildGuard;
pub use payload::{DecodeError, SECTION_PAYLOAD_LEN, decode_section, encode_section};
pub use section::{
    Neighbor, SECTION_SIZE, SECTION_VOLUME, SECTIONS_PER_CHUNK, Section, SectionSnapshot,
    WORLD_HEIGHT,
};
pub use world::{BlockUpdate, ChunkLoad, World};
