//! Logical server-to-client messages. Any transport that speaks serde can carry them.

use serde::{Deserialize, Serialize};
use tessera_chunk::ChunkCoord;

/// One encoded section of a `chunk:loaded` message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPayload {
    /// Section index within the chunk, bottom up.
    pub y: u8,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "chunk:loaded")]
    ChunkLoaded {
        x: i32,
        z: i32,
        sections: Vec<SectionPayload>,
    },
    #[serde(rename = "block:update")]
    BlockUpdate {
        x: i32,
        y: i32,
        z: i32,
        id: u16,
        #[serde(default)]
        data: u8,
    },
    #[serde(rename = "chunk:unload")]
    ChunkUnload { x: i32, z: i32 },
}

impl ServerMessage {
    /// Chunk the message is about.
    pub fn coord(&self) -> ChunkCoord {
        match *self {
            ServerMessage::ChunkLoaded { x, z, .. } | ServerMessage::ChunkUnload { x, z } => {
                ChunkCoord::new(x, z)
            }
            ServerMessage::BlockUpdate { x, z, .. } => ChunkCoord::containing(x, z),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::ChunkLoaded { .. } => "chunk:loaded",
            ServerMessage::BlockUpdate { .. } => "block:update",
            ServerMessage::ChunkUnload { .. } => "chunk:unload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_by_type_name() {
        let msg: ServerMessage = toml::from_str(
            r#"
            type = "block:update"
            x = -17
            y = 64
            z = 3
            id = 44
            "#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::BlockUpdate {
                x: -17,
                y: 64,
                z: 3,
                id: 44,
                data: 0
            }
        );
        assert_eq!(msg.coord(), ChunkCoord::new(-2, 0));
        assert_eq!(msg.name(), "block:update");
    }

    #[test]
    fn loaded_round_trips_through_toml() {
        let msg = ServerMessage::ChunkLoaded {
            x: 1,
            z: 2,
            sections: vec![SectionPayload {
                y: 0,
                data: vec![1, 2, 3],
            }],
        };
        let text = toml::to_string(&msg).unwrap();
        assert!(text.contains("chunk:loaded"));
        let back: ServerMessage = toml::from_str(&text).unwrap();
        assert_eq!(back, msg);
    }
}
