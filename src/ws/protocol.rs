//! Bridge protocol message definitions
//! These are the wire types exchanged with the chain watcher and the renderer

use serde::{Deserialize, Serialize};

use crate::game::{BoardSnapshot, Direction, Identity, SceneEffect, SyncError, SyncEvent};

/// Messages sent from bridge peers to the sync process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Full board fetched from the chain
    BoardChanged {
        board: BoardSnapshot,
    },

    /// A ship fired on chain
    ShipShot {
        owner: Identity,
    },

    /// Steering input for a ship
    DirectionInput {
        owner: Identity,
        /// 0 = up, 1 = right, 2 = down, 3 = left
        direction: u8,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Convert to a session event. `Ok(None)` for messages the bridge answers itself.
    pub fn into_event(self) -> Result<Option<SyncEvent>, SyncError> {
        match self {
            ClientMsg::BoardChanged { board } => Ok(Some(SyncEvent::BoardChanged(board))),
            ClientMsg::ShipShot { owner } => Ok(Some(SyncEvent::ShipShot(owner))),
            ClientMsg::DirectionInput { owner, direction } => {
                let direction = Direction::try_from(direction)?;
                Ok(Some(SyncEvent::DirectionInput { owner, direction }))
            }
            ClientMsg::Ping { .. } => Ok(None),
        }
    }
}

/// Messages sent from the sync process to bridge peers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        local_identity: Identity,
        server_time: u64,
    },

    /// Scene operations produced by one inbound event
    Effects {
        /// Increments once per non-empty batch
        seq: u64,
        effects: Vec<SceneEffect>,
    },

    /// Every live actor as spawn effects; replaces whatever the peer holds
    Resync {
        /// Last `effects` batch this covers
        seq: u64,
        effects: Vec<SceneEffect>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// Batch sequence number for `effects` and `resync`
    pub fn seq(&self) -> Option<u64> {
        match self {
            ServerMsg::Effects { seq, .. } | ServerMsg::Resync { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
