//! Board mirroring: reconciliation, movement prediction and the session loop

pub mod board;
pub mod predict;
pub mod reconcile;
pub mod registry;
pub mod scene;
pub mod session;

pub use board::{BoardSnapshot, Direction};
pub use scene::SceneEffect;
pub use session::{SessionHandle, SyncEvent, SyncSession};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Player identity: the owner's public key as it appears on chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The "no player" identity carried by non-player tiles
    pub fn empty() -> Self {
        Self(String::new())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the wallet key of whoever is playing on this client
pub trait IdentitySource {
    fn local_identity(&self) -> Identity;
}

impl IdentitySource for Identity {
    fn local_identity(&self) -> Identity {
        self.clone()
    }
}

/// Conditions raised by the sync core. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("No ship registered for {0}")]
    ActorNotFound(Identity),

    #[error("Invalid direction byte: {0}")]
    InvalidDirection(u8),

    #[error("No board snapshot has been received yet")]
    BoardNotLoaded,

    #[error("Grid position ({x}, {y}) lies outside the current board")]
    OutOfBoard { x: i32, y: i32 },
}
