//! Scene capability: what the sync core asks of the renderer
//!
//! The core never touches engine objects. It calls [`Scene`] and the
//! bridge forwards the recorded [`SceneEffect`]s to whoever draws them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::{Direction, GridPos, Tile};

/// Opaque reference to a spawned actor. Dead once destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorHandle(Uuid);

impl ActorHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Ship,
    Chest,
}

/// Operations the renderer must provide
pub trait Scene {
    /// Instantiate an actor at a world position
    fn spawn(
        &mut self,
        kind: ActorKind,
        position: GridPos,
        tile: &Tile,
        is_local_player: bool,
    ) -> ActorHandle;

    /// New authoritative target for a ship (the renderer interpolates)
    fn move_toward(&mut self, handle: ActorHandle, position: GridPos, tile: &Tile);

    /// Optimistic local move ahead of chain confirmation
    fn predict_move(&mut self, handle: ActorHandle, position: GridPos, direction: Direction);

    fn shoot(&mut self, handle: ActorHandle);

    fn destroy(&mut self, handle: ActorHandle);

    /// User-facing notification at a world position
    fn notify(&mut self, label: &str, position: GridPos);
}

/// One recorded scene operation, as sent over the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SceneEffect {
    Spawn {
        handle: ActorHandle,
        kind: ActorKind,
        position: GridPos,
        tile: Tile,
        is_local_player: bool,
    },
    MoveToward {
        handle: ActorHandle,
        position: GridPos,
        tile: Tile,
    },
    PredictedMove {
        handle: ActorHandle,
        position: GridPos,
        direction: Direction,
    },
    Shoot {
        handle: ActorHandle,
    },
    Destroy {
        handle: ActorHandle,
    },
    Notify {
        label: String,
        position: GridPos,
    },
}

/// [`Scene`] that allocates handles and records every call in order
#[derive(Debug, Default)]
pub struct EffectScene {
    effects: Vec<SceneEffect>,
}

impl EffectScene {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn effects(&self) -> &[SceneEffect] {
        &self.effects
    }

    /// Take everything recorded so far
    pub fn drain(&mut self) -> Vec<SceneEffect> {
        std::mem::take(&mut self.effects)
    }
}

impl Scene for EffectScene {
    fn spawn(
        &mut self,
        kind: ActorKind,
        position: GridPos,
        tile: &Tile,
        is_local_player: bool,
    ) -> ActorHandle {
        let handle = ActorHandle::new();
        self.effects.push(SceneEffect::Spawn {
            handle,
            kind,
            position,
            tile: tile.clone(),
            is_local_player,
        });
        handle
    }

    fn move_toward(&mut self, handle: ActorHandle, position: GridPos, tile: &Tile) {
        self.effects.push(SceneEffect::MoveToward {
            handle,
            position,
            tile: tile.clone(),
        });
    }

    fn predict_move(&mut self, handle: ActorHandle, position: GridPos, direction: Direction) {
        self.effects.push(SceneEffect::PredictedMove {
            handle,
            position,
            direction,
        });
    }

    fn shoot(&mut self, handle: ActorHandle) {
        self.effects.push(SceneEffect::Shoot { handle });
    }

    fn destroy(&mut self, handle: ActorHandle) {
        self.effects.push(SceneEffect::Destroy { handle });
    }

    fn notify(&mut self, label: &str, position: GridPos) {
        self.effects.push(SceneEffect::Notify {
            label: label.to_string(),
            position,
        });
    }
}
