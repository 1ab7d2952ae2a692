//! Live actors mirrored from the board

use std::collections::BTreeMap;

use super::board::{ChestKey, Direction, GridPos, Tile};
use super::scene::ActorHandle;
use super::Identity;

/// A spawned ship
#[derive(Debug, Clone, PartialEq)]
pub struct ShipActor {
    pub handle: ActorHandle,
    /// Tile data the ship was last placed from
    pub current_tile: Tile,
    /// Last committed position; prediction advances it ahead of the chain
    pub last_grid_position: GridPos,
    /// Last position reported by the chain
    pub target_position: GridPos,
    pub facing: Direction,
    pub is_local_player: bool,
}

impl ShipActor {
    pub fn new(handle: ActorHandle, position: GridPos, tile: Tile, is_local_player: bool) -> Self {
        Self {
            handle,
            facing: tile.look_direction,
            current_tile: tile,
            last_grid_position: position,
            target_position: position,
            is_local_player,
        }
    }

    /// Adopt a fresh authoritative position, discarding any prediction
    pub fn set_target(&mut self, position: GridPos, tile: Tile) {
        self.target_position = position;
        self.last_grid_position = position;
        self.facing = tile.look_direction;
        self.current_tile = tile;
    }

    pub fn owner(&self) -> &Identity {
        &self.current_tile.player
    }
}

/// A spawned treasure chest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestActor {
    pub handle: ActorHandle,
    pub position: GridPos,
}

/// Ships keyed by owner, chests keyed by cell
///
/// Ordered maps keep removal and iteration order stable across runs.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    ships: BTreeMap<Identity, ShipActor>,
    chests: BTreeMap<ChestKey, ChestActor>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the ship whose tile names `owner` as its player
    pub fn find_ship_by_owner(&self, owner: &Identity) -> Option<&ShipActor> {
        self.ships.values().find(|ship| ship.owner() == owner)
    }

    pub fn find_ship_by_owner_mut(&mut self, owner: &Identity) -> Option<&mut ShipActor> {
        self.ships.values_mut().find(|ship| ship.owner() == owner)
    }

    /// Direct key lookup
    #[cfg(test)]
    pub fn ship(&self, owner: &Identity) -> Option<&ShipActor> {
        self.ships.get(owner)
    }

    pub fn chest(&self, key: &ChestKey) -> Option<&ChestActor> {
        self.chests.get(key)
    }

    pub fn ships(&self) -> impl Iterator<Item = (&Identity, &ShipActor)> {
        self.ships.iter()
    }

    pub fn chests(&self) -> impl Iterator<Item = (&ChestKey, &ChestActor)> {
        self.chests.iter()
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    pub fn chest_count(&self) -> usize {
        self.chests.len()
    }

    pub(super) fn ship_mut(&mut self, owner: &Identity) -> Option<&mut ShipActor> {
        self.ships.get_mut(owner)
    }

    pub(super) fn insert_ship(&mut self, owner: Identity, ship: ShipActor) {
        self.ships.insert(owner, ship);
    }

    pub(super) fn remove_ship(&mut self, owner: &Identity) -> Option<ShipActor> {
        self.ships.remove(owner)
    }

    pub(super) fn insert_chest(&mut self, key: ChestKey, chest: ChestActor) {
        self.chests.insert(key, chest);
    }

    pub(super) fn remove_chest(&mut self, key: &ChestKey) -> Option<ChestActor> {
        self.chests.remove(key)
    }
}
