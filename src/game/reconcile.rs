//! Board-to-actor reconciliation
//!
//! Each pass scans the whole snapshot. Ships are spawned or retargeted,
//! chests are spawned, and afterwards every actor whose key no longer
//! appears on the board is destroyed.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::board::{BoardSnapshot, ChestKey, GridPos, TileState};
use super::registry::{ActorRegistry, ChestActor, ShipActor};
use super::scene::{ActorKind, Scene};
use super::{Identity, IdentitySource};

/// Label shown over a ship that left the board
pub const DESTROYED_LABEL: &str = "Destroyed";

/// What a reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub ships_spawned: usize,
    pub ships_retargeted: usize,
    pub ships_removed: usize,
    pub chests_spawned: usize,
    pub chests_removed: usize,
}

impl ReconcileReport {
    /// True when the registry's key sets did not change
    pub fn is_stable(&self) -> bool {
        self.ships_spawned == 0
            && self.ships_removed == 0
            && self.chests_spawned == 0
            && self.chests_removed == 0
    }
}

/// Bring `registry` in line with `snapshot`
pub fn reconcile<S, I>(
    snapshot: &BoardSnapshot,
    registry: &mut ActorRegistry,
    scene: &mut S,
    identity: &I,
) -> ReconcileReport
where
    S: Scene + ?Sized,
    I: IdentitySource + ?Sized,
{
    let mut report = ReconcileReport::default();
    let mut players_on_board: BTreeSet<Identity> = BTreeSet::new();
    let mut chests_on_board: BTreeSet<ChestKey> = BTreeSet::new();

    for (x, y, tile) in snapshot.cells() {
        let position = GridPos::from_board(x, y);

        match tile.state {
            TileState::Player => {
                players_on_board.insert(tile.player.clone());

                if let Some(ship) = registry.ship_mut(&tile.player) {
                    ship.set_target(position, tile.clone());
                    scene.move_toward(ship.handle, position, tile);
                    report.ships_retargeted += 1;
                } else {
                    let is_local_player = tile.player == identity.local_identity();
                    let handle = scene.spawn(ActorKind::Ship, position, tile, is_local_player);
                    info!(
                        owner = %tile.player,
                        handle = %handle,
                        position = %position,
                        is_local_player,
                        "Spawned ship"
                    );
                    registry.insert_ship(
                        tile.player.clone(),
                        ShipActor::new(handle, position, tile.clone(), is_local_player),
                    );
                    report.ships_spawned += 1;
                }
            }
            TileState::Chest => {
                let key = ChestKey::new(x, y);
                chests_on_board.insert(key);

                if registry.chest(&key).is_none() {
                    let handle = scene.spawn(ActorKind::Chest, position, tile, false);
                    debug!(key = %key, handle = %handle, "Spawned chest");
                    registry.insert_chest(key, ChestActor { handle, position });
                    report.chests_spawned += 1;
                }
            }
            TileState::Empty | TileState::Other(_) => {}
        }
    }

    report.ships_removed = remove_missing_ships(registry, scene, &players_on_board);
    report.chests_removed = remove_missing_chests(registry, scene, &chests_on_board);

    debug!(?report, side = snapshot.side(), "Reconciled board");
    report
}

fn remove_missing_ships<S: Scene + ?Sized>(
    registry: &mut ActorRegistry,
    scene: &mut S,
    players_on_board: &BTreeSet<Identity>,
) -> usize {
    let dead: Vec<Identity> = registry
        .ships()
        .filter(|(owner, _)| !players_on_board.contains(*owner))
        .map(|(owner, _)| owner.clone())
        .collect();

    for owner in &dead {
        if let Some(ship) = registry.remove_ship(owner) {
            scene.notify(DESTROYED_LABEL, ship.last_grid_position);
            scene.destroy(ship.handle);
            info!(owner = %owner, handle = %ship.handle, "Ship left the board");
        }
    }

    dead.len()
}

fn remove_missing_chests<S: Scene + ?Sized>(
    registry: &mut ActorRegistry,
    scene: &mut S,
    chests_on_board: &BTreeSet<ChestKey>,
) -> usize {
    let dead: Vec<ChestKey> = registry
        .chests()
        .filter(|(key, _)| !chests_on_board.contains(*key))
        .map(|(key, _)| *key)
        .collect();

    for key in &dead {
        if let Some(chest) = registry.remove_chest(key) {
            scene.destroy(chest.handle);
            debug!(key = %key, handle = %chest.handle, "Chest removed");
        }
    }

    dead.len()
}
