//! The sync session: single owner of the registry and the latest board
//!
//! Events arrive on an mpsc queue and are applied one at a time. The
//! effects each event produced go out as one broadcast batch. Peers that
//! join late or fall behind ask for a resync: a spawn for every live actor,
//! tagged with the last batch it covers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::ws::protocol::ServerMsg;

use super::board::{BoardSnapshot, Direction, Tile};
use super::predict::predict_movement;
use super::reconcile::reconcile;
use super::registry::ActorRegistry;
use super::scene::{ActorHandle, ActorKind, EffectScene, Scene, SceneEffect};
use super::{Identity, SyncError};

/// Inbound notifications driving the session
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A fresh full board from the chain
    BoardChanged(BoardSnapshot),
    /// The chain reports `owner`'s ship fired
    ShipShot(Identity),
    /// Local steering input
    DirectionInput { owner: Identity, direction: Direction },
}

/// Counters mirrored out of the session for reporting
#[derive(Debug, Default)]
pub struct SessionStats {
    pub ships: AtomicUsize,
    pub chests: AtomicUsize,
    pub events_applied: AtomicU64,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<SyncEvent>,
    pub effect_tx: broadcast::Sender<ServerMsg>,
    pub resync_tx: mpsc::Sender<oneshot::Sender<ServerMsg>>,
    pub stats: Arc<SessionStats>,
    pub local_identity: Identity,
}

impl SessionHandle {
    pub fn ship_count(&self) -> usize {
        self.stats.ships.load(Ordering::Relaxed)
    }

    pub fn chest_count(&self) -> usize {
        self.stats.chests.load(Ordering::Relaxed)
    }

    pub fn events_applied(&self) -> u64 {
        self.stats.events_applied.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.effect_tx.subscribe()
    }

    /// Current actors as a `resync` message; `None` once the session stopped
    ///
    /// Subscribe first: batches with a `seq` at or below the returned one
    /// are already covered by the resync.
    pub async fn request_resync(&self) -> Option<ServerMsg> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.resync_tx.send(reply_tx).await.ok()?;
        reply_rx.await.ok()
    }
}

/// Fire `owner`'s ship if one is registered under that key
pub fn dispatch_shot<S: Scene + ?Sized>(
    registry: &ActorRegistry,
    scene: &mut S,
    owner: &Identity,
) -> Result<ActorHandle, SyncError> {
    let ship = registry
        .find_ship_by_owner(owner)
        .ok_or_else(|| SyncError::ActorNotFound(owner.clone()))?;
    scene.shoot(ship.handle);
    Ok(ship.handle)
}

pub struct SyncSession {
    local_identity: Identity,
    registry: ActorRegistry,
    latest: Option<BoardSnapshot>,
    scene: EffectScene,
    event_rx: mpsc::Receiver<SyncEvent>,
    resync_rx: mpsc::Receiver<oneshot::Sender<ServerMsg>>,
    effect_tx: broadcast::Sender<ServerMsg>,
    stats: Arc<SessionStats>,
    seq: u64,
}

impl SyncSession {
    /// Create a session and the handle used to feed it
    pub fn new(local_identity: Identity, queue_capacity: usize) -> (Self, SessionHandle) {
        let (event_tx, event_rx) = mpsc::channel(queue_capacity.max(1));
        let (effect_tx, _) = broadcast::channel(64);
        let (resync_tx, resync_rx) = mpsc::channel(16);
        let stats = Arc::new(SessionStats::default());

        let handle = SessionHandle {
            event_tx,
            effect_tx: effect_tx.clone(),
            resync_tx,
            stats: stats.clone(),
            local_identity: local_identity.clone(),
        };

        let session = Self {
            local_identity,
            registry: ActorRegistry::new(),
            latest: None,
            scene: EffectScene::new(),
            event_rx,
            resync_rx,
            effect_tx,
            stats,
            seq: 0,
        };

        (session, handle)
    }

    #[cfg(test)]
    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn latest_snapshot(&self) -> Option<&BoardSnapshot> {
        self.latest.as_ref()
    }

    /// Apply one event and return the scene effects it produced
    pub fn handle_event(&mut self, event: SyncEvent) -> Vec<SceneEffect> {
        match event {
            SyncEvent::BoardChanged(board) => {
                let board = self.latest.insert(board);
                let report =
                    reconcile(board, &mut self.registry, &mut self.scene, &self.local_identity);
                if !report.is_stable() {
                    info!(
                        ships = self.registry.ship_count(),
                        chests = self.registry.chest_count(),
                        "Actor set changed"
                    );
                }
            }
            SyncEvent::ShipShot(owner) => {
                if let Err(e) = dispatch_shot(&self.registry, &mut self.scene, &owner) {
                    info!(owner = %owner, error = %e, "Shot for unknown ship ignored");
                }
            }
            SyncEvent::DirectionInput { owner, direction } => {
                if let Err(e) = self.predict(&owner, direction) {
                    self.log_prediction_error(&owner, e);
                }
            }
        }

        self.stats.ships.store(self.registry.ship_count(), Ordering::Relaxed);
        self.stats.chests.store(self.registry.chest_count(), Ordering::Relaxed);
        self.stats.events_applied.fetch_add(1, Ordering::Relaxed);

        self.scene.drain()
    }

    /// A spawn for every live actor, covering batches up to the current `seq`
    pub fn resync(&self) -> ServerMsg {
        let ships = self.registry.ships().map(|(_, ship)| {
            let mut tile = ship.current_tile.clone();
            tile.look_direction = ship.facing;
            SceneEffect::Spawn {
                handle: ship.handle,
                kind: ActorKind::Ship,
                position: ship.last_grid_position,
                tile,
                is_local_player: ship.is_local_player,
            }
        });
        let chests = self.registry.chests().map(|(_, chest)| SceneEffect::Spawn {
            handle: chest.handle,
            kind: ActorKind::Chest,
            position: chest.position,
            tile: Tile::chest(),
            is_local_player: false,
        });

        ServerMsg::Resync {
            seq: self.seq,
            effects: ships.chain(chests).collect(),
        }
    }

    fn predict(&mut self, owner: &Identity, direction: Direction) -> Result<(), SyncError> {
        let board = self.latest.as_mut().ok_or(SyncError::BoardNotLoaded)?;
        predict_movement(&mut self.registry, board, &mut self.scene, owner, direction)?;
        Ok(())
    }

    fn log_prediction_error(&self, owner: &Identity, error: SyncError) {
        match error {
            SyncError::ActorNotFound(_) => {
                info!(owner = %owner, "Could not find player ship for direction input");
            }
            SyncError::BoardNotLoaded => {
                debug!(owner = %owner, "Direction input before first board, ignoring");
            }
            other => {
                warn!(owner = %owner, error = %other, "Prediction skipped");
            }
        }
    }

    fn publish(&mut self, effects: Vec<SceneEffect>) {
        if effects.is_empty() {
            return;
        }

        self.seq += 1;
        // No subscribers is fine; effects are fire-and-forget
        let _ = self.effect_tx.send(ServerMsg::Effects {
            seq: self.seq,
            effects,
        });
    }

    /// Drain events until every sender is dropped
    pub async fn run(mut self) {
        info!(local_identity = %self.local_identity, "Sync session started");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(event) => {
                        let effects = self.handle_event(event);
                        self.publish(effects);
                    }
                    None => break,
                },
                Some(reply) = self.resync_rx.recv() => {
                    debug!(seq = self.seq, "Resync requested");
                    let _ = reply.send(self.resync());
                }
            }
        }

        info!(
            ships = self.registry.ship_count(),
            chests = self.registry.chest_count(),
            "Event channel closed, sync session stopped"
        );
    }
}
