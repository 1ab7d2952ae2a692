//! Optimistic movement ahead of chain confirmation

use tracing::{debug, warn};

use super::board::{BoardSnapshot, Direction, GridPos, TileState};
use super::registry::ActorRegistry;
use super::scene::Scene;
use super::{Identity, SyncError};

/// Next cell in `direction`, clamped to the board; no wraparound
///
/// Positions are in world convention (`y <= 0`). Up checks `|y| > 0` while
/// Left/Right compare signed `x`. On the board both read the same, but the
/// asymmetry is probably accidental and is kept as-is.
pub fn step(position: GridPos, direction: Direction, side: usize) -> GridPos {
    let last = side as i32 - 1;
    let mut next = position;
    match direction {
        Direction::Up => {
            if next.y.abs() > 0 {
                next.y += 1;
            }
        }
        Direction::Right => {
            if next.x < last {
                next.x += 1;
            }
        }
        Direction::Down => {
            if next.y.abs() < last {
                next.y -= 1;
            }
        }
        Direction::Left => {
            if next.x > 0 {
                next.x -= 1;
            }
        }
    }
    next
}

/// Move `owner`'s ship one cell if the latest snapshot shows the target empty
///
/// Returns the ship's position after the call. A blocked move returns the
/// unchanged position and mutates nothing. A move clamped at the edge targets
/// the current cell, so it commits only when the snapshot has not yet placed
/// the ship there (a predicted cell still showing Empty).
pub fn predict_movement<S: Scene + ?Sized>(
    registry: &mut ActorRegistry,
    snapshot: &mut BoardSnapshot,
    scene: &mut S,
    owner: &Identity,
    direction: Direction,
) -> Result<GridPos, SyncError> {
    let ship = registry
        .find_ship_by_owner_mut(owner)
        .ok_or_else(|| SyncError::ActorNotFound(owner.clone()))?;

    let current = ship.last_grid_position;
    let candidate = step(current, direction, snapshot.side());

    let (new_x, new_y) = board_cell(snapshot, candidate)?;
    let (cur_x, cur_y) = board_cell(snapshot, current)?;

    let target_state = snapshot
        .tile(new_x, new_y)
        .map(|t| t.state)
        .ok_or(SyncError::OutOfBoard {
            x: candidate.x,
            y: candidate.y,
        })?;

    debug!(
        owner = %owner,
        ?direction,
        from = %current,
        to = %candidate,
        target_state = ?target_state,
        "Predicting move"
    );

    if target_state != TileState::Empty {
        return Ok(current);
    }

    ship.last_grid_position = candidate;
    ship.facing = direction;
    scene.predict_move(ship.handle, candidate, direction);

    // Local annotation only; never sent back to the chain
    if let Some(vacated) = snapshot.tile_mut(cur_x, cur_y) {
        vacated.look_direction = direction;
    }

    Ok(candidate)
}

fn board_cell(snapshot: &BoardSnapshot, position: GridPos) -> Result<(usize, usize), SyncError> {
    position
        .to_board()
        .filter(|&(x, y)| snapshot.tile(x, y).is_some())
        .ok_or_else(|| {
            warn!(position = %position, side = snapshot.side(), "Ship position outside board");
            SyncError::OutOfBoard {
                x: position.x,
                y: position.y,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Tile;
    use crate::game::reconcile::reconcile;
    use crate::game::scene::{EffectScene, SceneEffect};

    const N: usize = 10;

    struct Fixture {
        registry: ActorRegistry,
        board: BoardSnapshot,
        scene: EffectScene,
        owner: Identity,
    }

    /// One ship owned by "A" at board cell (x, y), already reconciled
    fn fixture(x: usize, y: usize) -> Fixture {
        let owner = Identity::new("A");
        let mut board = BoardSnapshot::empty(N);
        board.set(x, y, Tile::player(owner.clone(), Direction::Up));
        let mut registry = ActorRegistry::new();
        let mut scene = EffectScene::new();
        reconcile(&board, &mut registry, &mut scene, &owner);
        scene.drain();
        Fixture {
            registry,
            board,
            scene,
            owner,
        }
    }

    impl Fixture {
        fn predict(&mut self, direction: Direction) -> Result<GridPos, SyncError> {
            predict_movement(
                &mut self.registry,
                &mut self.board,
                &mut self.scene,
                &self.owner,
                direction,
            )
        }

        fn position(&self) -> GridPos {
            self.registry.ship(&self.owner).unwrap().last_grid_position
        }
    }

    #[test]
    fn right_into_empty_cell_commits_and_stamps_vacated_tile() {
        let mut f = fixture(3, 4);

        let moved = f.predict(Direction::Right).unwrap();

        assert_eq!(moved, GridPos::new(4, -4));
        assert_eq!(f.position(), GridPos::new(4, -4));
        assert_eq!(f.registry.ship(&f.owner).unwrap().facing, Direction::Right);
        assert_eq!(f.board.tile(3, 4).unwrap().look_direction, Direction::Right);
        let handle = f.registry.ship(&f.owner).unwrap().handle;
        assert_eq!(
            f.scene.effects(),
            &[SceneEffect::PredictedMove {
                handle,
                position: GridPos::new(4, -4),
                direction: Direction::Right,
            }]
        );
    }

    #[test]
    fn right_at_last_column_does_not_move() {
        let mut f = fixture(N - 1, 2);
        assert_eq!(f.predict(Direction::Right).unwrap(), GridPos::new(9, -2));
        assert_eq!(f.position(), GridPos::new(9, -2));
        assert!(f.scene.effects().is_empty());
    }

    #[test]
    fn left_at_first_column_does_not_move() {
        let mut f = fixture(0, 5);
        assert_eq!(f.predict(Direction::Left).unwrap(), GridPos::new(0, -5));
        assert_eq!(f.position(), GridPos::new(0, -5));
        assert!(f.scene.effects().is_empty());
    }

    #[test]
    fn up_is_blocked_on_top_row_and_down_on_bottom_row() {
        let mut top = fixture(4, 0);
        assert_eq!(top.predict(Direction::Up).unwrap(), GridPos::new(4, 0));

        let mut bottom = fixture(4, N - 1);
        assert_eq!(bottom.predict(Direction::Down).unwrap(), GridPos::new(4, -9));
    }

    #[test]
    fn up_and_down_move_across_rows() {
        let mut f = fixture(4, 4);
        assert_eq!(f.predict(Direction::Up).unwrap(), GridPos::new(4, -3));
        assert_eq!(f.predict(Direction::Up).unwrap(), GridPos::new(4, -2));
        assert_eq!(f.predict(Direction::Down).unwrap(), GridPos::new(4, -3));
        // The snapshot still holds the ship at its confirmed cell
        assert_eq!(f.predict(Direction::Down).unwrap(), GridPos::new(4, -3));
    }

    #[test]
    fn clamped_move_on_unconfirmed_cell_turns_the_ship() {
        let mut f = fixture(N - 1, 4);
        assert_eq!(f.predict(Direction::Down).unwrap(), GridPos::new(9, -5));
        f.scene.drain();

        // (9, 5) is still Empty in the snapshot, so the clamped Right commits
        assert_eq!(f.predict(Direction::Right).unwrap(), GridPos::new(9, -5));

        let ship = f.registry.ship(&f.owner).unwrap();
        assert_eq!(ship.facing, Direction::Right);
        assert_eq!(f.board.tile(9, 5).unwrap().look_direction, Direction::Right);
        assert_eq!(
            f.scene.effects(),
            &[SceneEffect::PredictedMove {
                handle: ship.handle,
                position: GridPos::new(9, -5),
                direction: Direction::Right,
            }]
        );
    }

    #[test]
    fn clamped_move_on_confirmed_cell_changes_nothing() {
        let mut f = fixture(N - 1, 4);
        assert_eq!(f.predict(Direction::Right).unwrap(), GridPos::new(9, -4));
        assert_eq!(f.registry.ship(&f.owner).unwrap().facing, Direction::Up);
        assert_eq!(f.board.tile(9, 4).unwrap().look_direction, Direction::Up);
        assert!(f.scene.effects().is_empty());
    }

    #[test]
    fn occupied_target_is_rejected_without_mutation() {
        let mut f = fixture(3, 4);
        f.board.set(4, 4, Tile::chest());

        assert_eq!(f.predict(Direction::Right).unwrap(), GridPos::new(3, -4));
        assert_eq!(f.position(), GridPos::new(3, -4));
        assert_eq!(f.board.tile(3, 4).unwrap().look_direction, Direction::Up);
        assert!(f.scene.effects().is_empty());
    }

    #[test]
    fn repeated_calls_advance_one_step_each() {
        let mut f = fixture(1, 1);
        f.predict(Direction::Right).unwrap();
        f.predict(Direction::Right).unwrap();
        assert_eq!(f.position(), GridPos::new(3, -1));
    }

    #[test]
    fn unknown_owner_reports_not_found_and_changes_nothing() {
        let mut f = fixture(2, 2);
        let stranger = Identity::new("nobody");

        let result = predict_movement(
            &mut f.registry,
            &mut f.board,
            &mut f.scene,
            &stranger,
            Direction::Right,
        );

        assert_eq!(result, Err(SyncError::ActorNotFound(stranger)));
        assert_eq!(f.position(), GridPos::new(2, -2));
        assert_eq!(f.registry.ship_count(), 1);
        assert!(f.scene.effects().is_empty());
    }

    #[test]
    fn next_snapshot_overrides_prediction() {
        let mut f = fixture(3, 4);
        f.predict(Direction::Right).unwrap();

        // Chain rejected the move: ship still at (3, 4)
        let board = f.board.clone();
        reconcile(&board, &mut f.registry, &mut f.scene, &f.owner);

        assert_eq!(f.position(), GridPos::new(3, -4));
    }

    #[test]
    fn smaller_snapshot_than_ship_position_is_out_of_board() {
        let mut f = fixture(2, 0);
        f.board = BoardSnapshot::empty(2);

        assert_eq!(
            f.predict(Direction::Down),
            Err(SyncError::OutOfBoard { x: 2, y: -1 })
        );
        assert_eq!(f.position(), GridPos::new(2, 0));
    }

    #[test]
    fn step_table() {
        let cases = [
            (GridPos::new(0, 0), Direction::Up, GridPos::new(0, 0)),
            (GridPos::new(0, -1), Direction::Up, GridPos::new(0, 0)),
            (GridPos::new(0, -9), Direction::Down, GridPos::new(0, -9)),
            (GridPos::new(0, -8), Direction::Down, GridPos::new(0, -9)),
            (GridPos::new(9, 0), Direction::Right, GridPos::new(9, 0)),
            (GridPos::new(0, 0), Direction::Left, GridPos::new(0, 0)),
        ];
        for (from, direction, expected) in cases {
            assert_eq!(step(from, direction, N), expected, "{:?} from {}", direction, from);
        }
    }
}
