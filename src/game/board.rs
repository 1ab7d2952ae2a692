//! Board snapshot types: tiles, directions and coordinate conventions
//!
//! The chain stores the board column-major (`tiles[x][y]`). Board row `y`
//! is drawn at world `-y`, so every world-space position on the board has
//! `y <= 0`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Identity, SyncError};

/// Occupancy of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum TileState {
    Empty,
    Player,
    Chest,
    /// A state this client does not render (kept so the byte survives a round trip)
    Other(u8),
}

pub const STATE_EMPTY: u8 = 0;
pub const STATE_PLAYER: u8 = 1;
pub const STATE_CHEST: u8 = 2;

impl From<u8> for TileState {
    fn from(raw: u8) -> Self {
        match raw {
            STATE_EMPTY => Self::Empty,
            STATE_PLAYER => Self::Player,
            STATE_CHEST => Self::Chest,
            other => Self::Other(other),
        }
    }
}

impl From<TileState> for u8 {
    fn from(state: TileState) -> Self {
        match state {
            TileState::Empty => STATE_EMPTY,
            TileState::Player => STATE_PLAYER,
            TileState::Chest => STATE_CHEST,
            TileState::Other(raw) => raw,
        }
    }
}

/// Movement / facing direction, encoded on chain as a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl TryFrom<u8> for Direction {
    type Error = SyncError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Up),
            1 => Ok(Self::Right),
            2 => Ok(Self::Down),
            3 => Ok(Self::Left),
            other => Err(SyncError::InvalidDirection(other)),
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }
}

/// One cell of the on-chain board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub state: TileState,
    #[serde(default)]
    pub player: Identity,
    #[serde(default)]
    pub look_direction: Direction,
}

impl Tile {
    pub fn empty() -> Self {
        Self {
            state: TileState::Empty,
            player: Identity::empty(),
            look_direction: Direction::Up,
        }
    }

    #[cfg(test)]
    pub fn player(owner: Identity, look_direction: Direction) -> Self {
        Self {
            state: TileState::Player,
            player: owner,
            look_direction,
        }
    }

    pub fn chest() -> Self {
        Self {
            state: TileState::Chest,
            ..Self::empty()
        }
    }
}

/// Malformed board payloads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Board has no columns")]
    Empty,

    #[error("Board is not square: {columns} columns but column {column} has {len} tiles")]
    NotSquare {
        columns: usize,
        column: usize,
        len: usize,
    },
}

/// Full N x N board as last reported by the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Tile>>", into = "Vec<Vec<Tile>>")]
pub struct BoardSnapshot {
    /// Column-major: `tiles[x][y]`
    tiles: Vec<Vec<Tile>>,
}

impl BoardSnapshot {
    /// Build a snapshot from chain-ordered columns. Only the shape is checked.
    pub fn from_columns(tiles: Vec<Vec<Tile>>) -> Result<Self, BoardError> {
        let columns = tiles.len();
        if columns == 0 {
            return Err(BoardError::Empty);
        }
        if let Some((column, col)) = tiles.iter().enumerate().find(|(_, c)| c.len() != columns) {
            return Err(BoardError::NotSquare {
                columns,
                column,
                len: col.len(),
            });
        }
        Ok(Self { tiles })
    }

    /// All-empty board of side `n`
    #[cfg(test)]
    pub fn empty(n: usize) -> Self {
        Self {
            tiles: vec![vec![Tile::empty(); n]; n],
        }
    }

    /// Side length N
    pub fn side(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<&Tile> {
        self.tiles.get(x).and_then(|col| col.get(y))
    }

    pub fn tile_mut(&mut self, x: usize, y: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(x).and_then(|col| col.get_mut(y))
    }

    /// Replace one cell. Out-of-range writes are ignored.
    #[cfg(test)]
    pub fn set(&mut self, x: usize, y: usize, tile: Tile) {
        if let Some(slot) = self.tile_mut(x, y) {
            *slot = tile;
        }
    }

    /// Every cell in scan order: rows (`y`) outer, columns (`x`) inner
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &Tile)> + '_ {
        let n = self.side();
        (0..n).flat_map(move |y| (0..n).map(move |x| (x, y, &self.tiles[x][y])))
    }
}

impl TryFrom<Vec<Vec<Tile>>> for BoardSnapshot {
    type Error = BoardError;

    fn try_from(tiles: Vec<Vec<Tile>>) -> Result<Self, Self::Error> {
        Self::from_columns(tiles)
    }
}

impl From<BoardSnapshot> for Vec<Vec<Tile>> {
    fn from(board: BoardSnapshot) -> Self {
        board.tiles
    }
}

/// Integer position in world convention (`y` is the negated board row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position of board cell `(x, y)`
    pub fn from_board(x: usize, y: usize) -> Self {
        Self::new(x as i32, -(y as i32))
    }

    /// Board indices `(x, -y)`, or `None` when the position lies off the board's quadrant
    pub fn to_board(self) -> Option<(usize, usize)> {
        let x = usize::try_from(self.x).ok()?;
        let y = usize::try_from(self.y.checked_neg()?).ok()?;
        Some((x, y))
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Registry key for a chest: the board cell, rendered as `x_y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChestKey {
    pub x: usize,
    pub y: usize,
}

impl ChestKey {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ChestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.x, self.y)
    }
}

impl FromStr for ChestKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once('_')
            .ok_or_else(|| format!("chest key `{}` is not of the form x_y", s))?;
        let x = x.parse().map_err(|_| format!("bad column in chest key `{}`", s))?;
        let y = y.parse().map_err(|_| format!("bad row in chest key `{}`", s))?;
        Ok(Self { x, y })
    }
}
