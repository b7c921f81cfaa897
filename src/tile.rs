use serde::{Deserialize, Serialize};

/// Immutable contents of a single minefield cell.
///
/// The enum is the mine sentinel: a mine is distinct from every valid
/// adjacency count by construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    Mine,
    /// Number of mines in the 8-neighborhood, `0..=8`.
    Count(u8),
}

impl CellValue {
    pub const fn is_mine(self) -> bool {
        matches!(self, Self::Mine)
    }

    pub const fn count(self) -> Option<u8> {
        match self {
            Self::Mine => None,
            Self::Count(count) => Some(count),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::Count(0)
    }
}

/// Player-visible state of a cell while the game is running.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayTile {
    Closed,
    Open(u8),
    Flag,
}

impl PlayTile {
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl Default for PlayTile {
    fn default() -> Self {
        Self::Closed
    }
}

/// Renderer-facing value of a cell, including the end-of-game reveals that
/// never feed back into game logic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileView {
    Closed,
    Open(u8),
    Flag,
    Mine,
    IncorrectFlag,
}

impl TileView {
    /// Whether the tile is visually closed.
    pub const fn is_closed(self) -> bool {
        use TileView::*;
        match self {
            Closed => true,
            Open(_) => false,
            Flag => true,
            Mine => false,
            IncorrectFlag => true,
        }
    }
}

impl From<PlayTile> for TileView {
    fn from(other: PlayTile) -> Self {
        match other {
            PlayTile::Closed => TileView::Closed,
            PlayTile::Open(count) => TileView::Open(count),
            PlayTile::Flag => TileView::Flag,
        }
    }
}

impl Default for TileView {
    fn default() -> Self {
        Self::Closed
    }
}
