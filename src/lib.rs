#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::ops::BitOr;
use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};

pub use engine::*;
pub use error::*;
pub use generator::*;
pub use tile::*;
pub use types::*;

mod engine;
mod error;
mod generator;
mod tile;
mod types;

/// How many mines to place: an absolute count, or a fraction of the board
/// area strictly between 0 and 1.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MineSpec {
    Count(CellCount),
    Density(f64),
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub size: Coord2,
    pub mines: CellCount,
    /// Drives mine placement when present; otherwise OS entropy is used.
    pub seed: Option<u64>,
}

impl GameConfig {
    pub const fn new_unchecked(size: Coord2, mines: CellCount, seed: Option<u64>) -> Self {
        Self { size, mines, seed }
    }

    /// Resolves `mines` to an absolute count. Densities convert as
    /// `max(1, floor(density * rows * columns))`. The core rejects bad
    /// parameters instead of clamping them, that is the UI's job.
    pub fn new(size: Coord2, mines: MineSpec, seed: Option<u64>) -> Result<Self> {
        let (rows, columns) = size;
        if rows == 0 || columns == 0 {
            return Err(GameError::InvalidParameter);
        }

        let mines = match mines {
            MineSpec::Count(count) => count,
            MineSpec::Density(density) => {
                if !(density > 0.0 && density < 1.0) {
                    return Err(GameError::InvalidParameter);
                }
                // truncation is floor for positive values
                let count = (density * f64::from(mult(rows, columns))) as CellCount;
                count.max(1)
            }
        };

        Ok(Self::new_unchecked(size, mines, seed))
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }
}

/// Immutable mine placement plus precomputed adjacency counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Minefield {
    values: Array2<CellValue>,
    mine_count: CellCount,
}

impl Minefield {
    fn from_values(values: Array2<CellValue>) -> Self {
        let mine_count = values
            .iter()
            .filter(|value| value.is_mine())
            .count()
            .try_into()
            .unwrap();
        Self { values, mine_count }
    }

    /// Builds a minefield from a boolean mine mask, deriving every count
    /// with the windowed neighbor-sum pass.
    pub fn from_mine_mask(mine_mask: &Array2<bool>) -> Self {
        Self::from_values(count_windowed(mine_mask))
    }

    /// Builds a minefield from explicit mine coordinates.
    ///
    /// Panics if a coordinate is out of bounds.
    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Self {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());
        for &coords in mine_coords {
            mine_mask[coords.to_nd_index()] = true;
        }
        Self::from_values(count_linear(&mine_mask))
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            size: self.size(),
            mines: self.mine_count,
            seed: None,
        }
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.values.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn total_cells(&self) -> CellCount {
        self.values.len().try_into().unwrap()
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn value_at(&self, coords: Coord2) -> CellValue {
        self.values[coords.to_nd_index()]
    }

    pub fn contains_mine(&self, coords: Coord2) -> bool {
        self.value_at(coords).is_mine()
    }

    /// Every mine coordinate in row-major order, exactly
    /// [`mine_count`](Self::mine_count) entries.
    pub fn mine_coords(&self) -> Vec<Coord2> {
        self.values
            .indexed_iter()
            .filter(|(_, value)| value.is_mine())
            .map(|((row, col), _)| (row as Coord, col as Coord))
            .collect()
    }
}

/// Per-mine pass: mark the mines, then bump every non-mine neighbor.
fn count_linear(mine_mask: &Array2<bool>) -> Array2<CellValue> {
    let mut values: Array2<CellValue> = Array2::default(mine_mask.raw_dim());

    for ((row, col), &mine) in mine_mask.indexed_iter() {
        if mine {
            values[[row, col]] = CellValue::Mine;
        }
    }
    for ((row, col), &mine) in mine_mask.indexed_iter() {
        if !mine {
            continue;
        }
        for pos in mine_mask.iter_neighbors((row as Coord, col as Coord)) {
            if let CellValue::Count(count) = &mut values[pos.to_nd_index()] {
                *count += 1;
            }
        }
    }

    values
}

/// Whole-board pass: accumulate the eight shifted copies of the mask, then
/// put the sentinel back on mine cells. Same output as [`count_linear`],
/// only faster on large boards.
fn count_windowed(mine_mask: &Array2<bool>) -> Array2<CellValue> {
    let dim = mine_mask.raw_dim();
    let (rows, cols) = (dim[0] as isize, dim[1] as isize);

    let mut sums: Array2<u8> = Array2::zeros(dim);
    for &(drow, dcol) in DISPLACEMENTS.iter() {
        let dst = s![
            (-drow).max(0)..rows - drow.max(0),
            (-dcol).max(0)..cols - dcol.max(0)
        ];
        let src = s![
            drow.max(0)..rows + drow.min(0),
            dcol.max(0)..cols + dcol.min(0)
        ];
        sums.slice_mut(dst)
            .zip_mut_with(&mine_mask.slice(src), |sum, &mine| *sum += mine as u8);
    }

    let mut values = sums.mapv(CellValue::Count);
    values.zip_mut_with(mine_mask, |value, &mine| {
        if mine {
            *value = CellValue::Mine;
        }
    });
    values
}

/// Outcome of a flag transition.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlagOutcome {
    NoChange,
    MarkChanged,
}

impl FlagOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::MarkChanged => true,
        }
    }
}

/// Outcome of opening one or more cells.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OpenOutcome {
    NoChange,
    Safe,
    Explode,
    Win,
}

impl OpenOutcome {
    pub const fn has_update(self) -> bool {
        use OpenOutcome::*;
        match self {
            NoChange => false,
            Safe => true,
            Explode => true,
            Win => true,
        }
    }
}

/// Used to merge outcomes when a chord opens several neighbors.
impl BitOr for OpenOutcome {
    type Output = OpenOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use OpenOutcome::*;
        match (self, rhs) {
            (Explode, _) => Explode,
            (_, Explode) => Explode,
            (Win, _) => Win,
            (_, Win) => Win,
            (Safe, _) => Safe,
            (_, Safe) => Safe,
            (NoChange, NoChange) => NoChange,
        }
    }
}
