use alloc::vec::Vec;
use ndarray::Array2;
use smallvec::SmallVec;

use super::*;

/// Uniform random placement that keeps the starting cell and its whole
/// neighborhood mine-free, so the first click never detonates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomMinefieldGenerator {
    start: Coord2,
}

impl RandomMinefieldGenerator {
    pub const fn new(start: Coord2) -> Self {
        Self { start }
    }
}

impl MinefieldGenerator for RandomMinefieldGenerator {
    fn generate(self, config: GameConfig) -> Result<Minefield> {
        use rand::prelude::*;

        let (_, columns) = config.size;
        let mut mine_mask: Array2<bool> = Array2::default(config.size.to_nd_index());

        // safe zone: the starting cell plus its clipped 8-neighborhood
        let mut safe_zone: SmallVec<[CellCount; 9]> = SmallVec::new();
        safe_zone.push(to_flat(self.start, columns));
        safe_zone.extend(
            mine_mask
                .iter_neighbors(self.start)
                .map(|pos| to_flat(pos, columns)),
        );

        let total = config.total_cells();
        let capacity = total - safe_zone.len() as CellCount;
        if config.mines > capacity {
            return Err(GameError::InsufficientSpace);
        }

        // draw distinct flat indices without replacement from the complement
        // of the safe zone
        let candidates: Vec<CellCount> = (0..total)
            .filter(|index| !safe_zone.contains(index))
            .collect();
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => rand::make_rng::<SmallRng>(),
        };
        for chosen in rand::seq::index::sample(&mut rng, candidates.len(), config.mines.into()) {
            mine_mask[from_flat(candidates[chosen], columns).to_nd_index()] = true;
        }

        log::debug!(
            "placed {} mines on a {}x{} board, start {:?}, seed {:?}",
            config.mines,
            config.size.0,
            config.size.1,
            self.start,
            config.seed,
        );

        Ok(Minefield::from_mine_mask(&mine_mask))
    }
}
