use crate::*;
pub use random::*;

mod random;

/// Builds a [`Minefield`] for a given configuration.
pub trait MinefieldGenerator {
    fn generate(self, config: GameConfig) -> Result<Minefield>;
}
