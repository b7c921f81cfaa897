use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Mine parameter is neither a count nor a density inside (0, 1)")]
    InvalidParameter,
    #[error("Not enough cells outside the safe zone for the requested mines")]
    InsufficientSpace,
}

pub type Result<T> = core::result::Result<T, GameError>;
