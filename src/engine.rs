use alloc::collections::VecDeque;
use alloc::{vec, vec::Vec};
use core::ops::BitOr;
use hashbrown::HashSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::*;

/// Valid transitions:
/// - NotStarted -> Playing (first effective open, builds the minefield)
/// - Playing -> Won
/// - Playing -> Lost
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameState {
    NotStarted,
    Playing,
    Won,
    Lost,
}

impl GameState {
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub const fn is_final(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Delta produced by one mutating call: the resulting game state plus every
/// cell whose visible value changed, so a renderer can repaint only those.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub state: GameState,
    pub cells: Vec<(Coord2, TileView)>,
}

impl Update {
    fn unchanged(state: GameState) -> Self {
        Self {
            state,
            cells: Vec::new(),
        }
    }

    pub fn has_update(&self) -> bool {
        !self.cells.is_empty()
    }
}

/// Represents a game from start to finish.
///
/// The minefield does not exist until the first effective open: placement is
/// deferred so the first opened cell and its neighborhood can be kept
/// mine-free.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    config: GameConfig,
    minefield: Option<Minefield>,
    board: Array2<PlayTile>,
    open_count: CellCount,
    flag_count: CellCount,
    state: GameState,
    triggered_mine: Option<Coord2>,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            minefield: None,
            board: Array2::default(config.size.to_nd_index()),
            open_count: 0,
            flag_count: 0,
            state: Default::default(),
            triggered_mine: None,
        }
    }

    /// Starts a game over a pre-built minefield, skipping generation on the
    /// first open. Used for restores and fixed test boards.
    pub fn from_minefield(minefield: Minefield) -> Self {
        let config = minefield.game_config();
        Self {
            minefield: Some(minefield),
            ..Self::new(config)
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_final()
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn size(&self) -> Coord2 {
        self.config.size
    }

    pub fn total_mines(&self) -> CellCount {
        self.config.mines
    }

    /// How many mines have not been flagged yet. Negative with excess flags.
    pub fn mines_left(&self) -> isize {
        (self.config.mines as isize) - (self.flag_count as isize)
    }

    pub fn is_opened(&self, coords: Coord2) -> bool {
        self.board[coords.to_nd_index()].is_open()
    }

    pub fn is_flagged(&self, coords: Coord2) -> bool {
        self.board[coords.to_nd_index()] == PlayTile::Flag
    }

    /// The minefield value under `coords`, visible once the cell is opened
    /// or the game has ended.
    pub fn value_at(&self, coords: Coord2) -> Option<CellValue> {
        match self.board[coords.to_nd_index()] {
            PlayTile::Open(count) => Some(CellValue::Count(count)),
            _ if self.state.is_final() => {
                self.minefield.as_ref().map(|field| field.value_at(coords))
            }
            _ => None,
        }
    }

    /// Renderer-facing view of a cell. After a loss this folds in the
    /// terminal reveal: unopened mines show as [`TileView::Mine`] and wrong
    /// flags as [`TileView::IncorrectFlag`].
    pub fn tile_at(&self, coords: Coord2) -> TileView {
        let tile = self.board[coords.to_nd_index()];
        if let (GameState::Lost, Some(minefield)) = (self.state, &self.minefield) {
            let mine = minefield.contains_mine(coords);
            match tile {
                PlayTile::Closed if mine => return TileView::Mine,
                PlayTile::Flag if !mine => return TileView::IncorrectFlag,
                _ => {}
            }
        }
        tile.into()
    }

    pub fn triggered_mine(&self) -> Option<Coord2> {
        self.triggered_mine
    }

    /// Every mine coordinate. Empty until the game has ended.
    pub fn mine_coords(&self) -> Vec<Coord2> {
        match &self.minefield {
            Some(minefield) if self.state.is_final() => minefield.mine_coords(),
            _ => Vec::new(),
        }
    }

    /// Flagged cells that hold no mine. Empty until the game has ended.
    pub fn wrongly_flagged_coords(&self) -> Vec<Coord2> {
        let Some(minefield) = &self.minefield else {
            return Vec::new();
        };
        if !self.state.is_final() {
            return Vec::new();
        }
        self.board
            .indexed_iter()
            .map(|((row, col), &tile)| ((row as Coord, col as Coord), tile))
            .filter(|&(coords, tile)| tile == PlayTile::Flag && !minefield.contains_mine(coords))
            .map(|(coords, _)| coords)
            .collect()
    }

    /// Mines that carry no flag. Empty until the game has ended.
    pub fn unflagged_mine_coords(&self) -> Vec<Coord2> {
        let Some(minefield) = &self.minefield else {
            return Vec::new();
        };
        if !self.state.is_final() {
            return Vec::new();
        }
        minefield
            .mine_coords()
            .into_iter()
            .filter(|&coords| self.board[coords.to_nd_index()] != PlayTile::Flag)
            .collect()
    }

    /// Opens a cell. On the first effective open this generates the
    /// minefield around `coords` and moves to `Playing`; afterwards it
    /// cascades through zero-count regions and chords on satisfied numbers.
    ///
    /// No-op on flagged cells and once the game has ended. Panics if
    /// `coords` is out of bounds.
    pub fn open(&mut self, coords: Coord2) -> Result<Update> {
        if self.state.is_final() {
            return Ok(Update::unchanged(self.state));
        }
        if self.board[coords.to_nd_index()] == PlayTile::Flag {
            return Ok(Update::unchanged(self.state));
        }

        if self.minefield.is_none() {
            let generated = RandomMinefieldGenerator::new(coords).generate(self.config)?;
            self.minefield = Some(generated);
        }
        if self.state.is_initial() {
            log::debug!("game started at {:?}", coords);
            self.state = GameState::Playing;
        }

        let mut cells = Vec::new();
        let outcome = match self.board[coords.to_nd_index()] {
            PlayTile::Closed => self.open_cascading(coords, &mut cells),
            PlayTile::Open(count) if self.count_flagged_neighbors(coords) >= count => {
                // chord: open every neighbor that is neither open nor
                // flagged, each under the full opening rules
                let seeds: SmallVec<[Coord2; 8]> = self
                    .board
                    .iter_neighbor_cells_with_index(coords)
                    .filter(|&(_, tile)| tile == PlayTile::Closed)
                    .map(|(pos, _)| pos)
                    .collect();
                seeds
                    .into_iter()
                    .map(|pos| self.open_cascading(pos, &mut cells))
                    .reduce(BitOr::bitor)
                    .unwrap_or(OpenOutcome::NoChange)
            }
            _ => OpenOutcome::NoChange,
        };

        match outcome {
            OpenOutcome::Explode => self.finish_lost(&mut cells),
            OpenOutcome::Win => self.finish_won(&mut cells),
            OpenOutcome::Safe | OpenOutcome::NoChange => {}
        }

        Ok(Update {
            state: self.state,
            cells,
        })
    }

    /// Flags a closed cell. Legal before the first open and while playing.
    pub fn flag(&mut self, coords: Coord2) -> Update {
        self.set_flag(coords, true)
    }

    /// Removes a flag. Legal before the first open and while playing.
    pub fn unflag(&mut self, coords: Coord2) -> Update {
        self.set_flag(coords, false)
    }

    pub fn toggle_flag(&mut self, coords: Coord2) -> Update {
        match self.board[coords.to_nd_index()] {
            PlayTile::Flag => self.unflag(coords),
            _ => self.flag(coords),
        }
    }

    fn set_flag(&mut self, coords: Coord2, flagged: bool) -> Update {
        use FlagOutcome::*;

        if self.state.is_final() {
            return Update::unchanged(self.state);
        }

        let outcome = match (self.board[coords.to_nd_index()], flagged) {
            (PlayTile::Closed, true) => {
                self.board[coords.to_nd_index()] = PlayTile::Flag;
                self.flag_count += 1;
                MarkChanged
            }
            (PlayTile::Flag, false) => {
                self.board[coords.to_nd_index()] = PlayTile::Closed;
                self.flag_count -= 1;
                MarkChanged
            }
            _ => NoChange,
        };

        if outcome.has_update() {
            let view = if flagged {
                TileView::Flag
            } else {
                TileView::Closed
            };
            Update {
                state: self.state,
                cells: vec![(coords, view)],
            }
        } else {
            Update::unchanged(self.state)
        }
    }

    /// Opens a single closed cell and flood-fills through zero-count
    /// regions. Each cell is visited at most once, so the worklist is
    /// bounded by the board area.
    fn open_cascading(&mut self, coords: Coord2, cells: &mut Vec<(Coord2, TileView)>) -> OpenOutcome {
        use OpenOutcome::*;

        let Some(minefield) = &self.minefield else {
            return NoChange;
        };

        let mut visited: HashSet<Coord2> = HashSet::new();
        let mut to_visit: VecDeque<Coord2> = VecDeque::from([coords]);
        let mut opened_any = false;

        while let Some(visit) = to_visit.pop_front() {
            if !visited.insert(visit) {
                continue;
            }
            if self.board[visit.to_nd_index()] != PlayTile::Closed {
                continue;
            }

            match minefield.value_at(visit) {
                CellValue::Mine => {
                    // reachable for the seed cell only: zero-count cells
                    // never border a mine
                    self.triggered_mine = Some(visit);
                    return Explode;
                }
                CellValue::Count(count) => {
                    self.board[visit.to_nd_index()] = PlayTile::Open(count);
                    self.open_count += 1;
                    opened_any = true;
                    cells.push((visit, TileView::Open(count)));
                    log::trace!("opened {:?}, adjacent mines: {}", visit, count);

                    if count == 0 {
                        to_visit.extend(
                            self.board
                                .iter_neighbor_cells_with_index(visit)
                                .filter(|&(pos, tile)| {
                                    tile == PlayTile::Closed && !visited.contains(&pos)
                                })
                                .map(|(pos, _)| pos),
                        );
                    }
                }
            }
        }

        if self.open_count == minefield.safe_cell_count() {
            Win
        } else if opened_any {
            Safe
        } else {
            NoChange
        }
    }

    /// Terminal reveal on a loss. Purely a rendering fact: the internal
    /// opened/flagged state stays untouched.
    fn finish_lost(&mut self, cells: &mut Vec<(Coord2, TileView)>) {
        self.state = GameState::Lost;
        log::debug!("game lost, triggered mine: {:?}", self.triggered_mine);

        let Some(minefield) = &self.minefield else {
            return;
        };
        for coords in minefield.mine_coords() {
            if self.board[coords.to_nd_index()] == PlayTile::Closed {
                cells.push((coords, TileView::Mine));
            }
        }
        for ((row, col), &tile) in self.board.indexed_iter() {
            let coords = (row as Coord, col as Coord);
            if tile == PlayTile::Flag && !minefield.contains_mine(coords) {
                cells.push((coords, TileView::IncorrectFlag));
            }
        }
    }

    /// Flags every remaining mine on a win.
    fn finish_won(&mut self, cells: &mut Vec<(Coord2, TileView)>) {
        self.state = GameState::Won;
        log::debug!("game won with {} cells opened", self.open_count);

        let Some(minefield) = &self.minefield else {
            return;
        };
        for coords in minefield.mine_coords() {
            if self.board[coords.to_nd_index()] == PlayTile::Closed {
                self.board[coords.to_nd_index()] = PlayTile::Flag;
                self.flag_count += 1;
                cells.push((coords, TileView::Flag));
            }
        }
    }

    fn count_flagged_neighbors(&self, coords: Coord2) -> u8 {
        self.board
            .iter_neighbor_cells(coords)
            .filter(|&tile| tile == PlayTile::Flag)
            .count()
            .try_into()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn field(size: Coord2, mines: &[Coord2]) -> Minefield {
        Minefield::from_mine_coords(size, mines)
    }

    fn game(size: Coord2, mines: &[Coord2]) -> Game {
        Game::from_minefield(field(size, mines))
    }

    fn coords_of(update: &Update) -> Vec<Coord2> {
        update.cells.iter().map(|&(coords, _)| coords).collect()
    }

    #[test]
    fn opening_a_mine_loses_and_reveals_every_mine() {
        let mut game = game((3, 3), &[(0, 0), (2, 2)]);

        let update = game.open((0, 0)).unwrap();

        assert_eq!(update.state, GameState::Lost);
        assert!(update.cells.contains(&((0, 0), TileView::Mine)));
        assert!(update.cells.contains(&((2, 2), TileView::Mine)));
        assert_eq!(game.triggered_mine(), Some((0, 0)));
        assert_eq!(game.mine_coords(), [(0, 0), (2, 2)]);
    }

    #[test]
    fn zero_cascade_opens_the_region_and_its_border() {
        // mine in one corner: the rest of the board is a single zero region
        // plus its numbered border
        let mut game = game((3, 3), &[(2, 2)]);

        let update = game.open((0, 0)).unwrap();

        assert_eq!(update.state, GameState::Won);
        assert_eq!(game.value_at((0, 0)), Some(CellValue::Count(0)));
        assert_eq!(game.value_at((1, 1)), Some(CellValue::Count(1)));
        assert!(!game.is_opened((2, 2)));
        // win auto-flags the untouched mine
        assert!(update.cells.contains(&((2, 2), TileView::Flag)));
        assert!(game.is_flagged((2, 2)));
        assert_eq!(game.mines_left(), 0);
    }

    #[test]
    fn flags_block_the_cascade() {
        let mut game = game((3, 3), &[(2, 2)]);
        game.flag((0, 1));

        let update = game.open((0, 0)).unwrap();

        assert_eq!(update.state, GameState::Playing);
        assert!(!game.is_opened((0, 1)));
        assert!(game.is_flagged((0, 1)));
        let opened = coords_of(&update);
        assert_eq!(opened, [(0, 0), (1, 0), (1, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn reopening_an_opened_cell_changes_nothing() {
        let mut game = game((3, 3), &[(1, 1)]);

        let first = game.open((0, 0)).unwrap();
        assert_eq!(first.cells, [((0, 0), TileView::Open(1))]);

        let second = game.open((0, 0)).unwrap();
        assert_eq!(second.state, GameState::Playing);
        assert!(!second.has_update());
    }

    #[test]
    fn open_on_a_flagged_cell_is_a_no_op_and_builds_no_field() {
        let config = GameConfig::new((9, 9), MineSpec::Count(10), Some(3)).unwrap();
        let mut game = Game::new(config);

        game.flag((4, 4));
        let update = game.open((4, 4)).unwrap();

        assert_eq!(update.state, GameState::NotStarted);
        assert!(!update.has_update());
        assert_eq!(game.value_at((4, 4)), None);
    }

    #[test]
    fn chord_opens_the_remaining_neighbors() {
        let mut game = game((3, 3), &[(0, 1), (2, 1)]);

        assert_eq!(
            game.open((1, 1)).unwrap().cells,
            [((1, 1), TileView::Open(2))]
        );
        game.flag((0, 1));
        game.flag((2, 1));

        let update = game.open((1, 1)).unwrap();

        assert_eq!(update.state, GameState::Won);
        let opened = coords_of(&update);
        for coords in [(0, 0), (0, 2), (1, 0), (1, 2), (2, 0), (2, 2)] {
            assert!(opened.contains(&coords), "missing {coords:?}");
            assert!(game.is_opened(coords));
        }
    }

    #[test]
    fn chord_with_a_misplaced_flag_detonates() {
        // flagged count satisfies the >= comparison, but the flag is wrong
        let mut game = game((3, 3), &[(0, 0)]);

        game.open((1, 1)).unwrap();
        game.flag((0, 1));

        let update = game.open((1, 1)).unwrap();

        assert_eq!(update.state, GameState::Lost);
        assert_eq!(game.triggered_mine(), Some((0, 0)));
        assert!(update.cells.contains(&((0, 0), TileView::Mine)));
        assert!(update.cells.contains(&((0, 1), TileView::IncorrectFlag)));
        // the remaining chord seeds still opened in the same call
        assert!(game.is_opened((2, 2)));
    }

    #[test]
    fn chord_needs_enough_flags() {
        let mut game = game((3, 3), &[(0, 1), (2, 1)]);

        game.open((1, 1)).unwrap();
        game.flag((0, 1));

        // one flag against a count of two: nothing happens
        let update = game.open((1, 1)).unwrap();
        assert_eq!(update.state, GameState::Playing);
        assert!(!update.has_update());
    }

    #[test]
    fn flag_and_unflag_round_trip() {
        let config = GameConfig::new((4, 4), MineSpec::Count(2), Some(1)).unwrap();
        let mut game = Game::new(config);

        let flagged = game.flag((1, 2));
        assert_eq!(flagged.state, GameState::NotStarted);
        assert_eq!(flagged.cells, [((1, 2), TileView::Flag)]);
        assert!(game.is_flagged((1, 2)));
        assert_eq!(game.mines_left(), 1);

        // redundant flag is a no-op
        assert!(!game.flag((1, 2)).has_update());

        let unflagged = game.unflag((1, 2));
        assert_eq!(unflagged.cells, [((1, 2), TileView::Closed)]);
        assert!(!game.is_flagged((1, 2)));
        assert_eq!(game.mines_left(), 2);
    }

    #[test]
    fn toggle_flag_flips_both_ways() {
        let mut game = game((3, 3), &[(1, 1)]);
        assert_eq!(game.toggle_flag((0, 0)).cells, [((0, 0), TileView::Flag)]);
        assert_eq!(game.toggle_flag((0, 0)).cells, [((0, 0), TileView::Closed)]);
    }

    #[test]
    fn flagging_an_opened_cell_is_a_no_op() {
        let mut game = game((3, 3), &[(1, 1)]);
        game.open((0, 0)).unwrap();
        assert!(!game.flag((0, 0)).has_update());
        assert!(!game.toggle_flag((0, 0)).has_update());
    }

    #[test]
    fn finished_games_ignore_further_moves() {
        let mut game = game((2, 2), &[(0, 0)]);
        game.open((0, 0)).unwrap();
        assert_eq!(game.state(), GameState::Lost);

        let open = game.open((1, 1)).unwrap();
        assert_eq!(open.state, GameState::Lost);
        assert!(!open.has_update());
        assert!(!game.flag((1, 1)).has_update());
        assert!(!game.unflag((1, 1)).has_update());
    }

    #[test]
    fn opening_every_safe_cell_wins_and_flags_the_mine() {
        let mut game = game((2, 2), &[(0, 0)]);

        assert_eq!(game.open((0, 1)).unwrap().state, GameState::Playing);
        assert_eq!(game.open((1, 0)).unwrap().state, GameState::Playing);

        let update = game.open((1, 1)).unwrap();
        assert_eq!(update.state, GameState::Won);
        assert!(update.cells.contains(&((1, 1), TileView::Open(1))));
        assert!(update.cells.contains(&((0, 0), TileView::Flag)));
        assert!(game.is_flagged((0, 0)));
    }

    #[test]
    fn first_open_is_never_a_mine() {
        for seed in 0..20 {
            let config = GameConfig::new((9, 9), MineSpec::Count(20), Some(seed)).unwrap();
            let mut game = Game::new(config);
            let update = game.open((4, 4)).unwrap();
            assert_ne!(update.state, GameState::Lost, "seed {seed}");
            assert!(game.is_opened((4, 4)));
        }
    }

    #[test]
    fn generation_failure_leaves_the_game_untouched() {
        let config = GameConfig::new((3, 3), MineSpec::Count(9), Some(1)).unwrap();
        let mut game = Game::new(config);

        assert_eq!(game.open((1, 1)), Err(GameError::InsufficientSpace));
        assert_eq!(game.state(), GameState::NotStarted);
        assert!(!game.is_opened((1, 1)));
    }

    #[test]
    fn loss_queries_split_flags_and_mines() {
        let mut game = game((3, 3), &[(0, 0), (2, 2)]);

        game.open((0, 1)).unwrap();
        game.flag((0, 0));
        game.flag((2, 0));
        let update = game.open((2, 2)).unwrap();

        assert_eq!(update.state, GameState::Lost);
        assert_eq!(game.wrongly_flagged_coords(), [(2, 0)]);
        assert_eq!(game.unflagged_mine_coords(), [(2, 2)]);
        assert_eq!(game.mine_coords(), [(0, 0), (2, 2)]);

        // the reveal is a rendering fact: flags and opens stay put
        assert!(game.is_flagged((0, 0)));
        assert!(game.is_flagged((2, 0)));
        assert_eq!(game.tile_at((0, 0)), TileView::Flag);
        assert_eq!(game.tile_at((2, 0)), TileView::IncorrectFlag);
        assert_eq!(game.tile_at((2, 2)), TileView::Mine);
        assert_eq!(game.value_at((2, 2)), Some(CellValue::Mine));
    }

    #[test]
    fn end_game_queries_are_empty_while_playing() {
        let mut game = game((3, 3), &[(0, 0), (2, 2)]);
        game.open((1, 1)).unwrap();
        assert!(game.mine_coords().is_empty());
        assert!(game.wrongly_flagged_coords().is_empty());
        assert!(game.unflagged_mine_coords().is_empty());
    }

    #[test]
    fn game_serde_round_trip_mid_game() {
        let mut game = game((4, 4), &[(0, 3), (3, 0)]);
        game.open((1, 1)).unwrap();
        game.flag((0, 3));

        let json = serde_json::to_string(&game).unwrap();
        let restored: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(game, restored);
    }
}
