use std::{fmt, str::FromStr};

use flagset::{flags, FlagSet};
use tracing::debug;

use crate::error::{GameError, IllegalReason};

// #############################
// #                           #
// #      Fixed Constants      #
// #                           #
// #############################

pub const BOARD_SIZE: usize = 3;
pub const BOARD_SIZE_SQUARED: usize = BOARD_SIZE * BOARD_SIZE;
const FULL_BOARD: u16 = 0b111_111_111;
pub(crate) const WINNING_POSITIONS: [u16; 8] = [
    0b111_000_000, 0b000_111_000, 0b000_000_111, // rows
    0b100_100_100, 0b010_010_010, 0b001_001_001, // columns
    0b100_010_001, 0b001_010_100, // diagonals
];

// #############################
// #                           #
// #      Marks & Outcomes     #
// #                           #
// #############################

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PlayerMarker {
    X,
    O,
    #[default]
    Empty,
}

impl PlayerMarker {
    pub fn to_char(&self) -> char {
        match self {
            PlayerMarker::X => 'X',
            PlayerMarker::O => 'O',
            PlayerMarker::Empty => '-',
        }
    }

    pub fn to_other(&self) -> Self {
        match self {
            PlayerMarker::X => PlayerMarker::O,
            PlayerMarker::O => PlayerMarker::X,
            PlayerMarker::Empty => PlayerMarker::Empty,
        }
    }
}

impl fmt::Display for PlayerMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Result of a single sub-board. Once decided it never changes for the rest of the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    #[default]
    Undecided,
    WonByX,
    WonByO,
    Drawn,
}

impl Outcome {
    pub fn is_decided(&self) -> bool {
        *self != Outcome::Undecided
    }

    pub fn winner(&self) -> PlayerMarker {
        match self {
            Outcome::WonByX => PlayerMarker::X,
            Outcome::WonByO => PlayerMarker::O,
            Outcome::Undecided | Outcome::Drawn => PlayerMarker::Empty,
        }
    }
}

/// Terminal status of the whole game, i.e. the outcome of the macro grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum GameStatus {
    #[default]
    InProgress,
    WonByX,
    WonByO,
    Drawn,
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        *self != GameStatus::InProgress
    }

    pub fn winner(&self) -> PlayerMarker {
        match self {
            GameStatus::WonByX => PlayerMarker::X,
            GameStatus::WonByO => PlayerMarker::O,
            GameStatus::InProgress | GameStatus::Drawn => PlayerMarker::Empty,
        }
    }
}

impl From<Outcome> for GameStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Undecided => GameStatus::InProgress,
            Outcome::WonByX => GameStatus::WonByX,
            Outcome::WonByO => GameStatus::WonByO,
            Outcome::Drawn => GameStatus::Drawn,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::InProgress => write!(f, "in progress"),
            GameStatus::WonByX => write!(f, "X wins"),
            GameStatus::WonByO => write!(f, "O wins"),
            GameStatus::Drawn => write!(f, "draw"),
        }
    }
}

/// Line/draw rule shared by sub-boards and the macro grid.
///
/// `filled` has a bit for every position that can no longer change, whether or
/// not a player owns it.
fn evaluate_lines(x: u16, o: u16, filled: u16) -> Outcome {
    for &pos in WINNING_POSITIONS.iter() {
        if x & pos == pos {
            return Outcome::WonByX;
        } else if o & pos == pos {
            return Outcome::WonByO;
        }
    }
    if filled & FULL_BOARD == FULL_BOARD {
        Outcome::Drawn
    } else {
        Outcome::Undecided
    }
}

// #############################
// #                           #
// #         MetaMove          #
// #                           #
// #############################

/// A move addressed as (macro row, macro col, row, col).
///
/// The derived ordering is the generation order used by
/// [`GameState::legal_moves`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaMove {
    pub macro_row: usize,
    pub macro_col: usize,
    pub row: usize,
    pub col: usize,
}

impl MetaMove {
    pub fn new(macro_row: usize, macro_col: usize, row: usize, col: usize) -> Self {
        MetaMove {
            macro_row,
            macro_col,
            row,
            col,
        }
    }

    pub(crate) fn from_indices(board: usize, cell: usize) -> Self {
        MetaMove::new(
            board / BOARD_SIZE,
            board % BOARD_SIZE,
            cell / BOARD_SIZE,
            cell % BOARD_SIZE,
        )
    }

    pub fn in_bounds(&self) -> bool {
        [self.macro_row, self.macro_col, self.row, self.col]
            .iter()
            .all(|&coord| coord < BOARD_SIZE)
    }

    pub(crate) fn board_index(&self) -> usize {
        self.macro_row * BOARD_SIZE + self.macro_col
    }

    /// Bit position inside the sub-board. Also the sub-board the opponent is sent to.
    pub(crate) fn cell_index(&self) -> usize {
        self.row * BOARD_SIZE + self.col
    }
}

impl fmt::Display for MetaMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.macro_row, self.macro_col, self.row, self.col
        )
    }
}

impl FromStr for MetaMove {
    type Err = GameError;

    /// Accepts four digits in `0..=2`, optionally separated by spaces or commas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || GameError::ParseMove {
            input: s.to_string(),
        };

        let mut coords = [0usize; 4];
        let mut count = 0;
        for ch in s.chars() {
            if ch.is_whitespace() || ch == ',' {
                continue;
            }
            let digit = ch
                .to_digit(10)
                .map(|d| d as usize)
                .filter(|&d| d < BOARD_SIZE)
                .ok_or_else(parse_error)?;
            if count == coords.len() {
                return Err(parse_error());
            }
            coords[count] = digit;
            count += 1;
        }

        if count != coords.len() {
            return Err(parse_error());
        }
        Ok(MetaMove::new(coords[0], coords[1], coords[2], coords[3]))
    }
}

// #############################
// #                           #
// #         BitBoard          #
// #                           #
// #############################

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
struct BitBoard {
    x: u16,
    o: u16,
}

impl BitBoard {
    fn get(&self, index: usize) -> PlayerMarker {
        let mask = 1 << index;
        if self.x & mask != 0 {
            PlayerMarker::X
        } else if self.o & mask != 0 {
            PlayerMarker::O
        } else {
            PlayerMarker::Empty
        }
    }

    fn set(&mut self, index: usize, player: PlayerMarker) {
        let mask = 1 << index;
        match player {
            PlayerMarker::X => self.x |= mask,
            PlayerMarker::O => self.o |= mask,
            PlayerMarker::Empty => {}
        }
    }

    fn unset(&mut self, index: usize) {
        let mask = !(1 << index);
        self.x &= mask;
        self.o &= mask;
    }

    fn is_empty_at(&self, index: usize) -> bool {
        (self.x | self.o) & (1 << index) == 0
    }

    fn empty_positions(self) -> impl Iterator<Item = usize> {
        let occupied = self.x | self.o;
        (0..BOARD_SIZE_SQUARED).filter(move |i| occupied & (1 << i) == 0)
    }

    fn outcome(&self) -> Outcome {
        evaluate_lines(self.x, self.o, self.x | self.o)
    }
}

// #############################
// #                           #
// #     Active Sub-Board      #
// #                           #
// #############################

flags! {
    /// Sub-board positions on the macro grid, used as a highlight set.
    pub enum Region: u16 {
        TopLeft = 0b000_000_001,
        Top = 0b000_000_010,
        TopRight = 0b000_000_100,
        Left = 0b000_001_000,
        Center = 0b000_010_000,
        Right = 0b000_100_000,
        BottomLeft = 0b001_000_000,
        Bottom = 0b010_000_000,
        BottomRight = 0b100_000_000,
    }
}

pub const REGIONS: [Region; BOARD_SIZE_SQUARED] = [
    Region::TopLeft,
    Region::Top,
    Region::TopRight,
    Region::Left,
    Region::Center,
    Region::Right,
    Region::BottomLeft,
    Region::Bottom,
    Region::BottomRight,
];

/// Where the next move may be played.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActiveBoard {
    /// Any undecided sub-board.
    #[default]
    Any,
    Only { macro_row: usize, macro_col: usize },
}

impl ActiveBoard {
    fn from_target(target: Option<usize>) -> Self {
        match target {
            Some(board) => ActiveBoard::Only {
                macro_row: board / BOARD_SIZE,
                macro_col: board % BOARD_SIZE,
            },
            None => ActiveBoard::Any,
        }
    }

    fn index(&self) -> Option<usize> {
        match self {
            ActiveBoard::Any => None,
            ActiveBoard::Only {
                macro_row,
                macro_col,
            } => Some(macro_row * BOARD_SIZE + macro_col),
        }
    }
}

// #############################
// #                           #
// #        GameState          #
// #                           #
// #############################

/// Full game position: nine bitboards, their outcomes, turn and move constraint.
///
/// Real play goes through [`GameState::apply_move`]. The search works on the same
/// value through `simulate`/`undo`, which only touch cells and outcomes and always
/// leave the state as they found it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    boards: [BitBoard; BOARD_SIZE_SQUARED],
    outcomes: [Outcome; BOARD_SIZE_SQUARED],
    /// Sub-boards whose outcome was decided by a pending `simulate`.
    simulated: u16,
    status: GameStatus,
    current_player: PlayerMarker,
    active: ActiveBoard,
    last_move: Option<MetaMove>,
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        GameState {
            boards: [BitBoard::default(); BOARD_SIZE_SQUARED],
            outcomes: [Outcome::Undecided; BOARD_SIZE_SQUARED],
            simulated: 0,
            status: GameStatus::InProgress,
            current_player: PlayerMarker::X,
            active: ActiveBoard::Any,
            last_move: None,
        }
    }

    pub fn reset(&mut self) {
        *self = GameState::new();
    }

    pub fn current_player(&self) -> PlayerMarker {
        self.current_player
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn active(&self) -> ActiveBoard {
        self.active
    }

    pub fn last_move(&self) -> Option<MetaMove> {
        self.last_move
    }

    /// Mark at the given cell.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate of `mv` is outside `0..=2`.
    pub fn cell(&self, mv: MetaMove) -> PlayerMarker {
        assert!(mv.in_bounds(), "cell {} is off the board", mv);
        self.boards[mv.board_index()].get(mv.cell_index())
    }

    /// # Panics
    ///
    /// Panics if the position is off the macro grid.
    pub fn outcome(&self, macro_row: usize, macro_col: usize) -> Outcome {
        self.outcomes[macro_row * BOARD_SIZE + macro_col]
    }

    pub(crate) fn outcome_at(&self, board: usize) -> Outcome {
        self.outcomes[board]
    }

    /// True when the sub-board was decided by real play rather than by a pending simulation.
    pub(crate) fn is_settled(&self, board: usize) -> bool {
        self.outcomes[board].is_decided() && self.simulated & (1 << board) == 0
    }

    /// Player owning a complete line in the sub-board, if any.
    pub(crate) fn line_owner(&self, board: usize) -> PlayerMarker {
        self.boards[board].outcome().winner()
    }

    /// Sub-boards the presentation should highlight as playable.
    pub fn playable_regions(&self) -> FlagSet<Region> {
        let mut regions = FlagSet::default();
        if self.status.is_over() {
            return regions;
        }
        let target = self.active.index();
        for (board, &region) in REGIONS.iter().enumerate() {
            if !self.outcomes[board].is_decided() && target.map_or(true, |t| t == board) {
                regions |= region;
            }
        }
        regions
    }

    pub fn is_legal(&self, mv: MetaMove) -> bool {
        self.check(mv).is_ok()
    }

    fn check(&self, mv: MetaMove) -> Result<(), IllegalReason> {
        if !mv.in_bounds() {
            return Err(IllegalReason::OutOfBounds);
        }
        let board = mv.board_index();
        if self.outcomes[board].is_decided() {
            return Err(IllegalReason::BoardDecided);
        }
        if !self.boards[board].is_empty_at(mv.cell_index()) {
            return Err(IllegalReason::CellOccupied);
        }
        match self.active.index() {
            Some(expected) if expected != board => Err(IllegalReason::WrongBoard {
                macro_row: expected / BOARD_SIZE,
                macro_col: expected % BOARD_SIZE,
            }),
            _ => Ok(()),
        }
    }

    /// Plays `mv` for `player` and returns the resulting game status.
    ///
    /// On error nothing is changed.
    pub fn apply_move(
        &mut self,
        mv: MetaMove,
        player: PlayerMarker,
    ) -> Result<GameStatus, GameError> {
        if self.status.is_over() {
            return Err(GameError::GameOver {
                status: self.status,
            });
        }
        if player != self.current_player {
            return Err(GameError::WrongPlayer {
                expected: self.current_player,
                got: player,
            });
        }
        self.check(mv)
            .map_err(|reason| GameError::IllegalMove { mv, reason })?;

        self.place(mv, player);
        self.current_player = player.to_other();
        self.active = ActiveBoard::from_target(self.target_after(Some(mv)));
        self.last_move = Some(mv);

        debug!(%mv, %player, status = %self.status, active = ?self.active, "move applied");
        Ok(self.status)
    }

    /// Every legal move in ascending (macro row, macro col, row, col) order.
    pub fn legal_moves(&self) -> Vec<MetaMove> {
        self.moves_in(self.active.index())
    }

    /// Moves available after `last_move`, derived from the current cells and outcomes
    /// only. This is the generator the search uses while simulating.
    pub(crate) fn moves_following(&self, last_move: Option<MetaMove>) -> Vec<MetaMove> {
        self.moves_in(self.target_after(last_move))
    }

    fn target_after(&self, last_move: Option<MetaMove>) -> Option<usize> {
        last_move
            .map(|mv| mv.cell_index())
            .filter(|&board| !self.outcomes[board].is_decided())
    }

    fn moves_in(&self, target: Option<usize>) -> Vec<MetaMove> {
        let target = target.filter(|&board| !self.outcomes[board].is_decided());
        (0..BOARD_SIZE_SQUARED)
            .filter(|&board| target.map_or(true, |t| t == board))
            .filter(|&board| !self.outcomes[board].is_decided())
            .flat_map(|board| {
                self.boards[board]
                    .empty_positions()
                    .map(move |cell| MetaMove::from_indices(board, cell))
            })
            .collect()
    }

    /// Writes the mark and refreshes outcomes. Returns true if the sub-board became decided.
    fn place(&mut self, mv: MetaMove, player: PlayerMarker) -> bool {
        let board = mv.board_index();
        self.boards[board].set(mv.cell_index(), player);

        if self.outcomes[board].is_decided() {
            return false;
        }
        let outcome = self.evaluate_sub_board(board);
        if !outcome.is_decided() {
            return false;
        }
        self.outcomes[board] = outcome;
        self.status = self.evaluate_overall().into();
        true
    }

    /// Places a mark for the search without touching turn, constraint or last move.
    pub(crate) fn simulate(&mut self, mv: MetaMove, player: PlayerMarker) {
        debug_assert!(self.boards[mv.board_index()].is_empty_at(mv.cell_index()));
        if self.place(mv, player) {
            self.simulated |= 1 << mv.board_index();
        }
    }

    /// Reverts a `simulate` of the same move.
    pub(crate) fn undo(&mut self, mv: MetaMove) {
        let board = mv.board_index();
        self.boards[board].unset(mv.cell_index());

        let mask = 1 << board;
        if self.simulated & mask != 0 {
            self.simulated &= !mask;
            self.outcomes[board] = Outcome::Undecided;
            self.status = self.evaluate_overall().into();
        }
    }

    pub fn evaluate_sub_board(&self, board: usize) -> Outcome {
        self.boards[board].outcome()
    }

    pub fn evaluate_overall(&self) -> Outcome {
        let (mut x, mut o, mut filled) = (0u16, 0u16, 0u16);
        for (board, outcome) in self.outcomes.iter().enumerate() {
            let mask = 1 << board;
            match outcome {
                Outcome::WonByX => x |= mask,
                Outcome::WonByO => o |= mask,
                Outcome::Drawn | Outcome::Undecided => {}
            }
            if outcome.is_decided() {
                filled |= mask;
            }
        }
        evaluate_lines(x, o, filled)
    }
}

// #############################
// #                           #
// #          Display          #
// #                           #
// #############################

impl GameState {
    /// Lays out the 9x9 grid, one text line per cell row, with sub-boards split
    /// by `|` and separator lines. `paint` renders a single cell.
    pub fn render_with<F>(&self, mut paint: F) -> String
    where
        F: FnMut(MetaMove) -> String,
    {
        let mut out = String::new();
        for macro_row in 0..BOARD_SIZE {
            if macro_row > 0 {
                out.push_str("------+-------+------\n");
            }
            for row in 0..BOARD_SIZE {
                let blocks: Vec<String> = (0..BOARD_SIZE)
                    .map(|macro_col| {
                        (0..BOARD_SIZE)
                            .map(|col| paint(MetaMove::new(macro_row, macro_col, row, col)))
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect();
                out.push_str(&blocks.join(" | "));
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(|mv| self.cell(mv).to_char().to_string()))
    }
}

// #############################
// #                           #
// #           Tests           #
// #                           #
// #############################
