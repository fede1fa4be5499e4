use thiserror::Error;

use crate::game::{GameStatus, MetaMove, PlayerMarker};

/// Why a move was rejected by [`GameState::apply_move`](crate::game::GameState::apply_move).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum IllegalReason {
    #[error("coordinates must be in 0..=2")]
    OutOfBounds,

    #[error("cell is already taken")]
    CellOccupied,

    #[error("sub-board is already decided")]
    BoardDecided,

    #[error("next move must be played in sub-board ({macro_row}, {macro_col})")]
    WrongBoard { macro_row: usize, macro_col: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("illegal move {mv}: {reason}")]
    IllegalMove { mv: MetaMove, reason: IllegalReason },

    #[error("it is {expected}'s turn, not {got}'s")]
    WrongPlayer {
        expected: PlayerMarker,
        got: PlayerMarker,
    },

    #[error("no legal moves available")]
    NoLegalMoves,

    /// The player gave up instead of moving, e.g. a human quitting at the prompt.
    #[error("{player} resigned")]
    Resigned { player: PlayerMarker },

    #[error("game is already over: {status}")]
    GameOver { status: GameStatus },

    #[error("cannot parse move '{input}' (expected four digits 0-2: macro row, macro col, row, col)")]
    ParseMove { input: String },
}
