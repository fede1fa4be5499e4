//! Ultimate ("meta") tic-tac-toe engine: game state with the active sub-board rule
//! and a depth-limited alpha-beta search for the computer player.

pub mod error;
pub mod game;
pub mod player;
pub mod search;
pub mod session;

pub use error::{GameError, IllegalReason};
pub use game::{ActiveBoard, GameState, GameStatus, MetaMove, Outcome, PlayerMarker, Region};
pub use search::{best_move, Evaluator, SearchResult, Searcher, DEFAULT_DEPTH};
