use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::debug;

use crate::error::GameError;
use crate::game::{GameState, MetaMove, PlayerMarker};
use crate::search::{Searcher, DEFAULT_DEPTH};

/// Source of moves for one side of a game.
pub trait Player {
    fn marker(&self) -> PlayerMarker;

    /// Chooses a move for the given position. The state is a copy and may be mutated.
    fn get_move(&mut self, state: GameState) -> Result<MetaMove, GameError>;
}

// ##############################
// # RandomPlayer
// ##############################

pub struct RandomPlayer {
    marker: PlayerMarker,
    rng: StdRng,
}

impl RandomPlayer {
    pub fn new(marker: PlayerMarker) -> Self {
        RandomPlayer {
            marker,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(marker: PlayerMarker, seed: u64) -> Self {
        RandomPlayer {
            marker,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Player for RandomPlayer {
    fn marker(&self) -> PlayerMarker {
        self.marker
    }

    fn get_move(&mut self, state: GameState) -> Result<MetaMove, GameError> {
        state
            .legal_moves()
            .choose(&mut self.rng)
            .copied()
            .ok_or(GameError::NoLegalMoves)
    }
}

// ##############################
// # ComputerPlayer
// ##############################

/// Plays O with the alpha-beta search at the default depth.
#[derive(Default)]
pub struct ComputerPlayer {
    searcher: Searcher,
}

impl ComputerPlayer {
    pub fn new() -> Self {
        ComputerPlayer::default()
    }

    pub fn with_searcher(searcher: Searcher) -> Self {
        ComputerPlayer { searcher }
    }
}

impl Player for ComputerPlayer {
    fn marker(&self) -> PlayerMarker {
        PlayerMarker::O
    }

    fn get_move(&mut self, mut state: GameState) -> Result<MetaMove, GameError> {
        let last_move = state.last_move();
        let result = self.searcher.search(&mut state, DEFAULT_DEPTH, last_move)?;
        debug!(mv = %result.best_move, score = result.score, "computer move");
        Ok(result.best_move)
    }
}
