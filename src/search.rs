//! Depth-limited minimax with alpha-beta pruning.
//!
//! The computer always plays O and is the maximizing side. The search works on the
//! caller's [`GameState`] through `simulate`/`undo`, so the position is identical
//! before and after every call. Turn and move constraint are carried down the
//! recursion as parameters instead of being read from the state.

use tracing::{debug, instrument, trace};

use crate::error::GameError;
use crate::game::{
    GameState, GameStatus, MetaMove, Outcome, PlayerMarker, BOARD_SIZE_SQUARED, WINNING_POSITIONS,
};

/// Lookahead used by the computer player.
pub const DEFAULT_DEPTH: u32 = 2;

/// Score for a sub-board line owned by one side.
const LINE_SCORE: i32 = 10;

/// Weights for [`Evaluator::MacroAware`].
const MACRO_WIN_SCORE: i32 = 1000;
const MACRO_THREAT_SCORE: i32 = 25;

// ######################################
// # Evaluation
// ######################################

/// Static evaluation used when the depth limit is reached, from O's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Evaluator {
    /// +10 for every sub-board not yet settled by real play in which O owns a line,
    /// -10 for every such board where X does. Macro-grid tactics are ignored.
    #[default]
    SubBoardLines,
    /// `SubBoardLines` plus a large bonus for a decided macro grid and a smaller one
    /// for every macro line two boards away from completion.
    MacroAware,
}

impl Evaluator {
    pub fn evaluate(&self, state: &GameState) -> i32 {
        match self {
            Evaluator::SubBoardLines => sub_board_lines(state),
            Evaluator::MacroAware => sub_board_lines(state) + macro_terms(state),
        }
    }
}

fn sub_board_lines(state: &GameState) -> i32 {
    (0..BOARD_SIZE_SQUARED)
        .filter(|&board| !state.is_settled(board))
        .map(|board| match state.line_owner(board) {
            PlayerMarker::O => LINE_SCORE,
            PlayerMarker::X => -LINE_SCORE,
            PlayerMarker::Empty => 0,
        })
        .sum()
}

fn macro_terms(state: &GameState) -> i32 {
    match state.status() {
        GameStatus::WonByO => return MACRO_WIN_SCORE,
        GameStatus::WonByX => return -MACRO_WIN_SCORE,
        GameStatus::InProgress | GameStatus::Drawn => {}
    }

    let (mut x, mut o, mut blocked) = (0u16, 0u16, 0u16);
    for board in 0..BOARD_SIZE_SQUARED {
        let mask = 1 << board;
        match state.outcome_at(board) {
            Outcome::WonByX => x |= mask,
            Outcome::WonByO => o |= mask,
            Outcome::Drawn => blocked |= mask,
            Outcome::Undecided => {}
        }
    }

    WINNING_POSITIONS
        .iter()
        .map(|&line| {
            if blocked & line != 0 {
                0
            } else if o & line != 0 && x & line == 0 && (o & line).count_ones() == 2 {
                MACRO_THREAT_SCORE
            } else if x & line != 0 && o & line == 0 && (x & line).count_ones() == 2 {
                -MACRO_THREAT_SCORE
            } else {
                0
            }
        })
        .sum()
}

// ######################################
// # Searcher
// ######################################

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub best_move: MetaMove,
    /// Minimax score of `best_move` from O's point of view.
    pub score: i32,
    /// Positions visited, including the root.
    pub nodes: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Searcher {
    evaluator: Evaluator,
    nodes: u64,
}

impl Searcher {
    pub fn new() -> Self {
        Searcher::default()
    }

    pub fn with_evaluator(evaluator: Evaluator) -> Self {
        Searcher {
            evaluator,
            nodes: 0,
        }
    }

    /// Finds the best move for O in `state`, where `last_move` is the move that led
    /// to it (it decides which sub-board is playable).
    ///
    /// A `depth` of zero is treated as one. Ties go to the first move in generation
    /// order. `state` is left unchanged.
    ///
    /// Fails with `NoLegalMoves` when there is nothing to play, a drawn macro grid
    /// included, and with `GameOver` when the macro grid is already won.
    #[instrument(level = "debug", skip(self, state), fields(evaluator = ?self.evaluator))]
    pub fn search(
        &mut self,
        state: &mut GameState,
        depth: u32,
        last_move: Option<MetaMove>,
    ) -> Result<SearchResult, GameError> {
        let status = state.status();
        if status == GameStatus::Drawn || state.moves_following(last_move).is_empty() {
            return Err(GameError::NoLegalMoves);
        }
        // A won macro grid can still have open cells.
        if status.is_over() {
            return Err(GameError::GameOver { status });
        }

        self.nodes = 0;
        let (score, best_move) =
            self.alpha_beta(state, depth.max(1), i32::MIN, i32::MAX, true, last_move);
        let best_move = best_move.ok_or(GameError::NoLegalMoves)?;

        debug!(%best_move, score, nodes = self.nodes, "search finished");
        Ok(SearchResult {
            best_move,
            score,
            nodes: self.nodes,
        })
    }

    /// Returns the score of the position and the move that reaches it. At a cutoff
    /// the move is the one that led here; a node without moves returns `None`.
    fn alpha_beta(
        &mut self,
        state: &mut GameState,
        depth: u32,
        mut alpha: i32,
        mut beta: i32,
        maximizing: bool,
        last_move: Option<MetaMove>,
    ) -> (i32, Option<MetaMove>) {
        self.nodes += 1;

        let status = state.status();
        if depth == 0 || status == GameStatus::WonByX || status == GameStatus::WonByO {
            return (self.evaluator.evaluate(state), last_move);
        }

        let moves = state.moves_following(last_move);
        if moves.is_empty() {
            return (self.evaluator.evaluate(state), None);
        }

        let mover = if maximizing {
            PlayerMarker::O
        } else {
            PlayerMarker::X
        };
        let mut best_score = if maximizing { i32::MIN } else { i32::MAX };
        let mut best_move = None;

        for mv in moves {
            state.simulate(mv, mover);
            let (score, _) = self.alpha_beta(state, depth - 1, alpha, beta, !maximizing, Some(mv));
            state.undo(mv);

            if maximizing {
                if score > best_score {
                    best_score = score;
                    best_move = Some(mv);
                }
                alpha = alpha.max(score);
            } else {
                if score < best_score {
                    best_score = score;
                    best_move = Some(mv);
                }
                beta = beta.min(score);
            }

            if beta <= alpha {
                trace!(%mv, depth, alpha, beta, "cutoff");
                break;
            }
        }

        (best_score, best_move)
    }
}

/// Best move for O at `depth` plies using the default evaluation.
pub fn best_move(
    state: &mut GameState,
    depth: u32,
    last_move: Option<MetaMove>,
) -> Result<MetaMove, GameError> {
    Searcher::new()
        .search(state, depth, last_move)
        .map(|result| result.best_move)
}

// ######################################
// # Tests
// ######################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::{force, random_game};

    /// Full-width minimax over the same evaluation, for comparison with pruning.
    fn plain_minimax(
        state: &mut GameState,
        evaluator: Evaluator,
        depth: u32,
        maximizing: bool,
        last_move: Option<MetaMove>,
    ) -> (i32, Option<MetaMove>) {
        let status = state.status();
        if depth == 0 || status == GameStatus::WonByX || status == GameStatus::WonByO {
            return (evaluator.evaluate(state), last_move);
        }
        let moves = state.moves_following(last_move);
        if moves.is_empty() {
            return (evaluator.evaluate(state), None);
        }

        let mover = if maximizing {
            PlayerMarker::O
        } else {
            PlayerMarker::X
        };
        let mut best = (if maximizing { i32::MIN } else { i32::MAX }, None);
        for mv in moves {
            state.simulate(mv, mover);
            let (score, _) = plain_minimax(state, evaluator, depth - 1, !maximizing, Some(mv));
            state.undo(mv);
            let better = if maximizing {
                score > best.0
            } else {
                score < best.0
            };
            if better {
                best = (score, Some(mv));
            }
        }
        best
    }

    /// Position after X's move, O to play.
    fn o_to_move(seed: u64, plies: usize) -> Option<GameState> {
        random_game(seed, plies)
            .into_iter()
            .filter(|state| {
                state.current_player() == PlayerMarker::O && !state.status().is_over()
            })
            .last()
    }

    #[test]
    fn search_restores_state() {
        for seed in 0..10 {
            let Some(mut state) = o_to_move(seed, 30) else {
                continue;
            };
            let before = state.clone();
            let last = state.last_move();
            let mut searcher = Searcher::new();
            searcher.search(&mut state, 3, last).unwrap();
            assert_eq!(state, before);
        }
    }

    #[test]
    fn takes_sub_board_win() {
        let mut state = GameState::new();
        state
            .apply_move(MetaMove::new(0, 0, 1, 1), PlayerMarker::X)
            .unwrap();
        state
            .apply_move(MetaMove::new(1, 1, 0, 0), PlayerMarker::O)
            .unwrap();
        state
            .apply_move(MetaMove::new(0, 0, 0, 0), PlayerMarker::X)
            .unwrap();
        state
            .apply_move(MetaMove::new(0, 0, 2, 0), PlayerMarker::O)
            .unwrap();
        state
            .apply_move(MetaMove::new(2, 0, 1, 1), PlayerMarker::X)
            .unwrap();
        state
            .apply_move(MetaMove::new(1, 1, 0, 1), PlayerMarker::O)
            .unwrap();
        state
            .apply_move(MetaMove::new(0, 1, 1, 1), PlayerMarker::X)
            .unwrap();
        assert_eq!(state.current_player(), PlayerMarker::O);
        assert_eq!(
            state.active(),
            crate::game::ActiveBoard::Only {
                macro_row: 1,
                macro_col: 1
            }
        );

        // O owns cells (0,0) and (0,1) of the centre board.
        let last = state.last_move();
        for depth in 1..=3 {
            let mut searcher = Searcher::new();
            let result = searcher.search(&mut state, depth, last).unwrap();
            assert_eq!(result.best_move, MetaMove::new(1, 1, 0, 2), "depth {depth}");
            assert_eq!(result.score, LINE_SCORE, "depth {depth}");
        }
        assert_eq!(
            best_move(&mut state, 1, last),
            Ok(MetaMove::new(1, 1, 0, 2))
        );
    }

    #[test]
    fn forced_win_chosen_at_default_depth() {
        let mut state = GameState::new();
        force(&mut state, MetaMove::new(2, 1, 1, 0), PlayerMarker::O);
        force(&mut state, MetaMove::new(2, 1, 1, 1), PlayerMarker::O);
        force(&mut state, MetaMove::new(0, 0, 2, 1), PlayerMarker::X);
        // X just played cell (2,1), sending O to board (2,1).
        let last = Some(MetaMove::new(0, 0, 2, 1));

        let mv = best_move(&mut state, DEFAULT_DEPTH, last).unwrap();
        assert_eq!(mv, MetaMove::new(2, 1, 1, 2));
        let mv = best_move(&mut state, 1, last).unwrap();
        assert_eq!(mv, MetaMove::new(2, 1, 1, 2));
    }

    #[test]
    fn depth_zero_still_moves() {
        let mut state = GameState::new();
        state
            .apply_move(MetaMove::new(1, 1, 1, 1), PlayerMarker::X)
            .unwrap();
        let last = state.last_move();
        let mv = best_move(&mut state, 0, last).unwrap();
        assert!(state.is_legal(mv));
    }

    #[test]
    fn search_is_deterministic() {
        let mut state = o_to_move(11, 25).unwrap();
        let last = state.last_move();
        let first = Searcher::new()
            .search(&mut state, DEFAULT_DEPTH, last)
            .unwrap();
        let second = Searcher::new()
            .search(&mut state, DEFAULT_DEPTH, last)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn chosen_move_is_legal() {
        for seed in 0..25 {
            let Some(mut state) = o_to_move(seed, 40) else {
                continue;
            };
            if state.legal_moves().is_empty() {
                continue;
            }
            let last = state.last_move();
            let mv = best_move(&mut state, DEFAULT_DEPTH, last).unwrap();
            assert!(state.is_legal(mv), "seed {seed}: {mv} is not legal");
        }
    }

    #[test]
    fn pruning_matches_full_width_minimax() {
        for evaluator in [Evaluator::SubBoardLines, Evaluator::MacroAware] {
            for seed in 0..12 {
                for plies in [1, 9, 21, 35] {
                    let Some(mut state) = o_to_move(seed, plies) else {
                        continue;
                    };
                    let last = state.last_move();
                    for depth in 1..=3 {
                        let mut searcher = Searcher::with_evaluator(evaluator);
                        let pruned = searcher.search(&mut state, depth, last);
                        let (score, mv) = plain_minimax(&mut state, evaluator, depth, true, last);
                        match (pruned, mv) {
                            (Ok(result), Some(mv)) => {
                                assert_eq!(result.best_move, mv, "seed {seed} depth {depth}");
                                assert_eq!(result.score, score, "seed {seed} depth {depth}");
                            }
                            (Err(GameError::NoLegalMoves), None) => {}
                            (pruned, mv) => panic!("mismatch: {pruned:?} vs {mv:?}"),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn pruning_visits_fewer_nodes() {
        let mut state = o_to_move(5, 2).unwrap();
        let last = state.last_move();
        let mut searcher = Searcher::new();
        let result = searcher.search(&mut state, 3, last).unwrap();
        // Full width from a 9-move board is 1 + 9 + 81 + 729-ish.
        assert!(result.nodes < 1 + 9 + 9 * 9 + 9 * 9 * 9);
    }

    #[test]
    fn finished_game_is_rejected() {
        let mut state = GameState::new();
        for board in [0, 4, 8] {
            for cell in 0..3 {
                force(&mut state, MetaMove::from_indices(board, cell), PlayerMarker::X);
            }
        }
        assert_eq!(state.status(), GameStatus::WonByX);
        assert_eq!(
            best_move(&mut state, DEFAULT_DEPTH, None),
            Err(GameError::GameOver {
                status: GameStatus::WonByX
            })
        );
    }

    #[test]
    fn drawn_macro_grid_has_no_moves() {
        let mut state = GameState::new();
        for board in 0..9 {
            for (cell, mark) in "XOXXOOOXX".chars().enumerate() {
                let player = if mark == 'X' {
                    PlayerMarker::X
                } else {
                    PlayerMarker::O
                };
                force(&mut state, MetaMove::from_indices(board, cell), player);
            }
        }
        assert_eq!(state.status(), GameStatus::Drawn);
        assert!(state.legal_moves().is_empty());

        let before = state.clone();
        assert_eq!(
            best_move(&mut state, DEFAULT_DEPTH, None),
            Err(GameError::NoLegalMoves)
        );
        let last = Some(MetaMove::new(1, 1, 1, 1));
        assert_eq!(
            Searcher::new().search(&mut state, 1, last),
            Err(GameError::NoLegalMoves)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn default_evaluation_ignores_settled_boards() {
        let mut state = GameState::new();
        for cell in 0..3 {
            force(&mut state, MetaMove::from_indices(0, cell), PlayerMarker::O);
        }
        assert_eq!(Evaluator::SubBoardLines.evaluate(&state), 0);

        force(&mut state, MetaMove::new(1, 1, 0, 0), PlayerMarker::X);
        force(&mut state, MetaMove::new(1, 1, 1, 1), PlayerMarker::X);
        let mv = MetaMove::new(1, 1, 2, 2);
        state.simulate(mv, PlayerMarker::X);
        assert_eq!(Evaluator::SubBoardLines.evaluate(&state), -LINE_SCORE);
        state.undo(mv);
        assert_eq!(Evaluator::SubBoardLines.evaluate(&state), 0);
    }

    #[test]
    fn macro_aware_rewards_macro_threats() {
        let mut state = GameState::new();
        for board in [0, 4] {
            for cell in 0..3 {
                force(&mut state, MetaMove::from_indices(board, cell), PlayerMarker::O);
            }
        }
        // Boards 0 and 4 lie together only on the main diagonal.
        assert_eq!(Evaluator::SubBoardLines.evaluate(&state), 0);
        assert_eq!(Evaluator::MacroAware.evaluate(&state), MACRO_THREAT_SCORE);
    }
}
