use tracing::{debug, info};

use crate::error::GameError;
use crate::game::{GameState, GameStatus, MetaMove, PlayerMarker};
use crate::player::Player;

/// One game between an X player and an O player.
///
/// Every move goes through [`GameState::apply_move`], so a player cannot bypass
/// the rules.
pub struct Session {
    player_x: Box<dyn Player>,
    player_o: Box<dyn Player>,
    state: GameState,
}

impl Session {
    pub fn new(player_x: Box<dyn Player>, player_o: Box<dyn Player>) -> Self {
        debug_assert_eq!(player_x.marker(), PlayerMarker::X);
        debug_assert_eq!(player_o.marker(), PlayerMarker::O);
        Session {
            player_x,
            player_o,
            state: GameState::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Asks the player to move and applies the move. A rejected move is returned
    /// as an error and the position stays as it was, so the caller may ask again.
    pub fn step(&mut self) -> Result<(MetaMove, GameStatus), GameError> {
        let marker = self.state.current_player();
        let player = match marker {
            PlayerMarker::X => &mut self.player_x,
            _ => &mut self.player_o,
        };

        let mv = player.get_move(self.state.clone())?;
        let status = self.state.apply_move(mv, marker)?;
        debug!(%mv, %marker, %status, "turn played");
        Ok((mv, status))
    }

    /// Plays until the game is decided. `on_move` sees the position after each move.
    ///
    /// Errors from a player abort the game; see [`Session::step`] for retrying instead.
    pub fn play<F>(&mut self, mut on_move: F) -> Result<GameStatus, GameError>
    where
        F: FnMut(&GameState, MetaMove),
    {
        while !self.state.status().is_over() {
            let (mv, _) = self.step()?;
            on_move(&self.state, mv);
        }
        info!(status = %self.state.status(), "game finished");
        Ok(self.state.status())
    }

    /// Starts a fresh game with the same players.
    pub fn restart(&mut self) {
        self.state.reset();
    }
}
