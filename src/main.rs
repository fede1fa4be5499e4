use std::{
    error::Error,
    io::{self, BufRead, Write},
};

use clap::{Parser, ValueEnum};
use colored::{ColoredString, Colorize};
use meta_tictactoe::{
    game::{BOARD_SIZE, REGIONS},
    player::{ComputerPlayer, Player, RandomPlayer},
    session::Session,
    GameError, GameState, GameStatus, MetaMove, Outcome, PlayerMarker,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "meta-tictactoe",
    version,
    about = "Ultimate tic-tac-toe against an alpha-beta computer player"
)]
struct Cli {
    /// Play as X against the computer, or watch a random player take it on.
    #[arg(long, value_enum, default_value_t = Mode::Play)]
    mode: Mode,

    /// Number of games in watch mode.
    #[arg(long, default_value_t = 10)]
    games: usize,

    /// Seed for the random player in watch mode.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Play,
    Watch,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    info!(?cli, "starting");
    match cli.mode {
        Mode::Play => play(),
        Mode::Watch => watch(cli.games, cli.seed),
    }
}

// ##############################
// # Human vs Computer
// ##############################

/// Reads X's moves from a line-based input, one move per line.
struct HumanPlayer<R> {
    input: R,
}

impl<R: BufRead> HumanPlayer<R> {
    fn new(input: R) -> Self {
        HumanPlayer { input }
    }
}

impl<R: BufRead> Player for HumanPlayer<R> {
    fn marker(&self) -> PlayerMarker {
        PlayerMarker::X
    }

    /// End of input, a read error, `q` or `quit` all resign the game.
    fn get_move(&mut self, _state: GameState) -> Result<MetaMove, GameError> {
        print!("{} > ", "X".red().bold());
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = self.input.read_line(&mut line).unwrap_or(0);
        let input = line.trim();
        if read == 0 || input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
            return Err(GameError::Resigned {
                player: PlayerMarker::X,
            });
        }
        input.parse()
    }
}

fn play() -> Result<(), Box<dyn Error>> {
    println!("You are X. Enter moves as: macro-row macro-col row col (each 0-2), q to quit.");
    loop {
        // The session holds the stdin lock until the game is over.
        let mut session = Session::new(
            Box::new(HumanPlayer::new(io::stdin().lock())),
            Box::new(ComputerPlayer::new()),
        );
        println!("{}", render(session.state()));

        while !session.state().status().is_over() {
            match session.step() {
                Ok((mv, _)) => {
                    if session.state().current_player() == PlayerMarker::X {
                        println!("Computer plays {}", mv.to_string().blue().bold());
                    }
                    println!("{}", render(session.state()));
                }
                Err(GameError::Resigned { .. }) => return Ok(()),
                Err(e @ (GameError::ParseMove { .. } | GameError::IllegalMove { .. })) => {
                    println!("{}", e.to_string().red());
                }
                Err(e) => return Err(e.into()),
            }
        }
        announce(session.state().status());
        drop(session);

        print!("Play again? [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }
}

// ##############################
// # Random vs Computer
// ##############################

fn watch(games: usize, seed: Option<u64>) -> Result<(), Box<dyn Error>> {
    let (mut wins_x, mut wins_o, mut draws) = (0, 0, 0);

    for game in 0..games {
        let random = match seed {
            Some(seed) => RandomPlayer::seeded(PlayerMarker::X, seed.wrapping_add(game as u64)),
            None => RandomPlayer::new(PlayerMarker::X),
        };
        let mut session = Session::new(Box::new(random), Box::new(ComputerPlayer::new()));

        println!("Game {}", game + 1);
        let status = session.play(|_, mv| info!(%mv, "move"))?;
        println!("{}", render(session.state()));
        announce(status);

        match status {
            GameStatus::WonByX => wins_x += 1,
            GameStatus::WonByO => wins_o += 1,
            GameStatus::Drawn | GameStatus::InProgress => draws += 1,
        }
    }

    println!(
        "Random (X): {} | Computer (O): {} | Draws: {}",
        wins_x.to_string().red(),
        wins_o.to_string().blue(),
        draws.to_string().yellow()
    );
    Ok(())
}

// ##############################
// # Rendering
// ##############################

fn announce(status: GameStatus) {
    let message = match status {
        GameStatus::WonByX => "Player X wins!".red().bold(),
        GameStatus::WonByO => "Computer (O) wins!".blue().bold(),
        GameStatus::Drawn => "It's a draw!".yellow().bold(),
        GameStatus::InProgress => return,
    };
    println!("{}", message);
}

/// Board with the playable region highlighted and decided sub-boards dimmed.
fn render(state: &GameState) -> String {
    let playable = state.playable_regions();
    let mut out = state.render_with(|mv| {
        let open = playable.contains(REGIONS[mv.macro_row * BOARD_SIZE + mv.macro_col]);
        let outcome = state.outcome(mv.macro_row, mv.macro_col);
        paint(state.cell(mv), outcome, open).to_string()
    });

    out.push_str("Sub-boards: ");
    for macro_row in 0..BOARD_SIZE {
        for macro_col in 0..BOARD_SIZE {
            out.push(match state.outcome(macro_row, macro_col) {
                Outcome::WonByX => 'X',
                Outcome::WonByO => 'O',
                Outcome::Drawn => 'D',
                Outcome::Undecided => '.',
            });
        }
        if macro_row + 1 < BOARD_SIZE {
            out.push('/');
        }
    }
    out
}

fn paint(mark: PlayerMarker, outcome: Outcome, open: bool) -> ColoredString {
    let symbol = mark.to_char().to_string();
    let painted = match mark {
        PlayerMarker::X => symbol.red().bold(),
        PlayerMarker::O => symbol.blue().bold(),
        PlayerMarker::Empty if open => symbol.yellow(),
        PlayerMarker::Empty => symbol.normal(),
    };
    if outcome.is_decided() {
        painted.dimmed()
    } else {
        painted
    }
}
