// Console front end for Othello.
//
// Usage:
//   othello local                                  two players, one keyboard
//   othello oracle [--difficulty easy|medium] [--computer black|white]
//   othello online [--config FILE] [--server-ip IP] [--server-port PORT]
//                  [--user NAME] [--peer-pick]
//
// A background thread forwards stdin lines over a channel. The main loop
// waits on that channel with a short timeout so it can also advance running
// minigame clocks and, online, drain network events. All game state lives
// on the main thread.
//
// Commands: `move X Y` (or just `X Y`), `chance memory|reaction|dodge`,
// `flip N`, `press`, `shoot`, `hit`, `board`, `help`, `quit`.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use othello_client::{ClientConfig, ClientSession, ForcedPick, LocalGame, SessionEvent};
use othello_engine::minigame::MEMORY_CARDS;
use othello_engine::{
    ChanceReport, ChanceResolution, Color, Coord, Difficulty, Minigame, MinigameCoordinator,
    MinigameKind, TurnController, TurnReport,
};
use rand::Rng;

/// How often running minigames advance their clock.
const TICK: Duration = Duration::from_secs(1);

/// Longest wait for input before checking the network again.
const POLL: Duration = Duration::from_millis(100);

/// Two-player Othello with chance minigames
#[derive(Parser)]
#[command(name = "othello", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two players sharing this terminal
    Local,
    /// Play against the computer
    Oracle {
        #[arg(long, default_value = "easy")]
        difficulty: Difficulty,
        /// Computer's color (random if omitted)
        #[arg(long)]
        computer: Option<Side>,
    },
    /// Play against someone else through a relay
    Online {
        /// YAML file with any subset of `ClientConfig` fields
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        server_ip: Option<String>,
        #[arg(long)]
        server_port: Option<u16>,
        #[arg(long)]
        user: Option<String>,
        /// After winning a chance event, let the opponent pick its forced move
        #[arg(long)]
        peer_pick: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Black,
    White,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::Black => Color::Black,
            Side::White => Color::White,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Move(Coord),
    Chance(MinigameKind),
    Flip(usize),
    Press,
    Shoot,
    Hit,
    Board,
    Help,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match Cli::parse().command {
        Commands::Local => run_local(LocalGame::two_player(MinigameCoordinator::new())),
        Commands::Oracle {
            difficulty,
            computer,
        } => {
            let computer = match computer {
                Some(side) => side.into(),
                None if rand::rng().random_bool(0.5) => Color::Black,
                None => Color::White,
            };
            println!("Computer ({difficulty}) plays {computer}.");
            run_local(LocalGame::against_oracle(
                difficulty.oracle(),
                computer,
                MinigameCoordinator::new(),
            ))
        }
        Commands::Online {
            config,
            server_ip,
            server_port,
            user,
            peer_pick,
        } => {
            let mut config = match &config {
                Some(path) => read_config_file(path)?,
                None => ClientConfig::default(),
            };
            if let Some(ip) = server_ip {
                config.server_ip = ip;
            }
            if let Some(port) = server_port {
                config.server_port = port;
            }
            if let Some(user) = user {
                config.user_id = user;
            }
            let session = ClientSession::connect(&config)
                .with_context(|| format!("Failed to connect to {}", config.server_addr()))?;
            let pick = if peer_pick {
                ForcedPick::Peer
            } else {
                ForcedPick::Local
            };
            run_online(session, pick)
        }
    }
}

fn read_config_file(path: &Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_command(line: &str) -> Option<Command> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let coord = |x: &str, y: &str| Some(Coord::new(x.parse().ok()?, y.parse().ok()?));
    let command = match words[..] {
        ["move" | "m", x, y] => Command::Move(coord(x, y)?),
        ["chance" | "c", kind] => Command::Chance(kind.parse().ok()?),
        ["flip" | "f", index] => Command::Flip(index.parse().ok()?),
        ["press" | "p"] => Command::Press,
        ["shoot" | "s"] => Command::Shoot,
        ["hit"] => Command::Hit,
        ["board" | "b"] => Command::Board,
        ["help" | "h" | "?"] => Command::Help,
        ["quit" | "q" | "exit"] => Command::Quit,
        [x, y] => Command::Move(coord(x, y)?),
        _ => return None,
    };
    Some(command)
}

fn print_help() {
    println!("Commands:");
    println!("  move X Y   (or X Y)   place a disc, 0-based column and row");
    println!("  chance KIND           play a chance card: memory, reaction or dodge");
    println!("  flip N                memory: turn over card N (0-{})", MEMORY_CARDS - 1);
    println!("  press                 reaction: press once the signal shows");
    println!("  shoot / hit           dodge: shoot a target down / take a hit");
    println!("  board, help, quit");
}

fn print_board(turns: &TurnController) {
    println!("{}", turns.board());
    let (black, white) = turns.scores();
    match turns.current_turn() {
        Some(color) => println!("Black {black} - White {white}, {color} to move"),
        None => println!("Black {black} - White {white}"),
    }
}

fn print_move(report: &TurnReport) {
    println!(
        "{} played {}, flipping {}",
        report.mover,
        report.coord,
        report.flipped.len()
    );
    if let Some(color) = report.passed {
        println!("{color} has no legal move and passes.");
    }
}

fn print_chance(report: &ChanceReport) {
    match &report.resolution {
        ChanceResolution::ForcedMove { color, coord, .. } => {
            println!("Chance won by {}: {color} was forced to play {coord}.", report.owner)
        }
        ChanceResolution::NoLegalMove { color } => {
            println!("Chance won by {}, but {color} had no move.", report.owner)
        }
        ChanceResolution::Rejected { color, coord } => {
            println!("Chance won by {}, but {coord} is not legal for {color} here.", report.owner)
        }
        ChanceResolution::Failed => println!("Chance lost by {}.", report.owner),
    }
    if let Some(color) = report.passed {
        println!("{color} has no legal move and passes.");
    }
}

fn describe_minigame(minigame: &Minigame) -> String {
    match minigame {
        Minigame::Memory(game) => {
            let cards: Vec<String> = (0..MEMORY_CARDS)
                .map(|index| {
                    if game.is_face_up(index) {
                        game.values()[index].to_string()
                    } else {
                        "*".to_owned()
                    }
                })
                .collect();
            format!("memory [{}], {} pairs found", cards.join(" "), game.pairs_found())
        }
        Minigame::Reaction(game) if game.signal_shown() => "reaction: NOW! press".to_owned(),
        Minigame::Reaction(_) => "reaction: wait for it...".to_owned(),
        Minigame::Dodge(game) => format!("dodge: score {}, lives {}", game.score(), game.lives()),
    }
}

/// Apply a minigame command. False if it does not fit the running game.
fn drive_minigame(minigame: &mut Minigame, command: Command, started: Instant) -> bool {
    match (minigame, command) {
        (Minigame::Memory(game), Command::Flip(index)) => game.flip(index),
        (Minigame::Reaction(game), Command::Press) => {
            let at_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            game.press(at_ms);
            true
        }
        (Minigame::Dodge(game), Command::Shoot) => {
            game.shoot_down();
            true
        }
        (Minigame::Dodge(game), Command::Hit) => {
            game.hit();
            true
        }
        _ => false,
    }
}

fn run_local(mut game: LocalGame) -> Result<()> {
    let input = spawn_stdin_reader();
    let mut chance_started = Instant::now();
    print_help();
    print_board(game.turns());

    loop {
        if let Some(result) = game.oracle_move() {
            print_move(&result?);
            print_board(game.turns());
            continue;
        }
        if let Some(outcome) = game.turns().outcome() {
            println!("Game over: {outcome}");
            return Ok(());
        }

        let line = match input.recv_timeout(TICK) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(minigame) = game.minigame_mut() {
                    minigame.tick_second();
                    if minigame.is_finished() {
                        print_chance(&game.close_minigame()?);
                        print_board(game.turns());
                    } else {
                        println!("{}", describe_minigame(minigame));
                    }
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };
        let Some(command) = parse_command(&line) else {
            println!("Unknown command, try `help`.");
            continue;
        };

        match command {
            Command::Quit => return Ok(()),
            Command::Help => print_help(),
            Command::Board => print_board(game.turns()),
            Command::Move(coord) => match game.play_move(coord) {
                Ok(report) => {
                    print_move(&report);
                    print_board(game.turns());
                }
                Err(e) => println!("{e}"),
            },
            Command::Chance(kind) => match game.start_chance(kind) {
                Ok(owner) => {
                    chance_started = Instant::now();
                    println!("{owner} plays the {kind} card.");
                    if let Some(minigame) = game.minigame() {
                        println!("{}", describe_minigame(minigame));
                    }
                }
                Err(e) => println!("{e}"),
            },
            other => {
                let Some(minigame) = game.minigame_mut() else {
                    println!("No minigame is running.");
                    continue;
                };
                if !drive_minigame(minigame, other, chance_started) {
                    println!("That does not apply to {}.", minigame.kind());
                    continue;
                }
                if minigame.is_finished() {
                    print_chance(&game.close_minigame()?);
                    print_board(game.turns());
                } else {
                    println!("{}", describe_minigame(minigame));
                }
            }
        }
    }
}

fn print_event(session: &ClientSession, event: &SessionEvent) {
    match event {
        SessionEvent::Matched { color, opponent } => {
            let opponent = opponent.as_ref().map_or("someone", |user| user.as_str());
            println!("Matched against {opponent}. You play {color}.");
            print_board(session.turns());
        }
        SessionEvent::OpponentMoved(report) => {
            print_move(report);
            print_board(session.turns());
        }
        SessionEvent::Passed(_) => {}
        SessionEvent::GameOver(outcome) => println!("Game over: {outcome}"),
        SessionEvent::MinigameStarted { kind, owner } => {
            println!("{owner} played the {kind} card. Watching...")
        }
        SessionEvent::MinigameUpdated(_) => {
            if let Some(minigame) = session.minigame() {
                println!("  {}", describe_minigame(minigame));
            }
        }
        SessionEvent::MinigameClosed => println!("The minigame was closed."),
        SessionEvent::ChanceResolved(report) => {
            print_chance(report);
            print_board(session.turns());
        }
        SessionEvent::Desync(reason) => println!("Boards are out of sync: {reason}"),
        SessionEvent::OpponentLeft => println!("Your opponent left the game."),
        SessionEvent::ConnectionLost => println!("Connection to the relay was lost."),
    }
}

fn run_online(mut session: ClientSession, pick: ForcedPick) -> Result<()> {
    let input = spawn_stdin_reader();
    let mut chance_started = Instant::now();
    let mut last_tick = Instant::now();
    println!("Connected as {}. Waiting for an opponent...", session.user());

    loop {
        for event in session.poll() {
            print_event(&session, &event);
        }
        if !session.is_connected() {
            return Ok(());
        }

        if last_tick.elapsed() >= TICK {
            last_tick = Instant::now();
            if session.minigame_mut().is_some() {
                if session.tick_minigame() {
                    finish_online(&mut session, pick);
                } else {
                    session.publish_minigame_state()?;
                }
            }
        }

        let line = match input.recv_timeout(POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                session.disconnect();
                return Ok(());
            }
        };
        let Some(command) = parse_command(&line) else {
            println!("Unknown command, try `help`.");
            continue;
        };

        match command {
            Command::Quit => {
                session.disconnect();
                return Ok(());
            }
            Command::Help => print_help(),
            Command::Board => print_board(session.turns()),
            Command::Move(coord) => match session.play_move(coord) {
                Ok(report) => {
                    print_move(&report);
                    print_board(session.turns());
                    if let Some(outcome) = session.turns().outcome() {
                        println!("Game over: {outcome}");
                    }
                }
                Err(e) => println!("{e}"),
            },
            Command::Chance(kind) => match session.start_chance(kind) {
                Ok(()) => {
                    chance_started = Instant::now();
                    last_tick = chance_started;
                    if let Some(minigame) = session.minigame() {
                        println!("{}", describe_minigame(minigame));
                    }
                }
                Err(e) => println!("{e}"),
            },
            other => {
                let Some(minigame) = session.minigame_mut() else {
                    println!("You are not playing a minigame.");
                    continue;
                };
                if !drive_minigame(minigame, other, chance_started) {
                    println!("That does not apply to {}.", minigame.kind());
                    continue;
                }
                if minigame.is_finished() {
                    finish_online(&mut session, pick);
                } else {
                    println!("{}", describe_minigame(minigame));
                    session.publish_minigame_state()?;
                }
            }
        }
    }
}

fn finish_online(session: &mut ClientSession, pick: ForcedPick) {
    match session.close_minigame(pick) {
        Ok(Some(report)) => {
            print_chance(&report);
            print_board(session.turns());
        }
        Ok(None) => println!("Waiting for the opponent's forced move..."),
        Err(e) => println!("{e}"),
    }
}
