// othello_engine: pure game logic for networked Othello.
//
// Everything in this crate is deterministic given its inputs (randomness is
// injected through seeded or OS-backed `StdRng` handles) and performs no I/O.
// Both the relay clients and the local/oracle game driver build on it. The
// relay server never does; it only forwards lines.
//
// Module overview:
// - `types.rs`:    Color, Cell, Coord, GameMode, Outcome.
// - `board.rs`:    8x8 board, flip computation, legality, scoring.
// - `turn.rs`:     Whose-turn / pass / game-over state machine over a board.
// - `chance.rs`:   Chance cards and the coordinator that turns a minigame
//                  outcome into a forced move for the non-owning color.
// - `minigame.rs`: The closed set of minigames (memory, reaction, dodge) and
//                  their JSON snapshots for spectator sync.
// - `oracle.rs`:   Move-selection oracle trait plus two local oracles.
//
// Design decisions:
// - **No move history.** Scores are recomputed by counting cells; the only
//   state is the board plus the turn state.
// - **Forced moves bypass `submit_move`.** They go through crate-private
//   controller methods so the normal turn transition can't be used to
//   inject them by accident.

pub mod board;
pub mod chance;
pub mod minigame;
pub mod oracle;
pub mod turn;
pub mod types;

pub use board::Board;
pub use chance::{
    ChanceCards, ChanceError, ChanceReport, ChanceResolution, ForcedMoveSource,
    MinigameCoordinator, owner_for,
};
pub use minigame::{Minigame, MinigameKind, MinigameOutcome};
pub use oracle::{Difficulty, GreedyOracle, MoveOracle, RandomOracle};
pub use turn::{MoveError, TurnController, TurnReport, TurnState};
pub use types::{BOARD_SIZE, Cell, Color, Coord, GameMode, Outcome};
