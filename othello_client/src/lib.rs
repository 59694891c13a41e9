// othello_client: the player-facing side of networked Othello.
//
// Ties the engine, the wire protocol and the relay's network client into
// playable games. Rendering is left to the front end; the `othello` console
// binary in `main.rs` is the one shipped here.
//
// Module overview:
// - `config.rs`:  `ClientConfig`, relay address and identity, YAML-loadable.
// - `session.rs`: `ClientSession`, an online game over one relay connection.
//                 Applies the peer's messages to the local board on the
//                 caller's thread and reports them as `SessionEvent`s.
// - `local.rs`:   `LocalGame`, for hot-seat play and games against a move
//                 oracle. No network involved.

pub mod config;
pub mod local;
pub mod session;

pub use config::ClientConfig;
pub use local::LocalGame;
pub use session::{ClientSession, ForcedPick, SessionError, SessionEvent};
