// othello_relay: matchmaking relay for two-player Othello.
//
// The relay is a thin line broker. It accepts TCP connections, pairs them
// first-come-first-served into rooms of two, tells each side its color, and
// from then on forwards every line one member sends to the other. It never
// runs the game; both clients keep their own board.
//
// Module overview:
// - `matchmaker.rs`: `Matchmaker`, the wait queue and room registry behind one
//                    mutex. Also owns the write half of every live connection.
// - `pool.rs`:       Fixed-size worker pool that runs connection handlers.
// - `server.rs`:     Listener thread, per-connection handshake and relay loop,
//                    `RelayConfig`, `start_relay`.
// - `client.rs`:     `NetClient`, the client side of a relay connection: a
//                    background reader thread feeding an `mpsc` channel.
//
// The relay runs as a standalone binary (`main.rs`) or embedded through
// `start_relay`, which is how the integration tests drive it.

pub mod client;
pub mod matchmaker;
pub mod pool;
pub mod server;

pub use client::{ClientError, NetClient, NetEvent};
pub use matchmaker::{ConnectionId, MatchOutcome, Matchmaker, Room};
pub use server::{RelayConfig, RelayHandle, start_relay};
