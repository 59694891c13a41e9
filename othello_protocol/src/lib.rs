// othello_protocol: wire protocol between Othello clients and the relay.
//
// A message is one UTF-8 line: a keyword, then space-separated fields. The
// relay only ever looks at the keyword; everything else is interpreted by the
// two clients, each against its own copy of the game.
//
// Module overview:
// - `types.rs`:    `UserId`, `RoomId`, `SeatColor`.
// - `message.rs`:  `ProtocolMessage` with `encode()` / `decode()`, plus the
//                  keyword constants.
// - `framing.rs`:  Newline framing over any `BufRead`/`Write` stream, with a
//                  cap on line length.
//
// Design decisions:
// - **Best-effort decoding.** `decode` returns `None` for unknown keywords and
//   structurally broken lines, and numeric fields that fail to parse read as
//   0. One bad line never ends a connection.
// - **No async runtime.** Plain blocking `std::io`, same as the relay.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_LINE_LEN, read_line, write_line, write_message};
pub use message::{MinigameReport, ProtocolMessage};
pub use types::{RoomId, SeatColor, UserId};
