// Protocol messages and their text encoding.
//
// Grammar (one message per line, fields separated by single spaces):
//
//   USER_ID <id>                                      client -> relay
//   START_BLACK [opponentId] / START_WHITE [opponentId] relay -> client
//   MOVE <x> <y>                                      either
//   MINIGAME_START <REACTION|MEMORY|DODGE>            either
//   MINIGAME_UPDATE <json>                            either
//   MINIGAME_RESULT <SUCCESS|FAIL> <score> <elapsedSeconds> <forcedX> <forcedY>
//   MINIGAME_CLOSE                                    either
//   RANDOM_MOVE                                       client -> relay
//   RANDOM_MOVE_EXECUTED                              relay -> client
//   OPPONENT_LEFT                                     relay -> client
//
// Forced coordinates are `-1 -1` when there is no forced move. The JSON
// payload of MINIGAME_UPDATE is the rest of the line, untouched.

use othello_engine::{Color, Coord, MinigameKind};

use crate::types::UserId;

pub const USER_ID: &str = "USER_ID";
pub const START_BLACK: &str = "START_BLACK";
pub const START_WHITE: &str = "START_WHITE";
pub const MOVE: &str = "MOVE";
pub const MINIGAME_START: &str = "MINIGAME_START";
pub const MINIGAME_UPDATE: &str = "MINIGAME_UPDATE";
pub const MINIGAME_RESULT: &str = "MINIGAME_RESULT";
pub const MINIGAME_CLOSE: &str = "MINIGAME_CLOSE";
pub const RANDOM_MOVE: &str = "RANDOM_MOVE";
pub const RANDOM_MOVE_EXECUTED: &str = "RANDOM_MOVE_EXECUTED";
pub const OPPONENT_LEFT: &str = "OPPONENT_LEFT";

const SUCCESS: &str = "SUCCESS";
const FAIL: &str = "FAIL";

/// Outcome of a chance minigame as reported to the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinigameReport {
    pub success: bool,
    pub score: i64,
    pub elapsed_seconds: i64,
    /// Move the sender applied on the receiver's behalf, if any.
    pub forced: Option<Coord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolMessage {
    Identify(UserId),
    AssignColor {
        color: Color,
        opponent: Option<UserId>,
    },
    Move(Coord),
    MinigameStart(MinigameKind),
    MinigameUpdate(String),
    MinigameResult(MinigameReport),
    MinigameClose,
    RequestRandomMove,
    RandomMoveExecuted,
    OpponentLeft,
}

/// First whitespace-delimited token of a line.
pub fn keyword_of(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Numeric field, 0 when it does not parse.
fn field(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0)
}

impl ProtocolMessage {
    pub fn keyword(&self) -> &'static str {
        match self {
            ProtocolMessage::Identify(_) => USER_ID,
            ProtocolMessage::AssignColor {
                color: Color::Black,
                ..
            } => START_BLACK,
            ProtocolMessage::AssignColor {
                color: Color::White,
                ..
            } => START_WHITE,
            ProtocolMessage::Move(_) => MOVE,
            ProtocolMessage::MinigameStart(_) => MINIGAME_START,
            ProtocolMessage::MinigameUpdate(_) => MINIGAME_UPDATE,
            ProtocolMessage::MinigameResult(_) => MINIGAME_RESULT,
            ProtocolMessage::MinigameClose => MINIGAME_CLOSE,
            ProtocolMessage::RequestRandomMove => RANDOM_MOVE,
            ProtocolMessage::RandomMoveExecuted => RANDOM_MOVE_EXECUTED,
            ProtocolMessage::OpponentLeft => OPPONENT_LEFT,
        }
    }

    /// The line for this message, without the trailing newline.
    pub fn encode(&self) -> String {
        let keyword = self.keyword();
        match self {
            ProtocolMessage::Identify(user) => format!("{keyword} {user}"),
            ProtocolMessage::AssignColor { opponent, .. } => match opponent {
                Some(user) => format!("{keyword} {user}"),
                None => keyword.to_owned(),
            },
            ProtocolMessage::Move(coord) => format!("{keyword} {} {}", coord.x, coord.y),
            ProtocolMessage::MinigameStart(kind) => format!("{keyword} {kind}"),
            ProtocolMessage::MinigameUpdate(json) => format!("{keyword} {json}"),
            ProtocolMessage::MinigameResult(report) => {
                let status = if report.success { SUCCESS } else { FAIL };
                let (fx, fy) = report.forced.map_or((-1, -1), |c| (c.x, c.y));
                format!(
                    "{keyword} {status} {} {} {fx} {fy}",
                    report.score, report.elapsed_seconds
                )
            }
            ProtocolMessage::MinigameClose
            | ProtocolMessage::RequestRandomMove
            | ProtocolMessage::RandomMoveExecuted
            | ProtocolMessage::OpponentLeft => keyword.to_owned(),
        }
    }

    /// Parse one line. Unknown keywords and structurally broken lines yield
    /// `None`.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (keyword, rest) = match line.split_once(' ') {
            Some((keyword, rest)) => (keyword, rest),
            None => (line, ""),
        };
        let mut fields = rest.split_whitespace();

        let message = match keyword {
            USER_ID => ProtocolMessage::Identify(UserId::new(rest)),
            START_BLACK | START_WHITE => ProtocolMessage::AssignColor {
                color: if keyword == START_BLACK {
                    Color::Black
                } else {
                    Color::White
                },
                opponent: fields.next().map(UserId::new),
            },
            MOVE => {
                let parts: Vec<&str> = fields.collect();
                let [x, y] = parts[..] else {
                    return None;
                };
                let x = field(Some(x));
                let y = field(Some(y));
                ProtocolMessage::Move(Coord::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
            }
            MINIGAME_START => ProtocolMessage::MinigameStart(fields.next()?.parse().ok()?),
            MINIGAME_UPDATE => ProtocolMessage::MinigameUpdate(rest.to_owned()),
            MINIGAME_RESULT => {
                let success = match fields.next()? {
                    SUCCESS => true,
                    FAIL => false,
                    _ => return None,
                };
                let score = field(fields.next());
                let elapsed_seconds = field(fields.next());
                let forced = match (fields.next(), fields.next()) {
                    (None, _) | (_, None) => None,
                    (fx, fy) => {
                        let (fx, fy) = (field(fx), field(fy));
                        match (i32::try_from(fx), i32::try_from(fy)) {
                            (Ok(x), Ok(y)) if x >= 0 && y >= 0 => Some(Coord::new(x, y)),
                            _ => None,
                        }
                    }
                };
                ProtocolMessage::MinigameResult(MinigameReport {
                    success,
                    score,
                    elapsed_seconds,
                    forced,
                })
            }
            MINIGAME_CLOSE => ProtocolMessage::MinigameClose,
            RANDOM_MOVE => ProtocolMessage::RequestRandomMove,
            RANDOM_MOVE_EXECUTED => ProtocolMessage::RandomMoveExecuted,
            OPPONENT_LEFT => ProtocolMessage::OpponentLeft,
            _ => return None,
        };
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn move_round_trip() {
        let line = ProtocolMessage::Move(Coord::new(3, 4)).encode();
        assert_eq!(line, "MOVE 3 4");
        assert_eq!(
            ProtocolMessage::decode(&line),
            Some(ProtocolMessage::Move(Coord::new(3, 4)))
        );
    }

    #[test]
    fn unknown_and_empty_lines_are_ignored() {
        assert_eq!(ProtocolMessage::decode("CHAT hello"), None);
        assert_eq!(ProtocolMessage::decode(""), None);
        assert_eq!(ProtocolMessage::decode("move 1 2"), None);
    }

    #[test]
    fn move_needs_exactly_two_fields() {
        assert_eq!(ProtocolMessage::decode("MOVE 3"), None);
        assert_eq!(ProtocolMessage::decode("MOVE 1 2 3"), None);
    }

    #[test]
    fn bad_numbers_read_as_zero() {
        assert_eq!(
            ProtocolMessage::decode("MOVE x 5"),
            Some(ProtocolMessage::Move(Coord::new(0, 5)))
        );
        assert_eq!(
            ProtocolMessage::decode("MINIGAME_RESULT SUCCESS lots 2 1 1"),
            Some(ProtocolMessage::MinigameResult(MinigameReport {
                success: true,
                score: 0,
                elapsed_seconds: 2,
                forced: Some(Coord::new(1, 1)),
            }))
        );
    }

    #[test]
    fn color_assignment() {
        assert_eq!(
            ProtocolMessage::decode("START_BLACK bob\r\n"),
            Some(ProtocolMessage::AssignColor {
                color: Color::Black,
                opponent: Some(UserId::new("bob")),
            })
        );
        assert_eq!(
            ProtocolMessage::decode("START_WHITE"),
            Some(ProtocolMessage::AssignColor {
                color: Color::White,
                opponent: None,
            })
        );
        let line = ProtocolMessage::AssignColor {
            color: Color::White,
            opponent: Some(UserId::new("amy")),
        }
        .encode();
        assert_eq!(line, "START_WHITE amy");
    }

    #[test]
    fn identify_keeps_whole_id() {
        assert_eq!(
            ProtocolMessage::decode("USER_ID alice"),
            Some(ProtocolMessage::Identify(UserId::new("alice")))
        );
        assert_eq!(
            ProtocolMessage::decode("USER_ID"),
            Some(ProtocolMessage::Identify(UserId::guest()))
        );
    }

    #[test]
    fn minigame_result_encoding() {
        let none = ProtocolMessage::MinigameResult(MinigameReport {
            success: false,
            score: 3,
            elapsed_seconds: 30,
            forced: None,
        });
        assert_eq!(none.encode(), "MINIGAME_RESULT FAIL 3 30 -1 -1");
        assert_eq!(ProtocolMessage::decode(&none.encode()), Some(none));

        let forced = ProtocolMessage::MinigameResult(MinigameReport {
            success: true,
            score: 0,
            elapsed_seconds: 0,
            forced: Some(Coord::new(2, 5)),
        });
        assert_eq!(forced.encode(), "MINIGAME_RESULT SUCCESS 0 0 2 5");
        assert_eq!(ProtocolMessage::decode("MINIGAME_RESULT MAYBE 0 0 1 1"), None);
        assert_eq!(
            ProtocolMessage::decode("MINIGAME_RESULT SUCCESS 9 4"),
            Some(ProtocolMessage::MinigameResult(MinigameReport {
                success: true,
                score: 9,
                elapsed_seconds: 4,
                forced: None,
            }))
        );
    }

    #[test]
    fn minigame_start_and_update() {
        assert_eq!(
            ProtocolMessage::decode("MINIGAME_START MEMORY"),
            Some(ProtocolMessage::MinigameStart(MinigameKind::Memory))
        );
        assert_eq!(ProtocolMessage::decode("MINIGAME_START TETRIS"), None);
        assert_eq!(ProtocolMessage::MinigameStart(MinigameKind::Dodge).encode(), "MINIGAME_START DODGE");

        let json = r#"{"score":4, "lives":2}"#;
        let line = format!("MINIGAME_UPDATE {json}");
        assert_eq!(
            ProtocolMessage::decode(&line),
            Some(ProtocolMessage::MinigameUpdate(json.to_owned()))
        );
    }

    #[test]
    fn bare_keywords() {
        for message in [
            ProtocolMessage::MinigameClose,
            ProtocolMessage::RequestRandomMove,
            ProtocolMessage::RandomMoveExecuted,
            ProtocolMessage::OpponentLeft,
        ] {
            assert_eq!(ProtocolMessage::decode(&message.encode()), Some(message));
        }
        assert_eq!(keyword_of("RANDOM_MOVE  "), RANDOM_MOVE);
        assert_eq!(keyword_of(""), "");
    }
}
