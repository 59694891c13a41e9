// Identifier types shared by the relay and the clients.
//
// `UserId` travels as a single whitespace-free token on the wire, so
// construction normalises it: surrounding whitespace is trimmed, inner
// whitespace becomes `_`, and an empty id becomes `Guest`.

use std::fmt;

use othello_engine::Color;
use serde::{Deserialize, Serialize};

const GUEST: &str = "Guest";

/// A player's self-declared identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: &str) -> Self {
        let token: String = raw
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        if token.is_empty() {
            Self::guest()
        } else {
            Self(token)
        }
    }

    pub fn guest() -> Self {
        Self(GUEST.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relay-assigned room number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// A client's color before and after the relay assigns one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatColor {
    #[default]
    Unassigned,
    Assigned(Color),
}

impl SeatColor {
    pub fn color(self) -> Option<Color> {
        match self {
            SeatColor::Unassigned => None,
            SeatColor::Assigned(color) => Some(color),
        }
    }
}

impl From<Color> for SeatColor {
    fn from(color: Color) -> Self {
        SeatColor::Assigned(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_is_a_single_token() {
        assert_eq!(UserId::new("  ann lee \n").as_str(), "ann_lee");
        assert_eq!(UserId::new("   "), UserId::guest());
        assert_eq!(UserId::guest().to_string(), "Guest");
    }

    #[test]
    fn seat_color_starts_unassigned() {
        assert_eq!(SeatColor::default().color(), None);
        assert_eq!(SeatColor::from(Color::White).color(), Some(Color::White));
    }
}
