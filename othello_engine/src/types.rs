// Core types shared by the engine, the wire protocol and both clients.
//
// `Coord` uses signed components on purpose: coordinates arrive from the
// network as free-form integers (forced-move fields use `-1 -1` for "none"),
// and bounds are checked by the board rather than by the type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of the board.
pub const BOARD_SIZE: i32 = 8;

/// A player color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => write!(f, "Black"),
            Color::White => write!(f, "White"),
        }
    }
}

/// Contents of one board square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Black,
    White,
}

impl Cell {
    pub fn color(self) -> Option<Color> {
        match self {
            Cell::Empty => None,
            Cell::Black => Some(Color::Black),
            Cell::White => Some(Color::White),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Color> for Cell {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => Cell::Black,
            Color::White => Cell::White,
        }
    }
}

/// A board coordinate. `x` is the column, `y` the row, both 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.y)
    }

    pub(crate) fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Which components a game session activates. `Local` and `AgainstOracle`
/// never touch the network layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Local,
    Online,
    AgainstOracle,
}

impl GameMode {
    pub fn uses_network(self) -> bool {
        self == GameMode::Online
    }
}

/// Final result of a finished game, derived from disc counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    BlackWins,
    WhiteWins,
    Draw,
}

impl Outcome {
    pub fn from_scores(black: u32, white: u32) -> Self {
        match black.cmp(&white) {
            std::cmp::Ordering::Greater => Outcome::BlackWins,
            std::cmp::Ordering::Less => Outcome::WhiteWins,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            Outcome::BlackWins => Some(Color::Black),
            Outcome::WhiteWins => Some(Color::White),
            Outcome::Draw => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::BlackWins => write!(f, "Black wins"),
            Outcome::WhiteWins => write!(f, "White wins"),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_is_an_involution() {
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(Color::White.opponent().opponent(), Color::White);
    }

    #[test]
    fn coord_bounds() {
        assert!(Coord::new(0, 0).in_bounds());
        assert!(Coord::new(7, 7).in_bounds());
        assert!(!Coord::new(-1, 3).in_bounds());
        assert!(!Coord::new(3, 8).in_bounds());
    }

    #[test]
    fn cell_color_mapping() {
        assert_eq!(Cell::from(Color::White).color(), Some(Color::White));
        assert_eq!(Cell::Empty.color(), None);
        assert!(Cell::default().is_empty());
    }

    #[test]
    fn outcome_from_scores() {
        assert_eq!(Outcome::from_scores(40, 24), Outcome::BlackWins);
        assert_eq!(Outcome::from_scores(10, 54).winner(), Some(Color::White));
        assert_eq!(Outcome::from_scores(32, 32).winner(), None);
    }

    #[test]
    fn only_online_uses_network() {
        assert!(GameMode::Online.uses_network());
        assert!(!GameMode::Local.uses_network());
        assert!(!GameMode::AgainstOracle.uses_network());
    }
}
