// Move-selection oracles for games against the computer.
//
// An oracle only ever proposes a coordinate; the caller still submits it
// through the turn controller, so a misbehaving oracle cannot corrupt the
// board.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::board::Board;
use crate::types::{Color, Coord};

pub trait MoveOracle {
    /// A legal move for `color`, or `None` if it has none.
    fn choose(&mut self, board: &Board, color: Color) -> Option<Coord>;
}

/// Uniformly random legal move.
pub struct RandomOracle {
    rng: StdRng,
}

impl Default for RandomOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomOracle {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl MoveOracle for RandomOracle {
    fn choose(&mut self, board: &Board, color: Color) -> Option<Coord> {
        board.legal_moves(color).choose(&mut self.rng).copied()
    }
}

/// Takes the move that flips the most discs; ties go to the first move in
/// row-major order.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyOracle;

impl MoveOracle for GreedyOracle {
    fn choose(&mut self, board: &Board, color: Color) -> Option<Coord> {
        let mut best: Option<(Coord, usize)> = None;
        for coord in board.legal_moves(color) {
            let flips = board.compute_flips(coord, color).len();
            if best.is_none_or(|(_, most)| flips > most) {
                best = Some((coord, flips));
            }
        }
        best.map(|(coord, _)| coord)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
}

impl Difficulty {
    pub fn oracle(self) -> Box<dyn MoveOracle + Send> {
        match self {
            Difficulty::Easy => Box::new(RandomOracle::new()),
            Difficulty::Medium => Box::new(GreedyOracle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn random_oracle_stays_legal() {
        let mut oracle = RandomOracle::seeded(11);
        let board = Board::new();
        for _ in 0..50 {
            let coord = oracle.choose(&board, Color::White).unwrap();
            assert!(board.is_legal(coord, Color::White));
        }
    }

    #[test]
    fn greedy_prefers_most_flips() {
        // (1,0) flips one disc and comes first; (3,5) flips two.
        let board = Board::from_rows(&[
            "........", ".W......", ".B......", "", "", "BWW.....", "", "",
        ]);
        assert_eq!(
            board.legal_moves(Color::Black),
            vec![Coord::new(1, 0), Coord::new(3, 5)]
        );
        assert_eq!(GreedyOracle.choose(&board, Color::Black), Some(Coord::new(3, 5)));
    }

    #[test]
    fn greedy_breaks_ties_row_major() {
        let board = Board::new();
        assert_eq!(GreedyOracle.choose(&board, Color::Black), Some(Coord::new(3, 2)));
    }

    #[test]
    fn no_move_means_none() {
        let board = Board::from_rows(&["BBB.....", "", "", "", "", "", "", ""]);
        assert_eq!(GreedyOracle.choose(&board, Color::White), None);
        assert_eq!(RandomOracle::seeded(0).choose(&board, Color::White), None);
    }

    #[test]
    fn difficulty_parses() {
        assert_eq!(Difficulty::from_str("EASY"), Ok(Difficulty::Easy));
        assert_eq!(Difficulty::Medium.to_string(), "medium");
    }
}
