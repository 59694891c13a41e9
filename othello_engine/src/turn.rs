// Turn state machine over a `Board`.
//
// After a successful move by color C the controller hands the turn to C's
// opponent. If the opponent has no legal move the turn stays with C (a pass);
// if neither side can move the game ends. `GameOver` is terminal: every
// further submission is rejected and forced mutations are refused.
//
// Forced moves from chance events use `apply_forced` + `force_turn`, which are
// crate-private so only the chance coordinator can bypass the normal
// transition rule. `force_turn` still runs the ordinary settle step, so a
// forced hand-off to a side with no moves is turned into a pass (or game
// over) the same way a regular move would be.

use log::debug;
use thiserror::Error;

use crate::board::Board;
use crate::types::{Color, Coord, Outcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    AwaitingMove(Color),
    GameOver,
}

/// What happened as a result of one accepted move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub mover: Color,
    pub coord: Coord,
    pub flipped: Vec<Coord>,
    /// Set when the side that should have moved next had no legal move.
    pub passed: Option<Color>,
    pub state: TurnState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("the game is over")]
    GameOver,
    #[error("{0} is off the board")]
    OutOfBounds(Coord),
    #[error("{color} cannot play {coord}")]
    Illegal { coord: Coord, color: Color },
}

#[derive(Clone, Debug)]
pub struct TurnController {
    board: Board,
    state: TurnState,
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnController {
    /// Standard opening, Black to move.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            state: TurnState::AwaitingMove(Color::Black),
        }
    }

    /// Start from an arbitrary position. The state is settled immediately,
    /// so a position where `to_move` cannot play starts as a pass or as
    /// `GameOver`.
    pub fn with_board(board: Board, to_move: Color) -> Self {
        let mut controller = Self {
            board,
            state: TurnState::AwaitingMove(to_move),
        };
        controller.settle();
        controller
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Color to move, or `None` once the game is over.
    pub fn current_turn(&self) -> Option<Color> {
        match self.state {
            TurnState::AwaitingMove(color) => Some(color),
            TurnState::GameOver => None,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.state == TurnState::GameOver
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.board.score(Color::Black), self.board.score(Color::White))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        if !self.is_game_over() {
            return None;
        }
        let (black, white) = self.scores();
        Some(Outcome::from_scores(black, white))
    }

    pub fn legal_moves(&self) -> Vec<Coord> {
        match self.state {
            TurnState::AwaitingMove(color) => self.board.legal_moves(color),
            TurnState::GameOver => Vec::new(),
        }
    }

    /// Play `coord` for the color to move. A rejected move leaves both the
    /// board and the turn unchanged.
    pub fn submit_move(&mut self, coord: Coord) -> Result<TurnReport, MoveError> {
        let TurnState::AwaitingMove(mover) = self.state else {
            return Err(MoveError::GameOver);
        };
        if !Board::is_in_bounds(coord.x, coord.y) {
            return Err(MoveError::OutOfBounds(coord));
        }
        let flipped = self
            .board
            .place(coord, mover)
            .ok_or(MoveError::Illegal { coord, color: mover })?;

        self.state = TurnState::AwaitingMove(mover.opponent());
        let passed = self.settle();
        Ok(TurnReport {
            mover,
            coord,
            flipped,
            passed,
            state: self.state,
        })
    }

    /// Start over from the opening position.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Resolve passes and game end for the current state. Returns the color
    /// that was skipped, if any.
    pub fn settle(&mut self) -> Option<Color> {
        let TurnState::AwaitingMove(to_move) = self.state else {
            return None;
        };
        if self.board.has_legal_move(to_move) {
            return None;
        }
        if self.board.has_legal_move(to_move.opponent()) {
            debug!("{to_move} has no legal move and passes");
            self.state = TurnState::AwaitingMove(to_move.opponent());
            return Some(to_move);
        }
        debug!("no legal moves for either side, game over");
        self.state = TurnState::GameOver;
        None
    }

    /// Hand the turn to `color` regardless of who just moved, then settle.
    /// No-op once the game is over.
    pub(crate) fn force_turn(&mut self, color: Color) -> Option<Color> {
        if self.is_game_over() {
            return None;
        }
        self.state = TurnState::AwaitingMove(color);
        self.settle()
    }

    /// Place a disc for `color` without touching the turn state. Returns the
    /// flipped coordinates, or `None` when the move is illegal or the game
    /// is over.
    pub(crate) fn apply_forced(&mut self, coord: Coord, color: Color) -> Option<Vec<Coord>> {
        if self.is_game_over() {
            return None;
        }
        self.board.place(coord, color)
    }
}
