// Chance cards and the minigame coordinator.
//
// A chance event is triggered by its *owner* color while the other color is
// due to move. Its minigame result is then turned into a board effect:
//
// - success: the non-owning color is made to play a move it did not choose
//   (picked here at random among its legal moves, or supplied by the remote
//   peer), and the turn is handed back to the owner;
// - failure: no board change, the turn goes to the non-owning color.
//
// `owner_for` is the only place that decides who owns an event. Every forced
// turn hand-off re-runs the controller's settle step, so passes and game end
// are detected exactly as after a regular move.

use enum_map::EnumMap;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::board::Board;
use crate::minigame::{Minigame, MinigameKind};
use crate::turn::{TurnController, TurnState};
use crate::types::{Color, Coord, GameMode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChanceError {
    #[error("the {0} chance card has already been used")]
    CardUsed(MinigameKind),
    #[error("chance cards can only be played on the opponent's turn")]
    NotOpponentsTurn,
    #[error("the game is over")]
    GameOver,
    #[error("no chance event is in progress")]
    NoActiveEvent,
    #[error("a chance event is already in progress")]
    EventInProgress,
}

/// Decide which color owns a chance event triggered now.
///
/// Online, the local player owns it and may only trigger it while the peer
/// is to move. On a shared screen the owner is whoever is *not* to move.
pub fn owner_for(mode: GameMode, current_turn: Color, my_color: Color) -> Result<Color, ChanceError> {
    match mode {
        GameMode::Online => {
            if current_turn == my_color {
                Err(ChanceError::NotOpponentsTurn)
            } else {
                Ok(my_color)
            }
        }
        GameMode::Local | GameMode::AgainstOracle => Ok(current_turn.opponent()),
    }
}

/// One single-use card per minigame kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChanceCards {
    used: EnumMap<MinigameKind, bool>,
}

impl ChanceCards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self, kind: MinigameKind) -> bool {
        !self.used[kind]
    }

    pub fn spend(&mut self, kind: MinigameKind) -> Result<(), ChanceError> {
        if self.used[kind] {
            return Err(ChanceError::CardUsed(kind));
        }
        self.used[kind] = true;
        Ok(())
    }

    pub fn remaining(&self) -> Vec<MinigameKind> {
        MinigameKind::iter().filter(|&kind| self.is_available(kind)).collect()
    }

    pub fn reset(&mut self) {
        self.used = EnumMap::default();
    }
}

/// Where the forced move for a successful chance event comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForcedMoveSource {
    /// Pick uniformly among the victim's legal moves.
    LocalRandom,
    /// Use the coordinate the peer reported; `None` means the peer had no
    /// legal move.
    Supplied(Option<Coord>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChanceResolution {
    ForcedMove {
        color: Color,
        coord: Coord,
        flipped: Vec<Coord>,
    },
    /// `color` had nothing to play; only the turn changed.
    NoLegalMove { color: Color },
    /// A supplied coordinate was not legal here. Nothing was placed.
    Rejected { color: Color, coord: Coord },
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChanceReport {
    pub owner: Color,
    pub resolution: ChanceResolution,
    /// Color skipped by the settle step after the turn was handed over.
    pub passed: Option<Color>,
    pub state: TurnState,
}

impl ChanceReport {
    pub fn forced_coord(&self) -> Option<Coord> {
        match self.resolution {
            ChanceResolution::ForcedMove { coord, .. } => Some(coord),
            _ => None,
        }
    }
}

pub struct MinigameCoordinator {
    rng: StdRng,
}

impl Default for MinigameCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MinigameCoordinator {
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

    pub fn pick_forced_move(&mut self, board: &Board, color: Color) -> Option<Coord> {
        board.legal_moves(color).choose(&mut self.rng).copied()
    }

    pub fn new_minigame(&mut self, kind: MinigameKind) -> Minigame {
        Minigame::new(kind, &mut self.rng)
    }

    /// Apply the board effect of a finished chance event owned by `owner`.
    pub fn resolve(
        &mut self,
        turns: &mut TurnController,
        owner: Color,
        success: bool,
        source: ForcedMoveSource,
    ) -> Result<ChanceReport, ChanceError> {
        if turns.is_game_over() {
            return Err(ChanceError::GameOver);
        }
        let victim = owner.opponent();

        if !success {
            debug!("chance event by {owner} failed, turn goes to {victim}");
            let passed = turns.force_turn(victim);
            return Ok(ChanceReport {
                owner,
                resolution: ChanceResolution::Failed,
                passed,
                state: turns.state(),
            });
        }

        let target = match source {
            ForcedMoveSource::LocalRandom => self.pick_forced_move(turns.board(), victim),
            ForcedMoveSource::Supplied(coord) => coord,
        };
        let resolution = match target {
            None => ChanceResolution::NoLegalMove { color: victim },
            Some(coord) => match turns.apply_forced(coord, victim) {
                Some(flipped) => {
                    info!("forced {victim} to play {coord} for {owner}");
                    ChanceResolution::ForcedMove {
                        color: victim,
                        coord,
                        flipped,
                    }
                }
                None => {
                    warn!("forced move {coord} is not legal for {victim}, ignoring it");
                    ChanceResolution::Rejected {
                        color: victim,
                        coord,
                    }
                }
            },
        };
        let passed = turns.force_turn(owner);
        Ok(ChanceReport {
            owner,
            resolution,
            passed,
            state: turns.state(),
        })
    }
}
