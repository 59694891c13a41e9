// Games that never touch the network: two people at one keyboard (`Local`)
// or one person against a move oracle (`AgainstOracle`).
//
// There is one shared set of chance cards. A chance event is owned by the
// side that is not currently to move, and its forced move is always picked
// locally.

use log::{debug, info};
use othello_engine::{
    Board, ChanceCards, ChanceError, ChanceReport, Color, Coord, ForcedMoveSource, GameMode,
    Minigame, MinigameCoordinator, MinigameKind, MinigameOutcome, MoveOracle,
    TurnController, TurnReport, owner_for,
};

use crate::session::SessionError;

struct LocalChance {
    owner: Color,
    minigame: Minigame,
}

pub struct LocalGame {
    mode: GameMode,
    turns: TurnController,
    cards: ChanceCards,
    coordinator: MinigameCoordinator,
    /// The computer's color and move source in `AgainstOracle` mode.
    oracle: Option<(Color, Box<dyn MoveOracle + Send>)>,
    chance: Option<LocalChance>,
}

impl LocalGame {
    /// Two players sharing one board.
    pub fn two_player(coordinator: MinigameCoordinator) -> Self {
        Self {
            mode: GameMode::Local,
            turns: TurnController::new(),
            cards: ChanceCards::new(),
            coordinator,
            oracle: None,
            chance: None,
        }
    }

    /// A human against `oracle`, which plays `oracle_color`.
    pub fn against_oracle(
        oracle: Box<dyn MoveOracle + Send>,
        oracle_color: Color,
        coordinator: MinigameCoordinator,
    ) -> Self {
        info!("computer plays {oracle_color}");
        Self {
            mode: GameMode::AgainstOracle,
            oracle: Some((oracle_color, oracle)),
            ..Self::two_player(coordinator)
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn turns(&self) -> &TurnController {
        &self.turns
    }

    pub fn board(&self) -> &Board {
        self.turns.board()
    }

    pub fn cards(&self) -> &ChanceCards {
        &self.cards
    }

    pub fn oracle_color(&self) -> Option<Color> {
        self.oracle.as_ref().map(|(color, _)| *color)
    }

    /// True when the side to move is played by the oracle.
    pub fn is_oracle_turn(&self) -> bool {
        self.oracle_color().is_some() && self.turns.current_turn() == self.oracle_color()
    }

    pub fn minigame(&self) -> Option<&Minigame> {
        self.chance.as_ref().map(|chance| &chance.minigame)
    }

    pub fn minigame_mut(&mut self) -> Option<&mut Minigame> {
        self.chance.as_mut().map(|chance| &mut chance.minigame)
    }

    /// Play `coord` for the side to move, unless the oracle plays that side.
    pub fn play_move(&mut self, coord: Coord) -> Result<TurnReport, SessionError> {
        if self.chance.is_some() {
            return Err(ChanceError::EventInProgress.into());
        }
        if self.is_oracle_turn() {
            return Err(SessionError::NotYourTurn);
        }
        Ok(self.turns.submit_move(coord)?)
    }

    /// Let the oracle move if it is its turn. `None` when it is not, or when
    /// a chance event is running.
    pub fn oracle_move(&mut self) -> Option<Result<TurnReport, SessionError>> {
        if self.chance.is_some() || !self.is_oracle_turn() {
            return None;
        }
        let (color, oracle) = self.oracle.as_mut()?;
        let choice = oracle.choose(self.turns.board(), *color);
        debug!("oracle chose {choice:?} for {color}");
        // The controller only hands the turn to a side that can move.
        let coord = choice?;
        Some(self.turns.submit_move(coord).map_err(SessionError::from))
    }

    pub fn start_chance(&mut self, kind: MinigameKind) -> Result<Color, SessionError> {
        if self.chance.is_some() {
            return Err(ChanceError::EventInProgress.into());
        }
        let current = self.turns.current_turn().ok_or(ChanceError::GameOver)?;
        // Only online play looks at the seat color.
        let human = self.oracle_color().map_or(current, Color::opponent);
        let owner = owner_for(self.mode, current, human)?;
        self.cards.spend(kind)?;

        let mut minigame = self.coordinator.new_minigame(kind);
        minigame.start();
        info!("{owner} started a {kind} chance event");
        self.chance = Some(LocalChance { owner, minigame });
        Ok(owner)
    }

    /// Resolve the running chance event with `outcome`.
    pub fn finish_chance(&mut self, outcome: MinigameOutcome) -> Result<ChanceReport, SessionError> {
        let chance = self.chance.take().ok_or(ChanceError::NoActiveEvent)?;
        Ok(self.coordinator.resolve(
            &mut self.turns,
            chance.owner,
            outcome.success,
            ForcedMoveSource::LocalRandom,
        )?)
    }

    /// Finish with the minigame's own result, or as a failure if it is still
    /// running.
    pub fn close_minigame(&mut self) -> Result<ChanceReport, SessionError> {
        let outcome = self
            .minigame()
            .ok_or(ChanceError::NoActiveEvent)?
            .result()
            .unwrap_or_else(MinigameOutcome::failed);
        self.finish_chance(outcome)
    }

    /// Start over with a fresh board and all cards back.
    pub fn reset(&mut self) {
        self.turns.reset();
        self.cards.reset();
        self.chance = None;
    }

    pub fn is_game_over(&self) -> bool {
        self.turns.is_game_over()
    }
}
