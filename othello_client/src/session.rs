// Online game session: one relay connection plus this side's copy of the game.
//
// `ClientSession` owns a `NetClient` (connection + background reader thread)
// and everything that mutates the board: the `TurnController`, the chance
// cards, and the `MinigameCoordinator`. The reader thread only decodes lines
// and queues them; `poll()` / `wait_event()` drain that queue on the caller's
// thread, apply each message to the local game, and hand back
// `SessionEvent`s. So the board is only ever touched from the thread that
// owns the session.
//
// Reporting convention: transitions caused by the local player come back as
// return values (`play_move`, `finish_chance`); transitions caused by the
// peer arrive as events.
//
// Chance events (the side minigames) run through a small state machine:
//
//   Idle ──start_chance──▶ Playing ──finish (local pick)──▶ Idle
//                              └──────finish (peer pick)──▶ AwaitingPeerMove
//   Idle ──MINIGAME_START──▶ Spectating ──MINIGAME_RESULT / RANDOM_MOVE──▶ Idle
//
// The initiator of a chance event owns it. A chance card can only be played
// while the peer is to move, so the owner on the receiving side is always
// the peer's color. A successful event forces a move for the victim: either
// picked by the owner (sent as the forced coordinates of MINIGAME_RESULT) or
// picked by the victim itself after a RANDOM_MOVE request (sent back the
// same way).
//
// Anything the peer sends that this side's engine rejects (an illegal MOVE,
// an illegal forced coordinate, a move out of turn) is surfaced as
// `SessionEvent::Desync`. The session keeps running; there is no in-protocol
// recovery.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use othello_engine::{
    Board, ChanceCards, ChanceError, ChanceReport, ChanceResolution, Color, Coord,
    ForcedMoveSource, GameMode, Minigame, MinigameCoordinator, MinigameKind, MinigameOutcome,
    MoveError, Outcome, TurnController, TurnReport, TurnState, owner_for,
};
use othello_protocol::{MinigameReport, ProtocolMessage, SeatColor, UserId};
use othello_relay::client::{ClientError, NetClient, NetEvent};
use thiserror::Error;

use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Chance(#[from] ChanceError),
    #[error(transparent)]
    Net(#[from] ClientError),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("no color has been assigned yet")]
    NoColorYet,
}

/// Who picks the forced move after a successful chance event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForcedPick {
    /// The owner picks a random legal move for the victim and reports it.
    Local,
    /// The victim is asked (via RANDOM_MOVE) to pick its own random move.
    Peer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Matched {
        color: Color,
        opponent: Option<UserId>,
    },
    OpponentMoved(TurnReport),
    /// `Color` had no legal move and was skipped.
    Passed(Color),
    GameOver(Outcome),
    MinigameStarted {
        kind: MinigameKind,
        owner: Color,
    },
    MinigameUpdated(MinigameKind),
    MinigameClosed,
    ChanceResolved(ChanceReport),
    /// The peer's view of the game no longer matches ours.
    Desync(String),
    OpponentLeft,
    ConnectionLost,
}

enum ChanceState {
    Idle,
    Playing { owner: Color, minigame: Minigame },
    Spectating { owner: Color, minigame: Minigame },
    AwaitingPeerMove { owner: Color },
}

pub struct ClientSession {
    net: NetClient,
    user: UserId,
    seat: SeatColor,
    opponent: Option<UserId>,
    turns: TurnController,
    cards: ChanceCards,
    coordinator: MinigameCoordinator,
    chance: ChanceState,
    pending: VecDeque<SessionEvent>,
    connected: bool,
}

impl ClientSession {
    /// Connect to the relay named in `config` and identify. Matching happens
    /// later; watch for `SessionEvent::Matched`.
    pub fn connect(config: &ClientConfig) -> Result<Self, SessionError> {
        let user = UserId::new(&config.user_id);
        let net = NetClient::connect(&config.server_addr(), &user, config.connect_timeout())?;
        Ok(Self::with_client(net, user, MinigameCoordinator::new()))
    }

    /// Wrap an already identified connection.
    pub fn with_client(net: NetClient, user: UserId, coordinator: MinigameCoordinator) -> Self {
        Self {
            net,
            user,
            seat: SeatColor::Unassigned,
            opponent: None,
            turns: TurnController::new(),
            cards: ChanceCards::new(),
            coordinator,
            chance: ChanceState::Idle,
            pending: VecDeque::new(),
            connected: true,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn seat(&self) -> SeatColor {
        self.seat
    }

    pub fn color(&self) -> Option<Color> {
        self.seat.color()
    }

    pub fn opponent(&self) -> Option<&UserId> {
        self.opponent.as_ref()
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

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_my_turn(&self) -> bool {
        self.color().is_some() && self.turns.current_turn() == self.color()
    }

    /// The minigame being played or watched, if any.
    pub fn minigame(&self) -> Option<&Minigame> {
        match &self.chance {
            ChanceState::Playing { minigame, .. } | ChanceState::Spectating { minigame, .. } => {
                Some(minigame)
            }
            _ => None,
        }
    }

    /// The minigame this player is playing. Spectated games are driven by
    /// the peer's snapshots and are not exposed mutably.
    pub fn minigame_mut(&mut self) -> Option<&mut Minigame> {
        match &mut self.chance {
            ChanceState::Playing { minigame, .. } => Some(minigame),
            _ => None,
        }
    }

    pub fn is_awaiting_peer_move(&self) -> bool {
        matches!(self.chance, ChanceState::AwaitingPeerMove { .. })
    }

    fn my_color(&self) -> Result<Color, SessionError> {
        self.color().ok_or(SessionError::NoColorYet)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.chance {
            ChanceState::Idle => Ok(()),
            _ => Err(ChanceError::EventInProgress.into()),
        }
    }

    /// Write one message. A failed write is logged and dropped; a dead
    /// connection shows up as `ConnectionLost` on the next poll.
    fn send(&mut self, message: &ProtocolMessage) {
        if let Err(e) = self.net.send(message) {
            warn!("dropping {}: {e}", message.keyword());
        }
    }

    // -----------------------------------------------------------------------
    // Local actions
    // -----------------------------------------------------------------------

    /// Play `coord` for this side and send it to the peer.
    pub fn play_move(&mut self, coord: Coord) -> Result<TurnReport, SessionError> {
        let me = self.my_color()?;
        self.ensure_idle()?;
        match self.turns.state() {
            TurnState::GameOver => return Err(MoveError::GameOver.into()),
            TurnState::AwaitingMove(color) if color != me => return Err(SessionError::NotYourTurn),
            TurnState::AwaitingMove(_) => {}
        }
        let report = self.turns.submit_move(coord)?;
        self.send(&ProtocolMessage::Move(coord));
        Ok(report)
    }

    /// Spend the `kind` card and start its minigame. Only allowed while the
    /// peer is to move.
    pub fn start_chance(&mut self, kind: MinigameKind) -> Result<(), SessionError> {
        let me = self.my_color()?;
        self.ensure_idle()?;
        let current = self.turns.current_turn().ok_or(ChanceError::GameOver)?;
        let owner = owner_for(GameMode::Online, current, me)?;
        self.cards.spend(kind)?;

        let mut minigame = self.coordinator.new_minigame(kind);
        minigame.start();
        self.chance = ChanceState::Playing { owner, minigame };
        self.send(&ProtocolMessage::MinigameStart(kind));
        info!("{} started a {kind} chance event", self.user);
        Ok(())
    }

    /// Advance the running minigame's clock by one second. Returns true once
    /// it has finished.
    pub fn tick_minigame(&mut self) -> bool {
        match self.minigame_mut() {
            Some(minigame) => {
                minigame.tick_second();
                minigame.is_finished()
            }
            None => false,
        }
    }

    /// Send the running minigame's state to the spectating peer.
    pub fn publish_minigame_state(&mut self) -> Result<(), SessionError> {
        let ChanceState::Playing { minigame, .. } = &self.chance else {
            return Err(ChanceError::NoActiveEvent.into());
        };
        match minigame.snapshot_json() {
            Ok(json) => self.send(&ProtocolMessage::MinigameUpdate(json)),
            Err(e) => warn!("could not serialize minigame snapshot: {e}"),
        }
        Ok(())
    }

    /// Resolve the running chance event with `outcome`. Returns the board
    /// effect, or `None` when the peer was asked to pick the forced move
    /// (the effect then arrives as `SessionEvent::ChanceResolved`).
    pub fn finish_chance(
        &mut self,
        outcome: MinigameOutcome,
        pick: ForcedPick,
    ) -> Result<Option<ChanceReport>, SessionError> {
        let owner = match &self.chance {
            ChanceState::Playing { owner, .. } => *owner,
            _ => return Err(ChanceError::NoActiveEvent.into()),
        };

        if outcome.success && pick == ForcedPick::Peer {
            self.chance = ChanceState::AwaitingPeerMove { owner };
            self.send(&ProtocolMessage::RequestRandomMove);
            self.send(&ProtocolMessage::MinigameClose);
            return Ok(None);
        }

        self.chance = ChanceState::Idle;
        let report = match self.coordinator.resolve(
            &mut self.turns,
            owner,
            outcome.success,
            ForcedMoveSource::LocalRandom,
        ) {
            Ok(report) => report,
            Err(e) => {
                self.send(&ProtocolMessage::MinigameClose);
                return Err(e.into());
            }
        };
        self.send(&ProtocolMessage::MinigameResult(MinigameReport {
            success: outcome.success,
            score: outcome.score,
            elapsed_seconds: outcome.elapsed_seconds,
            forced: report.forced_coord(),
        }));
        self.send(&ProtocolMessage::MinigameClose);
        Ok(Some(report))
    }

    /// Close the minigame window: finish with the minigame's own result, or
    /// as a failure if it is still running.
    pub fn close_minigame(&mut self, pick: ForcedPick) -> Result<Option<ChanceReport>, SessionError> {
        let outcome = match &self.chance {
            ChanceState::Playing { minigame, .. } => {
                minigame.result().unwrap_or_else(MinigameOutcome::failed)
            }
            _ => return Err(ChanceError::NoActiveEvent.into()),
        };
        self.finish_chance(outcome, pick)
    }

    pub fn disconnect(&mut self) {
        self.net.disconnect();
        self.connected = false;
    }

    // -----------------------------------------------------------------------
    // Incoming messages
    // -----------------------------------------------------------------------

    /// Apply everything received so far. Never blocks.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        for event in self.net.poll() {
            self.handle_net(event);
        }
        self.pending.drain(..).collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if !self.connected {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.net.recv_timeout(remaining) {
                Some(event) => self.handle_net(event),
                None => return None,
            }
        }
    }

    fn handle_net(&mut self, event: NetEvent) {
        match event {
            NetEvent::Message(message) => self.handle_message(message),
            NetEvent::Closed => {
                if self.connected {
                    info!("connection to relay lost");
                    self.connected = false;
                    self.pending.push_back(SessionEvent::ConnectionLost);
                }
            }
        }
    }

    fn handle_message(&mut self, message: ProtocolMessage) {
        match message {
            ProtocolMessage::AssignColor { color, opponent } => {
                info!(
                    "matched as {color} against {}",
                    opponent.as_ref().map_or("an unnamed opponent", UserId::as_str)
                );
                self.seat = SeatColor::Assigned(color);
                self.opponent = opponent.clone();
                self.turns.reset();
                self.cards.reset();
                self.chance = ChanceState::Idle;
                self.pending
                    .push_back(SessionEvent::Matched { color, opponent });
            }
            ProtocolMessage::Move(coord) => self.apply_remote_move(coord),
            ProtocolMessage::MinigameStart(kind) => self.spectate(kind),
            ProtocolMessage::MinigameUpdate(json) => match &mut self.chance {
                ChanceState::Spectating { minigame, .. } => {
                    if minigame.apply_snapshot_json(&json) {
                        self.pending
                            .push_back(SessionEvent::MinigameUpdated(minigame.kind()));
                    } else {
                        debug!("ignoring unreadable minigame snapshot: {json}");
                    }
                }
                _ => debug!("minigame update with nothing to spectate"),
            },
            ProtocolMessage::MinigameResult(report) => self.apply_remote_result(report),
            ProtocolMessage::MinigameClose => {
                if let ChanceState::Spectating { .. } = self.chance {
                    self.chance = ChanceState::Idle;
                    self.pending.push_back(SessionEvent::MinigameClosed);
                }
            }
            ProtocolMessage::RequestRandomMove | ProtocolMessage::RandomMoveExecuted => {
                self.execute_random_move()
            }
            ProtocolMessage::OpponentLeft => {
                info!("opponent left the game");
                self.pending.push_back(SessionEvent::OpponentLeft);
            }
            ProtocolMessage::Identify(user) => debug!("ignoring stray USER_ID {user}"),
        }
    }

    fn desync(&mut self, reason: String) {
        warn!("desync: {reason}");
        self.pending.push_back(SessionEvent::Desync(reason));
    }

    fn push_transition(&mut self, passed: Option<Color>, state: TurnState) {
        if let Some(color) = passed {
            self.pending.push_back(SessionEvent::Passed(color));
        }
        if state == TurnState::GameOver {
            if let Some(outcome) = self.turns.outcome() {
                info!("game over: {outcome}");
                self.pending.push_back(SessionEvent::GameOver(outcome));
            }
        }
    }

    fn push_chance(&mut self, report: ChanceReport) {
        let (passed, state) = (report.passed, report.state);
        let rejected = match report.resolution {
            ChanceResolution::Rejected { color, coord } => Some((color, coord)),
            _ => None,
        };
        self.pending.push_back(SessionEvent::ChanceResolved(report));
        if let Some((color, coord)) = rejected {
            self.desync(format!("forced move {coord} is not legal for {color}"));
        }
        self.push_transition(passed, state);
    }

    fn apply_remote_move(&mut self, coord: Coord) {
        let Some(me) = self.color() else {
            debug!("ignoring MOVE before color assignment");
            return;
        };
        match self.turns.state() {
            TurnState::AwaitingMove(color) if color == me.opponent() => {}
            state => {
                self.desync(format!("opponent played {coord} out of turn ({state:?})"));
                return;
            }
        }
        match self.turns.submit_move(coord) {
            Ok(report) => {
                let (passed, state) = (report.passed, report.state);
                self.pending.push_back(SessionEvent::OpponentMoved(report));
                self.push_transition(passed, state);
            }
            Err(e) => self.desync(format!("opponent move rejected: {e}")),
        }
    }

    fn spectate(&mut self, kind: MinigameKind) {
        let Some(me) = self.color() else {
            return;
        };
        if let ChanceState::Playing { .. } = self.chance {
            warn!("peer started {kind} during our own chance event, ignoring it");
            return;
        }
        let owner = me.opponent();
        let mut minigame = self.coordinator.new_minigame(kind);
        minigame.start();
        self.chance = ChanceState::Spectating { owner, minigame };
        self.pending
            .push_back(SessionEvent::MinigameStarted { kind, owner });
    }

    fn apply_remote_result(&mut self, report: MinigameReport) {
        let Some(me) = self.color() else {
            return;
        };
        let owner = match &self.chance {
            ChanceState::AwaitingPeerMove { owner } => *owner,
            ChanceState::Spectating { owner, .. } => *owner,
            ChanceState::Idle => me.opponent(),
            ChanceState::Playing { .. } => {
                warn!("ignoring peer minigame result during our own chance event");
                return;
            }
        };
        self.chance = ChanceState::Idle;
        match self.coordinator.resolve(
            &mut self.turns,
            owner,
            report.success,
            ForcedMoveSource::Supplied(report.forced),
        ) {
            Ok(chance) => self.push_chance(chance),
            Err(e) => warn!("cannot apply peer minigame result: {e}"),
        }
    }

    /// The peer won a chance event and wants us to play a random move for
    /// our own color. Apply it and report the coordinates back.
    fn execute_random_move(&mut self) {
        let Some(me) = self.color() else {
            return;
        };
        if let ChanceState::Playing { .. } = self.chance {
            warn!("ignoring random move request during our own chance event");
            return;
        }
        self.chance = ChanceState::Idle;
        let result =
            self.coordinator
                .resolve(&mut self.turns, me.opponent(), true, ForcedMoveSource::LocalRandom);
        let forced = result.as_ref().ok().and_then(ChanceReport::forced_coord);
        self.send(&ProtocolMessage::MinigameResult(MinigameReport {
            success: true,
            score: 0,
            elapsed_seconds: 0,
            forced,
        }));
        match result {
            Ok(chance) => self.push_chance(chance),
            Err(e) => warn!("cannot execute random move: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::net::{Shutdown, TcpListener, TcpStream};

    use othello_protocol::framing::{read_line, write_line};
    use pretty_assertions::assert_eq;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    /// A session connected to a hand-driven stand-in for the relay. The
    /// USER_ID line is consumed before returning.
    fn session_pair() -> (ClientSession, BufReader<TcpStream>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ClientConfig {
            server_port: listener.local_addr().unwrap().port(),
            user_id: "tester".into(),
            ..ClientConfig::default()
        };
        let session = ClientSession::connect(&config).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_read_timeout(Some(WAIT)).unwrap();
        let mut reader = BufReader::new(server.try_clone().unwrap());
        assert_eq!(read_line(&mut reader).unwrap().as_deref(), Some("USER_ID tester"));
        (session, reader, server)
    }

    fn next_event(session: &mut ClientSession) -> SessionEvent {
        session.wait_event(WAIT).expect("no event before timeout")
    }

    fn next_line(reader: &mut BufReader<TcpStream>) -> String {
        read_line(reader).unwrap().expect("relay side saw end of stream")
    }

    /// Match as White and receive Black's (3,2). White then has exactly
    /// (2,2), (4,2) and (2,4) available.
    fn white_after_first_move() -> (ClientSession, BufReader<TcpStream>, TcpStream) {
        let (mut session, reader, mut server) = session_pair();
        write_line(&mut server, "START_WHITE alice").unwrap();
        write_line(&mut server, "MOVE 3 2").unwrap();
        assert!(matches!(next_event(&mut session), SessionEvent::Matched { .. }));
        assert!(matches!(next_event(&mut session), SessionEvent::OpponentMoved(_)));
        (session, reader, server)
    }

    fn black_after_first_move() -> (ClientSession, BufReader<TcpStream>, TcpStream) {
        let (mut session, mut reader, mut server) = session_pair();
        write_line(&mut server, "START_BLACK bob").unwrap();
        next_event(&mut session);
        session.play_move(Coord::new(3, 2)).unwrap();
        assert_eq!(next_line(&mut reader), "MOVE 3 2");
        (session, reader, server)
    }

    const WHITE_REPLIES: [Coord; 3] = [Coord::new(2, 2), Coord::new(4, 2), Coord::new(2, 4)];

    /// Play `moves` from the opening, Black first, with no passes along the
    /// way. Our moves go through `play_move`, the peer's arrive as `MOVE`
    /// lines. Returns whatever followed the last remote move's report.
    fn replay(
        session: &mut ClientSession,
        reader: &mut BufReader<TcpStream>,
        server: &mut TcpStream,
        moves: &[(i32, i32)],
    ) -> Vec<SessionEvent> {
        let me = session.color().unwrap();
        let mut after = Vec::new();
        for (ply, &(x, y)) in moves.iter().enumerate() {
            let mover = if ply % 2 == 0 { Color::Black } else { Color::White };
            if mover == me {
                session.play_move(Coord::new(x, y)).unwrap();
                assert_eq!(next_line(reader), format!("MOVE {x} {y}"));
                continue;
            }
            write_line(server, &format!("MOVE {x} {y}")).unwrap();
            match next_event(session) {
                SessionEvent::OpponentMoved(report) => assert_eq!(report.coord, Coord::new(x, y)),
                other => panic!("expected the opponent's move, got {other:?}"),
            }
            after = session.poll();
        }
        after
    }

    #[test]
    fn matched_and_remote_move_applied() {
        let (session, _reader, _server) = white_after_first_move();
        assert_eq!(session.color(), Some(Color::White));
        assert_eq!(session.opponent(), Some(&UserId::new("alice")));
        assert!(session.is_my_turn());
        assert_eq!(session.turns().legal_moves(), WHITE_REPLIES.to_vec());
    }

    #[test]
    fn remote_move_that_leaves_us_stuck_is_a_pass() {
        let (mut session, mut reader, mut server) = session_pair();
        write_line(&mut server, "START_BLACK bob").unwrap();
        next_event(&mut session);

        let moves = [(5, 4), (5, 5), (5, 6), (6, 6), (3, 2), (5, 7), (7, 7), (7, 5)];
        let after = replay(&mut session, &mut reader, &mut server, &moves);
        assert_eq!(after, vec![SessionEvent::Passed(Color::Black)]);
        assert!(session.board().legal_moves(Color::Black).is_empty());
        assert_eq!(session.turns().current_turn(), Some(Color::White));
        assert!(!session.is_my_turn());
        assert!(matches!(
            session.play_move(Coord::new(0, 0)),
            Err(SessionError::NotYourTurn)
        ));
    }

    #[test]
    fn remote_move_that_ends_the_game() {
        let (mut session, mut reader, mut server) = session_pair();
        write_line(&mut server, "START_WHITE alice").unwrap();
        next_event(&mut session);

        // Black wipes White out in nine plies.
        let moves = [
            (4, 5),
            (5, 3),
            (4, 2),
            (5, 5),
            (6, 4),
            (3, 5),
            (4, 6),
            (5, 4),
            (2, 4),
        ];
        let after = replay(&mut session, &mut reader, &mut server, &moves);
        assert_eq!(after, vec![SessionEvent::GameOver(Outcome::BlackWins)]);
        assert!(session.turns().is_game_over());
        assert_eq!(session.board().score(Color::White), 0);
        assert!(session.play_move(Coord::new(0, 0)).is_err());
    }

    #[test]
    fn moves_need_a_color_and_the_turn() {
        let (mut session, _reader, mut server) = session_pair();
        assert!(matches!(
            session.play_move(Coord::new(3, 2)),
            Err(SessionError::NoColorYet)
        ));
        write_line(&mut server, "START_WHITE").unwrap();
        assert_eq!(
            next_event(&mut session),
            SessionEvent::Matched {
                color: Color::White,
                opponent: None,
            }
        );
        assert!(matches!(
            session.play_move(Coord::new(3, 2)),
            Err(SessionError::NotYourTurn)
        ));
    }

    #[test]
    fn illegal_local_move_is_not_sent() {
        let (mut session, mut reader, mut server) = session_pair();
        write_line(&mut server, "START_BLACK bob").unwrap();
        next_event(&mut session);
        assert!(matches!(
            session.play_move(Coord::new(0, 0)),
            Err(SessionError::Move(MoveError::Illegal { .. }))
        ));
        session.play_move(Coord::new(2, 3)).unwrap();
        assert_eq!(next_line(&mut reader), "MOVE 2 3");
    }

    #[test]
    fn illegal_remote_move_is_a_desync() {
        let (mut session, _reader, mut server) = session_pair();
        write_line(&mut server, "START_WHITE alice").unwrap();
        write_line(&mut server, "GARBAGE 1 2").unwrap();
        write_line(&mut server, "MOVE 0 0").unwrap();
        next_event(&mut session);
        assert!(matches!(next_event(&mut session), SessionEvent::Desync(_)));
        assert_eq!(session.board(), &Board::new());
        // The connection is still usable.
        write_line(&mut server, "MOVE 3 2").unwrap();
        assert!(matches!(next_event(&mut session), SessionEvent::OpponentMoved(_)));
    }

    #[test]
    fn chance_only_on_opponents_turn() {
        let (mut session, _reader, mut server) = session_pair();
        write_line(&mut server, "START_BLACK bob").unwrap();
        next_event(&mut session);
        assert!(matches!(
            session.start_chance(MinigameKind::Memory),
            Err(SessionError::Chance(ChanceError::NotOpponentsTurn))
        ));
    }

    #[test]
    fn failed_chance_keeps_opponents_turn_and_spends_card() {
        let (mut session, mut reader, _server) = black_after_first_move();
        session.start_chance(MinigameKind::Memory).unwrap();
        assert_eq!(next_line(&mut reader), "MINIGAME_START MEMORY");
        assert!(matches!(
            session.start_chance(MinigameKind::Dodge),
            Err(SessionError::Chance(ChanceError::EventInProgress))
        ));
        assert!(matches!(
            session.play_move(Coord::new(2, 2)),
            Err(SessionError::Chance(ChanceError::EventInProgress))
        ));

        let report = session.close_minigame(ForcedPick::Local).unwrap().unwrap();
        assert_eq!(report.resolution, ChanceResolution::Failed);
        assert_eq!(session.turns().current_turn(), Some(Color::White));
        assert_eq!(next_line(&mut reader), "MINIGAME_RESULT FAIL 0 0 -1 -1");
        assert_eq!(next_line(&mut reader), "MINIGAME_CLOSE");
        assert!(matches!(
            session.start_chance(MinigameKind::Memory),
            Err(SessionError::Chance(ChanceError::CardUsed(MinigameKind::Memory)))
        ));
    }

    #[test]
    fn successful_chance_forces_a_reported_move() {
        let (mut session, mut reader, _server) = black_after_first_move();
        session.start_chance(MinigameKind::Reaction).unwrap();
        session.publish_minigame_state().unwrap();
        next_line(&mut reader);
        assert!(next_line(&mut reader).starts_with("MINIGAME_UPDATE {"));

        let outcome = MinigameOutcome {
            success: true,
            score: 750,
            elapsed_seconds: 2,
        };
        let report = session.finish_chance(outcome, ForcedPick::Local).unwrap().unwrap();
        let forced = report.forced_coord().unwrap();
        assert!(WHITE_REPLIES.contains(&forced));
        assert_eq!(session.turns().current_turn(), Some(Color::Black));
        assert_eq!(
            next_line(&mut reader),
            format!("MINIGAME_RESULT SUCCESS 750 2 {} {}", forced.x, forced.y)
        );
        assert_eq!(next_line(&mut reader), "MINIGAME_CLOSE");
    }

    #[test]
    fn peer_pick_waits_for_the_peer_result() {
        let (mut session, mut reader, mut server) = black_after_first_move();
        session.start_chance(MinigameKind::Dodge).unwrap();
        next_line(&mut reader);
        let outcome = MinigameOutcome {
            success: true,
            score: 20,
            elapsed_seconds: 30,
        };
        assert_eq!(session.finish_chance(outcome, ForcedPick::Peer).unwrap(), None);
        assert!(session.is_awaiting_peer_move());
        assert_eq!(next_line(&mut reader), "RANDOM_MOVE");
        assert_eq!(next_line(&mut reader), "MINIGAME_CLOSE");

        write_line(&mut server, "MINIGAME_RESULT SUCCESS 0 0 4 2").unwrap();
        let SessionEvent::ChanceResolved(report) = next_event(&mut session) else {
            panic!("expected a chance resolution");
        };
        assert_eq!(report.owner, Color::Black);
        assert_eq!(report.forced_coord(), Some(Coord::new(4, 2)));
        assert_eq!(session.turns().current_turn(), Some(Color::Black));
        assert!(!session.is_awaiting_peer_move());
    }

    #[test]
    fn spectated_chance_applies_supplied_move() {
        let (mut session, _reader, mut server) = white_after_first_move();
        write_line(&mut server, "MINIGAME_START REACTION").unwrap();
        assert_eq!(
            next_event(&mut session),
            SessionEvent::MinigameStarted {
                kind: MinigameKind::Reaction,
                owner: Color::Black,
            }
        );
        assert!(session.minigame().is_some());
        assert!(session.minigame_mut().is_none());
        assert!(matches!(
            session.play_move(Coord::new(2, 2)),
            Err(SessionError::Chance(ChanceError::EventInProgress))
        ));

        write_line(&mut server, "MINIGAME_UPDATE not json").unwrap();
        write_line(&mut server, "MINIGAME_RESULT SUCCESS 800 1 2 4").unwrap();
        let SessionEvent::ChanceResolved(report) = next_event(&mut session) else {
            panic!("expected a chance resolution");
        };
        assert_eq!(
            report.resolution,
            ChanceResolution::ForcedMove {
                color: Color::White,
                coord: Coord::new(2, 4),
                flipped: vec![Coord::new(3, 4)],
            }
        );
        assert_eq!(session.turns().current_turn(), Some(Color::Black));
        assert!(session.minigame().is_none());
    }

    #[test]
    fn illegal_supplied_move_is_a_desync() {
        let (mut session, _reader, mut server) = white_after_first_move();
        write_line(&mut server, "MINIGAME_START MEMORY").unwrap();
        write_line(&mut server, "MINIGAME_RESULT SUCCESS 8 20 0 0").unwrap();
        next_event(&mut session);
        let SessionEvent::ChanceResolved(report) = next_event(&mut session) else {
            panic!("expected a chance resolution");
        };
        assert!(matches!(report.resolution, ChanceResolution::Rejected { .. }));
        assert!(matches!(next_event(&mut session), SessionEvent::Desync(_)));
        assert_eq!(session.turns().current_turn(), Some(Color::Black));
    }

    #[test]
    fn random_move_request_is_answered() {
        let (mut session, mut reader, mut server) = white_after_first_move();
        write_line(&mut server, "MINIGAME_START DODGE").unwrap();
        write_line(&mut server, "RANDOM_MOVE_EXECUTED").unwrap();
        write_line(&mut server, "MINIGAME_CLOSE").unwrap();
        next_event(&mut session);
        let SessionEvent::ChanceResolved(report) = next_event(&mut session) else {
            panic!("expected a chance resolution");
        };
        let forced = report.forced_coord().unwrap();
        assert!(WHITE_REPLIES.contains(&forced));
        assert_eq!(
            next_line(&mut reader),
            format!("MINIGAME_RESULT SUCCESS 0 0 {} {}", forced.x, forced.y)
        );
        assert_eq!(session.turns().current_turn(), Some(Color::Black));
        // MINIGAME_CLOSE after the resolution has nothing left to close.
        assert_eq!(session.wait_event(Duration::from_millis(200)), None);
    }

    #[test]
    fn opponent_left_then_connection_lost() {
        let (mut session, _reader, mut server) = white_after_first_move();
        write_line(&mut server, "OPPONENT_LEFT").unwrap();
        server.shutdown(Shutdown::Both).unwrap();
        assert_eq!(next_event(&mut session), SessionEvent::OpponentLeft);
        assert_eq!(next_event(&mut session), SessionEvent::ConnectionLost);
        assert!(!session.is_connected());
        assert_eq!(session.wait_event(Duration::from_millis(50)), None);
    }
}
