// Test-only game client for multiplayer integration tests.
//
// Wraps a real `ClientSession` (from `othello_client::session`), which in
// turn owns a real `NetClient` from the relay crate, and adds synchronous,
// test-friendly helpers for exercising the full pipeline:
// client → relay → peer → decode → TurnController → compare boards.
//
// The only test-specific code here is the blocking wait loops around
// `ClientSession::wait_event()`. All networking and game logic uses the same
// code paths as the real game.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use othello_client::{ClientConfig, ClientSession, SessionEvent};
use othello_engine::{Board, ChanceReport, Color, Coord, MinigameCoordinator, TurnReport};
use othello_protocol::UserId;
use othello_relay::client::NetClient;

/// Default timeout for blocking wait operations.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A test game client wrapping a real `ClientSession`.
pub struct TestGameClient {
    session: ClientSession,
    /// Every event seen so far, in arrival order.
    pub history: Vec<SessionEvent>,
}

impl TestGameClient {
    /// Connect to a relay and identify as `name`.
    pub fn connect(addr: SocketAddr, name: &str) -> Self {
        let config = ClientConfig {
            server_ip: addr.ip().to_string(),
            server_port: addr.port(),
            user_id: name.into(),
            ..ClientConfig::default()
        };
        let session = ClientSession::connect(&config).expect("TestGameClient::connect failed");
        Self {
            session,
            history: Vec::new(),
        }
    }

    /// Like `connect`, but with a seeded coordinator so locally picked
    /// forced moves and minigame layouts are reproducible.
    pub fn connect_seeded(addr: SocketAddr, name: &str, seed: u64) -> Self {
        let user = UserId::new(name);
        let net = NetClient::connect(&addr.to_string(), &user, WAIT_TIMEOUT)
            .expect("TestGameClient::connect_seeded failed");
        Self {
            session: ClientSession::with_client(net, user, MinigameCoordinator::seeded(seed)),
            history: Vec::new(),
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ClientSession {
        &mut self.session
    }

    pub fn board(&self) -> &Board {
        self.session.board()
    }

    pub fn color(&self) -> Color {
        self.session.color().expect("no color assigned yet")
    }

    /// Block until an event matching `wanted` arrives. Earlier events are
    /// kept in `history` but otherwise skipped.
    pub fn wait_for(&mut self, what: &str, wanted: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        let start = Instant::now();
        loop {
            let remaining = WAIT_TIMEOUT.saturating_sub(start.elapsed());
            assert!(!remaining.is_zero(), "timed out waiting for {what}");
            let Some(event) = self.session.wait_event(remaining) else {
                assert!(
                    self.session.is_connected(),
                    "connection closed while waiting for {what}"
                );
                continue;
            };
            self.history.push(event.clone());
            if wanted(&event) {
                return event;
            }
        }
    }

    /// Block until matched. Returns the assigned color.
    pub fn wait_until_matched(&mut self) -> Color {
        match self.wait_for("Matched", |e| matches!(e, SessionEvent::Matched { .. })) {
            SessionEvent::Matched { color, .. } => color,
            other => unreachable!("wait_for returned {other:?}"),
        }
    }

    pub fn wait_for_opponent_move(&mut self) -> TurnReport {
        match self.wait_for("OpponentMoved", |e| {
            matches!(e, SessionEvent::OpponentMoved(_))
        }) {
            SessionEvent::OpponentMoved(report) => report,
            other => unreachable!("wait_for returned {other:?}"),
        }
    }

    pub fn wait_for_chance(&mut self) -> ChanceReport {
        match self.wait_for("ChanceResolved", |e| {
            matches!(e, SessionEvent::ChanceResolved(_))
        }) {
            SessionEvent::ChanceResolved(report) => report,
            other => unreachable!("wait_for returned {other:?}"),
        }
    }

    /// Collect whatever arrives within `window`, without blocking longer.
    pub fn drain_for(&mut self, window: Duration) -> Vec<SessionEvent> {
        let deadline = Instant::now() + window;
        let mut events = Vec::new();
        while let Some(event) = self
            .session
            .wait_event(deadline.saturating_duration_since(Instant::now()))
        {
            self.history.push(event.clone());
            events.push(event);
        }
        events
    }

    /// Play a move that must be accepted.
    pub fn play(&mut self, coord: Coord) -> TurnReport {
        self.session
            .play_move(coord)
            .unwrap_or_else(|e| panic!("{coord} was rejected: {e}"))
    }

    pub fn saw_desync(&self) -> bool {
        self.history
            .iter()
            .any(|e| matches!(e, SessionEvent::Desync(_)))
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }
}
