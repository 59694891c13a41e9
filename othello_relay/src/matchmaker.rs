// Wait queue and room registry for the relay.
//
// `Matchmaker` is created once by `start_relay` and shared (via `Arc`) with
// every connection handler. Pairing and teardown run under one mutex, so a
// connection can never be paired and torn down at the same time.
//
// Each registered connection keeps its write half behind its own mutex.
// Only the matchmaker writes to client sockets, and never while holding the
// registry lock: `forward` looks up the partner's writer under the lock and
// writes after releasing it, so a client that stops reading only holds up
// the one connection forwarding to it. Messages the matchmaker sends itself
// (`START_*`, `OPPONENT_LEFT`) lock their writers before the registry lock is
// released, so no forwarded line can overtake them. A failed write shuts the
// socket down: a half-written line must never be followed by another one,
// and the shutdown ends that connection's handler, which tears its room down.
//
// Teardown policy: when either member of a room disconnects, the room is
// removed. If the room never relayed a line, the survivor goes back to the
// wait queue and is paired again. Otherwise the survivor is sent
// `OPPONENT_LEFT` and its socket is shut down, which ends the survivor's
// handler as well. No connection is ever left registered without a live
// partner or a place in the wait queue.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use othello_engine::Color;
use othello_protocol::framing::write_line;
use othello_protocol::message::ProtocolMessage;
use othello_protocol::types::{RoomId, UserId};

/// Relay-local identifier for one accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Two paired connections. The one that waited longer plays Black.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub black: ConnectionId,
    pub white: ConnectionId,
}

impl Room {
    pub fn partner_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        if id == self.black {
            Some(self.white)
        } else if id == self.white {
            Some(self.black)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Waiting,
    Paired(Room),
    /// The relay is shutting down; the connection was closed instead.
    Closed,
}

type Writer = Arc<Mutex<TcpStream>>;

fn lock_writer(writer: &Writer) -> MutexGuard<'_, TcpStream> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write one line, shutting the socket down if that fails.
fn write_or_close(to: ConnectionId, stream: &mut TcpStream, line: &str) -> bool {
    match write_line(stream, line) {
        Ok(()) => true,
        Err(e) => {
            warn!("write to {to} failed, closing it: {e}");
            let _ = stream.shutdown(Shutdown::Both);
            false
        }
    }
}

struct Peer {
    user: UserId,
    writer: Writer,
    room: Option<RoomId>,
}

/// A line the matchmaker sends on its own behalf.
struct Outgoing {
    to: ConnectionId,
    writer: Writer,
    line: String,
    then_close: bool,
}

impl Outgoing {
    fn new(to: ConnectionId, peer: &Peer, message: &ProtocolMessage) -> Self {
        Self {
            to,
            writer: Arc::clone(&peer.writer),
            line: message.encode(),
            then_close: false,
        }
    }
}

/// Send `outgoing` once `state` is released. Every writer is locked before
/// the release, so these lines go out ahead of anything forwarded later.
fn deliver(state: MutexGuard<'_, MatchState>, outgoing: Vec<Outgoing>) {
    let mut held: Vec<_> = outgoing
        .iter()
        .map(|out| (out, lock_writer(&out.writer)))
        .collect();
    drop(state);
    for (out, stream) in &mut held {
        if write_or_close(out.to, stream, &out.line) && out.then_close {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

#[derive(Default)]
struct MatchState {
    peers: BTreeMap<ConnectionId, Peer>,
    waiting: VecDeque<ConnectionId>,
    rooms: BTreeMap<RoomId, Room>,
    /// Rooms that have relayed at least one line.
    active: BTreeSet<RoomId>,
    next_room: u32,
    next_connection: u64,
    closed: bool,
}

impl MatchState {
    fn partner_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        let room_id = self.peers.get(&id)?.room?;
        self.rooms.get(&room_id)?.partner_of(id)
    }

    /// Pair the registered connection `id` with the longest-waiting one, or
    /// queue it. Returns the color assignments to send.
    fn pair_or_queue(&mut self, id: ConnectionId) -> (MatchOutcome, Vec<Outgoing>) {
        let Some(waiter) = self.waiting.pop_front() else {
            if let Some(peer) = self.peers.get(&id) {
                info!("{id} ({}) is waiting for an opponent", peer.user);
            }
            self.waiting.push_back(id);
            return (MatchOutcome::Waiting, Vec::new());
        };

        let room = Room {
            id: RoomId(self.next_room),
            black: waiter,
            white: id,
        };
        self.next_room += 1;
        self.rooms.insert(room.id, room);

        let black_user = self.peers.get(&waiter).map(|p| p.user.clone());
        let white_user = self.peers.get(&id).map(|p| p.user.clone());
        let mut outgoing = Vec::new();
        for (seat, color, opponent) in [
            (waiter, Color::Black, &white_user),
            (id, Color::White, &black_user),
        ] {
            if let Some(peer) = self.peers.get_mut(&seat) {
                peer.room = Some(room.id);
                let message = ProtocolMessage::AssignColor {
                    color,
                    opponent: opponent.clone(),
                };
                outgoing.push(Outgoing::new(seat, peer, &message));
            }
        }
        info!(
            "{} formed: {} (black) vs {} (white)",
            room.id,
            black_user.unwrap_or_else(UserId::guest),
            white_user.unwrap_or_else(UserId::guest),
        );
        (MatchOutcome::Paired(room), outgoing)
    }
}

#[derive(Default)]
pub struct Matchmaker {
    state: Mutex<MatchState>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lock poisoned by a panicking handler still guards consistent
    /// collections, so keep going with it.
    fn lock(&self) -> MutexGuard<'_, MatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        let mut state = self.lock();
        let id = ConnectionId(state.next_connection);
        state.next_connection += 1;
        id
    }

    /// Add a connection that has completed its handshake. Pairs it with the
    /// longest-waiting connection if there is one, otherwise queues it.
    pub fn register(&self, id: ConnectionId, user: UserId, writer: TcpStream) -> MatchOutcome {
        let mut state = self.lock();
        if state.closed {
            let _ = writer.shutdown(Shutdown::Both);
            return MatchOutcome::Closed;
        }
        state.peers.insert(
            id,
            Peer {
                user,
                writer: Arc::new(Mutex::new(writer)),
                room: None,
            },
        );
        let (outcome, outgoing) = state.pair_or_queue(id);
        deliver(state, outgoing);
        outcome
    }

    /// Forward `line` unchanged to the sender's room partner. Returns false
    /// when the sender has no partner (still waiting, or already torn down).
    pub fn forward(&self, from: ConnectionId, line: &str) -> bool {
        let (to, writer) = {
            let mut state = self.lock();
            let Some(to) = state.partner_of(from) else {
                debug!("dropping line from {from} with no partner: {line}");
                return false;
            };
            let Some(peer) = state.peers.get(&to) else {
                return false;
            };
            let writer = Arc::clone(&peer.writer);
            let room = peer.room;
            if let Some(room) = room {
                state.active.insert(room);
            }
            (to, writer)
        };
        write_or_close(to, &mut lock_writer(&writer), line);
        true
    }

    /// Remove a connection whose reader has ended. Tears down its room, if
    /// any. The partner is requeued when the room never relayed anything and
    /// closed otherwise.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut state = self.lock();
        state.waiting.retain(|&queued| queued != id);
        let Some(peer) = state.peers.remove(&id) else {
            return;
        };
        info!("{id} ({}) disconnected", peer.user);

        let mut outgoing = Vec::new();
        let room = peer.room.and_then(|room_id| state.rooms.remove(&room_id));
        let partner_id = room.and_then(|room| room.partner_of(id));
        if let (Some(room), Some(partner_id)) = (room, partner_id) {
            let played = state.active.remove(&room.id);
            if played {
                if let Some(partner) = state.peers.remove(&partner_id) {
                    info!("{} closed, notifying {partner_id} ({})", room.id, partner.user);
                    let mut notice =
                        Outgoing::new(partner_id, &partner, &ProtocolMessage::OpponentLeft);
                    notice.then_close = true;
                    outgoing.push(notice);
                }
            } else if let Some(partner) = state.peers.get_mut(&partner_id) {
                partner.room = None;
                info!("{} closed before any play, requeueing {partner_id}", room.id);
                outgoing = state.pair_or_queue(partner_id).1;
            }
        }
        deliver(state, outgoing);
        let _ = lock_writer(&peer.writer).shutdown(Shutdown::Both);
    }

    /// Shut down every registered connection and refuse new ones. Used when
    /// the relay stops.
    pub fn close_all(&self) {
        let writers: Vec<Writer> = {
            let mut state = self.lock();
            state.closed = true;
            state.waiting.clear();
            state.rooms.clear();
            state.active.clear();
            let peers = std::mem::take(&mut state.peers);
            peers.into_values().map(|peer| peer.writer).collect()
        };
        for writer in &writers {
            let _ = lock_writer(writer).shutdown(Shutdown::Both);
        }
    }

    pub fn waiting_count(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn peer_count(&self) -> usize {
        self.lock().peers.len()
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<Room> {
        let state = self.lock();
        let room_id = state.peers.get(&id)?.room?;
        state.rooms.get(&room_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::net::TcpListener;
    use std::time::Duration;

    use othello_protocol::framing::read_line;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Create a TCP pair: (client_stream, server_stream) on localhost.
    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn reader(stream: TcpStream) -> BufReader<TcpStream> {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        BufReader::new(stream)
    }

    fn recv(reader: &mut BufReader<TcpStream>) -> Option<String> {
        read_line(reader).unwrap()
    }

    /// Register a fresh connection and return the client end for reading.
    fn join(mm: &Matchmaker, name: &str) -> (ConnectionId, BufReader<TcpStream>, MatchOutcome) {
        let (client, server) = tcp_pair();
        let id = mm.next_connection_id();
        let outcome = mm.register(id, UserId::new(name), server);
        (id, reader(client), outcome)
    }

    #[test]
    fn first_connection_waits() {
        let mm = Matchmaker::new();
        let (_, _client, outcome) = join(&mm, "alice");
        assert_eq!(outcome, MatchOutcome::Waiting);
        assert_eq!(mm.waiting_count(), 1);
        assert_eq!(mm.room_count(), 0);
    }

    #[test]
    fn pairing_is_fifo_and_assigns_colors() {
        let mm = Matchmaker::new();
        let (a, mut client_a, _) = join(&mm, "alice");
        let (b, mut client_b, outcome) = join(&mm, "bob");
        let (c, _client_c, outcome_c) = join(&mm, "carol");

        let MatchOutcome::Paired(room) = outcome else {
            panic!("expected a room, got {outcome:?}");
        };
        assert_eq!((room.black, room.white), (a, b));
        assert_eq!(outcome_c, MatchOutcome::Waiting);
        assert_eq!(mm.room_of(c), None);
        assert_eq!(mm.waiting_count(), 1);

        assert_eq!(recv(&mut client_a).as_deref(), Some("START_BLACK bob"));
        assert_eq!(recv(&mut client_b).as_deref(), Some("START_WHITE alice"));
    }

    #[test]
    fn forward_reaches_only_the_partner() {
        let mm = Matchmaker::new();
        let (a, mut client_a, _) = join(&mm, "alice");
        let (b, mut client_b, _) = join(&mm, "bob");
        recv(&mut client_a);
        recv(&mut client_b);

        assert!(mm.forward(a, "MOVE 3 2"));
        assert!(mm.forward(b, "not even a keyword"));
        assert_eq!(recv(&mut client_b).as_deref(), Some("MOVE 3 2"));
        assert_eq!(recv(&mut client_a).as_deref(), Some("not even a keyword"));
    }

    #[test]
    fn waiting_connection_has_no_partner() {
        let mm = Matchmaker::new();
        let (a, _client, _) = join(&mm, "alice");
        assert!(!mm.forward(a, "MOVE 0 0"));
    }

    #[test]
    fn disconnect_while_waiting_leaves_queue() {
        let mm = Matchmaker::new();
        let (a, _client_a, _) = join(&mm, "alice");
        mm.disconnect(a);
        assert_eq!(mm.waiting_count(), 0);
        assert_eq!(mm.peer_count(), 0);

        let (_, _client_b, outcome) = join(&mm, "bob");
        assert_eq!(outcome, MatchOutcome::Waiting);
    }

    #[test]
    fn disconnect_tears_down_room_and_notifies_partner() {
        let mm = Matchmaker::new();
        let (a, mut client_a, _) = join(&mm, "alice");
        let (b, mut client_b, _) = join(&mm, "bob");
        recv(&mut client_a);
        recv(&mut client_b);
        assert!(mm.forward(b, "MOVE 2 3"));
        assert_eq!(recv(&mut client_a).as_deref(), Some("MOVE 2 3"));

        mm.disconnect(a);
        assert_eq!(mm.room_count(), 0);
        assert_eq!(mm.peer_count(), 0);
        assert_eq!(mm.room_of(b), None);
        assert_eq!(recv(&mut client_b).as_deref(), Some("OPPONENT_LEFT"));
        assert_eq!(recv(&mut client_b), None);

        // The survivor's own handler will call this too; it must be a no-op.
        mm.disconnect(b);
        assert!(!mm.forward(b, "MOVE 1 1"));
    }

    #[test]
    fn quiet_room_requeues_the_survivor() {
        let mm = Matchmaker::new();
        let (a, mut client_a, _) = join(&mm, "alice");
        let (b, mut client_b, _) = join(&mm, "bob");
        recv(&mut client_a);
        recv(&mut client_b);

        mm.disconnect(b);
        assert_eq!(mm.room_count(), 0);
        assert_eq!(mm.room_of(a), None);
        assert_eq!(mm.waiting_count(), 1);
        assert!(!mm.forward(a, "MOVE 3 2"));

        let (c, mut client_c, outcome) = join(&mm, "carol");
        let MatchOutcome::Paired(room) = outcome else {
            panic!("expected a room, got {outcome:?}");
        };
        assert_eq!((room.black, room.white), (a, c));
        assert_eq!(recv(&mut client_a).as_deref(), Some("START_BLACK carol"));
        assert_eq!(recv(&mut client_c).as_deref(), Some("START_WHITE alice"));
    }

    #[test]
    fn quiet_room_survivor_pairs_with_queued_connection() {
        let mm = Matchmaker::new();
        let (a, mut client_a, _) = join(&mm, "alice");
        let (b, _client_b, _) = join(&mm, "bob");
        let (c, mut client_c, _) = join(&mm, "carol");
        recv(&mut client_a);

        mm.disconnect(b);
        let room = mm.room_of(a).expect("alice was paired again");
        assert_eq!((room.black, room.white), (c, a));
        assert_eq!(mm.waiting_count(), 0);
        assert_eq!(recv(&mut client_c).as_deref(), Some("START_BLACK alice"));
        assert_eq!(recv(&mut client_a).as_deref(), Some("START_WHITE carol"));
    }

    #[test]
    fn failed_write_closes_the_receiver() {
        let mm = Matchmaker::new();
        let (a, mut client_a, _) = join(&mm, "alice");
        let (b, mut client_b, _) = join(&mm, "bob");
        recv(&mut client_a);
        recv(&mut client_b);

        // Line breaks can't be framed; the write fails before any byte is sent.
        assert!(mm.forward(a, "MOVE 1 1\nMOVE 2 2"));
        assert_eq!(recv(&mut client_b), None);
    }

    #[test]
    fn closed_matchmaker_refuses_connections() {
        let mm = Matchmaker::new();
        let (_, mut client_a, _) = join(&mm, "alice");
        mm.close_all();
        assert_eq!(recv(&mut client_a), None);

        let (_, mut client_b, outcome) = join(&mm, "bob");
        assert_eq!(outcome, MatchOutcome::Closed);
        assert_eq!(mm.peer_count(), 0);
        assert_eq!(recv(&mut client_b), None);
    }

    #[test]
    fn rooms_get_distinct_ids() {
        let mm = Matchmaker::new();
        let mut clients = Vec::new();
        let mut rooms = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let (_, client, outcome) = join(&mm, name);
            clients.push(client);
            if let MatchOutcome::Paired(room) = outcome {
                rooms.push(room.id);
            }
        }
        assert_eq!(rooms, vec![RoomId(0), RoomId(1)]);
        assert_eq!(mm.room_count(), 2);
    }
}
