// TCP server for the relay.
//
// Architecture: one listener thread plus a fixed pool of connection workers.
//
// - **Listener thread** (`TcpListener::accept()` loop, non-blocking so it can
//   notice `keep_running` going false): hands each accepted stream to the
//   worker pool as one job.
// - **Connection worker** (one per live connection, see `pool.rs`): reads the
//   `USER_ID` handshake with a timeout, registers the connection with the
//   `Matchmaker` (which pairs or queues it), then blocks reading lines and
//   forwards each one to the room partner. When the read loop ends (EOF, I/O
//   error, or our own shutdown of the socket) it deregisters the connection,
//   which also tears down its room (see `matchmaker.rs`).
//
// Each worker reads only its own connection. Every write to a client socket
// goes through the matchmaker, outside its registry lock.
// Lines are forwarded verbatim with one exception: `RANDOM_MOVE` is
// delivered to the partner as `RANDOM_MOVE_EXECUTED`.
//
// Shutdown: `RelayHandle::stop` clears `keep_running`, the listener exits
// its loop, shuts down every registered socket so blocked workers return,
// and then joins the pool.

use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use othello_protocol::framing::read_line;
use othello_protocol::message::{ProtocolMessage, RANDOM_MOVE, RANDOM_MOVE_EXECUTED, keyword_of};
use othello_protocol::types::UserId;
use serde::{Deserialize, Serialize};

use crate::matchmaker::{ConnectionId, Matchmaker};
use crate::pool::WorkerPool;

/// Configuration for starting a relay server. Every field has a default, so
/// a config file only needs the fields it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Number of connection workers, and so of concurrently served clients.
    pub workers: usize,
    pub handshake_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            workers: 10,
            handshake_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
        }
    }
}

impl RelayConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms.max(1))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    matchmaker: Arc<Matchmaker>,
}

impl RelayHandle {
    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Block until the relay exits. Without a `stop` from elsewhere this is
    /// until the process is killed.
    pub fn wait(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Start the relay server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used
/// to let the OS pick a free port).
pub fn start_relay(config: RelayConfig) -> io::Result<(RelayHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let matchmaker = Arc::new(Matchmaker::new());

    let thread = {
        let keep_running = Arc::clone(&keep_running);
        let matchmaker = Arc::clone(&matchmaker);
        thread::spawn(move || run_relay(listener, config, keep_running, matchmaker))
    };

    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
            matchmaker,
        },
        addr,
    ))
}

/// Accept loop. Runs until `keep_running` is set to false.
fn run_relay(
    listener: TcpListener,
    config: RelayConfig,
    keep_running: Arc<AtomicBool>,
    matchmaker: Arc<Matchmaker>,
) {
    let pool = WorkerPool::new(config.workers);
    let config = Arc::new(config);

    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                info!("accepted connection from {peer_addr}");
                let matchmaker = Arc::clone(&matchmaker);
                let config = Arc::clone(&config);
                let keep_running = Arc::clone(&keep_running);
                pool.execute(move || {
                    if let Err(e) = handle_connection(stream, &matchmaker, &config, &keep_running)
                    {
                        warn!("connection from {peer_addr} failed: {e}");
                    }
                });
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                warn!("accept failed: {e}");
                break;
            }
        }
    }

    info!("relay shutting down");
    matchmaker.close_all();
    drop(pool);
}

/// Serve one connection from handshake to teardown.
fn handle_connection(
    stream: TcpStream,
    matchmaker: &Matchmaker,
    config: &RelayConfig,
    keep_running: &AtomicBool,
) -> io::Result<()> {
    if !keep_running.load(Ordering::SeqCst) {
        return Ok(());
    }
    // Accepted sockets may inherit the listener's non-blocking flag.
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(config.write_timeout()))?;
    stream.set_read_timeout(Some(config.handshake_timeout()))?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let Some(user) = read_identity(&mut reader)? else {
        debug!("connection closed before identifying");
        return Ok(());
    };
    stream.set_read_timeout(None)?;
    if !keep_running.load(Ordering::SeqCst) {
        return Ok(());
    }

    let id = matchmaker.next_connection_id();
    info!("{id} identified as {user}");
    matchmaker.register(id, user, stream);

    relay_loop(&mut reader, id, matchmaker, keep_running);
    matchmaker.disconnect(id);
    Ok(())
}

/// Read the first line. `USER_ID <id>` yields that id; any other line is
/// dropped and the connection plays as `Guest`. `Ok(None)` on EOF.
fn read_identity(reader: &mut BufReader<TcpStream>) -> io::Result<Option<UserId>> {
    let Some(line) = read_line(reader)? else {
        return Ok(None);
    };
    match ProtocolMessage::decode(&line) {
        Some(ProtocolMessage::Identify(user)) => Ok(Some(user)),
        _ => {
            debug!("first line was not USER_ID, treating as guest: {line}");
            Ok(Some(UserId::guest()))
        }
    }
}

fn relay_loop(
    reader: &mut BufReader<TcpStream>,
    id: ConnectionId,
    matchmaker: &Matchmaker,
    keep_running: &AtomicBool,
) {
    loop {
        match read_line(reader) {
            Ok(Some(line)) => {
                if !keep_running.load(Ordering::SeqCst) {
                    break;
                }
                matchmaker.forward(id, relay_line(&line));
            }
            Ok(None) => break,
            Err(e) => {
                debug!("read from {id} ended: {e}");
                break;
            }
        }
    }
}

/// The line as the partner should receive it.
pub fn relay_line(line: &str) -> &str {
    if keyword_of(line) == RANDOM_MOVE {
        RANDOM_MOVE_EXECUTED
    } else {
        line
    }
}
