// TCP client for connecting to the relay.
//
// Provides a non-blocking interface for the thread that owns the game state.
// Architecture:
// - `connect()` performs the TCP connect and sends `USER_ID` on the calling
//   thread, then spawns a background reader thread.
// - The reader thread calls `read_line()` in a loop, decodes each line into a
//   `ProtocolMessage`, and pushes it into an `mpsc` channel. Unrecognised
//   lines are skipped. When the stream ends it pushes `NetEvent::Closed` and
//   exits.
// - The owning thread holds the write half and sends synchronously
//   (messages are one short line each).
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   one event.
//
// The reader thread never touches game state, it only forwards decoded
// messages. Everything that mutates the board runs on the owning thread.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};
use othello_protocol::framing::{read_line, write_line, write_message};
use othello_protocol::message::ProtocolMessage;
use othello_protocol::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("send failed: {0}")]
    Send(#[from] io::Error),
    #[error("connection closed")]
    Closed,
}

/// What the reader thread delivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetEvent {
    Message(ProtocolMessage),
    /// End of stream or read error. Always the last event.
    Closed,
}

pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<NetEvent>,
    reader_thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl NetClient {
    /// Connect to a relay and identify as `user`. Tries every address `addr`
    /// resolves to, each bounded by `timeout`.
    pub fn connect(addr: &str, user: &UserId, timeout: Duration) -> Result<Self, ClientError> {
        let connect_error = |source| ClientError::Connect {
            addr: addr.to_owned(),
            source,
        };
        let mut last_error =
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing");
        let mut connected = None;
        for candidate in addr.to_socket_addrs().map_err(connect_error)? {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_error = e,
            }
        }
        let stream = connected.ok_or_else(|| connect_error(last_error))?;
        stream.set_nodelay(true).ok();

        let reader_stream = stream.try_clone().map_err(connect_error)?;
        let mut writer = BufWriter::new(stream);
        write_message(&mut writer, &ProtocolMessage::Identify(user.clone()))
            .map_err(connect_error)?;
        info!("connected to {addr} as {user}");

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || reader_loop(BufReader::new(reader_stream), tx));

        Ok(Self {
            writer,
            inbox: rx,
            reader_thread: Some(reader_thread),
            closed: false,
        })
    }

    pub fn send(&mut self, message: &ProtocolMessage) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        write_message(&mut self.writer, message)?;
        Ok(())
    }

    /// Send a raw line, bypassing the message encoder.
    pub fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        write_line(&mut self.writer, line)?;
        Ok(())
    }

    /// Drain all queued events (non-blocking).
    pub fn poll(&mut self) -> Vec<NetEvent> {
        let events: Vec<NetEvent> = self.inbox.try_iter().collect();
        if events.contains(&NetEvent::Closed) {
            self.closed = true;
        }
        events
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<NetEvent> {
        match self.inbox.recv_timeout(timeout) {
            Ok(event) => {
                if event == NetEvent::Closed {
                    self.closed = true;
                }
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Some(NetEvent::Closed)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection and wait for the reader thread to finish.
    pub fn disconnect(&mut self) {
        self.closed = true;
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NetClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Reader thread: read lines, decode, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: Sender<NetEvent>) {
    loop {
        match read_line(&mut reader) {
            Ok(Some(line)) => match ProtocolMessage::decode(&line) {
                Some(message) => {
                    if tx.send(NetEvent::Message(message)).is_err() {
                        return; // Owner dropped the receiver
                    }
                }
                None => debug!("ignoring unrecognised line: {line}"),
            },
            Ok(None) => break,
            Err(e) => {
                debug!("connection read ended: {e}");
                break;
            }
        }
    }
    let _ = tx.send(NetEvent::Closed);
}
