//! Connection handler
//!
//! Serves kvrpc frames from one client. A connection is served one
//! request at a time so that a worker can put it aside while it is idle.

use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crate::error::{RawKvError, Result};
use crate::kvrpc::{read_request, write_response, Request, Response};
use crate::server::RawApi;

/// Result of one [`Connection::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// A request was answered
    Served,
    /// Nothing arrived within the wait
    Idle,
    /// The client went away
    Closed,
}

/// One client connection
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    api: RawApi,
    peer_addr: String,

    /// Bound on reading the rest of a frame once its first byte arrived
    read_timeout: Option<Duration>,

    last_active: Instant,

    /// Requests answered so far
    served: u64,
}

impl Connection {
    /// Wrap an accepted stream; Nagle is disabled
    pub fn new(stream: TcpStream, api: RawApi) -> Result<Self> {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => "unknown".to_string(),
        };
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            api,
            peer_addr,
            read_timeout: None,
            last_active: Instant::now(),
            served: 0,
        })
    }

    /// Per-direction socket timeouts in milliseconds; 0 means none
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let as_timeout = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        self.read_timeout = as_timeout(read_ms);
        self.reader.get_ref().set_read_timeout(self.read_timeout)?;
        self.writer.get_ref().set_write_timeout(as_timeout(write_ms))?;
        Ok(())
    }

    /// Time since the last answered request (or since accept)
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Wait up to `wait` for a request and answer it
    ///
    /// Malformed frames end the connection with an error, since no typed
    /// response can be built for them.
    pub fn poll(&mut self, wait: Duration) -> Result<Turn> {
        if self.reader.buffer().is_empty() {
            match self.wait_readable(wait) {
                Ok(true) => {}
                Ok(false) => return Ok(Turn::Idle),
                Err(e) => return self.hang_up(e),
            }
        }

        let request = match read_request(&mut self.reader) {
            Ok(request) => request,
            Err(e) => return self.hang_up(e),
        };
        let response = self.execute(request);
        if let Err(e) = write_response(&mut self.writer, &response) {
            return self.hang_up(e);
        }

        self.served += 1;
        self.last_active = Instant::now();
        Ok(Turn::Served)
    }

    /// Whether bytes (or EOF) are pending on the socket
    fn wait_readable(&self, wait: Duration) -> Result<bool> {
        let stream = self.reader.get_ref();
        stream.set_read_timeout(Some(wait.max(Duration::from_millis(1))))?;
        let mut byte = [0u8; 1];
        let peeked = stream.peek(&mut byte);
        stream.set_read_timeout(self.read_timeout)?;

        match peeked {
            // EOF is readable too; the frame read reports it
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn hang_up(&self, e: RawKvError) -> Result<Turn> {
        let reason = match &e {
            RawKvError::Io(io_err) => clean_close(io_err),
            _ => None,
        };
        match reason {
            Some(reason) => {
                tracing::debug!(
                    "{} closed ({}) after {} requests",
                    self.peer_addr,
                    reason,
                    self.served
                );
                Ok(Turn::Closed)
            }
            None => {
                tracing::warn!("Dropping {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    fn execute(&self, request: Request) -> Response {
        let message_type = request.message_type();
        tracing::trace!("{:?} from {}", message_type, self.peer_addr);

        let response = self.api.handle(request);
        if !response.error().is_empty() {
            tracing::debug!(
                "{:?} from {} failed: {}",
                message_type,
                self.peer_addr,
                response.error()
            );
        }
        response
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn clean_close(e: &io::Error) -> Option<&'static str> {
    match e.kind() {
        ErrorKind::UnexpectedEof => Some("eof"),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            Some("reset")
        }
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Some("read timeout"),
        _ => None,
    }
}
