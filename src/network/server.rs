//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::Config;
use crate::error::{RawKvError, Result};
use crate::server::RawApi;

use super::connection::{Connection, Turn};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a worker waits on a quiet connection before moving on
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// TCP server for rawkv
///
/// One acceptor (the thread calling [`Server::run`]) feeds accepted
/// connections through a bounded channel to `worker_threads` workers.
/// Workers return quiet connections to the same channel, so idle clients
/// never pin a worker. When the channel is full new connections are closed
/// immediately.
pub struct Server {
    config: Config,
    api: RawApi,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Create a new server with the given config and request handler
    pub fn new(config: Config, api: RawApi) -> Self {
        Self {
            config,
            api,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listen address; `run` binds on demand if this was skipped
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            RawKvError::Network(format!("bind {}: {}", self.config.listen_addr, e))
        })?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        tracing::info!("Listening on {}", addr);
        Ok(addr)
    }

    /// Bound address, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Flag that stops the accept loop when set
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Start the server (blocking until shutdown)
    ///
    /// Workers notice the shutdown flag between requests and exit, closing
    /// the connections they hold.
    pub fn run(&mut self) -> Result<()> {
        self.config.validate()?;
        self.bind()?;
        let listener = match &self.listener {
            Some(listener) => listener,
            None => return Err(RawKvError::Network("listener not bound".to_string())),
        };
        listener.set_nonblocking(true)?;

        let (tx, rx) = channel::bounded::<Connection>(self.config.max_connections);
        for id in 0..self.config.worker_threads {
            let worker = Worker {
                queue: tx.clone(),
                incoming: rx.clone(),
                shutdown: Arc::clone(&self.shutdown),
                idle_timeout: (self.config.idle_timeout_ms > 0)
                    .then(|| Duration::from_millis(self.config.idle_timeout_ms)),
            };
            thread::Builder::new()
                .name(format!("rawkv-worker-{}", id))
                .spawn(move || worker.run())?;
        }
        drop(rx);

        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    tracing::trace!("Accepted connection from {}", addr);
                    let connection = match self.open_connection(stream) {
                        Ok(connection) => connection,
                        Err(e) => {
                            tracing::warn!("Dropping connection from {}: {}", addr, e);
                            continue;
                        }
                    };
                    match tx.try_send(connection) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::warn!("Connection queue full, refusing {}", addr);
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(RawKvError::Network("all workers exited".to_string()));
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }

        tracing::info!("Server shutting down");
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn open_connection(&self, stream: TcpStream) -> Result<Connection> {
        stream.set_nonblocking(false)?;
        let mut connection = Connection::new(stream, self.api.clone())?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;
        Ok(connection)
    }
}

/// Pulls connections off the shared queue and answers their requests,
/// putting a connection back on the queue whenever it goes quiet
struct Worker {
    queue: Sender<Connection>,
    incoming: Receiver<Connection>,
    shutdown: Arc<AtomicBool>,
    idle_timeout: Option<Duration>,
}

impl Worker {
    fn run(self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.incoming.recv_timeout(IDLE_POLL_INTERVAL) {
                Ok(connection) => self.serve(connection),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn serve(&self, mut connection: Connection) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match connection.poll(IDLE_POLL_INTERVAL) {
                Ok(Turn::Served) => {}
                Ok(Turn::Closed) => return,
                Ok(Turn::Idle) => {
                    if self
                        .idle_timeout
                        .is_some_and(|limit| connection.idle_for() >= limit)
                    {
                        tracing::debug!("Closing idle connection {}", connection.peer_addr());
                        return;
                    }
                    match self.queue.try_send(connection) {
                        Ok(()) => return,
                        // Queue full: keep watching this one ourselves
                        Err(TrySendError::Full(back)) => connection = back,
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "Connection {} closed with error: {}",
                        connection.peer_addr(),
                        e
                    );
                    return;
                }
            }
        }
    }
}
