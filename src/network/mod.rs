//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool sharing one connection queue; idle connections
//!   go back on the queue
//! - Requests routed through RawApi

mod server;
mod connection;
mod client;

pub use server::Server;
pub use connection::{Connection, Turn};
pub use client::Client;
