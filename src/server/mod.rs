//! Server Module
//!
//! Request handlers sitting between the network layer and storage.

mod raw_api;

pub use raw_api::{RawApi, SCAN_BYTE_BUDGET};
