//! Tests for the TCP server and client
//!
//! These tests verify:
//! - Client round trips for every request type
//! - Multiple concurrent clients
//! - Idle connections do not hold workers
//! - Malformed input closes only the offending connection
//! - Shutdown stops the accept loop

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rawkv::config::{Config, WalSyncStrategy};
use rawkv::kvrpc::{self, Context, Request, Response};
use rawkv::network::{Client, Server};
use rawkv::{RawApi, StandaloneStorage, Storage};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    _temp: TempDir,
    addr: SocketAddr,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<JoinHandle<rawkv::Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::with_workers(4)
    }

    fn with_workers(workers: usize) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp_dir.path())
            .listen_addr("127.0.0.1:0")
            .worker_threads(workers)
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .build();

        let storage: StandaloneStorage = StandaloneStorage::new(config.clone());
        storage.start().unwrap();

        let mut server = Server::new(config, RawApi::new(Arc::new(storage)));
        let addr = server.bind().unwrap();
        let shutdown = server.shutdown_flag();
        let handle = thread::spawn(move || server.run());

        Self {
            _temp: temp_dir,
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.addr).unwrap()
    }

    fn stop(&mut self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_ping() {
    let server = TestServer::start();
    let mut client = server.client();

    client.ping().unwrap();
    client.ping().unwrap();
}

#[test]
fn test_put_get_delete_over_tcp() {
    let server = TestServer::start();
    let mut client = server.client();

    assert_eq!(client.raw_put("default", b"foo", b"bar").unwrap().error, "");

    let resp = client.raw_get("default", b"foo").unwrap();
    assert_eq!(resp.value, b"bar".to_vec());
    assert!(!resp.not_found);

    assert_eq!(client.raw_delete("default", b"foo").unwrap().error, "");
    assert!(client.raw_get("default", b"foo").unwrap().not_found);

    // Absent key delete is still a success
    assert_eq!(client.raw_delete("default", b"foo").unwrap().error, "");
}

#[test]
fn test_scan_over_tcp() {
    let server = TestServer::start();
    let mut client = server.client();
    for (key, value) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
        client.raw_put("default", key.as_bytes(), value.as_bytes()).unwrap();
    }
    client.raw_put("lock", b"b", b"x").unwrap();

    let resp = client.raw_scan("default", b"b", 2).unwrap();

    assert_eq!(resp.error, "");
    let keys: Vec<&[u8]> = resp.kvs.iter().map(|p| p.key.as_slice()).collect();
    assert_eq!(keys, vec![b"b".as_slice(), b"c".as_slice()]);
}

#[test]
fn test_scan_of_large_values_fits_one_frame() {
    let server = TestServer::start();
    let mut client = server.client();
    let value = vec![b'x'; 15 * 1024 * 1024];
    for i in 0..5 {
        let key = format!("big{}", i);
        assert_eq!(client.raw_put("default", key.as_bytes(), &value).unwrap().error, "");
    }

    let first = client.raw_scan("default", b"", 10).unwrap();
    assert_eq!(first.error, "");
    assert_eq!(first.kvs.len(), 4);

    let mut resume = first.kvs[3].key.clone();
    resume.push(0);
    let rest = client.raw_scan("default", &resume, 10).unwrap();
    assert_eq!(rest.kvs.len(), 1);
    assert_eq!(rest.kvs[0].key, b"big4".to_vec());

    client.ping().unwrap();
}

#[test]
fn test_context_is_accepted() {
    let server = TestServer::start();
    let mut client = server.client().with_context(Context {
        region_id: 1,
        peer_id: 1,
        term: 5,
    });

    assert_eq!(client.raw_put("write", b"k", b"v").unwrap().error, "");
    assert_eq!(client.raw_get("write", b"k").unwrap().value, b"v".to_vec());
}

#[test]
fn test_errors_travel_in_response() {
    let server = TestServer::start();
    let mut client = server.client();
    let huge_key = vec![b'k'; 70_000];

    let resp = client.raw_put("default", &huge_key, b"v").unwrap();
    assert!(!resp.error.is_empty());

    // The connection is still usable afterward
    client.ping().unwrap();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_clients() {
    let server = TestServer::start();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let addr = server.addr;
            thread::spawn(move || {
                let mut client = Client::connect(addr).unwrap();
                for i in 0..25 {
                    let key = format!("c{}-{:02}", t, i);
                    assert_eq!(client.raw_put("default", key.as_bytes(), b"v").unwrap().error, "");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut client = server.client();
    let resp = client.raw_scan("default", b"", 1000).unwrap();
    assert_eq!(resp.kvs.len(), 100);
}

#[test]
fn test_idle_connection_does_not_block_others() {
    let server = TestServer::with_workers(1);
    let mut idle = TcpStream::connect(server.addr).unwrap();
    thread::sleep(Duration::from_millis(200));

    let (tx, rx) = mpsc::channel();
    let addr = server.addr;
    thread::spawn(move || {
        let result = Client::connect(addr).and_then(|mut client| client.ping());
        let _ = tx.send(result.is_ok());
    });
    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());

    // The quiet connection is still served once it speaks
    idle.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    kvrpc::write_request(&mut idle, &Request::Ping).unwrap();
    let resp = kvrpc::read_response(&mut idle).unwrap();
    assert_eq!(resp, Response::Pong);
}

#[test]
fn test_single_worker_interleaves_clients() {
    let server = TestServer::with_workers(1);
    let mut first = server.client();
    let mut second = server.client();

    for i in 0..5 {
        let key = format!("k{}", i);
        assert_eq!(first.raw_put("default", key.as_bytes(), b"1").unwrap().error, "");
        assert_eq!(second.raw_get("default", key.as_bytes()).unwrap().value, b"1".to_vec());
    }
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_unknown_type_closes_connection_only() {
    let server = TestServer::start();

    let mut raw = TcpStream::connect(server.addr).unwrap();
    raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    raw.write_all(&[0x7f, 0, 0, 0, 0]).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(raw.read(&mut buf).unwrap_or(0), 0);

    let mut client = server.client();
    client.ping().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_returns_from_run() {
    let mut server = TestServer::start();
    let mut client = server.client();
    client.raw_put("default", b"k", b"v").unwrap();

    server.stop();

    assert!(server.handle.is_none());
}
