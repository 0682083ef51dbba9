//! Tests for the raw API request handler
//!
//! These tests verify:
//! - Get/Put/Delete/Scan responses and their error fields
//! - Absence reported as `not_found`, never as an error
//! - Scan bounds, ordering and byte budget
//! - Request routing through `RawApi::handle`

use std::sync::Arc;

use rawkv::config::{Config, WalSyncStrategy};
use rawkv::kvrpc::{
    Context, KvPair, RawDeleteRequest, RawGetRequest, RawPutRequest, RawScanRequest, Request,
    Response,
};
use rawkv::storage::{CF_DEFAULT, CF_LOCK};
use rawkv::{RawApi, StandaloneStorage, Storage};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_api() -> (TempDir, RawApi) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    let storage: StandaloneStorage = StandaloneStorage::new(config);
    storage.start().unwrap();
    (temp_dir, RawApi::new(Arc::new(storage)))
}

fn get_req(cf: &str, key: &str) -> RawGetRequest {
    RawGetRequest {
        context: Context::default(),
        cf: cf.to_string(),
        key: key.as_bytes().to_vec(),
    }
}

fn put_req(cf: &str, key: &str, value: &str) -> RawPutRequest {
    RawPutRequest {
        context: Context::default(),
        cf: cf.to_string(),
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn delete_req(cf: &str, key: &str) -> RawDeleteRequest {
    RawDeleteRequest {
        context: Context::default(),
        cf: cf.to_string(),
        key: key.as_bytes().to_vec(),
    }
}

fn scan_req(cf: &str, start: &str, limit: u32) -> RawScanRequest {
    RawScanRequest {
        context: Context::default(),
        cf: cf.to_string(),
        start_key: start.as_bytes().to_vec(),
        limit,
    }
}

fn kv(key: &str, value: &str) -> KvPair {
    KvPair {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn put_all(api: &RawApi, cf: &str, pairs: &[(&str, &str)]) {
    for (key, value) in pairs {
        assert_eq!(api.raw_put(put_req(cf, key, value)).error, "");
    }
}

// =============================================================================
// Get/Put/Delete Tests
// =============================================================================

#[test]
fn test_put_get_delete_get() {
    let (_temp, api) = setup_temp_api();

    let resp = api.raw_put(put_req("default", "foo", "bar"));
    assert_eq!(resp.error, "");

    let resp = api.raw_get(get_req("default", "foo"));
    assert_eq!(resp.value, b"bar".to_vec());
    assert!(!resp.not_found);
    assert_eq!(resp.error, "");

    let resp = api.raw_delete(delete_req("default", "foo"));
    assert_eq!(resp.error, "");

    let resp = api.raw_get(get_req("default", "foo"));
    assert!(resp.not_found);
    assert!(resp.value.is_empty());
    assert_eq!(resp.error, "");
}

#[test]
fn test_get_never_written_is_not_found() {
    let (_temp, api) = setup_temp_api();

    let resp = api.raw_get(get_req(CF_DEFAULT, "missing"));

    assert!(resp.not_found);
    assert_eq!(resp.error, "");
}

#[test]
fn test_delete_missing_key_succeeds() {
    let (_temp, api) = setup_temp_api();

    let resp = api.raw_delete(delete_req(CF_DEFAULT, "missing"));

    assert_eq!(resp.error, "");
}

#[test]
fn test_overwrite_returns_latest_value() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("k", "1"), ("k", "2")]);

    assert_eq!(api.raw_get(get_req(CF_DEFAULT, "k")).value, b"2".to_vec());
}

#[test]
fn test_cfs_do_not_collide() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("k", "x")]);
    put_all(&api, CF_LOCK, &[("k", "y")]);

    assert_eq!(api.raw_get(get_req(CF_DEFAULT, "k")).value, b"x".to_vec());
    assert_eq!(api.raw_get(get_req(CF_LOCK, "k")).value, b"y".to_vec());
}

#[test]
fn test_invalid_put_reports_error() {
    let (_temp, api) = setup_temp_api();
    let huge_key = "k".repeat(70_000);

    let resp = api.raw_put(put_req(CF_DEFAULT, &huge_key, "v"));

    assert!(!resp.error.is_empty());
    assert!(api.raw_get(get_req(CF_DEFAULT, &huge_key)).not_found);
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_from_start_key_with_limit() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "b", 2));

    assert_eq!(resp.error, "");
    assert_eq!(resp.kvs, vec![kv("b", "2"), kv("c", "3")]);
}

#[test]
fn test_scan_start_key_between_keys() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("a", "1"), ("c", "3")]);

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "b", 10));

    assert_eq!(resp.kvs, vec![kv("c", "3")]);
}

#[test]
fn test_scan_stops_at_end_of_cf() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("a", "1"), ("b", "2")]);
    put_all(&api, CF_LOCK, &[("a", "l")]);
    put_all(&api, "write", &[("a", "w")]);

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "", 100));

    assert_eq!(resp.kvs, vec![kv("a", "1"), kv("b", "2")]);
}

#[test]
fn test_scan_limit_zero_returns_nothing() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("a", "1")]);

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "", 0));

    assert_eq!(resp.error, "");
    assert!(resp.kvs.is_empty());
}

#[test]
fn test_scan_skips_deleted_keys() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("a", "1"), ("b", "2"), ("c", "3")]);
    api.raw_delete(delete_req(CF_DEFAULT, "b"));

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "", 10));

    assert_eq!(resp.kvs, vec![kv("a", "1"), kv("c", "3")]);
}

#[test]
fn test_scan_is_strictly_ascending() {
    let (_temp, api) = setup_temp_api();
    for i in (0..50).rev() {
        let key = format!("key{:02}", i);
        put_all(&api, CF_DEFAULT, &[(key.as_str(), "v")]);
    }

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "", 50));

    assert_eq!(resp.kvs.len(), 50);
    assert!(resp.kvs.windows(2).all(|w| w[0].key < w[1].key));
}

#[test]
fn test_scan_stops_at_byte_budget() {
    let (_temp, api) = setup_temp_api();
    let value = "v".repeat(40);
    for key in ["a", "b", "c", "d", "e"] {
        put_all(&api, CF_DEFAULT, &[(key, value.as_str())]);
    }
    // Each pair costs 57 bytes, so two fit
    let api = api.with_scan_budget(120);

    let first = api.raw_scan(scan_req(CF_DEFAULT, "", 10));
    assert_eq!(first.error, "");
    assert_eq!(first.kvs, vec![kv("a", &value), kv("b", &value)]);

    // Resuming after the last returned key continues the scan
    let rest = api.raw_scan(scan_req(CF_DEFAULT, "b\0", 10));
    assert_eq!(rest.kvs, vec![kv("c", &value), kv("d", &value)]);
}

#[test]
fn test_scan_returns_one_pair_larger_than_budget() {
    let (_temp, api) = setup_temp_api();
    put_all(&api, CF_DEFAULT, &[("a", "0123456789"), ("b", "0123456789")]);
    let api = api.with_scan_budget(8);

    let resp = api.raw_scan(scan_req(CF_DEFAULT, "", 10));

    assert_eq!(resp.error, "");
    assert_eq!(resp.kvs, vec![kv("a", "0123456789")]);
}

#[test]
fn test_scan_releases_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();
    let storage: Arc<StandaloneStorage> = Arc::new(StandaloneStorage::new(config));
    storage.start().unwrap();
    let api = RawApi::new(storage.clone());
    put_all(&api, CF_DEFAULT, &[("a", "1")]);

    api.raw_scan(scan_req(CF_DEFAULT, "", 10));
    api.raw_get(get_req(CF_DEFAULT, "a"));

    assert_eq!(storage.engine().unwrap().live_snapshots(), 0);
}

// =============================================================================
// Error Field Tests
// =============================================================================

#[test]
fn test_stopped_storage_reports_errors_in_responses() {
    let (_temp, api) = setup_temp_api();
    api.storage().stop().unwrap();

    let get = api.raw_get(get_req(CF_DEFAULT, "k"));
    assert!(!get.error.is_empty());
    assert!(!get.not_found);

    assert!(!api.raw_put(put_req(CF_DEFAULT, "k", "v")).error.is_empty());
    assert!(!api.raw_delete(delete_req(CF_DEFAULT, "k")).error.is_empty());

    let scan = api.raw_scan(scan_req(CF_DEFAULT, "", 10));
    assert!(!scan.error.is_empty());
    assert!(scan.kvs.is_empty());
}

// =============================================================================
// Routing Tests
// =============================================================================

#[test]
fn test_handle_routes_by_request_type() {
    let (_temp, api) = setup_temp_api();

    match api.handle(Request::RawPut(put_req(CF_DEFAULT, "k", "v"))) {
        Response::RawPut(resp) => assert_eq!(resp.error, ""),
        other => panic!("unexpected response: {:?}", other),
    }
    match api.handle(Request::RawGet(get_req(CF_DEFAULT, "k"))) {
        Response::RawGet(resp) => assert_eq!(resp.value, b"v".to_vec()),
        other => panic!("unexpected response: {:?}", other),
    }
    match api.handle(Request::RawScan(scan_req(CF_DEFAULT, "", 1))) {
        Response::RawScan(resp) => assert_eq!(resp.kvs, vec![kv("k", "v")]),
        other => panic!("unexpected response: {:?}", other),
    }
    match api.handle(Request::RawDelete(delete_req(CF_DEFAULT, "k"))) {
        Response::RawDelete(resp) => assert_eq!(resp.error, ""),
        other => panic!("unexpected response: {:?}", other),
    }
    assert_eq!(api.handle(Request::Ping), Response::Pong);
}
