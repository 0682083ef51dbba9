//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Entry framing and checksums
//! - Writer LSN assignment and continuation across reopen
//! - Reader iteration
//! - Recovery from clean, torn and corrupted files

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rawkv::config::WalSyncStrategy;
use rawkv::wal::{Mutation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use rawkv::RawKvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Mutation {
    Mutation::Set {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

/// Write `count` single-mutation batches using WalWriter
fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(&[put(&format!("key{}", i), &format!("value{}", i))])
            .unwrap();
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_serialize_deserialize() {
    let entry = WalEntry::new(7, vec![put("a", "1"), Mutation::Delete { key: b"b".to_vec() }]);
    let bytes = entry.serialize().unwrap();

    let (decoded, consumed) = WalEntry::deserialize(&bytes).unwrap();
    assert_eq!(decoded, entry);
    assert_eq!(consumed, bytes.len());
}

#[test]
fn test_entry_header_layout() {
    let entry = WalEntry::new(42, vec![put("k", "v")]);
    let bytes = entry.serialize().unwrap();

    assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 42);
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
}

#[test]
fn test_entry_detects_flipped_payload_bit() {
    let mut bytes = WalEntry::new(1, vec![put("k", "v")]).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    match WalEntry::deserialize(&bytes) {
        Err(RawKvError::WalCorruption(_)) => {}
        other => panic!("expected corruption, got {:?}", other),
    }
}

#[test]
fn test_entry_incomplete_frame() {
    let bytes = WalEntry::new(1, vec![put("k", "v")]).serialize().unwrap();
    assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]).is_err());
    assert!(WalEntry::deserialize(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn test_mutation_key() {
    assert_eq!(put("k", "v").key(), b"k");
    assert_eq!(Mutation::Delete { key: b"d".to_vec() }.key(), b"d");
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_increasing_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 0);
    assert_eq!(writer.append(&[put("a", "1")]).unwrap(), 1);
    assert_eq!(writer.append(&[put("b", "2")]).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_writer_continues_lsn_after_reopen() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 3);
    assert_eq!(writer.append(&[put("d", "4")]).unwrap(), 4);
}

#[test]
fn test_writer_batched_sync_still_reaches_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();
    writer.append(&[put("a", "1")]).unwrap();

    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_writer_truncate_empties_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(&[put("a", "1")]).unwrap();
    writer.truncate().unwrap();

    assert_eq!(file_len(&wal_path), 0);

    writer.append(&[put("b", "2")]).unwrap();
    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].batch, vec![put("b", "2")]);
}

#[test]
fn test_writer_keeps_file_length_in_step_with_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(&[put("a", "1")]).unwrap();
    let one = file_len(&wal_path);
    writer.append(&[put("b", "2")]).unwrap();

    let expected = WalEntry::new(2, vec![put("b", "2")]).serialize().unwrap();
    assert_eq!(file_len(&wal_path), one + expected.len() as u64);
    assert!(!writer.is_poisoned());
}

#[cfg(target_os = "linux")]
#[test]
fn test_writer_refuses_appends_after_failed_rollback() {
    // Every write to /dev/full fails and it cannot be truncated
    let dev_full = Path::new("/dev/full");
    if !dev_full.exists() {
        return;
    }
    let mut writer =
        WalWriter::open(dev_full, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    let first = writer.append(&[put("a", "1")]);
    assert!(matches!(first, Err(RawKvError::WalWrite(_))));
    assert_eq!(writer.current_lsn(), 0);
    assert!(writer.is_poisoned());

    let second = writer.append(&[put("b", "2")]);
    assert!(matches!(second, Err(RawKvError::WalWrite(_))));
    assert_eq!(writer.current_lsn(), 0);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_iterates_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 5);

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 5);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, i as u64 + 1);
        assert_eq!(entry.batch, vec![put(&format!("key{}", i), &format!("value{}", i))]);
    }
}

#[test]
fn test_reader_reports_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let len = file_len(&wal_path);
    OpenOptions::new()
        .write(true)
        .open(&wal_path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(RawKvError::WalCorruption(_))));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let (_temp, wal_path) = setup_temp_wal();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_truncates_partial_write() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let clean_len = file_len(&wal_path);

    // Half of a fourth frame
    let frame = WalEntry::new(4, vec![put("key3", "value3")]).serialize().unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&frame[..frame.len() / 2]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(result.last_lsn, 3);
    assert_eq!(result.entries_corrupted, 0);
    assert!(result.was_truncated);
    assert_eq!(file_len(&wal_path), clean_len);
}

#[test]
fn test_recover_stops_at_corrupted_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut file = File::create(&wal_path).unwrap();
    let first = WalEntry::new(1, vec![put("a", "1")]).serialize().unwrap();
    let mut second = WalEntry::new(2, vec![put("b", "2")]).serialize().unwrap();
    let third = WalEntry::new(3, vec![put("c", "3")]).serialize().unwrap();
    let last = second.len() - 1;
    second[last] ^= 0xff;
    file.write_all(&first).unwrap();
    file.write_all(&second).unwrap();
    file.write_all(&third).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_recovered, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(file_len(&wal_path), first.len() as u64);
}

#[test]
fn test_recover_rejects_out_of_order_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut file = File::create(&wal_path).unwrap();
    let first = WalEntry::new(5, vec![put("a", "1")]).serialize().unwrap();
    let stale = WalEntry::new(5, vec![put("b", "2")]).serialize().unwrap();
    file.write_all(&first).unwrap();
    file.write_all(&stale).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(file_len(&wal_path), first.len() as u64);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);
    let len = file_len(&wal_path);

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert!(result.was_truncated);
    assert_eq!(file_len(&wal_path), len);
}
