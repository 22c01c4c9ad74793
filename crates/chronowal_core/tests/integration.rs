//! End-to-end tests of the WAL against its segment files.

use chronowal_core::{
    checksum, segment_path, CorruptionError, FragmentHeader, FragmentKind, FrameError,
    RecordReader, Wal, WalError, HEADER_SIZE, PAGE_SIZE,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

/// Replays every segment, returning the records read and the corruption
/// that stopped the replay, if any.
fn replay(dir: &Path) -> (Vec<Vec<u8>>, Option<CorruptionError>) {
    let mut records = Vec::new();
    for item in RecordReader::open_dir(dir).unwrap() {
        match item {
            Ok((_, record)) => records.push(record),
            Err(WalError::Corruption(err)) => return (records, Some(err)),
            Err(e) => panic!("unexpected replay error: {e}"),
        }
    }
    (records, None)
}

/// Parses the fragment headers of one segment file.
fn fragments(data: &[u8]) -> Vec<(FragmentKind, usize)> {
    let mut out = Vec::new();
    let mut at = 0;
    while at + HEADER_SIZE <= data.len() {
        if data[at] == FragmentKind::Terminator.as_byte() {
            at = (at / PAGE_SIZE + 1) * PAGE_SIZE;
            continue;
        }
        let header: [u8; HEADER_SIZE] = data[at..at + HEADER_SIZE].try_into().unwrap();
        let header = FragmentHeader::decode(&header).unwrap();
        let len = usize::from(header.len);
        let payload = &data[at + HEADER_SIZE..at + HEADER_SIZE + len];
        assert_eq!(checksum(payload), header.crc);
        assert_eq!(
            at / PAGE_SIZE,
            (at + HEADER_SIZE + len - 1) / PAGE_SIZE,
            "fragment crosses a page"
        );
        out.push((header.kind, len));
        at += HEADER_SIZE + len;
    }
    out
}

fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn small_record_round_trip() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path()).unwrap();
    wal.log_one(b"cpu,host=a value=0.64").unwrap();
    wal.close().unwrap();

    let wal = Wal::open(dir.path()).unwrap();
    let (records, err) = replay(dir.path());
    assert!(err.is_none());
    assert_eq!(records, vec![b"cpu,host=a value=0.64".to_vec()]);
    wal.close().unwrap();
}

#[test]
fn large_record_is_fragmented() {
    let dir = tempdir().unwrap();
    let wal = Wal::open_with_segment_size(dir.path(), 8 * PAGE_SIZE).unwrap();
    let record = patterned(3 * PAGE_SIZE + 123, 5);
    wal.log_one(&record).unwrap();
    wal.close().unwrap();

    let data = fs::read(segment_path(dir.path(), 0)).unwrap();
    assert_eq!(data.len() % PAGE_SIZE, 0);

    let kinds: Vec<_> = fragments(&data).into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(
        kinds,
        vec![
            FragmentKind::First,
            FragmentKind::Middle,
            FragmentKind::Middle,
            FragmentKind::Last,
        ]
    );
    assert_eq!(replay(dir.path()).0, vec![record]);
}

#[test]
fn record_never_spans_segments() {
    let dir = tempdir().unwrap();
    let wal = Wal::open_with_segment_size(dir.path(), 2 * PAGE_SIZE).unwrap();
    let head = patterned(PAGE_SIZE + 500, 1);
    let tail = patterned(PAGE_SIZE, 2);
    wal.log_one(&head).unwrap();
    wal.log_one(&tail).unwrap();
    wal.close().unwrap();

    let first = fs::read(segment_path(dir.path(), 0)).unwrap();
    let second = fs::read(segment_path(dir.path(), 1)).unwrap();
    assert_eq!(first.len(), 2 * PAGE_SIZE);

    let first_kinds: Vec<_> = fragments(&first).into_iter().map(|(k, _)| k).collect();
    assert_eq!(first_kinds, vec![FragmentKind::First, FragmentKind::Last]);
    assert_eq!(second[0], FragmentKind::First.as_byte());
    assert_eq!(replay(dir.path()).0, vec![head, tail]);
}

#[test]
fn torn_tail_is_padded_on_open() {
    let dir = tempdir().unwrap();
    let crashed = tempdir().unwrap();

    let wal = Wal::open(dir.path()).unwrap();
    wal.log(&[b"before".as_slice(), b"crash"]).unwrap();
    // The partially flushed page as it would be found after a crash.
    fs::copy(segment_path(dir.path(), 0), segment_path(crashed.path(), 0)).unwrap();
    wal.close().unwrap();
    let torn_len = fs::metadata(segment_path(crashed.path(), 0)).unwrap().len();
    assert_ne!(torn_len % PAGE_SIZE as u64, 0);

    let wal = Wal::open(crashed.path()).unwrap();
    let len = fs::metadata(segment_path(crashed.path(), 0)).unwrap().len();
    assert_eq!(len, PAGE_SIZE as u64);

    let (records, err) = replay(crashed.path());
    assert!(err.is_none());
    assert_eq!(records.len(), 2);

    wal.log_one(b"after").unwrap();
    wal.close().unwrap();

    let (records, err) = replay(crashed.path());
    assert!(err.is_none());
    assert_eq!(
        records,
        vec![b"before".to_vec(), b"crash".to_vec(), b"after".to_vec()]
    );
}

#[test]
fn repair_preserves_good_prefix() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path()).unwrap();
    wal.log(&[b"first".as_slice(), b"second", b"third"]).unwrap();
    wal.close().unwrap();

    // Break the checksum of the third record.
    let path = segment_path(dir.path(), 0);
    let mut data = fs::read(&path).unwrap();
    let third = 2 * HEADER_SIZE + b"first".len() + b"second".len();
    data[third + 3] ^= 0x55;
    fs::write(&path, data).unwrap();

    let wal = Wal::open(dir.path()).unwrap();
    let (records, err) = replay(dir.path());
    assert_eq!(records.len(), 2);
    let err = err.expect("replay should report corruption");
    assert_eq!(err.segment, Some(0));
    assert!(matches!(err.cause, FrameError::ChecksumMismatch { .. }));

    wal.repair(&err).unwrap();
    wal.log_one(b"fourth").unwrap();
    wal.close().unwrap();

    let (records, err) = replay(dir.path());
    assert!(err.is_none());
    assert_eq!(
        records,
        vec![b"first".to_vec(), b"second".to_vec(), b"fourth".to_vec()]
    );
}

#[test]
fn repair_from_constructed_error() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path()).unwrap();
    wal.log(&[b"aa".as_slice(), b"bb", b"cc"]).unwrap();
    wal.close().unwrap();

    let wal = Wal::open(dir.path()).unwrap();
    let third = 2 * (HEADER_SIZE + 2) as u64;
    let err = CorruptionError::in_segment(dir.path(), 0, third, FrameError::Truncated);
    wal.repair(&err).unwrap();
    wal.close().unwrap();

    assert_eq!(replay(dir.path()).0, vec![b"aa".to_vec(), b"bb".to_vec()]);
}

#[test]
fn truncate_removes_exactly_older_segments() {
    let dir = tempdir().unwrap();
    let wal = Wal::open_with_segment_size(dir.path(), PAGE_SIZE).unwrap();
    for seed in 0..6 {
        wal.log_one(&patterned(PAGE_SIZE - HEADER_SIZE, seed)).unwrap();
    }
    assert_eq!(wal.segments().unwrap(), Some((0, 5)));

    wal.truncate(3).unwrap();
    assert_eq!(wal.segments().unwrap(), Some((3, 5)));
    for index in 0..3 {
        assert!(!segment_path(dir.path(), index).exists());
    }
    wal.close().unwrap();

    assert_eq!(replay(dir.path()).0.len(), 3);
}

#[test]
fn concurrent_batches_are_serialized() {
    const THREADS: u8 = 8;
    const BATCHES: u8 = 10;
    const PER_BATCH: usize = 4;

    let dir = tempdir().unwrap();
    let wal = Arc::new(Wal::open_with_segment_size(dir.path(), 4 * PAGE_SIZE).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                for b in 0..BATCHES {
                    let batch: Vec<Vec<u8>> = (0..PER_BATCH)
                        .map(|i| {
                            let len = 3 + (usize::from(t) * 7919 + usize::from(b) * 104_729 + i * 13)
                                % (PAGE_SIZE + PAGE_SIZE / 2);
                            let mut record = vec![t, b, i as u8];
                            record.resize(len, t ^ b);
                            record
                        })
                        .collect();
                    wal.log(&batch).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    wal.close().unwrap();

    let (records, err) = replay(dir.path());
    assert!(err.is_none());
    assert_eq!(
        records.len(),
        usize::from(THREADS) * usize::from(BATCHES) * PER_BATCH
    );
    for batch in records.chunks(PER_BATCH) {
        let (t, b) = (batch[0][0], batch[0][1]);
        for (i, record) in batch.iter().enumerate() {
            assert_eq!(record[..3], [t, b, i as u8]);
            assert!(record[3..].iter().all(|&x| x == t ^ b));
        }
    }
}
