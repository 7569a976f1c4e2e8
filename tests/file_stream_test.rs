//! End-to-end tests over real files

use cryptstream::prelude::*;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn encrypt_to(path: &std::path::Path, key: &StreamKey, config: &StreamConfig, data: &[u8]) {
    let stream = EncryptedStream::with_config(key, FileStore::create(path).unwrap(), config).unwrap();
    stream.open(OpenMode::Write).unwrap();
    for part in data.chunks(10_000) {
        stream.write(part).unwrap();
    }
    stream.close().unwrap();
}

#[test]
fn test_file_roundtrip_default_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.enc");
    let key = StreamKey::generate();
    let config = StreamConfig::default();
    let data = payload(3 * 65536 + 1);

    encrypt_to(&path, &key, &config, &data);

    let raw_len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(raw_len, 3 * (65536 + 28) + 29);
    assert_eq!(
        ChunkLayout::default().total_plaintext_length(raw_len).unwrap(),
        data.len() as u64
    );

    let stream = EncryptedStream::new(&key, FileStore::open(&path).unwrap()).unwrap();
    stream.open(OpenMode::Read).unwrap();
    assert_eq!(stream.size().unwrap(), data.len() as u64);

    let mut decrypted = Vec::new();
    StreamIo::new(&stream).read_to_end(&mut decrypted).unwrap();
    assert_eq!(decrypted, data);
    stream.close().unwrap();
}

#[test]
fn test_scrubbing_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scrub.enc");
    let key = StreamKey::generate();
    let config = StreamConfig {
        chunk_size: 1024,
        cache_chunks: 1,
    };
    let data = payload(10 * 1024 + 77);

    encrypt_to(&path, &key, &config, &data);

    let stream =
        EncryptedStream::with_config(&key, FileStore::open(&path).unwrap(), &config).unwrap();
    stream.open(OpenMode::Read).unwrap();
    let mut io = StreamIo::new(&stream);

    // Jump around like a media player would
    for &(offset, len) in &[(9000usize, 500usize), (10, 2000), (10_000, 1000), (1023, 2), (0, 1)] {
        io.seek(SeekFrom::Start(offset as u64)).unwrap();
        let mut buf = vec![0u8; len];
        let n = io.read(&mut buf).unwrap();
        let expected = &data[offset..(offset + len).min(data.len())];
        assert_eq!(&buf[..n], expected, "offset {}", offset);
    }
}

#[test]
fn test_tampered_file_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tampered.enc");
    let key = StreamKey::generate();
    let config = StreamConfig {
        chunk_size: 256,
        cache_chunks: 1,
    };

    encrypt_to(&path, &key, &config, &payload(1000));

    let mut raw = std::fs::read(&path).unwrap();
    raw[2 * (256 + 28) + 40] ^= 0x10;
    std::fs::write(&path, raw).unwrap();

    let stream =
        EncryptedStream::with_config(&key, FileStore::open(&path).unwrap(), &config).unwrap();
    stream.open(OpenMode::Read).unwrap();

    match stream.verify() {
        Err(Error::Integrity { chunk }) => assert_eq!(chunk, 2),
        other => panic!("tampering not detected: {:?}", other),
    }

    // Chunks before the damaged one are still readable
    assert_eq!(stream.read(512).unwrap(), payload(1000)[..512].to_vec());
    assert!(stream.read(1).unwrap_err().is_integrity());
}

#[test]
fn test_truncated_file_rejected_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.enc");
    let key = StreamKey::generate();
    let config = StreamConfig {
        chunk_size: 256,
        cache_chunks: 1,
    };

    encrypt_to(&path, &key, &config, &payload(600));

    // Cut into the final chunk's framing
    let raw = std::fs::read(&path).unwrap();
    let cut = 2 * (256 + 28) + 10;
    std::fs::write(&path, &raw[..cut]).unwrap();

    let stream =
        EncryptedStream::with_config(&key, FileStore::open(&path).unwrap(), &config).unwrap();
    assert!(matches!(
        stream.open(OpenMode::Read),
        Err(Error::MalformedLength { .. })
    ));
}

#[test]
fn test_shared_stream_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.enc");
    let key = StreamKey::generate();
    let config = StreamConfig {
        chunk_size: 64,
        cache_chunks: 1,
    };

    encrypt_to(&path, &key, &config, &payload(4096));

    let stream = Arc::new(
        EncryptedStream::with_config(&key, FileStore::open(&path).unwrap(), &config).unwrap(),
    );
    stream.open(OpenMode::Read).unwrap();

    // One thread services reads while this one observes position
    let reader = {
        let stream = Arc::clone(&stream);
        std::thread::spawn(move || {
            let mut total = 0;
            loop {
                let data = stream.read(100).unwrap();
                if data.is_empty() {
                    break total;
                }
                total += data.len();
            }
        })
    };

    assert!(stream.position().unwrap() <= 4096);
    assert_eq!(reader.join().unwrap(), 4096);
    assert_eq!(stream.position().unwrap(), 4096);

    stream.close().unwrap();
    assert!(matches!(stream.read(1), Err(Error::Closed)));
}
