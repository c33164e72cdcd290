use parking_lot::Mutex;
use slotbuffer::block::Block;
use slotbuffer::buffer::{Buffer, SharedBuffer};
use slotbuffer::error::Error;
use slotbuffer::evictor::{LruEvictor, RandomEvictor};
use slotbuffer::raf::{BufferedRandomAccessFile, FileId};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Integration tests for multi-file scenarios with cache evictions
/// Tests several files sharing one buffer with fewer slots than blocks

fn file_contents(i: usize, len: usize) -> Vec<u8> {
    (0..len).map(|n| (i * 31 + n) as u8).collect()
}

#[test]
fn test_multi_file_cache_eviction_stress() {
    let dir = tempfile::tempdir().unwrap();
    // each open file keeps one block fixed, so there must be more slots
    // than files; 80 blocks over 12 slots still churns
    let buffer: SharedBuffer<FileId, u64, Vec<u8>> =
        Buffer::new(12, LruEvictor::new()).into_shared();

    let names = [
        "user_profile_1.json",
        "transaction_2023.csv",
        "config_settings.toml",
        "log_entries.txt",
        "image_metadata.xml",
        "database_schema.sql",
        "api_responses.json",
        "user_sessions.log",
        "error_reports.txt",
        "performance_metrics.csv",
    ];

    let mut files: Vec<_> = names
        .iter()
        .map(|name| {
            BufferedRandomAccessFile::open(dir.path().join(name), Arc::clone(&buffer), 16)
        })
        .collect::<Result<_, _>>()
        .unwrap();

    // interleave writes so every file keeps losing its blocks to the others
    for chunk in 0..8 {
        for (i, file) in files.iter_mut().enumerate() {
            let data = file_contents(i, 128);
            file.write_all(&data[chunk * 16..(chunk + 1) * 16]).unwrap();
        }
    }
    assert!(buffer.lock().stats().evictions > 0);
    buffer.lock().check_buffer().unwrap();

    // read back through the cache before closing
    for (i, file) in files.iter_mut().enumerate() {
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut back = Vec::new();
        file.read_to_end(&mut back).unwrap();
        assert_eq!(back, file_contents(i, 128), "file {} differs", names[i]);
    }

    for file in files {
        file.close().unwrap();
    }
    assert_eq!(buffer.lock().size(), 0);

    for (i, name) in names.iter().enumerate() {
        let on_disk = fs::read(dir.path().join(name)).unwrap();
        assert_eq!(on_disk, file_contents(i, 128), "file {name} differs on disk");
    }
}

#[test]
fn test_more_open_files_than_slots_overflows() {
    let dir = tempfile::tempdir().unwrap();
    let buffer: SharedBuffer<FileId, u64, Vec<u8>> =
        Buffer::new(3, LruEvictor::new()).into_shared();

    let mut files: Vec<_> = (0..4)
        .map(|i| {
            let path = dir.path().join(format!("f{i}"));
            BufferedRandomAccessFile::open(path, Arc::clone(&buffer), 8)
        })
        .collect::<Result<_, _>>()
        .unwrap();

    for file in files.iter_mut().take(3) {
        file.write_byte(1).unwrap();
    }
    assert_eq!(buffer.lock().fixed_slots(), 3);

    // the fourth file cannot pin its block
    let err = files[3].write_byte(1).unwrap_err();
    let inner = err.into_inner().unwrap();
    assert!(matches!(
        inner.downcast_ref::<Error>(),
        Some(Error::SlotOverflow { capacity: 3 })
    ));
    assert_eq!(files[3].len(), 0);

    // closing one file frees its slot
    let first = files.remove(0);
    first.close().unwrap();
    files[2].write_byte(1).unwrap();
    buffer.lock().check_buffer().unwrap();
}

#[test]
fn test_reopen_reads_through_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, file_contents(7, 1000)).unwrap();

    let buffer = Buffer::new(4, LruEvictor::new()).into_shared();
    let mut file = BufferedRandomAccessFile::open(&path, buffer, 100).unwrap();
    assert_eq!(file.len(), 1000);

    // the same block is read repeatedly but loaded once
    for _ in 0..5 {
        file.seek(SeekFrom::Start(250)).unwrap();
        let mut word = [0; 10];
        file.read_exact(&mut word).unwrap();
        assert_eq!(&word[..], &file_contents(7, 1000)[250..260]);
    }
    assert_eq!(file.io_counter().reads, 1);
    assert_eq!(file.io_counter().writes, 0);
    drop(file);
    assert_eq!(fs::read(&path).unwrap(), file_contents(7, 1000));
}

#[test]
fn test_concurrent_file_operations_with_evictions() {
    let dir = tempfile::tempdir().unwrap();
    let buffer: SharedBuffer<FileId, u64, Vec<u8>> =
        Buffer::new(4, RandomEvictor::seeded(11)).into_shared();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let buffer = Arc::clone(&buffer);
            let path = dir.path().join(format!("worker_{t}.bin"));
            scope.spawn(move || {
                let mut file = BufferedRandomAccessFile::open(path, buffer, 8).unwrap();
                let data = file_contents(t, 256);
                for chunk in data.chunks(5) {
                    file.write_all(chunk).unwrap();
                }
                file.seek(SeekFrom::Start(0)).unwrap();
                let mut back = Vec::new();
                file.read_to_end(&mut back).unwrap();
                assert_eq!(back, data);
                file.close().unwrap();
            });
        }
    });

    buffer.lock().check_buffer().unwrap();
    assert_eq!(buffer.lock().size(), 0);
    for t in 0..4 {
        let on_disk = fs::read(dir.path().join(format!("worker_{t}.bin"))).unwrap();
        assert_eq!(on_disk, file_contents(t, 256));
    }
}

#[test]
fn test_truncate_one_file_keeps_others() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Buffer::new(6, LruEvictor::new()).into_shared();
    let mut a = BufferedRandomAccessFile::open(dir.path().join("a"), Arc::clone(&buffer), 4)
        .unwrap();
    let mut b = BufferedRandomAccessFile::open(dir.path().join("b"), Arc::clone(&buffer), 4)
        .unwrap();

    a.write_all(b"0123456789").unwrap();
    b.write_all(b"abcdefghij").unwrap();
    a.set_len(5).unwrap();
    assert_eq!(a.len(), 5);
    assert_eq!(a.position(), 5);

    // growing again exposes zeros, not the old tail
    a.set_len(8).unwrap();
    a.seek(SeekFrom::Start(0)).unwrap();
    let mut back = Vec::new();
    a.read_to_end(&mut back).unwrap();
    assert_eq!(back, b"01234\0\0\0");

    a.close().unwrap();
    b.close().unwrap();
    assert_eq!(fs::read(dir.path().join("a")).unwrap(), b"01234\0\0\0");
    assert_eq!(fs::read(dir.path().join("b")).unwrap(), b"abcdefghij");
}

#[test]
fn test_block_pages_under_byte_budget() {
    // the "disk" that evicted pages are written back to
    let disk: Arc<Mutex<HashMap<u64, Vec<u8>>>> = Arc::default();
    let mut buffer: Buffer<&str, u64, Block> =
        Buffer::with_byte_capacity(16, 256, LruEvictor::new());

    for page in 0..10u64 {
        let mut block = Block::new(64);
        block.write_long(0, page as i64).unwrap();
        block.write_int(8, (page * 3) as i32).unwrap();
        let disk = Arc::clone(&disk);
        buffer
            .update(
                &"pages",
                &page,
                block,
                move |id, block: &Block| {
                    disk.lock().insert(*id, block.as_slice()?.to_vec());
                    Ok(())
                },
                true,
            )
            .unwrap();
        assert!(buffer.bytes_used() <= 256);
    }

    // four 64-byte pages fit; the rest went to disk on eviction
    assert_eq!(buffer.size(), 4);
    assert_eq!(disk.lock().len(), 6);
    buffer.flush_all(&"pages").unwrap();
    assert_eq!(disk.lock().len(), 10);

    for page in 0..10u64 {
        let stored = Block::from_vec(disk.lock()[&page].clone());
        assert_eq!(stored.read_long(0).unwrap(), page as i64);
        assert_eq!(stored.read_int(8).unwrap(), (page * 3) as i32);
    }

    // a page larger than the whole budget cannot be admitted
    let err = buffer
        .fix(&"pages", &99, |_| Ok(Block::new(512)))
        .unwrap_err();
    assert!(matches!(err, Error::ByteOverflow { .. }));
    assert!(!buffer.contains(&"pages", &99));
    buffer.check_buffer().unwrap();
}

#[test]
fn test_eviction_strategy_comparison() {
    let strategies: Vec<(&str, SharedBuffer<FileId, u64, Vec<u8>>)> = vec![
        ("lru", Buffer::new(2, LruEvictor::new()).into_shared()),
        ("random", Buffer::new(2, RandomEvictor::seeded(3)).into_shared()),
    ];
    let pattern: Vec<u64> = (0..200).map(|n| (n * 7919) % 64).collect();
    let data = file_contents(5, 64);

    for (name, buffer) in strategies {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, &data).unwrap();
        let mut file = BufferedRandomAccessFile::open(&path, Arc::clone(&buffer), 4).unwrap();
        for &pos in &pattern {
            file.seek(SeekFrom::Start(pos)).unwrap();
            assert_eq!(file.read_byte().unwrap(), Some(data[pos as usize]), "{name}");
        }
        let stats = buffer.lock().stats();
        // every block is loaded at least once, and only on a miss
        assert!(stats.misses >= 16, "{name}");
        assert_eq!(file.io_counter().reads, stats.misses, "{name}");
        assert!(stats.evictions > 0, "{name}");
        file.close().unwrap();
    }
}
