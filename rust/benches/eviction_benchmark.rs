use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use slotbuffer::block::Block;
use slotbuffer::buffer::Buffer;
use slotbuffer::evictor::{LruEvictor, RandomEvictor};
use slotbuffer::raf::BufferedRandomAccessFile;
use slotbuffer::store::MemStore;
use std::io::{Read, Seek, SeekFrom, Write};

const STRATEGIES: [&str; 2] = ["lru", "random"];

fn build(strategy: &str, slots: usize, bytes: Option<usize>) -> Buffer<u8, u64, Vec<u8>> {
    match (strategy, bytes) {
        ("lru", None) => Buffer::new(slots, LruEvictor::new()),
        ("lru", Some(b)) => Buffer::with_byte_capacity(slots, b, LruEvictor::new()),
        (_, None) => Buffer::new(slots, RandomEvictor::seeded(7)),
        (_, Some(b)) => Buffer::with_byte_capacity(slots, b, RandomEvictor::seeded(7)),
    }
}

/// Replays `pattern` against a fresh buffer; every eighth access is a write.
fn replay(strategy: &str, slots: usize, bytes: Option<usize>, pattern: &[u64]) -> u64 {
    let mut buffer = build(strategy, slots, bytes);
    for (n, &id) in pattern.iter().enumerate() {
        let obtain =
            |id: &u64| Ok::<_, slotbuffer::Error>(vec![*id as u8; 64 + (*id as usize % 16) * 32]);
        if n % 8 == 0 {
            let _ = buffer.update_with(&0, &id, obtain, |_, _| Ok(()), true, |d| d[0] ^= 1);
        } else {
            let _ = buffer.get(&0, &id, obtain, true);
        }
    }
    buffer.stats().hits
}

fn benchmark_eviction_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_strategies");

    // Test different buffer sizes with fixed workload
    let pattern: Vec<u64> = (0..500).map(|_| fastrand::u64(0..100)).collect();
    for buffer_size in [2, 4, 8, 16, 32] {
        for strategy in STRATEGIES {
            group.bench_with_input(
                BenchmarkId::new(strategy, buffer_size),
                &buffer_size,
                |b, &slots| b.iter(|| black_box(replay(strategy, slots, None, &pattern))),
            );
        }
    }

    group.finish();
}

fn benchmark_slot_allocation_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_allocation");

    // Test how performance scales with buffer size
    let total_items = 1000;
    let pattern: Vec<u64> = (0..2000)
        .map(|_| fastrand::u64(0..total_items as u64))
        .collect();
    for buffer_ratio in [0.01, 0.05, 0.1, 0.2, 0.5] {
        let buffer_slots = ((total_items as f64) * buffer_ratio) as usize;
        group.bench_with_input(
            BenchmarkId::new("lru", format!("{:.0}%", buffer_ratio * 100.0)),
            &buffer_slots,
            |b, &slots| b.iter(|| black_box(replay("lru", slots, None, &pattern))),
        );
    }

    group.finish();
}

fn benchmark_byte_budget(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_budget");

    let pattern: Vec<u64> = (0..1000).map(|_| fastrand::u64(0..200)).collect();
    for budget in [4 * 1024, 16 * 1024, 64 * 1024] {
        for strategy in STRATEGIES {
            group.bench_with_input(BenchmarkId::new(strategy, budget), &budget, |b, &bytes| {
                b.iter(|| black_box(replay(strategy, 256, Some(bytes), &pattern)))
            });
        }
    }

    group.finish();
}

fn benchmark_buffered_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_file");
    let data: Vec<u8> = (0..64 * 1024).map(|i| i as u8).collect();

    for block_size in [512, 4096] {
        group.bench_with_input(
            BenchmarkId::new("sequential_read", block_size),
            &block_size,
            |b, &bs| {
                b.iter(|| {
                    let buffer = Buffer::new(8, LruEvictor::new()).into_shared();
                    let store = MemStore::from_vec(data.clone());
                    let mut file = BufferedRandomAccessFile::new(store, buffer, bs).unwrap();
                    let mut out = Vec::with_capacity(data.len());
                    file.read_to_end(&mut out).unwrap();
                    black_box(out.len())
                })
            },
        );

        let offsets: Vec<u64> = (0..500)
            .map(|_| fastrand::u64(0..data.len() as u64 - 8))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("random_write", block_size),
            &block_size,
            |b, &bs| {
                b.iter(|| {
                    let buffer = Buffer::new(8, LruEvictor::new()).into_shared();
                    let store = MemStore::from_vec(data.clone());
                    let mut file = BufferedRandomAccessFile::new(store, buffer, bs).unwrap();
                    for &off in &offsets {
                        file.seek(SeekFrom::Start(off)).unwrap();
                        file.write_all(&off.to_le_bytes()).unwrap();
                    }
                    black_box(file.close().unwrap().as_slice().len())
                })
            },
        );
    }

    group.finish();
}

fn benchmark_block_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("block");
    let payload: Vec<u8> = (0..4096).map(|i| (i % 17) as u8).collect();

    group.bench_function("int_fields", |b| {
        let mut block = Block::new(4096);
        b.iter(|| {
            for i in 0..1024 {
                block.write_int(i * 4, i as i32).unwrap();
            }
            let mut sum = 0i64;
            for i in 0..1024 {
                sum += block.read_int(i * 4).unwrap() as i64;
            }
            black_box(sum)
        })
    });

    group.bench_function("compress_roundtrip", |b| {
        let block = Block::from_vec(payload.clone());
        b.iter(|| {
            let packed = block.compress().unwrap();
            black_box(packed.decompress().unwrap())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_eviction_strategies,
    benchmark_slot_allocation_analysis,
    benchmark_byte_budget,
    benchmark_buffered_file,
    benchmark_block_codecs
);
criterion_main!(benches);

#[cfg(test)]
mod tests {
    use super::replay;

    #[test]
    fn test_replay_hits_repeated_item() {
        let pattern = vec![1; 10];
        assert_eq!(replay("lru", 2, None, &pattern), 9);
        assert_eq!(replay("random", 2, None, &pattern), 9);
    }

    #[test]
    fn test_replay_under_byte_budget() {
        let pattern: Vec<u64> = (0..100).collect();
        // never hits on a pure scan
        assert_eq!(replay("lru", 16, Some(2048), &pattern), 0);
    }
}
