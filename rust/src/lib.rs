//! # SlotBuffer - Pinning Buffer Manager with Pluggable Eviction
//!
//! A slot-based cache for fixed-identity objects (pages, blocks) with
//! fix/unfix pinning, deferred write-back of dirty objects, and slot-count or
//! byte-budget capacity limits, plus a page cache over random-access files
//! built on top of it.
//!
//! ## Features
//!
//! - **Pinning**: fixed slots are never evicted nor removed; fixing when every
//!   slot is fixed is reported as an overflow
//! - **Deferred flush**: `update` stores a write-back closure that runs once
//!   per dirty episode, on explicit flush or on eviction
//! - **Pluggable Eviction Strategies**: LRU and random victim selection, or any
//!   type implementing [`evictor::Evictor`]
//! - **Byte Accounting**: optional budget over the declared size of cached
//!   objects, evicting as many slots as needed to admit a large object
//! - **Blocks**: bounded byte views with little-endian field codecs and
//!   DEFLATE compression
//! - **Buffered Files**: block cache over any [`store::BackingStore`], several
//!   files sharing one buffer
//!
//! ## Basic Usage
//!
//! ```rust
//! use slotbuffer::buffer::Buffer;
//! use slotbuffer::evictor::LruEvictor;
//!
//! // 2 slots, bounded by count only
//! let mut buffer: Buffer<&str, u64, String> = Buffer::new(2, LruEvictor::new());
//!
//! // a miss obtains the object; it stays fixed until unfixed
//! let page = buffer.fix(&"table", &1, |id| Ok(format!("page {id}"))).unwrap();
//! assert_eq!(page, "page 1");
//! buffer.unfix(&"table", &1);
//!
//! // read-through access that unfixes right away
//! buffer.get(&"table", &2, |id| Ok(format!("page {id}")), true).unwrap();
//!
//! // dirty the page; the closure runs when it is flushed or evicted
//! buffer
//!     .update(&"table", &1, "new contents".to_string(), |id, page: &String| {
//!         println!("writing page {id}: {page}");
//!         Ok(())
//!     }, true)
//!     .unwrap();
//!
//! // a third page displaces the least recently used unfixed one
//! buffer.get(&"table", &3, |id| Ok(format!("page {id}")), true).unwrap();
//! assert!(!buffer.contains(&"table", &2));
//! ```
//!
//! ## Byte Budget
//!
//! ```rust
//! use slotbuffer::buffer::Buffer;
//! use slotbuffer::evictor::RandomEvictor;
//!
//! let mut buffer: Buffer<u8, u64, Vec<u8>> =
//!     Buffer::with_byte_capacity(16, 1024, RandomEvictor::seeded(42));
//! for id in 0..8 {
//!     buffer.get(&0, &id, |_| Ok(vec![0; 256]), true).unwrap();
//! }
//! assert!(buffer.bytes_used() <= 1024);
//! buffer.check_buffer().unwrap();
//! ```
//!
//! ## Buffered Files
//!
//! ```rust
//! use std::io::{Read, Seek, SeekFrom, Write};
//! use slotbuffer::buffer::Buffer;
//! use slotbuffer::evictor::LruEvictor;
//! use slotbuffer::raf::BufferedRandomAccessFile;
//! use slotbuffer::store::MemStore;
//!
//! let buffer = Buffer::new(8, LruEvictor::new()).into_shared();
//! let mut file = BufferedRandomAccessFile::new(MemStore::new(), buffer, 4).unwrap();
//!
//! file.write_all(b"spans three blocks").unwrap();
//! file.seek(SeekFrom::Start(6)).unwrap();
//! let mut word = [0; 5];
//! file.read_exact(&mut word).unwrap();
//! assert_eq!(&word, b"three");
//!
//! // closing writes the dirty blocks back and returns the store
//! let store = file.close().unwrap();
//! assert_eq!(store.as_slice(), b"spans three blocks");
//! ```
//!
//! ## Eviction Strategies
//!
//! - **`LruEvictor`**: Evicts the least recently fixed or inserted slot
//! - **`RandomEvictor`**: Randomly selects an unfixed slot
//!
//! Custom strategies implement [`evictor::Evictor`], or wrap a plain function
//! with [`evictor::from_fn`]:
//! ```rust
//! use slotbuffer::buffer::Buffer;
//! use slotbuffer::evictor;
//! use slotbuffer::slot::Slot;
//!
//! fn largest_unfixed(slots: &[Slot<u8, u64, Vec<u8>>]) -> Option<usize> {
//!     slots
//!         .iter()
//!         .filter(|s| !s.is_fixed())
//!         .max_by_key(|s| s.object().map_or(0, Vec::len))
//!         .map(|s| s.index())
//! }
//!
//! let buffer: Buffer<u8, u64, Vec<u8>> = Buffer::new(4, evictor::from_fn(largest_unfixed));
//! # assert_eq!(buffer.capacity(), 4);
//! ```
//!
//! ## Performance Analysis
//!
//! ```bash
//! # Run standalone performance analysis
//! cargo run --bin benchmark_runner
//!
//! # Run criterion benchmarks
//! cargo bench
//! ```

pub mod block;
pub mod buffer;
pub mod config;
pub mod error;
pub mod evictor;
pub mod raf;
pub mod slot;
pub mod store;
pub mod unique_stack;

pub use error::{BlockError, Error, Result};
