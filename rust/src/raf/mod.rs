//! Page cache over a random-access byte store.
//!
//! [`BufferedRandomAccessFile`] splits its store into fixed-size blocks and
//! caches them in a [`Buffer`] that may be shared with other files. Each
//! file is a distinct owner in that buffer, so blocks of different files
//! never collide. At most one block per file is fixed at any time: the one
//! under the file pointer.
//!
//! Reads fix the covering block, loading it from the store on a miss.
//! Writes mutate the cached block in place and arm a write-back that stores
//! the block's bytes up to the logical end of file once the block is
//! flushed, evicted or the file is closed.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::{Buffer, SharedBuffer};
use crate::error::{Error, Result};
use crate::store::BackingStore;

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Owner key of a buffered file inside a shared buffer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl FileId {
    pub fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Buffer caching raw blocks, keyed by file and block number.
pub type BlockBuffer = Buffer<FileId, u64, Vec<u8>>;

/// Block transfers between a buffered file and its store.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IoCounter {
    pub reads: u64,
    pub writes: u64,
}

// State shared with the load and write-back callbacks parked in the buffer.
struct Backing<S> {
    store: S,
    length: u64,
    block_size: usize,
    counter: IoCounter,
}

impl<S: BackingStore> Backing<S> {
    fn block_start(&self, block: u64) -> u64 {
        block.saturating_mul(self.block_size as u64)
    }

    // Bytes of `block` that lie before the logical end of file.
    fn extent(&self, block: u64) -> usize {
        let start = self.block_start(block);
        if start >= self.length {
            0
        } else {
            // bounded by block_size, so it fits usize
            (self.length - start).min(self.block_size as u64) as usize
        }
    }

    fn read_block(&mut self, block: u64) -> io::Result<Vec<u8>> {
        let mut bytes = vec![0; self.block_size];
        let n = self.extent(block);
        if n == 0 {
            return Ok(bytes);
        }
        self.store.seek(self.block_start(block))?;
        let mut filled = 0;
        while filled < n {
            let read = self.store.read(&mut bytes[filled..n])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        self.counter.reads += 1;
        Ok(bytes)
    }

    fn write_block(&mut self, block: u64, bytes: &[u8]) -> io::Result<()> {
        let n = self.extent(block).min(bytes.len());
        if n == 0 {
            return Ok(());
        }
        self.store.seek(self.block_start(block))?;
        self.store.write_all(&bytes[..n])?;
        self.counter.writes += 1;
        Ok(())
    }
}

fn loader<S>(backing: Arc<Mutex<Backing<S>>>) -> impl FnOnce(&u64) -> Result<Vec<u8>>
where
    S: BackingStore,
{
    move |block| Ok(backing.lock().read_block(*block)?)
}

fn write_back<S>(
    backing: Arc<Mutex<Backing<S>>>,
) -> impl FnMut(&u64, &Vec<u8>) -> Result<()> + Send + 'static
where
    S: BackingStore + Send + 'static,
{
    move |block, bytes| Ok(backing.lock().write_block(*block, bytes)?)
}

/// Random-access file whose blocks are cached in a (possibly shared) buffer.
///
/// Implements [`Read`], [`Write`] and [`Seek`]. Reading at or past the end
/// returns 0 bytes; writing past the end extends the file, zero-filling any
/// gap. Dropping the file closes it; use [`close`](Self::close) to observe
/// errors and to get the store back.
pub struct BufferedRandomAccessFile<S: BackingStore + Send + 'static> {
    buffer: SharedBuffer<FileId, u64, Vec<u8>>,
    backing: Arc<Mutex<Backing<S>>>,
    owner: FileId,
    block_size: usize,
    pointer: u64,
    // the block currently fixed by this file
    pinned: Option<u64>,
    closed: bool,
}

impl BufferedRandomAccessFile<File> {
    /// Opens (creating if needed) the file at `path` for reading and writing.
    pub fn open(
        path: impl AsRef<Path>,
        buffer: SharedBuffer<FileId, u64, Vec<u8>>,
        block_size: usize,
    ) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::new(file, buffer, block_size)
    }
}

impl<S> BufferedRandomAccessFile<S>
where
    S: BackingStore + Send + 'static,
{
    pub fn new(
        mut store: S,
        buffer: SharedBuffer<FileId, u64, Vec<u8>>,
        block_size: usize,
    ) -> io::Result<Self> {
        if block_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "block size must be positive",
            ));
        }
        let length = store.length()?;
        Ok(BufferedRandomAccessFile {
            buffer,
            backing: Arc::new(Mutex::new(Backing {
                store,
                length,
                block_size,
                counter: IoCounter::default(),
            })),
            owner: FileId::next(),
            block_size,
            pointer: 0,
            pinned: None,
            closed: false,
        })
    }

    pub fn owner(&self) -> FileId {
        self.owner
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn buffer(&self) -> &SharedBuffer<FileId, u64, Vec<u8>> {
        &self.buffer
    }

    /// Logical length, including bytes not yet written back.
    pub fn len(&self) -> u64 {
        self.backing.lock().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.pointer
    }

    pub fn io_counter(&self) -> IoCounter {
        self.backing.lock().counter
    }

    fn locate(&self, pos: u64) -> (u64, usize) {
        let bs = self.block_size as u64;
        (pos / bs, (pos % bs) as usize)
    }

    // Makes `block` the single block fixed by this file.
    fn pin(&mut self, buffer: &mut BlockBuffer, block: u64) -> Result<()> {
        if self.pinned == Some(block) && buffer.is_fixed(&self.owner, &block) {
            return Ok(());
        }
        if let Some(old) = self.pinned.take() {
            buffer.unfix(&self.owner, &old);
        }
        buffer.fix(&self.owner, &block, loader(Arc::clone(&self.backing)))?;
        self.pinned = Some(block);
        Ok(())
    }

    /// Next byte, or `None` at end of file.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0; 1];
        Ok(match self.read(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    pub fn write_byte(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    /// Truncates or extends the file. Cached blocks lying entirely past a
    /// new, shorter end are dropped without being written back.
    pub fn set_len(&mut self, new_len: u64) -> io::Result<()> {
        let shared = Arc::clone(&self.buffer);
        let mut buffer = shared.lock();
        let bs = self.block_size as u64;

        if new_len < self.len() {
            if let Some(block) = self.pinned {
                if block.saturating_mul(bs) >= new_len {
                    buffer.unfix(&self.owner, &block);
                    self.pinned = None;
                }
            }
            let mut dropped = 0;
            for block in buffer.ids(&self.owner) {
                if block.saturating_mul(bs) >= new_len {
                    buffer.remove(&self.owner, &block)?;
                    dropped += 1;
                }
            }
            // bytes past the end of the straddling block must read back as zeros
            let tail = (new_len % bs) as usize;
            if tail != 0 {
                if let Some(bytes) = buffer.peek_mut(&self.owner, &(new_len / bs)) {
                    bytes[tail..].fill(0);
                }
            }
            debug!(file = ?self.owner, new_len, dropped, "truncated");
        }

        let mut backing = self.backing.lock();
        backing.length = new_len;
        backing.store.set_length(new_len)?;
        self.pointer = self.pointer.min(new_len);
        Ok(())
    }

    /// Writes back every dirty block of this file, drops them from the
    /// buffer and hands back the store.
    pub fn close(mut self) -> io::Result<S> {
        self.shutdown()?;
        let backing = Arc::clone(&self.backing);
        drop(self);
        match Arc::try_unwrap(backing) {
            Ok(backing) => Ok(backing.into_inner().store),
            Err(_) => Err(io::Error::other("backing store is still referenced")),
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        let shared = Arc::clone(&self.buffer);
        let mut buffer = shared.lock();
        if let Some(block) = self.pinned.take() {
            buffer.unfix(&self.owner, &block);
        }
        buffer.flush_all(&self.owner)?;
        buffer.remove_all(&self.owner)?;
        drop(buffer);
        self.backing.lock().store.sync()?;
        self.closed = true;
        Ok(())
    }
}

impl<S> Read for BufferedRandomAccessFile<S>
where
    S: BackingStore + Send + 'static,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let shared = Arc::clone(&self.buffer);
        let mut buffer = shared.lock();
        let length = self.len();
        let mut done = 0;
        while done < buf.len() && self.pointer < length {
            let (block, off) = self.locate(self.pointer);
            let n = (buf.len() - done)
                .min(self.block_size - off)
                .min(usize::try_from(length - self.pointer).unwrap_or(usize::MAX));
            self.pin(&mut buffer, block)?;
            let bytes = buffer
                .peek(&self.owner, &block)
                .ok_or_else(|| Error::Inconsistent("pinned block is not cached".into()))?;
            buf[done..done + n].copy_from_slice(&bytes[off..off + n]);
            done += n;
            self.pointer += n as u64;
        }
        Ok(done)
    }
}

impl<S> Write for BufferedRandomAccessFile<S>
where
    S: BackingStore + Send + 'static,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let shared = Arc::clone(&self.buffer);
        let mut buffer = shared.lock();
        let mut done = 0;
        while done < buf.len() {
            let (block, off) = self.locate(self.pointer);
            let n = (buf.len() - done).min(self.block_size - off);
            let end = self.pointer.checked_add(n as u64).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "write past the largest position")
            })?;
            self.pin(&mut buffer, block)?;
            {
                // the write-back covers bytes up to the logical length
                let mut backing = self.backing.lock();
                backing.length = backing.length.max(end);
            }
            let src = &buf[done..done + n];
            buffer.update_with(
                &self.owner,
                &block,
                loader(Arc::clone(&self.backing)),
                write_back(Arc::clone(&self.backing)),
                false,
                |bytes| bytes[off..off + n].copy_from_slice(src),
            )?;
            done += n;
            self.pointer = end;
        }
        Ok(done)
    }

    /// Writes back the dirty blocks of this file and syncs the store.
    fn flush(&mut self) -> io::Result<()> {
        self.buffer.lock().flush_all(&self.owner)?;
        self.backing.lock().store.sync()
    }
}

impl<S> Seek for BufferedRandomAccessFile<S>
where
    S: BackingStore + Send + 'static,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pointer.checked_add_signed(delta),
        };
        self.pointer = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;
        Ok(self.pointer)
    }
}

impl<S> Drop for BufferedRandomAccessFile<S>
where
    S: BackingStore + Send + 'static,
{
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(file = ?self.owner, error = %err, "implicit close failed");
        }
    }
}
