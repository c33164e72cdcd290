//! Fixed-size, offset-addressable views over owned byte arrays.
//!
//! A [`Block`] is the page payload used by higher layers: it carries block
//! headers as little-endian 4- and 8-byte fields, can be streamed through
//! bounded cursors, and can be DEFLATE-compressed into a new block. Once
//! released, every access fails.

use std::hash::{Hash, Hasher};
use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::BlockError;

type Result<T> = std::result::Result<T, BlockError>;

#[derive(Debug, Clone)]
pub struct Block {
    array: Vec<u8>,
    offset: usize,
    size: usize,
    released: bool,
}

impl Block {
    /// Zero-filled block of `size` bytes.
    pub fn new(size: usize) -> Self {
        Block::from_vec(vec![0; size])
    }

    /// Block covering the whole array.
    pub fn from_vec(array: Vec<u8>) -> Self {
        let size = array.len();
        Block {
            array,
            offset: 0,
            size,
            released: false,
        }
    }

    /// Block covering `array[offset..offset + size]`.
    pub fn wrap(array: Vec<u8>, offset: usize, size: usize) -> Result<Self> {
        if offset.checked_add(size).is_none_or(|end| end > array.len()) {
            return Err(BlockError::InvalidRegion {
                offset,
                size,
                len: array.len(),
            });
        }
        Ok(Block {
            array,
            offset,
            size,
            released: false,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn as_slice(&self) -> Result<&[u8]> {
        if self.released {
            return Err(BlockError::Released);
        }
        Ok(&self.array[self.offset..self.offset + self.size])
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        if self.released {
            return Err(BlockError::Released);
        }
        Ok(&mut self.array[self.offset..self.offset + self.size])
    }

    pub fn get(&self, index: usize) -> Result<u8> {
        let len = self.size;
        self.as_slice()?
            .get(index)
            .copied()
            .ok_or(BlockError::OutOfBounds { index, len })
    }

    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        let len = self.size;
        let byte = self
            .as_mut_slice()?
            .get_mut(index)
            .ok_or(BlockError::OutOfBounds { index, len })?;
        *byte = value;
        Ok(())
    }

    fn field<const N: usize>(&self, pos: usize) -> Result<[u8; N]> {
        let len = self.size;
        let region = self.as_slice()?;
        pos.checked_add(N)
            .and_then(|end| region.get(pos..end))
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(BlockError::OutOfBounds { index: pos, len })
    }

    fn put_field<const N: usize>(&mut self, pos: usize, bytes: [u8; N]) -> Result<()> {
        let len = self.size;
        let region = self.as_mut_slice()?;
        let target = pos
            .checked_add(N)
            .and_then(|end| region.get_mut(pos..end))
            .ok_or(BlockError::OutOfBounds { index: pos, len })?;
        target.copy_from_slice(&bytes);
        Ok(())
    }

    /// 4-byte little-endian signed integer at `pos`.
    pub fn read_int(&self, pos: usize) -> Result<i32> {
        self.field(pos).map(i32::from_le_bytes)
    }

    pub fn write_int(&mut self, pos: usize, value: i32) -> Result<()> {
        self.put_field(pos, value.to_le_bytes())
    }

    /// 8-byte little-endian signed integer at `pos`.
    pub fn read_long(&self, pos: usize) -> Result<i64> {
        self.field(pos).map(i64::from_le_bytes)
    }

    pub fn write_long(&mut self, pos: usize, value: i64) -> Result<()> {
        self.put_field(pos, value.to_le_bytes())
    }

    fn check_range(&self, base: usize, end: usize) -> Result<()> {
        if self.released {
            return Err(BlockError::Released);
        }
        if base > end || end > self.size {
            return Err(BlockError::InvalidRegion {
                offset: base,
                size: end.saturating_sub(base),
                len: self.size,
            });
        }
        Ok(())
    }

    /// Cursor reading `[base, end)`; reads past `end` report end of data.
    pub fn reader(&self, base: usize, end: usize) -> Result<BlockReader<'_>> {
        self.check_range(base, end)?;
        Ok(BlockReader {
            data: &self.as_slice()?[base..end],
            pos: 0,
        })
    }

    /// Cursor writing `[base, end)`; writes past `end` fail.
    pub fn writer(&mut self, base: usize, end: usize) -> Result<BlockWriter<'_>> {
        self.check_range(base, end)?;
        Ok(BlockWriter {
            data: &mut self.as_mut_slice()?[base..end],
            pos: 0,
        })
    }

    /// New block holding the zlib-framed DEFLATE form of this block.
    pub fn compress(&self) -> Result<Block> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(self.as_slice()?)
            .map_err(BlockError::Codec)?;
        let bytes = encoder.finish().map_err(BlockError::Codec)?;
        Ok(Block::from_vec(bytes))
    }

    /// Inverse of [`Block::compress`].
    pub fn decompress(&self) -> Result<Block> {
        let mut bytes = Vec::new();
        ZlibDecoder::new(self.as_slice()?)
            .read_to_end(&mut bytes)
            .map_err(BlockError::Codec)?;
        Ok(Block::from_vec(bytes))
    }

    /// Ends the block's life and hands back its backing array.
    pub fn release(&mut self) -> Result<Vec<u8>> {
        if self.released {
            return Err(BlockError::AlreadyReleased);
        }
        self.released = true;
        Ok(std::mem::take(&mut self.array))
    }

    /// Cheap content hash: the first and last 4-byte words XORed, or all
    /// bytes folded together for blocks shorter than 5 bytes. Not
    /// collision resistant.
    pub fn hash_code(&self) -> i32 {
        let Ok(region) = self.as_slice() else {
            return 0;
        };
        let word = |pos: usize| {
            i32::from_le_bytes([
                region[pos],
                region[pos + 1],
                region[pos + 2],
                region[pos + 3],
            ])
        };
        if region.len() >= 5 {
            word(0) ^ word(region.len() - 4)
        } else {
            region
                .iter()
                .enumerate()
                .fold(0, |h, (i, &b)| h | (i32::from(b) << (8 * i)))
        }
    }
}

// Content equality, independent of backing array and offset.
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_slice(), other.as_slice()) {
            (Ok(a), Ok(b)) => a == b,
            (Err(_), Err(_)) => true,
            _ => false,
        }
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

/// Bounded input cursor over a block region.
#[derive(Debug)]
pub struct BlockReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl BlockReader<'_> {
    /// Next byte, or `None` at the end of the region.
    pub fn read_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Read for BlockReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Bounded output cursor over a block region. A write that does not fit
/// entirely is rejected without writing anything.
#[derive(Debug)]
pub struct BlockWriter<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl BlockWriter<'_> {
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(self.pos)
            .ok_or(BlockError::OutOfBounds {
                index: self.pos,
                len,
            })?;
        *slot = value;
        self.pos += 1;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Write for BlockWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(BlockError::OutOfBounds {
                index: end - 1,
                len: self.data.len(),
            }
            .into());
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
