use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

// A BackingStore is the flat, byte-addressed storage underneath a buffered file.
// It can be nominally considered to be a random access file: a cursor that
// can be moved anywhere, plus a length that can be changed.
pub trait BackingStore {
    fn seek(&mut self, pos: u64) -> io::Result<()>;
    // reads at the cursor; 0 means end of store.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn length(&mut self) -> io::Result<u64>;
    fn set_length(&mut self, len: u64) -> io::Result<()>;
    // push written bytes down to durable storage, where that means anything.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BackingStore for File {
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        Seek::seek(self, SeekFrom::Start(pos)).map(|_| ())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn length(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

// Implement MemStore, a memory-only BackingStore implementation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemStore {
    data: Vec<u8>,
    pos: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        MemStore { data, pos: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn cursor(&self) -> io::Result<usize> {
        usize::try_from(self.pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "position exceeds memory"))
    }
}

impl BackingStore for MemStore {
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.cursor()?.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let start = self.cursor()?;
        let end = start + buf.len();
        // writing past the end zero-fills the gap, like a file
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(())
    }

    fn length(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds memory"))?;
        self.data.resize(len, 0);
        Ok(())
    }
}
