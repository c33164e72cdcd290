use crate::block::Block;
use crate::error::Result;

/// Deferred write-back registered by `update`. Invoked with the slot's id and
/// payload when the slot is flushed or displaced.
pub type FlushFn<I, E> = Box<dyn FnMut(&I, &E) -> Result<()> + Send>;

/// Declared in-memory footprint of a cached payload, used for byte-capacity
/// accounting.
pub trait ByteSize {
    fn byte_size(&self) -> usize;
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Box<[u8]> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Block {
    fn byte_size(&self) -> usize {
        self.size()
    }
}

// the Entry holds everything an occupied slot knows about its payload.
struct Entry<O, I, E> {
    owner: O,
    id: I,
    object: E,
    fixed: bool,
    flush: Option<FlushFn<I, E>>,
    size_bytes: usize,
}

/// One cache line of a [`crate::buffer::Buffer`].
///
/// Slots are allocated once, when the buffer is built, and are only ever
/// filled and emptied. Mutation goes through the owning buffer, which keeps
/// its fixed-slot and byte counters in step with each transition reported
/// here.
pub struct Slot<O, I, E> {
    index: usize,
    entry: Option<Entry<O, I, E>>,
}

impl<O, I, E> Slot<O, I, E> {
    pub(crate) fn empty(index: usize) -> Self {
        Slot { index, entry: None }
    }

    /// Position of this slot in the buffer's slot array.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_occupied(&self) -> bool {
        self.entry.is_some()
    }

    pub fn owner(&self) -> Option<&O> {
        self.entry.as_ref().map(|e| &e.owner)
    }

    pub fn id(&self) -> Option<&I> {
        self.entry.as_ref().map(|e| &e.id)
    }

    pub fn object(&self) -> Option<&E> {
        self.entry.as_ref().map(|e| &e.object)
    }

    pub fn is_fixed(&self) -> bool {
        self.entry.as_ref().is_some_and(|e| e.fixed)
    }

    /// A dirty slot carries a pending flush callback.
    pub fn is_dirty(&self) -> bool {
        self.entry.as_ref().is_some_and(|e| e.flush.is_some())
    }

    pub fn size_bytes(&self) -> usize {
        self.entry.as_ref().map_or(0, |e| e.size_bytes)
    }

    pub(crate) fn object_mut(&mut self) -> Option<&mut E> {
        self.entry.as_mut().map(|e| &mut e.object)
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn fill(&mut self, owner: O, id: I, object: E, size_bytes: usize) {
        self.entry = Some(Entry {
            owner,
            id,
            object,
            fixed: false,
            flush: None,
            size_bytes,
        });
    }

    // Returns true on the unfixed -> fixed transition only.
    pub(crate) fn fix(&mut self) -> bool {
        match self.entry.as_mut() {
            Some(e) if !e.fixed => {
                e.fixed = true;
                true
            }
            _ => false,
        }
    }

    // Returns true on the fixed -> unfixed transition only.
    pub(crate) fn unfix(&mut self) -> bool {
        match self.entry.as_mut() {
            Some(e) if e.fixed => {
                e.fixed = false;
                true
            }
            _ => false,
        }
    }

    /// Replaces the payload (when one is given), arms the flush callback and
    /// returns the new footprint. `sizer` is only set under byte accounting.
    pub(crate) fn update(
        &mut self,
        object: Option<E>,
        flush: FlushFn<I, E>,
        sizer: Option<fn(&E) -> usize>,
    ) -> usize {
        let Some(e) = self.entry.as_mut() else {
            return 0;
        };
        if let Some(object) = object {
            e.object = object;
        }
        e.flush = Some(flush);
        if let Some(sizer) = sizer {
            e.size_bytes = sizer(&e.object);
        }
        e.size_bytes
    }

    /// Runs the pending flush callback, if any, then clears it. Returns
    /// whether a write-back happened. A failing callback stays armed.
    pub(crate) fn flush(&mut self) -> Result<bool> {
        let Some(e) = self.entry.as_mut() else {
            return Ok(false);
        };
        let Some(mut flush) = e.flush.take() else {
            return Ok(false);
        };
        match flush(&e.id, &e.object) {
            Ok(()) => Ok(true),
            Err(err) => {
                e.flush = Some(flush);
                Err(err)
            }
        }
    }

    // Empties the slot, handing back its identity and footprint.
    pub(crate) fn clear(&mut self) -> Option<(O, I, bool, usize)> {
        self.entry
            .take()
            .map(|e| (e.owner, e.id, e.fixed, e.size_bytes))
    }
}

impl<O, I, E> std::fmt::Debug for Slot<O, I, E>
where
    O: std::fmt::Debug,
    I: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Slot");
        s.field("index", &self.index);
        if let Some(e) = &self.entry {
            s.field("owner", &e.owner)
                .field("id", &e.id)
                .field("fixed", &e.fixed)
                .field("dirty", &e.flush.is_some())
                .field("size_bytes", &e.size_bytes);
        }
        s.finish()
    }
}
