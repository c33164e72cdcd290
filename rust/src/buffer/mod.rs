use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::BufferConfig;
use crate::error::{Error, Result};
use crate::evictor::Evictor;
use crate::slot::{ByteSize, FlushFn, Slot};

/// A buffer shared between several clients, e.g. many files caching blocks
/// in one pool. All buffer operations run under the one lock.
pub type SharedBuffer<O, I, E> = Arc<Mutex<Buffer<O, I, E>>>;

/// Counters describing how the buffer has been used.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
}

impl BufferStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Slot-based cache of objects addressed by `(owner, id)`.
///
/// The buffer holds at most `capacity` objects. Occupied slots are packed at
/// `[0, size)`. A fixed slot is pinned: it is never chosen as a victim and
/// never removed. When a new object has to be admitted and every slot is
/// taken, the [`Evictor`] picks an unfixed victim, which is flushed (if
/// dirty) and then removed.
///
/// With a byte capacity configured, the buffer also tracks the declared size
/// of every cached object and keeps evicting until the aggregate fits, which
/// may displace several slots for one insertion.
///
/// Objects are produced on a miss by an `obtain` callback and persisted by
/// the `flush` callback registered with the last `update`. Errors from either
/// callback are returned unchanged.
pub struct Buffer<O, I, E> {
    // fixed length, never resized
    slots: Vec<Slot<O, I, E>>,
    // owner -> id -> slot index
    index: HashMap<O, HashMap<I, usize>>,
    size: usize,
    fixed_slots: usize,
    size_bytes: usize,
    capacity_bytes: Option<usize>,
    sizer: Option<fn(&E) -> usize>,
    evictor: Box<dyn Evictor<O, I, E>>,
    stats: BufferStats,
}

impl<O, I, E> Buffer<O, I, E>
where
    O: Eq + Hash + Clone,
    I: Eq + Hash + Clone,
{
    /// Buffer bounded by slot count only.
    pub fn new(capacity: usize, evictor: impl Evictor<O, I, E> + 'static) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            slots.push(Slot::empty(i));
        }
        Buffer {
            slots,
            index: HashMap::new(),
            size: 0,
            fixed_slots: 0,
            size_bytes: 0,
            capacity_bytes: None,
            sizer: None,
            evictor: Box::new(evictor),
            stats: BufferStats::default(),
        }
    }

    /// Buffer bounded by slot count and by the aggregate declared size of the
    /// cached objects.
    pub fn with_byte_capacity(
        capacity: usize,
        capacity_bytes: usize,
        evictor: impl Evictor<O, I, E> + 'static,
    ) -> Self
    where
        E: ByteSize,
    {
        let mut buffer = Self::new(capacity, evictor);
        buffer.capacity_bytes = Some(capacity_bytes);
        buffer.sizer = Some(E::byte_size);
        buffer
    }

    pub fn from_config(
        config: &BufferConfig,
        evictor: impl Evictor<O, I, E> + 'static,
    ) -> Result<Self>
    where
        E: ByteSize,
    {
        config.validate()?;
        Ok(match config.capacity_bytes {
            Some(bytes) => Self::with_byte_capacity(config.capacity, bytes, evictor),
            None => Self::new(config.capacity, evictor),
        })
    }

    pub fn into_shared(self) -> SharedBuffer<O, I, E> {
        Arc::new(Mutex::new(self))
    }

    fn lookup(&self, owner: &O, id: &I) -> Option<usize> {
        self.index.get(owner).and_then(|ids| ids.get(id)).copied()
    }

    fn pin(&mut self, idx: usize) {
        if self.slots[idx].fix() {
            self.fixed_slots += 1;
        }
    }

    fn unpin(&mut self, idx: usize) {
        if self.slots[idx].unfix() {
            self.fixed_slots -= 1;
        }
    }

    fn insert(&mut self, owner: O, id: I, object: E) -> usize {
        let idx = self.size;
        let bytes = self.sizer.map_or(0, |sizer| sizer(&object));
        self.index
            .entry(owner.clone())
            .or_default()
            .insert(id.clone(), idx);
        self.slots[idx].fill(owner, id, object, bytes);
        self.size += 1;
        self.size_bytes += bytes;
        self.evictor.inserted(idx);
        idx
    }

    // Empties the slot at `idx` without flushing and moves the last occupied
    // slot into the hole.
    fn remove_slot(&mut self, idx: usize) {
        let Some((owner, id, fixed, bytes)) = self.slots[idx].clear() else {
            return;
        };
        if let Some(ids) = self.index.get_mut(&owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.index.remove(&owner);
            }
        }
        if fixed {
            self.fixed_slots -= 1;
        }
        self.size_bytes -= bytes;
        self.evictor.removed(idx);

        let last = self.size - 1;
        if idx != last {
            self.slots.swap(idx, last);
            self.slots[idx].set_index(idx);
            self.slots[last].set_index(last);
            let moved = &self.slots[idx];
            if let (Some(o), Some(i)) = (moved.owner(), moved.id()) {
                if let Some(pos) = self.index.get_mut(o).and_then(|ids| ids.get_mut(i)) {
                    *pos = idx;
                }
            }
            self.evictor.relocated(last, idx);
        }
        self.size -= 1;
    }

    // Flush then remove: the eviction step.
    fn displace(&mut self, idx: usize) -> Result<()> {
        if self.slots[idx].flush()? {
            self.stats.flushes += 1;
        }
        self.remove_slot(idx);
        self.stats.evictions += 1;
        Ok(())
    }

    fn evict_one(&mut self) -> Result<()> {
        let victim = self.evictor.victim(&self.slots[..self.size]);
        match victim {
            Some(idx) if idx < self.size && !self.slots[idx].is_fixed() => {
                debug!(
                    slot = idx,
                    dirty = self.slots[idx].is_dirty(),
                    "displacing victim"
                );
                self.displace(idx)
            }
            _ => {
                warn!(
                    size = self.size,
                    fixed = self.fixed_slots,
                    "no evictable slot"
                );
                Err(Error::SlotOverflow {
                    capacity: self.capacity(),
                })
            }
        }
    }

    fn handle_size_overflow(&mut self) -> Result<()> {
        let Some(capacity) = self.capacity_bytes else {
            return Ok(());
        };
        while self.size_bytes > capacity {
            if self.fixed_slots == self.size {
                warn!(used = self.size_bytes, capacity, "byte budget exceeded by fixed slots");
                return Err(Error::ByteOverflow {
                    used: self.size_bytes,
                    capacity,
                });
            }
            debug!(used = self.size_bytes, capacity, "evicting for byte budget");
            self.evict_one()?;
        }
        Ok(())
    }

    // Fixes the slot for (owner, id), inserting it through `obtain` on a miss.
    // The byte budget is not enforced here. Returns the slot and whether it
    // was inserted.
    fn fix_slot<F>(&mut self, owner: &O, id: &I, obtain: F) -> Result<(usize, bool)>
    where
        F: FnOnce(&I) -> Result<E>,
    {
        if let Some(idx) = self.lookup(owner, id) {
            trace!(slot = idx, "hit");
            self.stats.hits += 1;
            self.pin(idx);
            self.evictor.accessed(idx);
            return Ok((idx, false));
        }

        trace!("miss");
        self.stats.misses += 1;
        if self.fixed_slots == self.capacity() {
            warn!(capacity = self.capacity(), "all slots fixed");
            return Err(Error::SlotOverflow {
                capacity: self.capacity(),
            });
        }
        if self.size == self.capacity() {
            self.evict_one()?;
        }

        let object = obtain(id)?;
        let idx = self.insert(owner.clone(), id.clone(), object);
        self.pin(idx);
        Ok((idx, true))
    }

    // fix_slot plus byte-budget admission of a freshly obtained object.
    fn fix_admitted<F>(&mut self, owner: &O, id: &I, obtain: F) -> Result<usize>
    where
        F: FnOnce(&I) -> Result<E>,
    {
        let (idx, inserted) = self.fix_slot(owner, id, obtain)?;
        if !inserted {
            return Ok(idx);
        }
        if let Err(err) = self.handle_size_overflow() {
            // the object alone does not fit; it is clean, so drop it again
            if let Some(idx) = self.lookup(owner, id) {
                self.remove_slot(idx);
            }
            return Err(err);
        }
        // eviction may have moved the new slot
        self.lookup(owner, id)
            .ok_or_else(|| Error::Inconsistent("fixed slot vanished during eviction".into()))
    }

    /// Fixes `(owner, id)` and returns its object, obtaining it on a miss.
    pub fn fix<F>(&mut self, owner: &O, id: &I, obtain: F) -> Result<&mut E>
    where
        F: FnOnce(&I) -> Result<E>,
    {
        let idx = self.fix_admitted(owner, id, obtain)?;
        self.slots[idx]
            .object_mut()
            .ok_or_else(|| Error::Inconsistent("fixed slot is empty".into()))
    }

    /// Read-through access: fix, then optionally unfix before returning.
    pub fn get<F>(&mut self, owner: &O, id: &I, obtain: F, unfix_after: bool) -> Result<&E>
    where
        F: FnOnce(&I) -> Result<E>,
    {
        let idx = self.fix_admitted(owner, id, obtain)?;
        if unfix_after {
            self.unpin(idx);
        }
        self.slots[idx]
            .object()
            .ok_or_else(|| Error::Inconsistent("fixed slot is empty".into()))
    }

    /// Stores `object` under `(owner, id)` and marks it dirty with `flush` as
    /// the deferred write-back.
    pub fn update<F>(
        &mut self,
        owner: &O,
        id: &I,
        object: E,
        flush: F,
        unfix_after: bool,
    ) -> Result<()>
    where
        F: FnMut(&I, &E) -> Result<()> + Send + 'static,
    {
        let mut pending = Some(object);
        let (idx, _) = self.fix_slot(owner, id, |_| {
            pending
                .take()
                .ok_or_else(|| Error::Inconsistent("object obtained twice".into()))
        })?;
        // on a hit the object is still pending and replaces the payload
        self.finish_update(owner, id, idx, pending, Box::new(flush), unfix_after)
    }

    /// Fixes `(owner, id)`, mutates its object in place and marks it dirty.
    pub fn update_with<F, G, M, R>(
        &mut self,
        owner: &O,
        id: &I,
        obtain: F,
        flush: G,
        unfix_after: bool,
        mutate: M,
    ) -> Result<R>
    where
        F: FnOnce(&I) -> Result<E>,
        G: FnMut(&I, &E) -> Result<()> + Send + 'static,
        M: FnOnce(&mut E) -> R,
    {
        let (idx, _) = self.fix_slot(owner, id, obtain)?;
        let object = self.slots[idx]
            .object_mut()
            .ok_or_else(|| Error::Inconsistent("fixed slot is empty".into()))?;
        let result = mutate(object);
        self.finish_update(owner, id, idx, None, Box::new(flush), unfix_after)?;
        Ok(result)
    }

    fn finish_update(
        &mut self,
        owner: &O,
        id: &I,
        idx: usize,
        object: Option<E>,
        flush: FlushFn<I, E>,
        unfix_after: bool,
    ) -> Result<()> {
        let before = self.slots[idx].size_bytes();
        let after = self.slots[idx].update(object, flush, self.sizer);
        self.size_bytes = self.size_bytes - before + after;
        self.evictor.accessed(idx);

        let overflow = self.handle_size_overflow();
        if unfix_after {
            self.unfix(owner, id);
        }
        overflow
    }

    /// Releases the pin on `(owner, id)`. No-op if absent or not fixed.
    pub fn unfix(&mut self, owner: &O, id: &I) {
        if let Some(idx) = self.lookup(owner, id) {
            self.unpin(idx);
        }
    }

    /// Runs the pending write-back of `(owner, id)` now. Does not evict.
    pub fn flush(&mut self, owner: &O, id: &I) -> Result<()> {
        if let Some(idx) = self.lookup(owner, id) {
            if self.slots[idx].flush()? {
                self.stats.flushes += 1;
            }
        }
        Ok(())
    }

    /// Flushes every dirty slot belonging to `owner`.
    pub fn flush_all(&mut self, owner: &O) -> Result<()> {
        let idxs: Vec<usize> = match self.index.get(owner) {
            Some(ids) => ids.values().copied().collect(),
            None => return Ok(()),
        };
        for idx in idxs {
            if self.slots[idx].flush()? {
                self.stats.flushes += 1;
            }
        }
        Ok(())
    }

    /// Drops `(owner, id)` without flushing it. Fixed slots are refused.
    pub fn remove(&mut self, owner: &O, id: &I) -> Result<()> {
        let Some(idx) = self.lookup(owner, id) else {
            return Ok(());
        };
        if self.slots[idx].is_fixed() {
            return Err(Error::SlotFixed);
        }
        self.remove_slot(idx);
        Ok(())
    }

    /// Drops every slot of `owner` without flushing. Fails before removing
    /// anything if one of them is fixed.
    pub fn remove_all(&mut self, owner: &O) -> Result<()> {
        let ids = self.ids(owner);
        if ids.iter().any(|id| self.is_fixed(owner, id)) {
            return Err(Error::SlotFixed);
        }
        for id in ids {
            self.remove(owner, &id)?;
        }
        Ok(())
    }

    pub fn contains(&self, owner: &O, id: &I) -> bool {
        self.lookup(owner, id).is_some()
    }

    pub fn is_fixed(&self, owner: &O, id: &I) -> bool {
        self.lookup(owner, id)
            .is_some_and(|idx| self.slots[idx].is_fixed())
    }

    pub fn is_dirty(&self, owner: &O, id: &I) -> bool {
        self.lookup(owner, id)
            .is_some_and(|idx| self.slots[idx].is_dirty())
    }

    /// Resident object, without pinning it or touching the statistics.
    pub fn peek(&self, owner: &O, id: &I) -> Option<&E> {
        self.lookup(owner, id)
            .and_then(|idx| self.slots[idx].object())
    }

    /// Mutable access to a resident object without marking it dirty. The
    /// caller must not change its declared size.
    pub fn peek_mut(&mut self, owner: &O, id: &I) -> Option<&mut E> {
        let idx = self.lookup(owner, id)?;
        self.slots[idx].object_mut()
    }

    /// Ids currently cached for `owner`, in no particular order.
    pub fn ids(&self, owner: &O) -> Vec<I> {
        self.index
            .get(owner)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of occupied slots.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn bytes_used(&self) -> usize {
        self.size_bytes
    }

    /// `None` when the buffer is bounded by slot count only.
    pub fn capacity_bytes(&self) -> Option<usize> {
        self.capacity_bytes
    }

    pub fn fixed_slots(&self) -> usize {
        self.fixed_slots
    }

    /// The occupied slots.
    pub fn slots(&self) -> &[Slot<O, I, E>] {
        &self.slots[..self.size]
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BufferStats::default();
    }

    /// Recomputes every counter from the slots and compares. O(capacity);
    /// meant for tests and debugging.
    pub fn check_buffer(&self) -> Result<()> {
        let mut bytes = 0;
        let mut fixed = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.index() != i {
                return Err(Error::Inconsistent(format!(
                    "slot at position {i} claims index {}",
                    slot.index()
                )));
            }
            if slot.is_occupied() != (i < self.size) {
                return Err(Error::Inconsistent(format!(
                    "slot {i} occupancy disagrees with size {}",
                    self.size
                )));
            }
            let (Some(owner), Some(id)) = (slot.owner(), slot.id()) else {
                continue;
            };
            if self.lookup(owner, id) != Some(i) {
                return Err(Error::Inconsistent(format!("slot {i} is not indexed")));
            }
            if let (Some(sizer), Some(object)) = (self.sizer, slot.object()) {
                if sizer(object) != slot.size_bytes() {
                    return Err(Error::Inconsistent(format!(
                        "slot {i} size changed behind the buffer's back"
                    )));
                }
            }
            bytes += slot.size_bytes();
            if slot.is_fixed() {
                fixed += 1;
            }
        }
        let indexed: usize = self.index.values().map(HashMap::len).sum();
        if bytes != self.size_bytes {
            return Err(Error::Inconsistent(format!(
                "byte count {} but slots hold {bytes}",
                self.size_bytes
            )));
        }
        if fixed != self.fixed_slots {
            return Err(Error::Inconsistent(format!(
                "fixed count {} but {fixed} slots are fixed",
                self.fixed_slots
            )));
        }
        if indexed != self.size {
            return Err(Error::Inconsistent(format!(
                "{indexed} indexed keys for {} occupied slots",
                self.size
            )));
        }
        if !(self.fixed_slots <= self.size && self.size <= self.capacity()) {
            return Err(Error::Inconsistent("slot counters out of order".into()));
        }
        Ok(())
    }
}
