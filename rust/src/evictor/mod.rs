//! Victim selection for [`crate::buffer::Buffer`].
//!
//! The buffer only knows the pin/evict protocol. Which unfixed slot gets
//! displaced is decided by an [`Evictor`], which sees the occupied slot
//! region and is told about every structural change through its hooks, so
//! it can keep whatever ordering it needs outside the slots themselves.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::slot::Slot;
use crate::unique_stack::UniqueStack;

/// Pluggable eviction policy.
///
/// `victim` receives the occupied slots `[0, size)` and must return the index
/// of an unfixed one, or `None` when nothing is evictable. Returning a fixed
/// slot is treated by the buffer as an overflow.
///
/// Hook indices always refer to slot positions. Removal compacts the slot
/// array by moving the last occupied slot into the hole; that move is
/// reported through `relocated` right after `removed`.
pub trait Evictor<O, I, E>: Send {
    fn victim(&mut self, slots: &[Slot<O, I, E>]) -> Option<usize>;

    fn inserted(&mut self, _slot: usize) {}

    /// A resident slot was fixed, read or updated.
    fn accessed(&mut self, _slot: usize) {}

    fn removed(&mut self, _slot: usize) {}

    fn relocated(&mut self, _from: usize, _to: usize) {}
}

/// Evicts the unfixed slot that was least recently inserted or accessed.
#[derive(Debug, Default)]
pub struct LruEvictor {
    lru: UniqueStack<usize>,
}

impl LruEvictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot indices from least to most recently used.
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.lru.iter().copied()
    }
}

impl<O, I, E> Evictor<O, I, E> for LruEvictor {
    fn victim(&mut self, slots: &[Slot<O, I, E>]) -> Option<usize> {
        self.lru
            .iter()
            .copied()
            .find(|&i| slots.get(i).is_some_and(|s| !s.is_fixed()))
    }

    fn inserted(&mut self, slot: usize) {
        self.lru.push(slot);
    }

    fn accessed(&mut self, slot: usize) {
        self.lru.push(slot);
    }

    fn removed(&mut self, slot: usize) {
        self.lru.delete(&slot);
    }

    fn relocated(&mut self, from: usize, to: usize) {
        self.lru.replace(&from, to);
    }
}

/// Evicts a uniformly chosen unfixed slot.
#[derive(Debug)]
pub struct RandomEvictor {
    rng: StdRng,
}

impl RandomEvictor {
    pub fn new() -> Self {
        RandomEvictor {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests and benchmarks.
    pub fn seeded(seed: u64) -> Self {
        RandomEvictor {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomEvictor {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, I, E> Evictor<O, I, E> for RandomEvictor {
    fn victim(&mut self, slots: &[Slot<O, I, E>]) -> Option<usize> {
        let len = slots.len();
        if len == 0 {
            return None;
        }
        // probe from a random start so every unfixed slot is reachable
        let start = self.rng.gen_range(0..len);
        (0..len)
            .map(|step| (start + step) % len)
            .find(|&i| !slots[i].is_fixed())
    }
}

/// Adapts a stateless selection function into an [`Evictor`].
pub struct FnEvictor<F>(F);

pub fn from_fn<F>(f: F) -> FnEvictor<F> {
    FnEvictor(f)
}

impl<O, I, E, F> Evictor<O, I, E> for FnEvictor<F>
where
    F: FnMut(&[Slot<O, I, E>]) -> Option<usize> + Send,
{
    fn victim(&mut self, slots: &[Slot<O, I, E>]) -> Option<usize> {
        (self.0)(slots)
    }
}

/// Picks the lowest-index unfixed slot.
pub fn first_unfixed<O, I, E>(slots: &[Slot<O, I, E>]) -> Option<usize> {
    slots.iter().position(|s| !s.is_fixed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(fixed: &[bool]) -> Vec<Slot<u8, usize, u8>> {
        fixed
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let mut slot = Slot::empty(i);
                slot.fill(0, i, 0, 1);
                if f {
                    slot.fix();
                }
                slot
            })
            .collect()
    }

    #[test]
    fn test_lru_skips_fixed() {
        let s = slots(&[true, false, false]);
        let mut lru = LruEvictor::new();
        for i in 0..3 {
            Evictor::<u8, usize, u8>::inserted(&mut lru, i);
        }
        assert_eq!(lru.victim(&s), Some(1));
        Evictor::<u8, usize, u8>::accessed(&mut lru, 1);
        assert_eq!(lru.victim(&s), Some(2));
    }

    #[test]
    fn test_lru_follows_relocation() {
        let s = slots(&[false, false]);
        let mut lru = LruEvictor::new();
        for i in 0..3 {
            Evictor::<u8, usize, u8>::inserted(&mut lru, i);
        }
        // slot 0 removed, slot 2 moved into its place
        Evictor::<u8, usize, u8>::removed(&mut lru, 0);
        Evictor::<u8, usize, u8>::relocated(&mut lru, 2, 0);
        assert_eq!(lru.order().collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(lru.victim(&s), Some(1));
    }

    #[test]
    fn test_lru_all_fixed() {
        let s = slots(&[true, true]);
        let mut lru = LruEvictor::new();
        Evictor::<u8, usize, u8>::inserted(&mut lru, 0);
        Evictor::<u8, usize, u8>::inserted(&mut lru, 1);
        assert_eq!(lru.victim(&s), None);
    }

    #[test]
    fn test_random_never_picks_fixed() {
        let s = slots(&[true, false, true, true, false]);
        let mut random = RandomEvictor::seeded(7);
        for _ in 0..100 {
            let v = random.victim(&s).unwrap();
            assert!(v == 1 || v == 4);
        }
        assert_eq!(random.victim(&slots(&[true, true])), None);
        assert_eq!(random.victim(&slots(&[])), None);
    }

    #[test]
    fn test_fn_evictor() {
        let s = slots(&[true, false, false]);
        let mut e = from_fn(first_unfixed::<u8, usize, u8>);
        assert_eq!(e.victim(&s), Some(1));
    }
}
