use std::collections::HashSet;
use std::hash::Hash;

/// Recency stack without duplicates: pushing an item already present moves
/// it to the top. The bottom is the least recently pushed item.
#[derive(Debug, Clone)]
pub struct UniqueStack<T> {
    order: Vec<T>,
    unique: HashSet<T>,
}

impl<T> UniqueStack<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> UniqueStack<T> {
        UniqueStack {
            order: Vec::new(),
            unique: HashSet::new(),
        }
    }

    fn position(&self, item: &T) -> Option<usize> {
        if !self.unique.contains(item) {
            return None;
        }
        self.order.iter().position(|x| x == item)
    }

    pub fn push(&mut self, item: T) {
        if let Some(idx) = self.position(&item) {
            self.order.remove(idx);
        } else {
            self.unique.insert(item.clone());
        }
        self.order.push(item);
    }

    pub fn delete(&mut self, item: &T) {
        if let Some(idx) = self.position(item) {
            self.order.remove(idx);
            self.unique.remove(item);
        }
    }

    /// Renames `from` to `to` in place, keeping its recency rank. Any
    /// existing `to` is dropped first.
    pub fn replace(&mut self, from: &T, to: T) {
        if from == &to {
            return;
        }
        self.delete(&to);
        if let Some(idx) = self.position(from) {
            self.unique.remove(from);
            self.unique.insert(to.clone());
            self.order[idx] = to;
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        let item = self.order.pop()?;
        self.unique.remove(&item);
        Some(item)
    }

    // Returns the most recently pushed item, or None if the stack is empty.
    pub fn top(&self) -> Option<&T> {
        self.order.last()
    }

    // Returns the least recently pushed item, or None if the stack is empty.
    pub fn bottom(&self) -> Option<&T> {
        self.order.first()
    }

    /// Items from least to most recently pushed.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.unique.contains(item)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.unique.clear();
    }
}

impl<T> Default for UniqueStack<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_of(items: &[usize]) -> UniqueStack<usize> {
        let mut stack = UniqueStack::new();
        for &i in items {
            stack.push(i);
        }
        stack
    }

    #[test]
    fn test_push() {
        let stack = stack_of(&[1, 2, 3]);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.top(), Some(&3));
        assert_eq!(stack.bottom(), Some(&1));
    }

    #[test]
    fn test_pop() {
        let mut stack = stack_of(&[1, 2, 3]);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.len(), 2);
        assert!(!stack.contains(&3));
        assert_eq!(stack.top(), Some(&2));
    }

    #[test]
    fn test_push_duplicate_moves_to_top() {
        let stack = stack_of(&[1, 2, 3, 2]);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_delete() {
        let mut stack = stack_of(&[1, 2, 3]);
        stack.delete(&2);
        assert_eq!(stack.len(), 2);
        assert!(!stack.contains(&2));
        stack.delete(&2);
        assert_eq!(stack.len(), 2);
        stack.delete(&3);
        stack.delete(&1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_replace_keeps_rank() {
        let mut stack = stack_of(&[0, 1, 2]);
        stack.replace(&2, 5);
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), vec![0, 1, 5]);
        assert!(!stack.contains(&2));
        assert!(stack.contains(&5));
    }

    #[test]
    fn test_replace_onto_existing_item() {
        let mut stack = stack_of(&[0, 1, 2]);
        stack.replace(&2, 0);
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), vec![1, 0]);
        stack.replace(&7, 3);
        assert_eq!(stack.len(), 2);
    }
}
