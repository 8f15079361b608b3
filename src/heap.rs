//! Binary min-heap.

/// Binary min-heap of `(key, value)` entries ordered by key.
///
/// Only the key is compared, so values need no ordering of their own. The order of entries with
/// equal keys is unspecified.
pub struct MinHeap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K: Ord, V> MinHeap<K, V> {
    pub fn new() -> Self {
        MinHeap { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MinHeap {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry with the smallest key without removing it.
    pub fn peek(&self) -> Option<(&K, &V)> {
        self.entries.first().map(|(key, value)| (key, value))
    }

    /// Adds an entry. Time complexity is *log(n)*.
    pub fn push(&mut self, key: K, value: V) {
        self.entries.push((key, value));
        self.sift_up(self.entries.len() - 1);
    }

    /// Removes and returns the entry with the smallest key. Time complexity is *log(n)*.
    pub fn pop(&mut self) -> Option<(K, V)> {
        if self.entries.is_empty() {
            return None;
        }

        let top = self.entries.swap_remove(0);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }

        return Some(top);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.entries[idx].0 < self.entries[parent].0 {
                self.entries.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;

            if left < len && self.entries[left].0 < self.entries[smallest].0 {
                smallest = left;
            }
            if right < len && self.entries[right].0 < self.entries[smallest].0 {
                smallest = right;
            }
            if smallest == idx {
                break;
            }

            self.entries.swap(idx, smallest);
            idx = smallest;
        }
    }
}

impl<K: Ord, V> Default for MinHeap<K, V> {
    fn default() -> Self {
        MinHeap::new()
    }
}
