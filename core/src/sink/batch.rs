use std::mem;

/// Ordered buffer of same-kind payloads awaiting a single bulk request.
///
/// A batch never holds more than `capacity` items. Pushing onto a full batch
/// hands back the full contents first and starts over with the new item.
#[derive(Debug)]
pub struct Batch<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Batch<T> {
    /// `capacity` must be at least 1; callers validate it before building a batch.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `item`. If the batch was already full, its previous contents
    /// are drained and returned so the caller can flush them; the item is
    /// then appended to the emptied batch. No item is ever dropped.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        let flushed = if self.is_full() {
            Some(self.drain_all())
        } else {
            None
        };
        self.items.push(item);
        flushed
    }

    /// Takes everything buffered so far, leaving the batch empty.
    pub fn drain_all(&mut self) -> Vec<T> {
        mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
