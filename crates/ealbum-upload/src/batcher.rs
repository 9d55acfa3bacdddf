//! File batching
//!
//! Splits an ordered list of files into contiguous batches of at most `size` entries.
//! Batches are computed lazily from the current list and can be recomputed at any time.

use std::num::NonZeroUsize;
use std::ops::Range;

/// A contiguous slice of a category's files
#[derive(Debug, PartialEq, Eq)]
pub struct UploadBatch<'a, T> {
    /// Position of the batch within the category (0-based)
    pub index: usize,
    /// Position of the batch's first item within the full list
    pub offset: usize,
    pub items: &'a [T],
}

impl<T> UploadBatch<'_, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index range of the batch within the full list
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.items.len()
    }
}

/// Lazy iterator over the batches of a slice
#[derive(Debug, Clone)]
pub struct Batches<'a, T> {
    items: &'a [T],
    size: usize,
    next_index: usize,
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = UploadBatch<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next_index * self.size;
        if offset >= self.items.len() {
            return None;
        }
        let end = (offset + self.size).min(self.items.len());
        let batch = UploadBatch {
            index: self.next_index,
            offset,
            items: &self.items[offset..end],
        };
        self.next_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = batch_count(self.items.len(), self.size) - self.next_index;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Batches<'_, T> {}

/// Split `items` into batches of `size`; the last batch may be shorter.
pub fn batches<T>(items: &[T], size: NonZeroUsize) -> Batches<'_, T> {
    Batches {
        items,
        size: size.get(),
        next_index: 0,
    }
}

fn batch_count(len: usize, size: usize) -> usize {
    len.div_ceil(size)
}

/// Sizes of the batches `batches` would produce for a list of `len` items
pub fn batch_sizes(len: usize, size: NonZeroUsize) -> Vec<usize> {
    let size = size.get();
    (0..batch_count(len, size))
        .map(|i| (len - i * size).min(size))
        .collect()
}
