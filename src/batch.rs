use std::num::NonZeroUsize;

use crate::LangMap;

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(30) {
    Some(size) => size,
    None => unreachable!(),
};

/// A contiguous slice of the outstanding entries. `index` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub index: usize,
    pub total: usize,
    pub entries: LangMap,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits `outstanding` into `ceil(len / size)` batches, preserving order.
pub fn split_batches(outstanding: &LangMap, size: NonZeroUsize) -> Vec<Batch> {
    let items = outstanding.iter().collect::<Vec<_>>();
    let total = items.len().div_ceil(size.get());
    items
        .chunks(size.get())
        .enumerate()
        .map(|(i, chunk)| Batch {
            index: i + 1,
            total,
            entries: chunk
                .iter()
                .map(|(key, value)| ((*key).clone(), (*value).clone()))
                .collect(),
        })
        .collect()
}
