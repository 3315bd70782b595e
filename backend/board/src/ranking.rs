//! # Ranking
//!
//! Standard competition ranking ("1224") over entries already sorted by total,
//! highest first. Sorting is the caller's job; this module never reorders.

use crate::error::{BoardError, Result};

/// Anything with a leggy total.
pub trait Scored {
    fn total(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry<T> {
    pub entry: T,
    pub rank: usize,
}

impl<T: Scored + ?Sized> Scored for &T {
    fn total(&self) -> u64 {
        (**self).total()
    }
}

impl<T: Scored> Scored for RankedEntry<T> {
    fn total(&self) -> u64 {
        self.entry.total()
    }
}

/// Pairs every entry with its rank, keeping input order.
///
/// Input must be sorted by total descending. Unsorted input is not detected
/// here and yields meaningless ranks; use [`assign_ranks_checked`] to reject it.
pub fn assign_ranks<T, I>(entries: I) -> Vec<RankedEntry<T>>
where
    T: Scored,
    I: IntoIterator<Item = T>,
{
    let mut ranked: Vec<RankedEntry<T>> = Vec::new();

    for (position, entry) in entries.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(previous) if previous.entry.total() == entry.total() => previous.rank,
            _ => position + 1,
        };

        ranked.push(RankedEntry { entry, rank });
    }

    ranked
}

/// Same as [`assign_ranks`] but fails with [`BoardError::InvalidInput`] when a
/// total is larger than the one before it.
pub fn assign_ranks_checked<T: Scored>(entries: Vec<T>) -> Result<Vec<RankedEntry<T>>> {
    if let Some(position) = entries
        .windows(2)
        .position(|pair| pair[1].total() > pair[0].total())
    {
        return Err(BoardError::InvalidInput(format!(
            "entries not sorted by total descending at position {}",
            position + 1
        )));
    }

    Ok(assign_ranks(entries))
}
