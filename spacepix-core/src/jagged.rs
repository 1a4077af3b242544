//! Header + items container shared by every pipeline stage.
//!
//! A `Jagged<H, T>` pairs one header with one inner vector. Cells,
//! measurements and spacepoints use a [`Module`](crate::Module) header per
//! module; clusters use the owning module index as header.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ClusterizationError;

/// Headers paired with a sequence of sequences.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jagged<H, T> {
    headers: Vec<H>,
    items: Vec<Vec<T>>,
}

impl<H, T> Default for Jagged<H, T> {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl<H, T> Jagged<H, T> {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty container with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            headers: Vec::with_capacity(capacity),
            items: Vec::with_capacity(capacity),
        }
    }

    /// Builds a container from parallel header and item vectors.
    ///
    /// # Errors
    /// Returns [`ClusterizationError::LayoutMismatch`] if the lengths differ.
    pub fn from_parts(headers: Vec<H>, items: Vec<Vec<T>>) -> Result<Self, ClusterizationError> {
        if headers.len() != items.len() {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "{} headers for {} item groups",
                headers.len(),
                items.len()
            )));
        }
        Ok(Self { headers, items })
    }

    /// Splits the container into its headers and items.
    #[must_use]
    pub fn into_parts(self) -> (Vec<H>, Vec<Vec<T>>) {
        (self.headers, self.items)
    }

    /// Appends one entry.
    pub fn push(&mut self, header: H, items: Vec<T>) {
        self.headers.push(header);
        self.items.push(items);
    }

    /// Number of entries (headers).
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Sum of all inner lengths.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.items.iter().map(Vec::len).sum()
    }

    /// Inner lengths, one per entry.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.items.iter().map(Vec::len).collect()
    }

    /// All headers.
    #[must_use]
    pub fn headers(&self) -> &[H] {
        &self.headers
    }

    /// All item groups.
    #[must_use]
    pub fn items(&self) -> &[Vec<T>] {
        &self.items
    }

    /// Header of entry `index`.
    #[must_use]
    pub fn header(&self, index: usize) -> Option<&H> {
        self.headers.get(index)
    }

    /// Items of entry `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[T]> {
        self.items.get(index).map(Vec::as_slice)
    }

    /// Iterates over `(header, items)` pairs.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&H, &[T])> {
        self.headers
            .iter()
            .zip(self.items.iter().map(Vec::as_slice))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.headers.clear();
        self.items.clear();
    }
}

/// Prefix-sum entry mapping a flat item index to `(entry, position)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatIndex {
    /// Entry (outer) index.
    pub entry: usize,
    /// Position inside that entry.
    pub position: usize,
}

impl<H, T> Jagged<H, T> {
    /// Flat item index table: element `k` locates the `k`-th item overall.
    ///
    /// Lets a one-task-per-item launch find its item without a search.
    ///
    /// # Errors
    /// Returns [`ClusterizationError::Allocation`] if the table cannot be
    /// reserved.
    pub fn flat_index(&self) -> Result<Vec<FlatIndex>, ClusterizationError> {
        let mut table = Vec::new();
        table
            .try_reserve_exact(self.total_size())
            .map_err(ClusterizationError::allocation("flat item index"))?;
        for (entry, items) in self.items.iter().enumerate() {
            table.extend((0..items.len()).map(|position| FlatIndex { entry, position }));
        }
        Ok(table)
    }
}

impl<H, T> FromIterator<(H, Vec<T>)> for Jagged<H, T> {
    fn from_iter<I: IntoIterator<Item = (H, Vec<T>)>>(iter: I) -> Self {
        let (headers, items) = iter.into_iter().unzip();
        Self { headers, items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jagged_operations() {
        let mut jagged: Jagged<u32, char> = Jagged::with_capacity(4);
        assert!(jagged.is_empty());

        jagged.push(10, vec!['a', 'b']);
        jagged.push(20, vec![]);
        jagged.push(30, vec!['c']);

        assert_eq!(jagged.len(), 3);
        assert_eq!(jagged.total_size(), 3);
        assert_eq!(jagged.sizes(), vec![2, 0, 1]);
        assert_eq!(jagged.header(2), Some(&30));
        assert_eq!(jagged.get(0), Some(&['a', 'b'][..]));
        assert!(jagged.get(3).is_none());

        jagged.clear();
        assert!(jagged.is_empty());
        assert_eq!(jagged.total_size(), 0);
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let result: Result<Jagged<u8, u8>, _> = Jagged::from_parts(vec![1, 2], vec![vec![]]);
        assert!(matches!(
            result,
            Err(ClusterizationError::LayoutMismatch(_))
        ));
    }

    #[test]
    fn test_flat_index() {
        let jagged: Jagged<(), u8> = [((), vec![1, 2]), ((), vec![]), ((), vec![3])]
            .into_iter()
            .collect();
        let table = jagged.flat_index().unwrap();
        assert_eq!(
            table,
            vec![
                FlatIndex {
                    entry: 0,
                    position: 0
                },
                FlatIndex {
                    entry: 0,
                    position: 1
                },
                FlatIndex {
                    entry: 2,
                    position: 0
                },
            ]
        );
    }
}
