//! Cell types for pixel readout data.

use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Channel coordinate of a cell within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Channel {
    /// First channel index (local x direction).
    pub channel0: u32,
    /// Second channel index (local y direction).
    pub channel1: u32,
}

impl Channel {
    /// Creates a new channel coordinate.
    #[inline]
    #[must_use]
    pub fn new(channel0: u32, channel1: u32) -> Self {
        Self { channel0, channel1 }
    }

    /// Checks if this channel touches another (8-connectivity).
    ///
    /// A channel is not adjacent to itself.
    #[inline]
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        let d0 = self.channel0.abs_diff(other.channel0);
        let d1 = self.channel1.abs_diff(other.channel1);
        d0 <= 1 && d1 <= 1 && (d0 != 0 || d1 != 0)
    }

    /// Readout order: `channel1` first, then `channel0`.
    #[inline]
    #[must_use]
    pub fn readout_cmp(&self, other: &Self) -> Ordering {
        (self.channel1, self.channel0).cmp(&(other.channel1, other.channel0))
    }
}

/// One active detector-readout sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    /// Channel coordinate within the module.
    pub channel: Channel,
    /// Raw activation (charge proxy).
    pub activation: f64,
    /// Readout time, carried through unchanged.
    #[cfg_attr(feature = "serde", serde(default))]
    pub time: f64,
    /// Index of the owning module in the event's module array.
    #[cfg_attr(feature = "serde", serde(default))]
    pub module_index: usize,
}

impl Cell {
    /// Creates a cell with zero time, not yet attached to a module.
    #[inline]
    #[must_use]
    pub fn new(channel0: u32, channel1: u32, activation: f64) -> Self {
        Self {
            channel: Channel::new(channel0, channel1),
            activation,
            time: 0.0,
            module_index: 0,
        }
    }

    /// Sets the readout time.
    #[must_use]
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the owning module index.
    #[must_use]
    pub fn with_module(mut self, module_index: usize) -> Self {
        self.module_index = module_index;
        self
    }

    /// Returns the first channel index.
    #[inline]
    #[must_use]
    pub fn channel0(&self) -> u32 {
        self.channel.channel0
    }

    /// Returns the second channel index.
    #[inline]
    #[must_use]
    pub fn channel1(&self) -> u32 {
        self.channel.channel1
    }

    /// Checks if this cell touches another (8-connectivity).
    #[inline]
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        self.channel.is_adjacent(&other.channel)
    }

    /// True when `later` (sorted after `self`) is more than one row ahead.
    ///
    /// Once this holds no cell further back can touch `later` either.
    #[inline]
    #[must_use]
    pub fn is_far_behind(&self, later: &Self) -> bool {
        later.channel1().saturating_sub(self.channel1()) > 1
    }
}

/// Returns true if `cells` follow readout order.
#[must_use]
pub fn is_readout_sorted(cells: &[Cell]) -> bool {
    cells
        .windows(2)
        .all(|w| w[0].channel.readout_cmp(&w[1].channel) != Ordering::Greater)
}

/// Sorts `cells` into readout order.
pub fn sort_readout(cells: &mut [Cell]) {
    cells.sort_by(|a, b| a.channel.readout_cmp(&b.channel));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_adjacency() {
        let center = Channel::new(5, 5);

        assert!(center.is_adjacent(&Channel::new(4, 4)));
        assert!(center.is_adjacent(&Channel::new(5, 4)));
        assert!(center.is_adjacent(&Channel::new(6, 6)));

        assert!(!center.is_adjacent(&center));

        assert!(!center.is_adjacent(&Channel::new(7, 5)));
        assert!(!center.is_adjacent(&Channel::new(5, 7)));
    }

    #[test]
    fn test_adjacency_at_zero() {
        let origin = Channel::new(0, 0);
        assert!(origin.is_adjacent(&Channel::new(1, 1)));
        assert!(origin.is_adjacent(&Channel::new(0, 1)));
        assert!(!origin.is_adjacent(&Channel::new(0, 2)));
    }

    #[test]
    fn test_far_behind() {
        let a = Cell::new(3, 1, 1.0);
        assert!(!a.is_far_behind(&Cell::new(0, 2, 1.0)));
        assert!(a.is_far_behind(&Cell::new(3, 3, 1.0)));
    }

    #[test]
    fn test_readout_sort() {
        let mut cells = vec![
            Cell::new(2, 1, 1.0),
            Cell::new(0, 1, 1.0),
            Cell::new(5, 0, 1.0),
        ];
        assert!(!is_readout_sorted(&cells));

        sort_readout(&mut cells);
        assert!(is_readout_sorted(&cells));
        assert_eq!(cells[0].channel, Channel::new(5, 0));
        assert_eq!(cells[1].channel, Channel::new(0, 1));
    }

    #[test]
    fn test_cell_builders() {
        let cell = Cell::new(10, 20, 0.5).with_time(3.0).with_module(7);
        assert_eq!(cell.channel0(), 10);
        assert_eq!(cell.channel1(), 20);
        assert_eq!(cell.module_index, 7);
        assert!((cell.time - 3.0).abs() < f64::EPSILON);
    }
}
