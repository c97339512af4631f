//! Group partition — single source of truth for block boundaries.
//!
//! Purpose
//! -------
//! Describe how `N` stacked observations split into `m` contiguous groups.
//! The covariance blocks, every per-observation vector, and every segmented
//! reduction in the likelihood gradient are keyed by the same
//! [`GroupPartition`], so block boundaries cannot drift apart between the
//! solve and the reduction.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least one group; every group holds at least one observation.
//! - Group `i` covers rows `starts[i] .. starts[i] + sizes[i]`; the ranges
//!   partition `[0, N)` exactly, in order, without overlap.
//!
//! Testing notes
//! -------------
//! - Unit tests cover construction errors, range bookkeeping, and the
//!   segmented sum against a hand-computed reference.
use std::ops::Range;

use ndarray::{Array2, ArrayView2, Axis};

use crate::covariance::errors::{CovError, CovResult};

/// GroupPartition — ordered group sizes with precomputed block offsets.
///
/// Fields
/// ------
/// - `sizes`: number of observations per group, in storage order.
/// - `starts`: first row of each group (exclusive prefix sums of `sizes`).
/// - `total`: `N = Σ sizes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPartition {
    sizes: Vec<usize>,
    starts: Vec<usize>,
    total: usize,
}

impl GroupPartition {
    /// Build a partition from group sizes.
    ///
    /// # Errors
    /// - [`CovError::EmptyPartition`] if `sizes` is empty.
    /// - [`CovError::EmptyGroup`] for the first group of size zero.
    pub fn new(sizes: Vec<usize>) -> CovResult<Self> {
        if sizes.is_empty() {
            return Err(CovError::EmptyPartition);
        }
        let mut starts = Vec::with_capacity(sizes.len());
        let mut total = 0usize;
        for (group, &size) in sizes.iter().enumerate() {
            if size == 0 {
                return Err(CovError::EmptyGroup { group });
            }
            starts.push(total);
            total += size;
        }
        Ok(Self { sizes, starts, total })
    }

    /// Number of groups `m`.
    pub fn num_groups(&self) -> usize {
        self.sizes.len()
    }

    /// Total number of observations `N`.
    pub fn num_obs(&self) -> usize {
        self.total
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Row range of group `group`.
    ///
    /// Panics if `group >= self.num_groups()`.
    pub fn range(&self, group: usize) -> Range<usize> {
        let start = self.starts[group];
        start..start + self.sizes[group]
    }

    /// Row ranges of all groups, in storage order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.starts.iter().zip(self.sizes.iter()).map(|(&start, &size)| start..start + size)
    }

    /// segment_sum — per-group column sums of an `N × c` matrix.
    ///
    /// Returns an `m × c` matrix whose row `i` is the sum of the rows of
    /// `values` that belong to group `i`.
    ///
    /// # Errors
    /// - [`CovError::RhsRowMismatch`] if `values.nrows() != N`.
    pub fn segment_sum(&self, values: ArrayView2<f64>) -> CovResult<Array2<f64>> {
        if values.nrows() != self.total {
            return Err(CovError::RhsRowMismatch { expected: self.total, found: values.nrows() });
        }
        let mut out = Array2::<f64>::zeros((self.num_groups(), values.ncols()));
        for (group, range) in self.ranges().enumerate() {
            let block = values.slice(ndarray::s![range, ..]);
            out.row_mut(group).assign(&block.sum_axis(Axis(0)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Rejection of empty partitions and empty groups.
    // - Range bookkeeping (starts, totals, contiguous coverage of [0, N)).
    // - `segment_sum` against hand-computed group sums.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure invalid partitions are rejected at construction.
    //
    // Expect
    // ------
    // - Empty size list -> EmptyPartition.
    // - Zero-sized group -> EmptyGroup with its index.
    fn new_rejects_empty_partition_and_empty_groups() {
        assert_eq!(GroupPartition::new(vec![]), Err(CovError::EmptyPartition));
        assert_eq!(GroupPartition::new(vec![2, 0, 1]), Err(CovError::EmptyGroup { group: 1 }));
    }

    #[test]
    // Purpose
    // -------
    // Verify that group ranges tile [0, N) contiguously and in order.
    fn ranges_cover_all_rows_in_order() {
        let partition = GroupPartition::new(vec![2, 3, 1]).expect("valid partition");

        let ranges: Vec<_> = partition.ranges().collect();

        assert_eq!(partition.num_obs(), 6);
        assert_eq!(partition.num_groups(), 3);
        assert_eq!(ranges, vec![0..2, 2..5, 5..6]);
        assert_eq!(partition.range(1), 2..5);
    }

    #[test]
    // Purpose
    // -------
    // Check the segmented sum against a hand-computed reference and the
    // row-count guard.
    fn segment_sum_matches_manual_group_sums() {
        let partition = GroupPartition::new(vec![2, 1]).expect("valid partition");
        let values = array![[1.0, 10.0], [2.0, 20.0], [4.0, 40.0]];

        let sums = partition.segment_sum(values.view()).expect("row count matches");

        assert_eq!(sums, array![[3.0, 30.0], [4.0, 40.0]]);
        let too_short = array![[1.0], [2.0]];
        assert_eq!(
            partition.segment_sum(too_short.view()),
            Err(CovError::RhsRowMismatch { expected: 3, found: 2 })
        );
    }
}
