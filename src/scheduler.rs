//! The row scheduler: computes, for one input dataset being appended to one output dataset, the
//! sequence of per-rank write windows that respect chunk alignment, the buffer memory budget,
//! and any tail-chunk carried over from a previous input.
//!
//! This module is deliberately pure arithmetic over `u64` offsets — it performs no I/O and knows
//! nothing about the container driver, so its invariants (§8 properties 1-3) can be checked
//! directly with unit tests.

use crate::error::{Error, Result};

/// A single rank's contribution to one collective write call: `rows` elements of the input,
/// starting at `in_start`, land in the output starting at `out_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankWindow {
    pub rows: u64,
    pub in_start: u64,
    pub out_start: u64,
}

impl RankWindow {
    const fn empty() -> Self {
        Self {
            rows: 0,
            in_start: 0,
            out_start: 0,
        }
    }
}

/// One tick of the scheduler: every rank issues `primary[rank]` as a collective write, and, when
/// this input's trailing sub-chunk remainder was absorbed this tick, every rank additionally
/// issues `remainder[rank]` (zero-length on every rank but the one chosen to carry it). Keeping
/// the remainder as its own call, rather than folding it into `primary`, keeps each window a
/// single contiguous hyperslab even when the chosen rank's normal allocation does not happen to
/// sit at the tail of the iteration's row range.
#[derive(Debug, Clone)]
pub struct Iteration {
    pub rows_iter: u64,
    pub primary: Vec<RankWindow>,
    pub remainder: Option<Vec<RankWindow>>,
}

impl Iteration {
    #[must_use]
    pub fn rows_for_rank(&self, rank: usize) -> u64 {
        let primary = self.primary.get(rank).map_or(0, |w| w.rows);
        let remainder = self
            .remainder
            .as_ref()
            .and_then(|w| w.get(rank))
            .map_or(0, |w| w.rows);
        primary + remainder
    }
}

/// Computes the write-window sequence for appending `n` input rows to an output dataset that
/// currently has `l0` rows, across a cohort of `cohort_size` ranks, given the output's chunk
/// size `chunk_rows` and a per-rank buffer budget `buffer_rows_raw` (rounded down to a multiple
/// of `chunk_rows`).
pub struct RowScheduler {
    n: u64,
    l0: u64,
    chunk_rows: u64,
    buffer_rows: u64,
    cohort_size: usize,
    n_written: u64,
    incomplete: u64,
}

impl RowScheduler {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `chunk_rows` is zero or the buffer budget cannot hold a
    /// single whole chunk (`buffer_rows_raw < chunk_rows`).
    pub fn new(
        n: u64,
        l0: u64,
        chunk_rows: u64,
        buffer_rows_raw: u64,
        cohort_size: usize,
    ) -> Result<Self> {
        if chunk_rows == 0 {
            return Err(Error::config("chunk size must be at least one row"));
        }
        let buffer_rows = (buffer_rows_raw / chunk_rows) * chunk_rows;
        if buffer_rows < chunk_rows {
            return Err(Error::config(format!(
                "mem-max buffer ({buffer_rows_raw} rows) cannot hold one chunk ({chunk_rows} rows)"
            )));
        }
        Ok(Self {
            n,
            l0,
            chunk_rows,
            buffer_rows,
            cohort_size: cohort_size.max(1),
            n_written: 0,
            incomplete: l0 % chunk_rows,
        })
    }

    /// Total rows this input will add; the output should be resized from `l0` to `l0 + n` once,
    /// before the first iteration runs.
    #[must_use]
    pub const fn total_rows(&self) -> u64 {
        self.n
    }
}

impl Iterator for RowScheduler {
    type Item = Iteration;

    fn next(&mut self) -> Option<Iteration> {
        if self.n_written >= self.n {
            return None;
        }

        let incomplete_at_start = self.incomplete;
        let remaining = self.n - self.n_written;
        let aligned = remaining - remaining % self.chunk_rows;
        let cap = self.cohort_size as u64 * self.buffer_rows - incomplete_at_start;
        let mut rows_iter = aligned.min(cap);
        // `cap` need not be chunk-aligned when incomplete_at_start > 0; re-floor so the whole-chunk
        // division below always lands on an integer chunk count.
        rows_iter -= rows_iter % self.chunk_rows;

        let chunks_total = rows_iter / self.chunk_rows;
        let r = self.cohort_size as u64;
        let minsize = chunks_total / r;
        let leftovers = chunks_total % r;

        let mut rows_this_rank = vec![0u64; self.cohort_size];
        let mut chunk_offset = vec![0u64; self.cohort_size];
        let mut acc = 0u64;
        for (rank, offset) in chunk_offset.iter_mut().enumerate() {
            let chunks_this = if (rank as u64) < leftovers {
                minsize + 1
            } else {
                minsize
            };
            *offset = acc;
            rows_this_rank[rank] = chunks_this * self.chunk_rows;
            acc += chunks_this;
        }

        let completion_applied = incomplete_at_start > 0;
        if completion_applied {
            let extra = self.chunk_rows - incomplete_at_start;
            rows_iter += extra;
            rows_this_rank[0] += extra;
        }

        let base_n_written = self.n_written;
        let mut primary = Vec::with_capacity(self.cohort_size);
        for rank in 0..self.cohort_size {
            let in_start = if rank == 0 {
                base_n_written
            } else {
                let mut start =
                    (base_n_written - incomplete_at_start) + chunk_offset[rank] * self.chunk_rows;
                if completion_applied {
                    start += self.chunk_rows;
                }
                start
            };
            primary.push(RankWindow {
                rows: rows_this_rank[rank],
                in_start,
                out_start: self.l0 + in_start,
            });
        }

        let after_primary_written = base_n_written + rows_iter;
        let remaining_prime = self.n - after_primary_written;
        let remainder = if remaining_prime > 0 && remaining_prime < self.chunk_rows {
            let chosen = if rows_iter == 0 {
                0
            } else if leftovers == 0 {
                self.cohort_size - 1
            } else {
                leftovers as usize
            };
            let mut windows = vec![RankWindow::empty(); self.cohort_size];
            let in_start = after_primary_written;
            windows[chosen] = RankWindow {
                rows: remaining_prime,
                in_start,
                out_start: self.l0 + in_start,
            };
            rows_iter += remaining_prime;
            Some(windows)
        } else {
            None
        };

        self.n_written = base_n_written + rows_iter;
        self.incomplete = 0;

        Some(Iteration {
            rows_iter,
            primary,
            remainder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(n: u64, l0: u64, chunk: u64, buffer: u64, cohort: usize) -> Vec<Iteration> {
        RowScheduler::new(n, l0, chunk, buffer, cohort)
            .expect("valid scheduler config")
            .collect()
    }

    /// Every row of the input must be written by exactly one (rank, call) exactly once, with no
    /// gaps or overlaps, and in ascending input order overall. This is property 1 & 2 from the
    /// spec, checked generically rather than per-scenario.
    fn assert_exact_cover(iterations: &[Iteration], n: u64, l0: u64) {
        let mut covered = vec![false; n as usize];
        for it in iterations {
            for window in it.primary.iter().chain(it.remainder.iter().flatten()) {
                for offset in 0..window.rows {
                    let idx = (window.in_start + offset) as usize;
                    assert!(idx < n as usize, "in_start+offset out of range");
                    assert!(!covered[idx], "row {idx} written twice");
                    covered[idx] = true;
                    assert_eq!(
                        window.out_start + offset,
                        l0 + window.in_start + offset,
                        "output offset must track l0 + input offset"
                    );
                }
            }
        }
        assert!(covered.iter().all(|&c| c), "every input row must be covered");
    }

    #[test]
    fn rejects_buffer_smaller_than_one_chunk() {
        let err = RowScheduler::new(100, 0, 16, 8, 1).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn e1_two_full_files_single_rank() {
        // 100 rows, chunk 16, ample buffer, single rank: one shot.
        let iterations = collect(100, 0, 16, 1_000_000, 1);
        assert_exact_cover(&iterations, 100, 0);
        let total: u64 = iterations.iter().map(|it| it.rows_iter).sum();
        assert_eq!(total, 100);

        let second = collect(100, 100, 16, 1_000_000, 1);
        assert_exact_cover(&second, 100, 100);
    }

    #[test]
    fn e2_tiny_buffer_forces_many_iterations() {
        // mem-max so small that K rounds down to exactly one chunk: every iteration moves
        // at most one chunk.
        let iterations = collect(100, 0, 16, 16, 1);
        assert!(iterations.len() > 1, "small buffer should force iteration");
        assert_exact_cover(&iterations, 100, 0);
    }

    #[test]
    fn e3_non_chunk_aligned_inputs_leave_no_holes() {
        let mut l0 = 0u64;
        for n in [17u64, 33, 50] {
            let iterations = collect(n, l0, 16, 1_000_000, 1);
            assert_exact_cover(&iterations, n, l0);
            l0 += n;
        }
        assert_eq!(l0, 100);
    }

    #[test]
    fn e4_three_ranks_two_full_inputs() {
        let first = collect(48, 0, 16, 1_000_000, 3);
        assert_exact_cover(&first, 48, 0);
        // Ample buffer => a single iteration, 16 rows (one chunk) per rank.
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].rows_for_rank(0), 16);
        assert_eq!(first[0].rows_for_rank(1), 16);
        assert_eq!(first[0].rows_for_rank(2), 16);

        let second = collect(48, 48, 16, 1_000_000, 3);
        assert_exact_cover(&second, 48, 48);
        assert_eq!(second[0].rows_for_rank(0), 16);
        assert_eq!(second[0].rows_for_rank(1), 16);
        assert_eq!(second[0].rows_for_rank(2), 16);
    }

    #[test]
    fn e5_carry_over_tail_chunk_across_inputs() {
        // First input: 40 rows, chunk 16, 3 ranks. Whole chunks: 32 rows (2 chunks, 1/1/0),
        // sub-chunk remainder: 8 rows on the chosen rank. incomplete becomes 8 for the next input.
        let first = RowScheduler::new(40, 0, 16, 1_000_000, 3).unwrap();
        let first_iterations: Vec<_> = first.collect();
        assert_exact_cover(&first_iterations, 40, 0);
        let total_first: u64 = first_iterations.iter().map(|it| it.rows_iter).sum();
        assert_eq!(total_first, 40);

        // Second input starts at l0 = 40, so incomplete = 40 % 16 = 8: tail-chunk completion
        // of 8 rows must land on rank 0 before anything else.
        let second = RowScheduler::new(40, 40, 16, 1_000_000, 3).unwrap();
        assert_eq!(second.incomplete, 8);
        let second_iterations: Vec<_> = second.collect();
        assert_exact_cover(&second_iterations, 40, 40);
        let first_window = &second_iterations[0].primary[0];
        assert_eq!(first_window.in_start, 0);
        assert!(first_window.rows >= 8, "rank 0 must absorb the completion rows");

        let final_length = 40 + 40;
        assert_eq!(final_length, 80);
    }

    #[test]
    fn e6_zero_row_input_yields_no_iterations() {
        let iterations = collect(0, 10, 16, 1_000_000, 1);
        assert!(iterations.is_empty());
    }

    #[test]
    fn zero_rank_windows_are_issued_for_idle_ranks() {
        // 16 rows, 4 ranks: only one chunk exists, so three ranks get an explicit zero-length
        // window rather than being skipped — required for collective-call parity (property 3).
        let iterations = collect(16, 0, 16, 1_000_000, 4);
        assert_eq!(iterations.len(), 1);
        let zero_ranks = iterations[0]
            .primary
            .iter()
            .filter(|w| w.rows == 0)
            .count();
        assert_eq!(zero_ranks, 3);
    }
}
