//! Keyed reductions over cells.
//!
//! Used to total cell outflows per sub-basin (or per reach). Items are cut
//! into fixed-size chunks; each chunk accumulates into its own partial
//! array, deposited into its slot inside a short critical section. Partials
//! are merged in chunk order, so totals are bitwise identical for every
//! processing mode and thread count.

use crate::strategy::{Executor, ParallelStrategy};
use parking_lot::Mutex;
use rivulet_core::{Error, Result};

/// Items per partial array
pub const REDUCE_CHUNK: usize = 4096;

struct Partial {
    values: Vec<f64>,
    bad_key: Option<usize>,
}

impl Partial {
    fn zeros(n: usize) -> Self {
        Self {
            values: vec![0.0; n],
            bad_key: None,
        }
    }

    fn add(&mut self, key: usize, value: f64) {
        match self.values.get_mut(key) {
            Some(slot) => *slot += value,
            None => self.bad_key = Some(key),
        }
    }

    fn merge(&mut self, other: &Partial) {
        for (t, p) in self.values.iter_mut().zip(&other.values) {
            *t += p;
        }
        if self.bad_key.is_none() {
            self.bad_key = other.bad_key;
        }
    }
}

/// Sum `f(i)` for `i in 0..n_items` into `n_slots` buckets.
///
/// `f` returns `None` for items that contribute nothing. A key outside
/// `0..n_slots` is an error.
pub fn reduce_by_key<F>(exec: &Executor, n_items: usize, n_slots: usize, f: F) -> Result<Vec<f64>>
where
    F: Fn(usize) -> Option<(usize, f64)> + Sync + Send,
{
    let n_chunks = n_items.div_ceil(REDUCE_CHUNK);
    let slots: Mutex<Vec<Option<Partial>>> = Mutex::new((0..n_chunks).map(|_| None).collect());

    exec.par_for_each(0..n_chunks, |chunk| {
        let start = chunk * REDUCE_CHUNK;
        let end = (start + REDUCE_CHUNK).min(n_items);
        let mut acc = Partial::zeros(n_slots);
        for i in start..end {
            if let Some((key, value)) = f(i) {
                acc.add(key, value);
            }
        }
        slots.lock()[chunk] = Some(acc);
    });

    let mut merged = Partial::zeros(n_slots);
    for partial in slots.into_inner().iter().flatten() {
        merged.merge(partial);
    }

    match merged.bad_key {
        Some(key) => Err(Error::invalid(
            "key",
            key,
            format!("reduction key outside 0..{n_slots}"),
        )),
        None => Ok(merged.values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ProcessingMode;

    #[test]
    fn test_reduce_sums_per_key() {
        let keys = [1usize, 2, 1, 2, 2];
        let exec = Executor::sequential();
        let totals = reduce_by_key(&exec, keys.len(), 3, |i| Some((keys[i], 1.0))).unwrap();
        assert_eq!(totals, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_reduce_is_bitwise_stable_across_modes() {
        // Values chosen so that summation order changes the last bits
        let n = 10 * REDUCE_CHUNK + 17;
        let f = |i: usize| Some((i % 7, 1.0 / (i as f64 + 1.0) + (i as f64).sqrt() * 1e-3));
        let seq = reduce_by_key(&Executor::sequential(), n, 7, f).unwrap();
        for mode in [
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(2),
            ProcessingMode::ParallelWith(3),
            ProcessingMode::ParallelWith(8),
        ] {
            let exec = Executor::new(mode).unwrap();
            for _ in 0..3 {
                let par = reduce_by_key(&exec, n, 7, f).unwrap();
                assert_eq!(seq, par, "mode {mode:?}");
            }
        }
    }

    #[test]
    fn test_reduce_empty_input() {
        let totals = reduce_by_key(&Executor::sequential(), 0, 3, |_| Some((0, 1.0))).unwrap();
        assert_eq!(totals, vec![0.0; 3]);
    }

    #[test]
    fn test_reduce_rejects_bad_key() {
        let result = reduce_by_key(&Executor::sequential(), 3, 2, |i| Some((i, 1.0)));
        assert!(result.is_err());
    }
}
