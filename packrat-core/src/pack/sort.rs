//! In-place sorting over an abstract element store.
//!
//! The algorithm only ever compares and swaps elements by index, so the
//! elements can live anywhere (a file, a set of parallel arrays) and no
//! sort keys are held in memory.

use std::cmp::Ordering;

use crate::error::Result;

/// Index-addressed access to the elements being sorted.
pub trait SortAccess {
    /// Compare the elements at `a` and `b`.
    fn compare(&mut self, a: usize, b: usize) -> Result<Ordering>;

    /// Exchange the elements at `a` and `b`.
    fn swap(&mut self, a: usize, b: usize) -> Result<()>;
}

/// Ranges at or below this size are finished with insertion sort.
const INSERTION_THRESHOLD: usize = 12;

/// Sort elements `0..len` of `access` in place (not stable).
pub fn quick_sort<A: SortAccess + ?Sized>(access: &mut A, len: usize) -> Result<()> {
    sort_range(access, 0, len)
}

fn sort_range<A: SortAccess + ?Sized>(access: &mut A, mut lo: usize, mut hi: usize) -> Result<()> {
    while hi - lo > INSERTION_THRESHOLD {
        let pivot = partition(access, lo, hi)?;
        // recurse into the smaller side, loop on the larger to bound stack depth
        if pivot - lo < hi - pivot {
            sort_range(access, lo, pivot)?;
            lo = pivot + 1;
        } else {
            sort_range(access, pivot + 1, hi)?;
            hi = pivot;
        }
    }
    insertion_sort(access, lo, hi)
}

/// Partition `lo..hi` around a median-of-three pivot; returns its final index.
fn partition<A: SortAccess + ?Sized>(access: &mut A, lo: usize, hi: usize) -> Result<usize> {
    let last = hi - 1;
    let mid = lo + (hi - lo) / 2;

    // order lo <= mid <= last, then park the median at `last`
    if access.compare(mid, lo)? == Ordering::Less {
        access.swap(mid, lo)?;
    }
    if access.compare(last, mid)? == Ordering::Less {
        access.swap(last, mid)?;
        if access.compare(mid, lo)? == Ordering::Less {
            access.swap(mid, lo)?;
        }
    }
    access.swap(mid, last)?;

    let mut store = lo;
    for i in lo..last {
        if access.compare(i, last)? == Ordering::Less {
            if i != store {
                access.swap(i, store)?;
            }
            store += 1;
        }
    }
    if store != last {
        access.swap(store, last)?;
    }
    Ok(store)
}

fn insertion_sort<A: SortAccess + ?Sized>(access: &mut A, lo: usize, hi: usize) -> Result<()> {
    for i in (lo + 1)..hi {
        let mut j = i;
        while j > lo && access.compare(j - 1, j)? == Ordering::Greater {
            access.swap(j - 1, j)?;
            j -= 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    struct VecAccess {
        data: Vec<i64>,
        swaps: usize,
    }

    impl SortAccess for VecAccess {
        fn compare(&mut self, a: usize, b: usize) -> Result<Ordering> {
            Ok(self.data[a].cmp(&self.data[b]))
        }

        fn swap(&mut self, a: usize, b: usize) -> Result<()> {
            self.swaps += 1;
            self.data.swap(a, b);
            Ok(())
        }
    }

    #[test]
    fn test_sorts_shuffled_input() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in [0usize, 1, 2, 5, 12, 13, 100, 1000] {
            let mut data: Vec<i64> = (0..len as i64).collect();
            data.shuffle(&mut rng);
            let mut access = VecAccess { data, swaps: 0 };
            quick_sort(&mut access, len).unwrap();
            assert_eq!(access.data, (0..len as i64).collect::<Vec<_>>(), "len {}", len);
        }
    }

    #[test]
    fn test_sorts_duplicates_and_reversed() {
        let mut access = VecAccess {
            data: (0..200).map(|i| (200 - i) % 7).collect(),
            swaps: 0,
        };
        quick_sort(&mut access, 200).unwrap();
        assert!(access.data.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sorted_input_needs_few_swaps() {
        let mut access = VecAccess {
            data: (0..5).collect(),
            swaps: 0,
        };
        quick_sort(&mut access, 5).unwrap();
        assert_eq!(access.swaps, 0);
    }
}
