use rand::Rng;

// Windows at or below this size skip pivoting and get sorted outright.
const SMALL_SORT_THRESHOLD: usize = 16;

/// Partial sort in the `nth_element` style: after the call, `data[nth]`
/// holds the value a full ascending sort would place there, every slot
/// before `nth` holds a value ≤ it, and every slot after holds a value
/// ≥ it. Nothing else about the order is promised.
pub fn nth_element<T: Copy + PartialOrd>(data: &mut [T], nth: usize) {
    nth_element_by(data, nth, &|a, b| a < b);
}

/// Comparator-driven form of [`nth_element`].
///
/// This is a hybrid quickselect. Large windows pick a median-of-three
/// pivot from random samples and three-way partition *into a scratch
/// buffer* (one pass, no swaps), then copy back and recurse into the
/// side holding `nth`; small windows fall through to an insertion sort.
/// The scratch buffer grows to the first window's size and is reused
/// across rounds.
pub fn nth_element_by<T, F>(data: &mut [T], nth: usize, less: &F)
where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    assert!(nth < data.len(), "nth out of bounds");

    let mut scratch: Vec<T> = Vec::with_capacity(data.len());
    let mut rng = rand::thread_rng();

    // The window [lo, hi) always contains the final value of data[nth].
    let mut lo = 0usize;
    let mut hi = data.len();
    while hi - lo > SMALL_SORT_THRESHOLD {
        let pivot = median_of_three(&data[lo..hi], &mut rng, less);
        let (num_less, num_equal) = partition_into(&data[lo..hi], pivot, &mut scratch, less);
        data[lo..hi].copy_from_slice(&scratch);

        let less_end = lo + num_less;
        let equal_end = less_end + num_equal;
        if nth < less_end {
            hi = less_end;
        } else if nth < equal_end {
            // nth landed inside the pivot run; it is already final.
            return;
        } else {
            lo = equal_end;
        }
    }
    small_sort(&mut data[lo..hi], less);
}

// The middle of three randomly sampled window elements. Random sampling
// keeps adversarial input orders from degrading the select to O(n^2).
fn median_of_three<T, F>(window: &[T], rng: &mut impl Rng, less: &F) -> T
where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    let a = window[rng.gen_range(0..window.len())];
    let b = window[rng.gen_range(0..window.len())];
    let c = window[rng.gen_range(0..window.len())];
    if less(&a, &b) {
        if less(&b, &c) {
            b
        } else if less(&a, &c) {
            c
        } else {
            a
        }
    } else if less(&a, &c) {
        a
    } else if less(&b, &c) {
        c
    } else {
        b
    }
}

// Three-way partition of `src` around `pivot` into `out`: strictly
// smaller values first, then the pivot-equal run, then the rest.
// Returns (num_less, num_equal). The equal run guarantees progress even
// on constant inputs.
fn partition_into<T, F>(src: &[T], pivot: T, out: &mut Vec<T>, less: &F) -> (usize, usize)
where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    out.clear();
    for x in src {
        if less(x, &pivot) {
            out.push(*x);
        }
    }
    let num_less = out.len();
    for x in src {
        if !less(x, &pivot) && !less(&pivot, x) {
            out.push(*x);
        }
    }
    let num_equal = out.len() - num_less;
    for x in src {
        if less(&pivot, x) {
            out.push(*x);
        }
    }
    debug_assert!(out.len() == src.len(), "partition dropped elements");

    (num_less, num_equal)
}

fn small_sort<T, F>(window: &mut [T], less: &F)
where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    for i in 1..window.len() {
        let v = window[i];
        let mut j = i;
        while j > 0 && less(&v, &window[j - 1]) {
            window[j] = window[j - 1];
            j -= 1;
        }
        window[j] = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn check_against_full_sort(data: &[i64], nth: usize) {
        let mut sorted = data.to_vec();
        sorted.sort_unstable();

        let mut got = data.to_vec();
        nth_element(&mut got, nth);

        assert_eq!(got[nth], sorted[nth], "nth = {nth}, data = {data:?}");
        assert!(
            got[..nth].iter().all(|v| v <= &got[nth]),
            "nth = {nth}, data = {data:?}"
        );
        assert!(
            got[nth + 1..].iter().all(|v| v >= &got[nth]),
            "nth = {nth}, data = {data:?}"
        );
    }

    fn random_data(n: usize, seed: u64) -> Vec<i64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(0..55)).collect()
    }

    #[test]
    fn matches_full_sort_exhaustively() {
        for data in [
            random_data(1, 1),
            random_data(10, 2),
            random_data(111, 3),
            random_data(301, 4),
            vec![0; 257],
            vec![4981; 30],
        ] {
            for nth in 0..data.len() {
                check_against_full_sort(&data, nth);
            }
        }
    }

    #[test]
    fn matches_full_sort_sampled() {
        let data = random_data(5000, 5);
        for nth in [0, 1, 555, 1123, 4999] {
            check_against_full_sort(&data, nth);
        }
        let same = vec![4i64; 5000];
        for nth in [0, 1, 555, 1123, 4999] {
            check_against_full_sort(&same, nth);
        }
    }

    #[test]
    fn custom_comparator_selects_by_key() {
        let mut data = vec![(3, 'c'), (1, 'a'), (2, 'b'), (5, 'e'), (4, 'd')];
        nth_element_by(&mut data, 2, &|a: &(i32, char), b: &(i32, char)| a.0 < b.0);
        assert_eq!(data[2].0, 3);
    }

    proptest! {
        #[test]
        fn agrees_with_full_sort(data in prop::collection::vec(-1000i64..1000, 1..200),
                                 nth_seed in any::<prop::sample::Index>()) {
            let nth = nth_seed.index(data.len());
            check_against_full_sort(&data, nth);
        }
    }
}
