use crate::helpe::*;
use super::nth_element::nth_element_by;
use super::{MaxMinFairnessOptions, SolveMethod};

/// A demand value with a fractional expected multiplicity: the demand is
/// expected to occur `expected_count` times, where the count came out of
/// a distribution and need not be whole.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ValCount {
    pub val:            f64,
    pub expected_count: f64,
}

fn val_less(lhs: &ValCount, rhs: &ValCount) -> bool {
    lhs.val < rhs.val
}

fn sum_counts(demands: &[ValCount]) -> f64 {
    demands.iter().map(|d| d.expected_count).sum()
}

/// Distributional twin of
/// [`SingleLinkMaxMinFairnessProblem`](super::SingleLinkMaxMinFairnessProblem):
/// every demand carries an expected multiplicity and all arithmetic runs
/// in floating point. Population sizes become count sums; the algorithm
/// shape is otherwise unchanged.
pub struct SingleLinkMaxMinFairnessDistProblem {
    options:            MaxMinFairnessOptions,
    sorted_demands_buf: Vec<ValCount>,
}

impl Default for SingleLinkMaxMinFairnessDistProblem {
    fn default() -> Self {
        Self::new(MaxMinFairnessOptions::default())
    }
}

impl SingleLinkMaxMinFairnessDistProblem {
    pub fn new(options: MaxMinFairnessOptions) -> Self {
        Self {
            options,
            sorted_demands_buf: vec![],
        }
    }

    /// Computes the max-min fair waterlevel.
    pub fn compute_waterlevel(&mut self, mut capacity: f64, demands: &[ValCount]) -> f64 {
        debug_assert!(capacity >= 0.0, "negative capacity");

        let num_demands = demands.len();

        let mut tiny_demand_thresh = capacity / num_demands.max(1) as f64;
        if !self.options.enable_tiny_flow_opt {
            tiny_demand_thresh = -1.0;
        }

        self.sorted_demands_buf.resize(num_demands, ValCount::default());
        let mut num_unfiltered = 0;
        let mut unfiltered_count = 0.0;
        let mut waterlevel: f64 = 0.0;
        for &d in demands {
            self.sorted_demands_buf[num_unfiltered] = d;
            if d.val <= tiny_demand_thresh {
                capacity -= d.val * d.expected_count;
                waterlevel = waterlevel.max(d.val);
            } else {
                num_unfiltered += 1;
                unfiltered_count += d.expected_count;
            }
        }
        let capacity_without_tiny = capacity;
        capacity -= waterlevel * unfiltered_count;

        let window = &mut self.sorted_demands_buf[..num_unfiltered];
        match self.options.solve_method {
            SolveMethod::FullSort => solve_full_sort(capacity, waterlevel, window),
            SolveMethod::PartialSort => {
                DistPartialSortAllocator::new(capacity_without_tiny, capacity, waterlevel, window)
                    .compute_waterlevel()
            }
        }
    }
}

// Simpler, slower allocation method. Used for testing / comparison.
fn solve_full_sort(mut capacity: f64, mut waterlevel: f64, sorted_demands: &mut [ValCount]) -> f64 {
    sorted_demands.sort_unstable_by(|a, b| a.val.total_cmp(&b.val));

    // expected_ge_count[i] = Σ counts of demands at or above slot i.
    let mut expected_ge_count = vec![0.0; sorted_demands.len()];
    let mut cum_count = 0.0;
    for i in (0..sorted_demands.len()).rev() {
        cum_count += sorted_demands[i].expected_count;
        expected_ge_count[i] = cum_count;
    }

    let mut next = 0;
    while next < sorted_demands.len() {
        let delta = sorted_demands[next].val - waterlevel;
        let num_unsatisfied = expected_ge_count[next];

        let ask = delta * num_unsatisfied;
        if ask <= capacity {
            waterlevel += delta;
            capacity -= ask;
            next += 1;
        } else {
            waterlevel += capacity / num_unsatisfied;
            break;
        }
    }

    waterlevel
}

/// Partial-sort allocator over distributional demands. Same window
/// discipline as the integer allocator, with two count-keeping twists:
/// `|B|` in the ask formula becomes a count sum, and demands ruled out
/// past the upper limit fold their counts into `count_above_upper_limit`
/// so later asks still price them in.
struct DistPartialSortAllocator<'a> {
    capacity:               f64,
    sorted_demands:         &'a mut [ValCount],
    // Current window of interest is [lower_limit, upper_limit], both
    // inclusive.
    //
    // Invariants:
    // 1. i > upper_limit  => demand(i) cannot be satisfied; it gets the
    //    final waterlevel.
    // 2. i < lower_limit  => demand(i) is satisfied and ≤ waterlevel.
    // 3. residual_capacity = capacity
    //                        - Σ[i < lower_limit] val(i)·count(i)
    //                        - waterlevel · Σ[i ≥ lower_limit] count(i)
    // 4. count_above_upper_limit = Σ[i > upper_limit] count(i)
    residual_capacity:          f64,
    lower_limit:                isize, // inclusive
    upper_limit:                isize, // inclusive
    count_above_upper_limit:    f64,
    waterlevel:                 f64,
}

impl<'a> DistPartialSortAllocator<'a> {
    fn new(
        original_capacity: f64,
        capacity: f64,
        waterlevel: f64,
        sorted_demands: &'a mut [ValCount],
    ) -> Self {
        let upper_limit = sorted_demands.len() as isize - 1;
        Self {
            capacity: original_capacity,
            sorted_demands,
            residual_capacity: capacity,
            lower_limit: 0,
            upper_limit,
            count_above_upper_limit: 0.0,
            waterlevel,
        }
    }

    fn compute_waterlevel(mut self) -> f64 {
        if self.sorted_demands.is_empty() {
            return self.waterlevel;
        }

        while self.upper_limit >= self.lower_limit {
            debug_assert!(!self.invariants_violated());

            // Partition so that A = [lower_limit, partition_idx] and
            // B = [partition_idx + 1, upper_limit].
            let lo = self.lower_limit as usize;
            let hi = self.upper_limit as usize;
            let partition_idx = lo + (hi - lo) / 2;
            nth_element_by(
                &mut self.sorted_demands[lo..=hi],
                partition_idx - lo,
                &val_less,
            );

            // ask = Σ(A − w)·count + (max(A) − w) · counts past A
            let mut max_demand_a = 0.0;
            let mut ask = 0.0;
            for i in lo..=partition_idx {
                let vc = self.sorted_demands[i];
                ask += (vc.val - self.waterlevel) * vc.expected_count;
                max_demand_a = vc.val; // the partition slot holds A's max
            }
            let expected_count_b = sum_counts(&self.sorted_demands[partition_idx + 1..=hi]);
            ask += (max_demand_a - self.waterlevel)
                * (expected_count_b + self.count_above_upper_limit);

            if ask <= self.residual_capacity {
                // All of A fits. Raise the waterlevel and move on to B.
                self.waterlevel = max_demand_a;
                self.residual_capacity -= ask;
                self.lower_limit = partition_idx as isize + 1;
            } else if self.lower_limit == self.upper_limit {
                self.count_above_upper_limit +=
                    sum_counts(&self.sorted_demands[lo..=hi]);
                self.upper_limit = self.lower_limit - 1;
            } else {
                // Cannot afford A, so B is hopeless too. Keep searching
                // inside A.
                self.count_above_upper_limit += expected_count_b;
                self.upper_limit = partition_idx as isize;
            }
        }
        debug_assert!(!self.invariants_violated());

        // Whatever remains is divided evenly across the unsatisfied
        // population (by expected count, not by slot count).
        let next_unsatisfied = self.lower_limit.max(self.upper_limit) as usize;
        if next_unsatisfied < self.sorted_demands.len() {
            self.waterlevel +=
                self.residual_capacity / sum_counts(&self.sorted_demands[next_unsatisfied..]);
        }

        self.waterlevel
    }

    fn invariants_violated(&self) -> bool {
        let mut found_violation = false;
        let lo = self.lower_limit as usize;
        let above = (self.upper_limit + 1) as usize;

        let sum_count_above_upper_limit = sum_counts(&self.sorted_demands[above..]);
        if (sum_count_above_upper_limit - self.count_above_upper_limit).abs() > 0.001 {
            found_violation = true;
            error!(
                count_above_upper_limit = self.count_above_upper_limit,
                expected = sum_count_above_upper_limit,
                "count above upper limit mismatch"
            );
        }

        for (i, d) in self.sorted_demands.iter().enumerate().skip(lo) {
            if d.val < self.waterlevel {
                found_violation = true;
                error!(demand = d.val, i, waterlevel = self.waterlevel, "demand < waterlevel");
            }
        }

        let mut sum_lower_demands = 0.0;
        for (i, d) in self.sorted_demands.iter().enumerate().take(lo) {
            sum_lower_demands += d.val * d.expected_count;
            if d.val > self.waterlevel {
                found_violation = true;
                error!(demand = d.val, i, waterlevel = self.waterlevel, "demand > waterlevel");
            }
        }

        let expected_residual_capacity = self.capacity
            - sum_lower_demands
            - self.waterlevel * sum_counts(&self.sorted_demands[lo..]);
        let tolerance = 1e-9 * self.capacity.abs().max(1.0);
        if (self.residual_capacity - expected_residual_capacity).abs() > tolerance {
            found_violation = true;
            error!(
                residual_capacity = self.residual_capacity,
                expected_residual_capacity, "residual capacity mismatch"
            );
        }

        found_violation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all_option_combos() -> Vec<MaxMinFairnessOptions> {
        let mut combos = vec![];
        for solve_method in [SolveMethod::FullSort, SolveMethod::PartialSort] {
            for enable_tiny_flow_opt in [false, true] {
                combos.push(MaxMinFairnessOptions {
                    solve_method,
                    enable_tiny_flow_opt,
                });
            }
        }
        combos
    }

    fn flow_demands(demands: &[f64]) -> Vec<ValCount> {
        demands
            .iter()
            .map(|&val| ValCount {
                val,
                expected_count: 1.0,
            })
            .collect()
    }

    fn assert_all(capacity: f64, demands: &[ValCount], want: f64) {
        for options in all_option_combos() {
            let got = SingleLinkMaxMinFairnessDistProblem::new(options)
                .compute_waterlevel(capacity, demands);
            assert!(
                (got - want).abs() < 1e-9,
                "got {got}, want {want}, capacity = {capacity}, options = {options:?}"
            );
        }
    }

    fn basic_demands() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 4.0, 5.0, 1.0, 2.0, 88.0, 1912.0],
            vec![3.0, 3.0, 9.0],
            vec![999999999.0, 2413541.0, 2351.0],
            vec![1.0, 2.0, 4.0, 8.0, 16.0, 64.0, 32.0, 256.0, 128.0, 2048.0, 512.0, 1024.0],
            vec![2.0, 3.0, 5.0, 7.0, 11.0, 13.0, 17.0, 19.0, 23.0, 29.0, 31.0, 37.0],
        ]
    }

    #[test]
    fn no_requests() {
        assert_all(0.0, &[], 0.0);
        assert_all(100.0, &[], 0.0);
    }

    #[test]
    fn all_zero() {
        assert_all(0.0, &flow_demands(&[0.0, 0.0, 0.0]), 0.0);
        assert_all(0.0, &flow_demands(&[0.0]), 0.0);
        assert_all(0.0, &flow_demands(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn all_satisfied() {
        for demands in basic_demands() {
            let capacity: f64 = demands.iter().sum();
            let max_demand = demands.iter().cloned().fold(0.0, f64::max);
            assert_all(capacity, &flow_demands(&demands), max_demand);
        }
    }

    #[test]
    fn all_very_satisfied() {
        for demands in basic_demands() {
            let capacity: f64 = demands.iter().sum::<f64>() * 13.0 + 10.0;
            let max_demand = demands.iter().cloned().fold(0.0, f64::max);
            assert_all(capacity, &flow_demands(&demands), max_demand);
        }
    }

    #[test]
    fn none_satisfied() {
        assert_all(5.0, &flow_demands(&[2.0, 5.0, 7.0]), 5.0 / 3.0);
    }

    #[test]
    fn half_satisfied() {
        assert_all(100.0, &flow_demands(&[7.0, 20.0, 23.0, 51.0, 299.0]), 25.0);
    }

    #[test]
    fn all_satisfied_frac() {
        let demands = [
            ValCount { val: 10.0, expected_count: 1.5 },
            ValCount { val: 20.0, expected_count: 1.0 },
        ];
        assert_all(35.0, &demands, 20.0);
    }

    #[test]
    fn barely_unsatisfied_frac() {
        let demands = [
            ValCount { val: 10.0, expected_count: 1.5 },
            ValCount { val: 20.0, expected_count: 1.0 },
        ];
        assert_all(34.0, &demands, 19.0);
    }

    #[test]
    fn all_very_satisfied_frac() {
        let demands = [
            ValCount { val: 10.0, expected_count: 1.5 },
            ValCount { val: 20.0, expected_count: 1.0 },
        ];
        assert_all(100.0, &demands, 20.0);
    }

    proptest! {
        // Both solve methods must agree (within float tolerance) on every
        // input, fractional counts included.
        #[test]
        fn methods_agree(capacity in 0.0f64..100_000.0,
                         demands in prop::collection::vec(
                             (0.0f64..10_000.0, 0.1f64..4.0)
                                 .prop_map(|(val, expected_count)| ValCount { val, expected_count }),
                             0..40)) {
            let results: Vec<f64> = all_option_combos()
                .into_iter()
                .map(|options| {
                    SingleLinkMaxMinFairnessDistProblem::new(options)
                        .compute_waterlevel(capacity, &demands)
                })
                .collect();
            for got in &results[1..] {
                prop_assert!((got - results[0]).abs() < 1e-6 * results[0].abs().max(1.0),
                             "{results:?}");
            }
        }
    }
}
