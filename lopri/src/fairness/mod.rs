pub mod dist;
pub mod nth_element;

use crate::helpe::*;
use self::nth_element::nth_element;

/// How the single-link solver finds the waterlevel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SolveMethod {
    /// Sort every demand, then sweep. Simple; used for testing and
    /// comparison.
    FullSort,
    /// Partition with an nth-element primitive and only ever sort the
    /// slices that matter. The fast path.
    PartialSort,
}

#[derive(Debug, Copy, Clone)]
pub struct MaxMinFairnessOptions {
    pub solve_method:           SolveMethod,
    pub enable_tiny_flow_opt:   bool,
}

impl Default for MaxMinFairnessOptions {
    fn default() -> Self {
        Self {
            solve_method:           SolveMethod::PartialSort,
            enable_tiny_flow_opt:   true,
        }
    }
}

/// Computes max-min fair allocations of a shared link capacity to
/// individual demands: find the largest waterlevel `w` such that
/// `Σ min(w, d_i) ≤ capacity`.
///
/// The struct only exists to own reusable scratch; it carries no result
/// state between calls. Scratch is resized up but never shrunk, so
/// memory tracks the peak input size.
pub struct SingleLinkMaxMinFairnessProblem {
    options:            MaxMinFairnessOptions,
    sorted_demands_buf: Vec<Bps>,
}

impl Default for SingleLinkMaxMinFairnessProblem {
    fn default() -> Self {
        Self::new(MaxMinFairnessOptions::default())
    }
}

impl SingleLinkMaxMinFairnessProblem {
    pub fn new(options: MaxMinFairnessOptions) -> Self {
        Self {
            options,
            sorted_demands_buf: vec![],
        }
    }

    /// Computes the max-min fair waterlevel.
    pub fn compute_waterlevel(&mut self, mut capacity: Bps, demands: &[Bps]) -> Bps {
        debug_assert!(capacity >= 0, "negative capacity");

        let num_demands = demands.len() as Bps;

        // Demands no bigger than capacity / num_demands are guaranteed
        // satisfiable: slice them out up front, charge them to capacity,
        // and pre-seed the waterlevel with their maximum.
        let mut tiny_demand_thresh = capacity / num_demands.max(1);
        if !self.options.enable_tiny_flow_opt {
            tiny_demand_thresh = -1;
        }

        self.sorted_demands_buf.resize(demands.len(), 0);
        let mut num_unfiltered = 0;
        let mut waterlevel = 0;
        for &d in demands {
            self.sorted_demands_buf[num_unfiltered] = d;
            if d <= tiny_demand_thresh {
                capacity -= d;
                waterlevel = waterlevel.max(d);
            } else {
                num_unfiltered += 1;
            }
        }
        let capacity_without_tiny = capacity;
        capacity -= waterlevel * num_unfiltered as Bps;

        let window = &mut self.sorted_demands_buf[..num_unfiltered];
        match self.options.solve_method {
            SolveMethod::FullSort => solve_full_sort(capacity, waterlevel, window),
            SolveMethod::PartialSort => {
                PartialSortAllocator::new(capacity_without_tiny, capacity, waterlevel, window)
                    .compute_waterlevel()
            }
        }
    }

    /// Fills `allocations` with each demand's share under `waterlevel`.
    pub fn set_allocations(waterlevel: Bps, demands: &[Bps], allocations: &mut Vec<Bps>) {
        allocations.clear();
        allocations.extend(demands.iter().map(|&d| waterlevel.min(d)));
    }
}

// Simpler, slower allocation method. Used for testing / comparison.
fn solve_full_sort(mut capacity: Bps, mut waterlevel: Bps, sorted_demands: &mut [Bps]) -> Bps {
    sorted_demands.sort_unstable();

    // Progressively raise the waterlevel from one demand to the next
    // while the whole unsatisfied population can afford the step.
    let mut next = 0;
    while next < sorted_demands.len() {
        let delta = sorted_demands[next] - waterlevel;
        let num_unsatisfied = (sorted_demands.len() - next) as Bps;

        let ask = delta * num_unsatisfied;
        if ask <= capacity {
            waterlevel += delta;
            capacity -= ask;
            next += 1;
        } else {
            // No more demands can be fully satisfied: divide the rest
            // evenly across the unsatisfied ones.
            waterlevel += capacity / num_unsatisfied;
            break;
        }
    }

    waterlevel
}

/// Faster allocation method, based on partial sorting.
///
/// The idea is to decide which demands are satisfiable without fully
/// sorting them. With demands split into `A = [lo, m]` and
/// `B = [m+1, n]` such that `max(A) ≤ min(B)`, if
/// `Σ(A − w) + (max(A) − w)·|B| ≤ residual` then all of A is satisfiable
/// and never needs sorting; conversely if A alone is unaffordable, B is
/// hopeless and never needs sorting either.
struct PartialSortAllocator<'a> {
    // The capacity as handed in (tiny demands already deducted); only
    // the invariant checker needs it.
    capacity:           Bps,
    sorted_demands:     &'a mut [Bps],
    // Current window of interest is [lower_limit, upper_limit], both
    // inclusive.
    //
    // Invariants:
    // 1. i > upper_limit  => demand(i) cannot be satisfied; it gets the
    //    final waterlevel.
    // 2. i < lower_limit  => demand(i) is satisfied and ≤ waterlevel.
    // 3. residual_capacity = capacity
    //                        - Σ[i < lower_limit] demand(i)
    //                        - waterlevel · (len - lower_limit)
    residual_capacity:  Bps,
    lower_limit:        isize, // inclusive
    upper_limit:        isize, // inclusive
    waterlevel:         Bps,
}

impl<'a> PartialSortAllocator<'a> {
    fn new(
        original_capacity: Bps,
        capacity: Bps,
        waterlevel: Bps,
        sorted_demands: &'a mut [Bps],
    ) -> Self {
        let upper_limit = sorted_demands.len() as isize - 1;
        Self {
            capacity: original_capacity,
            sorted_demands,
            residual_capacity: capacity,
            lower_limit: 0,
            upper_limit,
            waterlevel,
        }
    }

    fn compute_waterlevel(mut self) -> Bps {
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
            nth_element(&mut self.sorted_demands[lo..=hi], partition_idx - lo);

            // ask = Σ(A − w) + (max(A) − w) · |everything after A|
            let mut max_demand_a = 0;
            let mut ask = 0;
            for i in lo..=partition_idx {
                let d = self.sorted_demands[i];
                ask += d - self.waterlevel;
                max_demand_a = d; // the partition slot holds A's max
            }
            ask += (max_demand_a - self.waterlevel)
                * (self.sorted_demands.len() - partition_idx - 1) as Bps;

            if ask <= self.residual_capacity {
                // All of A fits. Raise the waterlevel and move on to B.
                self.waterlevel = max_demand_a;
                self.residual_capacity -= ask;
                self.lower_limit = partition_idx as isize + 1;
            } else if self.lower_limit == self.upper_limit {
                self.upper_limit = self.lower_limit - 1;
            } else {
                // Cannot afford A, so B is hopeless too. Keep searching
                // inside A.
                self.upper_limit = partition_idx as isize;
            }
        }
        debug_assert!(!self.invariants_violated());

        // Whatever remains is divided evenly across the unsatisfied
        // demands.
        let next_unsatisfied = self.lower_limit.max(self.upper_limit) as usize;
        if next_unsatisfied < self.sorted_demands.len() {
            self.waterlevel +=
                self.residual_capacity / (self.sorted_demands.len() - next_unsatisfied) as Bps;
        }

        self.waterlevel
    }

    fn invariants_violated(&self) -> bool {
        let mut found_violation = false;
        let lo = self.lower_limit as usize;

        for (i, &demand) in self.sorted_demands.iter().enumerate().skip(lo) {
            if demand < self.waterlevel {
                found_violation = true;
                error!(demand, i, waterlevel = self.waterlevel, "demand < waterlevel");
            }
        }

        let mut sum_lower_demands = 0;
        for (i, &demand) in self.sorted_demands.iter().enumerate().take(lo) {
            sum_lower_demands += demand;
            if demand > self.waterlevel {
                found_violation = true;
                error!(demand, i, waterlevel = self.waterlevel, "demand > waterlevel");
            }
        }

        let expected_residual_capacity = self.capacity
            - sum_lower_demands
            - self.waterlevel * (self.sorted_demands.len() - lo) as Bps;
        if self.residual_capacity != expected_residual_capacity {
            found_violation = true;
            error!(
                residual_capacity = self.residual_capacity,
                expected_residual_capacity, "residual capacity mismatch"
            );
        }

        found_violation
    }
}
