pub mod greedy;
pub mod hashing;
pub mod iface;
pub mod knapsack;
pub mod largest_first;
pub mod sigcomm20;

use crate::helpe::*;
use self::hashing::HashingDowngradeSelector;
use self::iface::{Differential, DowngradeSelectorImpl};
use self::knapsack::KnapsackSolverDowngradeSelector;
use self::largest_first::LargestFirstDowngradeSelector;
use self::sigcomm20::HeypSigcomm20DowngradeSelector;

/// The selector algorithms the dispatcher knows how to build.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DowngradeSelectorType {
    Hashing,
    HeypSigcomm20,
    KnapsackSolver,
    LargestFirst,
}

impl std::str::FromStr for DowngradeSelectorType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DS_HASHING" => Ok(Self::Hashing),
            "DS_HEYP_SIGCOMM20" => Ok(Self::HeypSigcomm20),
            "DS_KNAPSACK_SOLVER" => Ok(Self::KnapsackSolver),
            "DS_LARGEST_FIRST" => Ok(Self::LargestFirst),
            other => Err(ConfigError { name: other.into() }),
        }
    }
}

/// Dispatcher configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct DowngradeConfig {
    pub selector_type:          DowngradeSelectorType,
    /// Roll children up by job and downgrade whole jobs at a time.
    pub downgrade_jobs:         bool,
    pub fv_source:              FVSource,
    /// Branch-and-bound budget for the knapsack selector; ignored by the
    /// other selectors.
    pub knapsack_time_limit:    Option<Duration>,
}

impl DowngradeConfig {
    pub fn new(selector_type: DowngradeSelectorType) -> Self {
        Self {
            selector_type,
            downgrade_jobs: false,
            fv_source: FVSource::PredictedDemand,
            knapsack_time_limit: None,
        }
    }
}

/// Facade over the selector family: builds the configured selector and,
/// when `downgrade_jobs` is on, runs it over the job-level view and
/// projects each job decision back onto that job's hosts.
pub struct DowngradeSelector {
    downgrade_jobs: bool,
    imp:            Box<dyn DowngradeSelectorImpl>,
}

impl DowngradeSelector {
    pub fn new(config: DowngradeConfig) -> Self {
        let imp: Box<dyn DowngradeSelectorImpl> = match config.selector_type {
            DowngradeSelectorType::Hashing => {
                Box::new(Differential::new(HashingDowngradeSelector::default()))
            }
            DowngradeSelectorType::HeypSigcomm20 => {
                Box::new(HeypSigcomm20DowngradeSelector::new(config.fv_source))
            }
            DowngradeSelectorType::KnapsackSolver => Box::new(
                KnapsackSolverDowngradeSelector::new(config.fv_source, config.knapsack_time_limit),
            ),
            DowngradeSelectorType::LargestFirst => {
                Box::new(LargestFirstDowngradeSelector::new(config.fv_source))
            }
        };
        Self {
            downgrade_jobs: config.downgrade_jobs,
            imp,
        }
    }

    /// Picks the LOPRI children for the next enforcement interval. The
    /// bitmap is indexed by `agg_info.children`.
    pub fn pick_lopri_children(&mut self, agg_info: &AggInfo, want_frac_lopri: f64) -> Vec<bool> {
        if !self.downgrade_jobs {
            let view = TransparentView::new(agg_info);
            return self.imp.pick_lopri_children(&view, want_frac_lopri);
        }

        let view = JobLevelView::new(agg_info);
        let selection = self.imp.pick_lopri_children(&view, want_frac_lopri);
        let job_of_host = view.job_index_of_host();
        debug_assert!(job_of_host.len() == agg_info.children.len());

        let mut host_selection = vec![false; agg_info.children.len()];
        for (i, &j) in job_of_host.iter().enumerate() {
            host_selection[i] = selection[j];
        }
        host_selection
    }
}

/// Fraction of the parent's demand that the rate limits force through
/// LOPRI: whatever the HIPRI limit cannot carry, up to what the combined
/// limits admit. Zero when LOPRI is disabled or HIPRI alone suffices.
pub fn frac_admitted_at_lopri(
    parent: &FlowInfo,
    hipri_rate_limit_bps: Bps,
    lopri_rate_limit_bps: Bps,
) -> f64 {
    let maybe_admit = lopri_rate_limit_bps > 0
        && parent.predicted_demand_bps > 0
        && parent.predicted_demand_bps > hipri_rate_limit_bps;
    if maybe_admit {
        let total_rate_limit_bps = (hipri_rate_limit_bps + lopri_rate_limit_bps) as f64;
        let total_admitted_demand_bps =
            (parent.predicted_demand_bps as f64).min(total_rate_limit_bps);
        return 1.0 - hipri_rate_limit_bps as f64 / total_admitted_demand_bps;
    }
    0.0
}

/// Possibly raises `lopri_frac` so that at least the smallest child can
/// be admitted through LOPRI, to probe whether LOPRI capacity is usable.
///
/// The bump only happens when the parent sits between the HIPRI limit
/// and `demand_multiplier` times it, there are children, and the
/// smallest child actually fits under the LOPRI limit. The 1.00001
/// factor compensates for rounding when the fraction is later multiplied
/// back with the parent demand.
pub fn frac_admitted_at_lopri_to_probe(
    agg_info: &AggInfo,
    hipri_rate_limit_bps: Bps,
    lopri_rate_limit_bps: Bps,
    demand_multiplier: f64,
    lopri_frac: f64,
) -> f64 {
    let should_debug = debug_qos_selection();

    if should_debug {
        debug!(agg_info = ?agg_info, "parent and children");
        debug!(hipri_rate_limit_bps, lopri_rate_limit_bps, "cur limits");
        debug!(demand_multiplier, lopri_frac, "initial lopri_frac");
    }

    let parent_demand_bps = agg_info.parent.predicted_demand_bps;
    if parent_demand_bps <= 0 || parent_demand_bps < hipri_rate_limit_bps {
        if should_debug {
            debug!(
                parent_demand_bps,
                hipri_rate_limit_bps, "predicted demand < hipri rate limit"
            );
        }
        return lopri_frac;
    }
    if parent_demand_bps as f64 > demand_multiplier * hipri_rate_limit_bps as f64 {
        if should_debug {
            debug!(
                parent_demand_bps,
                hipri_rate_limit_bps,
                "predicted demand > demand multiplier * hipri rate limit"
            );
        }
        return lopri_frac;
    }
    if agg_info.children.is_empty() {
        if should_debug {
            debug!("no children");
        }
        return lopri_frac;
    }

    let smallest_child_demand_bps = agg_info
        .children
        .iter()
        .map(|c| c.predicted_demand_bps)
        .min()
        .unwrap_or(0);

    if smallest_child_demand_bps > lopri_rate_limit_bps {
        if should_debug {
            debug!(
                smallest_child_demand_bps,
                lopri_rate_limit_bps, "smallest child demand > lopri rate limit"
            );
        }
        return lopri_frac;
    }

    let revised_frac = 1.00001 /* account for rounding error */
        * smallest_child_demand_bps as f64
        / parent_demand_bps as f64;
    if revised_frac > lopri_frac {
        if should_debug {
            debug!(lopri_frac, revised_frac, "revised lopri frac");
        }
        return revised_frac;
    } else if should_debug {
        debug!(
            lopri_frac,
            revised_frac, "existing lopri frac is larger than needed for probing"
        );
    }
    lopri_frac
}
