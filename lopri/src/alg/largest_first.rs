use crate::helpe::*;
use super::greedy::{greedy_assign_to_minimize_gap, sort_children_by_dec_demand, GreedyAssignArgs};
use super::iface::DowngradeSelectorImpl;

/// Starts from an empty LOPRI bin and moves the biggest demands in until
/// the bin reaches `want_frac · total_demand`. History-free: the same
/// snapshot always yields the same bitmap.
pub struct LargestFirstDowngradeSelector {
    source: FVSource,
}

impl LargestFirstDowngradeSelector {
    pub fn new(source: FVSource) -> Self {
        Self { source }
    }
}

impl DowngradeSelectorImpl for LargestFirstDowngradeSelector {
    fn pick_lopri_children(&mut self, agg_info: &dyn AggView, want_frac_lopri: f64) -> Vec<bool> {
        let should_debug = debug_qos_selection();
        let agg_children = agg_info.children();

        if should_debug {
            debug!(parent = ?agg_info.parent(), "largest-first selector input");
            debug!(children = ?agg_children, "children");
        }

        let total_demand: Bps = agg_children.iter().map(|c| c.volume(self.source)).sum();

        if total_demand == 0 {
            if should_debug {
                debug!("no demand");
            }
            // Don't use LOPRI if all demand is zero.
            return vec![false; agg_children.len()];
        }

        let children_sorted_by_dec_demand = sort_children_by_dec_demand(agg_info, self.source);

        let mut lopri_children = vec![false; agg_children.len()];
        if should_debug {
            debug!("move from HIPRI to LOPRI");
        }
        let want_demand = (want_frac_lopri * total_demand as f64) as Bps;
        greedy_assign_to_minimize_gap::<true>(
            GreedyAssignArgs {
                cur_demand: 0,
                want_demand,
                children_sorted_by_dec_demand: &children_sorted_by_dec_demand,
                agg_info,
                source: self.source,
            },
            &mut lopri_children,
            true,
        );

        if should_debug {
            debug!(bitmap = %format_bitmap(&lopri_children), "picked LOPRI assignment");
        }

        lopri_children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(demands: &[Bps]) -> AggInfo {
        AggInfo {
            parent: FlowInfo::default(),
            children: demands
                .iter()
                .enumerate()
                .map(|(i, &d)| FlowInfo {
                    flow: FlowKey {
                        host_id: i as u64,
                        ..Default::default()
                    },
                    predicted_demand_bps: d,
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn pick(demands: &[Bps], want_frac: f64) -> Vec<bool> {
        let info = agg(demands);
        let view = TransparentView::new(&info);
        LargestFirstDowngradeSelector::new(FVSource::PredictedDemand)
            .pick_lopri_children(&view, want_frac)
    }

    #[test]
    fn zero_demand_stays_hipri() {
        assert_eq!(pick(&[0, 0, 0], 0.9), vec![false, false, false]);
    }

    #[test]
    fn takes_the_largest_demand_first() {
        // total = 20, want = 10: the 10 fits exactly; nothing else moves.
        assert_eq!(pick(&[10, 5, 3, 2], 0.5), vec![true, false, false, false]);
    }

    #[test]
    fn stops_once_the_largest_does_not_fit() {
        // total = 20, want = 5: flipping 11 would overshoot by more than
        // the shortfall, and largest-first refuses to look further down.
        assert_eq!(pick(&[11, 5, 3, 1], 0.25), vec![false, false, false, false]);
    }

    #[test]
    fn output_is_aligned_and_full_length() {
        let got = pick(&[1, 2, 3, 4, 5, 6], 0.5);
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn full_fraction_downgrades_everyone() {
        assert_eq!(pick(&[4, 3, 2, 1], 1.0), vec![true, true, true, true]);
    }
}
