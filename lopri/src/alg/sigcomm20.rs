use crate::helpe::*;
use super::greedy::{greedy_assign_to_minimize_gap, sort_children_by_dec_demand, GreedyAssignArgs};
use super::iface::DowngradeSelectorImpl;

/// The SIGCOMM '20 hysteretic selector: seeds the LOPRI bin with the
/// children already flagged LOPRI in the snapshot, then greedily grows
/// whichever bin is short of its target. Children keep their class
/// unless moving them actually closes the gap, so assignments are stable
/// across intervals.
pub struct HeypSigcomm20DowngradeSelector {
    source: FVSource,
}

impl HeypSigcomm20DowngradeSelector {
    pub fn new(source: FVSource) -> Self {
        Self { source }
    }
}

impl DowngradeSelectorImpl for HeypSigcomm20DowngradeSelector {
    fn pick_lopri_children(&mut self, agg_info: &dyn AggView, want_frac_lopri: f64) -> Vec<bool> {
        let should_debug = debug_qos_selection();
        let agg_children = agg_info.children();

        if should_debug {
            debug!(parent = ?agg_info.parent(), "sigcomm20 selector input");
            debug!(children = ?agg_children, "children");
        }

        let mut lopri_children = vec![false; agg_children.len()];
        let mut total_demand: Bps = 0;
        let mut lopri_demand: Bps = 0;
        for (i, c) in agg_children.iter().enumerate() {
            total_demand += c.volume(self.source);
            if c.currently_lopri {
                lopri_children[i] = true;
                lopri_demand += c.volume(self.source);
            }
        }

        if total_demand == 0 {
            if should_debug {
                debug!("no demand");
            }
            // Don't use LOPRI if all demand is zero.
            return vec![false; agg_children.len()];
        }

        let children_sorted_by_dec_demand = sort_children_by_dec_demand(agg_info, self.source);

        if lopri_demand as f64 / total_demand as f64 > want_frac_lopri {
            if should_debug {
                debug!("move from LOPRI to HIPRI");
            }
            let hipri_demand = total_demand - lopri_demand;
            let want_demand = ((1.0 - want_frac_lopri) * total_demand as f64) as Bps;
            greedy_assign_to_minimize_gap::<false>(
                GreedyAssignArgs {
                    cur_demand: hipri_demand,
                    want_demand,
                    children_sorted_by_dec_demand: &children_sorted_by_dec_demand,
                    agg_info,
                    source: self.source,
                },
                &mut lopri_children,
                false,
            );
        } else {
            if should_debug {
                debug!("move from HIPRI to LOPRI");
            }
            let want_demand = (want_frac_lopri * total_demand as f64) as Bps;
            greedy_assign_to_minimize_gap::<true>(
                GreedyAssignArgs {
                    cur_demand: lopri_demand,
                    want_demand,
                    children_sorted_by_dec_demand: &children_sorted_by_dec_demand,
                    agg_info,
                    source: self.source,
                },
                &mut lopri_children,
                false,
            );
        }

        if should_debug {
            debug!(bitmap = %format_bitmap(&lopri_children), "picked LOPRI assignment");
        }

        lopri_children
    }
}
