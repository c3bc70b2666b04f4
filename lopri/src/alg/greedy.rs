use crate::helpe::*;

/// Inputs for [`greedy_assign_to_minimize_gap`].
pub struct GreedyAssignArgs<'a> {
    /// Sum of volumes for children currently in the bin being grown.
    pub cur_demand:                     Bps,
    /// Desired sum of volumes for that bin.
    pub want_demand:                    Bps,
    pub children_sorted_by_dec_demand:  &'a [usize],
    pub agg_info:                       &'a dyn AggView,
    pub source:                         FVSource,
}

/// Greedily partitions children into two bins, flipping one child at a
/// time (largest demand first) to close the gap between `cur_demand` and
/// `want_demand`.
///
/// `STATE_TO_INCREASE` says which bin is being grown: `true` grows LOPRI
/// demand, `false` grows HIPRI, so the one routine serves both the
/// downgrade and the upgrade direction.
///
/// A flip that overshoots the goal is taken only when the overshoot is
/// no worse than the shortfall of stopping (the `exceeds_twice_gap`
/// test). With `punish_only_largest`, the scan stops at the first child
/// that does not fit cleanly; otherwise smaller children further down
/// the order still get a chance to fill the gap.
pub fn greedy_assign_to_minimize_gap<const STATE_TO_INCREASE: bool>(
    mut args: GreedyAssignArgs<'_>,
    lopri_children: &mut [bool],
    punish_only_largest: bool,
) {
    let children = args.agg_info.children();
    for (i, &child_i) in args.children_sorted_by_dec_demand.iter().enumerate() {
        if lopri_children[child_i] == STATE_TO_INCREASE {
            continue; // child already belongs to our bin, don't flip
        }
        // Try to flip child_i to our bin.
        let next_demand = args.cur_demand + children[child_i].volume(args.source);

        if next_demand > args.want_demand {
            let exceeds_twice_gap = next_demand > 2 * args.want_demand - args.cur_demand;

            if punish_only_largest {
                if !exceeds_twice_gap {
                    // safe to flip
                    lopri_children[child_i] = STATE_TO_INCREASE;
                    args.cur_demand = next_demand;
                }
                return;
            }

            // Don't flip child_i if there are more children with smaller
            // demands to flip.
            let have_children_with_less_demand =
                i < args.children_sorted_by_dec_demand.len() - 1;

            if have_children_with_less_demand || exceeds_twice_gap {
                continue; // flipping child_i overshoots the goal
            }
        }
        // Safe to flip child_i.
        lopri_children[child_i] = STATE_TO_INCREASE;
        args.cur_demand = next_demand;
    }
}

/// Child indices ordered by decreasing volume; ties broken by
/// descending index so later children are punished first.
pub fn sort_children_by_dec_demand(agg_info: &dyn AggView, source: FVSource) -> Vec<usize> {
    let children = agg_info.children();
    (0..children.len())
        .sorted_unstable_by(|&lhs, &rhs| {
            let lhs_demand = children[lhs].volume(source);
            let rhs_demand = children[rhs].volume(source);
            rhs_demand.cmp(&lhs_demand).then_with(|| rhs.cmp(&lhs))
        })
        .collect()
}
