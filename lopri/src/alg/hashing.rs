use crate::helpe::*;
use super::iface::{DiffDowngradeSelectorImpl, DowngradeDiff};

/// The consistent-hashing selector: children are LOPRI iff their host id
/// falls inside the ring's current arc. Between successive calls only
/// the hosts on the rotated piece of the arc change class, so churn is
/// proportional to the change in fraction, not to the child count.
#[derive(Debug, Default)]
pub struct HashingDowngradeSelector {
    lopri: HashRing,
}

impl HashingDowngradeSelector {
    /// Membership probe against the current LOPRI arc.
    pub fn is_lopri(&self, child_id: u64) -> bool {
        self.lopri.matching_ranges().contains(child_id)
    }
}

impl DiffDowngradeSelectorImpl for HashingDowngradeSelector {
    fn pick_children(&mut self, agg_info: &dyn AggView, want_frac_lopri: f64) -> DowngradeDiff {
        let should_debug = debug_qos_selection();

        if should_debug {
            debug!(parent = ?agg_info.parent(), "hashing selector input");
            debug!(ring = %self.lopri, "initial lopri ring");
        }

        let ring_diff = self.lopri.update_frac(want_frac_lopri);

        if should_debug {
            debug!(ring = %self.lopri, diff = %ring_diff, "revised lopri ring");
        }

        let mut ranges = Vec::with_capacity(2);
        if !ring_diff.diff.a.is_empty() {
            ranges.push(ring_diff.diff.a);
        }
        if !ring_diff.diff.b.is_empty() {
            ranges.push(ring_diff.diff.b);
        }
        let ids = UnorderedIds {
            ranges,
            points: vec![],
        };

        match ring_diff.kind {
            RangeDiffKind::Add => DowngradeDiff {
                to_downgrade: ids,
                to_upgrade: UnorderedIds::default(),
            },
            RangeDiffKind::Del => DowngradeDiff {
                to_downgrade: UnorderedIds::default(),
                to_upgrade: ids,
            },
        }
    }
}
