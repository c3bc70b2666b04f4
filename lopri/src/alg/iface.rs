use crate::helpe::*;

/// The one contract every downgrade selector satisfies: given a view of
/// the aggregate and a target LOPRI demand fraction, emit a bitmap with
/// one slot per child (same length, same order), `true` meaning LOPRI.
///
/// Stateful selectors mutate internal memory across calls; callers must
/// serialize calls into a single selector instance.
pub trait DowngradeSelectorImpl {
    fn pick_lopri_children(&mut self, agg_info: &dyn AggView, want_frac_lopri: f64)
        -> Vec<bool>;
}

/// The change set emitted by diff-shaped selectors: which ids to move to
/// LOPRI and which to move back. Diffs keep churn minimal when the
/// selector's output is stable from one call to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DowngradeDiff {
    pub to_downgrade:   UnorderedIds,
    pub to_upgrade:     UnorderedIds,
}

impl DowngradeDiff {
    pub fn to_indented_string(&self, indent: &str) -> String {
        let ids_indent = format!("{indent}    ");
        format!(
            "{indent}{{\n{indent}  to_downgrade = {},\n{indent}  to_upgrade = {},\n{indent}}}",
            self.to_downgrade.to_indented_string(&ids_indent),
            self.to_upgrade.to_indented_string(&ids_indent),
        )
    }
}

impl fmt::Display for DowngradeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_indented_string(""))
    }
}

/// A selector whose primary output is the incremental change from its
/// previous decision, expressed over child ids rather than child
/// indices.
pub trait DiffDowngradeSelectorImpl {
    fn pick_children(&mut self, agg_info: &dyn AggView, want_frac_lopri: f64)
        -> DowngradeDiff;
}

/// Turns a diff selector into a bitmap selector by replaying the diff
/// against persisted per-child decisions.
///
/// The memory matters: a QoS choice must stick even when a child drops
/// out of a snapshot and reappears later, so entries live until the
/// selector is dropped and the map grows with the cumulative child
/// population. Nothing bounds it.
pub struct Differential<T> {
    inner:          T,
    // Previous child id -> lopri/hipri assignment.
    last_is_lopri:  AHashMap<u64, bool>,
}

impl<T> Differential<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            last_is_lopri: AHashMap::new(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: DiffDowngradeSelectorImpl> DowngradeSelectorImpl for Differential<T> {
    fn pick_lopri_children(
        &mut self,
        agg_info: &dyn AggView,
        want_frac_lopri: f64,
    ) -> Vec<bool> {
        let diff = self.inner.pick_children(agg_info, want_frac_lopri);

        // Convert the diff to a linear mask in O(#children) time and
        // space. Ranges are matched with a linear scan per range (a
        // selector emits only a handful, so that is a constant factor);
        // points go through a lazily built id -> index table.
        let agg_children = agg_info.children();
        let mut lopri = vec![false; agg_children.len()];
        let mut id_to_index: Option<AHashMap<u64, usize>> = None;

        for (i, child) in agg_children.iter().enumerate() {
            lopri[i] = child.currently_lopri;
            if let Some(&last) = self.last_is_lopri.get(&child.flow.host_id) {
                lopri[i] = last;
            }
        }

        for range in &diff.to_downgrade.ranges {
            for (i, child) in agg_children.iter().enumerate() {
                if range.contains(child.flow.host_id) {
                    lopri[i] = true;
                }
            }
        }
        if !diff.to_downgrade.points.is_empty() {
            let table = id_to_index.get_or_insert_with(|| build_id_to_index(agg_children));
            for point in &diff.to_downgrade.points {
                if let Some(&i) = table.get(point) {
                    lopri[i] = true;
                }
            }
        }

        for range in &diff.to_upgrade.ranges {
            for (i, child) in agg_children.iter().enumerate() {
                if range.contains(child.flow.host_id) {
                    lopri[i] = false;
                }
            }
        }
        if !diff.to_upgrade.points.is_empty() {
            let table = id_to_index.get_or_insert_with(|| build_id_to_index(agg_children));
            for point in &diff.to_upgrade.points {
                if let Some(&i) = table.get(point) {
                    lopri[i] = false;
                }
            }
        }

        for (i, child) in agg_children.iter().enumerate() {
            self.last_is_lopri.insert(child.flow.host_id, lopri[i]);
        }

        info!("picked LOPRI assignment: {}", format_bitmap(&lopri));

        lopri
    }
}

fn build_id_to_index(children: &[FlowInfo]) -> AHashMap<u64, usize> {
    children
        .iter()
        .enumerate()
        .map(|(i, child)| (child.flow.host_id, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Replays a scripted diff regardless of input.
    struct ScriptedSelector {
        script: Vec<DowngradeDiff>,
        next:   usize,
    }

    impl DiffDowngradeSelectorImpl for ScriptedSelector {
        fn pick_children(&mut self, _: &dyn AggView, _: f64) -> DowngradeDiff {
            let diff = self.script[self.next].clone();
            self.next += 1;
            diff
        }
    }

    fn agg(ids: &[u64]) -> AggInfo {
        AggInfo {
            parent: FlowInfo::default(),
            children: ids
                .iter()
                .map(|&host_id| FlowInfo {
                    flow: FlowKey {
                        host_id,
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn downgrade_ranges(ranges: Vec<IdRange>) -> DowngradeDiff {
        DowngradeDiff {
            to_downgrade: UnorderedIds {
                ranges,
                points: vec![],
            },
            to_upgrade: UnorderedIds::default(),
        }
    }

    #[test]
    fn applies_ranges_and_points() {
        let info = agg(&[10, 20, 30, 40]);
        let view = TransparentView::new(&info);
        let mut frame = Differential::new(ScriptedSelector {
            script: vec![DowngradeDiff {
                to_downgrade: UnorderedIds {
                    ranges: vec![IdRange::new(0, 25)],
                    points: vec![40, 99],
                },
                to_upgrade: UnorderedIds::default(),
            }],
            next: 0,
        });
        let lopri = frame.pick_lopri_children(&view, 0.5);
        // 10 and 20 fall in the range, 40 matches a point, 99 matches
        // nobody.
        assert_eq!(lopri, vec![true, true, false, true]);
    }

    #[test]
    fn upgrade_wins_over_stale_memory() {
        let info = agg(&[10, 20]);
        let view = TransparentView::new(&info);
        let mut frame = Differential::new(ScriptedSelector {
            script: vec![
                downgrade_ranges(vec![IdRange::new(0, 30)]),
                DowngradeDiff {
                    to_downgrade: UnorderedIds::default(),
                    to_upgrade: UnorderedIds {
                        ranges: vec![IdRange::new(15, 25)],
                        points: vec![],
                    },
                },
            ],
            next: 0,
        });
        assert_eq!(frame.pick_lopri_children(&view, 0.5), vec![true, true]);
        assert_eq!(frame.pick_lopri_children(&view, 0.5), vec![true, false]);
    }

    #[test]
    fn decisions_stick_across_vanishing_children() {
        let everyone = agg(&[10, 20]);
        let only_second = agg(&[20]);
        let mut frame = Differential::new(ScriptedSelector {
            script: vec![
                downgrade_ranges(vec![IdRange::new(0, 15)]),
                DowngradeDiff::default(),
                DowngradeDiff::default(),
            ],
            next: 0,
        });

        let view = TransparentView::new(&everyone);
        assert_eq!(frame.pick_lopri_children(&view, 0.5), vec![true, false]);

        // Child 10 vanishes for a round...
        let view = TransparentView::new(&only_second);
        assert_eq!(frame.pick_lopri_children(&view, 0.5), vec![false]);

        // ...and is still LOPRI when it comes back, with no new diff.
        let view = TransparentView::new(&everyone);
        assert_eq!(frame.pick_lopri_children(&view, 0.5), vec![true, false]);
    }

    #[test]
    fn seeds_from_currently_lopri() {
        let mut info = agg(&[10, 20]);
        info.children[1].currently_lopri = true;
        let view = TransparentView::new(&info);
        let mut frame = Differential::new(ScriptedSelector {
            script: vec![DowngradeDiff::default()],
            next: 0,
        });
        assert_eq!(frame.pick_lopri_children(&view, 0.5), vec![false, true]);
    }

    #[test]
    fn downgrade_diff_display() {
        let diff = DowngradeDiff {
            to_downgrade: UnorderedIds {
                ranges: vec![IdRange::new(1, 2)],
                points: vec![],
            },
            to_upgrade: UnorderedIds::default(),
        };
        let want = "{\n  to_downgrade = {\n      ranges = ([1, 2]),\n      points = (),\n    },\n  to_upgrade = {\n      ranges = (),\n      points = (),\n    },\n}";
        assert_eq!(diff.to_string(), want);
    }
}
