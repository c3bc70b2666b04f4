use crate::helpe::*;

/// Read interface shared by all selector inputs: one parent flow and an
/// ordered slice of children. Selectors index their output bitmap by the
/// children order, so views must never reorder what they expose.
pub trait AggView {
    fn parent(&self) -> &FlowInfo;
    fn children(&self) -> &[FlowInfo];
}

/// Exposes the underlying [`AggInfo`] verbatim.
pub struct TransparentView<'a> {
    info: &'a AggInfo,
}

impl<'a> TransparentView<'a> {
    pub fn new(info: &'a AggInfo) -> Self {
        Self { info }
    }
}

impl AggView for TransparentView<'_> {
    fn parent(&self) -> &FlowInfo {
        &self.info.parent
    }

    fn children(&self) -> &[FlowInfo] {
        &self.info.children
    }
}

/// Rolls host-level children up into one synthetic child per
/// `(src_dc, dst_dc, job)` tuple, in first-seen order.
///
/// Numeric fields are summed and `currently_lopri` is OR-ed, so a job
/// counts as LOPRI if any of its hosts does. Each synthetic child's
/// `host_id` is the xxhash64 of the job name, which keeps job ids spread
/// over the ring. `job_index_of_host` lets the dispatcher project a
/// job-level decision back onto every host that fed it.
pub struct JobLevelView<'a> {
    info:           &'a AggInfo,
    job_children:   Vec<FlowInfo>,
    job_index:      Vec<usize>,
}

impl<'a> JobLevelView<'a> {
    pub fn new(info: &'a AggInfo) -> Self {
        let mut job_children: Vec<FlowInfo> = Vec::new();
        let mut job_index = Vec::with_capacity(info.children.len());
        let mut flow_to_job_index: IndexMap<(&str, &str, &str), usize> = IndexMap::new();

        for child in &info.children {
            let key = (
                child.flow.src_dc.as_str(),
                child.flow.dst_dc.as_str(),
                child.flow.job.as_str(),
            );
            let j = *flow_to_job_index.entry(key).or_insert_with(|| {
                job_children.push(FlowInfo {
                    flow: child.flow.job_rollup(),
                    ..Default::default()
                });
                job_children.len() - 1
            });
            job_index.push(j);

            let job_info = &mut job_children[j];
            job_info.predicted_demand_bps += child.predicted_demand_bps;
            job_info.ewma_usage_bps += child.ewma_usage_bps;
            job_info.cum_usage_bytes += child.cum_usage_bytes;
            job_info.cum_hipri_usage_bytes += child.cum_hipri_usage_bytes;
            job_info.cum_lopri_usage_bytes += child.cum_lopri_usage_bytes;
            job_info.currently_lopri = job_info.currently_lopri || child.currently_lopri;
        }

        Self {
            info,
            job_children,
            job_index,
        }
    }

    /// For each original host index, the index of its job child.
    pub fn job_index_of_host(&self) -> &[usize] {
        &self.job_index
    }
}

impl AggView for JobLevelView<'_> {
    fn parent(&self) -> &FlowInfo {
        &self.info.parent
    }

    fn children(&self) -> &[FlowInfo] {
        &self.job_children
    }
}
