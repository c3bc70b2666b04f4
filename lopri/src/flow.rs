use crate::helpe::*;
use xxhash_rust::xxh64::xxh64;

impl FlowInfo {
    /// Reads the volume signal selected at configuration time.
    #[inline(always)]
    pub fn volume(&self, source: FVSource) -> Bps {
        match source {
            FVSource::PredictedDemand => self.predicted_demand_bps,
            FVSource::Usage => self.ewma_usage_bps,
        }
    }
}

impl FlowKey {
    /// Collapses a host-level key to its job-level identity. The job
    /// child's `host_id` is the xxhash64 of the job name (seed 0), which
    /// keeps ring lookups approximately uniform across jobs.
    pub fn job_rollup(&self) -> Self {
        Self {
            src_dc:     self.src_dc.clone(),
            dst_dc:     self.dst_dc.clone(),
            job:        self.job.clone(),
            host_id:    xxh64(self.job.as_bytes(), 0),
        }
    }
}

impl AggInfo {
    /// Sum of the chosen volume signal over all children.
    pub fn total_child_volume(&self, source: FVSource) -> Bps {
        self.children.iter().map(|c| c.volume(source)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(predicted: Bps, usage: Bps) -> FlowInfo {
        FlowInfo {
            predicted_demand_bps: predicted,
            ewma_usage_bps: usage,
            ..Default::default()
        }
    }

    #[test]
    fn volume_tracks_the_configured_source() {
        let c = child(100, 40);
        assert_eq!(c.volume(FVSource::PredictedDemand), 100);
        assert_eq!(c.volume(FVSource::Usage), 40);
    }

    #[test]
    fn job_rollup_hashes_the_job_name_only() {
        let a = FlowKey {
            src_dc: "chicago".into(),
            dst_dc: "sandiego".into(),
            job: "video-transcode".into(),
            host_id: 17,
        };
        let mut b = a.clone();
        b.host_id = 99;

        // Host identity must not leak into the job id.
        assert_eq!(a.job_rollup(), b.job_rollup());
        assert_eq!(a.job_rollup().host_id, xxh64(b"video-transcode", 0));
    }
}
