//! Welcome to `lopri`!
//!
//! `lopri` is the QoS downgrade decision core of a bandwidth-enforcement
//! agent. Given one snapshot of an aggregate (a parent link plus its
//! child flows) and a target fraction of aggregate demand that should
//! ride the low-priority class, it decides *which* children are marked
//! LOPRI for the next enforcement interval.
//!
//! Everything here is an in-process, synchronous computation over plain
//! data: the host agent feeds [`AggInfo`] snapshots in and takes per-child
//! bitmaps out. Traffic shaping, RPC, and snapshot aggregation live with
//! the caller.

use clap::ValueEnum;

mod flow;

pub mod alg;
pub mod fairness;
pub mod helpe;
pub mod ids;
pub mod ring;
pub mod views;

pub use crate::helpe::*;

/// Which volume signal drives demand-aware decisions. Chosen once, at
/// selector construction time; it never changes for a selector's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum FVSource {
    PredictedDemand,
    Usage,
}

/// Structural identity of a traffic aggregate.
///
/// `host_id` is the hash-ring lookup key: a 64-bit value derived by
/// hashing stable child identity, assumed approximately uniform over the
/// whole 64-bit space. For job-level children it is the xxhash64 of the
/// job name (see [`FlowKey::job_rollup`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_dc:     String,
    pub dst_dc:     String,
    pub job:        String,
    pub host_id:    u64,
}

/// A snapshot of one flow's state. Inputs are immutable for the duration
/// of a selection call; all numeric fields are non-negative on the way in.
#[derive(Debug, Clone, Default)]
pub struct FlowInfo {
    pub flow:                   FlowKey,
    pub predicted_demand_bps:   helpe::Bps,
    pub ewma_usage_bps:         helpe::Bps,
    pub cum_usage_bytes:        i64,
    pub cum_hipri_usage_bytes:  i64,
    pub cum_lopri_usage_bytes:  i64,
    pub currently_lopri:        bool,
}

/// A parent flow plus its children, in externally-assigned order.
///
/// The order is part of the contract: every selector's output bitmap is
/// indexed by it. Children's host ids need not be unique here; the
/// job-level view enforces uniqueness per `(src_dc, dst_dc, job)`.
#[derive(Debug, Clone, Default)]
pub struct AggInfo {
    pub parent:     FlowInfo,
    pub children:   Vec<FlowInfo>,
}
