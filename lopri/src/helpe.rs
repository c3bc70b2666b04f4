pub use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering::Relaxed},
    time::{Duration, Instant},
};
pub use ahash::AHashMap;
pub use clap::ValueEnum;
pub use indexmap::IndexMap;
pub use itertools::Itertools;
pub use thiserror::Error;
pub use tracing::{debug, error, info, warn};

pub use crate::{AggInfo, FVSource, FlowInfo, FlowKey,
    ids::*,
    ring::*,
    views::*,
};

/// The unit for measuring traffic volume: bits per second, as a signed
/// 64-bit integer. Cumulative counters reuse the same width in bytes.
///
/// Signedness is deliberate. Demand arithmetic routinely forms
/// differences (`next - want`, `2 * want - cur`) that dip below zero
/// mid-computation even though every input is non-negative.
pub type Bps = i64;

// The one process-wide datum in the core: whether selection calls should
// emit verbose logs. Many threads may flip or read it; monotonic
// visibility is all callers get, and all they need.
static DEBUG_QOS_SELECTION: AtomicBool = AtomicBool::new(false);

/// Returns `true` if verbose QoS-selection logging is on.
#[inline(always)]
pub fn debug_qos_selection() -> bool {
    DEBUG_QOS_SELECTION.load(Relaxed)
}

/// Turns verbose QoS-selection logging on or off, process-wide.
pub fn set_debug_qos_selection(on: bool) {
    DEBUG_QOS_SELECTION.store(on, Relaxed);
}

/// Renders a LOPRI bitmap the way it appears in logs: one `'1'` or `'0'`
/// per child, in child order. The format is load-bearing; downstream
/// tooling greps for it.
pub fn format_bitmap(bits: &[bool]) -> String {
    let mut out = String::with_capacity(bits.len());
    for &b in bits {
        out.push(if b { '1' } else { '0' });
    }
    out
}

#[derive(Error, Debug)]
#[error("unsupported downgrade selector type: {name}")]
/// Appears when configuration names a selector this build does not know.
/// Configuration is parsed once at startup; callers treat this as fatal.
pub struct ConfigError {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_renders_in_child_order() {
        assert_eq!(format_bitmap(&[]), "");
        assert_eq!(format_bitmap(&[true]), "1");
        assert_eq!(format_bitmap(&[false, true, true, false]), "0110");
    }

    #[test]
    fn debug_toggle_round_trips() {
        set_debug_qos_selection(true);
        assert!(debug_qos_selection());
        set_debug_qos_selection(false);
        assert!(!debug_qos_selection());
    }
}
