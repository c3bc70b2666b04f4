use crate::helpe::*;

pub const MAX_ID: u64 = u64::MAX;

/// The id space is carved into `2^32` chunks of `2^32` ids each; arcs
/// always cover a whole number of chunks.
pub const NUM_CHUNKS: u64 = 1 << 32;
pub const CHUNK_SIZE: u64 = 1 << 32;

/// At most two disjoint arcs on the id space. Two are needed because a
/// contiguous arc on the ring may wrap around zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RingRanges {
    pub a: IdRange,
    pub b: IdRange,
}

impl RingRanges {
    #[inline(always)]
    pub fn contains(&self, id: u64) -> bool {
        self.a.contains(id) || self.b.contains(id)
    }
}

impl fmt::Display for RingRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ a = {}, b = {}}}", self.a, self.b)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RangeDiffKind {
    Add,
    Del,
}

impl fmt::Display for RangeDiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("kAdd"),
            Self::Del => f.write_str("kDel"),
        }
    }
}

/// The change between two arcs: the covered/uncovered id ranges plus
/// whether they were added to or deleted from the marked set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RangeDiff {
    pub diff: RingRanges,
    pub kind: RangeDiffKind,
}

impl Default for RangeDiff {
    fn default() -> Self {
        Self {
            diff: RingRanges::default(),
            kind: RangeDiffKind::Add,
        }
    }
}

impl fmt::Display for RangeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ diff = {}, type = {}}}", self.diff, self.kind)
    }
}

/// The LOPRI arc on the 64-bit ring: a low endpoint plus a fractional
/// length. `frac = 0` is the empty arc; `frac = 1` is the whole space
/// regardless of `start`.
///
/// Shrinking drains FIFO: the arc's *oldest* prefix is rotated out and
/// `start` advances by the drained length, so the tail that stays marked
/// is exactly the most recently added part. Draining everything and
/// re-adding therefore lands on fresh ids; see
/// [`HashRing::compute_range_diff`] for the diff contract.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    start:  u64,
    frac:   f64,
}

impl HashRing {
    pub fn add(&mut self, frac_diff: f64) -> RangeDiff {
        self.update_frac(self.frac + frac_diff)
    }

    pub fn sub(&mut self, frac_diff: f64) -> RangeDiff {
        self.update_frac(self.frac - frac_diff)
    }

    /// Sets the arc's length to `frac` (clamped into `[0, 1]`), draining
    /// from the front on shrink, appending past the end on growth.
    /// Returns the diff between the old and the new arc.
    pub fn update_frac(&mut self, frac: f64) -> RangeDiff {
        let frac = frac.clamp(0.0, 1.0);

        let old_start = self.start;
        let old_frac = self.frac;

        if self.frac > frac {
            // The drained prefix is the difference of the two rounded arc
            // lengths. Rounding the frac difference instead can come out
            // a chunk off, which would detach the arc's end.
            let drained = Self::frac_to_ring(self.frac) - Self::frac_to_ring(frac);
            self.start = self.start.wrapping_add(drained as u64);
        }
        self.frac = frac;

        Self::compute_range_diff(old_start, old_frac, self.start, self.frac)
    }

    /// The current arc as one or two inclusive ranges. An arc whose
    /// rounded chunk count is zero matches nothing.
    pub fn matching_ranges(&self) -> RingRanges {
        if self.frac == 0.0 {
            return RingRanges::default();
        }
        let len = Self::frac_to_ring(self.frac);
        if len == 0 {
            return RingRanges::default();
        }
        let end = (self.start as u128) + len - 1;
        let end_lo = end as u64;
        if (end >> 64) != 0 {
            return RingRanges {
                a: IdRange::new(0, end_lo),
                b: IdRange::new(self.start, MAX_ID),
            };
        }
        RingRanges {
            a: IdRange::new(self.start, end_lo), // actual range
            b: IdRange::default(),               // matches nothing
        }
    }

    /// Number of ids covered by an arc of fractional length `frac`.
    ///
    /// Naively we want `frac * MAX_ID`, but that rounds badly: in
    /// particular `1.0 * MAX_ID != 2^64`, so a full arc would fall one id
    /// short. Instead, count how many whole chunks `frac` corresponds to
    /// and widen to 128 bits so that `frac_to_ring(1.0) == 2^64` exactly.
    pub fn frac_to_ring(frac: f64) -> u128 {
        let matched_chunks = (frac * NUM_CHUNKS as f64).round() as u64;

        if matched_chunks == 0 {
            return 0;
        }

        matched_chunks as u128 * CHUNK_SIZE as u128
    }

    /// Diff between the arcs `(old_start, old_frac)` and
    /// `(new_start, new_frac)`.
    ///
    /// Growth keeps the start fixed and adds a suffix; shrink keeps the
    /// end fixed and deletes a prefix. Either piece may wrap around zero,
    /// in which case it splits into two ranges.
    pub fn compute_range_diff(
        old_start: u64,
        old_frac: f64,
        new_start: u64,
        new_frac: f64,
    ) -> RangeDiff {
        if old_frac == new_frac {
            debug_assert!(old_start == new_start, "same frac must keep start");
            return RangeDiff::default();
        }
        // Fractions that differ by less than a chunk round to the same
        // arc; without this check a no-op shrink would fall through to
        // the wrap-around arm and report the whole ring as deleted.
        if old_start == new_start
            && Self::frac_to_ring(old_frac) == Self::frac_to_ring(new_frac)
        {
            return RangeDiff::default();
        }

        let old_end = (old_start as u128)
            .wrapping_add(Self::frac_to_ring(old_frac))
            .wrapping_sub(1);
        let new_end = (new_start as u128)
            .wrapping_add(Self::frac_to_ring(new_frac))
            .wrapping_sub(1);

        if old_frac < new_frac {
            debug_assert!(old_start == new_start, "growth must keep start");
            let old_end_p1 = old_end.wrapping_add(1);
            let new_end_lo = new_end as u64;
            let old_end_p1_lo = old_end_p1 as u64;

            let new_end_hi = (new_end >> 64) as u64;
            let old_end_p1_hi = (old_end_p1 >> 64) as u64;
            if new_end_hi != 0 && old_end_p1_hi == 0 {
                // The appended suffix wraps around zero; the old arc did not.
                return RangeDiff {
                    diff: RingRanges {
                        a: IdRange::new(0, new_end_lo),
                        b: IdRange::new(old_end_p1_lo, MAX_ID),
                    },
                    kind: RangeDiffKind::Add,
                };
            }
            // Either both ends wrap around, or neither does.
            return RangeDiff {
                diff: RingRanges {
                    a: IdRange::new(old_end_p1_lo, new_end_lo),
                    b: IdRange::default(),
                },
                kind: RangeDiffKind::Add,
            };
        }

        // Shrink: the drained prefix runs from the old start up to just
        // before the new one. The end stays put as a ring position, i.e.
        // modulo 2^64; the 128-bit forms may disagree on the wrap bit.
        debug_assert!(old_end as u64 == new_end as u64, "shrink must keep end");
        if old_start < new_start {
            // new_start - 1 cannot underflow since new_start > old_start.
            return RangeDiff {
                diff: RingRanges {
                    a: IdRange::new(old_start, new_start - 1),
                    b: IdRange::default(),
                },
                kind: RangeDiffKind::Del,
            };
        } else if new_start == 0 {
            return RangeDiff {
                diff: RingRanges {
                    a: IdRange::new(old_start, MAX_ID),
                    b: IdRange::default(),
                },
                kind: RangeDiffKind::Del,
            };
        }
        // new_start - 1 cannot underflow since new_start > 0.
        RangeDiff {
            diff: RingRanges {
                a: IdRange::new(0, new_start - 1),
                b: IdRange::new(old_start, MAX_ID),
            },
            kind: RangeDiffKind::Del,
        }
    }
}

impl fmt::Display for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ start = {}, frac = {}}}", self.start, self.frac)
    }
}
