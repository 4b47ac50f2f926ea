//! Per-haplotype breakpoint tables mapping local positions to meta-genome
//! shifts.

use super::{
    error::SyncError,
    variant::{Variant, VariantFilter, VariantKind},
};

/// A breakpoint: from `position` on, local coordinates are shifted by
/// `cumulative_shift` to reach the meta-genome.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub position: i64,
    pub cumulative_shift: i64,
    /// Inserted bases that still map with the previous shift. 0 for deletions.
    pub pending_span: u32,
}

impl Offset {
    /// First local position the breakpoint's shift applies to.
    #[inline]
    fn resolved_from(&self) -> i64 {
        self.position + self.pending_span as i64
    }
}

/// How insertions are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Sample haplotypes: the inserted span keeps the pre-insertion shift.
    Pending,
    /// Reference: every length change applies at its breakpoint.
    Immediate,
}

/// Constant-shift run of local positions, starting at `local_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    local_start: i64,
    shift: i64,
}

impl Segment {
    #[inline]
    fn meta_start(&self) -> i64 {
        self.local_start + self.shift
    }
}

/// Where a meta-genome position lands in local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaPosition {
    Exact(i64),
    /// No local base maps here. `before` and `after` are the local positions
    /// bordering the gap.
    Gap { before: i64, after: i64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetTable {
    m_offsets: Vec<Offset>,
    m_segments: Vec<Segment>,
}

impl OffsetTable {
    /// A table without breakpoints.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn build(
        chromosome: &str,
        variants: &[Variant],
        filter: &dyn VariantFilter,
        emission: Emission,
    ) -> Result<Self, SyncError> {
        let mut builder = OffsetTableBuilder::new(chromosome, emission);
        for v in variants {
            builder.push(v, filter)?;
        }

        Ok(builder.finish())
    }

    pub fn len(&self) -> usize {
        self.m_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m_offsets.is_empty()
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.m_offsets
    }

    /// Shift of the greatest breakpoint at or before `position`, ignoring
    /// pending insertion spans.
    pub fn shift_at(&self, position: i64) -> i64 {
        let idx = self.m_offsets.partition_point(|o| o.position <= position);
        if idx == 0 {
            0
        } else {
            self.m_offsets[idx - 1].cumulative_shift
        }
    }

    /// Shift that applies to a local position once pending insertion spans are
    /// taken into account.
    pub fn resolved_shift_at(&self, position: i64) -> i64 {
        let idx = self.m_segments.partition_point(|s| s.local_start <= position);
        if idx == 0 {
            0
        } else {
            self.m_segments[idx - 1].shift
        }
    }

    pub fn to_meta(&self, position: i64) -> i64 {
        position + self.resolved_shift_at(position)
    }

    pub fn resolve_meta(&self, meta: i64) -> MetaPosition {
        let idx = self.m_segments.partition_point(|s| s.meta_start() <= meta);
        let shift = if idx == 0 {
            0
        } else {
            self.m_segments[idx - 1].shift
        };

        let local = meta - shift;
        match self.m_segments.get(idx) {
            Some(next) if local >= next.local_start => MetaPosition::Gap {
                before: next.local_start - 1,
                after: next.local_start,
            },
            _ => MetaPosition::Exact(local),
        }
    }

    /// Inverse of [`to_meta`](Self::to_meta). Meta positions inside a gap
    /// clamp to the last local base before it (or the first one after it when
    /// the gap opens the chromosome).
    pub fn from_meta(&self, meta: i64) -> i64 {
        match self.resolve_meta(meta) {
            MetaPosition::Exact(p) => p,
            MetaPosition::Gap { before, after } => {
                if before >= 1 {
                    before
                } else {
                    after
                }
            }
        }
    }

    /// Shift after the last breakpoint.
    pub fn total_shift(&self) -> i64 {
        self.m_offsets.last().map_or(0, |o| o.cumulative_shift)
    }
}

/// Incremental table construction, one variant at a time.
pub struct OffsetTableBuilder<'c> {
    chromosome: &'c str,
    emission: Emission,
    cumulative_shift: i64,
    last_position: Option<i64>,
    offsets: Vec<Offset>,
}

impl<'c> OffsetTableBuilder<'c> {
    pub fn new(chromosome: &'c str, emission: Emission) -> Self {
        Self {
            chromosome,
            emission,
            cumulative_shift: 0,
            last_position: None,
            offsets: Vec::new(),
        }
    }

    pub fn push(&mut self, variant: &Variant, filter: &dyn VariantFilter) -> Result<(), SyncError> {
        self.validate(variant)?;
        self.last_position = Some(variant.genome_position);

        if !filter.passes(variant) {
            return Ok(());
        }

        let length = variant.length as i64;
        match variant.kind {
            VariantKind::Snp => {}
            VariantKind::Insertion => {
                let pending_span = match self.emission {
                    Emission::Pending => variant.length as u32,
                    Emission::Immediate => 0,
                };
                self.emit(Offset {
                    position: variant.genome_position + 1,
                    cumulative_shift: self.cumulative_shift + length,
                    pending_span,
                });
                self.cumulative_shift += length;
            }
            VariantKind::Deletion => {
                self.cumulative_shift += length;
                self.emit(Offset {
                    position: variant.genome_position,
                    cumulative_shift: self.cumulative_shift,
                    pending_span: 0,
                });
            }
        }

        Ok(())
    }

    pub fn finish(mut self) -> OffsetTable {
        self.offsets.shrink_to_fit();
        let mut segments = resolve_segments(&self.offsets);
        segments.shrink_to_fit();

        OffsetTable {
            m_offsets: self.offsets,
            m_segments: segments,
        }
    }

    fn validate(&self, variant: &Variant) -> Result<(), SyncError> {
        let malformed = |reason| SyncError::MalformedVariant {
            chromosome: self.chromosome.to_string(),
            variant: *variant,
            reason,
        };

        if variant.genome_position < 0 {
            return Err(malformed("negative position"));
        }

        match variant.kind {
            VariantKind::Snp if variant.length != 0 => return Err(malformed("SNP with a length")),
            VariantKind::Insertion | VariantKind::Deletion if variant.length <= 0 => {
                return Err(malformed("indel without a positive length"))
            }
            _ => {}
        }

        match self.last_position {
            Some(previous) if variant.genome_position <= previous => {
                Err(SyncError::UnsortedVariants {
                    chromosome: self.chromosome.to_string(),
                    previous,
                    current: variant.genome_position,
                })
            }
            _ => Ok(()),
        }
    }

    fn emit(&mut self, offset: Offset) {
        // a deletion right after an insertion lands on the insertion's
        // breakpoint; the deletion resolves it
        if let Some(last) = self.offsets.last_mut() {
            if last.position == offset.position {
                *last = offset;
                return;
            }
        }

        self.offsets.push(offset);
    }
}

/// Constant-shift runs of the resolved rule, in one sweep over breakpoints
/// ordered by the position their shift starts to apply. Cumulative shifts grow
/// with the breakpoint index, so the shift at a position is the largest one
/// already resolved there.
fn resolve_segments(offsets: &[Offset]) -> Vec<Segment> {
    let mut resolutions: Vec<(i64, i64)> = offsets
        .iter()
        .map(|o| (o.resolved_from(), o.cumulative_shift))
        .collect();
    resolutions.sort_unstable();

    let mut segments: Vec<Segment> = Vec::with_capacity(offsets.len());
    let mut current = 0;
    for (local_start, shift) in resolutions {
        if shift <= current {
            continue;
        }

        match segments.last_mut() {
            Some(last) if last.local_start == local_start => last.shift = shift,
            _ => segments.push(Segment { local_start, shift }),
        }
        current = shift;
    }

    segments
}
