use std::{error, fmt};

use super::variant::Variant;

/// Boxed error carried by pooled tasks.
pub type Error = Box<dyn error::Error + Send + Sync>;

/// Precondition violations and lookup failures of the synchronization core.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Variants of one haplotype/chromosome are not strictly increasing.
    UnsortedVariants {
        chromosome: String,
        previous: i64,
        current: i64,
    },
    MalformedVariant {
        chromosome: String,
        variant: Variant,
        reason: &'static str,
    },
    NegativeChromosomeLength { name: String, length: i64 },
    /// Longer than the `u32` positions of a chromosome allow.
    ChromosomeTooLong { name: String, length: i64 },
    InvalidAllele(i64),
    UnknownChromosome(String),
    UnknownGenome(String),
    Parse { line: usize, msg: String },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::UnsortedVariants {
                chromosome,
                previous,
                current,
            } => write!(
                f,
                "variants on {} are not sorted: position {} follows {}",
                chromosome, current, previous
            ),
            SyncError::MalformedVariant {
                chromosome,
                variant,
                reason,
            } => write!(
                f,
                "malformed {:?} at {}:{} (length {}): {}",
                variant.kind, chromosome, variant.genome_position, variant.length, reason
            ),
            SyncError::NegativeChromosomeLength { name, length } => {
                write!(f, "chromosome '{}' has a negative length ({})", name, length)
            }
            SyncError::ChromosomeTooLong { name, length } => write!(
                f,
                "chromosome '{}' is too long ({}), at most {} bases are supported",
                name,
                length,
                u32::MAX
            ),
            SyncError::InvalidAllele(idx) => {
                write!(f, "allele index {} is not valid, expected 1 or 2", idx)
            }
            SyncError::UnknownChromosome(name) => {
                write!(f, "chromosome '{}' is not part of the project", name)
            }
            SyncError::UnknownGenome(name) => write!(f, "genome '{}' is not loaded", name),
            SyncError::Parse { line, msg } => write!(f, "line {}: {}", line, msg),
        }
    }
}

impl error::Error for SyncError {}
