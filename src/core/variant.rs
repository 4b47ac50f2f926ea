use std::fmt;

use rustc_hash::FxHashMap;

use super::error::SyncError;

/// One haplotype slot of a diploid sample genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlleleId {
    Allele1,
    Allele2,
}

impl AlleleId {
    pub const BOTH: [AlleleId; 2] = [AlleleId::Allele1, AlleleId::Allele2];

    /// 0 for the first slot, 1 for the second.
    pub fn slot(&self) -> usize {
        match self {
            AlleleId::Allele1 => 0,
            AlleleId::Allele2 => 1,
        }
    }
}

impl TryFrom<i64> for AlleleId {
    type Error = SyncError;

    /// Accepts the 1-based allele number used in variant tables.
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AlleleId::Allele1),
            2 => Ok(AlleleId::Allele2),
            v => Err(SyncError::InvalidAllele(v)),
        }
    }
}

impl fmt::Display for AlleleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot() + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Snp,
    Insertion,
    Deletion,
}

impl VariantKind {
    pub fn changes_length(&self) -> bool {
        !matches!(self, VariantKind::Snp)
    }
}

/// Read-only view of a variant call, as handed over by the VCF layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub genome_position: i64,
    /// 0 for SNPs, the inserted or removed span otherwise.
    pub length: i32,
    pub kind: VariantKind,
}

impl Variant {
    pub fn snp(genome_position: i64) -> Self {
        Self {
            genome_position,
            length: 0,
            kind: VariantKind::Snp,
        }
    }

    pub fn insertion(genome_position: i64, length: i32) -> Self {
        Self {
            genome_position,
            length,
            kind: VariantKind::Insertion,
        }
    }

    pub fn deletion(genome_position: i64, length: i32) -> Self {
        Self {
            genome_position,
            length,
            kind: VariantKind::Deletion,
        }
    }
}

/// Decides whether a variant takes part in synchronization.
///
/// Changing the active filter requires rebuilding the offset tables.
pub trait VariantFilter: Sync {
    fn passes(&self, variant: &Variant) -> bool;
}

pub struct PassAll;

impl VariantFilter for PassAll {
    fn passes(&self, _variant: &Variant) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct KindFilter {
    pub snp: bool,
    pub insertion: bool,
    pub deletion: bool,
}

impl VariantFilter for KindFilter {
    fn passes(&self, variant: &Variant) -> bool {
        match variant.kind {
            VariantKind::Snp => self.snp,
            VariantKind::Insertion => self.insertion,
            VariantKind::Deletion => self.deletion,
        }
    }
}

/// Suppresses indels shorter than the given span. SNPs always pass.
#[derive(Debug, Clone)]
pub struct MinLengthFilter(pub i32);

impl VariantFilter for MinLengthFilter {
    fn passes(&self, variant: &Variant) -> bool {
        match variant.kind {
            VariantKind::Snp => true,
            VariantKind::Insertion | VariantKind::Deletion => variant.length >= self.0,
        }
    }
}

pub struct FnFilter<F>(pub F);

impl<F> VariantFilter for FnFilter<F>
where
    F: Fn(&Variant) -> bool + Sync,
{
    fn passes(&self, variant: &Variant) -> bool {
        (self.0)(variant)
    }
}

pub struct AllOf(pub Vec<Box<dyn VariantFilter + Send>>);

impl VariantFilter for AllOf {
    fn passes(&self, variant: &Variant) -> bool {
        self.0.iter().all(|f| f.passes(variant))
    }
}

/// Pre-loaded variant calls, addressed per haplotype and chromosome.
pub trait VariantSource: Sync {
    /// Sample genome names, in display order.
    fn genomes(&self) -> Vec<String>;

    /// Variants of one haplotype on one chromosome, sorted by position.
    fn variants(&self, genome: &str, allele: AlleleId, chromosome: &str) -> &[Variant];

    /// Length changes of the reference itself. Usually empty.
    fn reference_variants(&self, _chromosome: &str) -> &[Variant] {
        &[]
    }
}

/// Variants of one allele, per chromosome.
type AlleleVariants = FxHashMap<String, Vec<Variant>>;

#[derive(Debug, Default)]
pub struct InMemoryVariants {
    m_genomes: Vec<String>,
    /// Per genome, one map per allele slot.
    m_variants: FxHashMap<String, [AlleleVariants; 2]>,
    m_reference: AlleleVariants,
}

impl InMemoryVariants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a genome even if it carries no variants.
    pub fn add_genome(&mut self, genome: &str) {
        if !self.m_variants.contains_key(genome) {
            self.m_genomes.push(genome.to_string());
            self.m_variants.insert(genome.to_string(), Default::default());
        }
    }

    pub fn push(&mut self, genome: &str, allele: AlleleId, chromosome: &str, variant: Variant) {
        self.add_genome(genome);
        if let Some(alleles) = self.m_variants.get_mut(genome) {
            let per_chromosome = &mut alleles[allele.slot()];
            match per_chromosome.get_mut(chromosome) {
                Some(variants) => variants.push(variant),
                None => {
                    per_chromosome.insert(chromosome.to_string(), vec![variant]);
                }
            }
        }
    }

    pub fn push_reference(&mut self, chromosome: &str, variant: Variant) {
        self.m_reference
            .entry(chromosome.to_string())
            .or_default()
            .push(variant);
    }

    /// Total number of sample variant records.
    pub fn len(&self) -> usize {
        self.m_variants
            .values()
            .flat_map(|alleles| alleles.iter())
            .flat_map(|per_chromosome| per_chromosome.values())
            .map(|v| v.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VariantSource for InMemoryVariants {
    fn genomes(&self) -> Vec<String> {
        self.m_genomes.clone()
    }

    fn variants(&self, genome: &str, allele: AlleleId, chromosome: &str) -> &[Variant] {
        self.m_variants
            .get(genome)
            .and_then(|alleles| alleles[allele.slot()].get(chromosome))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn reference_variants(&self, chromosome: &str) -> &[Variant] {
        self.m_reference
            .get(chromosome)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allele_from_index() {
        assert_eq!(AlleleId::try_from(1).unwrap(), AlleleId::Allele1);
        assert_eq!(AlleleId::try_from(2).unwrap(), AlleleId::Allele2);
        assert_eq!(AlleleId::try_from(3), Err(SyncError::InvalidAllele(3)));
        assert_eq!(AlleleId::try_from(0), Err(SyncError::InvalidAllele(0)));
    }

    #[test]
    fn filters() {
        let ins = Variant::insertion(10, 2);
        let del = Variant::deletion(20, 8);
        let snp = Variant::snp(30);

        let no_ins = KindFilter {
            snp: true,
            insertion: false,
            deletion: true,
        };
        assert!(!no_ins.passes(&ins));
        assert!(no_ins.passes(&del));

        let min = MinLengthFilter(5);
        assert!(!min.passes(&ins));
        assert!(min.passes(&del));
        assert!(min.passes(&snp));

        let combined = AllOf(vec![
            Box::new(MinLengthFilter(5)),
            Box::new(FnFilter(|v: &Variant| v.genome_position < 25)),
        ]);
        assert!(combined.passes(&del));
        assert!(!combined.passes(&snp));
        assert!(!combined.passes(&ins));
    }

    #[test]
    fn in_memory_source() {
        let mut src = InMemoryVariants::new();
        src.push("s1", AlleleId::Allele1, "chr1", Variant::insertion(100, 5));
        src.push("s1", AlleleId::Allele2, "chr1", Variant::snp(50));
        src.add_genome("s2");

        assert_eq!(src.genomes(), vec!["s1".to_string(), "s2".to_string()]);
        assert_eq!(src.variants("s1", AlleleId::Allele1, "chr1").len(), 1);
        assert!(src.variants("s1", AlleleId::Allele1, "chr2").is_empty());
        assert!(src.variants("s2", AlleleId::Allele2, "chr1").is_empty());
        assert!(src.variants("s9", AlleleId::Allele1, "chr1").is_empty());
        assert_eq!(src.variants("s1", AlleleId::Allele2, "chr1"), &[Variant::snp(50)]);
        assert_eq!(src.len(), 2);
    }
}
