//! Translation between local, reference and meta-genome coordinates.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use rustc_hash::FxHashMap;

use super::{
    chromosome::ChromosomeList,
    error::SyncError,
    offset_table::{MetaPosition, OffsetTable},
    variant::AlleleId,
};

/// A coordinate system backed by an offset table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Haplotype {
    Reference,
    Sample { genome: String, allele: AlleleId },
}

impl Haplotype {
    pub fn sample(genome: &str, allele: AlleleId) -> Self {
        Haplotype::Sample {
            genome: genome.to_string(),
            allele,
        }
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Haplotype::Reference => write!(f, "reference"),
            Haplotype::Sample { genome, allele } => write!(f, "{}:{}", genome, allele),
        }
    }
}

/// Offset tables of every haplotype for one chromosome, as produced by a
/// single build task. `reference` is `None` when the reference was not part of
/// the rebuild.
#[derive(Debug, Default)]
pub struct ChromosomeTables {
    pub reference: Option<OffsetTable>,
    pub samples: Vec<(String, AlleleId, OffsetTable)>,
}

impl ChromosomeTables {
    pub fn breakpoints(&self) -> usize {
        self.reference.as_ref().map_or(0, |t| t.len())
            + self.samples.iter().map(|(_, _, t)| t.len()).sum::<usize>()
    }
}

/// Per-chromosome table slots, indexed like the chromosome list.
type Slots = Vec<Option<Arc<OffsetTable>>>;

/// One immutable generation of offset tables for the whole project.
///
/// Missing tables stand for the identity mapping. Tables are shared between
/// generations, so a partial rebuild only pays for what it rebuilt.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    m_genomes: Vec<String>,
    m_reference: Slots,
    /// Slots per genome, one per allele.
    m_samples: FxHashMap<String, [Slots; 2]>,
}

impl TableSet {
    /// Assembles per-chromosome build results, indexed like the chromosome
    /// list. `None` entries mean nothing was built for that chromosome.
    pub fn assemble(genomes: Vec<String>, per_chromosome: Vec<Option<ChromosomeTables>>) -> Self {
        TableSet::default().updated(&genomes, per_chromosome)
    }

    /// A new generation where the tables of `genomes` (and of the reference,
    /// where rebuilt) are replaced on every chromosome with results. All other
    /// tables are shared with `self`. Genomes new to the set are appended.
    pub fn updated(&self, genomes: &[String], per_chromosome: Vec<Option<ChromosomeTables>>) -> Self {
        let n_chr = per_chromosome.len().max(self.m_reference.len());
        let mut next = self.clone();

        next.m_reference.resize(n_chr, None);
        for slots in next.m_samples.values_mut().flat_map(|s| s.iter_mut()) {
            slots.resize(n_chr, None);
        }
        for genome in genomes {
            if !next.m_samples.contains_key(genome.as_str()) {
                next.m_genomes.push(genome.clone());
                next.m_samples
                    .insert(genome.clone(), [vec![None; n_chr], vec![None; n_chr]]);
            }
        }

        for (chr_idx, tables) in per_chromosome.into_iter().enumerate() {
            let Some(tables) = tables else {
                continue;
            };

            if let Some(reference) = tables.reference {
                next.m_reference[chr_idx] = Some(Arc::new(reference));
            }
            for genome in genomes {
                if let Some(slots) = next.m_samples.get_mut(genome.as_str()) {
                    for allele_slots in slots.iter_mut() {
                        allele_slots[chr_idx] = None;
                    }
                }
            }
            for (genome, allele, table) in tables.samples {
                if let Some(slots) = next.m_samples.get_mut(genome.as_str()) {
                    slots[allele.slot()][chr_idx] = Some(Arc::new(table));
                }
            }
        }

        next
    }

    pub fn genomes(&self) -> &[String] {
        &self.m_genomes
    }

    /// Table of a haplotype on a chromosome. `Ok(None)` is the identity.
    pub fn table(&self, haplotype: &Haplotype, chr_idx: usize) -> Result<Option<&OffsetTable>, SyncError> {
        let slots = match haplotype {
            Haplotype::Reference => &self.m_reference,
            Haplotype::Sample { genome, allele } => {
                let per_allele = self
                    .m_samples
                    .get(genome.as_str())
                    .ok_or_else(|| SyncError::UnknownGenome(genome.clone()))?;
                &per_allele[allele.slot()]
            }
        };

        Ok(slots.get(chr_idx).and_then(|t| t.as_deref()))
    }

    /// Whether two generations hold the very same table for a haplotype.
    pub fn shares_table(&self, other: &TableSet, haplotype: &Haplotype, chr_idx: usize) -> bool {
        let slot = |set: &TableSet| -> Option<Arc<OffsetTable>> {
            match haplotype {
                Haplotype::Reference => set.m_reference.get(chr_idx).cloned().flatten(),
                Haplotype::Sample { genome, allele } => set
                    .m_samples
                    .get(genome.as_str())
                    .and_then(|s| s[allele.slot()].get(chr_idx).cloned().flatten()),
            }
        };

        match (slot(self), slot(other)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    pub fn to_meta(&self, haplotype: &Haplotype, chr_idx: usize, local: i64) -> Result<i64, SyncError> {
        if local < 0 {
            return Ok(local);
        }

        Ok(self
            .table(haplotype, chr_idx)?
            .map_or(local, |t| t.to_meta(local)))
    }

    pub fn resolve_meta(&self, haplotype: &Haplotype, chr_idx: usize, meta: i64) -> Result<MetaPosition, SyncError> {
        if meta < 0 {
            return Ok(MetaPosition::Exact(meta));
        }

        Ok(self
            .table(haplotype, chr_idx)?
            .map_or(MetaPosition::Exact(meta), |t| t.resolve_meta(meta)))
    }

    pub fn from_meta(&self, haplotype: &Haplotype, chr_idx: usize, meta: i64) -> Result<i64, SyncError> {
        if meta < 0 {
            return Ok(meta);
        }

        Ok(self
            .table(haplotype, chr_idx)?
            .map_or(meta, |t| t.from_meta(meta)))
    }

    pub fn translate(
        &self,
        from: &Haplotype,
        position: i64,
        chr_idx: usize,
        to: &Haplotype,
    ) -> Result<i64, SyncError> {
        if from == to || position < 0 {
            return Ok(position);
        }

        let meta = self.to_meta(from, chr_idx, position)?;
        self.from_meta(to, chr_idx, meta)
    }

    pub fn breakpoints(&self) -> usize {
        let reference: usize = self.m_reference.iter().flatten().map(|t| t.len()).sum();
        let samples: usize = self
            .m_samples
            .values()
            .flat_map(|slots| slots.iter().flatten().flatten())
            .map(|t| t.len())
            .sum();

        reference + samples
    }
}

/// Name-based entry point to the current table generation. Safe to call from
/// any thread; a rebuild swaps the whole set at once.
pub struct CoordinateTranslator {
    m_chromosomes: Arc<ChromosomeList>,
    m_tables: RwLock<Arc<TableSet>>,
}

impl CoordinateTranslator {
    pub fn new(chromosomes: Arc<ChromosomeList>) -> Self {
        Self {
            m_chromosomes: chromosomes,
            m_tables: RwLock::new(Arc::new(TableSet::default())),
        }
    }

    pub fn chromosomes(&self) -> &Arc<ChromosomeList> {
        &self.m_chromosomes
    }

    /// Current table generation, for lock-free bulk lookups.
    pub fn snapshot(&self) -> Arc<TableSet> {
        Arc::clone(&self.m_tables.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn swap_tables(&self, tables: TableSet) {
        let tables = Arc::new(tables);
        log::debug!(
            "swapping offset tables: {} genomes, {} breakpoints",
            tables.genomes().len(),
            tables.breakpoints()
        );
        *self.m_tables.write().unwrap_or_else(PoisonError::into_inner) = tables;
    }

    pub fn to_meta(&self, haplotype: &Haplotype, chromosome: &str, local: i64) -> Result<i64, SyncError> {
        let chr_idx = self.m_chromosomes.index_of(chromosome)?;
        self.snapshot().to_meta(haplotype, chr_idx, local)
    }

    pub fn from_meta(&self, haplotype: &Haplotype, chromosome: &str, meta: i64) -> Result<i64, SyncError> {
        let chr_idx = self.m_chromosomes.index_of(chromosome)?;
        self.snapshot().from_meta(haplotype, chr_idx, meta)
    }

    pub fn resolve_meta(&self, haplotype: &Haplotype, chromosome: &str, meta: i64) -> Result<MetaPosition, SyncError> {
        let chr_idx = self.m_chromosomes.index_of(chromosome)?;
        self.snapshot().resolve_meta(haplotype, chr_idx, meta)
    }

    pub fn translate(
        &self,
        from: &Haplotype,
        position: i64,
        chromosome: &str,
        to: &Haplotype,
    ) -> Result<i64, SyncError> {
        if from == to {
            return Ok(position);
        }

        let chr_idx = self.m_chromosomes.index_of(chromosome)?;
        self.snapshot().translate(from, position, chr_idx, to)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{
        chromosome::Chromosome,
        offset_table::Emission,
        variant::{PassAll, Variant},
    };

    fn translator() -> CoordinateTranslator {
        let chromosomes = Arc::new(ChromosomeList::new(vec![
            Chromosome::new("chr1", 1000).unwrap(),
            Chromosome::new("chr2", 500).unwrap(),
        ]));

        let allele1 = OffsetTable::build(
            "chr1",
            &[Variant::insertion(100, 5), Variant::deletion(300, 3)],
            &PassAll,
            Emission::Pending,
        )
        .unwrap();
        let allele2 = OffsetTable::build(
            "chr1",
            &[Variant::deletion(50, 10)],
            &PassAll,
            Emission::Pending,
        )
        .unwrap();

        let chr1 = ChromosomeTables {
            reference: None,
            samples: vec![
                ("s1".to_string(), AlleleId::Allele1, allele1),
                ("s1".to_string(), AlleleId::Allele2, allele2),
            ],
        };

        let translator = CoordinateTranslator::new(chromosomes);
        translator.swap_tables(TableSet::assemble(vec!["s1".to_string()], vec![Some(chr1), None]));
        translator
    }

    #[test]
    fn end_to_end_scenario() {
        let t = translator();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);

        assert_eq!(t.to_meta(&a1, "chr1", 50).unwrap(), 50);
        assert_eq!(t.to_meta(&a1, "chr1", 100).unwrap(), 100);
        assert_eq!(t.to_meta(&a1, "chr1", 103).unwrap(), 103);
        assert_eq!(t.to_meta(&a1, "chr1", 106).unwrap(), 111);
        assert_eq!(t.to_meta(&a1, "chr1", 300).unwrap(), 308);
        assert_eq!(t.from_meta(&a1, "chr1", 308).unwrap(), 300);
    }

    #[test]
    fn translate_between_alleles() {
        let t = translator();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);
        let a2 = Haplotype::sample("s1", AlleleId::Allele2);

        // 200 -> meta 205 -> allele2 195
        assert_eq!(t.translate(&a1, 200, "chr1", &a2).unwrap(), 195);
        assert_eq!(t.translate(&a2, 195, "chr1", &a1).unwrap(), 200);
        assert_eq!(t.translate(&a1, 200, "chr1", &Haplotype::Reference).unwrap(), 205);
    }

    #[test]
    fn translate_through_reference_indels() {
        let t = translator();
        let reference = OffsetTable::build(
            "chr1",
            &[Variant::deletion(200, 4), Variant::insertion(600, 6)],
            &PassAll,
            Emission::Immediate,
        )
        .unwrap();
        let mut chr1 = ChromosomeTables {
            reference: Some(reference),
            samples: Vec::new(),
        };
        chr1.samples.push((
            "s1".to_string(),
            AlleleId::Allele1,
            OffsetTable::build(
                "chr1",
                &[Variant::insertion(100, 5), Variant::deletion(300, 3)],
                &PassAll,
                Emission::Pending,
            )
            .unwrap(),
        ));
        t.swap_tables(TableSet::assemble(vec!["s1".to_string()], vec![Some(chr1), None]));

        let a1 = Haplotype::sample("s1", AlleleId::Allele1);
        let r = Haplotype::Reference;
        assert_eq!(t.to_meta(&r, "chr1", 199).unwrap(), 199);
        assert_eq!(t.to_meta(&r, "chr1", 200).unwrap(), 204);
        assert_eq!(t.to_meta(&r, "chr1", 601).unwrap(), 611);

        // sample 250 -> meta 255 -> reference 251
        assert_eq!(t.translate(&a1, 250, "chr1", &r).unwrap(), 251);
        assert_eq!(t.translate(&r, 251, "chr1", &a1).unwrap(), 250);
        // past both reference indels
        assert_eq!(t.translate(&a1, 700, "chr1", &r).unwrap(), 698);
        assert_eq!(t.translate(&r, 698, "chr1", &a1).unwrap(), 700);
        assert_eq!(t.translate(&r, 620, "chr1", &a1).unwrap(), 622);
        // meta 201 falls on bases deleted from the reference
        assert_eq!(t.translate(&a1, 196, "chr1", &r).unwrap(), 199);
        assert_eq!(t.translate(&a1, 50, "chr1", &r).unwrap(), 50);
        // the reference table does not leak into other chromosomes
        assert_eq!(t.translate(&a1, 250, "chr2", &r).unwrap(), 250);
    }

    #[test]
    fn same_haplotype_and_negative_positions_pass_through() {
        let t = translator();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);

        assert_eq!(t.translate(&a1, 106, "chr1", &a1).unwrap(), 106);
        assert_eq!(t.to_meta(&a1, "chr1", -7).unwrap(), -7);
        assert_eq!(t.from_meta(&a1, "chr1", -7).unwrap(), -7);
    }

    #[test]
    fn missing_tables_are_identity() {
        let t = translator();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);

        assert_eq!(t.to_meta(&a1, "chr2", 400).unwrap(), 400);
        assert_eq!(t.to_meta(&Haplotype::Reference, "chr1", 400).unwrap(), 400);
    }

    #[test]
    fn unknown_names_fail() {
        let t = translator();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);

        assert_eq!(
            t.to_meta(&a1, "chrX", 1),
            Err(SyncError::UnknownChromosome("chrX".to_string()))
        );
        assert_eq!(
            t.to_meta(&Haplotype::sample("s9", AlleleId::Allele1), "chr1", 1),
            Err(SyncError::UnknownGenome("s9".to_string()))
        );
    }

    #[test]
    fn snapshots_survive_swaps() {
        let t = translator();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);
        let old = t.snapshot();

        t.swap_tables(TableSet::assemble(vec!["s1".to_string()], vec![None, None]));

        assert_eq!(old.to_meta(&a1, 0, 106).unwrap(), 111);
        assert_eq!(t.to_meta(&a1, "chr1", 106).unwrap(), 106);
    }
}
