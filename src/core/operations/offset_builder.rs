use rustc_hash::FxHashSet;

use crate::core::{
    chromosome::{Chromosome, ChromosomeList},
    error::{Error, SyncError},
    offset_table::{Emission, OffsetTable, OffsetTableBuilder},
    operation_pool::{OperationPool, PoolError, RunHandle, TaskContext},
    translator::{ChromosomeTables, CoordinateTranslator, TableSet},
    variant::{AlleleId, Variant, VariantFilter, VariantSource},
};

use super::{run_operation_with, ChromosomeOperation};

/// Which tables a rebuild touches. The default rebuilds everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildScope {
    /// Sample genomes to rebuild. `None` rebuilds every genome of the source
    /// and the reference.
    pub genomes: Option<Vec<String>>,
    /// Chromosomes to rebuild. `None` rebuilds all of them.
    pub chromosomes: Option<Vec<String>>,
}

impl RebuildScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn genomes<S: AsRef<str>>(genomes: &[S]) -> Self {
        Self {
            genomes: Some(genomes.iter().map(|g| g.as_ref().to_string()).collect()),
            chromosomes: None,
        }
    }

    pub fn with_chromosomes<S: AsRef<str>>(mut self, chromosomes: &[S]) -> Self {
        self.chromosomes = Some(chromosomes.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn is_all(&self) -> bool {
        self.genomes.is_none() && self.chromosomes.is_none()
    }
}

/// Builds the offset tables of the reference and of the sample haplotypes in
/// scope, one chromosome per task.
pub struct BuildOffsetTables<'a> {
    source: &'a dyn VariantSource,
    filter: &'a dyn VariantFilter,
    genomes: Vec<String>,
    reference: bool,
    /// Chromosome indices in scope; `None` is every chromosome.
    chromosomes: Option<FxHashSet<usize>>,
}

impl<'a> BuildOffsetTables<'a> {
    pub fn new(source: &'a dyn VariantSource, filter: &'a dyn VariantFilter) -> Self {
        Self {
            source,
            filter,
            genomes: source.genomes(),
            reference: true,
            chromosomes: None,
        }
    }

    /// Restricts the build to `scope`. Names unknown to the source or the
    /// chromosome list are errors.
    pub fn scoped(
        source: &'a dyn VariantSource,
        filter: &'a dyn VariantFilter,
        scope: &RebuildScope,
        chromosomes: &ChromosomeList,
    ) -> Result<Self, SyncError> {
        let mut op = Self::new(source, filter);

        if let Some(genomes) = &scope.genomes {
            if let Some(unknown) = genomes.iter().find(|g| !op.genomes.contains(g)) {
                return Err(SyncError::UnknownGenome(unknown.clone()));
            }
            op.genomes = genomes.clone();
            op.reference = false;
        }

        if let Some(names) = &scope.chromosomes {
            let indices = names
                .iter()
                .map(|name| chromosomes.index_of(name))
                .collect::<Result<FxHashSet<_>, _>>()?;
            op.chromosomes = Some(indices);
        }

        Ok(op)
    }

    pub fn genomes(&self) -> &[String] {
        &self.genomes
    }

    fn build_one(
        &self,
        chromosome: &Chromosome,
        variants: &[Variant],
        emission: Emission,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<OffsetTable>, Error> {
        let mut builder = OffsetTableBuilder::new(&chromosome.name, emission);
        for v in variants {
            if ctx.is_stopped() {
                return Ok(None);
            }
            builder.push(v, self.filter)?;
        }

        Ok(Some(builder.finish()))
    }
}

impl ChromosomeOperation for BuildOffsetTables<'_> {
    type Output = ChromosomeTables;

    fn description(&self) -> String {
        format!("building offset tables for {} genomes", self.genomes.len())
    }

    fn compute_chromosome(
        &self,
        chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error> {
        if self.chromosomes.as_ref().is_some_and(|c| !c.contains(&ctx.index())) {
            return Ok(None);
        }

        let reference = if self.reference {
            let variants = self.source.reference_variants(&chromosome.name);
            let Some(table) = self.build_one(chromosome, variants, Emission::Immediate, ctx)? else {
                return Ok(None);
            };
            Some(table)
        } else {
            None
        };

        let mut samples = Vec::new();
        for genome in &self.genomes {
            for allele in AlleleId::BOTH {
                let variants = self.source.variants(genome, allele, &chromosome.name);
                match self.build_one(chromosome, variants, Emission::Pending, ctx)? {
                    Some(table) if table.is_empty() => {}
                    Some(table) => samples.push((genome.clone(), allele, table)),
                    None => return Ok(None),
                }
            }
        }

        let tables = ChromosomeTables { reference, samples };
        log::debug!("{}: {} breakpoints", chromosome.name, tables.breakpoints());
        Ok(Some(tables))
    }
}

/// Rebuilds every offset table and swaps them into `translator` at once.
///
/// Must run again whenever the variant set or the filter changes. A cancelled
/// or failed rebuild leaves the current tables in place. Returns the number of
/// breakpoints in the new tables.
pub fn rebuild_offset_tables(
    pool: &OperationPool,
    translator: &CoordinateTranslator,
    source: &dyn VariantSource,
    filter: &dyn VariantFilter,
) -> Result<usize, PoolError> {
    rebuild_offset_tables_with(pool, translator, source, filter, &RunHandle::new())
}

pub fn rebuild_offset_tables_with(
    pool: &OperationPool,
    translator: &CoordinateTranslator,
    source: &dyn VariantSource,
    filter: &dyn VariantFilter,
    handle: &RunHandle,
) -> Result<usize, PoolError> {
    rebuild_scope(pool, translator, source, filter, &RebuildScope::all(), handle)
}

/// Rebuilds the tables in `scope` only. The new generation shares every table
/// outside the scope with the current one.
pub fn rebuild_scope(
    pool: &OperationPool,
    translator: &CoordinateTranslator,
    source: &dyn VariantSource,
    filter: &dyn VariantFilter,
    scope: &RebuildScope,
    handle: &RunHandle,
) -> Result<usize, PoolError> {
    let op = BuildOffsetTables::scoped(source, filter, scope, translator.chromosomes())
        .map_err(|e| PoolError::Failed(Box::new(e)))?;
    let results = run_operation_with(pool, &op, translator.chromosomes(), handle).into_result()?;

    let tables = if scope.is_all() {
        TableSet::assemble(op.genomes, results)
    } else {
        translator.snapshot().updated(&op.genomes, results)
    };
    let breakpoints = tables.breakpoints();
    translator.swap_tables(tables);
    log::info!("offset tables rebuilt: {} breakpoints", breakpoints);

    Ok(breakpoints)
}
