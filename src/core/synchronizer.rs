use std::sync::Arc;

use super::{
    chromosome::ChromosomeList,
    operation_pool::{OperationPool, PoolError, RunHandle},
    operations::offset_builder::{rebuild_scope, RebuildScope},
    translator::CoordinateTranslator,
    variant::{VariantFilter, VariantSource},
};

/// Owns the variant source, the active filter and the translator whose tables
/// are built from both. Changing either goes through here so the tables never
/// go stale.
pub struct GenomeSynchronizer<S> {
    m_translator: CoordinateTranslator,
    m_source: S,
    m_filter: Box<dyn VariantFilter + Send>,
}

impl<S: VariantSource> GenomeSynchronizer<S> {
    /// No tables are built until the first `rebuild`.
    pub fn new(chromosomes: Arc<ChromosomeList>, source: S, filter: Box<dyn VariantFilter + Send>) -> Self {
        Self {
            m_translator: CoordinateTranslator::new(chromosomes),
            m_source: source,
            m_filter: filter,
        }
    }

    pub fn translator(&self) -> &CoordinateTranslator {
        &self.m_translator
    }

    pub fn source(&self) -> &S {
        &self.m_source
    }

    pub fn filter(&self) -> &dyn VariantFilter {
        self.m_filter.as_ref()
    }

    /// Rebuilds every table. Returns the number of breakpoints.
    pub fn rebuild(&self, pool: &OperationPool) -> Result<usize, PoolError> {
        self.rebuild_scope(pool, &RebuildScope::all(), &RunHandle::new())
    }

    pub fn rebuild_scope(
        &self,
        pool: &OperationPool,
        scope: &RebuildScope,
        handle: &RunHandle,
    ) -> Result<usize, PoolError> {
        rebuild_scope(
            pool,
            &self.m_translator,
            &self.m_source,
            self.m_filter.as_ref(),
            scope,
            handle,
        )
    }

    /// Replaces the filter and rebuilds every table with it.
    pub fn set_filter(
        &mut self,
        pool: &OperationPool,
        filter: Box<dyn VariantFilter + Send>,
    ) -> Result<usize, PoolError> {
        self.set_filter_with(pool, filter, &RunHandle::new())
    }

    /// On failure or cancellation the previous filter is restored, matching the
    /// tables that stay in place.
    pub fn set_filter_with(
        &mut self,
        pool: &OperationPool,
        filter: Box<dyn VariantFilter + Send>,
        handle: &RunHandle,
    ) -> Result<usize, PoolError> {
        let previous = std::mem::replace(&mut self.m_filter, filter);
        let res = self.rebuild_scope(pool, &RebuildScope::all(), handle);
        if res.is_err() {
            log::warn!("filter change not applied, keeping the previous filter");
            self.m_filter = previous;
        }
        res
    }

    /// Applies `edit` to the source, then rebuilds the tables in `scope`.
    ///
    /// The edit stays applied when the rebuild fails; call `rebuild` once the
    /// source is fixed.
    pub fn edit_source<F>(&mut self, pool: &OperationPool, scope: &RebuildScope, edit: F) -> Result<usize, PoolError>
    where
        F: FnOnce(&mut S),
    {
        edit(&mut self.m_source);
        self.rebuild_scope(pool, scope, &RunHandle::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{
        error::SyncError,
        operations::test_support::{chromosomes, pool},
        translator::Haplotype,
        variant::{AlleleId, InMemoryVariants, KindFilter, MinLengthFilter, PassAll, Variant},
    };

    fn synchronizer() -> GenomeSynchronizer<InMemoryVariants> {
        let mut src = InMemoryVariants::new();
        src.push("s1", AlleleId::Allele1, "chr1", Variant::insertion(100, 5));
        src.push("s1", AlleleId::Allele1, "chr1", Variant::deletion(300, 3));
        src.push("s2", AlleleId::Allele2, "chr2", Variant::deletion(20, 4));
        GenomeSynchronizer::new(chromosomes(&[1000, 500]), src, Box::new(PassAll))
    }

    #[test]
    fn set_filter_rebuilds_tables() {
        let pool = pool();
        let mut sync = synchronizer();
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);

        assert_eq!(
            sync.translator().to_meta(&a1, "chr1", 106),
            Err(SyncError::UnknownGenome("s1".to_string()))
        );
        sync.rebuild(&pool).unwrap();
        assert_eq!(sync.translator().to_meta(&a1, "chr1", 300).unwrap(), 308);

        let breakpoints = sync
            .set_filter(
                &pool,
                Box::new(KindFilter {
                    snp: true,
                    insertion: false,
                    deletion: true,
                }),
            )
            .unwrap();
        assert_eq!(breakpoints, 2);
        assert!(!sync.filter().passes(&Variant::insertion(1, 2)));
        assert_eq!(sync.translator().to_meta(&a1, "chr1", 106).unwrap(), 106);
        assert_eq!(sync.translator().to_meta(&a1, "chr1", 300).unwrap(), 303);

        sync.set_filter(&pool, Box::new(MinLengthFilter(4))).unwrap();
        assert_eq!(sync.translator().to_meta(&a1, "chr1", 300).unwrap(), 305);
        let s2 = Haplotype::sample("s2", AlleleId::Allele2);
        assert_eq!(sync.translator().to_meta(&s2, "chr2", 30).unwrap(), 34);
    }

    #[test]
    fn cancelled_filter_change_keeps_filter_and_tables() {
        let pool = pool();
        let mut sync = synchronizer();
        sync.rebuild(&pool).unwrap();
        let before = sync.translator().snapshot();

        let handle = RunHandle::new();
        handle.stop();
        let res = sync.set_filter_with(&pool, Box::new(MinLengthFilter(100)), &handle);
        assert!(matches!(res, Err(PoolError::Cancelled)));

        assert!(sync.filter().passes(&Variant::insertion(1, 2)));
        assert!(Arc::ptr_eq(&before, &sync.translator().snapshot()));
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);
        assert_eq!(sync.translator().to_meta(&a1, "chr1", 300).unwrap(), 308);
    }

    #[test]
    fn source_edit_rebuilds_its_scope() {
        let pool = pool();
        let mut sync = synchronizer();
        sync.rebuild(&pool).unwrap();
        let before = sync.translator().snapshot();

        let scope = RebuildScope::genomes(&["s2"]).with_chromosomes(&["chr2"]);
        sync.edit_source(&pool, &scope, |src| {
            src.push("s2", AlleleId::Allele2, "chr2", Variant::insertion(100, 7));
        })
        .unwrap();

        let s2 = Haplotype::sample("s2", AlleleId::Allele2);
        assert_eq!(sync.translator().to_meta(&s2, "chr2", 110).unwrap(), 121);
        let a1 = Haplotype::sample("s1", AlleleId::Allele1);
        assert!(sync.translator().snapshot().shares_table(&before, &a1, 0));
        assert_eq!(sync.source().len(), 4);
    }
}
