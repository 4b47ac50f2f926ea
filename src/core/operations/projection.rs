use std::sync::Arc;

use crate::core::{
    chromosome::{Chromosome, ChromosomeList},
    error::Error,
    operation_pool::{OperationPool, PoolError, TaskContext},
    track::ScoredInterval,
    translator::{Haplotype, TableSet},
};

use super::{run_operation, ChromosomeOperation};

/// Remaps the scored intervals of one haplotype into meta-genome coordinates.
///
/// Works on a snapshot of the tables, so a concurrent rebuild does not mix
/// two generations within one projection.
pub struct ProjectToMeta<'a> {
    pub tables: Arc<TableSet>,
    pub haplotype: Haplotype,
    /// Intervals per chromosome, in chromosome-list order.
    pub intervals: &'a [Vec<ScoredInterval>],
}

impl ChromosomeOperation for ProjectToMeta<'_> {
    type Output = Vec<ScoredInterval>;

    fn description(&self) -> String {
        format!("projecting {} to meta coordinates", self.haplotype)
    }

    fn compute_chromosome(
        &self,
        _chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error> {
        let Some(intervals) = self.intervals.get(ctx.index()) else {
            return Ok(None);
        };

        let mut projected = Vec::with_capacity(intervals.len());
        for interval in intervals {
            if ctx.is_stopped() {
                return Ok(None);
            }

            projected.push(ScoredInterval {
                start: self.tables.to_meta(&self.haplotype, ctx.index(), interval.start)?,
                stop: self.tables.to_meta(&self.haplotype, ctx.index(), interval.stop)?,
                score: interval.score,
            });
        }

        Ok(Some(projected))
    }
}

pub fn project_to_meta(
    pool: &OperationPool,
    op: &ProjectToMeta<'_>,
    chromosomes: &ChromosomeList,
) -> Result<Vec<Vec<ScoredInterval>>, PoolError> {
    let results = run_operation(pool, op, chromosomes).into_result()?;
    Ok(results.into_iter().map(Option::unwrap_or_default).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{
        error::SyncError,
        operation_pool::RunPhase,
        operations::{
            offset_builder::rebuild_offset_tables,
            test_support::{chromosomes, pool},
        },
        translator::CoordinateTranslator,
        variant::{AlleleId, InMemoryVariants, PassAll, Variant},
    };

    fn interval(start: i64, stop: i64, score: f64) -> ScoredInterval {
        ScoredInterval { start, stop, score }
    }

    fn translator(pool: &OperationPool) -> CoordinateTranslator {
        let mut src = InMemoryVariants::new();
        src.push("s1", AlleleId::Allele1, "chr1", Variant::insertion(100, 5));
        src.push("s1", AlleleId::Allele1, "chr1", Variant::deletion(300, 3));

        let translator = CoordinateTranslator::new(chromosomes(&[1000, 500]));
        rebuild_offset_tables(pool, &translator, &src, &PassAll).unwrap();
        translator
    }

    #[test]
    fn intervals_follow_the_offsets() {
        let pool = pool();
        let translator = translator(&pool);
        let intervals = vec![
            vec![interval(10, 50, 1.0), interval(106, 300, 2.5)],
            vec![interval(1, 20, 4.0)],
        ];

        let op = ProjectToMeta {
            tables: translator.snapshot(),
            haplotype: Haplotype::sample("s1", AlleleId::Allele1),
            intervals: &intervals,
        };
        let projected = project_to_meta(&pool, &op, translator.chromosomes()).unwrap();

        assert_eq!(
            projected,
            vec![
                vec![interval(10, 50, 1.0), interval(111, 308, 2.5)],
                vec![interval(1, 20, 4.0)],
            ]
        );
    }

    #[test]
    fn unknown_genome_fails_the_run() {
        let pool = pool();
        let translator = translator(&pool);
        let intervals = vec![vec![interval(10, 50, 1.0)], vec![]];

        let op = ProjectToMeta {
            tables: translator.snapshot(),
            haplotype: Haplotype::sample("nobody", AlleleId::Allele2),
            intervals: &intervals,
        };
        let report = run_operation(&pool, &op, translator.chromosomes());
        assert_eq!(report.phase, RunPhase::Failed);

        match report.into_result() {
            Err(PoolError::Failed(e)) => assert_eq!(
                e.downcast_ref::<SyncError>(),
                Some(&SyncError::UnknownGenome("nobody".to_string()))
            ),
            _ => panic!("expected a failed run"),
        }
    }
}
