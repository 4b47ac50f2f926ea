//! Layer operations computed chromosome by chromosome on the operation pool.

pub mod gene_scoring;
pub mod offset_builder;
pub mod projection;
pub mod smoothing;
pub mod statistics;

use super::{
    chromosome::{Chromosome, ChromosomeList},
    error::Error,
    operation_pool::{OperationPool, PoolReport, PooledTask, RunHandle, TaskContext},
};

/// A computation that splits into independent per-chromosome tasks.
pub trait ChromosomeOperation: Sync {
    type Output: Send;

    fn description(&self) -> String;

    /// Computes one chromosome. Implementations poll `ctx.is_stopped()` in
    /// their inner loop and return early once it is set.
    fn compute_chromosome(
        &self,
        chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error>;
}

pub fn run_operation<O: ChromosomeOperation>(
    pool: &OperationPool,
    op: &O,
    chromosomes: &ChromosomeList,
) -> PoolReport<O::Output> {
    run_operation_with(pool, op, chromosomes, &RunHandle::new())
}

/// Submits one task per chromosome, in chromosome-list order.
pub fn run_operation_with<O: ChromosomeOperation>(
    pool: &OperationPool,
    op: &O,
    chromosomes: &ChromosomeList,
    handle: &RunHandle,
) -> PoolReport<O::Output> {
    let tasks: Vec<PooledTask<'_, O::Output>> = chromosomes
        .iter()
        .map(|chromosome| {
            Box::new(move |ctx: &TaskContext<'_>| op.compute_chromosome(chromosome, ctx))
                as PooledTask<'_, O::Output>
        })
        .collect();

    pool.start_pool_with(&op.description(), tasks, handle)
}
