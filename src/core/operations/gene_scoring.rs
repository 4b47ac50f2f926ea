use crate::core::{
    chromosome::{Chromosome, ChromosomeList},
    error::Error,
    operation_pool::{OperationPool, PoolError, TaskContext},
    track::{BinList, Gene},
};

use super::{run_operation, ChromosomeOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMethod {
    Mean,
    Max,
    Sum,
}

impl std::fmt::Display for ScoreMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScoreMethod::Mean => "mean",
            ScoreMethod::Max => "max",
            ScoreMethod::Sum => "sum",
        };
        write!(f, "{}", s)
    }
}

/// Scores each gene from the non-empty bins it overlaps. A gene with no data
/// scores 0.
pub struct GeneScoring<'a> {
    pub track: &'a BinList,
    /// Genes per chromosome, in chromosome-list order.
    pub genes: &'a [Vec<Gene>],
    pub method: ScoreMethod,
}

impl GeneScoring<'_> {
    fn score(&self, chr_idx: usize, gene: &Gene) -> f64 {
        let bins = self.track.bins(chr_idx);
        let range = self.track.bin_range(chr_idx, gene.start, gene.stop);
        let mut scores = bins[range].iter().copied().filter(|s| *s != 0.0).peekable();

        if scores.peek().is_none() {
            return 0.0;
        }

        match self.method {
            ScoreMethod::Sum => scores.sum(),
            ScoreMethod::Max => scores.fold(f64::NEG_INFINITY, f64::max),
            ScoreMethod::Mean => {
                let (sum, n) = scores.fold((0.0, 0_usize), |(s, n), x| (s + x, n + 1));
                sum / n as f64
            }
        }
    }
}

impl ChromosomeOperation for GeneScoring<'_> {
    type Output = Vec<f64>;

    fn description(&self) -> String {
        format!("gene scoring ({})", self.method)
    }

    fn compute_chromosome(
        &self,
        _chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error> {
        let Some(genes) = self.genes.get(ctx.index()) else {
            return Ok(None);
        };

        let mut scores = Vec::with_capacity(genes.len());
        for gene in genes {
            if ctx.is_stopped() {
                return Ok(None);
            }
            scores.push(self.score(ctx.index(), gene));
        }

        Ok(Some(scores))
    }
}

/// Scores every gene, returning one score vector per chromosome.
pub fn score_genes(
    pool: &OperationPool,
    op: &GeneScoring<'_>,
    chromosomes: &ChromosomeList,
) -> Result<Vec<Vec<f64>>, PoolError> {
    let results = run_operation(pool, op, chromosomes).into_result()?;
    Ok(results.into_iter().map(Option::unwrap_or_default).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::operations::test_support::{chromosomes, pool};

    fn gene(name: &str, start: i64, stop: i64) -> Gene {
        Gene {
            name: name.to_string(),
            start,
            stop,
        }
    }

    fn setup() -> (std::sync::Arc<ChromosomeList>, BinList, Vec<Vec<Gene>>) {
        let chrs = chromosomes(&[100, 50]);
        let mut track = BinList::new(10, &chrs);
        track.chromosomes[0] = vec![1.0, 3.0, 0.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        track.chromosomes[1] = vec![2.0, 2.0, 2.0, 2.0, 2.0];

        let genes = vec![
            vec![gene("a", 1, 40), gene("b", 45, 90), gene("c", 11, 11)],
            vec![gene("d", 5, 500)],
        ];

        (chrs, track, genes)
    }

    #[test]
    fn score_methods() {
        let (chrs, track, genes) = setup();
        let pool = pool();

        let mut op = GeneScoring {
            track: &track,
            genes: &genes,
            method: ScoreMethod::Mean,
        };
        assert_eq!(score_genes(&pool, &op, &chrs).unwrap(), vec![vec![4.0, 0.0, 3.0], vec![2.0]]);

        op.method = ScoreMethod::Max;
        assert_eq!(score_genes(&pool, &op, &chrs).unwrap(), vec![vec![8.0, 0.0, 3.0], vec![2.0]]);

        op.method = ScoreMethod::Sum;
        assert_eq!(score_genes(&pool, &op, &chrs).unwrap(), vec![vec![12.0, 0.0, 3.0], vec![10.0]]);
    }

    #[test]
    fn chromosomes_without_genes() {
        let (chrs, track, mut genes) = setup();
        genes.truncate(1);

        let op = GeneScoring {
            track: &track,
            genes: &genes,
            method: ScoreMethod::Sum,
        };
        let scores = score_genes(&pool(), &op, &chrs).unwrap();
        assert_eq!(scores[1], Vec::<f64>::new());
    }
}
