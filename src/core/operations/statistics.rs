use crate::core::{
    chromosome::{Chromosome, ChromosomeList},
    error::Error,
    operation_pool::{OperationPool, PoolError, TaskContext},
    track::BinList,
};

use super::{run_operation, ChromosomeOperation};

/// Running summary of the non-empty bins of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub count: u64,
    pub sum: f64,
    pub sum_of_squares: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreSummary {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl ScoreSummary {
    pub fn add(&mut self, score: f64) {
        self.count += 1;
        self.sum += score;
        self.sum_of_squares += score * score;
        self.min = self.min.min(score);
        self.max = self.max.max(score);
    }

    pub fn merge(&mut self, other: &ScoreSummary) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self.sum_of_squares / self.count as f64 - mean * mean;
        Some(variance.max(0.0).sqrt())
    }
}

pub struct TrackStatistics<'a> {
    pub track: &'a BinList,
}

impl ChromosomeOperation for TrackStatistics<'_> {
    type Output = ScoreSummary;

    fn description(&self) -> String {
        "track statistics".to_string()
    }

    fn compute_chromosome(
        &self,
        _chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error> {
        let mut summary = ScoreSummary::default();
        for &score in self.track.bins(ctx.index()) {
            if ctx.is_stopped() {
                return Ok(None);
            }
            if score != 0.0 {
                summary.add(score);
            }
        }

        Ok((summary.count > 0).then_some(summary))
    }
}

/// Genome-wide summary of a track.
pub fn summarize(pool: &OperationPool, track: &BinList, chromosomes: &ChromosomeList) -> Result<ScoreSummary, PoolError> {
    let per_chromosome = run_operation(pool, &TrackStatistics { track }, chromosomes).into_result()?;

    let mut total = ScoreSummary::default();
    for summary in per_chromosome.iter().flatten() {
        total.merge(summary);
    }

    Ok(total)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::operations::test_support::{chromosomes, pool};

    #[test]
    fn genome_wide_summary() {
        let chrs = chromosomes(&[40, 20, 10]);
        let mut track = BinList::new(10, &chrs);
        track.chromosomes[0] = vec![2.0, 0.0, 4.0, 4.0];
        track.chromosomes[1] = vec![4.0, 5.0];
        track.chromosomes[2] = vec![0.0];

        let total = summarize(&pool(), &track, &chrs).unwrap();
        assert_eq!(total.count, 5);
        assert_eq!(total.min, 2.0);
        assert_eq!(total.max, 5.0);
        assert_eq!(total.mean(), Some(3.8));
        assert!((total.std_dev().unwrap() - 0.979_795_897).abs() < 1e-6);
    }

    #[test]
    fn empty_chromosomes_are_skipped() {
        let chrs = chromosomes(&[40, 20]);
        let track = BinList::new(10, &chrs);

        let per_chr = run_operation(&pool(), &TrackStatistics { track: &track }, &chrs)
            .into_result()
            .unwrap();
        assert_eq!(per_chr, vec![None, None]);

        let total = summarize(&pool(), &track, &chrs).unwrap();
        assert_eq!(total.mean(), None);
        assert_eq!(total.std_dev(), None);
    }
}
