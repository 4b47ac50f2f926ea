use crate::core::{
    chromosome::{Chromosome, ChromosomeList},
    error::Error,
    operation_pool::{OperationPool, PoolError, TaskContext},
    track::BinList,
};

use super::{run_operation, ChromosomeOperation};

/// Centred moving average over `2 * half_width + 1` bins.
pub struct MovingAverage<'a> {
    pub track: &'a BinList,
    pub half_width: usize,
    /// Leave empty bins empty and keep them out of the averages.
    pub ignore_null: bool,
}

impl ChromosomeOperation for MovingAverage<'_> {
    type Output = Vec<f64>;

    fn description(&self) -> String {
        format!("moving average, window of {} bins", 2 * self.half_width + 1)
    }

    fn compute_chromosome(
        &self,
        _chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error> {
        let bins = self.track.bins(ctx.index());
        if bins.is_empty() {
            return Ok(None);
        }

        let n = bins.len();
        let mut smoothed = vec![0.0; n];

        // running sums over [lo, hi)
        let (mut lo, mut hi) = (0_usize, 0_usize);
        let (mut sum, mut count) = (0.0_f64, 0_usize);

        for i in 0..n {
            if ctx.is_stopped() {
                return Ok(None);
            }

            let want_hi = (i + self.half_width + 1).min(n);
            while hi < want_hi {
                if !self.ignore_null || bins[hi] != 0.0 {
                    sum += bins[hi];
                    count += 1;
                }
                hi += 1;
            }

            let want_lo = i.saturating_sub(self.half_width);
            while lo < want_lo {
                if !self.ignore_null || bins[lo] != 0.0 {
                    sum -= bins[lo];
                    count -= 1;
                }
                lo += 1;
            }

            if self.ignore_null && bins[i] == 0.0 {
                continue;
            }

            if count > 0 {
                smoothed[i] = sum / count as f64;
            }
        }

        Ok(Some(smoothed))
    }
}

/// Gaussian kernel smoothing. `sigma` is in bases.
pub struct GaussianSmoothing<'a> {
    pub track: &'a BinList,
    pub sigma: f64,
}

impl GaussianSmoothing<'_> {
    /// Kernel weights for bin distances 0..=3 sigma.
    fn kernel(&self) -> Vec<f64> {
        let bin_size = self.track.bin_size.max(1) as f64;
        if self.sigma <= 0.0 {
            return vec![1.0];
        }

        let half_width = (3.0 * self.sigma / bin_size).ceil() as usize;
        (0..=half_width)
            .map(|d| {
                let x = d as f64 * bin_size;
                (-(x * x) / (2.0 * self.sigma * self.sigma)).exp()
            })
            .collect()
    }
}

impl ChromosomeOperation for GaussianSmoothing<'_> {
    type Output = Vec<f64>;

    fn description(&self) -> String {
        format!("gaussian smoothing, sigma {}", self.sigma)
    }

    fn compute_chromosome(
        &self,
        _chromosome: &Chromosome,
        ctx: &TaskContext<'_>,
    ) -> Result<Option<Self::Output>, Error> {
        let bins = self.track.bins(ctx.index());
        if bins.is_empty() {
            return Ok(None);
        }

        let kernel = self.kernel();
        let half_width = kernel.len() - 1;
        let n = bins.len();
        let mut smoothed = vec![0.0; n];

        for i in 0..n {
            if ctx.is_stopped() {
                return Ok(None);
            }

            let (mut weighted, mut weights) = (0.0, 0.0);
            let lo = i.saturating_sub(half_width);
            let hi = (i + half_width + 1).min(n);
            for (j, &score) in bins.iter().enumerate().take(hi).skip(lo) {
                if score != 0.0 {
                    let w = kernel[i.abs_diff(j)];
                    weighted += score * w;
                    weights += w;
                }
            }

            if weights > 0.0 {
                smoothed[i] = weighted / weights;
            }
        }

        Ok(Some(smoothed))
    }
}

/// Runs a smoothing operation into a new track with the bin size of `track`.
pub fn smooth<O>(
    pool: &OperationPool,
    op: &O,
    track: &BinList,
    chromosomes: &ChromosomeList,
) -> Result<BinList, PoolError>
where
    O: ChromosomeOperation<Output = Vec<f64>>,
{
    let results = run_operation(pool, op, chromosomes).into_result()?;
    Ok(BinList::from_results(track.bin_size, results))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{
        operation_pool::RunHandle,
        operations::{
            run_operation_with,
            test_support::{chromosomes, pool},
        },
    };

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn moving_average() {
        let chrs = chromosomes(&[50, 30]);
        let mut track = BinList::new(10, &chrs);
        track.chromosomes[0] = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        track.chromosomes[1] = vec![0.0, 6.0, 0.0];

        let op = MovingAverage {
            track: &track,
            half_width: 1,
            ignore_null: false,
        };
        let smoothed = smooth(&pool(), &op, &track, &chrs).unwrap();
        assert_eq!(smoothed.bin_size, 10);

        assert_eq!(smoothed.bins(0), &[1.5, 2.0, 3.0, 4.0, 4.5]);
        assert_eq!(smoothed.bins(1), &[3.0, 2.0, 3.0]);
    }

    #[test]
    fn moving_average_ignoring_nulls() {
        let chrs = chromosomes(&[50]);
        let mut track = BinList::new(10, &chrs);
        track.chromosomes[0] = vec![2.0, 0.0, 4.0, 0.0, 0.0];

        let op = MovingAverage {
            track: &track,
            half_width: 1,
            ignore_null: true,
        };
        let res = run_operation(&pool(), &op, &chrs).into_result().unwrap();
        assert_eq!(res[0].as_deref(), Some(&[2.0, 0.0, 4.0, 0.0, 0.0][..]));

        let op = MovingAverage {
            track: &track,
            half_width: 2,
            ignore_null: true,
        };
        let res = run_operation(&pool(), &op, &chrs).into_result().unwrap();
        assert_eq!(res[0].as_deref(), Some(&[3.0, 0.0, 3.0, 0.0, 0.0][..]));
    }

    #[test]
    fn gaussian_keeps_flat_tracks_flat() {
        let chrs = chromosomes(&[100]);
        let mut track = BinList::new(10, &chrs);
        track.chromosomes[0] = vec![5.0; 10];

        let op = GaussianSmoothing {
            track: &track,
            sigma: 20.0,
        };
        let res = run_operation(&pool(), &op, &chrs).into_result().unwrap();
        assert!(res[0].as_ref().unwrap().iter().all(|v| approx(*v, 5.0)));
    }

    #[test]
    fn gaussian_spreads_a_peak_symmetrically() {
        let chrs = chromosomes(&[90]);
        let mut track = BinList::new(10, &chrs);
        track.chromosomes[0] = vec![0.0, 0.0, 0.0, 1.0, 9.0, 1.0, 0.0, 0.0, 0.0];

        let op = GaussianSmoothing {
            track: &track,
            sigma: 10.0,
        };
        let res = run_operation(&pool(), &op, &chrs).into_result().unwrap();
        let v = res[0].as_ref().unwrap();

        assert!(approx(v[3], v[5]));
        assert!(v[4] < 9.0 && v[4] > v[3]);
        assert!(v[1] > 0.0);
        // only bin 3 reaches bin 0, and weights are normalised
        assert!(approx(v[0], 1.0));
    }

    #[test]
    fn stopped_run_leaves_no_partial_tracks() {
        let chrs = chromosomes(&[1000, 1000]);
        let track = BinList::new(1, &chrs);
        let op = MovingAverage {
            track: &track,
            half_width: 3,
            ignore_null: false,
        };

        let handle = RunHandle::new();
        handle.stop();
        let report = run_operation_with(&pool(), &op, &chrs, &handle);
        assert!(report.results.iter().all(|r| r.is_none()));
    }
}
