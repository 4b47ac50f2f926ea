use super::chromosome::ChromosomeList;

/// Fixed-width binned scores, one vector per chromosome in project order.
/// A score of 0 means "no data" for the bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinList {
    pub bin_size: u32,
    pub chromosomes: Vec<Vec<f64>>,
}

impl BinList {
    pub fn new(bin_size: u32, chromosomes: &ChromosomeList) -> Self {
        let chromosomes = chromosomes
            .iter()
            .map(|c| vec![0.0; bin_count(c.length, bin_size)])
            .collect();

        Self {
            bin_size,
            chromosomes,
        }
    }

    /// Collects per-chromosome pool results; skipped chromosomes get no bins.
    pub fn from_results(bin_size: u32, results: Vec<Option<Vec<f64>>>) -> Self {
        Self {
            bin_size,
            chromosomes: results.into_iter().map(Option::unwrap_or_default).collect(),
        }
    }

    pub fn bins(&self, chr_idx: usize) -> &[f64] {
        self.chromosomes.get(chr_idx).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Sets the score of the bin holding a 1-based position.
    pub fn set(&mut self, chr_idx: usize, position: i64, score: f64) {
        if position < 1 || self.bin_size == 0 {
            return;
        }

        let bin = ((position - 1) / self.bin_size as i64) as usize;
        if let Some(slot) = self.chromosomes.get_mut(chr_idx).and_then(|v| v.get_mut(bin)) {
            *slot = score;
        }
    }

    /// Bins covering the 1-based inclusive range `[start, stop]`, clamped to
    /// the chromosome.
    pub fn bin_range(&self, chr_idx: usize, start: i64, stop: i64) -> std::ops::Range<usize> {
        let n = self.bins(chr_idx).len();
        if stop < start || stop < 1 || self.bin_size == 0 {
            return 0..0;
        }

        let first = ((start.max(1) - 1) / self.bin_size as i64) as usize;
        let last = ((stop - 1) / self.bin_size as i64) as usize + 1;
        first.min(n)..last.min(n)
    }
}

pub fn bin_count(length: u32, bin_size: u32) -> usize {
    if bin_size == 0 {
        return 0;
    }

    (length as usize).div_ceil(bin_size as usize)
}

/// A scored stretch of a chromosome, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredInterval {
    pub start: i64,
    pub stop: i64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    pub name: String,
    pub start: i64,
    pub stop: i64,
}
