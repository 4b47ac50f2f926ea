use rustc_hash::FxHashMap;

use super::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chromosome {
    pub name: String,
    pub length: u32,
}

impl Chromosome {
    pub fn new(name: impl Into<String>, length: i64) -> Result<Self, SyncError> {
        let name = name.into();
        if length < 0 {
            return Err(SyncError::NegativeChromosomeLength { name, length });
        }

        let length = match u32::try_from(length) {
            Ok(length) => length,
            Err(_) => return Err(SyncError::ChromosomeTooLong { name, length }),
        };

        Ok(Self { name, length })
    }
}

/// The project's chromosome set, in the order used for pool submission.
#[derive(Debug, Clone, Default)]
pub struct ChromosomeList {
    m_chromosomes: Vec<Chromosome>,
    m_index: FxHashMap<String, usize>,
}

impl ChromosomeList {
    pub fn new(chromosomes: Vec<Chromosome>) -> Self {
        let m_index = chromosomes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        Self {
            m_chromosomes: chromosomes,
            m_index,
        }
    }

    pub fn len(&self) -> usize {
        self.m_chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m_chromosomes.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Chromosome> {
        self.m_chromosomes.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Result<usize, SyncError> {
        self.m_index
            .get(name)
            .copied()
            .ok_or_else(|| SyncError::UnknownChromosome(name.to_string()))
    }

    pub fn by_name(&self, name: &str) -> Result<&Chromosome, SyncError> {
        Ok(&self.m_chromosomes[self.index_of(name)?])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chromosome> {
        self.m_chromosomes.iter()
    }

    /// Sum of all chromosome lengths.
    pub fn genome_length(&self) -> u64 {
        self.m_chromosomes.iter().map(|c| c.length as u64).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn negative_length_is_rejected() {
        let err = Chromosome::new("chr1", -5).unwrap_err();
        assert_eq!(
            err,
            SyncError::NegativeChromosomeLength {
                name: "chr1".to_string(),
                length: -5
            }
        );
    }

    #[test]
    fn oversized_length_is_rejected() {
        let length = u32::MAX as i64 + 1;
        let err = Chromosome::new("chr1", length).unwrap_err();
        assert_eq!(
            err,
            SyncError::ChromosomeTooLong {
                name: "chr1".to_string(),
                length
            }
        );
        assert!(err.to_string().contains("too long"));
        assert_eq!(Chromosome::new("chr1", u32::MAX as i64).unwrap().length, u32::MAX);
    }

    #[test]
    fn lookup_by_name() {
        let list = ChromosomeList::new(vec![
            Chromosome::new("chr1", 1000).unwrap(),
            Chromosome::new("chr2", 500).unwrap(),
        ]);

        assert_eq!(list.index_of("chr2").unwrap(), 1);
        assert_eq!(list.by_name("chr1").unwrap().length, 1000);
        assert_eq!(list.genome_length(), 1500);
        assert!(matches!(
            list.index_of("chrX"),
            Err(SyncError::UnknownChromosome(_))
        ));
    }
}
