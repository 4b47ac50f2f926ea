//! Plain-text inputs of the command line tool.
//!
//! Chromosome sizes: `name<TAB>length`, one per line.
//!
//! Variant table: `genome<TAB>allele<TAB>chromosome<TAB>position<TAB>kind<TAB>length`
//! where kind is `SNP`, `INS` or `DEL`. Rows whose genome is `reference` feed
//! the reference table and ignore the allele column. Both files may be gzipped
//! and may carry `#` comment lines.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use flate2::read::MultiGzDecoder;

use super::{
    chromosome::{Chromosome, ChromosomeList},
    error::{Error, SyncError},
    variant::{AlleleId, InMemoryVariants, Variant},
};

pub const REFERENCE_GENOME: &str = "reference";

fn is_gzipped(file_name: &Path) -> bool {
    file_name.extension().is_some_and(|ext| ext == "gz")
}

pub fn open_text(file_name: impl AsRef<Path>) -> Result<Box<dyn BufRead>, Error> {
    let file_name = file_name.as_ref();
    let file = File::open(file_name)?;

    if is_gzipped(file_name) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Yields `(line number, fields)` of every data line.
fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, Vec<String>), Error>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Err(e) => Some(Err(e.into())),
            Ok(line) => {
                let line = line.trim_end();
                if line.is_empty() || line.starts_with('#') {
                    None
                } else {
                    Some(Ok((i + 1, line.split('\t').map(str::to_string).collect())))
                }
            }
        })
}

fn parse_error(line: usize, msg: impl Into<String>) -> SyncError {
    SyncError::Parse { line, msg: msg.into() }
}

fn field<T: std::str::FromStr>(fields: &[String], col: usize, name: &str, line: usize) -> Result<T, SyncError> {
    let raw = fields
        .get(col)
        .ok_or_else(|| parse_error(line, format!("missing column '{}'", name)))?;

    raw.trim()
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {} '{}'", name, raw)))
}

pub fn parse_chrom_sizes<R: BufRead>(reader: R) -> Result<ChromosomeList, Error> {
    let mut chromosomes = Vec::new();
    for record in records(reader) {
        let (line, fields) = record?;
        let length: i64 = field(&fields, 1, "length", line)?;
        let chromosome = Chromosome::new(fields[0].trim(), length).map_err(|e| parse_error(line, e.to_string()))?;
        chromosomes.push(chromosome);
    }

    log::debug!("{} chromosomes read", chromosomes.len());
    Ok(ChromosomeList::new(chromosomes))
}

pub fn read_chrom_sizes(file_name: impl AsRef<Path>) -> Result<ChromosomeList, Error> {
    parse_chrom_sizes(open_text(file_name)?)
}

fn parse_variant(fields: &[String], line: usize) -> Result<Variant, SyncError> {
    let position: i64 = field(fields, 3, "position", line)?;
    let kind: String = field(fields, 4, "kind", line)?;

    match kind.to_ascii_uppercase().as_str() {
        "SNP" => Ok(Variant::snp(position)),
        "INS" => Ok(Variant::insertion(position, field(fields, 5, "length", line)?)),
        "DEL" => Ok(Variant::deletion(position, field(fields, 5, "length", line)?)),
        _ => Err(parse_error(line, format!("unknown variant kind '{}'", kind))),
    }
}

/// Reads a variant table. Rows keep their file order; sorting is checked when
/// the offset tables are built.
pub fn parse_variants<R: BufRead>(reader: R) -> Result<InMemoryVariants, Error> {
    let mut variants = InMemoryVariants::new();
    for record in records(reader) {
        let (line, fields) = record?;
        if fields.len() < 5 {
            return Err(parse_error(line, format!("expected at least 5 columns, found {}", fields.len())).into());
        }

        let genome = fields[0].trim();
        let chromosome = fields[2].trim();
        let variant = parse_variant(&fields, line)?;

        if genome == REFERENCE_GENOME {
            variants.push_reference(chromosome, variant);
        } else {
            let raw: i64 = field(&fields, 1, "allele", line)?;
            let allele = AlleleId::try_from(raw).map_err(|e| parse_error(line, e.to_string()))?;
            variants.push(genome, allele, chromosome, variant);
        }
    }

    log::debug!("{} variants read", variants.len());
    Ok(variants)
}

pub fn read_variants(file_name: impl AsRef<Path>) -> Result<InMemoryVariants, Error> {
    parse_variants(open_text(file_name)?)
}
