use clap::{arg, command, value_parser, ArgAction, ArgMatches, Command};

use crate::core::{translator::Haplotype, variant::AlleleId};

/// Coordinate system named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordSystem {
    Meta,
    Local(Haplotype),
}

impl std::fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordSystem::Meta => write!(f, "meta"),
            CoordSystem::Local(h) => write!(f, "{}", h),
        }
    }
}

/// `meta`, `reference` or `genome:allele`.
pub fn parse_coord_system(s: &str) -> Result<CoordSystem, String> {
    match s {
        "meta" => Ok(CoordSystem::Meta),
        "reference" => Ok(CoordSystem::Local(Haplotype::Reference)),
        _ => {
            let (genome, allele) = s
                .rsplit_once(':')
                .ok_or_else(|| format!("expected meta, reference or genome:allele, got '{}'", s))?;
            let allele = allele
                .parse::<i64>()
                .map_err(|e| format!("invalid allele '{}': {}", allele, e))?;
            let allele = AlleleId::try_from(allele).map_err(|e| e.to_string())?;

            if genome.is_empty() {
                return Err(format!("missing genome name in '{}'", s));
            }
            Ok(CoordSystem::Local(Haplotype::sample(genome, allele)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub chromosome: String,
    pub position: i64,
}

/// `chromosome:position`.
pub fn parse_query(s: &str) -> Result<Query, String> {
    let (chromosome, position) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected chromosome:position, got '{}'", s))?;
    let position = position
        .replace(',', "")
        .parse::<i64>()
        .map_err(|e| format!("invalid position '{}': {}", position, e))?;

    Ok(Query {
        chromosome: chromosome.to_string(),
        position,
    })
}

pub fn build_command() -> Command {
    command!() // requires `cargo` feature
        .arg(
            arg!(
                -c --"chrom-sizes" <chrom_sizes> "chromosome sizes file, name<TAB>length per line"
            )
            .required(true)
            .value_parser(value_parser!(String)),
        )
        .arg(
            arg!(
                -v --variants <variants> "variant table (TSV, optionally gzipped): genome, allele, chromosome, position, kind, length"
            )
            .required(true)
            .value_parser(value_parser!(String)),
        )
        .arg(
            arg!(
                -t --thread <thread> "worker thread number, default is 0 (all cores)"
            )
            .required(false)
            .value_parser(value_parser!(usize))
            .default_value("0")
        )
        .arg(
            arg!(
                -q --query <query> "position to translate, as chromosome:position; may be repeated"
            )
            .required(false)
            .action(ArgAction::Append)
            .value_parser(parse_query),
        )
        .arg(
            arg!(
                -f --from <from> "coordinate system of the queries: meta, reference or genome:allele"
            )
            .required(false)
            .value_parser(parse_coord_system)
            .default_value("reference")
        )
        .arg(
            arg!(
                -o --to <to> "target coordinate system: meta, reference or genome:allele"
            )
            .required(false)
            .value_parser(parse_coord_system)
            .default_value("meta")
        )
        .arg(
            arg!(
                --"min-indel-length" <min_indel_length> "ignore indels shorter than this, default is 0 (keep all)"
            )
            .required(false)
            .value_parser(value_parser!(i32))
            .default_value("0")
        )
        .arg(
            arg!(
                --progress "show progress bars"
            )
            .required(false)
            .action(ArgAction::SetTrue)
        )
        .arg(
            arg!(
                --verbose "enable debug logging"
            )
            .required(false)
            .action(ArgAction::SetTrue)
        )
}

pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub chrom_sizes_file: String,
    pub variants_file: String,
    pub thread_num: usize,
    pub queries: Vec<Query>,
    pub from: CoordSystem,
    pub to: CoordSystem,
    pub min_indel_length: i32,
    pub show_progress: bool,
    pub verbose: bool,
}

impl RunConfig {
    fn from_args(mut args: ArgMatches) -> RunConfig {
        // every id below is declared with a default or as required
        Self {
            chrom_sizes_file: args.remove_one::<String>("chrom-sizes").unwrap_or_default(),
            variants_file: args.remove_one::<String>("variants").unwrap_or_default(),
            thread_num: args.remove_one::<usize>("thread").unwrap_or(0),
            queries: args
                .remove_many::<Query>("query")
                .map(|q| q.collect())
                .unwrap_or_default(),
            from: args
                .remove_one::<CoordSystem>("from")
                .unwrap_or(CoordSystem::Local(Haplotype::Reference)),
            to: args.remove_one::<CoordSystem>("to").unwrap_or(CoordSystem::Meta),
            min_indel_length: args.remove_one::<i32>("min-indel-length").unwrap_or(0),
            show_progress: args.get_flag("progress"),
            verbose: args.get_flag("verbose"),
        }
    }
}

pub fn set_configs() -> RunConfig {
    RunConfig::from_args(parse_args())
}
