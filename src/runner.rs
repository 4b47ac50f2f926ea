use std::{
    io::{self, BufWriter, Write},
    sync::Arc,
    time::Instant,
};

use anyhow::{anyhow, Context};

use crate::{
    argparse::{CoordSystem, Query, RunConfig},
    core::{
        error::Error,
        offset_table::MetaPosition,
        operation_pool::{OperationPool, PoolConfig},
        synchronizer::GenomeSynchronizer,
        translator::CoordinateTranslator,
        variant::{MinLengthFilter, PassAll, VariantFilter},
        variant_reader::{read_chrom_sizes, read_variants},
    },
    utils::{
        check_file_valid,
        logging::{init_logger, level_for},
    },
};

fn boxed(e: Error) -> anyhow::Error {
    anyhow!(e)
}

pub fn run(config: RunConfig) -> anyhow::Result<()> {
    init_logger(level_for(config.verbose))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    execute(&config, &mut out)?;
    out.flush()?;

    Ok(())
}

/// Loads the inputs, builds the offset tables and writes one line per query.
pub fn execute(config: &RunConfig, out: &mut impl Write) -> anyhow::Result<()> {
    check_file_valid(&config.chrom_sizes_file)?;
    check_file_valid(&config.variants_file)?;

    let timer = Instant::now();
    let chromosomes = read_chrom_sizes(&config.chrom_sizes_file)
        .map_err(boxed)
        .with_context(|| format!("reading {}", config.chrom_sizes_file))?;
    let variants = read_variants(&config.variants_file)
        .map_err(boxed)
        .with_context(|| format!("reading {}", config.variants_file))?;
    log::info!(
        "{} chromosomes, {} variants loaded",
        chromosomes.len(),
        variants.len()
    );

    let pool = OperationPool::new(PoolConfig {
        threads: config.thread_num,
        show_progress: config.show_progress,
    })
    .map_err(boxed)?;
    log::debug!("start with {} threads", pool.worker_count());

    let filter: Box<dyn VariantFilter + Send> = if config.min_indel_length > 0 {
        Box::new(MinLengthFilter(config.min_indel_length))
    } else {
        Box::new(PassAll)
    };

    let sync = GenomeSynchronizer::new(Arc::new(chromosomes), variants, filter);
    sync.rebuild(&pool).context("building offset tables")?;

    for query in &config.queries {
        let line = translate_query(sync.translator(), query, &config.from, &config.to)?;
        writeln!(out, "{}", line)?;
    }

    log::info!("done in {:.2} seconds", timer.elapsed().as_secs_f32());
    Ok(())
}

/// `chromosome<TAB>position<TAB>translated`, with the bordering local
/// positions appended when a meta position falls into a gap.
fn translate_query(
    translator: &CoordinateTranslator,
    query: &Query,
    from: &CoordSystem,
    to: &CoordSystem,
) -> anyhow::Result<String> {
    let Query { chromosome, position } = query;
    let chr = chromosome.as_str();

    let (translated, gap) = match (from, to) {
        (CoordSystem::Meta, CoordSystem::Meta) => (*position, None),
        (CoordSystem::Local(h), CoordSystem::Meta) => (translator.to_meta(h, chr, *position)?, None),
        (CoordSystem::Meta, CoordSystem::Local(h)) => {
            let resolved = translator.resolve_meta(h, chr, *position)?;
            (translator.from_meta(h, chr, *position)?, Some(resolved))
        }
        (CoordSystem::Local(a), CoordSystem::Local(b)) => (translator.translate(a, *position, chr, b)?, None),
    };

    Ok(match gap {
        Some(MetaPosition::Gap { before, after }) => {
            format!("{}\t{}\t{}\tgap:{}-{}", chromosome, position, translated, before, after)
        }
        _ => format!("{}\t{}\t{}", chromosome, position, translated),
    })
}
