use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Logs to stderr. `level` applies to this crate; dependencies stay at warn.
pub fn init_logger(level: LevelFilter) -> anyhow::Result<log4rs::Handle> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "[{d(%Y-%m-%d %H:%M:%S)}] {T} {t} {l}>> {m}{n}",
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().build(env!("CARGO_CRATE_NAME"), level))
        .build(Root::builder().appender("stderr").build(LevelFilter::Warn))?;

    Ok(log4rs::init_config(config)?)
}

pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
