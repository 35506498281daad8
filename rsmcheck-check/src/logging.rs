// re-export for convenience
pub use slog::Logger;
#[allow(unused_imports)]
pub use slog::{debug, error, info, o, trace, warn};

use slog::Drain;
use std::fs::OpenOptions;
use std::path::PathBuf;

use rsmcheck_utils::RsmResult;

/// Configuration describing what settings a logger should be created with.
pub struct LoggingConfig {
    /// The diagnostics file. Appended to unless `overwrite` is set.
    pub logfile: PathBuf,
    /// Whether to truncate an existing diagnostics file.
    pub overwrite: bool,
}

/// Build the root logger draining into the diagnostics file.
pub fn initialize_logger(conf: &LoggingConfig) -> RsmResult<Logger> {
    let mut options = OpenOptions::new();
    options.create(true);
    if conf.overwrite {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let file = options.open(&conf.logfile)?;

    let decorator = slog_term::PlainDecorator::new(file);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain)
        .chan_size(1024)
        .overflow_strategy(slog_async::OverflowStrategy::Block)
        .build()
        .fuse();

    Ok(slog::Logger::root(drain, o!()))
}

/// A logger that drops everything, for tests.
pub fn discard_logger() -> Logger {
    slog::Logger::root(slog::Discard, o!())
}
