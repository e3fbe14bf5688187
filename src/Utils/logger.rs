//! Terminal logging through `simplelog`.
//!
//! The flame core only talks to the `log` facade; the binary installs a terminal logger once at
//! startup. Rank-dependent messages are filtered at the call sites (only the first rank reports
//! collective results), so one logger serves every in-process rank.
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, LevelPadding, TermLogger, TerminalMode};

/// Installs the terminal logger; fails if another logger is already set.
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Debug)
        .set_level_padding(LevelPadding::Right)
        .build();
    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}
