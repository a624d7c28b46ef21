use crate::config::Config;
use crate::error::{Error, Result};

use std::fmt::Display;
use std::fs::OpenOptions;

use simplelog::{ColorChoice, LevelFilter, TerminalMode, TermLogger, WriteLogger};


pub fn init_logger(cfg: &Config) -> Result<()> {
    match cfg.log_type.as_str() {
        "console" => init_term_logger(cfg.log_level),
        "file"    => init_file_logger(cfg.log_level, &cfg.log_file),
        _         => {
            eprintln!(
                "Unsupported log type: {}, only `file` and `console` are supported. Use `console` by default",
                cfg.log_type
            );
            init_term_logger(cfg.log_level)
        }
    }
}


fn prepare_logger_config() -> simplelog::Config {
    simplelog::ConfigBuilder::new()
        .set_time_format_custom(
            simplelog::format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
            )
        )
        // No local offset available (e.g. multi-threaded on unix): stay on UTC.
        .set_time_offset_to_local()
        .unwrap_or_else(|builder| builder)
        .build()
}

fn init_term_logger(level: LevelFilter) -> Result<()> {
    TermLogger::init(
        level,
        prepare_logger_config(),
        TerminalMode::Stderr, ColorChoice::Auto
    )?;
    Ok(())
}

fn init_file_logger(level: LevelFilter, filename: &String) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(filename)?;
    WriteLogger::init(level, prepare_logger_config(), file)?;
    Ok(())
}


/// Returns a closure for `map_err` that logs the error under `module`/`action`
/// and passes it on unchanged.
pub fn get_reporter<'a>(module: &'a str, action: &'a str, qid: &'a str) -> impl Fn(Error) -> Error + 'a {
    move |e: Error| {
        report(module, action, qid, &e);
        e
    }
}

fn report(module: &str, action: &str, qid: &str, e: &dyn Display) {
    if qid.is_empty() {
        error!("[{}] {} failed: {}", module, action, e);
    } else {
        error!("[{}] {} failed [qid={}]: {}", module, action, qid, e);
    }
}
