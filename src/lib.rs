use std::env;
use std::path::Path;
use crate::gui::application::run_application;
use crate::error::AppRunError;

pub mod config;
pub mod device;
pub mod error;
pub mod gui;
pub mod protocol;
pub mod session;
pub mod surface;

pub fn init_logging(level: log::LevelFilter) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // the bluetooth stack is chatty below warn
        .level_for("btleplug", log::LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(fern::log_file(log_file)?);
    }

    dispatch.apply()?;
    Ok(())
}

pub fn run(config_path: Option<&Path>) -> Result<(), AppRunError> {
    run_application(config_path)?;
    Ok(())
}
