use std::path::PathBuf;
use clap::Parser;
use log::{error, info, LevelFilter};
use midi_pad_remote::{init_logging, run};
use midi_pad_remote::error::{AppRunError, ConfigError};

/// Remote control surface for the MIDI_Controller bluetooth peripheral
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Config file to use instead of the portable or per-user one
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();

    if let Err(err) = init_logging(args.log_level) {
        eprintln!("Failed to initialize logger: {}", err);
    }
    info!(concat!("MIDI Pad Remote ", env!("CARGO_PKG_VERSION")));

    match run(args.config.as_deref()) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("This application has already been started");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(())
    }
}
