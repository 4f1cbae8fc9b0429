use ncio::app::{self, App};
use ncio::cli::{Args, ConfigDiscovery, Settings};
use ncio::support::FileOption;
use ncio::support::logging;
use std::process::ExitCode;
use tracing::{error, info};

/// Exit status for invalid command lines, matching clap's own usage errors.
const USAGE_ERROR: u8 = 2;

fn main() -> ExitCode {
    // Parse command line arguments; clap exits with status 2 on usage errors
    let args = Args::parse();

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(USAGE_ERROR);
        }
    };

    // Discover and load configuration
    let settings = match ConfigDiscovery::load(args.config.as_deref())
        .and_then(|file| Settings::resolve(&args, file))
    {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("ERROR {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = logging::init(&settings.logto, settings.debug) {
        eprintln!("ERROR Opening log {}: {}", settings.logto, e);
        return ExitCode::FAILURE;
    }

    info!("Starting ncio {}", env!("CARGO_PKG_VERSION"));

    let logto = settings.logto.clone();
    match App::new(settings).run(mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = app::format_error(&e);
            error!("{}", message);
            if logto != FileOption::Stderr {
                eprintln!("{}", message);
            }
            ExitCode::FAILURE
        }
    }
}
