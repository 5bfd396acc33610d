use std::path::PathBuf;
use std::process;

use clap::Parser;
use cpo_config::resolve_config;
use cpo_core::exit_codes::ExitCode;
use cpo_core::fetch::HttpSource;
use cpo_core::logging::{self, LogFormat};
use cpo_core::pipeline::Pipeline;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "cpo-etl",
    version,
    about = "Fetch live carpark availability, normalize it and append to the occupancy history"
)]
struct Cli {
    /// Configuration file (TOML or JSON). Falls back to CPO_CONFIG, then the
    /// user config directory, then built-in defaults.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("cpo-etl: {e}");
    }

    let resolved = match resolve_config(cli.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            let err = cpo_common::Error::from(e);
            error!(code = err.code(), error = %err, "configuration rejected");
            process::exit(ExitCode::ConfigError.as_i32());
        }
    };
    info!(
        origin = ?resolved.origin,
        sites = resolved.config.source.sites.len(),
        data_dir = %resolved.config.storage.data_dir.display(),
        "starting run"
    );

    let source = HttpSource::new(&resolved.config.source);
    let report = Pipeline::new(&resolved.config, &resolved.capacities, &source).run();
    report.log();

    let code = ExitCode::from_report(&report);
    if code.is_error() {
        error!(exit_code = code.as_i32(), "run did not complete");
    }
    process::exit(code.as_i32());
}
