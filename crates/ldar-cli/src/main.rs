use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use ldar_batch::{cost_mitigation, run_batch, write_batch_reports, write_economics};
use ldar_core::{LdarError, Paths};
use ldar_io::read_and_validate_parameters;

mod cli;

use cli::Cli;

/// Exit codes: 0 success, 1 simulation failure, 2 parameter validation
/// failure.
fn main() {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let mut settings = match read_and_validate_parameters(&cli.parameter_files) {
        Ok(settings) => settings,
        Err(err) => {
            error!(%err, "parameter validation failed");
            return 2;
        }
    };
    if let Some(dir) = cli.input_dir {
        settings.input_directory = dir;
    }
    if let Some(dir) = cli.output_dir {
        settings.output_directory = dir;
    }
    if settings.programs.is_empty() {
        error!("no programs supplied; nothing to simulate");
        return 2;
    }

    let paths = Paths::new(
        settings.input_directory.clone(),
        settings.output_directory.clone(),
    );

    let summary = match run_batch(&settings, &paths) {
        Ok(summary) => summary,
        Err(err) => {
            // A grid-out-of-range site surfaces here as a fatal init error
            if err.downcast_ref::<LdarError>().is_some() {
                error!(%err, "simulation setup failed");
            } else {
                error!(%err, "batch run failed");
            }
            return 1;
        }
    };

    info!(
        success = summary.success,
        failure = summary.failure,
        manifest = %summary.manifest_path.display(),
        "batch complete"
    );

    if settings.write_data && !summary.results.is_empty() {
        if let Err(err) = write_batch_reports(&paths.output_dir, &summary.results) {
            error!(%err, "batch reporting failed");
            return 1;
        }
        let rows = cost_mitigation(&summary.results, &settings.baseline_program);
        if let Err(err) = write_economics(&paths.output_dir, &rows) {
            error!(%err, "economics reporting failed");
            return 1;
        }
    }

    if summary.failure > 0 {
        1
    } else {
        0
    }
}
