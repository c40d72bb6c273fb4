//! CLI entrypoint: parses arguments, stands up the cohort (sequential or MPI), and drives the
//! concatenation run.

use std::process::ExitCode;

use hdf5_concat::cohort::{want_mpi_env, Cohort, SequentialCohort};
use hdf5_concat::logger;
use hdf5_concat::Config;

fn main() -> ExitCode {
    let config = match Config::parse() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    logger::set_level(config.verbosity);

    #[cfg(feature = "mpi")]
    if want_mpi_env() {
        let cohort = hdf5_concat::cohort::MpiCohort::init();
        return run_with(&config, &cohort);
    }
    #[cfg(not(feature = "mpi"))]
    if want_mpi_env() {
        logger::log_warn("WANT_MPI is set but this binary was built without the `mpi` feature");
    }

    let cohort = SequentialCohort;
    run_with(&config, &cohort)
}

fn run_with(config: &Config, cohort: &dyn Cohort) -> ExitCode {
    logger::set_rank(cohort.rank());
    match hdf5_concat::concat::run(config, cohort) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger::log_error(&format!("{err}"));
            ExitCode::FAILURE
        }
    }
}
