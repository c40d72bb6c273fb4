//! Top-level orchestration: opens the output file once, then walks each input file in turn,
//! closing it before moving to the next so file handles never pile up across a long run.

use std::path::Path;

use crate::cohort::Cohort;
use crate::config::Config;
use crate::container;
use crate::error::Result;
use crate::logger;
use crate::provenance::Provenance;
use crate::registry::Registry;
use crate::walker::{self, WalkConfig};

/// Concatenates every input file listed in `config` into `config.output`, in order.
///
/// # Errors
///
/// Returns the first error encountered opening a file, creating a dataset, or copying rows.
/// Earlier inputs already written to the output are not rolled back.
pub fn run(config: &Config, cohort: &dyn Cohort) -> Result<()> {
    let output_file = container::open_output(&config.output, config.append)?;
    let output_root = output_file.group("/").map_err(|source| {
        crate::error::Error::container("/", source)
    })?;

    let registry = Registry::new(config.filters_enabled(cohort));
    let provenance = Provenance::new(config.provenance.as_ref())?;
    let walk = WalkConfig {
        only_groups: config.only_groups.clone(),
        mem_max_bytes: config.mem_max_bytes,
    };

    for input_path in &config.inputs {
        concat_one(
            input_path,
            &output_root,
            &registry,
            &provenance,
            cohort,
            &walk,
        )?;
    }

    output_file
        .close()
        .map_err(|source| crate::error::Error::container(config.output.display().to_string(), source))
}

fn concat_one(
    input_path: &Path,
    output_root: &hdf5::Group,
    registry: &Registry,
    provenance: &Provenance,
    cohort: &dyn Cohort,
    walk: &WalkConfig,
) -> Result<()> {
    logger::log_info(&format!("concatenating {}", input_path.display()));
    let input_file = container::open_input(input_path)?;
    let input_root = input_file
        .group("/")
        .map_err(|source| crate::error::Error::container("/", source))?;

    let provenance_value = provenance.value_for(input_path);
    walker::concat_one_input(
        &input_root,
        output_root,
        registry,
        provenance,
        &provenance_value,
        cohort,
        walk,
    )?;

    input_file
        .close()
        .map_err(|source| crate::error::Error::container(input_path.display().to_string(), source))
}
