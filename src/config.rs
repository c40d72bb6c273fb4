//! Command-line surface and the validated, immutable configuration derived from it.

use std::path::PathBuf;

use clap::Parser;

use crate::cohort::Cohort;
use crate::error::{Error, Result};
use crate::logger::Level;

const DEFAULT_MEM_MAX_MIB: u64 = 100;
const BYTES_PER_MIB: u64 = 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "concat-hdf5", about = "Concatenate row-oriented HDF5 files")]
pub struct Cli {
    /// Path to the output file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Append to an existing output file instead of creating a new one.
    #[arg(long)]
    pub append: bool,

    /// Force filters (compression/shuffle/checksum) on in the output, even under MPI.
    #[arg(long, conflicts_with = "without_filters")]
    pub with_filters: bool,

    /// Force filters off in the output, even in sequential mode.
    #[arg(long)]
    pub without_filters: bool,

    /// Approximate per-rank, per-dataset input buffer budget, in MiB.
    #[arg(long, default_value_t = DEFAULT_MEM_MAX_MIB)]
    pub mem_max: u64,

    /// Restrict copying to groups under one of these paths (repeatable).
    #[arg(long = "only-groups")]
    pub only_groups: Vec<String>,

    /// Enables provenance annotation: NAME, then optionally PATTERN, REPLACEMENT, and any
    /// number of group-path prefixes restricting which groups receive the column. Since this
    /// takes a variable number of values, put `--` before the input list if any input path
    /// could be mistaken for part of it.
    #[arg(long, num_args = 1.., value_names = ["NAME", "PATTERN", "REPLACEMENT", "GROUP_PATTERN"])]
    pub filename_column: Option<Vec<String>>,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Input files to concatenate, in order. If `--filename-column` is given with GROUP-PATTERN
    /// values, put `--` before the input list so clap doesn't swallow the inputs as trailing
    /// GROUP-PATTERNs.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

impl Cli {
    /// Builds a `Cli` with every optional flag at its default, for callers that assemble a run
    /// programmatically instead of parsing `std::env::args` (tests, embedding).
    #[must_use]
    pub fn new(output: PathBuf, inputs: Vec<PathBuf>) -> Self {
        Self {
            output,
            append: false,
            with_filters: false,
            without_filters: false,
            mem_max: DEFAULT_MEM_MAX_MIB,
            only_groups: Vec::new(),
            filename_column: None,
            verbose: 0,
            inputs,
        }
    }

    pub fn set_append(&mut self, append: bool) {
        self.append = append;
    }

    pub fn set_only_groups(&mut self, groups: Vec<String>) {
        self.only_groups = groups;
    }
}

/// Whether compression/shuffle/checksum filters should be applied to output datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterPolicy {
    ForceOn,
    ForceOff,
    Auto,
}

/// The `--filename-column` argument, parsed into its positional parts.
#[derive(Debug, Clone)]
pub struct ProvenanceSpec {
    pub column_name: String,
    pub pattern: Option<String>,
    pub replacement: Option<String>,
    pub group_patterns: Vec<String>,
}

/// Validated configuration consumed by the concatenator. Constructed once via [`Config::parse`]
/// (or [`Config::try_from_cli`] in tests) before anything touches the container driver.
#[derive(Debug)]
pub struct Config {
    pub output: PathBuf,
    pub append: bool,
    pub mem_max_bytes: u64,
    pub only_groups: Vec<String>,
    pub provenance: Option<ProvenanceSpec>,
    pub inputs: Vec<PathBuf>,
    pub verbosity: Level,
    filter_policy: FilterPolicy,
}

impl Config {
    /// Parses `std::env::args`, then validates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when validation fails (empty input list already rejected by
    /// clap, but non-existent input paths and a zero `mem_max` are caught here).
    pub fn parse() -> Result<Self> {
        Self::try_from_cli(Cli::parse())
    }

    /// Validates an already-parsed [`Cli`]. Split out from [`Config::parse`] so tests can
    /// construct a `Cli` directly without going through `std::env::args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `mem_max` is zero, `--filename-column` was given with no
    /// NAME, or any input path does not exist.
    pub fn try_from_cli(cli: Cli) -> Result<Self> {
        if cli.mem_max == 0 {
            return Err(Error::config("--mem-max must be greater than zero"));
        }
        for input in &cli.inputs {
            if !input.exists() {
                return Err(Error::config(format!(
                    "input file {} does not exist",
                    input.display()
                )));
            }
        }

        let provenance = cli
            .filename_column
            .map(|parts| {
                let mut iter = parts.into_iter();
                let column_name = iter
                    .next()
                    .ok_or_else(|| Error::config("--filename-column requires at least NAME"))?;
                let pattern = iter.next();
                let replacement = iter.next();
                let group_patterns = iter.collect();
                Ok(ProvenanceSpec {
                    column_name,
                    pattern,
                    replacement,
                    group_patterns,
                })
            })
            .transpose()?;

        let filter_policy = match (cli.with_filters, cli.without_filters) {
            (true, _) => FilterPolicy::ForceOn,
            (false, true) => FilterPolicy::ForceOff,
            (false, false) => FilterPolicy::Auto,
        };

        Ok(Self {
            output: cli.output,
            append: cli.append,
            mem_max_bytes: cli.mem_max * BYTES_PER_MIB,
            only_groups: cli.only_groups,
            provenance,
            inputs: cli.inputs,
            verbosity: Level::from_verbosity(cli.verbose),
            filter_policy,
        })
    }

    /// Resolves whether output datasets get filters, given the active cohort. Sequential runs
    /// default to filters on; parallel runs default to filters off, since not every container
    /// build supports collective writes to a filtered dataset. Either default can be overridden
    /// explicitly on the command line.
    #[must_use]
    pub fn filters_enabled(&self, cohort: &dyn Cohort) -> bool {
        match self.filter_policy {
            FilterPolicy::ForceOn => true,
            FilterPolicy::ForceOff => false,
            FilterPolicy::Auto => !cohort.is_parallel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::SequentialCohort;

    fn cli(inputs: Vec<PathBuf>) -> Cli {
        Cli::new(PathBuf::from("out.h5"), inputs)
    }

    #[test]
    fn rejects_zero_mem_max() {
        let mut base = cli(vec![]);
        base.mem_max = 0;
        let err = Config::try_from_cli(base).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn rejects_missing_input_file() {
        let err = Config::try_from_cli(cli(vec![PathBuf::from("/nonexistent/does-not-exist.h5")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn mem_max_is_interpreted_as_mebibytes() {
        let config = Config::try_from_cli(cli(vec![])).unwrap();
        assert_eq!(config.mem_max_bytes, DEFAULT_MEM_MAX_MIB * BYTES_PER_MIB);
    }

    #[test]
    fn sequential_default_enables_filters() {
        let config = Config::try_from_cli(cli(vec![])).unwrap();
        assert!(config.filters_enabled(&SequentialCohort));
    }

    #[test]
    fn without_filters_overrides_default() {
        let mut base = cli(vec![]);
        base.without_filters = true;
        let config = Config::try_from_cli(base).unwrap();
        assert!(!config.filters_enabled(&SequentialCohort));
    }

    #[test]
    fn filename_column_parses_positional_parts() {
        let mut base = cli(vec![]);
        base.filename_column = Some(vec![
            "src".to_string(),
            "^.*/".to_string(),
            String::new(),
            "group_a".to_string(),
            "group_b".to_string(),
        ]);
        let config = Config::try_from_cli(base).unwrap();
        let spec = config.provenance.unwrap();
        assert_eq!(spec.column_name, "src");
        assert_eq!(spec.pattern.as_deref(), Some("^.*/"));
        assert_eq!(spec.replacement.as_deref(), Some(""));
        assert_eq!(spec.group_patterns, vec!["group_a", "group_b"]);
    }
}
