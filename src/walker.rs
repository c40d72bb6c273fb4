//! Depth-first tree walker. Mirrors the structure of one input file into the output file,
//! dispatching each dataset it finds to the registry and scheduler, and syncing the provenance
//! column once every dataset in a group has been copied.

use hdf5::Group;

use crate::cohort::Cohort;
use crate::container;
use crate::error::{NodeKind, Result};
use crate::logger;
use crate::provenance::Provenance;
use crate::registry::Registry;
use crate::scheduler::RowScheduler;

/// Settings that narrow which part of the tree gets copied.
pub struct WalkConfig {
    pub only_groups: Vec<String>,
    pub mem_max_bytes: u64,
}

/// Copies every included group and dataset from `input_root` into `output_root`, annotating
/// provenance along the way.
///
/// # Errors
///
/// Returns an error on the first container failure, schema mismatch, or provenance clash
/// encountered; callers choose whether that aborts the whole run or is logged and skipped,
/// depending on `--only-groups` scoping already applied here.
pub fn concat_one_input(
    input_root: &Group,
    output_root: &Group,
    registry: &Registry,
    provenance: &Provenance,
    provenance_value: &str,
    cohort: &dyn Cohort,
    walk: &WalkConfig,
) -> Result<()> {
    visit_group(
        input_root,
        output_root,
        "",
        registry,
        provenance,
        provenance_value,
        cohort,
        walk,
    )
}

#[allow(clippy::too_many_arguments)]
fn visit_group(
    input_group: &Group,
    output_group: &Group,
    path: &str,
    registry: &Registry,
    provenance: &Provenance,
    provenance_value: &str,
    cohort: &dyn Cohort,
    walk: &WalkConfig,
) -> Result<()> {
    let mut touched_dataset = false;
    let names = input_group
        .member_names()
        .map_err(|source| crate::error::Error::container(path, source))?;

    for name in names {
        let child_path = child_path(path, &name);
        if !relevant(&child_path, &walk.only_groups) {
            continue;
        }

        if let Some(sub_input) = container::find_group(input_group, &name) {
            let sub_output = container::ensure_group(output_group, &name)?;
            visit_group(
                &sub_input,
                &sub_output,
                &child_path,
                registry,
                provenance,
                provenance_value,
                cohort,
                walk,
            )?;
        } else if let Some(dataset) = container::find_dataset(input_group, &name) {
            if !matches(&child_path, &walk.only_groups) {
                continue;
            }
            provenance.check_no_clash(path, &name)?;
            process_dataset(&dataset, output_group, &name, registry, cohort, walk.mem_max_bytes)?;
            touched_dataset = true;
        } else {
            logger::log_info(&format!("skipping unsupported node {child_path} ({})", NodeKind::Other));
        }
    }

    if touched_dataset {
        provenance.sync_group(path, output_group, provenance_value)?;
    }
    Ok(())
}

fn process_dataset(
    input: &hdf5::Dataset,
    output_group: &Group,
    name: &str,
    registry: &Registry,
    cohort: &dyn Cohort,
    mem_max_bytes: u64,
) -> Result<()> {
    let (output, layout) = registry.resolve(output_group, name, input)?;

    let l0 = container::outer_len(&output);
    let n = container::outer_len(input);
    if n == 0 {
        logger::log_debug(&format!("{name}: input contributes no rows, skipping"));
        return Ok(());
    }

    let chunk_rows = u64::try_from(*layout.chunk.first().unwrap_or(&1)).unwrap_or(1).max(1);
    let row_elems: usize = layout.trailing_dims.iter().product::<usize>().max(1);
    let row_bytes = (layout.descriptor.size() * row_elems).max(1) as u64;
    let buffer_rows_raw = mem_max_bytes / row_bytes;

    container::resize_outer(&output, l0 + n)?;
    cohort.barrier();

    let scheduler = RowScheduler::new(n, l0, chunk_rows, buffer_rows_raw, cohort.size())?;
    let rank = cohort.rank();

    for iteration in scheduler {
        let _region = cohort.collective_region();
        let window = iteration.primary.get(rank).copied().unwrap_or_default_window();
        container::copy_rows(input, &output, window.in_start, window.out_start, window.rows)?;
        if let Some(remainder) = &iteration.remainder {
            let window = remainder.get(rank).copied().unwrap_or_default_window();
            container::copy_rows(input, &output, window.in_start, window.out_start, window.rows)?;
        }
    }

    Ok(())
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}/{name}")
    }
}

/// True when `path` itself should be copied: either no `--only-groups` filter was given, or
/// `path` is one of the given prefixes or a descendant of one.
fn matches(path: &str, patterns: &[String]) -> bool {
    patterns.is_empty()
        || patterns
            .iter()
            .any(|p| path == p || path.starts_with(&format!("{p}/")))
}

/// True when the walker should still descend into `path`: `matches` holds, or `path` is an
/// ancestor of one of the requested prefixes.
fn relevant(path: &str, patterns: &[String]) -> bool {
    matches(path, patterns)
        || patterns
            .iter()
            .any(|p| p == path || p.starts_with(&format!("{path}/")))
}

trait RankWindowExt {
    fn unwrap_or_default_window(self) -> crate::scheduler::RankWindow;
}

impl RankWindowExt for Option<crate::scheduler::RankWindow> {
    fn unwrap_or_default_window(self) -> crate::scheduler::RankWindow {
        self.unwrap_or(crate::scheduler::RankWindow {
            rows: 0,
            in_start: 0,
            out_start: 0,
        })
    }
}
