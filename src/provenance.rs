//! Provenance annotation: derives a string value per input file and appends it to a synthetic
//! column in every eligible group that received rows from that input, keeping the column's
//! length in sync with its longest sibling dataset.

use std::path::Path;

use hdf5::Group;
use regex::Regex;

use crate::config::ProvenanceSpec;
use crate::container;
use crate::error::{Error, Result};

const PROVENANCE_CHUNK_ROWS: usize = 1024;

/// Derives and synchronizes the `--filename-column` annotation, when configured.
pub struct Provenance {
    column_name: Option<String>,
    pattern: Option<Regex>,
    replacement: String,
    group_patterns: Vec<String>,
}

impl Provenance {
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the spec's pattern fails to compile as a regular
    /// expression.
    pub fn new(spec: Option<&ProvenanceSpec>) -> Result<Self> {
        let Some(spec) = spec else {
            return Ok(Self {
                column_name: None,
                pattern: None,
                replacement: String::new(),
                group_patterns: Vec::new(),
            });
        };
        let pattern = spec
            .pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|source| Error::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self {
            column_name: Some(spec.column_name.clone()),
            pattern,
            replacement: spec.replacement.clone().unwrap_or_else(|| "$0".to_string()),
            group_patterns: spec.group_patterns.clone(),
        })
    }

    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }

    /// Derives this input file's provenance value from its path: the raw path as given on the
    /// command line, or PATTERN/REPLACEMENT applied to that raw path when a pattern is
    /// configured (e.g. `"^.*/"` with an empty replacement strips the directory, leaving the
    /// basename).
    #[must_use]
    pub fn value_for(&self, input_path: &Path) -> String {
        let raw = input_path.display().to_string();
        match &self.pattern {
            Some(re) => re.replace(&raw, self.replacement.as_str()).into_owned(),
            None => raw,
        }
    }

    /// True when `group_path` should receive the provenance column at all: provenance is
    /// configured, and either no group-pattern restriction was given or `group_path` matches one
    /// of the given anchored prefixes.
    #[must_use]
    pub fn group_enabled(&self, group_path: &str) -> bool {
        self.column_name.is_some()
            && (self.group_patterns.is_empty()
                || self
                    .group_patterns
                    .iter()
                    .any(|p| group_path == p || group_path.starts_with(&format!("{p}/"))))
    }

    /// Checks that no sibling dataset in this group is literally named like the provenance
    /// column, which would otherwise silently collide when the column is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProvenanceNameClash`] on collision.
    pub fn check_no_clash(&self, group_path: &str, sibling_name: &str) -> Result<()> {
        if self.column_name.as_deref() == Some(sibling_name) {
            return Err(Error::ProvenanceNameClash {
                path: format!("{group_path}/{sibling_name}"),
                column: sibling_name.to_string(),
            });
        }
        Ok(())
    }

    /// Extends this group's provenance column, if configured and eligible, so its length
    /// matches the longest sibling dataset, filling the new rows with `value`.
    ///
    /// # Errors
    ///
    /// Propagates container driver failures while creating, resizing, or writing the column.
    pub fn sync_group(&self, group_path: &str, out_group: &Group, value: &str) -> Result<()> {
        let Some(column_name) = &self.column_name else {
            return Ok(());
        };
        if !self.group_enabled(group_path) {
            return Ok(());
        }

        let mut max_len = 0u64;
        for name in out_group
            .member_names()
            .map_err(|source| Error::container(column_name, source))?
        {
            if &name == column_name {
                continue;
            }
            if let Some(dataset) = container::find_dataset(out_group, &name) {
                max_len = max_len.max(container::outer_len(&dataset));
            }
        }

        let dataset = match container::find_dataset(out_group, column_name) {
            Some(existing) => existing,
            None => container::create_provenance_dataset(out_group, column_name, PROVENANCE_CHUNK_ROWS)?,
        };

        let cur_len = container::outer_len(&dataset);
        if max_len > cur_len {
            container::resize_outer(&dataset, max_len)?;
            container::fill_rows(&dataset, cur_len, max_len - cur_len, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec(name: &str, pattern: Option<&str>, replacement: Option<&str>, groups: &[&str]) -> ProvenanceSpec {
        ProvenanceSpec {
            column_name: name.to_string(),
            pattern: pattern.map(str::to_string),
            replacement: replacement.map(str::to_string),
            group_patterns: groups.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn disabled_when_no_column_configured() {
        let prov = Provenance::new(None).unwrap();
        assert!(prov.column_name().is_none());
    }

    #[test]
    fn value_for_uses_raw_path_when_no_pattern() {
        let s = spec("src_file", None, None, &[]);
        let prov = Provenance::new(Some(&s)).unwrap();
        let value = prov.value_for(&PathBuf::from("/data/numerology_2024.h5"));
        assert_eq!(value, "/data/numerology_2024.h5");
    }

    #[test]
    fn value_for_applies_pattern_and_replacement() {
        let s = spec("year", Some(r"numerology_(\d+)\.h5"), Some("$1"), &[]);
        let prov = Provenance::new(Some(&s)).unwrap();
        let value = prov.value_for(&PathBuf::from("/data/numerology_2024.h5"));
        assert_eq!(value, "2024");
    }

    #[test]
    fn value_for_strips_directory_with_basename_pattern() {
        let s = spec("src", Some("^.*/"), Some(""), &[]);
        let prov = Provenance::new(Some(&s)).unwrap();
        assert_eq!(prov.value_for(&PathBuf::from("/a/x.h5")), "x.h5");
        assert_eq!(prov.value_for(&PathBuf::from("/a/y.h5")), "y.h5");
    }

    #[test]
    fn clash_detected_when_names_match() {
        let s = spec("src_file", None, None, &[]);
        let prov = Provenance::new(Some(&s)).unwrap();
        assert!(prov.check_no_clash("/g", "src_file").is_err());
        assert!(prov.check_no_clash("/g", "other").is_ok());
    }

    #[test]
    fn group_patterns_restrict_eligibility() {
        let s = spec("src_file", None, None, &["wanted"]);
        let prov = Provenance::new(Some(&s)).unwrap();
        assert!(prov.group_enabled("wanted"));
        assert!(prov.group_enabled("wanted/sub"));
        assert!(!prov.group_enabled("other"));
    }

    #[test]
    fn no_group_patterns_means_every_group_is_eligible() {
        let s = spec("src_file", None, None, &[]);
        let prov = Provenance::new(Some(&s)).unwrap();
        assert!(prov.group_enabled("anything"));
    }
}
