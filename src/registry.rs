//! Dataset registry: decides, for each input dataset the walker visits, whether the matching
//! output dataset already exists (append mode) or must be created, and verifies layout
//! compatibility either way before any row is copied.

use hdf5::{Dataset, Group};

use crate::container::{self, Layout};
use crate::error::{Error, Result};

/// Registry of output datasets touched so far in this run. A dataset is created at most once;
/// every subsequent input with the same path reuses the handle and layout recorded here.
#[derive(Default)]
pub struct Registry {
    filters_enabled: bool,
}

impl Registry {
    #[must_use]
    pub const fn new(filters_enabled: bool) -> Self {
        Self { filters_enabled }
    }

    /// Returns the output dataset for `name` under `out_group`, creating it from `input`'s
    /// layout if it does not already exist, or validating compatibility if it does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an existing output dataset's trailing dimensions or element
    /// type do not match the input dataset being appended.
    pub fn resolve(&self, out_group: &Group, name: &str, input: &Dataset) -> Result<(Dataset, Layout)> {
        let input_layout = container::inspect(input)?;

        if let Some(existing) = container::find_dataset(out_group, name) {
            let existing_layout = container::inspect(&existing)?;
            ensure_compatible(name, &existing_layout, &input_layout)?;
            return Ok((existing, existing_layout));
        }

        let fill_value = read_fill_value_raw(input);
        let created = container::create_like(
            out_group,
            name,
            &input_layout,
            fill_value.as_deref(),
            self.filters_enabled,
        )?;
        container::copy_attributes(input, &created)?;
        Ok((created, input_layout))
    }
}

fn ensure_compatible(name: &str, existing: &Layout, incoming: &Layout) -> Result<()> {
    if existing.trailing_dims != incoming.trailing_dims {
        return Err(Error::config(format!(
            "dataset {name} has trailing shape {:?} in the output but {:?} in this input",
            existing.trailing_dims, incoming.trailing_dims
        )));
    }
    if format!("{:?}", existing.descriptor) != format!("{:?}", incoming.descriptor) {
        return Err(Error::config(format!(
            "dataset {name} has element type {:?} in the output but {:?} in this input",
            existing.descriptor, incoming.descriptor
        )));
    }
    Ok(())
}

/// Best-effort fill value extraction: the dataset creation property list exposes the fill value
/// as raw bytes regardless of element type, so this does not need the numeric dispatch used for
/// row data.
fn read_fill_value_raw(dataset: &Dataset) -> Option<Vec<u8>> {
    dataset.dcpl().ok().and_then(|plist| plist.fill_value_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_cheap_to_construct() {
        let registry = Registry::new(true);
        assert!(registry.filters_enabled);
    }
}
