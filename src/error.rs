use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// Result type used across the concatenator implementation.
pub type Result<T> = std::result::Result<T, Error>;

/// High-level error type surfaced by the concatenator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command-line argument or a setting derived from one is invalid. Reported and
    /// terminates the run before any container mutation.
    #[error("configuration error: {details}")]
    Config { details: Cow<'static, str> },

    /// An input dataset's basename collides with the configured provenance column name.
    #[error("dataset {path} collides with the provenance column name {column:?}")]
    ProvenanceNameClash { path: String, column: String },

    /// The container driver rejected a call while processing the named dataset or group.
    #[error("container error at {path}: {source}")]
    Container {
        path: String,
        #[source]
        source: hdf5::Error,
    },

    /// Failure while opening, creating, or closing a container file.
    #[error("failed to open {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: hdf5::Error,
    },

    /// Propagated filesystem I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A `--filename-column` pattern failed to compile as a regular expression.
    #[error("invalid filename-column pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl Error {
    #[must_use]
    pub fn config(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            details: details.into(),
        }
    }

    #[must_use]
    pub fn container(path: impl Into<String>, source: hdf5::Error) -> Self {
        Self::Container {
            path: path.into(),
            source,
        }
    }
}

/// Logical node kind produced by the tree walker, used for diagnostic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
    Other,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Dataset => write!(f, "dataset"),
            Self::Other => write!(f, "other"),
        }
    }
}
