use lazy_regex::regex_is_match;
use log::trace;
use thiserror::Error;

use crate::channel::Channel;
use crate::path::{CatalogPath, CatalogPathError, Depth};

/// Scheme of the step URI. Tells what kind of step builds the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepScheme {
    Data,
    DataPrivate,
    Snapshot,
    SnapshotPrivate,
    Export,
}

impl StepScheme {
    pub const ALL: [StepScheme; 5] = [
        StepScheme::Data,
        StepScheme::DataPrivate,
        StepScheme::Snapshot,
        StepScheme::SnapshotPrivate,
        StepScheme::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        use StepScheme::*;
        match self {
            Data => "data",
            DataPrivate => "data-private",
            Snapshot => "snapshot",
            SnapshotPrivate => "snapshot-private",
            Export => "export",
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, StepScheme::DataPrivate | StepScheme::SnapshotPrivate)
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, StepScheme::Snapshot | StepScheme::SnapshotPrivate)
    }

    fn expected() -> String {
        Self::ALL.map(|scheme| scheme.as_str()).join(", ")
    }
}

impl std::str::FromStr for StepScheme {
    type Err = StepUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| StepUriError::UnknownScheme(s.to_owned()))
    }
}

impl std::fmt::Display for StepScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepUriError {
    #[error("Step URI `{0}` has no scheme, expected `scheme://path`")]
    MissingScheme(String),

    #[error("Unknown step scheme `{0}`, expected one of: {}", StepScheme::expected())]
    UnknownScheme(String),

    #[error("Invalid file extension `{extension}` in step `{uri}`")]
    InvalidExtension { uri: String, extension: String },

    #[error("Step `{0}` must point to a dataset, not to a table or a variable")]
    NotDataset(String),

    #[error("Step `{0}` cannot build a snapshot, only `snapshot://` steps can")]
    SnapshotChannel(String),

    #[error("Invalid step `{uri}`. {source}")]
    Path {
        uri: String,
        #[source]
        source: CatalogPathError,
    },
}

/// Identifier of a pipeline step, like `data://garden/who/2024/gho` or
/// `snapshot://who/2024/gho.zip`.
///
/// Snapshot steps name the file that was ingested, so they may carry a file extension.
/// It is kept apart from the dataset name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepUri {
    scheme: StepScheme,
    path: CatalogPath,
    extension: Option<String>,
}

impl StepUri {
    /// The step that builds the dataset of the given path. Snapshots are not
    /// built by data steps.
    pub fn data(path: &CatalogPath) -> Result<Self, StepUriError> {
        if path.channel() == Channel::Snapshot {
            return Err(StepUriError::SnapshotChannel(path.step_uri()));
        }

        Ok(Self {
            scheme: StepScheme::Data,
            path: path.without_table(),
            extension: None,
        })
    }

    pub fn scheme(&self) -> StepScheme {
        self.scheme
    }

    /// Dataset built by this step.
    pub fn path(&self) -> &CatalogPath {
        &self.path
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn is_private(&self) -> bool {
        self.scheme.is_private()
    }

    pub fn channel(&self) -> Channel {
        self.path.channel()
    }

    fn parse(uri: &str) -> Result<Self, StepUriError> {
        trace!("Parsing step URI `{uri}`");

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| StepUriError::MissingScheme(uri.to_owned()))?;
        let scheme: StepScheme = scheme.parse()?;
        let path_err = |source| StepUriError::Path {
            uri: uri.to_owned(),
            source,
        };

        // The path after the scheme is taken as is, another scheme is not stripped.
        if rest.contains("://") {
            return Err(path_err(CatalogPathError::InvalidFormat(uri.to_owned())));
        }

        if scheme.is_snapshot() {
            let (rest, extension) = split_extension(rest);
            if let Some(extension) = extension {
                if !regex_is_match!(r"^[A-Za-z0-9]+(?:\.[A-Za-z0-9]+)*$", extension) {
                    return Err(StepUriError::InvalidExtension {
                        uri: uri.to_owned(),
                        extension: extension.to_owned(),
                    });
                }
            }

            // Only the shorthand without channel names a snapshot step.
            if rest.split('/').count() != 3 {
                return Err(path_err(CatalogPathError::InvalidFormat(uri.to_owned())));
            }
            let path = CatalogPath::from_uri(&format!("{scheme}://{rest}")).map_err(path_err)?;

            Ok(Self {
                scheme,
                path,
                extension: extension.map(str::to_owned),
            })
        } else {
            let path = CatalogPath::from_uri(rest).map_err(path_err)?;
            if path.depth() != Depth::Dataset {
                return Err(StepUriError::NotDataset(uri.to_owned()));
            }
            if path.channel() == Channel::Snapshot {
                return Err(StepUriError::SnapshotChannel(uri.to_owned()));
            }

            Ok(Self {
                scheme,
                path,
                extension: None,
            })
        }
    }
}

/// Split the file extension off the last segment: `who/2024/gho.csv.gz` gives
/// `who/2024/gho` and `csv.gz`.
fn split_extension(path: &str) -> (&str, Option<&str>) {
    let file_start = path.rfind('/').map_or(0, |idx| idx + 1);
    match path[file_start..].find('.') {
        Some(dot) => {
            let dot = file_start + dot;
            (&path[..dot], Some(&path[dot + 1..]))
        }
        None => (path, None),
    }
}

impl std::str::FromStr for StepUri {
    type Err = StepUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StepUri {
    type Error = StepUriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StepUri> for String {
    fn from(step: StepUri) -> Self {
        step.to_string()
    }
}

impl std::fmt::Display for StepUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = &self.path;
        if self.scheme.is_snapshot() {
            write!(
                f,
                "{}://{}/{}/{}",
                self.scheme,
                path.namespace(),
                path.version(),
                path.dataset()
            )?;
            if let Some(extension) = &self.extension {
                write!(f, ".{extension}")?;
            }
            Ok(())
        } else {
            write!(f, "{}://{}", self.scheme, path.dataset_path())
        }
    }
}
