use std::path::{Path, PathBuf};

use lazy_regex::regex_is_match;
use log::trace;
use thiserror::Error;

use crate::channel::{Channel, InvalidChannel};

/// Parsing of the textual form of the path.
mod parse;

/// Address of a resource in the catalog:
/// `channel/namespace/version/dataset[/table][#variable]`.
///
/// The path is validated on construction and is never modified afterwards.
/// All the `with_*` and `without_*` methods return a new path, leaving the
/// original one untouched.
///
/// Two paths are equal when all their fields are equal. A path is also equal
/// to a string that matches its canonical form:
/// ```ignore
/// let path: CatalogPath = "garden/who/2024/gho/life_expectancy".parse()?;
/// assert_eq!(path, "garden/who/2024/gho/life_expectancy");
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogPath {
    channel: Channel,
    namespace: String,
    version: String,
    dataset: String,
    table: Option<String>,
    variable: Option<String>,
}

/// Field of the [CatalogPath], used to point at the failed part in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Channel,
    Namespace,
    Version,
    Dataset,
    Table,
    Variable,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Field::*;
        f.write_str(match self {
            Channel => "channel",
            Namespace => "namespace",
            Version => "version",
            Dataset => "dataset",
            Table => "table",
            Variable => "variable",
        })
    }
}

/// Hierarchy level the path points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Depth {
    /// Path addresses a whole dataset.
    Dataset,

    /// Path addresses a table in the dataset.
    Table,

    /// Path addresses a single indicator (column) in the table.
    Indicator,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogPathError {
    #[error(transparent)]
    InvalidChannel(#[from] InvalidChannel),

    #[error("Invalid version `{0}`, expected `YYYY-MM-DD`, `YYYY` or `latest`")]
    InvalidVersion(String),

    #[error(
        "Invalid {field} `{value}`, expected one or more of letters, digits, `_` and `-`"
    )]
    InvalidName { field: Field, value: String },

    #[error("Variable `{0}` requires a table")]
    VariableWithoutTable(String),

    #[error("Missing {0} of the catalog path")]
    MissingField(Field),

    #[error(
        "Invalid catalog path `{0}`, expected `channel/namespace/version/dataset`, \
         `channel/namespace/version/dataset/table[#variable]` or \
         `snapshot://namespace/version/dataset`"
    )]
    InvalidFormat(String),

    #[error("Snapshot path `{0}` cannot have a variable")]
    SnapshotVariable(String),

    #[error("Cannot set variable `{variable}` on `{path}`, it has no table")]
    MissingTable { path: String, variable: String },

    #[error("Cannot append `{segment}` to `{path}`, it already has a table")]
    TableAlreadySet { path: String, segment: String },
}

type Result<T, E = CatalogPathError> = std::result::Result<T, E>;

fn check_version(version: &str) -> Result<()> {
    if regex_is_match!(r"^(?:[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{4}|latest)$", version) {
        Ok(())
    } else {
        Err(CatalogPathError::InvalidVersion(version.to_owned()))
    }
}

fn check_name(field: Field, value: &str) -> Result<()> {
    if regex_is_match!(r"^[A-Za-z0-9_-]+$", value) {
        Ok(())
    } else {
        Err(CatalogPathError::InvalidName {
            field,
            value: value.to_owned(),
        })
    }
}

impl CatalogPath {
    /// Create a path that addresses a dataset.
    pub fn new(
        channel: impl AsRef<str>,
        namespace: impl Into<String>,
        version: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Result<Self> {
        let channel = channel.as_ref().parse::<Channel>()?;
        Self::validated(
            channel,
            namespace.into(),
            version.into(),
            dataset.into(),
            None,
            None,
        )
    }

    /// Builder to set every field of the path, including the table and the variable.
    pub fn builder() -> CatalogPathBuilder {
        CatalogPathBuilder::new()
    }

    /// Parse the path from a full step URI, like `data://garden/who/2024/gho`.
    /// This is the same as parsing it with [std::str::FromStr].
    pub fn from_uri(uri: &str) -> Result<Self> {
        parse::parse(uri)
    }

    fn validated(
        channel: Channel,
        namespace: String,
        version: String,
        dataset: String,
        table: Option<String>,
        variable: Option<String>,
    ) -> Result<Self> {
        check_version(&version)?;
        check_name(Field::Namespace, &namespace)?;
        check_name(Field::Dataset, &dataset)?;
        if let Some(table) = &table {
            check_name(Field::Table, table)?;
        }
        if let Some(variable) = &variable {
            check_name(Field::Variable, variable)?;
            if table.is_none() {
                return Err(CatalogPathError::VariableWithoutTable(variable.clone()));
            }
        }

        Ok(Self {
            channel,
            namespace,
            version,
            dataset,
            table,
            variable,
        })
    }

    /// Run the validation again after some field was replaced.
    fn revalidate(self) -> Result<Self> {
        let Self {
            channel,
            namespace,
            version,
            dataset,
            table,
            variable,
        } = self;
        Self::validated(channel, namespace, version, dataset, table, variable)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// Same as [CatalogPath::dataset].
    pub fn short_name(&self) -> &str {
        &self.dataset
    }

    /// Same as [CatalogPath::variable].
    pub fn indicator(&self) -> Option<&str> {
        self.variable()
    }

    pub fn depth(&self) -> Depth {
        match (&self.table, &self.variable) {
            (None, _) => Depth::Dataset,
            (Some(_), None) => Depth::Table,
            (Some(_), Some(_)) => Depth::Indicator,
        }
    }

    /// `channel/namespace/version/dataset`
    pub fn dataset_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.channel, self.namespace, self.version, self.dataset
        )
    }

    /// `channel/namespace/version/dataset/table`, if the path has a table.
    pub fn table_path(&self) -> Option<String> {
        self.table
            .as_ref()
            .map(|table| format!("{}/{table}", self.dataset_path()))
    }

    /// Part of the path after the dataset: `table` or `table#variable`.
    pub fn table_variable(&self) -> Option<String> {
        match (&self.table, &self.variable) {
            (Some(table), Some(variable)) => Some(format!("{table}#{variable}")),
            (Some(table), None) => Some(table.clone()),
            (None, _) => None,
        }
    }

    /// URI of the pipeline step that builds the dataset: `data://channel/namespace/version/dataset`.
    pub fn step_uri(&self) -> String {
        format!("data://{}", self.dataset_path())
    }

    /// One level up in the hierarchy. Variable is dropped first, then the table.
    /// Path to a dataset is its own parent.
    pub fn parent(&self) -> Self {
        match self.depth() {
            Depth::Indicator => self.without_variable(),
            Depth::Table => self.without_table(),
            Depth::Dataset => self.clone(),
        }
    }

    pub fn with_channel(&self, channel: Channel) -> Self {
        Self {
            channel,
            ..self.clone()
        }
    }

    pub fn with_namespace(&self, namespace: impl Into<String>) -> Result<Self> {
        let mut path = self.clone();
        path.namespace = namespace.into();
        path.revalidate()
    }

    pub fn with_version(&self, version: impl Into<String>) -> Result<Self> {
        let mut path = self.clone();
        path.version = version.into();
        path.revalidate()
    }

    pub fn with_dataset(&self, dataset: impl Into<String>) -> Result<Self> {
        let mut path = self.clone();
        path.dataset = dataset.into();
        path.revalidate()
    }

    /// Replace the table, keeping the variable. `None` removes both the table
    /// and the variable.
    pub fn with_table(&self, table: Option<&str>) -> Result<Self> {
        match table {
            None => Ok(self.without_table()),
            Some(table) => {
                let mut path = self.clone();
                path.table = Some(table.to_owned());
                path.revalidate()
            }
        }
    }

    /// Set the variable. The path must already have a table.
    pub fn with_variable(&self, variable: impl Into<String>) -> Result<Self> {
        let variable = variable.into();
        if self.table.is_none() {
            return Err(CatalogPathError::MissingTable {
                path: self.to_string(),
                variable,
            });
        }

        let mut path = self.clone();
        path.variable = Some(variable);
        path.revalidate()
    }

    /// Same as [CatalogPath::with_variable].
    pub fn with_indicator(&self, indicator: impl Into<String>) -> Result<Self> {
        self.with_variable(indicator)
    }

    pub fn without_variable(&self) -> Self {
        Self {
            variable: None,
            ..self.clone()
        }
    }

    /// Same as [CatalogPath::without_variable].
    pub fn without_indicator(&self) -> Self {
        self.without_variable()
    }

    /// Remove the table, and so the variable too.
    pub fn without_table(&self) -> Self {
        Self {
            table: None,
            variable: None,
            ..self.clone()
        }
    }

    /// Descend from the dataset into its table: `table` or `table#variable`.
    /// Fails if the path already points to a table.
    ///
    /// The `/` operator does the same.
    pub fn join(&self, segment: &str) -> Result<Self> {
        if self.table.is_some() {
            return Err(CatalogPathError::TableAlreadySet {
                path: self.to_string(),
                segment: segment.to_owned(),
            });
        }

        trace!("Append `{}` to `{}`", segment, self);
        let (table, variable) = match segment.split_once('#') {
            Some((table, variable)) => (table, Some(variable.to_owned())),
            None => (segment, None),
        };

        let mut path = self.clone();
        path.table = Some(table.to_owned());
        path.variable = variable;
        path.revalidate()
    }

    /// Location of the dataset relative to the catalog root. Table and variable
    /// are not directories in the catalog layout and so are not included.
    pub fn to_path_buf(&self) -> PathBuf {
        Path::new(self.channel.as_str())
            .join(&self.namespace)
            .join(&self.version)
            .join(&self.dataset)
    }

    /// Directory of the dataset in the catalog stored at `root`.
    pub fn dataset_dir(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(self.to_path_buf())
    }
}

/// Builder of [CatalogPath] with all fields settable. Validation happens
/// on [CatalogPathBuilder::build].
#[derive(Debug, Default, Clone)]
pub struct CatalogPathBuilder {
    channel: Option<String>,
    namespace: Option<String>,
    version: Option<String>,
    dataset: Option<String>,
    table: Option<String>,
    variable: Option<String>,
}

impl CatalogPathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&mut self, channel: impl AsRef<str>) -> &mut Self {
        self.channel = Some(channel.as_ref().to_owned());
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    pub fn dataset(&mut self, dataset: impl Into<String>) -> &mut Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    pub fn variable(&mut self, variable: impl Into<String>) -> &mut Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn build(&self) -> Result<CatalogPath> {
        use CatalogPathError::MissingField;

        trace!("Building catalog path");
        let channel: Channel = self
            .channel
            .as_deref()
            .ok_or(MissingField(Field::Channel))?
            .parse()?;
        let namespace = self.namespace.clone().ok_or(MissingField(Field::Namespace))?;
        let version = self.version.clone().ok_or(MissingField(Field::Version))?;
        let dataset = self.dataset.clone().ok_or(MissingField(Field::Dataset))?;

        CatalogPath::validated(
            channel,
            namespace,
            version,
            dataset,
            self.table.clone(),
            self.variable.clone(),
        )
    }
}

impl std::str::FromStr for CatalogPath {
    type Err = CatalogPathError;

    fn from_str(s: &str) -> Result<Self> {
        parse::parse(s)
    }
}

impl TryFrom<&str> for CatalogPath {
    type Error = CatalogPathError;

    fn try_from(value: &str) -> Result<Self> {
        parse::parse(value)
    }
}

impl TryFrom<String> for CatalogPath {
    type Error = CatalogPathError;

    fn try_from(value: String) -> Result<Self> {
        parse::parse(&value)
    }
}

impl From<CatalogPath> for String {
    fn from(path: CatalogPath) -> Self {
        path.to_string()
    }
}

impl From<&CatalogPath> for PathBuf {
    fn from(path: &CatalogPath) -> Self {
        path.to_path_buf()
    }
}

impl std::fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.channel, self.namespace, self.version, self.dataset
        )?;
        if let Some(table) = &self.table {
            write!(f, "/{table}")?;
        }
        if let Some(variable) = &self.variable {
            write!(f, "#{variable}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CatalogPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogPath({:?})", self.to_string())
    }
}

impl std::ops::Div<&str> for &CatalogPath {
    type Output = Result<CatalogPath>;

    fn div(self, segment: &str) -> Self::Output {
        self.join(segment)
    }
}

impl std::ops::Div<&str> for CatalogPath {
    type Output = Result<CatalogPath>;

    fn div(self, segment: &str) -> Self::Output {
        self.join(segment)
    }
}

impl PartialEq<str> for CatalogPath {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl PartialEq<&str> for CatalogPath {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

impl PartialEq<String> for CatalogPath {
    fn eq(&self, other: &String) -> bool {
        self.to_string() == *other
    }
}

impl PartialEq<CatalogPath> for str {
    fn eq(&self, other: &CatalogPath) -> bool {
        other == self
    }
}

impl PartialEq<CatalogPath> for &str {
    fn eq(&self, other: &CatalogPath) -> bool {
        other == self
    }
}

impl PartialEq<CatalogPath> for String {
    fn eq(&self, other: &CatalogPath) -> bool {
        other == self
    }
}
