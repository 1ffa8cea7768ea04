//! Addressing of the resources in the ETL data catalog.
//!
//! The catalog is a hierarchy of datasets grouped by channel, namespace and version.
//! Every dataset consists of tables, and every table consists of indicators (variables).
//! Any of these is addressed by a [CatalogPath]:
//!
//! ```text
//! channel/namespace/version/dataset[/table][#variable]
//! ```
//!
//! # Channels
//! Channel is the stage of the pipeline the data belongs to. Raw files fetched from the
//! providers are stored as `snapshot`s. These are then cleaned into `meadow`, harmonized
//! into `garden` and prepared for charts in `grapher`. There are a few more channels
//! for special cases, see [Channel].
//!
//! # Versions
//! Version is either a date `YYYY-MM-DD`, a year `YYYY` or `latest`. Only the shape
//! is checked, so `2024-13-40` is a valid version.
//!
//! # Names
//! Namespace, dataset, table and variable names consist of ASCII letters, digits,
//! `_` and `-`, and cannot be empty.
//!
//! # Snapshots
//! Snapshots are usually referred to with the `snapshot://` (or `snapshot-private://`)
//! scheme, in which case the channel is omitted: `snapshot://un/2024-07-12/un_wpp`.
//! Any other scheme is stripped from the path and has no meaning for it, so that
//! `data://garden/who/2024/gho` addresses the same dataset as `garden/who/2024/gho`.
//!
//! # Steps
//! Datasets are built by the pipeline steps, that are identified by [StepUri]s and
//! depend on each other as described by the [Dag].

/// Channels of the catalog.
pub mod channel;

/// Path to the dataset, table or indicator in the catalog. Its parsing, validation
/// and transformations.
pub mod path;

/// Identifiers of the pipeline steps, like `data://garden/who/2024/gho`.
pub mod step;

/// Dependency graph of the pipeline steps.
pub mod dag;

pub use channel::Channel;
pub use dag::Dag;
pub use path::{CatalogPath, CatalogPathBuilder, CatalogPathError};
pub use step::{StepScheme, StepUri};

#[cfg(test)]
pub fn init_log() {
    use log::*;

    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        flexi_logger::Logger::with(LevelFilter::Trace)
            .format(format)
            .start()
            .unwrap();
    });

    fn format(
        write: &mut dyn std::io::Write,
        _: &mut flexi_logger::DeferredNow,
        record: &Record,
    ) -> std::io::Result<()> {
        write.write_all(
            format!(
                "[{} {}:{}] {} - {}",
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.module_path().unwrap_or_default(),
                record.args()
            )
            .as_bytes(),
        )
    }
}
