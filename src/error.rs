//! Crate error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a slot or the whole process.
///
/// Recoverable conditions (short reads, slot-table exhaustion,
/// best-effort effect removal) are logged where they occur and never
/// surface through this type.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Registering the discovery bus or signal descriptor with the
    /// multiplexer failed. Fatal for the process.
    #[error("event multiplexer failure: {0}")]
    Multiplexer(#[source] io::Error),

    /// Subscribing to or reading the discovery bus failed. Fatal for
    /// the process.
    #[error("discovery bus failure: {0}")]
    Discovery(#[source] io::Error),

    /// A physical node could not be opened. Fatal for the slot.
    #[error("failed to open {path}: {source}")]
    NodeOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A feature-bitmask or capacity query on a physical node failed.
    /// Fatal for the process: continuing would mirror undefined
    /// capabilities.
    #[error("capability query on {path} failed: {source}")]
    FeatureQuery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Declaring the mirror device failed. Fatal for the slot.
    #[error("failed to create mirror device: {0}")]
    MirrorCreate(#[source] io::Error),
}
