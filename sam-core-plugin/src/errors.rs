//! Domain error type covering conditions fatal enough to disable the plugin.
//!
//! Per-entity parse errors, runtime probe failures, timeouts, stale
//! coordinates and caller misuse are expected control flow and are
//! handled inline with logging, not with this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OsError {
    #[error("library pack not found among scenery_packs.ini entries")]
    MissingLibraryPack,

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: unparseable manifest root: {reason}")]
    UnparseableManifest { path: String, reason: String },
}
