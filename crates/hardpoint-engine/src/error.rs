//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine during
//! startup so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration or game data loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hardpoint_core::config::ConfigError,
    },

    /// The transition table failed validation.
    #[error("transition table error: {source}")]
    Table {
        /// The underlying table error.
        #[from]
        source: hardpoint_core::table::TableError,
    },
}
