//! Error types for the Corridor binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup. Everything here happens before the
//! simulation begins; the simulation core itself clamps instead of
//! failing.

/// Top-level error for the Corridor binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: corridor_core::config::ConfigError,
    },

    /// Route or fleet definition loading failed.
    #[error("model error: {source}")]
    Model {
        /// The underlying model error.
        #[from]
        source: corridor_model::ModelError,
    },

    /// The fast-forward batch run could not start.
    #[error("batch error: {source}")]
    Batch {
        /// The underlying fast-forward error.
        #[from]
        source: corridor_core::fastforward::FastForwardError,
    },

    /// Writing the batch report failed.
    #[error("report error: {source}")]
    Report {
        /// The underlying report error.
        #[from]
        source: corridor_core::report::ReportError,
    },

    /// The Observer API server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: corridor_observer::ServerError,
    },
}
