//! Error types for model loading.
//!
//! The simulation core itself handles numeric edge cases by clamping or
//! no-op (a full vehicle simply boards nobody); errors only exist at the
//! initialization boundary where route and fleet files are read.

/// Errors that can occur while loading route or fleet definitions.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Failed to read a definition file from disk.
    #[error("failed to read definition file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse definition JSON: {source}")]
    Parse {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// The route definition contained no stops.
    #[error("route definition contains no stops")]
    EmptyRoute,
}
