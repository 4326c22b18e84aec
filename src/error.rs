//! Error types for the mesh splitter.

use thiserror::Error;

/// Result type alias using SplitError.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Main error type for mesh splitting operations.
#[derive(Error, Debug)]
pub enum SplitError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data (material tables, pipeline manifests).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A face record whose index triplets cannot be parsed. Structural
    /// corruption of the source stream; never recovered locally.
    #[error("malformed face record at line {line}: {text:?}")]
    MalformedFace { line: u64, text: String },

    /// A face references a declaration index beyond anything read so far
    /// (a forward reference). Structural corruption of the source.
    #[error("face at line {line} references undeclared index {index}")]
    DanglingIndex { line: u64, index: u64 },

    /// The index ledger was queried for a partition that was never opened.
    /// This is a contract violation in the router, not an input error.
    #[error("index ledger queried for unopened partition {0:?}")]
    LedgerUnopened(String),

    /// A partition's output path already exists and is not a file this pass
    /// created. Refuses to silently merge unrelated content.
    #[error("output collision: {0:?} already exists and was not written by this pass")]
    OutputCollision(std::path::PathBuf),

    /// A conversion unit failed; aborts the whole pipeline.
    #[error("conversion unit {unit:?} failed: {source}")]
    UnitFailed {
        unit: String,
        #[source]
        source: Box<SplitError>,
    },

    /// Two units both claim to define the unique global environment.
    #[error("environment defined by both {first:?} and {second:?}")]
    EnvironmentConflict { first: String, second: String },

    /// Two units produced a shape with the same name.
    #[error("shape {shape:?} produced by both {first:?} and {second:?}")]
    ShapeConflict {
        shape: String,
        first: String,
        second: String,
    },
}
