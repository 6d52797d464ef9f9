//! Mapper error implementation.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = MapperError> = core::result::Result<T, E>;

/// Fatal failures of the mapping pipeline.
///
/// Unresolved references are deliberately not here: external input names are
/// legal and surface as warning diagnostics plus an all-ones sentinel in the
/// encoded word instead of aborting the compile.
#[derive(Debug, Error)]
pub enum MapperError {
    /// The DFG description file could not be read.
    #[error("failed to read DFG description: {0}")]
    Io(#[from] std::io::Error),

    /// The DFG description is not valid JSON or does not match the schema.
    #[error("failed to parse DFG description: {0}")]
    Json(#[from] serde_json::Error),

    /// The description declares a number of input arrays other than one.
    #[error("DFG description declares {0} input arrays, expected exactly 1")]
    InputCardinality(usize),

    /// The description has no usable `output` field.
    #[error("DFG description is missing a scalar `output` field")]
    MissingOutput,

    /// A kernel node uses an operation the PE ALU does not implement.
    #[error("unsupported operation `{op}` in node `{node}`")]
    UnsupportedOpcode {
        /// Id of the offending node.
        node: String,
        /// Operation string as written in the description.
        op: String,
    },

    /// A node id was added twice.
    #[error("node with id `{0}` already exists")]
    DuplicateNode(String),

    /// A node id was looked up but never added.
    #[error("node with id `{0}` not found")]
    NodeNotFound(String),

    /// A node landed on a PE slot outside the array.
    #[error("node `{node}` is bound to PE index {pe_index}, beyond the array capacity")]
    CapacityExceeded {
        /// Id of the offending node.
        node: String,
        /// The out-of-range slot.
        pe_index: usize,
    },

    /// The instruction fields do not fit the program memory word. Indicates
    /// a miscomputed width constant; no bitstream is produced.
    #[error("instruction fields occupy {used} bits, exceeding the program memory word")]
    FieldOverflow {
        /// Total non-padding bits.
        used: usize,
    },

    /// The textual mapping dump is malformed.
    #[error("mapping text parse error at line {line}: {reason}")]
    MappingText {
        /// 1-based line of the offending token.
        line: usize,
        /// What was expected or found.
        reason: String,
    },
}
