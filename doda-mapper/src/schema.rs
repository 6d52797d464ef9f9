//! Serde model of the DFG description consumed by the mapper.
//!
//! The description is the JSON emitted by the kernel extraction tool and
//! patched by the runtime with [`RuntimeMetadata`] before compilation.

use crate::error::Result;
use crate::graph::Operand;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Size of one input vector element in bytes; the array datapath is 32 bits
/// wide.
pub const ELEMENT_SIZE_BYTES: u32 = (doda_asm::params::DATA_WIDTH / 8) as u32;

/// A per-element kernel description.
#[derive(Debug, Clone, Deserialize)]
pub struct DfgDescription {
    /// Kernel nodes in SSA order.
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    /// Names of the input arrays; the hardware supports exactly one.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Node producing the kernel's per-element result.
    #[serde(default)]
    pub output: Option<OutputDescription>,
    /// Metadata stamped in by the runtime before compilation.
    #[serde(default)]
    pub runtime_metadata: Option<RuntimeMetadata>,
}

impl DfgDescription {
    /// Reads and parses a DFG description file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Interprets an already parsed JSON tree.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Id of the node producing the kernel output, if declared.
    pub fn output_id(&self) -> Option<&str> {
        self.output.as_ref().map(OutputDescription::id)
    }

    /// Number of vector elements the loop iterates over; zero until the
    /// runtime stamps the metadata.
    pub fn element_count(&self) -> u32 {
        self.runtime_metadata
            .as_ref()
            .map_or(0, RuntimeMetadata::element_count)
    }
}

/// One kernel node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDescription {
    /// SSA name, unique within the graph.
    pub id: String,
    /// Source operation string, resolved through [`doda_asm::Opcode::parse`].
    pub op: String,
    /// Declared operands, in order.
    #[serde(default)]
    pub inputs: Vec<InputDescription>,
}

/// One declared operand: a reference to a producer node or a constant.
///
/// A well-formed operand carries exactly one of `id` and `value`; the
/// builder warns about entries with neither.
#[derive(Debug, Clone, Deserialize)]
pub struct InputDescription {
    /// Operand slot this input feeds.
    #[serde(rename = "type")]
    pub kind: Operand,
    /// Producer node id, for reference operands.
    #[serde(default)]
    pub id: Option<String>,
    /// Constant value, for immediate operands.
    #[serde(default)]
    pub value: Option<i32>,
}

/// The `output` field: either a bare producer name or a `{"id": name}`
/// object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputDescription {
    /// `"output": "name"`.
    Name(String),
    /// `"output": {"id": "name"}`.
    Reference {
        /// Producer node id.
        id: String,
    },
}

impl OutputDescription {
    /// The referenced producer id.
    pub fn id(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Reference { id } => id,
        }
    }
}

/// Loop trip-count metadata the runtime patches into the description.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RuntimeMetadata {
    /// Input vector payload size in bytes: element count times
    /// [`ELEMENT_SIZE_BYTES`].
    pub input_size_in_bytes: u32,
}

impl RuntimeMetadata {
    /// Metadata for a vector of `elements` 32-bit values.
    ///
    /// The legacy runtime stamped the `sizeof` of the container object here
    /// rather than the payload size, which made the derived trip count
    /// nonsense. Computing the byte size from the element count is the
    /// supported path.
    pub fn for_element_count(elements: u32) -> Self {
        Self {
            input_size_in_bytes: elements * ELEMENT_SIZE_BYTES,
        }
    }

    /// Number of 32-bit elements in the input vector.
    pub fn element_count(&self) -> u32 {
        self.input_size_in_bytes / ELEMENT_SIZE_BYTES
    }
}
