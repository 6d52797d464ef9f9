//! DODA mapper implementation.
//!
//! Compiles a dataflow-graph description of a per-element uint32 kernel into
//! the configuration bitstream of the DODA CGRA. The pipeline: parse the
//! JSON description ([`schema`]), wrap the kernel into a streaming loop and
//! bind every node to a PE slot ([`builder`]), resolve references
//! ([`graph`]), then encode one program-memory word per PE and assemble them
//! cluster-major ([`bitstream`]). A round-trippable textual projection of
//! the graph lives in [`text`].
//!
//! The mapper performs no I/O beyond reading the description file handed to
//! [`compile`]; diagnostics go through `tracing` and installing a subscriber
//! is caller policy. Compilation is a pure function of its input, so
//! concurrent compiles need no synchronization.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod bitstream;
pub mod builder;
pub mod error;
pub mod graph;
pub mod schema;
pub mod text;

#[doc(no_inline)]
pub use doda_asm;

pub use bitstream::{encode_node, generate_bitstream, Bitstream};
pub use builder::GraphBuilder;
pub use error::{MapperError, Result};
pub use graph::MapperDfg;
pub use schema::DfgDescription;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiles a DFG description file into the array bitstream.
pub fn compile(path: impl AsRef<std::path::Path>) -> Result<Bitstream> {
    compile_description(DfgDescription::from_path(path)?)
}

/// Compiles an already parsed JSON tree.
pub fn compile_value(value: serde_json::Value) -> Result<Bitstream> {
    compile_description(DfgDescription::from_value(value)?)
}

/// Compiles a parsed description.
pub fn compile_description(desc: DfgDescription) -> Result<Bitstream> {
    let dfg = GraphBuilder::new(desc).build()?;
    generate_bitstream(&dfg)
}

/// Compiles a previously emitted textual dump (see [`text`]).
pub fn compile_mapping_text(dump: &str) -> Result<Bitstream> {
    let dfg = text::parse_mapping_text(dump)?;
    generate_bitstream(&dfg)
}

/// Required types to compile a description and inspect the result.
pub mod prelude {
    pub use crate::bitstream::{generate_bitstream, Bitstream};
    pub use crate::builder::GraphBuilder;
    pub use crate::error::{MapperError, Result};
    pub use crate::graph::{InputSource, MapperDfg, MapperNode, Operand};
    pub use crate::schema::{DfgDescription, RuntimeMetadata};
    pub use doda_asm::{ClusterMask, Opcode, PeOp};
}
