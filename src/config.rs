//! Emission configuration

use std::path::PathBuf;

/// Options recognized by the emission entry points.
///
/// All flags default to off; the output directories default to "do not
/// write files, return the artifact only".
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Dump the tree to the log after the validation/setup pass.
    pub dump_after_setup: bool,
    /// Trace each emitted fragment/instruction to the log.
    pub trace_emission: bool,
    /// Run the structural classfile verifier over emitted bytecode.
    pub verify_bytecode: bool,
    /// Directory to write generated `.java` sources into, mirroring the
    /// package path of the class's qualified name.
    pub source_dir: Option<PathBuf>,
    /// Directory to write generated `.class` files into.
    pub class_dir: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }
}
