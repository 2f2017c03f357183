//! Emission backends
//!
//! Two renderers consume the same tree and visitor infrastructure: a source
//! text emitter and a classfile bytecode emitter. Both run the shared
//! validation/setup pass first and refuse trees with inconsistent types; a
//! structural error never downgrades to a warning.

pub mod bytecode;
pub mod source;

use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

use crate::check;
use crate::config::Config;
use crate::error::Result;
use crate::gen::ClassGenerator;
use crate::types::{install_context, ResolutionContext};
use crate::verify;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("method '{0}' is not finalized")]
    MethodNotFinalized(String),
    #[error("non-void method '{0}' can complete without returning")]
    MissingReturn(String),
    #[error("label bound twice")]
    LabelRebound,
    #[error("branch to an unbound label")]
    UnboundLabel,
    #[error("branch offset out of range: {0}")]
    BranchOutOfRange(i64),
    #[error("constant pool is out of space")]
    ConstantPoolOverflow,
    #[error("code size exceeds the classfile limit")]
    CodeTooLarge,
    #[error("cannot emit '{0}' in executable form")]
    Unsupported(String),
}

/// Generate Java source text for the class. The class is validated first;
/// `source_dir` additionally writes `<package path>/<Name>.java`.
pub fn generate_source(
    gen: &mut ClassGenerator,
    context: &Rc<ResolutionContext>,
    imports: &[String],
    config: &Config,
) -> Result<String> {
    install_context(Rc::clone(context));
    ensure_finalized(gen)?;
    check::run(gen, context, imports, config)?;
    let text = source::SourceEmitter::new(gen, imports, config).emit()?;
    if let Some(dir) = &config.source_dir {
        let path = artifact_path(dir, gen.name(), "java");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &text)?;
        log::debug!("wrote source artifact {}", path.display());
    }
    Ok(text)
}

/// Generate classfile bytes for the class under the given class-loading
/// context. The class is validated first; `verify_bytecode` runs the
/// structural verifier over the result, and `class_dir` additionally writes
/// `<package path>/<Name>.class`.
pub fn generate_class_file(
    gen: &mut ClassGenerator,
    context: &Rc<ResolutionContext>,
    imports: &[String],
    config: &Config,
) -> Result<Vec<u8>> {
    install_context(Rc::clone(context));
    ensure_finalized(gen)?;
    check::run(gen, context, imports, config)?;
    let class_file = bytecode::ClassFileEmitter::new(gen, context, imports, config).emit()?;
    if config.verify_bytecode {
        verify::verify(&class_file)?;
    }
    let bytes = bytecode::writer::class_file_to_bytes(&class_file);
    if let Some(dir) = &config.class_dir {
        let path = artifact_path(dir, gen.name(), "class");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &bytes)?;
        log::debug!("wrote class artifact {}", path.display());
    }
    Ok(bytes)
}

/// Artifact naming follows the class's qualified name.
fn artifact_path(dir: &std::path::Path, qualified_name: &str, extension: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    path.push(qualified_name.replace('.', "/"));
    path.set_extension(extension);
    path
}

fn ensure_finalized(gen: &ClassGenerator) -> Result<()> {
    for method in gen.methods() {
        if gen.method_info(method).is_err() {
            return Err(EmitError::MethodNotFinalized(method_name(gen, method)).into());
        }
    }
    Ok(())
}

fn method_name(gen: &ClassGenerator, method: crate::gen::MethodId) -> String {
    gen.method_decl(method)
        .map(|d| d.name.clone())
        .unwrap_or_else(|_| "<unknown>".to_string())
}
