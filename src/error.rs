//! Crate-wide error type aggregating the per-subsystem errors

use thiserror::Error;

use crate::check::CheckFailure;
use crate::emit::EmitError;
use crate::gen::BuilderError;
use crate::reflect::ReflectError;
use crate::types::ResolveError;
use crate::verify::VerifyError;

/// Any failure the generation engine can report.
///
/// The three conditions callers are expected to distinguish:
/// `Builder` (the tree was constructed illegally), `Check` (the finished
/// tree is type-inconsistent), and `Resolve` (the environment lacks a
/// class the tree refers to).
#[derive(Error, Debug)]
pub enum Error {
    #[error("builder error: {0}")]
    Builder(#[from] BuilderError),
    #[error("{0}")]
    Check(#[from] CheckFailure),
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("emission error: {0}")]
    Emit(#[from] EmitError),
    #[error("classfile verification failed: {0}")]
    Verify(#[from] VerifyError),
    #[error("classfile read error: {0}")]
    Reflect(#[from] ReflectError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
