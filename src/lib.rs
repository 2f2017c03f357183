//! classforge
//!
//! A programmatic, object-oriented code-generation engine: callers build an
//! in-memory tree describing one or more classes or interfaces (fields,
//! methods, constructors, full method bodies of statements and expressions),
//! then emit that structure either as readable Java source text or as JVM
//! classfile bytecode. Both backends consume the same tree, visitor and type
//! infrastructure.
//!
//! ## Architecture
//!
//! - **types**: the type and signature model (primitives, arrays, class
//!   types, conversion queries, `ClassInfo`, resolution contexts)
//! - **attr**: globally registered typed attributes attachable to any node
//! - **tree**: the arena tree, node identity, and the controlled copy protocol
//! - **ast**: statement and expression node kinds
//! - **gen**: the class/method/field builder API
//! - **check**: the shared validation/setup pass
//! - **emit**: the source-text and bytecode backends
//! - **reflect**: classfile bytes back into a `ClassInfo`
//! - **verify**: structural verification of emitted classfiles
//!
//! ## Flow
//!
//! ```text
//! ClassGenerator builders -> tree -> check pass -> source text
//!                                               -> classfile bytes
//! ```

pub mod ast;
pub mod attr;
pub mod check;
pub mod config;
pub mod emit;
pub mod error;
pub mod gen;
pub mod reflect;
pub mod tree;
pub mod types;
pub mod verify;

pub use config::Config;
pub use emit::{generate_class_file, generate_source};
pub use error::{Error, Result};
pub use gen::{ClassGenerator, MethodId};
pub use tree::{NodeId, Tree};
pub use types::{access_flags, ClassInfo, FieldInfo, MethodInfo, MethodSignature, ResolutionContext, Type};
