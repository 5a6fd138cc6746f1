//! Code-generation backend for the Vela language.
//!
//! The backend consumes a fully typed term graph (`vela_core`) and lowers
//! each module to a class-shaped executable unit: one module representation
//! class plus one generated class per function literal. Construction is
//! two-phase: signature-only skeletons for every class exist before any
//! body is filled, so mutually referential generated code always finds its
//! forward references.

pub mod artifact;
mod assemble;
pub mod closure;
pub mod coerce;
pub mod emit;
pub mod intrinsics;
mod lower;
mod names;
pub mod repr;
pub mod session;
pub mod skeleton;
pub mod units;

pub use closure::ClosureKind;
pub use emit::{ArtifactDescriptor, ClassArtifact, TextUnitBackend, UnitBackend};
pub use intrinsics::{IntrinsicImpl, IntrinsicRegistry, IntrinsicResolver, ResolvedIntrinsic};
pub use repr::{PrimKind, RefKind, ReprClass};
pub use session::Session;
pub use skeleton::{ClassSkeleton, QualifiedName, SkeletonState};
pub use units::{BuildPhase, Unit, UnitDictionary};

use vela_core::term::Program;

#[derive(Debug, thiserror::Error)]
pub enum VelaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codegen error: {0}")]
    Codegen(String),
    #[error("Intrinsic resolution failed: {0}")]
    Intrinsic(String),
    #[error("Artifact construction failed: {0}")]
    Artifact(String),
    #[error("Import cycle: {0}")]
    ImportCycle(String),
    #[error("Unknown module: {0}")]
    UnknownModule(String),
    #[error("Diagnostics emitted")]
    Diagnostics,
}

/// Compiles `entry` and (transitively, depth-first) every module it imports,
/// returning the populated unit dictionary.
pub fn compile_program(
    session: &Session,
    program: &Program,
    entry: &str,
) -> Result<UnitDictionary, VelaError> {
    let mut dictionary = UnitDictionary::new();
    dictionary.ensure_built(session, program, entry)?;
    Ok(dictionary)
}
