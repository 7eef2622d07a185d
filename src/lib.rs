pub mod bits;
pub mod bundle;
pub mod ctx8;
pub mod error;
pub mod machine;
pub mod merkle;
pub mod node;
pub mod prim;
pub mod sha256;
pub mod ty;

// Re-exports — the working surface for callers and the CLI
pub use bits::Bits;
pub use bundle::{BlobError, BundleError, ProgramBlob, ProgramBundle};
pub use ctx8::{reference_program, reference_roots};
pub use error::{AssertionFailure, Error, MechanicalError};
pub use machine::{evaluate, evaluate_with_limits, ExecutionResult, Limits};
pub use merkle::{roots, roots_many, Amr, Cmr, Imr, RootCache, RootTriple, Tmr};
pub use node::{Node, NodeKind, NodeRef};
pub use prim::PrimOp;
pub use ty::{Ty, TyExpr};
