//! Error taxonomy.
//!
//! Construction-time errors (`Error`) abort DAG or type construction and
//! never reach the machine. Execution-time faults (`MechanicalError`) end
//! one `evaluate` call and leave everything else reusable. An
//! `AssertionFailure` is not an error at all: it is the legitimate
//! "program rejected its input" outcome and lives inside
//! `ExecutionResult::Failed`.

use std::fmt;
use std::sync::Arc;

use crate::ty::Ty;

/// Errors raised while constructing types or combinator nodes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Two types that a combinator requires to be equal are not.
    #[error("{combinator}: type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        combinator: &'static str,
        expected: Arc<Ty>,
        found: Arc<Ty>,
    },
    /// A combinator that dissects its input was given a non-product source.
    #[error("{combinator}: branch source {found} is not a product type")]
    ProductRequired {
        combinator: &'static str,
        found: Arc<Ty>,
    },
    /// A literal whose bit length does not match its declared type width.
    #[error("{combinator}: literal is {found} bits, target type is {expected} bits wide")]
    LiteralWidth {
        combinator: &'static str,
        expected: u64,
        found: u64,
    },
    /// An externally supplied type definition that cannot be admitted.
    #[error("malformed type: {reason}")]
    MalformedType { reason: String },
}

/// Execution faults: the program (or its caller) is malformed, or a
/// resource ceiling was hit. Always distinct from an assertion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MechanicalError {
    #[error("input is {found} bits, program source type is {expected} bits wide")]
    InputWidthMismatch { expected: u64, found: u64 },
    #[error("read cursor overran its frame")]
    ReadOverrun,
    #[error("write cursor overran its frame")]
    WriteOverrun,
    #[error("read of a cell that was never written")]
    UndefinedCellRead,
    #[error("cursor moved before the start of its frame")]
    CursorUnderflow,
    #[error("execution reached a pruned branch")]
    PrunedBranchReached,
    #[error("step ceiling of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },
    #[error("cell ceiling of {limit} exceeded")]
    CellLimitExceeded { limit: u64 },
}

/// A `verify` that observed false. Expected, cheap, and not a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionFailure {
    /// Name of the primitive that rejected.
    pub prim: &'static str,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} observed false", self.prim)
    }
}
