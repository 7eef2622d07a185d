//! The bit machine: a frame-stack interpreter over combinator DAGs.
//!
//! Execution walks the DAG with two frame stacks. The top read frame
//! views the current input through a cursor; the top write frame receives
//! the current output. `Comp` is the only combinator that allocates an
//! intermediate frame; `Take`/`Drop`/`Case` are cursor moves over frames
//! that already exist, and `Pair` simply writes both halves in sequence
//! (left first, for reproducible accounting).
//!
//! Three terminal outcomes, never conflated: `Succeeded` with the output
//! bits, `Failed` when a `verify` legitimately observed false, and
//! `Faulted` for mechanical errors (bounds, pruned branches, resource
//! ceilings). A fault aborts immediately, so it always wins over a
//! would-be assertion failure further up the DAG.

mod frame;

use serde::{Deserialize, Serialize};

use crate::bits::Bits;
use crate::error::{AssertionFailure, MechanicalError};
use crate::node::{Node, NodeKind, NodeRef};
use frame::Frame;

/// Resource ceilings for one execution. The combinator set has no loops,
/// so these are accounting bounds, not termination requirements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum combinator-node entries.
    pub max_steps: u64,
    /// Maximum live frame cells.
    pub max_cells: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_steps: 1 << 22,
            max_cells: 1 << 26,
        }
    }
}

/// Outcome of one `evaluate` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The program ran to completion; the output bit string follows.
    Succeeded(Bits),
    /// The program ran correctly and rejected its input.
    Failed(AssertionFailure),
    /// The program (or its invocation) is malformed, or a ceiling was hit.
    Faulted(MechanicalError),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Succeeded(_))
    }

    /// The output bits, if the program succeeded.
    pub fn output(&self) -> Option<&Bits> {
        match self {
            ExecutionResult::Succeeded(bits) => Some(bits),
            _ => None,
        }
    }
}

/// Run a program against an input bit string with default limits.
pub fn evaluate(root: &NodeRef, input: &Bits) -> ExecutionResult {
    evaluate_with_limits(root, input, Limits::default())
}

/// Run a program against an input bit string with explicit ceilings.
pub fn evaluate_with_limits(root: &NodeRef, input: &Bits, limits: Limits) -> ExecutionResult {
    let source_width = root.source().width();
    if input.len() as u64 != source_width {
        return ExecutionResult::Faulted(MechanicalError::InputWidthMismatch {
            expected: source_width,
            found: input.len() as u64,
        });
    }

    let mut machine = Machine {
        read: Vec::new(),
        write: Vec::new(),
        steps: 0,
        cells: 0,
        limits,
    };
    if let Err(fault) = machine.charge_cells(source_width + root.target().width()) {
        return ExecutionResult::Faulted(fault);
    }
    machine.read.push(Frame::from_bits(input));
    machine.write.push(Frame::new(root.target().width() as usize));

    match machine.exec(root) {
        Ok(()) => {
            let output = machine.write.last().expect("output frame present");
            ExecutionResult::Succeeded(output.to_bits())
        }
        Err(Exit::Fail(failure)) => ExecutionResult::Failed(failure),
        Err(Exit::Fault(fault)) => ExecutionResult::Faulted(fault),
    }
}

enum Exit {
    Fail(AssertionFailure),
    Fault(MechanicalError),
}

impl From<MechanicalError> for Exit {
    fn from(fault: MechanicalError) -> Self {
        Exit::Fault(fault)
    }
}

struct Machine {
    read: Vec<Frame>,
    write: Vec<Frame>,
    steps: u64,
    cells: u64,
    limits: Limits,
}

impl Machine {
    fn charge_cells(&mut self, width: u64) -> Result<(), MechanicalError> {
        self.cells += width;
        if self.cells > self.limits.max_cells {
            return Err(MechanicalError::CellLimitExceeded {
                limit: self.limits.max_cells,
            });
        }
        Ok(())
    }

    fn exec(&mut self, node: &Node) -> Result<(), Exit> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(MechanicalError::StepLimitExceeded {
                limit: self.limits.max_steps,
            }
            .into());
        }

        match node.kind() {
            NodeKind::Unit => Ok(()),

            NodeKind::Iden => {
                let width = node.source().width() as usize;
                let src = self.read.last().expect("read stack non-empty");
                let dst = self.write.last_mut().expect("write stack non-empty");
                src.copy_into(width, dst)?;
                Ok(())
            }

            NodeKind::InjL(t) => {
                let pad = node.target().width() - 1 - t.target().width();
                let dst = self.write.last_mut().expect("write stack non-empty");
                dst.write_bit(false)?;
                dst.skip(pad as usize)?;
                self.exec(t)
            }

            NodeKind::InjR(t) => {
                let pad = node.target().width() - 1 - t.target().width();
                let dst = self.write.last_mut().expect("write stack non-empty");
                dst.write_bit(true)?;
                dst.skip(pad as usize)?;
                self.exec(t)
            }

            NodeKind::Take(t) => self.exec(t),

            NodeKind::Drop(t) => {
                let skip = (node.source().width() - t.source().width()) as usize;
                self.read.last_mut().expect("read stack non-empty").fwd(skip)?;
                self.exec(t)?;
                self.read.last_mut().expect("read stack non-empty").bwd(skip)?;
                Ok(())
            }

            NodeKind::Comp(s, t) => {
                self.charge_cells(s.target().width())?;
                self.write.push(Frame::new(s.target().width() as usize));
                self.exec(s)?;
                let intermediate = self.write.pop().expect("intermediate frame present");
                self.read.push(intermediate.into_read());
                self.exec(t)?;
                let used = self.read.pop().expect("intermediate frame present");
                self.cells -= used.width() as u64;
                Ok(())
            }

            NodeKind::Pair(s, t) => {
                self.exec(s)?;
                self.exec(t)
            }

            NodeKind::Case(s, t) => {
                let (sum_ty, _) = node
                    .source()
                    .as_product()
                    .expect("case source is a product");
                let (pad_left, pad_right) = sum_ty.sum_padding().expect("case scrutinee is a sum");
                let frame = self.read.last_mut().expect("read stack non-empty");
                let discriminant = frame.peek()?;
                let advance = (1 + if discriminant { pad_right } else { pad_left }) as usize;
                frame.fwd(advance)?;
                self.exec(if discriminant { t } else { s })?;
                self.read.last_mut().expect("read stack non-empty").bwd(advance)?;
                Ok(())
            }

            NodeKind::Witness(bits) | NodeKind::Scribe(bits) => {
                let dst = self.write.last_mut().expect("write stack non-empty");
                dst.write_bits(bits)?;
                Ok(())
            }

            NodeKind::Hidden(_) => Err(MechanicalError::PrunedBranchReached.into()),

            NodeKind::Prim(op) => {
                let width = node.source().width() as usize;
                let input = self.read.last().expect("read stack non-empty").read_bits(width)?;
                match op.eval(&input) {
                    Ok(output) => {
                        let dst = self.write.last_mut().expect("write stack non-empty");
                        dst.write_bits(&output)?;
                        Ok(())
                    }
                    Err(failure) => Err(Exit::Fail(failure)),
                }
            }
        }
    }
}
