//! The combinator DAG.
//!
//! Nodes are immutable once constructed and shared via `Arc`: the same
//! node may appear under any number of parents. Pointer identity keys the
//! sharing-aware algorithms (Merkle memoization); value equality of the
//! underlying structure is what the hashes commit to. Every constructor
//! checks that child types compose, so a `Node` in hand is well-typed by
//! construction and the machine never re-checks composition.

use std::fmt;
use std::sync::Arc;

use crate::bits::Bits;
use crate::error::Error;
use crate::prim::PrimOp;
use crate::sha256::Midstate;
use crate::ty::Ty;

pub type NodeRef = Arc<Node>;

/// A typed combinator node: transforms a value of the source type into a
/// value of the target type.
#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    source: Arc<Ty>,
    target: Arc<Ty>,
}

#[derive(Debug)]
pub enum NodeKind {
    /// `A -> A`.
    Iden,
    /// `A -> 1`.
    Unit,
    /// `A -> B + C` from a child `A -> B`.
    InjL(NodeRef),
    /// `A -> B + C` from a child `A -> C`.
    InjR(NodeRef),
    /// `A * B -> C` from a child `A -> C`.
    Take(NodeRef),
    /// `A * B -> C` from a child `B -> C`.
    Drop(NodeRef),
    /// `A -> C` from `A -> B` and `B -> C`.
    Comp(NodeRef, NodeRef),
    /// `A -> B * C` from `A -> B` and `A -> C`.
    Pair(NodeRef, NodeRef),
    /// `(A + B) * C -> D` from `A * C -> D` and `B * C -> D`.
    Case(NodeRef, NodeRef),
    /// Externally supplied literal data; excluded from the commitment root.
    Witness(Bits),
    /// A literal constant committed to in every root.
    Scribe(Bits),
    /// A pruned branch: hashable, never executable.
    Hidden(Midstate),
    /// A built-in primitive with fixed types.
    Prim(PrimOp),
}

fn ty_eq(a: &Arc<Ty>, b: &Arc<Ty>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

impl Node {
    fn mk(kind: NodeKind, source: Arc<Ty>, target: Arc<Ty>) -> NodeRef {
        Arc::new(Node {
            kind,
            source,
            target,
        })
    }

    pub fn iden(ty: Arc<Ty>) -> NodeRef {
        Self::mk(NodeKind::Iden, ty.clone(), ty)
    }

    pub fn unit(source: Arc<Ty>) -> NodeRef {
        Self::mk(NodeKind::Unit, source, Ty::unit())
    }

    pub fn injl(f: &NodeRef, right: Arc<Ty>) -> NodeRef {
        let target = Ty::sum(f.target.clone(), right);
        Self::mk(NodeKind::InjL(f.clone()), f.source.clone(), target)
    }

    pub fn injr(f: &NodeRef, left: Arc<Ty>) -> NodeRef {
        let target = Ty::sum(left, f.target.clone());
        Self::mk(NodeKind::InjR(f.clone()), f.source.clone(), target)
    }

    pub fn take(f: &NodeRef, right: Arc<Ty>) -> NodeRef {
        let source = Ty::product(f.source.clone(), right);
        Self::mk(NodeKind::Take(f.clone()), source, f.target.clone())
    }

    pub fn drop(f: &NodeRef, left: Arc<Ty>) -> NodeRef {
        let source = Ty::product(left, f.source.clone());
        Self::mk(NodeKind::Drop(f.clone()), source, f.target.clone())
    }

    pub fn comp(f: &NodeRef, g: &NodeRef) -> Result<NodeRef, Error> {
        if !ty_eq(&f.target, &g.source) {
            return Err(Error::TypeMismatch {
                combinator: "comp",
                expected: f.target.clone(),
                found: g.source.clone(),
            });
        }
        Ok(Self::mk(
            NodeKind::Comp(f.clone(), g.clone()),
            f.source.clone(),
            g.target.clone(),
        ))
    }

    pub fn pair(f: &NodeRef, g: &NodeRef) -> Result<NodeRef, Error> {
        if !ty_eq(&f.source, &g.source) {
            return Err(Error::TypeMismatch {
                combinator: "pair",
                expected: f.source.clone(),
                found: g.source.clone(),
            });
        }
        let target = Ty::product(f.target.clone(), g.target.clone());
        Ok(Self::mk(
            NodeKind::Pair(f.clone(), g.clone()),
            f.source.clone(),
            target,
        ))
    }

    pub fn case(f: &NodeRef, g: &NodeRef) -> Result<NodeRef, Error> {
        let (a, c_left) = f.source.as_product().ok_or_else(|| Error::ProductRequired {
            combinator: "case",
            found: f.source.clone(),
        })?;
        let (b, c_right) = g.source.as_product().ok_or_else(|| Error::ProductRequired {
            combinator: "case",
            found: g.source.clone(),
        })?;
        if !ty_eq(c_left, c_right) {
            return Err(Error::TypeMismatch {
                combinator: "case",
                expected: c_left.clone(),
                found: c_right.clone(),
            });
        }
        if !ty_eq(&f.target, &g.target) {
            return Err(Error::TypeMismatch {
                combinator: "case",
                expected: f.target.clone(),
                found: g.target.clone(),
            });
        }
        let source = Ty::product(Ty::sum(a.clone(), b.clone()), c_left.clone());
        Ok(Self::mk(
            NodeKind::Case(f.clone(), g.clone()),
            source,
            f.target.clone(),
        ))
    }

    pub fn witness(source: Arc<Ty>, target: Arc<Ty>, bits: Bits) -> Result<NodeRef, Error> {
        if bits.len() as u64 != target.width() {
            return Err(Error::LiteralWidth {
                combinator: "witness",
                expected: target.width(),
                found: bits.len() as u64,
            });
        }
        Ok(Self::mk(NodeKind::Witness(bits), source, target))
    }

    pub fn scribe(source: Arc<Ty>, target: Arc<Ty>, bits: Bits) -> Result<NodeRef, Error> {
        if bits.len() as u64 != target.width() {
            return Err(Error::LiteralWidth {
                combinator: "scribe",
                expected: target.width(),
                found: bits.len() as u64,
            });
        }
        Ok(Self::mk(NodeKind::Scribe(bits), source, target))
    }

    pub fn hidden(source: Arc<Ty>, target: Arc<Ty>, digest: Midstate) -> NodeRef {
        Self::mk(NodeKind::Hidden(digest), source, target)
    }

    pub fn prim(op: PrimOp) -> NodeRef {
        Self::mk(NodeKind::Prim(op), op.source_ty(), op.target_ty())
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn source(&self) -> &Arc<Ty> {
        &self.source
    }

    pub fn target(&self) -> &Arc<Ty> {
        &self.target
    }

    /// The child hashed into the left slot, if any.
    pub fn left_child(&self) -> Option<&NodeRef> {
        match &self.kind {
            NodeKind::InjL(t) | NodeKind::InjR(t) | NodeKind::Take(t) | NodeKind::Drop(t) => {
                Some(t)
            }
            NodeKind::Comp(s, _) | NodeKind::Pair(s, _) | NodeKind::Case(s, _) => Some(s),
            _ => None,
        }
    }

    /// The child hashed into the right slot, if any.
    pub fn right_child(&self) -> Option<&NodeRef> {
        match &self.kind {
            NodeKind::Comp(_, t) | NodeKind::Pair(_, t) | NodeKind::Case(_, t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Iden => write!(f, "iden"),
            NodeKind::Unit => write!(f, "unit"),
            NodeKind::InjL(t) => write!(f, "injl({t})"),
            NodeKind::InjR(t) => write!(f, "injr({t})"),
            NodeKind::Take(t) => write!(f, "take({t})"),
            NodeKind::Drop(t) => write!(f, "drop({t})"),
            NodeKind::Comp(s, t) => write!(f, "comp({s}, {t})"),
            NodeKind::Pair(s, t) => write!(f, "pair({s}, {t})"),
            NodeKind::Case(s, t) => write!(f, "case({s}, {t})"),
            NodeKind::Witness(bits) => write!(f, "witness[{}]", bits.len()),
            NodeKind::Scribe(bits) => write!(f, "scribe[{}]", bits.len()),
            NodeKind::Hidden(digest) => write!(f, "hidden({})", &digest.to_hex()[..8]),
            NodeKind::Prim(op) => write!(f, "{}", op.name()),
        }
    }
}
