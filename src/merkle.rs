//! Merkle roots over combinator DAGs.
//!
//! Three reductions run over the same structure, separated by tag
//! namespace:
//! - **CMR** commits to shape and constants; witness content is excluded,
//!   so programs differing only in witness data share one commitment.
//! - **IMR** additionally commits to witness content.
//! - **AMR** additionally folds every node's source and target type roots.
//!
//! Every hash is `compress_pair(iv, left, right)` under an IV derived from
//! a `filament\x1f<root>\x1f<node>` tag, so no two (root kind, node kind)
//! positions can collide. A node shared by N parents is hashed once:
//! the cache is keyed by pointer identity, which is a performance
//! guarantee only; recomputation would produce identical digests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::bits::hex_to_bytes;
use crate::node::{Node, NodeKind, NodeRef};
use crate::sha256::{self, compress_pair, tag_iv, value_hash, Midstate};
use crate::ty::{Ty, TyKind};

macro_rules! digest_newtype {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) Midstate);

        impl $name {
            pub fn as_midstate(self) -> Midstate {
                self.0
            }

            /// The root as 8 big-endian 32-bit words.
            pub fn to_words(self) -> [u32; 8] {
                self.0.to_words()
            }

            pub fn to_hex(self) -> String {
                self.0.to_hex()
            }

            pub fn from_hex(s: &str) -> Result<Self, String> {
                let bytes = hex_to_bytes(s)?;
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| "root must be 32 bytes".to_string())?;
                Ok($name(Midstate(bytes)))
            }
        }

        impl From<Midstate> for $name {
            fn from(m: Midstate) -> Self {
                $name(m)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

digest_newtype!(
    /// Commitment Merkle root: shape and constants, witness data excluded.
    Cmr
);
digest_newtype!(
    /// Identity Merkle root: CMR semantics plus witness content.
    Imr
);
digest_newtype!(
    /// Annotated Merkle root: IMR semantics plus type annotations.
    Amr
);
digest_newtype!(
    /// Type Merkle root: the tree structure of a type.
    Tmr
);

/// The three roots of one program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RootTriple {
    pub cmr: Cmr,
    pub imr: Imr,
    pub amr: Amr,
}

#[derive(Copy, Clone)]
enum RootKind {
    Cmr,
    Imr,
    Amr,
}

impl RootKind {
    fn label(self) -> &'static str {
        match self {
            RootKind::Cmr => "cmr",
            RootKind::Imr => "imr",
            RootKind::Amr => "amr",
        }
    }
}

fn node_label(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Iden => "iden",
        NodeKind::Unit => "unit",
        NodeKind::InjL(_) => "injl",
        NodeKind::InjR(_) => "injr",
        NodeKind::Take(_) => "take",
        NodeKind::Drop(_) => "drop",
        NodeKind::Comp(_, _) => "comp",
        NodeKind::Pair(_, _) => "pair",
        NodeKind::Case(_, _) => "case",
        NodeKind::Witness(_) => "witness",
        NodeKind::Scribe(_) => "scribe",
        NodeKind::Hidden(_) => "hidden",
        NodeKind::Prim(_) => "prim",
    }
}

fn iv_for(root: RootKind, kind: &NodeKind) -> Midstate {
    let tag = match kind {
        NodeKind::Prim(op) => format!("filament\x1f{}\x1fprim\x1f{}", root.label(), op.name()),
        _ => format!("filament\x1f{}\x1f{}", root.label(), node_label(kind)),
    };
    tag_iv(tag.as_bytes())
}

/// The structural (pre-annotation) hash of one node for one root kind,
/// given its children's hashes for the same kind.
fn structural(
    root: RootKind,
    node: &Node,
    left: Option<Midstate>,
    right: Option<Midstate>,
) -> Midstate {
    let iv = iv_for(root, node.kind());
    match node.kind() {
        NodeKind::Iden | NodeKind::Unit | NodeKind::Prim(_) => iv,
        NodeKind::Witness(bits) => match root {
            // The whole point of the commitment root: witness content is
            // replaceable without disturbing it.
            RootKind::Cmr => iv,
            RootKind::Imr | RootKind::Amr => compress_pair(iv, value_hash(bits), sha256::ZERO),
        },
        NodeKind::Scribe(bits) => compress_pair(iv, value_hash(bits), sha256::ZERO),
        NodeKind::Hidden(digest) => compress_pair(iv, *digest, sha256::ZERO),
        NodeKind::InjL(_) | NodeKind::InjR(_) | NodeKind::Take(_) | NodeKind::Drop(_) => {
            compress_pair(iv, left.expect("unary node has a child"), sha256::ZERO)
        }
        NodeKind::Comp(_, _) | NodeKind::Pair(_, _) | NodeKind::Case(_, _) => compress_pair(
            iv,
            left.expect("binary node has a left child"),
            right.expect("binary node has a right child"),
        ),
    }
}

/// Identity-keyed root cache. Holds an `Arc` per cached node so pointer
/// keys stay valid for its whole lifetime; reusable across calls.
#[derive(Default)]
pub struct RootCache {
    nodes: HashMap<usize, (NodeRef, RootTriple)>,
    types: HashMap<usize, (Arc<Ty>, Tmr)>,
}

impl RootCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes hashed so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Compute (or fetch) the root triple of `root`. Bottom-up, each
    /// shared node visited once.
    pub fn roots(&mut self, root: &NodeRef) -> RootTriple {
        let mut stack: Vec<(NodeRef, bool)> = vec![(root.clone(), false)];
        while let Some((node, children_done)) = stack.pop() {
            let key = Arc::as_ptr(&node) as usize;
            if self.nodes.contains_key(&key) {
                continue;
            }
            if children_done {
                let triple = self.compute(&node);
                self.nodes.insert(key, (node, triple));
            } else {
                stack.push((node.clone(), true));
                if let Some(right) = node.right_child() {
                    stack.push((right.clone(), false));
                }
                if let Some(left) = node.left_child() {
                    stack.push((left.clone(), false));
                }
            }
        }
        self.lookup(root)
    }

    /// Type Merkle root, memoized by pointer identity.
    pub fn tmr(&mut self, ty: &Arc<Ty>) -> Tmr {
        let key = Arc::as_ptr(ty) as usize;
        if let Some((_, tmr)) = self.types.get(&key) {
            return *tmr;
        }
        let tmr = Tmr(match ty.kind() {
            TyKind::Unit => tag_iv(b"filament\x1ftmr\x1funit"),
            TyKind::Sum(a, b) => {
                let (ta, tb) = (self.tmr(a), self.tmr(b));
                compress_pair(tag_iv(b"filament\x1ftmr\x1fsum"), ta.0, tb.0)
            }
            TyKind::Product(a, b) => {
                let (ta, tb) = (self.tmr(a), self.tmr(b));
                compress_pair(tag_iv(b"filament\x1ftmr\x1fprod"), ta.0, tb.0)
            }
        });
        self.types.insert(key, (ty.clone(), tmr));
        tmr
    }

    fn lookup(&self, node: &NodeRef) -> RootTriple {
        self.nodes[&(Arc::as_ptr(node) as usize)].1
    }

    fn compute(&mut self, node: &NodeRef) -> RootTriple {
        let left = node.left_child().map(|c| self.lookup(c));
        let right = node.right_child().map(|c| self.lookup(c));

        let cmr = structural(
            RootKind::Cmr,
            node,
            left.map(|t| t.cmr.0),
            right.map(|t| t.cmr.0),
        );
        let imr = structural(
            RootKind::Imr,
            node,
            left.map(|t| t.imr.0),
            right.map(|t| t.imr.0),
        );
        let amr_base = structural(
            RootKind::Amr,
            node,
            left.map(|t| t.amr.0),
            right.map(|t| t.amr.0),
        );
        let source_tmr = self.tmr(node.source());
        let target_tmr = self.tmr(node.target());
        let amr = compress_pair(amr_base, source_tmr.0, target_tmr.0);

        RootTriple {
            cmr: Cmr(cmr),
            imr: Imr(imr),
            amr: Amr(amr),
        }
    }
}

/// Root triple of one program, with a throwaway cache.
pub fn roots(root: &NodeRef) -> RootTriple {
    RootCache::new().roots(root)
}

pub fn cmr(root: &NodeRef) -> Cmr {
    roots(root).cmr
}

pub fn imr(root: &NodeRef) -> Imr {
    roots(root).imr
}

pub fn amr(root: &NodeRef) -> Amr {
    roots(root).amr
}

/// Type Merkle root with a throwaway cache.
pub fn tmr(ty: &Arc<Ty>) -> Tmr {
    RootCache::new().tmr(ty)
}

/// Root triples for independent programs, computed in parallel. Each
/// program gets its own cache; results are position-stable.
pub fn roots_many(programs: &[NodeRef]) -> Vec<RootTriple> {
    programs.par_iter().map(roots).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Bits;
    use crate::prim::PrimOp;

    fn witness_program(bits: Bits) -> NodeRef {
        let target = Ty::word(bits.len() as u64);
        Node::witness(Ty::unit(), target, bits).unwrap()
    }

    #[test]
    fn test_witness_substitution() {
        let zeros = witness_program(Bits::zeros(8));
        let mut flipped = Bits::zeros(8);
        flipped.flip(3);
        let ones = witness_program(flipped);

        let a = roots(&zeros);
        let b = roots(&ones);
        assert_eq!(a.cmr, b.cmr);
        assert_ne!(a.imr, b.imr);
        assert_ne!(a.amr, b.amr);
    }

    #[test]
    fn test_scribe_content_commits() {
        let zeros = Node::scribe(Ty::unit(), Ty::word(8), Bits::zeros(8)).unwrap();
        let mut flipped = Bits::zeros(8);
        flipped.flip(0);
        let ones = Node::scribe(Ty::unit(), Ty::word(8), flipped).unwrap();
        assert_ne!(cmr(&zeros), cmr(&ones));
    }

    #[test]
    fn test_roots_deterministic_and_order_independent() {
        let build = || {
            let half = Node::iden(Ty::word(8));
            Node::comp(&half, &Node::iden(Ty::word(8))).unwrap()
        };
        let first = roots(&build());
        let second = roots(&build());
        assert_eq!(first, second);
    }

    #[test]
    fn test_shared_node_hashed_once() {
        let shared = Node::iden(Ty::word(8));
        let program = Node::comp(&shared, &shared).unwrap();
        let mut cache = RootCache::new();
        let triple = cache.roots(&program);
        // Two distinct nodes: the comp and the single shared iden.
        assert_eq!(cache.len(), 2);
        assert_eq!(triple, roots(&program));
    }

    #[test]
    fn test_root_kinds_are_separated() {
        let program = Node::iden(Ty::word(8));
        let triple = roots(&program);
        assert_ne!(triple.cmr.as_midstate(), triple.imr.as_midstate());
        assert_ne!(triple.imr.as_midstate(), triple.amr.as_midstate());
    }

    #[test]
    fn test_amr_sees_types() {
        let bits = Bits::zeros(8);
        let word_shape = Node::scribe(Ty::unit(), Ty::word(8), bits.clone()).unwrap();
        let skewed = Ty::product(Ty::word(2), Ty::product(Ty::word(2), Ty::word(4)));
        let skewed_shape = Node::scribe(Ty::unit(), skewed, bits).unwrap();

        let a = roots(&word_shape);
        let b = roots(&skewed_shape);
        assert_eq!(a.cmr, b.cmr);
        assert_eq!(a.imr, b.imr);
        assert_ne!(a.amr, b.amr);
    }

    #[test]
    fn test_tmr_structure() {
        assert_eq!(tmr(&Ty::word(8)), tmr(&Ty::word(8)));
        assert_ne!(tmr(&Ty::word(8)), tmr(&Ty::word(16)));
        assert_ne!(tmr(&Ty::sum(Ty::unit(), Ty::unit())), tmr(&Ty::product(Ty::unit(), Ty::unit())));
    }

    #[test]
    fn test_hidden_hashes_by_payload() {
        let a = Node::hidden(Ty::unit(), Ty::unit(), sha256::sha256(b"a"));
        let b = Node::hidden(Ty::unit(), Ty::unit(), sha256::sha256(b"b"));
        assert_ne!(cmr(&a), cmr(&b));
    }

    #[test]
    fn test_hex_round_trip() {
        let root = cmr(&Node::prim(PrimOp::Eq256));
        assert_eq!(Cmr::from_hex(&root.to_hex()).unwrap(), root);
        let words = root.to_words();
        assert_eq!(u32::from_be_bytes(root.as_midstate().0[..4].try_into().unwrap()), words[0]);
    }

    #[test]
    fn test_roots_many_matches_sequential() {
        let programs: Vec<NodeRef> = (0..8)
            .map(|i| {
                let mut bits = Bits::zeros(8);
                if i % 2 == 0 {
                    bits.flip(i % 8);
                }
                Node::scribe(Ty::unit(), Ty::word(8), bits).unwrap()
            })
            .collect();
        let parallel = roots_many(&programs);
        let sequential: Vec<RootTriple> = programs.iter().map(roots).collect();
        assert_eq!(parallel, sequential);
    }
}
