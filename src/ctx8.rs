//! The ctx8 combinator library and the reference program.
//!
//! `ctx8_addn` derives an n-byte absorber from the one-byte primitive by
//! balanced composition: each level splits the word, threads the context
//! through the high half, then the low half. The sub-adder at every level
//! is one shared node, so the derived expression is a DAG, not a tree.
//!
//! The reference program hashes a fixed 16-byte block, compares the
//! digest against a fixed constant with `eq256`, and asserts the result
//! with `verify`. It is closed (source type `1`, no witness), so a
//! correct machine must take it to `Succeeded` on empty input.

use std::sync::{Arc, OnceLock};

use crate::bits::Bits;
use crate::error::Error;
use crate::merkle::{self, RootTriple};
use crate::node::{Node, NodeRef};
use crate::prim::{ctx8_ty, PrimOp};
use crate::ty::Ty;

/// The 16-byte message absorbed by the reference program.
pub const REF_BLOCK: [u8; 16] = [
    0xde, 0x18, 0x89, 0x41, 0xa3, 0x37, 0x5d, 0x3a, 0x8a, 0x06, 0x1e, 0x67, 0x57, 0x6e, 0x92,
    0x6d,
];

/// SHA-256 of `REF_BLOCK`: the constant the reference program checks
/// its own digest against.
pub const REF_EXPECTED: [u8; 32] = [
    0x06, 0x7c, 0x53, 0x12, 0x69, 0x73, 0x5c, 0xa7, 0xf5, 0x41, 0xfd, 0xac, 0xa8, 0xf0, 0xdc,
    0x76, 0x30, 0x5d, 0x3c, 0xad, 0xa1, 0x40, 0xf8, 0x93, 0x72, 0xa4, 0x10, 0xfe, 0x5e, 0xff,
    0x6e, 0x4d,
];

pub fn ctx8_init() -> NodeRef {
    Node::prim(PrimOp::Ctx8Init)
}

pub fn ctx8_add1() -> NodeRef {
    Node::prim(PrimOp::Ctx8Add1)
}

pub fn ctx8_finalize() -> NodeRef {
    Node::prim(PrimOp::Ctx8Finalize)
}

/// Scribe `bytes` as a word constant from the given source type.
pub fn scribe_bytes(source: Arc<Ty>, bytes: &[u8]) -> Result<NodeRef, Error> {
    let target = Ty::word(bytes.len() as u64 * 8);
    Node::scribe(source, target, Bits::from_bytes(bytes))
}

/// `Ctx8 * 2^(8n) -> Ctx8`: absorb an n-byte word (n a power of two),
/// one `ctx8-add1` application per byte.
pub fn ctx8_addn(n_bytes: u64) -> Result<NodeRef, Error> {
    assert!(
        n_bytes.is_power_of_two(),
        "absorbed word must be a power of two of bytes, got {n_bytes}"
    );
    if n_bytes == 1 {
        return Ok(ctx8_add1());
    }
    let half = ctx8_addn(n_bytes / 2)?;

    let ctx = ctx8_ty();
    let half_word = Ty::word(n_bytes * 4);
    let word = Ty::product(half_word.clone(), half_word.clone());

    // (ctx, (hi, lo)) -> ctx': absorb the high half.
    let sel_ctx = Node::take(&Node::iden(ctx.clone()), word);
    let sel_hi = Node::drop(
        &Node::take(&Node::iden(half_word.clone()), half_word.clone()),
        ctx.clone(),
    );
    let absorb_hi = Node::comp(&Node::pair(&sel_ctx, &sel_hi)?, &half)?;

    // (ctx, (hi, lo)) -> ctx'': feed the updated context the low half.
    let sel_lo = Node::drop(&Node::drop(&Node::iden(half_word.clone()), half_word), ctx);
    Node::comp(&Node::pair(&absorb_hi, &sel_lo)?, &half)
}

/// Wrap a bit-valued predicate in the assertion primitive.
pub fn verify_with(predicate: &NodeRef) -> Result<NodeRef, Error> {
    Node::comp(predicate, &Node::prim(PrimOp::Verify))
}

/// Compare two 256-bit producers for equality and assert the result.
pub fn eq256_verify(left: &NodeRef, right: &NodeRef) -> Result<NodeRef, Error> {
    let compared = Node::comp(&Node::pair(left, right)?, &Node::prim(PrimOp::Eq256))?;
    verify_with(&compared)
}

/// The closed reference program:
/// `(scribe(expected) & (ctx8-init & scribe(block)) ; addn(16) ; finalize)
/// ; eq256 ; verify`.
pub fn reference_program() -> Result<NodeRef, Error> {
    let unit = Ty::unit();
    let expected = scribe_bytes(unit.clone(), &REF_EXPECTED)?;
    let block = scribe_bytes(unit, &REF_BLOCK)?;

    let absorbed = Node::comp(&Node::pair(&ctx8_init(), &block)?, &ctx8_addn(16)?)?;
    let digest = Node::comp(&absorbed, &ctx8_finalize())?;
    eq256_verify(&expected, &digest)
}

/// The reference program's published root triple. Computed once per
/// process; stable across calls and across processes.
pub fn reference_roots() -> RootTriple {
    static ROOTS: OnceLock<RootTriple> = OnceLock::new();
    *ROOTS.get_or_init(|| {
        let program = reference_program().expect("reference program is well-typed");
        merkle::roots(&program)
    })
}
