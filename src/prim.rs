//! Built-in primitive combinators.
//!
//! Primitives are leaves of the DAG with fixed source/target types and a
//! native bit-level evaluation rule. The `ctx8` family maintains a SHA-256
//! byte-stream context as an ordinary typed value
//! (`buffer 2^512 * (count 2^64 * midstate 2^256)`) so that hashing state
//! flows through frames like any other data, with no hidden context
//! object. `verify` is the single path from a running program to the
//! `Failed` outcome.

use std::sync::Arc;

use crate::bits::Bits;
use crate::error::AssertionFailure;
use crate::sha256::{self, Midstate};
use crate::ty::Ty;

/// The closed set of primitive combinators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimOp {
    /// `2^1 -> 1`: pass on true, fail the program on false.
    Verify,
    /// `2^256 * 2^256 -> 2^1`: bitwise equality, true as 1.
    Eq256,
    /// `1 -> Ctx8`: fresh hashing context (zero buffer, zero count, IV).
    Ctx8Init,
    /// `Ctx8 * 2^8 -> Ctx8`: absorb one byte, compressing on each full
    /// 64-byte buffer.
    Ctx8Add1,
    /// `Ctx8 -> 2^256`: standard padding and final compression(s).
    Ctx8Finalize,
}

/// The hashing context type: `2^512 * (2^64 * 2^256)`, 832 bits.
pub fn ctx8_ty() -> Arc<Ty> {
    Ty::product(
        Ty::word(512),
        Ty::product(Ty::word(64), Ty::word(256)),
    )
}

impl PrimOp {
    pub const ALL: [PrimOp; 5] = [
        PrimOp::Verify,
        PrimOp::Eq256,
        PrimOp::Ctx8Init,
        PrimOp::Ctx8Add1,
        PrimOp::Ctx8Finalize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimOp::Verify => "verify",
            PrimOp::Eq256 => "eq256",
            PrimOp::Ctx8Init => "ctx8-init",
            PrimOp::Ctx8Add1 => "ctx8-add1",
            PrimOp::Ctx8Finalize => "ctx8-finalize",
        }
    }

    pub fn source_ty(self) -> Arc<Ty> {
        match self {
            PrimOp::Verify => Ty::bit(),
            PrimOp::Eq256 => Ty::product(Ty::word(256), Ty::word(256)),
            PrimOp::Ctx8Init => Ty::unit(),
            PrimOp::Ctx8Add1 => Ty::product(ctx8_ty(), Ty::word(8)),
            PrimOp::Ctx8Finalize => ctx8_ty(),
        }
    }

    pub fn target_ty(self) -> Arc<Ty> {
        match self {
            PrimOp::Verify => Ty::unit(),
            PrimOp::Eq256 => Ty::bit(),
            PrimOp::Ctx8Init | PrimOp::Ctx8Add1 => ctx8_ty(),
            PrimOp::Ctx8Finalize => Ty::word(256),
        }
    }

    /// Evaluate natively. `input` has exactly `source_ty().width()` bits;
    /// the returned string has exactly `target_ty().width()`.
    pub fn eval(self, input: &Bits) -> Result<Bits, AssertionFailure> {
        debug_assert_eq!(input.len() as u64, self.source_ty().width());
        match self {
            PrimOp::Verify => {
                if input[0] {
                    Ok(Bits::new())
                } else {
                    Err(AssertionFailure { prim: self.name() })
                }
            }
            PrimOp::Eq256 => {
                let (left, right) = input.as_slice().split_at(256);
                Ok(Bits::from_bools(vec![left == right]))
            }
            PrimOp::Ctx8Init => {
                let ctx = Ctx8 {
                    buffer: [0; 64],
                    count: 0,
                    midstate: sha256::IV,
                };
                Ok(ctx.to_bits())
            }
            PrimOp::Ctx8Add1 => {
                let bytes = input.to_bytes();
                let mut ctx = Ctx8::from_bytes(&bytes[..104]);
                ctx.add_byte(bytes[104]);
                Ok(ctx.to_bits())
            }
            PrimOp::Ctx8Finalize => {
                let ctx = Ctx8::from_bytes(&input.to_bytes());
                let fill = (ctx.count % 64) as usize;
                let digest = sha256::finalize(ctx.midstate, &ctx.buffer[..fill], ctx.count);
                Ok(Bits::from_bytes(&digest.0))
            }
        }
    }
}

/// Decoded form of the 832-bit hashing context value.
struct Ctx8 {
    buffer: [u8; 64],
    count: u64,
    midstate: Midstate,
}

impl Ctx8 {
    fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = [0u8; 64];
        buffer.copy_from_slice(&bytes[..64]);
        let count = u64::from_be_bytes(bytes[64..72].try_into().expect("8-byte slice"));
        let mut midstate = [0u8; 32];
        midstate.copy_from_slice(&bytes[72..104]);
        Ctx8 {
            buffer,
            count,
            midstate: Midstate(midstate),
        }
    }

    fn to_bits(&self) -> Bits {
        let mut bytes = Vec::with_capacity(104);
        bytes.extend_from_slice(&self.buffer);
        bytes.extend_from_slice(&self.count.to_be_bytes());
        bytes.extend_from_slice(&self.midstate.0);
        Bits::from_bytes(&bytes)
    }

    fn add_byte(&mut self, byte: u8) {
        let pos = (self.count % 64) as usize;
        self.buffer[pos] = byte;
        self.count += 1;
        if pos == 63 {
            self.midstate = sha256::compress(self.midstate, &self.buffer);
            self.buffer = [0; 64];
        }
    }
}
