//! The type system: a unit type closed under sums and products, each type
//! with a fixed bit width known at construction.
//!
//! Width rules: `w(1) = 0`, `w(A + B) = 1 + max(w(A), w(B))`,
//! `w(A * B) = w(A) + w(B)`. A sum value is encoded as its discriminant
//! bit, then `max(w(A), w(B)) - w(chosen)` padding bits, then the chosen
//! value; padding reads back as zero.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::Error;

/// Maximum nesting admitted for externally supplied type definitions.
const MAX_TYPE_DEPTH: usize = 512;

/// A type with its bit width cached at construction. Immutable; shared by
/// `Arc` across every combinator node that mentions it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Ty {
    width: u64,
    kind: TyKind,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum TyKind {
    Unit,
    Sum(Arc<Ty>, Arc<Ty>),
    Product(Arc<Ty>, Arc<Ty>),
}

impl Ty {
    pub fn unit() -> Arc<Ty> {
        static UNIT: OnceLock<Arc<Ty>> = OnceLock::new();
        UNIT.get_or_init(|| {
            Arc::new(Ty {
                width: 0,
                kind: TyKind::Unit,
            })
        })
        .clone()
    }

    pub fn sum(left: Arc<Ty>, right: Arc<Ty>) -> Arc<Ty> {
        let width = 1 + left.width.max(right.width);
        Arc::new(Ty {
            width,
            kind: TyKind::Sum(left, right),
        })
    }

    pub fn product(left: Arc<Ty>, right: Arc<Ty>) -> Arc<Ty> {
        let width = left
            .width
            .checked_add(right.width)
            .expect("type width fits in u64");
        Arc::new(Ty {
            width,
            kind: TyKind::Product(left, right),
        })
    }

    /// The bit type: `1 + 1`. Zero is the left injection.
    pub fn bit() -> Arc<Ty> {
        Self::word(1)
    }

    /// The complete balanced word of `bits` bits (`bits` a power of two).
    /// Small words are interned so repeated callers share one allocation.
    pub fn word(bits: u64) -> Arc<Ty> {
        assert!(
            bits.is_power_of_two(),
            "word width must be a power of two, got {bits}"
        );
        static WORDS: OnceLock<Vec<Arc<Ty>>> = OnceLock::new();
        let words = WORDS.get_or_init(|| {
            let bit = Ty::sum(Ty::unit(), Ty::unit());
            let mut words = vec![bit];
            for i in 1..=9 {
                let half = words[i - 1].clone();
                words.push(Ty::product(half.clone(), half));
            }
            words
        });
        let log = bits.trailing_zeros() as usize;
        if log < words.len() {
            words[log].clone()
        } else {
            let mut ty = words[words.len() - 1].clone();
            for _ in words.len()..=log {
                ty = Ty::product(ty.clone(), ty);
            }
            ty
        }
    }

    pub fn kind(&self) -> &TyKind {
        &self.kind
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn as_sum(&self) -> Option<(&Arc<Ty>, &Arc<Ty>)> {
        match &self.kind {
            TyKind::Sum(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_product(&self) -> Option<(&Arc<Ty>, &Arc<Ty>)> {
        match &self.kind {
            TyKind::Product(a, b) => Some((a, b)),
            _ => None,
        }
    }

    /// Padding inserted after the discriminant for each arm of a sum.
    /// `None` if this is not a sum type.
    pub fn sum_padding(&self) -> Option<(u64, u64)> {
        let (a, b) = self.as_sum()?;
        let payload = a.width.max(b.width);
        Some((payload - a.width, payload - b.width))
    }

    /// Admit an externally supplied type definition. Rejects over-deep
    /// nesting and widths that overflow, with `MalformedType`.
    pub fn from_expr(expr: &TyExpr) -> Result<Arc<Ty>, Error> {
        Self::from_expr_at(expr, 0)
    }

    fn from_expr_at(expr: &TyExpr, depth: usize) -> Result<Arc<Ty>, Error> {
        if depth > MAX_TYPE_DEPTH {
            return Err(Error::MalformedType {
                reason: format!("nesting exceeds {MAX_TYPE_DEPTH} levels"),
            });
        }
        match expr {
            TyExpr::Unit => Ok(Ty::unit()),
            TyExpr::Sum(a, b) => {
                let left = Self::from_expr_at(a, depth + 1)?;
                let right = Self::from_expr_at(b, depth + 1)?;
                Ok(Ty::sum(left, right))
            }
            TyExpr::Product(a, b) => {
                let left = Self::from_expr_at(a, depth + 1)?;
                let right = Self::from_expr_at(b, depth + 1)?;
                left.width.checked_add(right.width).ok_or_else(|| {
                    Error::MalformedType {
                        reason: "width overflows u64".to_string(),
                    }
                })?;
                Ok(Ty::product(left, right))
            }
        }
    }

    /// `Some(n)` if this type is the balanced n-bit word shape.
    fn word_bits(&self) -> Option<u64> {
        match &self.kind {
            TyKind::Unit => None,
            TyKind::Sum(a, b) => {
                if a.kind == TyKind::Unit && b.kind == TyKind::Unit {
                    Some(1)
                } else {
                    None
                }
            }
            TyKind::Product(a, b) => {
                let (wa, wb) = (a.word_bits()?, b.word_bits()?);
                if wa == wb {
                    Some(wa + wb)
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(bits) = self.word_bits() {
            return write!(f, "2^{bits}");
        }
        match &self.kind {
            TyKind::Unit => write!(f, "1"),
            TyKind::Sum(a, b) => write!(f, "({a} + {b})"),
            TyKind::Product(a, b) => write!(f, "({a} * {b})"),
        }
    }
}

/// An externally supplied type definition, validated by `Ty::from_expr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TyExpr {
    Unit,
    Sum(Box<TyExpr>, Box<TyExpr>),
    Product(Box<TyExpr>, Box<TyExpr>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(Ty::unit().width(), 0);
        assert_eq!(Ty::bit().width(), 1);
        assert_eq!(Ty::word(8).width(), 8);
        assert_eq!(Ty::word(256).width(), 256);
        let sum = Ty::sum(Ty::word(8), Ty::word(2));
        assert_eq!(sum.width(), 9);
        let prod = Ty::product(Ty::word(8), Ty::word(2));
        assert_eq!(prod.width(), 10);
    }

    #[test]
    fn test_sum_padding() {
        let sum = Ty::sum(Ty::word(2), Ty::word(8));
        assert_eq!(sum.sum_padding(), Some((6, 0)));
        assert_eq!(Ty::bit().sum_padding(), Some((0, 0)));
        assert_eq!(Ty::word(8).sum_padding(), None);
    }

    #[test]
    fn test_structural_equality_across_construction_paths() {
        let by_word = Ty::word(4);
        let by_hand = Ty::product(
            Ty::product(Ty::bit(), Ty::bit()),
            Ty::product(Ty::bit(), Ty::bit()),
        );
        assert_eq!(by_word, by_hand);
        assert_ne!(Ty::word(4), Ty::word(8));
    }

    #[test]
    fn test_from_expr_accepts_shallow() {
        let expr = TyExpr::Product(
            Box::new(TyExpr::Sum(Box::new(TyExpr::Unit), Box::new(TyExpr::Unit))),
            Box::new(TyExpr::Unit),
        );
        let ty = Ty::from_expr(&expr).unwrap();
        assert_eq!(ty.width(), 1);
        assert_eq!(ty, Ty::product(Ty::bit(), Ty::unit()));
    }

    #[test]
    fn test_from_expr_rejects_deep_nesting() {
        let mut expr = TyExpr::Unit;
        for _ in 0..600 {
            expr = TyExpr::Sum(Box::new(expr), Box::new(TyExpr::Unit));
        }
        match Ty::from_expr(&expr) {
            Err(Error::MalformedType { .. }) => {}
            other => panic!("expected MalformedType, got {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Ty::unit().to_string(), "1");
        assert_eq!(Ty::bit().to_string(), "2^1");
        assert_eq!(Ty::word(256).to_string(), "2^256");
        assert_eq!(Ty::sum(Ty::unit(), Ty::word(2)).to_string(), "(1 + 2^2)");
    }
}
