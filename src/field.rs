//! 64-bit prime-field arithmetic backing the additive secret sharing used by
//! the query/response phases and the per-batch shuffle permutation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An element of `Z/pZ` for some fixed prime modulus `p`.
///
/// Two elements must share a modulus to interoperate; operations across
/// mismatched moduli return [`FieldError::ModulusMismatch`] rather than
/// silently reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldElement {
    value: u64,
    modulus: u64,
}

impl FieldElement {
    /// Reduces `value` mod `modulus` at construction.
    pub fn new(value: u64, modulus: u64) -> Self {
        Self { value: value % modulus, modulus }
    }

    pub fn zero(modulus: u64) -> Self {
        Self { value: 0, modulus }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    pub fn add(&self, other: &FieldElement) -> Result<FieldElement, FieldError> {
        self.check_modulus(other)?;
        let sum = self.value + other.value;
        let reduced = if sum >= self.modulus { sum - self.modulus } else { sum };
        Ok(FieldElement::new(reduced, self.modulus))
    }

    pub fn sub(&self, other: &FieldElement) -> Result<FieldElement, FieldError> {
        self.check_modulus(other)?;
        let diff = if self.value >= other.value {
            self.value - other.value
        } else {
            self.modulus - (other.value - self.value)
        };
        Ok(FieldElement::new(diff, self.modulus))
    }

    pub fn neg(&self) -> FieldElement {
        if self.value == 0 {
            *self
        } else {
            FieldElement::new(self.modulus - self.value, self.modulus)
        }
    }

    /// Big-endian 8-byte encoding of the value (the modulus is per-hop
    /// contextual and never travels on the wire).
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.value.to_be_bytes()
    }

    /// Decodes a wire-format field element, rejecting values outside the
    /// canonical range `[0, modulus)` rather than silently reducing them —
    /// wire values are expected already-reduced, so one that isn't signals a
    /// corrupt or malicious message, not a value to be normalized.
    pub fn from_be_bytes(bytes: [u8; 8], modulus: u64) -> Result<Self, FieldError> {
        let value = u64::from_be_bytes(bytes);
        if value >= modulus {
            return Err(FieldError::OutOfRange { value, modulus });
        }
        Ok(Self { value, modulus })
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mod {})", self.value, self.modulus)
    }
}

fn check_moduli(a: u64, b: u64) -> Result<(), FieldError> {
    if a != b {
        Err(FieldError::ModulusMismatch)
    } else {
        Ok(())
    }
}

impl FieldElement {
    fn check_modulus(&self, other: &FieldElement) -> Result<(), FieldError> {
        check_moduli(self.modulus, other.modulus)
    }
}

/// Errors arising from field-element arithmetic.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("modulus mismatch between field elements")]
    ModulusMismatch,
    #[error("value {value} is not a valid element mod {modulus}")]
    OutOfRange { value: u64, modulus: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wraps_around_modulus() {
        let a = FieldElement::new(5, 7);
        let b = FieldElement::new(4, 7);
        assert_eq!(a.add(&b).unwrap().value(), 2);
    }

    #[test]
    fn sub_wraps_around_modulus() {
        let a = FieldElement::new(2, 7);
        let b = FieldElement::new(5, 7);
        assert_eq!(a.sub(&b).unwrap().value(), 4);
    }

    #[test]
    fn neg_of_zero_is_zero() {
        assert_eq!(FieldElement::zero(11).neg().value(), 0);
    }

    #[test]
    fn add_sub_round_trips() {
        let a = FieldElement::new(123, 1009);
        let b = FieldElement::new(456, 1009);
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.sub(&b).unwrap(), a);
    }

    #[test]
    fn mismatched_moduli_reject() {
        let a = FieldElement::new(1, 7);
        let b = FieldElement::new(1, 11);
        assert!(matches!(a.add(&b), Err(FieldError::ModulusMismatch)));
    }

    #[test]
    fn byte_round_trip() {
        let a = FieldElement::new(0xdead_beef_u64, (1u64 << 61) - 1);
        let bytes = a.to_be_bytes();
        assert_eq!(FieldElement::from_be_bytes(bytes, a.modulus()).unwrap(), a);
    }

    #[test]
    fn rejects_value_outside_canonical_range() {
        let modulus = 1_000_003u64;
        let bytes = modulus.to_be_bytes();
        assert!(matches!(
            FieldElement::from_be_bytes(bytes, modulus),
            Err(FieldError::OutOfRange { value, modulus: m }) if value == modulus && m == modulus
        ));
    }
}
