//! Arbitrary-precision integer word.
//!
//! Every value the virtual machine touches - scalars, raw bytes, encoded
//! containers, error messages - lives on the evaluation stack as a single
//! signed big integer. Byte import and export always go through the unsigned
//! big-endian magnitude: the sign survives arithmetic but is dropped by
//! serialization, mirroring the on-chain format.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A single evaluation-stack cell: a signed arbitrary-precision integer.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Word(BigInt);

impl Word {
    /// Creates a word from an unsigned big-endian magnitude.
    ///
    /// The empty slice decodes to zero.
    pub fn from_be_bytes(bytes: &[u8]) -> Word {
        Word(BigInt::from_bytes_be(Sign::Plus, bytes))
    }

    /// Creates a word whose magnitude is the raw bytes of `text`.
    ///
    /// Used for error messages deposited on the evaluation stack.
    pub fn from_text(text: &str) -> Word {
        Word::from_be_bytes(text.as_bytes())
    }

    /// Returns the unsigned big-endian magnitude.
    ///
    /// Zero exports as the empty vector, so a byte round-trip through a word
    /// strips leading zero bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.0.is_zero() {
            return Vec::new();
        }
        self.0.magnitude().to_bytes_be()
    }

    /// Decodes the magnitude as UTF-8 text, replacing invalid sequences.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    /// Number of bits in the magnitude; zero for the zero word.
    pub fn bit_len(&self) -> u64 {
        self.0.bits()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    /// Euclidean division: the quotient `q` such that
    /// `self = rhs * q + m` with `0 <= m < |rhs|`.
    ///
    /// Returns `None` when `rhs` is zero.
    pub fn checked_div(&self, rhs: &Word) -> Option<Word> {
        if rhs.0.is_zero() {
            return None;
        }
        let m = self.0.mod_floor(&rhs.0.abs());
        Some(Word((&self.0 - &m) / &rhs.0))
    }

    /// Euclidean modulus: the `m` in `self = rhs * q + m` with `0 <= m < |rhs|`.
    ///
    /// Returns `None` when `rhs` is zero.
    pub fn checked_rem(&self, rhs: &Word) -> Option<Word> {
        if rhs.0.is_zero() {
            return None;
        }
        Some(Word(self.0.mod_floor(&rhs.0.abs())))
    }

    /// Shifts the value left by `bits`.
    pub fn shl(self, bits: usize) -> Word {
        Word(self.0 << bits)
    }

    /// Shifts the value right by `bits`, rounding toward negative infinity.
    pub fn shr(self, bits: usize) -> Word {
        Word(self.0 >> bits)
    }
}

impl From<i64> for Word {
    fn from(value: i64) -> Word {
        Word(BigInt::from(value))
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Word {
        Word(BigInt::from(value))
    }
}

impl Add for Word {
    type Output = Word;

    fn add(self, rhs: Word) -> Word {
        Word(self.0 + rhs.0)
    }
}

impl Sub for Word {
    type Output = Word;

    fn sub(self, rhs: Word) -> Word {
        Word(self.0 - rhs.0)
    }
}

impl Mul for Word {
    type Output = Word;

    fn mul(self, rhs: Word) -> Word {
        Word(self.0 * rhs.0)
    }
}

impl Neg for Word {
    type Output = Word;

    fn neg(self) -> Word {
        Word(-self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exports_empty_bytes() {
        assert_eq!(Word::default().to_bytes(), Vec::<u8>::new());
        assert_eq!(Word::from_be_bytes(&[]), Word::default());
        assert_eq!(Word::from_be_bytes(&[0, 0]), Word::default());
    }

    #[test]
    fn bytes_round_trip_strips_leading_zeros() {
        let word = Word::from_be_bytes(&[0x00, 0x01, 0x02]);
        assert_eq!(word.to_bytes(), vec![0x01, 0x02]);
    }

    #[test]
    fn from_be_bytes_is_unsigned() {
        assert_eq!(Word::from_be_bytes(&[0xFF]), Word::from(255i64));
    }

    #[test]
    fn sign_is_dropped_by_serialization() {
        let word = -Word::from(5i64);
        assert_eq!(word.to_bytes(), vec![5]);
    }

    #[test]
    fn text_round_trip() {
        let word = Word::from_text("out of gas");
        assert_eq!(word.to_text(), "out of gas");
    }

    #[test]
    fn bit_len() {
        assert_eq!(Word::default().bit_len(), 0);
        assert_eq!(Word::from(1i64).bit_len(), 1);
        assert_eq!(Word::from(255i64).bit_len(), 8);
        assert_eq!(Word::from(256i64).bit_len(), 9);
    }

    #[test]
    fn arithmetic() {
        assert_eq!(Word::from(5i64) + Word::from(7i64), Word::from(12i64));
        assert_eq!(Word::from(5i64) - Word::from(7i64), Word::from(-2i64));
        assert_eq!(Word::from(5i64) * Word::from(7i64), Word::from(35i64));
        assert_eq!(-Word::from(5i64), Word::from(-5i64));
    }

    #[test]
    fn division_is_euclidean() {
        let div = |a: i64, b: i64| {
            Word::from(a)
                .checked_div(&Word::from(b))
                .unwrap()
        };
        let rem = |a: i64, b: i64| {
            Word::from(a)
                .checked_rem(&Word::from(b))
                .unwrap()
        };

        assert_eq!(div(7, 3), Word::from(2i64));
        assert_eq!(rem(7, 3), Word::from(1i64));
        // The remainder is never negative.
        assert_eq!(div(-7, 3), Word::from(-3i64));
        assert_eq!(rem(-7, 3), Word::from(2i64));
        assert_eq!(div(7, -3), Word::from(-2i64));
        assert_eq!(rem(7, -3), Word::from(1i64));
        assert_eq!(div(-7, -3), Word::from(3i64));
        assert_eq!(rem(-7, -3), Word::from(2i64));
    }

    #[test]
    fn division_by_zero_is_none() {
        assert!(Word::from(1i64).checked_div(&Word::default()).is_none());
        assert!(Word::from(1i64).checked_rem(&Word::default()).is_none());
    }

    #[test]
    fn shifts() {
        assert_eq!(Word::from(1i64).shl(8), Word::from(256i64));
        assert_eq!(Word::from(256i64).shr(8), Word::from(1i64));
        // Right shift floors for negative values.
        assert_eq!(Word::from(-1i64).shr(1), Word::from(-1i64));
    }

    #[test]
    fn ordering() {
        assert!(Word::from(-1i64) < Word::default());
        assert!(Word::from(2i64) > Word::from(1i64));
    }

    #[test]
    fn is_one_is_exact() {
        assert!(Word::from(1i64).is_one());
        assert!(!Word::from(3i64).is_one());
        assert!(!Word::default().is_one());
    }

    #[test]
    fn display_is_decimal() {
        assert_eq!(Word::from(-42i64).to_string(), "-42");
        assert_eq!(Word::from_be_bytes(&[0x01, 0x00]).to_string(), "256");
    }
}
