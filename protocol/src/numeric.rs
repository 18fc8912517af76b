//! Big-integer helpers shared by the parser and the proof checks.

use data_encoding::HEXLOWER;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use sha2::{Digest, Sha256};

/// Parse a base-10 integer. An optional leading sign is accepted; anything
/// else that is not a decimal digit (including the empty string) is rejected.
pub fn parse_decimal(s: &str) -> Option<BigInt> {
    let digits = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigInt::parse_bytes(s.as_bytes(), 10)
}

/// `base ^ exponent mod modulus`, with the result in `[0, modulus)`.
///
/// Returns `None` for a non-positive modulus or a negative exponent, both of
/// which are meaningless here and would otherwise panic inside `num-bigint`.
pub fn mod_pow(base: &BigInt, exponent: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    if !modulus.is_positive() || exponent.is_negative() {
        return None;
    }
    Some(base.modpow(exponent, modulus))
}

/// Residue of a non-negative integer modulo a small power of two.
fn low_bits(n: &BigInt, modulus: u32) -> u32 {
    n.mod_floor(&BigInt::from(modulus)).to_u32().unwrap_or_default()
}

/// Jacobi symbol `(value / modulus)`, which is the Legendre symbol when
/// `modulus` is an odd prime.
///
/// Returns `1`, `-1`, or `0`. The modulus must be odd and positive; any other
/// modulus yields `0`. Works on owned copies, so the caller's integers are
/// never touched.
pub fn legendre(value: &BigInt, modulus: &BigInt) -> i8 {
    if !modulus.is_positive() || modulus.is_even() {
        return 0;
    }

    let mut n = modulus.clone();
    let mut a = value.mod_floor(&n);
    let mut sign = 1;

    while !a.is_zero() {
        while a.is_even() {
            a /= 2u32;
            if matches!(low_bits(&n, 8), 3 | 5) {
                sign = -sign;
            }
        }

        std::mem::swap(&mut a, &mut n);
        if low_bits(&a, 4) == 3 && low_bits(&n, 4) == 3 {
            sign = -sign;
        }
        a = a.mod_floor(&n);
    }

    if n.is_one() {
        sign
    } else {
        0
    }
}

/// Is `value` a non-zero square modulo the prime `modulus`?
pub fn is_quadratic_residue(value: &BigInt, modulus: &BigInt) -> bool {
    legendre(value, modulus) == 1
}

/// Lower-case hex SHA-256 digest.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    HEXLOWER.encode(&Sha256::digest(bytes.as_ref()))
}
