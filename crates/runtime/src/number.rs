//! Numeric tower support
//!
//! Coercion helpers between `bool`/`int`/`float`/`complex` payloads,
//! value-unified hashing (equal numbers hash equally across kinds, using
//! reduction modulo the Mersenne prime 2^61−1), and base-N integer
//! parsing/formatting.

use crate::obj::{Obj, Payload};
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

/// The hash modulus: 2^61 − 1.
pub const HASH_M: u64 = (1 << 61) - 1;
const HASH_BITS: u32 = 61;
const HASH_INF: u64 = 314159;
const HASH_NAN: u64 = 0;

/// The integer value of a payload, counting `bool` as 0/1.
pub fn to_bigint(o: &Obj) -> Option<BigInt> {
    match o.payload() {
        Payload::Int(v) => Some(v.clone()),
        Payload::Bool(b) => Some(BigInt::from(*b as i64)),
        _ => None,
    }
}

/// The float value of a real numeric payload.
pub fn to_f64(o: &Obj) -> Option<f64> {
    match o.payload() {
        Payload::Int(v) => v.to_f64(),
        Payload::Bool(b) => Some(*b as i64 as f64),
        Payload::Float(v) => Some(*v),
        _ => None,
    }
}

/// The complex value of any numeric payload.
pub fn to_complex(o: &Obj) -> Option<(f64, f64)> {
    match o.payload() {
        Payload::Complex(re, im) => Some((*re, *im)),
        _ => to_f64(o).map(|v| (v, 0.0)),
    }
}

pub fn is_numeric(o: &Obj) -> bool {
    matches!(
        o.payload(),
        Payload::Int(_) | Payload::Bool(_) | Payload::Float(_) | Payload::Complex(..)
    )
}

/// Index value for sequence subscripts.
pub fn to_index(o: &Obj) -> Option<i64> {
    to_bigint(o).and_then(|v| v.to_i64())
}

/// Hash of an integer: reduction modulo 2^61 − 1, sign preserved.
pub fn hash_bigint(v: &BigInt) -> u64 {
    let m = BigInt::from(HASH_M);
    let mut r = v % &m;
    if r.sign() == Sign::Minus {
        r += &m;
    }
    r.to_u64().unwrap_or(0)
}

/// Hash of a float. Integral floats hash exactly like the equal integer,
/// so `1`, `1.0`, and `true` are interchangeable as mapping keys.
pub fn hash_f64(v: f64) -> u64 {
    if v.is_nan() {
        return HASH_NAN;
    }
    if v.is_infinite() {
        return if v > 0.0 { HASH_INF } else { HASH_M - HASH_INF };
    }
    let negative = v < 0.0;
    let mut x = v.abs();
    let mut h: u64 = 0;
    // Decompose into 28-bit chunks of the mantissa, folding modulo 2^61−1.
    let mut e = {
        let mut e = 0i32;
        while x >= 1.0 {
            x /= 2.0;
            e += 1;
        }
        while x != 0.0 && x < 0.5 {
            x *= 2.0;
            e -= 1;
        }
        e
    };
    while x != 0.0 {
        // 61-bit left rotate by 28.
        h = (h.wrapping_shl(28) & HASH_M) | (h >> (HASH_BITS - 28));
        x *= 268435456.0; // 2^28
        e -= 28;
        let y = x.floor();
        x -= y;
        h = h.wrapping_add(y as u64);
        if h >= HASH_M {
            h -= HASH_M;
        }
    }
    // Fold the exponent back in as a 61-bit rotation.
    let e = e.rem_euclid(HASH_BITS as i32) as u32;
    if e != 0 {
        h = (h.wrapping_shl(e) & HASH_M) | (h >> (HASH_BITS - e));
    }
    if h >= HASH_M {
        h -= HASH_M;
    }
    if negative { HASH_M.wrapping_sub(h) % HASH_M } else { h }
}

/// Hash of a complex value; a real complex hashes like its real part.
pub fn hash_complex(re: f64, im: f64) -> u64 {
    if im == 0.0 {
        return hash_f64(re);
    }
    hash_f64(re).wrapping_add(hash_f64(im).wrapping_mul(1000003)) % HASH_M
}

/// Numeric value equality across kinds.
pub fn num_eq(a: &Obj, b: &Obj) -> Option<bool> {
    if !is_numeric(a) || !is_numeric(b) {
        return None;
    }
    // Integer/integer compares exactly; anything involving floats or
    // complex goes through f64.
    if let (Some(x), Some(y)) = (to_bigint(a), to_bigint(b)) {
        return Some(x == y);
    }
    let (ar, ai) = to_complex(a)?;
    let (br, bi) = to_complex(b)?;
    Some(ar == br && ai == bi)
}

/// Format an integer in base 2, 8, 10, or 16 (lowercase digits).
pub fn int_to_str_base(v: &BigInt, base: u32) -> String {
    v.to_str_radix(base)
}

/// Parse an integer in a given base; also accepts the matching
/// `0b`/`0o`/`0d`/`0x` prefix and a leading sign.
pub fn int_from_str_base(s: &str, base: u32) -> Option<BigInt> {
    let s = s.trim();
    let (neg, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let rest = strip_matching_prefix(rest, base);
    let v = BigInt::parse_bytes(rest.as_bytes(), base)?;
    Some(if neg { -v } else { v })
}

fn strip_matching_prefix(s: &str, base: u32) -> &str {
    let b = s.as_bytes();
    if b.len() > 2 && b[0] == b'0' {
        let matches = match b[1] {
            b'b' | b'B' => base == 2,
            b'o' | b'O' => base == 8,
            b'd' | b'D' => base == 10,
            b'x' | b'X' => base == 16,
            _ => false,
        };
        if matches {
            return &s[2..];
        }
    }
    s
}

/// Render a float so it parses back to the same value; integral finite
/// floats keep a trailing `.0` so they read as floats.
pub fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{v}");
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{s}.0")
    }
}

/// Parse a float, accepting the forms `repr` produces.
pub fn float_from_str(s: &str) -> Option<f64> {
    let s = s.trim();
    match s {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => s.parse().ok(),
    }
}

/// Render a complex number: `(a+bi)` / `(a-bi)` / `bi`.
pub fn complex_repr(re: f64, im: f64) -> String {
    if re == 0.0 {
        return format!("{}i", float_repr_short(im));
    }
    if im < 0.0 || (im == 0.0 && im.is_sign_negative()) {
        format!("({}-{}i)", float_repr_short(re), float_repr_short(-im))
    } else {
        format!("({}+{}i)", float_repr_short(re), float_repr_short(im))
    }
}

fn float_repr_short(v: f64) -> String {
    let s = float_repr(v);
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}

/// Floor division on bigints (rounding toward negative infinity).
pub fn bigint_floordiv(a: &BigInt, b: &BigInt) -> Option<BigInt> {
    if b.is_zero() {
        return None;
    }
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && (r.sign() == Sign::Minus) != (b.sign() == Sign::Minus) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Flooring modulo on bigints (result takes the divisor's sign).
pub fn bigint_mod(a: &BigInt, b: &BigInt) -> Option<BigInt> {
    if b.is_zero() {
        return None;
    }
    let r = a % b;
    if !r.is_zero() && (r.sign() == Sign::Minus) != (b.sign() == Sign::Minus) {
        Some(r + b)
    } else {
        Some(r)
    }
}

/// Python-style float floor-mod.
pub fn f64_floormod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_float_hash_agree() {
        for v in [0i64, 1, -1, 7, 1024, -99999, 1 << 40] {
            let bi = BigInt::from(v);
            assert_eq!(
                hash_bigint(&bi),
                hash_f64(v as f64),
                "hash mismatch for {v}"
            );
        }
    }

    #[test]
    fn test_fractional_hash_differs_from_floor() {
        assert_ne!(hash_f64(1.5), hash_f64(1.0));
    }

    #[test]
    fn test_int_str_round_trip() {
        for v in [0i64, 1, -1, 255, -256, 1_000_000_007] {
            let bi = BigInt::from(v);
            for base in [2u32, 8, 10, 16] {
                let s = int_to_str_base(&bi, base);
                assert_eq!(int_from_str_base(&s, base), Some(bi.clone()), "{v} base {base}");
            }
        }
    }

    #[test]
    fn test_int_parse_accepts_prefix() {
        assert_eq!(int_from_str_base("0xff", 16), Some(BigInt::from(255)));
        assert_eq!(int_from_str_base("ff", 16), Some(BigInt::from(255)));
        assert_eq!(int_from_str_base("-0b101", 2), Some(BigInt::from(-5)));
    }

    #[test]
    fn test_float_repr_round_trip() {
        for v in [0.0, 1.0, -1.5, 0.1, 1e300, 1e-300, f64::MIN_POSITIVE] {
            let s = float_repr(v);
            assert_eq!(float_from_str(&s), Some(v), "repr was {s}");
        }
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn test_floordiv_and_mod() {
        let f = |a: i64, b: i64| {
            (
                bigint_floordiv(&BigInt::from(a), &BigInt::from(b)).map(|v| v.to_string()),
                bigint_mod(&BigInt::from(a), &BigInt::from(b)).map(|v| v.to_string()),
            )
        };
        assert_eq!(f(7, 2), (Some("3".into()), Some("1".into())));
        assert_eq!(f(-7, 2), (Some("-4".into()), Some("1".into())));
        assert_eq!(f(7, -2), (Some("-4".into()), Some("-1".into())));
        assert_eq!(f(-7, -2), (Some("3".into()), Some("-1".into())));
        assert_eq!(f(1, 0), (None, None));
    }

    #[test]
    fn test_complex_repr() {
        assert_eq!(complex_repr(0.0, 2.0), "2i");
        assert_eq!(complex_repr(1.0, 2.0), "(1+2i)");
        assert_eq!(complex_repr(1.5, -0.5), "(1.5-0.5i)");
    }
}
