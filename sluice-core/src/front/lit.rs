//! Width-prefixed string literals: `"32b0"`, `"8hFF"`, `"4bx1x0"`,
//! `"10d42"`. The prefix gives the width in bits, the base letter the
//! radix; `x` digits are undefined.

use crate::error::DesignError;
use crate::front::signal::{BVec, SInt, UInt};
use crate::logic::VBits;

pub fn parse_literal(literal: &str) -> Result<VBits, DesignError> {
    let malformed = |reason: &str| DesignError::MalformedLiteral {
        literal: literal.into(),
        reason: reason.into(),
    };
    let split = literal
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| malformed("missing base letter"))?;
    let (width_str, rest) = literal.split_at(split);
    let width: usize = width_str
        .parse()
        .map_err(|_| malformed("bad width prefix"))?;
    let base = rest.as_bytes()[0].to_ascii_lowercase();
    let digits: String = rest[1..].chars().filter(|c| *c != '_').collect();
    if digits.is_empty() {
        return Err(malformed("missing digits"));
    }
    let mut out = VBits::undef(width);
    match base {
        b'b' => {
            let mut pos = 0;
            for c in digits.chars().rev() {
                if pos >= width {
                    return Err(malformed("more digits than the width holds"));
                }
                match c.to_ascii_lowercase() {
                    '0' => {
                        out.value[pos] = false;
                        out.defined[pos] = true;
                    }
                    '1' => {
                        out.value[pos] = true;
                        out.defined[pos] = true;
                    }
                    'x' => {}
                    _ => return Err(malformed("bad binary digit")),
                }
                pos += 1;
            }
            for i in pos..width {
                out.defined[i] = true;
            }
        }
        b'h' | b'o' => {
            let bits_per = if base == b'h' { 4 } else { 3 };
            let mut pos = 0;
            for c in digits.chars().rev() {
                if c.to_ascii_lowercase() == 'x' {
                    pos += bits_per;
                    continue;
                }
                let v = c
                    .to_digit(if base == b'h' { 16 } else { 8 })
                    .ok_or_else(|| malformed("bad digit"))?;
                for i in 0..bits_per {
                    if pos + i < width {
                        out.value[pos + i] = (v >> i) & 1 != 0;
                        out.defined[pos + i] = true;
                    } else if (v >> i) & 1 != 0 {
                        return Err(malformed("value does not fit the width"));
                    }
                }
                pos += bits_per;
            }
            for i in pos.min(width)..width {
                out.defined[i] = true;
            }
        }
        b'd' => {
            let v: u128 = digits.parse().map_err(|_| malformed("bad decimal value"))?;
            if width < 128 && v >> width != 0 {
                return Err(malformed("value does not fit the width"));
            }
            out = VBits::from_u128(v, width);
        }
        _ => return Err(malformed("unknown base letter")),
    }
    Ok(out)
}

/// The minimum number of bits representing `value`.
pub fn min_width(value: u128) -> usize {
    (128 - value.leading_zeros() as usize).max(1)
}

/// Integer literal at its minimum representable width.
#[track_caller]
pub fn uint_lit(value: u128) -> UInt {
    UInt::constant(value, min_width(value))
}

/// Raw bit-vector literal from a width-prefixed string.
#[track_caller]
pub fn bvec_lit(literal: &str) -> BVec {
    match parse_literal(literal) {
        Ok(v) => BVec::constant_bits(v),
        Err(e) => panic!("{e}"),
    }
}

#[track_caller]
pub fn uint_lit_str(literal: &str) -> UInt {
    match parse_literal(literal) {
        Ok(v) => UInt::constant_bits(v),
        Err(e) => panic!("{e}"),
    }
}

#[track_caller]
pub fn sint_lit_str(literal: &str) -> SInt {
    match parse_literal(literal) {
        Ok(v) => SInt::constant_bits(v),
        Err(e) => panic!("{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_with_undefined() {
        let v = parse_literal("4bx1x0").unwrap();
        assert_eq!(v.width(), 4);
        assert_eq!(v.bit(0), (false, true));
        assert_eq!(v.bit(1), (false, false));
        assert_eq!(v.bit(2), (true, true));
        assert_eq!(v.bit(3), (false, false));
    }

    #[test]
    fn parses_hex_and_pads_high_bits_defined() {
        let v = parse_literal("12h2A").unwrap();
        assert_eq!(v.as_u128(), Some(0x2A));
    }

    #[test]
    fn rejects_overflowing_value() {
        assert!(parse_literal("4d16").is_err());
        assert!(parse_literal("3hF").is_err());
    }

    #[test]
    fn decimal_literal() {
        let v = parse_literal("10d42").unwrap();
        assert_eq!(v.as_u128(), Some(42));
        assert_eq!(v.width(), 10);
    }

    #[test]
    fn min_width_of_values() {
        assert_eq!(min_width(0), 1);
        assert_eq!(min_width(1), 1);
        assert_eq!(min_width(2), 2);
        assert_eq!(min_width(255), 8);
        assert_eq!(min_width(256), 9);
    }
}
