//! Three-valued bit vectors and the operator algebra over them.
//!
//! Every bit carries a `value` plane and a `defined` plane; a bit whose
//! `defined` flag is clear is the undefined element of the algebra.
//! Bit order is LSB-first throughout, matching the wire order of the IR.

use num_bigint::{BigInt, BigUint, Sign};

use crate::ir::node::{BinaryOp, CompareOp, ExtendMode, ShiftDir, ShiftFill, UnaryOp};

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VBits {
    pub value: Vec<bool>,
    pub defined: Vec<bool>,
}

impl VBits {
    pub fn undef(width: usize) -> Self {
        VBits {
            value: vec![false; width],
            defined: vec![false; width],
        }
    }

    pub fn zero(width: usize) -> Self {
        VBits {
            value: vec![false; width],
            defined: vec![true; width],
        }
    }

    pub fn ones(width: usize) -> Self {
        VBits {
            value: vec![true; width],
            defined: vec![true; width],
        }
    }

    pub fn from_u128(x: u128, width: usize) -> Self {
        VBits {
            value: (0..width).map(|i| i < 128 && (x >> i) & 1 != 0).collect(),
            defined: vec![true; width],
        }
    }

    pub fn from_bool(b: bool) -> Self {
        VBits {
            value: vec![b],
            defined: vec![true],
        }
    }

    pub fn from_biguint(x: &BigUint, width: usize) -> Self {
        VBits {
            value: (0..width as u64).map(|i| x.bit(i)).collect(),
            defined: vec![true; width],
        }
    }

    /// Two's complement truncation of a signed value into `width` bits.
    pub fn from_bigint(x: &BigInt, width: usize) -> Self {
        if x.sign() == Sign::Minus {
            let flipped = -x - 1_i32;
            let mag = flipped.magnitude();
            VBits {
                value: (0..width as u64).map(|i| !mag.bit(i)).collect(),
                defined: vec![true; width],
            }
        } else {
            Self::from_biguint(x.magnitude(), width)
        }
    }

    pub fn width(&self) -> usize {
        self.value.len()
    }

    pub fn is_fully_defined(&self) -> bool {
        self.defined.iter().all(|d| *d)
    }

    pub fn is_fully_undefined(&self) -> bool {
        self.defined.iter().all(|d| !*d)
    }

    pub fn bit(&self, i: usize) -> (bool, bool) {
        (self.value[i], self.defined[i])
    }

    pub fn as_u128(&self) -> Option<u128> {
        if !self.is_fully_defined() || self.width() > 128 {
            return None;
        }
        let mut out = 0u128;
        for (i, v) in self.value.iter().enumerate() {
            if *v {
                out |= 1 << i;
            }
        }
        Some(out)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_u128().and_then(|x| u64::try_from(x).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        if self.width() == 1 && self.defined[0] {
            Some(self.value[0])
        } else {
            None
        }
    }

    pub fn to_biguint(&self) -> Option<BigUint> {
        if !self.is_fully_defined() {
            return None;
        }
        let digits: Vec<u8> = self.value.iter().map(|v| *v as u8).collect();
        Some(BigUint::from_radix_le(&digits, 2).unwrap_or_default())
    }

    /// Two's complement interpretation.
    pub fn to_bigint(&self) -> Option<BigInt> {
        if !self.is_fully_defined() {
            return None;
        }
        if self.value.last() == Some(&true) {
            let digits: Vec<u8> = self.value.iter().map(|v| !*v as u8).collect();
            let mag = BigUint::from_radix_le(&digits, 2).unwrap_or_default();
            Some(-(BigInt::from(mag) + BigInt::from(1)))
        } else {
            self.to_biguint().map(BigInt::from)
        }
    }

    pub fn slice(&self, offset: usize, width: usize) -> VBits {
        VBits {
            value: self.value[offset..offset + width].to_vec(),
            defined: self.defined[offset..offset + width].to_vec(),
        }
    }
}

impl std::fmt::Debug for VBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b")?;
        for i in (0..self.width()).rev() {
            let c = match self.bit(i) {
                (_, false) => 'x',
                (true, true) => '1',
                (false, true) => '0',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

fn bitwise(a: &VBits, b: &VBits, op: BinaryOp) -> VBits {
    debug_assert_eq!(a.width(), b.width());
    let mut out = VBits::undef(a.width());
    for i in 0..a.width() {
        let (av, ad) = a.bit(i);
        let (bv, bd) = b.bit(i);
        let (v, d) = match op {
            // a controlling 0 forces the output regardless of the other side
            BinaryOp::And => (av && bv, (ad && bd) || (ad && !av) || (bd && !bv)),
            // a controlling 1 forces the output
            BinaryOp::Or => (av || bv, (ad && bd) || (ad && av) || (bd && bv)),
            BinaryOp::Xor => (av ^ bv, ad && bd),
            _ => unreachable!("not a bitwise op"),
        };
        out.value[i] = v && d;
        out.defined[i] = d;
    }
    out
}

fn arithmetic(a: &VBits, b: &VBits, op: BinaryOp, signed: bool) -> VBits {
    debug_assert_eq!(a.width(), b.width());
    let w = a.width();
    if !a.is_fully_defined() || !b.is_fully_defined() {
        return VBits::undef(w);
    }
    if signed {
        let (x, y) = (a.to_bigint().unwrap(), b.to_bigint().unwrap());
        let r = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div if y == BigInt::ZERO => return VBits::undef(w),
            BinaryOp::Div => x / y,
            BinaryOp::Rem if y == BigInt::ZERO => return VBits::undef(w),
            BinaryOp::Rem => x % y,
            _ => unreachable!("not an arithmetic op"),
        };
        VBits::from_bigint(&r, w)
    } else {
        let (x, y) = (a.to_biguint().unwrap(), b.to_biguint().unwrap());
        let zero = BigUint::from(0u32);
        let r = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Mul => x * y,
            // wrap-around subtraction within the operand width
            BinaryOp::Sub => (x + (BigUint::from(1u32) << w)) - y,
            BinaryOp::Div if y == zero => return VBits::undef(w),
            BinaryOp::Div => x / y,
            BinaryOp::Rem if y == zero => return VBits::undef(w),
            BinaryOp::Rem => x % y,
            _ => unreachable!("not an arithmetic op"),
        };
        VBits::from_biguint(&r, w)
    }
}

pub fn binary(op: BinaryOp, a: &VBits, b: &VBits, signed: bool) -> VBits {
    match op {
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => bitwise(a, b, op),
        _ => arithmetic(a, b, op, signed),
    }
}

pub fn unary(op: UnaryOp, a: &VBits) -> VBits {
    match op {
        UnaryOp::Not => {
            let mut out = a.clone();
            for i in 0..out.width() {
                out.value[i] = !out.value[i] && out.defined[i];
            }
            out
        }
        UnaryOp::Neg => {
            if !a.is_fully_defined() {
                return VBits::undef(a.width());
            }
            let x = a.to_biguint().unwrap();
            let modulus = BigUint::from(1u32) << a.width();
            VBits::from_biguint(&((modulus.clone() - x % &modulus) % modulus), a.width())
        }
    }
}

pub fn compare(op: CompareOp, a: &VBits, b: &VBits, signed: bool) -> VBits {
    debug_assert_eq!(a.width(), b.width());
    if !a.is_fully_defined() || !b.is_fully_defined() {
        return VBits::undef(1);
    }
    let ord = if signed {
        a.to_bigint().unwrap().cmp(&b.to_bigint().unwrap())
    } else {
        a.to_biguint().unwrap().cmp(&b.to_biguint().unwrap())
    };
    let r = match op {
        CompareOp::Eq => ord.is_eq(),
        CompareOp::Ne => ord.is_ne(),
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Le => ord.is_le(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::Ge => ord.is_ge(),
    };
    VBits::from_bool(r)
}

/// Shift and rotate, following the hardware shifter semantics: an
/// undefined amount poisons the output, an amount at or beyond the
/// operand width yields all-fill (except for rotates, which wrap).
pub fn shift(operand: &VBits, amount: &VBits, dir: ShiftDir, fill: ShiftFill) -> VBits {
    let w = operand.width();
    if w == 0 {
        return VBits::undef(0);
    }
    let Some(mut amt) = amount.as_u128() else {
        return VBits::undef(w);
    };
    let (fill_val, fill_def) = match fill {
        ShiftFill::Zero => (false, true),
        ShiftFill::One => (true, true),
        ShiftFill::Arithmetic => match dir {
            ShiftDir::Left => operand.bit(0),
            ShiftDir::Right => operand.bit(w - 1),
        },
        ShiftFill::Rotate => (false, true),
    };
    if amt >= w as u128 && fill != ShiftFill::Rotate {
        return VBits {
            value: vec![fill_val && fill_def; w],
            defined: vec![fill_def; w],
        };
    }
    amt %= w as u128;
    let amt = amt as usize;
    let mut out = VBits::undef(w);
    match dir {
        ShiftDir::Left => {
            for i in 0..w - amt {
                out.value[i + amt] = operand.value[i];
                out.defined[i + amt] = operand.defined[i];
            }
            for i in 0..amt {
                if fill == ShiftFill::Rotate {
                    out.value[i] = operand.value[w - amt + i];
                    out.defined[i] = operand.defined[w - amt + i];
                } else {
                    out.value[i] = fill_val && fill_def;
                    out.defined[i] = fill_def;
                }
            }
        }
        ShiftDir::Right => {
            for i in 0..w - amt {
                out.value[i] = operand.value[i + amt];
                out.defined[i] = operand.defined[i + amt];
            }
            for i in 0..amt {
                if fill == ShiftFill::Rotate {
                    out.value[w - amt + i] = operand.value[i];
                    out.defined[w - amt + i] = operand.defined[i];
                } else {
                    out.value[w - amt + i] = fill_val && fill_def;
                    out.defined[w - amt + i] = fill_def;
                }
            }
        }
    }
    out
}

pub fn extend(a: &VBits, mode: ExtendMode, new_width: usize) -> VBits {
    debug_assert!(new_width >= a.width());
    let (fv, fd) = match mode {
        ExtendMode::Zero => (false, true),
        ExtendMode::One => (true, true),
        ExtendMode::Sign => {
            if a.width() == 0 {
                (false, true)
            } else {
                a.bit(a.width() - 1)
            }
        }
    };
    let mut out = a.clone();
    out.value.resize(new_width, fv && fd);
    out.defined.resize(new_width, fd);
    out
}

/// Concatenation with the first argument in the most significant bits.
pub fn concat_msb_first(parts: &[&VBits]) -> VBits {
    let mut out = VBits::undef(0);
    for p in parts.iter().rev() {
        out.value.extend_from_slice(&p.value);
        out.defined.extend_from_slice(&p.defined);
    }
    out
}

pub fn mux(sel: &VBits, when_false: &VBits, when_true: &VBits) -> VBits {
    debug_assert_eq!(when_false.width(), when_true.width());
    match sel.as_bool() {
        Some(true) => when_true.clone(),
        Some(false) => when_false.clone(),
        None => VBits::undef(when_false.width()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(x: u128, w: usize) -> VBits {
        VBits::from_u128(x, w)
    }

    #[test]
    fn undefined_and_with_controlling_zero() {
        let undef = VBits::undef(4);
        let zero = u(0, 4);
        let ones = VBits::ones(4);
        assert_eq!(binary(BinaryOp::And, &undef, &zero, false), zero);
        assert!(!binary(BinaryOp::And, &undef, &ones, false).is_fully_defined());
        assert_eq!(binary(BinaryOp::Or, &undef, &ones, false), ones);
        assert!(!binary(BinaryOp::Add, &undef, &zero, false).is_fully_defined());
    }

    #[test]
    fn truncating_arithmetic() {
        assert_eq!(binary(BinaryOp::Add, &u(0xF, 4), &u(1, 4), false), u(0, 4));
        assert_eq!(binary(BinaryOp::Sub, &u(0, 4), &u(1, 4), false), u(0xF, 4));
        assert_eq!(binary(BinaryOp::Mul, &u(7, 4), &u(3, 4), false), u(5, 4));
    }

    #[test]
    fn division_by_zero_is_undefined() {
        assert!(binary(BinaryOp::Div, &u(9, 4), &u(0, 4), false).is_fully_undefined());
        assert!(binary(BinaryOp::Rem, &u(9, 4), &u(0, 4), true).is_fully_undefined());
    }

    #[test]
    fn signed_compare() {
        // 0b1000 = -8 signed, 8 unsigned
        let a = u(0x8, 4);
        let b = u(0x1, 4);
        assert_eq!(compare(CompareOp::Lt, &a, &b, true).as_bool(), Some(true));
        assert_eq!(compare(CompareOp::Lt, &a, &b, false).as_bool(), Some(false));
    }

    #[test]
    fn shift_by_width_is_all_fill() {
        let a = u(0b1010, 4);
        let r = shift(&a, &u(4, 3), ShiftDir::Left, ShiftFill::Zero);
        assert_eq!(r, u(0, 4));
        let r = shift(&a, &u(5, 3), ShiftDir::Right, ShiftFill::Arithmetic);
        assert_eq!(r, u(0b1111, 4));
    }

    #[test]
    fn rotate_round_trip() {
        let a = u(0b0110_1001, 8);
        for k in 0..=8u128 {
            let r = shift(&a, &u(k, 4), ShiftDir::Left, ShiftFill::Rotate);
            let back = shift(&r, &u(k, 4), ShiftDir::Right, ShiftFill::Rotate);
            assert_eq!(back, a, "rotl/rotr round trip failed for k={k}");
        }
    }

    #[test]
    fn shift_amount_undefined_poisons() {
        let a = u(0b1010, 4);
        let r = shift(&a, &VBits::undef(2), ShiftDir::Left, ShiftFill::Zero);
        assert!(r.is_fully_undefined());
    }

    #[test]
    fn extension_composes() {
        let a = u(0b10, 2);
        let once = extend(&extend(&a, ExtendMode::Sign, 4), ExtendMode::Sign, 6);
        let twice = extend(&a, ExtendMode::Sign, 6);
        assert_eq!(once, twice);
        assert_eq!(extend(&a, ExtendMode::One, 4), u(0b1110, 4));
    }

    #[test]
    fn concat_orders_first_argument_msb() {
        let hi = u(0b10, 2);
        let lo = u(0b01, 2);
        let r = concat_msb_first(&[&hi, &lo]);
        assert_eq!(r, u(0b1001, 4));
    }

    #[test]
    fn bigint_round_trip_signed() {
        let a = u(0b1101, 4); // -3
        assert_eq!(a.to_bigint().unwrap(), BigInt::from(-3));
        assert_eq!(VBits::from_bigint(&BigInt::from(-3), 4), a);
    }

    #[test]
    fn mux_with_undefined_selector() {
        let sel = VBits::undef(1);
        let r = mux(&sel, &u(1, 4), &u(2, 4));
        assert!(r.is_fully_undefined());
    }
}
