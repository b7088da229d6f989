//! Composite records. A `Bundle` flattens to a raw bit vector with the
//! first member in the least significant bits; `cat` is the opposite
//! convention (first argument in the most significant bits). Both
//! orders are load-bearing and must not be swapped.

use crate::front::signal::{cat, mux, BVec, Bit, SInt, SignalValue, Source, UInt};

pub trait Bundle: Clone {
    fn width(&self) -> usize;

    /// Flattens to a raw vector, first member in the LSBs.
    fn pack(&self) -> BVec;

    /// Rebuilds a value of this shape from a raw vector. `self` only
    /// provides the shape (member widths), not the storage.
    fn unpack_from(&self, bits: &BVec) -> Self;

    /// Same shape, fresh undriven storage.
    #[track_caller]
    fn construct_like(&self) -> Self {
        let blank = BVec::new(Bundle::width(self));
        self.unpack_from(&blank)
    }
}

impl Bundle for Bit {
    fn width(&self) -> usize {
        1
    }

    #[track_caller]
    fn pack(&self) -> BVec {
        cat(&[self as &dyn Source])
    }

    #[track_caller]
    fn unpack_from(&self, bits: &BVec) -> Self {
        bits.bit(0)
    }
}

macro_rules! scalar_bundle {
    ($name:ident) => {
        impl Bundle for $name {
            fn width(&self) -> usize {
                SignalValue::width(self)
            }

            #[track_caller]
            fn pack(&self) -> BVec {
                cat(&[self as &dyn Source])
            }

            #[track_caller]
            fn unpack_from(&self, bits: &BVec) -> Self {
                let w = SignalValue::width(self);
                <$name>::from_expr(bits.slice(0, w).read())
            }
        }
    };
}

scalar_bundle!(UInt);
scalar_bundle!(SInt);
scalar_bundle!(BVec);

macro_rules! tuple_bundle {
    ($($t:ident/$i:tt),+) => {
        impl<$($t: Bundle),+> Bundle for ($($t,)+) {
            fn width(&self) -> usize {
                0 $(+ self.$i.width())+
            }

            #[track_caller]
            fn pack(&self) -> BVec {
                // later members land above earlier ones
                let parts = [$(self.$i.pack()),+];
                let mut refs: Vec<&dyn Source> = Vec::new();
                for p in parts.iter().rev() {
                    refs.push(p);
                }
                cat(&refs)
            }

            #[track_caller]
            fn unpack_from(&self, bits: &BVec) -> Self {
                let mut offset = 0;
                ($(
                    {
                        let w = self.$i.width();
                        let member = self.$i.unpack_from(&bits.slice(offset, w));
                        offset += w;
                        let _ = offset;
                        member
                    },
                )+)
            }
        }
    };
}

tuple_bundle!(A/0);
tuple_bundle!(A/0, B/1);
tuple_bundle!(A/0, B/1, C/2);
tuple_bundle!(A/0, B/1, C/2, D/3);

/// `pack` over loose arguments: first argument in the LSBs.
#[track_caller]
pub fn pack(parts: &[&dyn Source]) -> BVec {
    let reversed: Vec<&dyn Source> = parts.iter().rev().copied().collect();
    cat(&reversed)
}

/// Registers every flattened bit of a bundle in the current clock scope.
#[track_caller]
pub fn reg_bundle<B: Bundle>(x: &B) -> B {
    x.unpack_from(&crate::front::reg::reg(x.pack()))
}

#[track_caller]
pub fn reg_bundle_init<B: Bundle>(x: &B, reset: u128) -> B {
    x.unpack_from(&crate::front::reg::reg_init(x.pack(), reset))
}

/// Latency hint over a whole bundle.
#[track_caller]
pub fn reg_hint_bundle<B: Bundle>(x: &B) -> B {
    x.unpack_from(&crate::front::reg::reg_hint(x.pack()))
}

#[track_caller]
pub fn reg_hint_bundle_init<B: Bundle>(x: &B, reset: u128) -> B {
    x.unpack_from(&crate::front::reg::reg_hint_init(x.pack(), reset))
}

/// Two-way multiplexer over a bundle.
#[track_caller]
pub fn mux_bundle<B: Bundle>(sel: Bit, when_false: &B, when_true: &B) -> B {
    when_false.unpack_from(&mux(sel, when_false.pack(), when_true.pack()))
}
