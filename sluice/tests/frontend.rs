use sluice::prelude::*;

fn clk_100mhz() -> Clock {
    Clock::new(ClockConfig::new(100_000_000).with_name("clock"))
}

/// Builds a combinational fixture, postprocesses it, and runs one
/// stepped process over it. `build` returns the pins the checker needs.
fn run_comb<T: Copy + 'static>(
    build: impl FnOnce() -> T,
    mut check: impl FnMut(&mut SimIo, T, usize) -> Suspend + 'static,
) {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();
    let pins = build();
    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();
    let mut sim = Simulation::new(&circuit).unwrap();
    let mut step = 0usize;
    sim.add_process(move |io: &mut SimIo| {
        let s = step;
        step += 1;
        check(io, pins, s)
    });
    sim.run(us(1)).unwrap();
}

#[test]
fn operator_widths_are_preserved() {
    let design = Design::new();
    let a = UInt::new(32);
    let b = UInt::new(32);
    assert_eq!((a + b).width(), 32);
    assert_eq!((a & b).width(), 32);
    assert_eq!((a * b).width(), 32);
    assert_eq!(a.is_lt(b).width(), 1);
    assert_eq!(a.zext(40).width(), 40);
    assert_eq!(a.slice(4, 8).width(), 8);
    assert_eq!(a.rotl(5).width(), 32);
    let s = SInt::new(16);
    assert_eq!((s >> 3).width(), 16);
    assert_eq!(cat(&[&a as &dyn Source, &b]).width(), 64);
    drop(design.finish());
}

#[test]
#[should_panic(expected = "operand widths differ")]
fn width_mismatch_is_fatal() {
    let design = Design::new();
    let a = UInt::new(8);
    let b = UInt::new(9);
    let _ = a + b;
    drop(design.finish());
}

#[derive(Clone)]
struct Header {
    tag: UInt,
    flag: Bit,
    len: UInt,
}

impl Bundle for Header {
    fn width(&self) -> usize {
        Bundle::width(&self.tag) + 1 + Bundle::width(&self.len)
    }

    fn pack(&self) -> BVec {
        // member declaration order, first member in the LSBs
        pack(&[&self.tag as &dyn Source, &self.flag, &self.len])
    }

    fn unpack_from(&self, bits: &BVec) -> Self {
        let tw = Bundle::width(&self.tag);
        let lw = Bundle::width(&self.len);
        Header {
            tag: UInt::from_expr(bits.slice(0, tw).read()),
            flag: bits.bit(tw),
            len: UInt::from_expr(bits.slice(tw + 1, lw).read()),
        }
    }
}

/// L1: unpack(pack(record)) is the identity, bit for bit.
#[test]
fn record_pack_unpack_round_trip() {
    run_comb(
        || {
            let tag = pin_in(4).set_name("tag");
            let flag = pin_in_bit().set_name("flag");
            let len = pin_in(8).set_name("len");
            let header = Header {
                tag: tag.uint(),
                flag: flag.bit(),
                len: len.uint(),
            };
            let packed = header.pack();
            let rebuilt = header.unpack_from(&packed);
            let out = pin_out(rebuilt.pack());
            (tag, flag, len, out)
        },
        |io: &mut SimIo, (tag, flag, len, out), step| {
            if step == 0 {
                io.poke(&tag, 0xA);
                io.poke(&flag, 1);
                io.poke(&len, 0x5C);
                return Suspend::Settle;
            }
            // tag in the low nibble, flag above it, len on top
            assert_eq!(io.peek_u64(&out), Some(0xA | (1 << 4) | (0x5C << 5)));
            io.stop();
            Suspend::Done
        },
    );
}

/// L2: pack(cat(a, b)) == pack(b) ++ pack(a). `cat` puts its first
/// argument in the most significant bits, `pack` in the least.
#[test]
fn cat_and_pack_orders_are_inverse() {
    run_comb(
        || {
            let a = pin_in(4).set_name("a");
            let b = pin_in(4).set_name("b");
            let au = a.uint();
            let bu = b.uint();
            let catted = pin_out(cat(&[&au as &dyn Source, &bu]));
            let packed = pin_out(pack(&[&au as &dyn Source, &bu]));
            (a, b, catted, packed)
        },
        |io: &mut SimIo, (a, b, catted, packed), step| {
            if step == 0 {
                io.poke(&a, 0x3);
                io.poke(&b, 0xE);
                return Suspend::Settle;
            }
            assert_eq!(io.peek_u64(&catted), Some(0x3E), "a in the MSBs");
            assert_eq!(io.peek_u64(&packed), Some(0xE3), "a in the LSBs");
            io.stop();
            Suspend::Done
        },
    );
}

/// L3/L4 on live hardware: chained same-mode extensions collapse and
/// opposite rotates cancel.
#[test]
fn extension_and_rotate_laws() {
    run_comb(
        || {
            let x = pin_in_sint(4).set_name("x");
            let twice = x.sint().sext(8).sext(12);
            let once = x.sint().sext(12);
            let rot = x.sint().rotr(3).rotl(3);
            (x, pin_out(twice), pin_out(once), pin_out(rot))
        },
        |io: &mut SimIo, (x, twice, once, rot), step| {
            if step == 0 {
                io.poke(&x, 0b1010);
                return Suspend::Settle;
            }
            assert_eq!(io.peek(&twice), io.peek(&once));
            assert_eq!(io.peek_u64(&twice), Some(0b1111_1111_1010));
            assert_eq!(io.peek_u64(&rot), Some(0b1010));
            io.stop();
            Suspend::Done
        },
    );
}

/// Shifting by the full operand width yields all-fill bits.
#[test]
fn shift_by_width_is_all_fill() {
    run_comb(
        || {
            let x = pin_in(8).set_name("x");
            let logical = pin_out(x.uint() << 8);
            let s = pin_in_sint(8).set_name("s");
            let arith = pin_out(s.sint() >> 8);
            (x, s, logical, arith)
        },
        |io: &mut SimIo, (x, s, logical, arith), step| {
            if step == 0 {
                io.poke(&x, 0xA5);
                io.poke(&s, 0x80);
                return Suspend::Settle;
            }
            assert_eq!(io.peek_u64(&logical), Some(0));
            assert_eq!(io.peek_u64(&arith), Some(0xFF), "sign fill");
            io.stop();
            Suspend::Done
        },
    );
}

/// Division by zero is undefined, never a crash.
#[test]
fn division_by_zero_is_undefined() {
    run_comb(
        || {
            let a = pin_in(8).set_name("a");
            let b = pin_in(8).set_name("b");
            let q = pin_out(a.uint() / b.uint());
            (a, b, q)
        },
        |io: &mut SimIo, (a, b, q), step| {
            if step == 0 {
                io.poke(&a, 9);
                io.poke(&b, 0);
                return Suspend::Settle;
            }
            assert!(io.peek(&q).is_fully_undefined());
            io.stop();
            Suspend::Done
        },
    );
}

/// Nested conditional scopes build the expected mux tree, including
/// `elsewhen` chains.
#[test]
fn conditional_scopes_build_mux_trees() {
    run_comb(
        || {
            let sel_hi = pin_in_bit().set_name("sel_hi");
            let sel_lo = pin_in_bit().set_name("sel_lo");
            let mut v = UInt::new(8);
            v.assign(UInt::constant(0, 8));
            let arm = when(sel_hi.bit(), || {
                when(sel_lo.bit(), || {
                    v.assign(UInt::constant(3, 8));
                })
                .otherwise(|| {
                    v.assign(UInt::constant(2, 8));
                });
            });
            let _ = arm.elsewhen(sel_lo.bit(), || {
                v.assign(UInt::constant(1, 8));
            });
            (sel_hi, sel_lo, pin_out(v))
        },
        |io: &mut SimIo, (hi, lo, out), step| {
            let cases = [(0u128, 0u128, 0u64), (0, 1, 1), (1, 0, 2), (1, 1, 3)];
            if step > 0 {
                let (_, _, want) = cases[step - 1];
                assert_eq!(io.peek_u64(&out), Some(want), "case {}", step - 1);
            }
            if step == cases.len() {
                io.stop();
                return Suspend::Done;
            }
            let (h, l, _) = cases[step];
            io.poke(&hi, h);
            io.poke(&lo, l);
            Suspend::Settle
        },
    );
}

/// Literals carry undefined digits into the simulation.
#[test]
fn string_literals_with_undefined_bits() {
    run_comb(
        || pin_out(bvec_lit("8b1010_xx01")),
        |io: &mut SimIo, out, step| {
            if step == 0 {
                return Suspend::Settle;
            }
            let v = io.peek(&out);
            assert_eq!(v.bit(0), (true, true));
            assert!(!v.bit(2).1);
            assert!(!v.bit(3).1);
            assert_eq!(v.bit(7), (true, true));
            io.stop();
            Suspend::Done
        },
    );
}

/// Input pins may only be driven externally.
#[test]
fn input_pins_reject_drivers() {
    let design = Design::new();
    let pin = pin_in(4);
    let c = UInt::constant(1, 4);
    let err = with_ctx(|ctx| {
        let src = SignalValue::read(&c);
        ctx.circuit.rebind(src, pin.id(), 0)
    });
    assert!(matches!(err, Err(DesignError::PinNotDrivable { .. })));
    drop(design.finish());
}

/// An assignment inside a conditional whose false path was never
/// driven forms a latch shape; post-processing rejects it as a
/// combinational cycle.
#[test]
fn latch_shapes_are_rejected() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();
    let en = pin_in_bit().set_name("en");
    let mut v = UInt::new(8);
    when(en.bit(), || {
        v.assign(v + 1);
    });
    pin_out(v);
    let mut circuit = design.finish();
    let err = postprocess(&mut circuit);
    assert!(matches!(err, Err(PassError::CombinationalCycle { .. })));
}

/// The tristate pin reads back its driven value only while the output
/// enable is high.
#[test]
fn tristate_pin_read_back() {
    run_comb(
        || {
            let data = pin_in_bvec(4).set_name("data");
            let oe = pin_in_bit().set_name("oe");
            let pad = tristate_pin(data.bvec(), oe.bit());
            (data, oe, pin_out(pad.read_back()))
        },
        |io: &mut SimIo, (data, oe, rb), step| match step {
            0 => {
                io.poke(&data, 0x9);
                io.poke(&oe, 1);
                Suspend::Settle
            }
            1 => {
                assert_eq!(io.peek_u64(&rb), Some(0x9));
                io.poke(&oe, 0);
                Suspend::Settle
            }
            _ => {
                assert!(io.peek(&rb).is_fully_undefined());
                io.stop();
                Suspend::Done
            }
        },
    );
}
