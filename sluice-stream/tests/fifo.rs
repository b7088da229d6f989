use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sluice_core::{
    pin_in, pin_in_bit, pin_in_bvec, pin_out, postprocess, us, when, Clock, ClockConfig, Design,
    SimError, SimIo, Simulation, Suspend,
};
use sluice_stream::{DualClockFifo, Fifo, FifoArray, TransactionalFifo};

fn clk_100mhz() -> Clock {
    Clock::new(ClockConfig::new(100_000_000).with_name("clock"))
}

struct FifoPins {
    push: sluice_core::InputPin,
    push_data: sluice_core::InputPin,
    pop: sluice_core::InputPin,
    full: sluice_core::OutputPin,
    empty: sluice_core::OutputPin,
    peek: sluice_core::OutputPin,
    half_empty: sluice_core::OutputPin,
    half_full: sluice_core::OutputPin,
}

fn build_fifo(depth: usize) -> (sluice_core::Circuit, Clock, FifoPins, usize) {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let push = pin_in_bit().set_name("push_valid");
    let push_data = pin_in_bvec(8).set_name("push_data");
    let pop = pin_in_bit().set_name("pop_ready");

    let mut fifo = Fifo::new(depth, 8);
    let actual = fifo.depth();
    when(push.bit(), || fifo.push(push_data.bvec()));
    when(pop.bit(), || fifo.pop());
    let full = pin_out(fifo.full()).set_name("full");
    let empty = pin_out(fifo.empty()).set_name("empty");
    let peek = pin_out(fifo.peek()).set_name("pop_data");
    let half_empty = pin_out(fifo.almost_empty(actual / 2)).set_name("half_empty");
    let half_full = pin_out(fifo.almost_full(actual / 2)).set_name("half_full");
    fifo.generate();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();
    (
        circuit,
        clock,
        FifoPins {
            push,
            push_data,
            pop,
            full,
            empty,
            peek,
            half_empty,
            half_full,
        },
        actual,
    )
}

/// Fill to the brim, drain to empty, watching the level flags.
#[test]
fn fifo_fill_and_drain() {
    let (circuit, clock, pins, depth) = build_fifo(16);
    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();
    let mut phase = 0usize;
    let mut count = 0usize;
    sim.add_process(move |io: &mut SimIo| {
        match phase {
            0 => {
                io.poke(&pins.push, 0);
                io.poke(&pins.pop, 0);
                assert_eq!(io.peek_bool(&pins.empty), Some(true));
                assert_eq!(io.peek_bool(&pins.full), Some(false));
                assert_eq!(io.peek_bool(&pins.half_empty), Some(true));
                assert_eq!(io.peek_bool(&pins.half_full), Some(false));
                phase = 1;
            }
            1 => {
                if count < depth {
                    io.poke(&pins.push, 1);
                    io.poke(&pins.push_data, (count * 3) as u128);
                    count += 1;
                } else {
                    io.poke(&pins.push, 0);
                    assert_eq!(io.peek_bool(&pins.full), Some(true));
                    assert_eq!(io.peek_bool(&pins.empty), Some(false));
                    assert_eq!(io.peek_bool(&pins.half_empty), Some(false));
                    assert_eq!(io.peek_bool(&pins.half_full), Some(true));
                    phase = 2;
                    count = 0;
                }
            }
            2 => {
                if count < depth {
                    assert_eq!(io.peek_u64(&pins.peek), Some((count * 3) as u64 & 0xFF));
                    io.poke(&pins.pop, 1);
                    count += 1;
                } else {
                    io.poke(&pins.pop, 0);
                    assert_eq!(io.peek_bool(&pins.empty), Some(true));
                    assert_eq!(io.peek_bool(&pins.full), Some(false));
                    io.stop();
                    return Suspend::Done;
                }
            }
            _ => unreachable!(),
        }
        Suspend::OnClk(clk)
    });
    sim.run(us(10)).unwrap();
}

/// P6: for a random legal interleaving of pushes and pops, the pop
/// sequence equals the push sequence.
#[test]
fn fifo_order_against_model() {
    let (circuit, clock, pins, _depth) = build_fifo(8);
    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();
    let mut rng = StdRng::seed_from_u64(0x5111);
    let mut model: VecDeque<u8> = VecDeque::new();
    let mut pushed = 0u32;
    let mut next_value = 1u8;
    sim.add_process(move |io: &mut SimIo| {
        // settle-in: apply the previous cycle's requests to the model
        let full = io.peek_bool(&pins.full).unwrap();
        let empty = io.peek_bool(&pins.empty).unwrap();
        if !empty {
            let head = io.peek_u64(&pins.peek).unwrap() as u8;
            assert_eq!(Some(&head), model.front(), "head mismatch");
        }
        let do_push = pushed < 400 && !full && rng.gen_bool(0.6);
        let do_pop = !empty && rng.gen_bool(0.5);
        io.poke(&pins.push, do_push as u128);
        io.poke(&pins.pop, do_pop as u128);
        if do_push {
            io.poke(&pins.push_data, next_value as u128);
            model.push_back(next_value);
            next_value = next_value.wrapping_add(1);
            pushed += 1;
        }
        if do_pop {
            model.pop_front();
        }
        if pushed >= 400 && model.is_empty() {
            io.stop();
            return Suspend::Done;
        }
        Suspend::OnClk(clk)
    });
    sim.run(us(100)).unwrap();
}

/// Popping an empty FIFO is an assertion failure, not data corruption.
#[test]
fn fifo_pop_empty_asserts() {
    let (circuit, clock, pins, _depth) = build_fifo(4);
    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();
    sim.add_process(move |io: &mut SimIo| {
        io.poke(&pins.push, 0);
        io.poke(&pins.pop, 1);
        Suspend::OnClk(clk)
    });
    let err = sim.run(us(1)).unwrap_err();
    assert!(
        matches!(err, SimError::AssertionFailed { ref message, .. } if message.contains("pop from empty")),
        "unexpected: {err}"
    );
}

/// S3: pushes roll back to the last commit; a committed single push is
/// what the reader sees.
#[test]
fn transactional_fifo_rollback() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let push = pin_in_bit().set_name("push");
    let data = pin_in_bvec(8).set_name("data");
    let pop = pin_in_bit().set_name("pop");
    let commit = pin_in_bit().set_name("commit");
    let rollback = pin_in_bit().set_name("rollback");

    let mut fifo = TransactionalFifo::new(4, 8);
    when(push.bit(), || fifo.push(data.bvec()));
    when(pop.bit(), || fifo.pop());
    when(commit.bit(), || fifo.commit_push());
    when(rollback.bit(), || fifo.rollback_push());
    let empty = pin_out(fifo.empty()).set_name("empty");
    let peek = pin_out(fifo.peek()).set_name("peek");
    fifo.generate();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();

    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();
    let mut step = 0;
    sim.add_process(move |io: &mut SimIo| {
        step += 1;
        io.poke(&push, 0);
        io.poke(&pop, 0);
        io.poke(&commit, 0);
        io.poke(&rollback, 0);
        match step {
            // push A, B, C without committing
            1..=3 => {
                io.poke(&push, 1);
                io.poke(&data, 0x40 + step as u128);
                // uncommitted data is invisible to the reader
                assert_eq!(io.peek_bool(&empty), Some(true));
            }
            4 => {
                io.poke(&rollback, 1);
            }
            5 => {
                io.poke(&push, 1);
                io.poke(&data, 0x44); // D
            }
            6 => {
                io.poke(&commit, 1);
                assert_eq!(io.peek_bool(&empty), Some(true), "not yet committed");
            }
            7 => {
                assert_eq!(io.peek_bool(&empty), Some(false));
                assert_eq!(io.peek_u64(&peek), Some(0x44), "the committed push is D");
                io.poke(&pop, 1);
            }
            _ => {
                // nothing else was committed
                assert_eq!(io.peek_bool(&empty), Some(true));
                io.stop();
                return Suspend::Done;
            }
        }
        Suspend::OnClk(clk)
    });
    sim.run(us(1)).unwrap();
}

/// P7: a rollback reverts exactly to the last commit point; the
/// committed prefix pops in order.
#[test]
fn transactional_fifo_commit_prefix() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let push = pin_in_bit();
    let data = pin_in_bvec(8);
    let pop = pin_in_bit();
    let commit = pin_in_bit();
    let rollback = pin_in_bit();

    let mut fifo = TransactionalFifo::new(8, 8);
    when(push.bit(), || fifo.push(data.bvec()));
    when(pop.bit(), || fifo.pop());
    when(commit.bit(), || fifo.commit_push());
    when(rollback.bit(), || fifo.rollback_push());
    let empty = pin_out(fifo.empty());
    let peek = pin_out(fifo.peek());
    fifo.generate();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();

    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();
    let mut step = 0;
    let mut popped = Vec::new();
    sim.add_process(move |io: &mut SimIo| {
        step += 1;
        io.poke(&push, 0);
        io.poke(&pop, 0);
        io.poke(&commit, 0);
        io.poke(&rollback, 0);
        match step {
            // commit {1, 2}, then push {3, 4} and abandon them
            1 | 2 => {
                io.poke(&push, 1);
                io.poke(&data, step as u128);
            }
            3 => io.poke(&commit, 1),
            4 | 5 => {
                io.poke(&push, 1);
                io.poke(&data, step as u128 - 1);
            }
            6 => io.poke(&rollback, 1),
            7..=20 => {
                if io.peek_bool(&empty) == Some(false) {
                    popped.push(io.peek_u64(&peek).unwrap());
                    io.poke(&pop, 1);
                } else {
                    assert_eq!(popped, vec![1, 2], "exactly the committed prefix");
                    io.stop();
                    return Suspend::Done;
                }
            }
            _ => {
                io.stop();
                return Suspend::Done;
            }
        }
        Suspend::OnClk(clk)
    });
    sim.run(us(1)).unwrap();
}

/// S4: a dual-clock FIFO moves a burst across 133 MHz to 100 MHz, in
/// order, with `full` and `empty` edge-accurate on their own clocks.
#[test]
fn dual_clock_fifo_burst() {
    let design = Design::new();
    let wr_clk = Clock::new(ClockConfig::new(133_000_000).with_name("wr_clk"));
    let rd_clk = Clock::new(ClockConfig::new(100_000_000).with_name("rd_clk"));

    let push = pin_in_bit().set_name("push");
    let data = pin_in_bvec(8).set_name("data");
    let pop = pin_in_bit().set_name("pop");

    let mut fifo = DualClockFifo::new(16, 8, wr_clk, rd_clk);
    {
        let _w = wr_clk.scope();
        when(push.bit(), || fifo.push(data.bvec()));
    }
    {
        let _r = rd_clk.scope();
        when(pop.bit(), || fifo.pop());
    }
    let full = pin_out(fifo.full()).set_name("full");
    let empty = pin_out(fifo.empty()).set_name("empty");
    let peek = pin_out(fifo.peek()).set_name("peek");
    fifo.generate();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();

    let mut sim = Simulation::new(&circuit).unwrap();
    let wr = wr_clk.id();
    let rd = rd_clk.id();

    // writer: 16 pushes back to back, then verify full
    let mut wrote = 0usize;
    sim.add_process(move |io: &mut SimIo| {
        if wrote < 16 {
            assert_eq!(io.peek_bool(&full), Some(false), "write {wrote}");
            io.poke(&push, 1);
            io.poke(&data, (0xA0 + wrote) as u128);
            wrote += 1;
            Suspend::OnClk(wr)
        } else {
            io.poke(&push, 0);
            // the cycle after the 16th write the fifo reports full
            assert_eq!(io.peek_bool(&full), Some(true));
            Suspend::Done
        }
    });

    // reader: drain 16 values in order once they appear
    let mut read = 0usize;
    sim.add_process(move |io: &mut SimIo| {
        io.poke(&pop, 0);
        if read < 16 {
            if io.peek_bool(&empty) == Some(false) {
                assert_eq!(io.peek_u64(&peek), Some(0xA0 + read as u64), "read {read}");
                io.poke(&pop, 1);
                read += 1;
            }
            Suspend::OnClk(rd)
        } else {
            // the cycle after the 16th read the fifo reports empty
            assert_eq!(io.peek_bool(&empty), Some(true));
            io.stop();
            Suspend::Done
        }
    });

    sim.run(us(10)).unwrap();
}

/// Two logical FIFOs in one bank stay independent.
#[test]
fn fifo_array_keeps_lanes_independent() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let push = pin_in_bit();
    let push_sel = pin_in(1);
    let data = pin_in_bvec(8);
    let pop = pin_in_bit();
    let pop_sel = pin_in(1);

    let mut bank = FifoArray::new(2, 4, 8);
    when(push.bit(), || {
        bank.push(push_sel.uint(), data.bvec());
    });
    bank.select_pop(pop_sel.uint());
    when(pop.bit(), || {
        bank.pop(pop_sel.uint());
    });
    // every lane publishes immediately
    bank.commit_push();
    bank.commit_pop();
    let empty = pin_out(bank.empty());
    let peek = pin_out(bank.peek());
    bank.generate();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();

    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();
    let mut step = 0;
    sim.add_process(move |io: &mut SimIo| {
        step += 1;
        io.poke(&push, 0);
        io.poke(&pop, 0);
        match step {
            // interleave pushes into lane 0 and lane 1
            1 | 3 => {
                io.poke(&push, 1);
                io.poke(&push_sel, 0);
                io.poke(&data, 0x10 + step as u128);
            }
            2 | 4 => {
                io.poke(&push, 1);
                io.poke(&push_sel, 1);
                io.poke(&data, 0x20 + step as u128);
            }
            // lane 1 first: its own order, untouched by lane 0
            5 => {
                io.poke(&pop_sel, 1);
            }
            6 => {
                assert_eq!(io.peek_bool(&empty), Some(false));
                assert_eq!(io.peek_u64(&peek), Some(0x22));
                io.poke(&pop, 1);
                io.poke(&pop_sel, 1);
            }
            7 => {
                assert_eq!(io.peek_u64(&peek), Some(0x24));
                io.poke(&pop, 1);
                io.poke(&pop_sel, 1);
            }
            8 => {
                io.poke(&pop_sel, 0);
            }
            9 => {
                assert_eq!(io.peek_u64(&peek), Some(0x11));
                io.poke(&pop, 1);
                io.poke(&pop_sel, 0);
            }
            10 => {
                assert_eq!(io.peek_u64(&peek), Some(0x13));
                io.poke(&pop, 1);
                io.poke(&pop_sel, 0);
            }
            _ => {
                assert_eq!(io.peek_bool(&empty), Some(true));
                io.stop();
                return Suspend::Done;
            }
        }
        Suspend::OnClk(clk)
    });
    sim.run(us(1)).unwrap();
}
