use sluice::prelude::*;

fn clk_100mhz() -> Clock {
    Clock::new(ClockConfig::new(100_000_000).with_name("clock"))
}

/// A forward-retimed free-running counter: after moving the registers
/// to the output boundary, the output pin reads exactly `k` on cycle
/// `k`, with the merged reset value on the new boundary register.
#[test]
fn retiming_forward_counter() -> miette::Result<()> {
    let design = Design::new();
    let clock = clk_100mhz();
    let scope = clock.scope();

    let input = pin_in(32).set_name("input");

    let mut counter = UInt::new(32);
    let next = counter + 1;
    counter.assign(reg_fwd(next, 0));

    let output = counter | reg_fwd(input.uint(), 0);
    let out_pin = pin_out(output).set_name("out");

    drop(scope);
    let mut circuit = design.finish();
    let mut reporter = Reporter::default();
    let subnet = Subnet::all(&circuit);
    StripSignalAliases
        .run(&mut circuit, &subnet, &mut reporter)?;

    let target = circuit.node(out_pin.id()).input(0).unwrap();
    let subnet = Subnet::all(&circuit);
    retime_forward_to_output(&mut circuit, &subnet, target, RetimeOptions::default())?;

    postprocess(&mut circuit)?;

    let mut sim = Simulation::new(&circuit)?;
    let clk = clock.id();
    let mut i = 0u64;
    sim.add_process(move |io: &mut SimIo| {
        if i == 0 {
            io.poke(&input, 0);
        }
        if i < 32 {
            assert_eq!(io.peek_u64(&out_pin), Some(i), "cycle {i}");
            i += 1;
            Suspend::OnClk(clk)
        } else {
            io.stop();
            Suspend::Done
        }
    });
    sim.run(us(1))?;
    Ok(())
}

/// Three latency hints on a straight path distribute into three stages;
/// the pipeline's reset value is visible at the sink until the data
/// works its way through.
#[test]
fn retiming_hint_pipeline_with_reset() -> miette::Result<()> {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let input = pin_in(32).set_name("input");
    let mut v = input.uint();
    for _ in 0..3 {
        v = reg_hint_init(v, 0);
    }
    let out_pin = pin_out(v).set_name("out");

    let mut circuit = design.finish();
    postprocess(&mut circuit)?;

    let mut sim = Simulation::new(&circuit)?;
    let clk = clock.id();
    let mut i = 0u64;
    sim.add_process(move |io: &mut SimIo| {
        if i == 0 {
            io.poke(&input, 42);
        }
        match i {
            0..=2 => {
                assert_eq!(io.peek_u64(&out_pin), Some(0), "reset value at tick {i}");
                i += 1;
                Suspend::OnClk(clk)
            }
            _ => {
                assert_eq!(io.peek_u64(&out_pin), Some(42));
                io.stop();
                Suspend::Done
            }
        }
    });
    sim.run(us(1))?;
    Ok(())
}

/// A branching pipeline: one arm carries a hint, the join and the tail
/// carry one more. Balancing brings both arms to the same depth, so
/// the sum arrives after exactly two edges.
#[test]
fn retiming_hint_branching() -> miette::Result<()> {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let input1 = pin_in(32).set_name("input1");
    let input2 = pin_in(32).set_name("input2");

    let a = input1.uint();
    let b = reg_hint(input2.uint());
    let output = reg_hint(a + b);
    let out_pin = pin_out(output).set_name("out");

    let mut circuit = design.finish();
    postprocess(&mut circuit)?;

    let mut sim = Simulation::new(&circuit)?;
    let clk = clock.id();
    let mut i = 0u64;
    sim.add_process(move |io: &mut SimIo| {
        if i == 0 {
            io.poke(&input1, 1337);
            io.poke(&input2, 42);
        }
        match i {
            0..=1 => {
                assert!(
                    !io.peek(&out_pin).is_fully_defined(),
                    "output must still be undefined at tick {i}"
                );
                i += 1;
                Suspend::OnClk(clk)
            }
            _ => {
                assert_eq!(io.peek_u64(&out_pin), Some(1337 + 42));
                io.stop();
                Suspend::Done
            }
        }
    });
    sim.run(us(1))?;
    Ok(())
}

/// Backward retiming pulls the register from behind the adder to the
/// input pin without changing the observed sequence.
#[test]
fn retiming_backward_preserves_sequence() -> miette::Result<()> {
    let settings = RegSettings {
        allow_retiming_backward: true,
        ..Default::default()
    };

    let design = Design::new();
    let clock = clk_100mhz();
    let scope = clock.scope();

    let input = pin_in(16).set_name("input");
    let sum = input.uint() + 1;
    let delayed = reg_full(sum, None, None, settings);
    let out_pin = pin_out(delayed).set_name("out");

    drop(scope);
    let mut circuit = design.finish();
    let mut reporter = Reporter::default();
    let subnet = Subnet::all(&circuit);
    StripSignalAliases
        .run(&mut circuit, &subnet, &mut reporter)?;

    let source = OutputRef::new(input.id(), 0);
    let subnet = Subnet::all(&circuit);
    retime_backward_from_input(&mut circuit, &subnet, source, RetimeOptions::default())?;
    postprocess(&mut circuit)?;

    let mut sim = Simulation::new(&circuit)?;
    let clk = clock.id();
    let mut i = 0u64;
    sim.add_process(move |io: &mut SimIo| {
        io.poke(&input, 10 + i as u128);
        if i >= 1 {
            // the value poked on the previous cycle, plus one
            assert_eq!(io.peek_u64(&out_pin), Some(10 + i), "cycle {i}");
        }
        i += 1;
        if i > 20 {
            io.stop();
            Suspend::Done
        } else {
            Suspend::OnClk(clk)
        }
    });
    sim.run(us(1))?;
    Ok(())
}

/// Hints whose reset values disagree refuse the rebalance with an
/// advisory; the registers stay where they are and keep their resets.
#[test]
fn retiming_hint_reset_mismatch_refused() -> miette::Result<()> {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let input = pin_in(8).set_name("input");
    let first = reg_hint_init(input.uint(), 1);
    let second = reg_hint_init(first, 2);
    let out_pin = pin_out(second).set_name("out");

    let mut circuit = design.finish();
    postprocess(&mut circuit)?;

    // both registers survive untouched: latency two, resets preserved
    let mut sim = Simulation::new(&circuit)?;
    let clk = clock.id();
    let mut i = 0u64;
    sim.add_process(move |io: &mut SimIo| {
        if i == 0 {
            io.poke(&input, 9);
        }
        match i {
            0 => assert_eq!(io.peek_u64(&out_pin), Some(2)),
            1 => assert_eq!(io.peek_u64(&out_pin), Some(1)),
            _ => {
                assert_eq!(io.peek_u64(&out_pin), Some(9));
                io.stop();
                return Suspend::Done;
            }
        }
        i += 1;
        Suspend::OnClk(clk)
    });
    sim.run(us(1))?;
    Ok(())
}
