use std::cell::RefCell;
use std::rc::Rc;

use sluice_core::{
    pin_in_bit, pin_in_bvec, pin_out, postprocess, us, BVec, Clock, ClockConfig, Design,
    DesignError, SimIo, Simulation, Suspend,
};
use sluice_stream::{
    check_handshake, expose_input_stream, expose_output_stream, fifo_stream, reg_decouple,
    PacketReceiver, PacketSender, SimPacket, Stream,
};

fn clk_100mhz() -> Clock {
    Clock::new(ClockConfig::new(100_000_000).with_name("clock"))
}

/// S6: a 14-byte packet crosses producer stream → FIFO → consumer
/// stream intact, including framing, empty count, tx id and error.
#[test]
fn packet_loopback_through_fifo() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let mut input = Stream::new(BVec::new(32))
        .with_valid()
        .with_ready()
        .with_packet()
        .with_empty(2)
        .with_error()
        .with_txid(4);
    let tx = expose_input_stream(&mut input);
    let mut output = fifo_stream(&mut input, 8);
    let rx = expose_output_stream(&mut output);
    check_handshake(&input).unwrap();
    check_handshake(&output).unwrap();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();

    let packet = SimPacket::new(*b"fourteen bytes")
        .with_txid(0x9)
        .with_error(true)
        .with_invalid_beats(0b10);
    let result: Rc<RefCell<Option<SimPacket>>> = Rc::default();

    let mut sim = Simulation::new(&circuit).unwrap();
    sim.add_process(PacketSender::new(tx, packet.clone(), clock.id()));
    sim.add_process(
        PacketReceiver::new(rx, clock.id(), result.clone()).with_unready_beats(0b100),
    );
    sim.run(us(5)).unwrap();

    let received = result.borrow().clone().expect("packet arrived");
    assert_eq!(received.data, packet.data);
    assert_eq!(received.txid, 0x9);
    assert!(received.error);
}

/// A combinational `Ready` computed from the same stream's `Valid` is
/// rejected at elaboration; a decoupling register clears it.
#[test]
fn handshake_deadlock_check() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let mut looped = Stream::new(BVec::new(8)).with_valid().with_ready();
    let v = looped.valid.unwrap();
    looped.ready.as_mut().unwrap().assign(v);
    let err = check_handshake(&looped);
    assert!(matches!(err, Err(DesignError::HandshakeCycle)));

    let mut clean = Stream::new(BVec::new(8)).with_valid().with_ready();
    let _decoupled = reg_decouple(&mut clean);
    check_handshake(&clean).unwrap();

    drop(design.finish());
}

/// The skid buffer forwards beats with one cycle of latency and holds
/// them across back-pressure without loss or duplication (P5 on the
/// producer side: valid stays up and the payload stable until taken).
#[test]
fn decoupling_register_is_elastic() {
    let design = Design::new();
    let clock = clk_100mhz();
    let _scope = clock.scope();

    let mut input = Stream::new(BVec::new(8)).with_valid().with_ready();
    let tx = expose_input_stream(&mut input);
    let mut output = reg_decouple(&mut input);
    let rx = expose_output_stream(&mut output);
    check_handshake(&input).unwrap();

    let mut circuit = design.finish();
    postprocess(&mut circuit).unwrap();

    let mut sim = Simulation::new(&circuit).unwrap();
    let clk = clock.id();

    let sent: Rc<RefCell<Vec<u64>>> = Rc::default();
    let got: Rc<RefCell<Vec<u64>>> = Rc::default();

    // the consumer runs first at every event so its `Ready` poke is in
    // place before the producer samples the handshake for the edge
    {
        let got = got.clone();
        let mut stall = 0u32;
        let mut sampled: Option<(bool, u64, bool)> = None;
        sim.add_process(move |io: &mut SimIo| {
            if let Some((valid, data, ready)) = sampled.take() {
                if valid && ready {
                    got.borrow_mut().push(data);
                }
            }
            if got.borrow().len() >= 5 {
                io.poke(rx.ready.as_ref().unwrap(), 0);
                return Suspend::Done;
            }
            // stall every third cycle to exercise the skid path
            stall += 1;
            let be_ready = stall % 3 != 0;
            io.poke(rx.ready.as_ref().unwrap(), be_ready as u128);
            let valid = io
                .peek_bool(rx.valid.as_ref().unwrap())
                .unwrap_or(false);
            let data = io.peek_u64(&rx.data).unwrap_or(0);
            sampled = Some((valid, data, be_ready));
            Suspend::OnClk(clk)
        });
    }
    {
        let sent = sent.clone();
        let mut value = 1u64;
        let mut ready_at_edge = false;
        sim.add_process(move |io: &mut SimIo| {
            if ready_at_edge {
                sent.borrow_mut().push(value);
                value += 1;
            }
            if value > 6 {
                if let Some(valid) = &tx.valid {
                    io.poke(valid, 0);
                }
                return Suspend::Done;
            }
            if let Some(valid) = &tx.valid {
                io.poke(valid, 1);
            }
            io.poke(&tx.data, value as u128);
            ready_at_edge = io
                .peek_bool(tx.ready.as_ref().unwrap())
                .unwrap_or(false);
            Suspend::OnClk(clk)
        });
    }
    sim.run(us(2)).unwrap();

    assert_eq!(*got.borrow(), vec![1, 2, 3, 4, 5]);
    assert!(sent.borrow().starts_with(&[1, 2, 3, 4, 5]));
}
