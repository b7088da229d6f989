//! Packet-level simulation fixtures. A `SimPacket` is a byte payload
//! plus the meta attributes a stream can carry; the sender and
//! receiver processes drive and observe a stream's boundary pins beat
//! by beat, honouring whichever metas are present.
//!
//! Both processes sample handshake signals between clock edges, where
//! the state is stable, so a beat counts as transferred exactly when
//! `Valid` and `Ready` both held before the edge.

use std::cell::RefCell;
use std::rc::Rc;

use sluice_core::front::pin::{InputPin, OutputPin};
use sluice_core::{
    pin_in_bit, pin_in_bvec, pin_out, BVec, Bit, Bundle, ClockId, SignalValue, SimIo, SimProcess,
    Suspend, UInt, VBits,
};

use crate::stream::Stream;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimPacket {
    pub data: Vec<u8>,
    pub txid: u64,
    pub error: bool,
    /// Bit `k` set inserts a bubble before beat `k`.
    pub invalid_beats: u64,
}

impl SimPacket {
    pub fn new(data: impl Into<Vec<u8>>) -> SimPacket {
        SimPacket {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_txid(mut self, txid: u64) -> Self {
        self.txid = txid;
        self
    }

    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }

    pub fn with_invalid_beats(mut self, mask: u64) -> Self {
        self.invalid_beats = mask;
        self
    }

    pub fn beat_count(&self, beat_bytes: usize) -> usize {
        self.data.len().div_ceil(beat_bytes)
    }

    /// Invalid bytes at the tail of the final beat.
    pub fn tail_empty(&self, beat_bytes: usize) -> usize {
        let rem = self.data.len() % beat_bytes;
        if rem == 0 {
            0
        } else {
            beat_bytes - rem
        }
    }
}

/// Boundary pins for a stream the simulation produces into the DUT.
pub struct TxStreamPins {
    pub data: InputPin,
    pub valid: Option<InputPin>,
    pub ready: Option<OutputPin>,
    pub sop: Option<InputPin>,
    pub eop: Option<InputPin>,
    pub empty: Option<InputPin>,
    pub error: Option<InputPin>,
    pub txid: Option<InputPin>,
}

/// Boundary pins for a stream the simulation consumes from the DUT.
pub struct RxStreamPins {
    pub data: OutputPin,
    pub valid: Option<OutputPin>,
    pub ready: Option<InputPin>,
    pub sop: Option<OutputPin>,
    pub eop: Option<OutputPin>,
    pub empty: Option<OutputPin>,
    pub error: Option<OutputPin>,
    pub txid: Option<OutputPin>,
}

/// Creates input pins for every producer signal of the stream and
/// drives the stream from them; the stream's `Ready` is exported.
#[track_caller]
pub fn expose_input_stream(stream: &mut Stream<BVec>) -> TxStreamPins {
    let w = Bundle::width(&stream.payload);
    let data = pin_in_bvec(w).set_name("tx_data");
    stream.payload.assign(data.bvec());
    let mut bit_pin = |sig: &mut Option<Bit>, name: &str| {
        sig.as_mut().map(|s| {
            let p = pin_in_bit().set_name(name);
            s.assign(p.bit());
            p
        })
    };
    let valid = bit_pin(&mut stream.valid, "tx_valid");
    let sop = bit_pin(&mut stream.sop, "tx_sop");
    let eop = bit_pin(&mut stream.eop, "tx_eop");
    let error = bit_pin(&mut stream.error, "tx_error");
    let mut uint_pin = |sig: &mut Option<UInt>, name: &str| {
        sig.as_mut().map(|s| {
            let p = pin_in_bvec(s.width()).set_name(name);
            s.assign(UInt::from_expr(p.bvec().read()));
            p
        })
    };
    let empty = uint_pin(&mut stream.empty, "tx_empty");
    let txid = uint_pin(&mut stream.txid, "tx_txid");
    let ready = stream.ready.map(|r| pin_out(r).set_name("tx_ready"));
    TxStreamPins {
        data,
        valid,
        ready,
        sop,
        eop,
        empty,
        error,
        txid,
    }
}

/// Exports every producer signal of the stream as an output pin and
/// drives the stream's `Ready` from an input pin.
#[track_caller]
pub fn expose_output_stream(stream: &mut Stream<BVec>) -> RxStreamPins {
    let data = pin_out(stream.payload).set_name("rx_data");
    let valid = stream.valid.map(|v| pin_out(v).set_name("rx_valid"));
    let sop = stream.sop.map(|s| pin_out(s).set_name("rx_sop"));
    let eop = stream.eop.map(|e| pin_out(e).set_name("rx_eop"));
    let empty = stream.empty.map(|e| pin_out(e).set_name("rx_empty"));
    let error = stream.error.map(|e| pin_out(e).set_name("rx_error"));
    let txid = stream.txid.map(|t| pin_out(t).set_name("rx_txid"));
    let ready = stream.ready.as_mut().map(|r| {
        let p = pin_in_bit().set_name("rx_ready");
        r.assign(p.bit());
        p
    });
    RxStreamPins {
        data,
        valid,
        ready,
        sop,
        eop,
        empty,
        error,
        txid,
    }
}

fn bytes_to_bits(bytes: &[u8], beat_bytes: usize) -> VBits {
    let mut v = VBits::zero(beat_bytes * 8);
    for (j, b) in bytes.iter().enumerate() {
        for k in 0..8 {
            v.value[j * 8 + k] = (b >> k) & 1 != 0;
        }
    }
    v
}

enum SendState {
    Gap(u32),
    Drive,
    AwaitAccept,
    Finished,
}

/// Drives one packet into a DUT input stream, beat by beat.
pub struct PacketSender {
    pins: TxStreamPins,
    packet: SimPacket,
    clk: ClockId,
    beat_bytes: usize,
    beat: usize,
    state: SendState,
    ready_at_edge: bool,
}

impl PacketSender {
    pub fn new(pins: TxStreamPins, packet: SimPacket, clk: ClockId) -> PacketSender {
        let beat_bytes = 0; // fixed up on first resume from the pin width
        PacketSender {
            pins,
            packet,
            clk,
            beat_bytes,
            beat: 0,
            state: SendState::Gap(0),
            ready_at_edge: true,
        }
    }

    fn drive_beat(&mut self, io: &mut SimIo<'_>) {
        let beats = self.packet.beat_count(self.beat_bytes);
        let lo = self.beat * self.beat_bytes;
        let hi = (lo + self.beat_bytes).min(self.packet.data.len());
        let bits = bytes_to_bits(&self.packet.data[lo..hi], self.beat_bytes);
        io.poke_bits(&self.pins.data, bits);
        if let Some(valid) = &self.pins.valid {
            io.poke(valid, 1);
        }
        let last = self.beat + 1 == beats;
        if let Some(sop) = &self.pins.sop {
            io.poke(sop, (self.beat == 0) as u128);
        }
        if let Some(eop) = &self.pins.eop {
            io.poke(eop, last as u128);
        }
        if let Some(empty) = &self.pins.empty {
            let e = if last {
                self.packet.tail_empty(self.beat_bytes)
            } else {
                0
            };
            io.poke(empty, e as u128);
        }
        if let Some(error) = &self.pins.error {
            io.poke(error, (last && self.packet.error) as u128);
        }
        if let Some(txid) = &self.pins.txid {
            io.poke(txid, self.packet.txid as u128);
        }
    }

    fn idle(&mut self, io: &mut SimIo<'_>) {
        if let Some(valid) = &self.pins.valid {
            io.poke(valid, 0);
        }
        io.poke_undefined(&self.pins.data);
    }

    fn ready_now(&self, io: &SimIo<'_>) -> bool {
        match &self.pins.ready {
            Some(r) => io.peek_bool(r).unwrap_or(false),
            None => true,
        }
    }
}

impl SimProcess for PacketSender {
    fn resume(&mut self, io: &mut SimIo<'_>) -> Suspend {
        if self.beat_bytes == 0 {
            self.beat_bytes = self.pins.data.kind().width() / 8;
            self.state = if self.packet.invalid_beats & 1 != 0 {
                SendState::Gap(1)
            } else {
                SendState::Drive
            };
        }
        loop {
            match self.state {
                SendState::Gap(ref mut n) => {
                    if *n > 0 {
                        *n -= 1;
                        self.idle(io);
                        return Suspend::OnClk(self.clk);
                    }
                    self.state = SendState::Drive;
                }
                SendState::Drive => {
                    self.drive_beat(io);
                    self.ready_at_edge = self.ready_now(io);
                    self.state = SendState::AwaitAccept;
                    return Suspend::OnClk(self.clk);
                }
                SendState::AwaitAccept => {
                    if !self.ready_at_edge {
                        self.ready_at_edge = self.ready_now(io);
                        return Suspend::OnClk(self.clk);
                    }
                    self.beat += 1;
                    if self.beat >= self.packet.beat_count(self.beat_bytes) {
                        self.idle(io);
                        self.state = SendState::Finished;
                        return Suspend::Done;
                    }
                    let gap = (self.packet.invalid_beats >> self.beat) & 1;
                    self.state = if gap != 0 {
                        SendState::Gap(1)
                    } else {
                        SendState::Drive
                    };
                }
                SendState::Finished => return Suspend::Done,
            }
        }
    }
}

struct BeatSample {
    valid: bool,
    data: VBits,
    sop: bool,
    eop: bool,
    empty: u64,
    error: bool,
    txid: u64,
}

/// Collects one packet from a DUT output stream. The result lands in
/// the shared cell when `Eop` (or the first beat, unframed) arrives.
pub struct PacketReceiver {
    pins: RxStreamPins,
    clk: ClockId,
    /// Bit `k` set deasserts `Ready` during receive cycle `k`.
    unready_beats: u64,
    result: Rc<RefCell<Option<SimPacket>>>,
    collected: Vec<u8>,
    txid: u64,
    error: bool,
    accepted: usize,
    cycles: u64,
    sample: Option<BeatSample>,
    ready_driven: bool,
}

impl PacketReceiver {
    pub fn new(
        pins: RxStreamPins,
        clk: ClockId,
        result: Rc<RefCell<Option<SimPacket>>>,
    ) -> PacketReceiver {
        PacketReceiver {
            pins,
            clk,
            unready_beats: 0,
            result,
            collected: Vec::new(),
            txid: 0,
            error: false,
            accepted: 0,
            cycles: 0,
            sample: None,
            ready_driven: false,
        }
    }

    pub fn with_unready_beats(mut self, mask: u64) -> Self {
        self.unready_beats = mask;
        self
    }

    fn sample_now(&self, io: &SimIo<'_>) -> BeatSample {
        let flag = |pin: &Option<OutputPin>, default: bool| match pin {
            Some(p) => io.peek_bool(p).unwrap_or(false),
            None => default,
        };
        let num = |pin: &Option<OutputPin>| match pin {
            Some(p) => io.peek_u64(p).unwrap_or(0),
            None => 0,
        };
        BeatSample {
            valid: flag(&self.pins.valid, true),
            data: io.peek(&self.pins.data),
            sop: flag(&self.pins.sop, false),
            eop: flag(&self.pins.eop, true),
            empty: num(&self.pins.empty),
            error: flag(&self.pins.error, false),
            txid: num(&self.pins.txid),
        }
    }
}

impl SimProcess for PacketReceiver {
    fn resume(&mut self, io: &mut SimIo<'_>) -> Suspend {
        // a beat sampled before the edge transferred if both sides held
        if let Some(s) = self.sample.take() {
            if s.valid && self.ready_driven {
                let beat_bytes = s.data.width() / 8;
                let drop = if s.eop { s.empty as usize } else { 0 };
                for j in 0..beat_bytes.saturating_sub(drop) {
                    let mut byte = 0u8;
                    for k in 0..8 {
                        if s.data.bit(j * 8 + k).0 {
                            byte |= 1 << k;
                        }
                    }
                    self.collected.push(byte);
                }
                self.accepted += 1;
                self.txid = s.txid;
                self.error = s.error;
                if s.eop {
                    *self.result.borrow_mut() = Some(SimPacket {
                        data: std::mem::take(&mut self.collected),
                        txid: self.txid,
                        error: self.error,
                        invalid_beats: 0,
                    });
                    if let Some(ready) = &self.pins.ready {
                        io.poke(ready, 0);
                    }
                    return Suspend::Done;
                }
            }
        }
        let be_ready = (self.unready_beats >> self.cycles.min(63)) & 1 == 0;
        self.cycles += 1;
        if let Some(ready) = &self.pins.ready {
            io.poke(ready, be_ready as u128);
        }
        self.ready_driven = be_ready || self.pins.ready.is_none();
        self.sample = Some(self.sample_now(io));
        Suspend::OnClk(self.clk)
    }
}
