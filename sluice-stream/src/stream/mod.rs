//! Ready/valid handshake channels with composable packet metas.
//!
//! A transfer happens on the beat where both `Valid` and `Ready` hold.
//! A missing `Valid` reads as always-valid, a missing `Ready` as
//! always-ready, and a missing `Eop` as an unframed stream. Producers
//! must not drop `Valid` before the beat is accepted and must hold the
//! payload stable over those cycles; `Ready` may be asserted
//! speculatively and must never depend combinationally on the same
//! stream's `Valid`.

use sluice_core::front::with_ctx;
use sluice_core::ir::graph::CombGraph;
use sluice_core::{
    reg_init, when, BVec, Bit, Bundle, DesignError, SignalValue, Source, Subnet, UInt,
};

#[derive(Clone)]
pub struct Stream<P: Bundle> {
    pub payload: P,
    pub valid: Option<Bit>,
    pub ready: Option<Bit>,
    pub sop: Option<Bit>,
    pub eop: Option<Bit>,
    /// Count of invalid bytes at the tail of the final beat.
    pub empty: Option<UInt>,
    pub error: Option<Bit>,
    pub txid: Option<UInt>,
}

impl<P: Bundle> Stream<P> {
    pub fn new(payload: P) -> Self {
        Stream {
            payload,
            valid: None,
            ready: None,
            sop: None,
            eop: None,
            empty: None,
            error: None,
            txid: None,
        }
    }

    #[track_caller]
    pub fn with_valid(mut self) -> Self {
        self.valid = Some(Bit::new());
        self
    }

    #[track_caller]
    pub fn with_ready(mut self) -> Self {
        self.ready = Some(Bit::new());
        self
    }

    /// Adds packet framing: `Sop` and `Eop`.
    #[track_caller]
    pub fn with_packet(mut self) -> Self {
        self.sop = Some(Bit::new());
        self.eop = Some(Bit::new());
        self
    }

    #[track_caller]
    pub fn with_empty(mut self, width: usize) -> Self {
        self.empty = Some(UInt::new(width));
        self
    }

    #[track_caller]
    pub fn with_error(mut self) -> Self {
        self.error = Some(Bit::new());
        self
    }

    #[track_caller]
    pub fn with_txid(mut self, width: usize) -> Self {
        self.txid = Some(UInt::new(width));
        self
    }

    /// `Valid`, defaulting to constant-true when absent.
    #[track_caller]
    pub fn valid_or_true(&self) -> Bit {
        self.valid.unwrap_or_else(Bit::high)
    }

    /// `Ready`, defaulting to constant-true when absent.
    #[track_caller]
    pub fn ready_or_true(&self) -> Bit {
        self.ready.unwrap_or_else(Bit::high)
    }

    /// High on the beat where the payload moves.
    #[track_caller]
    pub fn transfer(&self) -> Bit {
        self.valid_or_true() & self.ready_or_true()
    }

    /// All producer-to-consumer signals flattened, payload in the LSBs.
    /// Used by buffering primitives that store whole beats.
    #[track_caller]
    pub fn beat_bits(&self) -> BVec {
        let payload = self.payload.pack();
        let mut parts: Vec<&dyn Source> = vec![&payload as &dyn Source];
        let (sop, eop, error);
        if let Some(s) = &self.sop {
            sop = *s;
            parts.push(&sop);
        }
        if let Some(e) = &self.eop {
            eop = *e;
            parts.push(&eop);
        }
        if let Some(e) = &self.empty {
            parts.push(e);
        }
        if let Some(e) = &self.error {
            error = *e;
            parts.push(&error);
        }
        if let Some(t) = &self.txid {
            parts.push(t);
        }
        // first part in the LSBs
        let reversed: Vec<&dyn Source> = parts.into_iter().rev().collect();
        sluice_core::cat(&reversed)
    }

    /// Rebuilds a stream of this shape from flattened beat bits.
    #[track_caller]
    pub fn beat_from_bits(&self, bits: &BVec) -> Stream<P> {
        let mut offset = 0;
        let mut take = |w: usize| {
            let s = bits.slice(offset, w);
            offset += w;
            s
        };
        let payload = self.payload.unpack_from(&take(self.payload.width()));
        let sop = self.sop.map(|_| take(1).bit(0));
        let eop = self.eop.map(|_| take(1).bit(0));
        let empty = self
            .empty
            .map(|e| UInt::from_expr(take(SignalValue::width(&e)).read()));
        let error = self.error.map(|_| take(1).bit(0));
        let txid = self
            .txid
            .map(|t| UInt::from_expr(take(SignalValue::width(&t)).read()));
        Stream {
            payload,
            valid: None,
            ready: None,
            sop,
            eop,
            empty,
            error,
            txid,
        }
    }

    fn meta_width(&self) -> usize {
        self.payload.width()
            + self.sop.map_or(0, |_| 1)
            + self.eop.map_or(0, |_| 1)
            + self.empty.map_or(0, |e| SignalValue::width(&e))
            + self.error.map_or(0, |_| 1)
            + self.txid.map_or(0, |t| SignalValue::width(&t))
    }
}

/// Elaboration-time deadlock check: a combinational path from this
/// stream's `Valid` to its own `Ready` would need a combinational
/// cycle to close the handshake. Run it after the producer and
/// consumer are both wired.
pub fn check_handshake<P: Bundle>(stream: &Stream<P>) -> Result<(), DesignError> {
    let (Some(valid), Some(ready)) = (&stream.valid, &stream.ready) else {
        return Ok(());
    };
    let reaches = with_ctx(|ctx| {
        let subnet = Subnet::all(&ctx.circuit);
        let graph = CombGraph::build(&ctx.circuit, &subnet);
        graph.reaches(valid.node(), ready.node())
    });
    if reaches {
        Err(DesignError::HandshakeCycle)
    } else {
        Ok(())
    }
}

/// A one-element skid buffer: registers the forward signals and keeps
/// `Ready` free of same-stream `Valid` dependencies. Assigns the input
/// stream's `Ready`; returns the decoupled output stream.
#[track_caller]
pub fn reg_decouple<P: Bundle>(input: &mut Stream<P>) -> Stream<P> {
    let in_valid = input.valid_or_true();
    let out_ready = Bit::new();

    let mut buf_valid = Bit::new();
    let mut buf_data = BVec::new(input.meta_width());

    // accept whenever the buffer is empty or drains this beat
    let in_ready = !buf_valid | out_ready;
    if let Some(r) = &mut input.ready {
        r.assign(in_ready);
    }

    let take = in_valid & in_ready;
    let next_valid = take | (buf_valid & !out_ready);
    buf_valid.assign(reg_init(next_valid, 0));

    let beat = input.beat_bits();
    let held = sluice_core::mux(take, buf_data, beat);
    buf_data.assign(sluice_core::reg(held));

    let mut out = input.beat_from_bits(&buf_data);
    out.valid = Some(buf_valid);
    out.ready = Some(out_ready);
    out
}

/// Couples a stream through a FIFO: the producer side back-pressures on
/// `full`, the consumer side presents `Valid` from `empty`. Whole beats
/// (payload plus metas) are buffered, so packet framing survives.
#[track_caller]
pub fn fifo_stream<P: Bundle>(input: &mut Stream<P>, depth: usize) -> Stream<P> {
    let mut fifo = crate::fifo::Fifo::new(depth, input.meta_width());
    let in_valid = input.valid_or_true();
    let not_full = !fifo.full();
    if let Some(r) = &mut input.ready {
        r.assign(not_full);
    }
    let beat = input.beat_bits();
    when(in_valid & not_full, || {
        fifo.push(beat);
    });

    let out_ready = Bit::new();
    let out_valid = !fifo.empty();
    when(out_valid & out_ready, || {
        fifo.pop();
    });
    let head = fifo.peek();
    fifo.generate();

    let mut out = input.beat_from_bits(&head);
    out.valid = Some(out_valid);
    out.ready = Some(out_ready);
    out
}
