//! The single-clock FIFO primitive. Pointer arithmetic uses the
//! extra-bit scheme: pointers are one bit wider than the address, the
//! flags compare full pointers, and the fill level is their wrapping
//! difference.

pub mod dual_clock;
pub mod fifo_array;
pub mod transactional;

pub use dual_clock::DualClockFifo;
pub use fifo_array::FifoArray;
pub use transactional::TransactionalFifo;

use sluice_core::{
    mux, reg, reg_init, sim_assert, BVec, Bit, DesignError, Memory, SignalValue, UInt,
};

/// How many cycles after the flags a popped word becomes visible.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FifoLatency {
    /// Combinational read; the head is visible the cycle it is written.
    Fallthrough,
    /// Synchronous block-ram read.
    One,
    /// Block-ram read with an output register.
    Two,
    /// The implementation picks; currently fallthrough.
    DontCare,
}

pub struct Fifo {
    depth: usize,
    word: usize,
    latency: FifoLatency,
    mem: Memory,
    push_valid: Bit,
    push_data: BVec,
    pop_ready: Bit,
    peek_data: BVec,
    full_flag: Bit,
    empty_flag: Bit,
    level_sig: UInt,
    generated: bool,
}

impl Fifo {
    #[track_caller]
    pub fn new(depth: usize, word_width: usize) -> Fifo {
        Fifo::with_latency(depth, word_width, FifoLatency::Fallthrough)
    }

    #[track_caller]
    pub fn with_latency(depth: usize, word_width: usize, latency: FifoLatency) -> Fifo {
        if depth < 2 {
            panic!("{}", DesignError::FifoTooShallow { depth });
        }
        let requested = depth;
        let depth = depth.next_power_of_two();
        if depth != requested {
            log::debug!(target: "sluice", "fifo depth rounded from {requested} to {depth}");
        }
        let mut push_valid = Bit::new();
        push_valid.assign(Bit::low());
        let mut push_data = BVec::new(word_width);
        push_data.assign(BVec::constant_bits(sluice_core::VBits::undef(word_width)));
        let mut pop_ready = Bit::new();
        pop_ready.assign(Bit::low());
        Fifo {
            depth,
            word: word_width,
            latency,
            mem: Memory::new(depth, word_width),
            push_valid,
            push_data,
            pop_ready,
            peek_data: BVec::new(word_width),
            full_flag: Bit::new(),
            empty_flag: Bit::new(),
            level_sig: UInt::new(ptr_width(depth)),
            generated: false,
        }
    }

    /// Rounded-up actual depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn word_width(&self) -> usize {
        self.word
    }

    /// Requests an enqueue this cycle; honour the enclosing conditional
    /// scope, so `when(c, || fifo.push(x))` is a guarded push.
    #[track_caller]
    pub fn push(&mut self, data: BVec) {
        self.check_open();
        self.push_valid.assign(Bit::high());
        self.push_data.assign(data);
    }

    /// Requests a dequeue this cycle.
    #[track_caller]
    pub fn pop(&mut self) {
        self.check_open();
        self.pop_ready.assign(Bit::high());
    }

    /// The head word, without removing it.
    pub fn peek(&self) -> BVec {
        self.peek_data
    }

    pub fn full(&self) -> Bit {
        self.full_flag
    }

    pub fn empty(&self) -> Bit {
        self.empty_flag
    }

    pub fn level(&self) -> UInt {
        self.level_sig
    }

    /// Level-accurate threshold: high while at most `n` words are held.
    #[track_caller]
    pub fn almost_empty(&self, n: usize) -> Bit {
        self.level_sig
            .is_le(UInt::constant(n as u128, ptr_width(self.depth)))
    }

    /// High while at least `n` words are held.
    #[track_caller]
    pub fn almost_full(&self, n: usize) -> Bit {
        self.level_sig
            .is_ge(UInt::constant(n as u128, ptr_width(self.depth)))
    }

    #[track_caller]
    fn check_open(&self) {
        if self.generated {
            panic!("{}", DesignError::FifoSealed);
        }
    }

    /// Builds the pointer and memory logic in the current clock scope.
    /// The FIFO is sealed afterwards.
    #[track_caller]
    pub fn generate(&mut self) {
        self.check_open();
        self.generated = true;
        let w = ptr_width(self.depth);
        let aw = w - 1;

        let mut wr_ptr = UInt::new(w).set_name("fifo_wr_ptr");
        let mut rd_ptr = UInt::new(w).set_name("fifo_rd_ptr");

        let empty = wr_ptr.is_eq(rd_ptr);
        let wrap_bit = UInt::constant(self.depth as u128, w);
        let full = wr_ptr.is_eq(rd_ptr ^ wrap_bit);

        let do_push = self.push_valid & !full;
        let do_pop = self.pop_ready & !empty;

        wr_ptr.assign(reg_init(mux(do_push, wr_ptr, wr_ptr + 1), 0));
        let rd_next = mux(do_pop, rd_ptr, rd_ptr + 1);
        rd_ptr.assign(reg_init(rd_next, 0));

        self.mem
            .write_en(wr_ptr.slice(0, aw), self.push_data, do_push);

        let head = match self.latency {
            FifoLatency::Fallthrough | FifoLatency::DontCare => self.mem.read(rd_ptr.slice(0, aw)),
            FifoLatency::One => reg(self.mem.read(rd_next.slice(0, aw))),
            FifoLatency::Two => reg(reg(self.mem.read(rd_next.slice(0, aw)))),
        };
        self.peek_data.assign(head);

        self.empty_flag.assign(empty);
        self.full_flag.assign(full);
        self.level_sig.assign(wr_ptr - rd_ptr);

        sim_assert(!(self.push_valid & full), "push into full fifo");
        sim_assert(!(self.pop_ready & empty), "pop from empty fifo");
    }
}

pub(crate) fn ptr_width(depth: usize) -> usize {
    (usize::BITS - (depth - 1).leading_zeros()) as usize + 1
}

/// `x ^ (x >> 1)`: binary to Gray.
#[track_caller]
pub(crate) fn bin2gray(x: UInt) -> UInt {
    x ^ (x >> 1)
}

/// Gray to binary by xor-folding the high bits onto each position.
#[track_caller]
pub(crate) fn gray2bin(g: UInt) -> UInt {
    let w = SignalValue::width(&g);
    let mut b = g;
    for k in 1..w {
        b = b ^ (g >> k);
    }
    b
}

#[cfg(test)]
mod tests {
    use super::ptr_width;

    #[test]
    fn pointer_widths() {
        assert_eq!(ptr_width(2), 2);
        assert_eq!(ptr_width(4), 3);
        assert_eq!(ptr_width(16), 5);
    }
}
