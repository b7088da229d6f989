//! The dual-clock FIFO. Each side keeps a binary pointer and publishes
//! it Gray-coded; the opposite side folds the two-stage-synchronised
//! Gray value back to binary for its flags. Flags are therefore
//! conservative: they deassert late but never early. The almost-empty
//! threshold is evaluated on the read clock, almost-full on the write
//! clock.

use sluice_core::{
    mux, reg_init, sim_assert, synchronize, BVec, Bit, Clock, DesignError, Memory, UInt,
};

use crate::fifo::{bin2gray, gray2bin, ptr_width};

pub struct DualClockFifo {
    depth: usize,
    word: usize,
    wr_clk: Clock,
    rd_clk: Clock,
    mem: Memory,
    push_valid: Bit,
    push_data: BVec,
    pop_ready: Bit,
    peek_data: BVec,
    full_flag: Bit,
    empty_flag: Bit,
    wr_level: UInt,
    rd_level: UInt,
    generated: bool,
}

impl DualClockFifo {
    #[track_caller]
    pub fn new(depth: usize, word_width: usize, wr_clk: Clock, rd_clk: Clock) -> DualClockFifo {
        if depth < 2 {
            panic!("{}", DesignError::FifoTooShallow { depth });
        }
        let depth = depth.next_power_of_two();
        let w = ptr_width(depth);
        let low = || {
            let mut b = Bit::new();
            b.assign(Bit::low());
            b
        };
        let mut push_data = BVec::new(word_width);
        push_data.assign(BVec::constant_bits(sluice_core::VBits::undef(word_width)));
        DualClockFifo {
            depth,
            word: word_width,
            wr_clk,
            rd_clk,
            mem: Memory::new(depth, word_width),
            push_valid: low(),
            push_data,
            pop_ready: low(),
            peek_data: BVec::new(word_width),
            full_flag: Bit::new(),
            empty_flag: Bit::new(),
            wr_level: UInt::new(w),
            rd_level: UInt::new(w),
            generated: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn word_width(&self) -> usize {
        self.word
    }

    /// Enqueue request, synchronous to the write clock.
    #[track_caller]
    pub fn push(&mut self, data: BVec) {
        self.check_open();
        self.push_valid.assign(Bit::high());
        self.push_data.assign(data);
    }

    /// Dequeue request, synchronous to the read clock.
    #[track_caller]
    pub fn pop(&mut self) {
        self.check_open();
        self.pop_ready.assign(Bit::high());
    }

    pub fn peek(&self) -> BVec {
        self.peek_data
    }

    /// Write-side flag, on the write clock.
    pub fn full(&self) -> Bit {
        self.full_flag
    }

    /// Read-side flag, on the read clock.
    pub fn empty(&self) -> Bit {
        self.empty_flag
    }

    /// Evaluated on the write clock.
    #[track_caller]
    pub fn almost_full(&self, n: usize) -> Bit {
        self.wr_level
            .is_ge(UInt::constant(n as u128, ptr_width(self.depth)))
    }

    /// Evaluated on the read clock.
    #[track_caller]
    pub fn almost_empty(&self, n: usize) -> Bit {
        self.rd_level
            .is_le(UInt::constant(n as u128, ptr_width(self.depth)))
    }

    #[track_caller]
    fn check_open(&self) {
        if self.generated {
            panic!("{}", DesignError::FifoSealed);
        }
    }

    #[track_caller]
    pub fn generate(&mut self) {
        self.check_open();
        self.generated = true;
        let w = ptr_width(self.depth);
        let aw = w - 1;

        // published Gray pointers; each side closes its own loop
        let mut wr_gray = UInt::new(w).set_name("dcfifo_wr_gray");
        let mut rd_gray = UInt::new(w).set_name("dcfifo_rd_gray");

        {
            let _wr = self.wr_clk.scope();
            let mut wr_ptr = UInt::new(w).set_name("dcfifo_wr_ptr");
            let rd_gray_sync = synchronize(rd_gray, 2);
            let rd_bin_sync = gray2bin(rd_gray_sync);
            let level = wr_ptr - rd_bin_sync;
            let full = level.eq_const(self.depth as u128);

            let do_push = self.push_valid & !full;
            let wr_next = mux(do_push, wr_ptr, wr_ptr + 1);
            wr_ptr.assign(reg_init(wr_next, 0));
            wr_gray.assign(reg_init(bin2gray(wr_next), 0));

            self.mem
                .write_en(wr_ptr.slice(0, aw), self.push_data, do_push);

            self.full_flag.assign(full);
            self.wr_level.assign(level);

            sim_assert(!(self.push_valid & full), "push into full dual-clock fifo");
        }

        {
            let _rd = self.rd_clk.scope();
            let mut rd_ptr = UInt::new(w).set_name("dcfifo_rd_ptr");
            let wr_gray_sync = synchronize(wr_gray, 2);
            let wr_bin_sync = gray2bin(wr_gray_sync);
            let level = wr_bin_sync - rd_ptr;
            let empty = rd_ptr.is_eq(wr_bin_sync);

            let do_pop = self.pop_ready & !empty;
            let rd_next = mux(do_pop, rd_ptr, rd_ptr + 1);
            rd_ptr.assign(reg_init(rd_next, 0));
            rd_gray.assign(reg_init(bin2gray(rd_next), 0));

            self.peek_data.assign(self.mem.read(rd_ptr.slice(0, aw)));

            self.empty_flag.assign(empty);
            self.rd_level.assign(level);

            sim_assert(!(self.pop_ready & empty), "pop from empty dual-clock fifo");
        }
    }
}
