//! A bank of logical FIFOs sharing one memory. The push side and the
//! pop side each address one logical FIFO through a selector; flags
//! and commit/rollback follow the selected FIFO, with the same
//! transactional semantics as the single transactional FIFO.

use sluice_core::{
    cat, mux, reg_init, sim_assert, BVec, Bit, DesignError, Memory, SignalValue, Source, UInt,
};

use crate::fifo::ptr_width;

pub struct FifoArray {
    fifos: usize,
    depth: usize,
    word: usize,
    mem: Memory,
    push_valid: Bit,
    push_data: BVec,
    push_sel: UInt,
    pop_ready: Bit,
    pop_sel: UInt,
    commit_push_req: Bit,
    rollback_push_req: Bit,
    commit_pop_req: Bit,
    rollback_pop_req: Bit,
    peek_data: BVec,
    full_flag: Bit,
    empty_flag: Bit,
    generated: bool,
}

impl FifoArray {
    /// `fifos` logical FIFOs of `depth` elements each, sharing one
    /// memory of `fifos * depth` words.
    #[track_caller]
    pub fn new(fifos: usize, depth: usize, word_width: usize) -> FifoArray {
        if depth < 2 {
            panic!("{}", DesignError::FifoTooShallow { depth });
        }
        let fifos = fifos.next_power_of_two();
        let depth = depth.next_power_of_two();
        let low = || {
            let mut b = Bit::new();
            b.assign(Bit::low());
            b
        };
        let sel_w = sel_width(fifos);
        let sel_zero = |_name: &str| {
            let mut s = UInt::new(sel_w);
            s.assign(UInt::constant(0, sel_w));
            s
        };
        let mut push_data = BVec::new(word_width);
        push_data.assign(BVec::constant_bits(sluice_core::VBits::undef(word_width)));
        FifoArray {
            fifos,
            depth,
            word: word_width,
            mem: Memory::new(fifos * depth, word_width),
            push_valid: low(),
            push_data,
            push_sel: sel_zero("push_sel"),
            pop_ready: low(),
            pop_sel: sel_zero("pop_sel"),
            commit_push_req: low(),
            rollback_push_req: low(),
            commit_pop_req: low(),
            rollback_pop_req: low(),
            peek_data: BVec::new(word_width),
            full_flag: Bit::new(),
            empty_flag: Bit::new(),
            generated: false,
        }
    }

    pub fn fifo_count(&self) -> usize {
        self.fifos
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enqueues into the selected logical FIFO.
    #[track_caller]
    pub fn push(&mut self, sel: UInt, data: BVec) {
        self.check_open();
        self.push_valid.assign(Bit::high());
        self.push_sel.assign(sel);
        self.push_data.assign(data);
    }

    /// Dequeues from the selected logical FIFO.
    #[track_caller]
    pub fn pop(&mut self, sel: UInt) {
        self.check_open();
        self.pop_ready.assign(Bit::high());
        self.pop_sel.assign(sel);
    }

    /// Addresses the pop side without popping, for `peek`/`empty`.
    #[track_caller]
    pub fn select_pop(&mut self, sel: UInt) {
        self.check_open();
        self.pop_sel.assign(sel);
    }

    /// Head of the pop-selected FIFO.
    pub fn peek(&self) -> BVec {
        self.peek_data
    }

    /// Full flag of the push-selected FIFO.
    pub fn full(&self) -> Bit {
        self.full_flag
    }

    /// Empty flag of the pop-selected FIFO.
    pub fn empty(&self) -> Bit {
        self.empty_flag
    }

    #[track_caller]
    pub fn commit_push(&mut self) {
        self.check_open();
        self.commit_push_req.assign(Bit::high());
    }

    #[track_caller]
    pub fn rollback_push(&mut self) {
        self.check_open();
        self.rollback_push_req.assign(Bit::high());
    }

    #[track_caller]
    pub fn commit_pop(&mut self) {
        self.check_open();
        self.commit_pop_req.assign(Bit::high());
    }

    #[track_caller]
    pub fn rollback_pop(&mut self) {
        self.check_open();
        self.rollback_pop_req.assign(Bit::high());
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
        let wrap_bit = UInt::constant(self.depth as u128, w);

        let mut wr_heads: Vec<UInt> = Vec::new();
        let mut rd_heads: Vec<UInt> = Vec::new();
        let mut fulls: Vec<Bit> = Vec::new();
        let mut empties: Vec<Bit> = Vec::new();

        for i in 0..self.fifos {
            let mut wr_pending = UInt::new(w);
            let mut wr_committed = UInt::new(w);
            let mut rd_pending = UInt::new(w);
            let mut rd_committed = UInt::new(w);

            let empty = rd_pending.is_eq(wr_committed);
            let full = wr_pending.is_eq(rd_committed ^ wrap_bit);

            let push_here = self.push_sel.eq_const(i as u128);
            let pop_here = self.pop_sel.eq_const(i as u128);
            let do_push = self.push_valid & push_here & !full;
            let do_pop = self.pop_ready & pop_here & !empty;

            let wr_p_stepped = mux(do_push, wr_pending, wr_pending + 1);
            let wr_p_next = mux(self.rollback_push_req & push_here, wr_p_stepped, wr_committed);
            let wr_c_next = mux(self.commit_push_req & push_here, wr_committed, wr_p_next);
            wr_pending.assign(reg_init(wr_p_next, 0));
            wr_committed.assign(reg_init(wr_c_next, 0));

            let rd_p_stepped = mux(do_pop, rd_pending, rd_pending + 1);
            let rd_p_next = mux(self.rollback_pop_req & pop_here, rd_p_stepped, rd_committed);
            let rd_c_next = mux(self.commit_pop_req & pop_here, rd_committed, rd_p_next);
            rd_pending.assign(reg_init(rd_p_next, 0));
            rd_committed.assign(reg_init(rd_c_next, 0));

            wr_heads.push(wr_pending);
            rd_heads.push(rd_pending);
            fulls.push(full);
            empties.push(empty);
        }

        let wr_head = mux_index(self.push_sel, &wr_heads);
        let rd_head = mux_index(self.pop_sel, &rd_heads);
        let full = mux_index_bit(self.push_sel, &fulls);
        let empty = mux_index_bit(self.pop_sel, &empties);

        // shared memory addressed as {selector, per-fifo offset}
        let wr_off = wr_head.slice(0, aw);
        let rd_off = rd_head.slice(0, aw);
        let wr_addr = UInt::from_expr(cat(&[&self.push_sel as &dyn Source, &wr_off]).read());
        let rd_addr = UInt::from_expr(cat(&[&self.pop_sel as &dyn Source, &rd_off]).read());

        let do_push = self.push_valid & !full;
        self.mem.write_en(wr_addr, self.push_data, do_push);
        self.peek_data.assign(self.mem.read(rd_addr));

        self.full_flag.assign(full);
        self.empty_flag.assign(empty);

        sim_assert(!(self.push_valid & full), "push into full fifo bank");
        sim_assert(!(self.pop_ready & empty), "pop from empty fifo bank");
    }
}

fn sel_width(fifos: usize) -> usize {
    (usize::BITS - (fifos - 1).leading_zeros()).max(1) as usize
}

#[track_caller]
fn mux_index(sel: UInt, items: &[UInt]) -> UInt {
    let mut out = items[0];
    for (i, item) in items.iter().enumerate().skip(1) {
        out = mux(sel.eq_const(i as u128), out, *item);
    }
    out
}

#[track_caller]
fn mux_index_bit(sel: UInt, items: &[Bit]) -> Bit {
    let mut out = items[0];
    for (i, item) in items.iter().enumerate().skip(1) {
        out = mux(sel.eq_const(i as u128), out, *item);
    }
    out
}
