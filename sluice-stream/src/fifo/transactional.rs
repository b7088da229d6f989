//! The transactional FIFO: pushes and pops stay pending until they are
//! committed, and roll back to the last commit point on request. The
//! reader only sees committed pushes; the space of popped-but-
//! uncommitted beats stays pinned so a rollback can replay them. The
//! flags reflect the committed state.

use sluice_core::{mux, reg_init, sim_assert, BVec, Bit, DesignError, Memory, UInt};

use crate::fifo::ptr_width;

pub struct TransactionalFifo {
    depth: usize,
    word: usize,
    mem: Memory,
    push_valid: Bit,
    push_data: BVec,
    pop_ready: Bit,
    commit_push_req: Bit,
    rollback_push_req: Bit,
    commit_pop_req: Bit,
    rollback_pop_req: Bit,
    peek_data: BVec,
    full_flag: Bit,
    empty_flag: Bit,
    generated: bool,
}

impl TransactionalFifo {
    #[track_caller]
    pub fn new(depth: usize, word_width: usize) -> TransactionalFifo {
        if depth < 2 {
            panic!("{}", DesignError::FifoTooShallow { depth });
        }
        let depth = depth.next_power_of_two();
        let low = || {
            let mut b = Bit::new();
            b.assign(Bit::low());
            b
        };
        let mut push_data = BVec::new(word_width);
        push_data.assign(BVec::constant_bits(sluice_core::VBits::undef(word_width)));
        TransactionalFifo {
            depth,
            word: word_width,
            mem: Memory::new(depth, word_width),
            push_valid: low(),
            push_data,
            pop_ready: low(),
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

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn word_width(&self) -> usize {
        self.word
    }

    #[track_caller]
    pub fn push(&mut self, data: BVec) {
        self.check_open();
        self.push_valid.assign(Bit::high());
        self.push_data.assign(data);
    }

    #[track_caller]
    pub fn pop(&mut self) {
        self.check_open();
        self.pop_ready.assign(Bit::high());
    }

    pub fn peek(&self) -> BVec {
        self.peek_data
    }

    pub fn full(&self) -> Bit {
        self.full_flag
    }

    pub fn empty(&self) -> Bit {
        self.empty_flag
    }

    /// Publishes all pushes since the last commit point.
    #[track_caller]
    pub fn commit_push(&mut self) {
        self.check_open();
        self.commit_push_req.assign(Bit::high());
    }

    /// Discards all pushes since the last commit point.
    #[track_caller]
    pub fn rollback_push(&mut self) {
        self.check_open();
        self.rollback_push_req.assign(Bit::high());
    }

    /// Releases the space of all pops since the last commit point.
    #[track_caller]
    pub fn commit_pop(&mut self) {
        self.check_open();
        self.commit_pop_req.assign(Bit::high());
    }

    /// Rewinds the read side so uncommitted pops replay.
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

        let mut wr_pending = UInt::new(w).set_name("tfifo_wr_pending");
        let mut wr_committed = UInt::new(w).set_name("tfifo_wr_committed");
        let mut rd_pending = UInt::new(w).set_name("tfifo_rd_pending");
        let mut rd_committed = UInt::new(w).set_name("tfifo_rd_committed");

        // readers see committed pushes; writers respect committed pops
        let empty = rd_pending.is_eq(wr_committed);
        let wrap_bit = UInt::constant(self.depth as u128, w);
        let full = wr_pending.is_eq(rd_committed ^ wrap_bit);

        let do_push = self.push_valid & !full;
        let do_pop = self.pop_ready & !empty;

        // a rollback in the same cycle wins over the push
        let wr_p_stepped = mux(do_push, wr_pending, wr_pending + 1);
        let wr_p_next = mux(self.rollback_push_req, wr_p_stepped, wr_committed);
        let wr_c_next = mux(self.commit_push_req, wr_committed, wr_p_next);
        wr_pending.assign(reg_init(wr_p_next, 0));
        wr_committed.assign(reg_init(wr_c_next, 0));

        let rd_p_stepped = mux(do_pop, rd_pending, rd_pending + 1);
        let rd_p_next = mux(self.rollback_pop_req, rd_p_stepped, rd_committed);
        let rd_c_next = mux(self.commit_pop_req, rd_committed, rd_p_next);
        rd_pending.assign(reg_init(rd_p_next, 0));
        rd_committed.assign(reg_init(rd_c_next, 0));

        self.mem
            .write_en(wr_pending.slice(0, aw), self.push_data, do_push);
        self.peek_data.assign(self.mem.read(rd_pending.slice(0, aw)));

        self.empty_flag.assign(empty);
        self.full_flag.assign(full);

        sim_assert(!(self.push_valid & full), "push into full transactional fifo");
        sim_assert(!(self.pop_ready & empty), "pop from empty transactional fifo");
    }
}
