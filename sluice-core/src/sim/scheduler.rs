//! The discrete-event scheduler: drives the evaluation plan through
//! simulation time, multiplexing user processes against clock edges.
//!
//! Event handling order is fixed and observable: capture, advance,
//! settle, resume waiting processes in fork order, settle again,
//! check assertions, record the waveform sample.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::error::SimError;
use crate::front::pin::{InputPin, OutputPin};
use crate::ir::circuit::Circuit;
use crate::ir::clock::ClockId;
use crate::ir::node::{
    read_port_in, reg_in, write_port_in, CollisionPolicy, NodeId, NodeKind, OutputRef,
};
use crate::logic::VBits;
use crate::sim::eval::eval_combinational;
use crate::sim::plan::{EvalPlan, SimState};
use crate::sim::process::{SimProcess, SimTime, Suspend};
use crate::sim::wave::WaveRecorder;

/// Where a process is parked.
enum Waiting {
    Start,
    Clock(ClockId),
    Time,
    Settle,
    Done,
}

struct ProcSlot {
    process: Box<dyn SimProcess>,
    waiting: Waiting,
}

#[derive(Default)]
struct EventSlot {
    edges: Vec<ClockId>,
    wakes: Vec<usize>,
}

/// Anything a process can sample.
pub trait Probe {
    fn probe_ref(&self, circuit: &Circuit) -> Option<OutputRef>;
}

impl Probe for InputPin {
    fn probe_ref(&self, _circuit: &Circuit) -> Option<OutputRef> {
        Some(OutputRef::new(self.id(), 0))
    }
}

impl Probe for OutputPin {
    fn probe_ref(&self, circuit: &Circuit) -> Option<OutputRef> {
        circuit.node(self.id()).input(0)
    }
}

pub struct Simulation<'c> {
    circuit: &'c Circuit,
    plan: EvalPlan,
    state: SimState,
    procs: Vec<ProcSlot>,
    queue: BTreeMap<SimTime, EventSlot>,
    time: SimTime,
    stopped: bool,
    failure: Option<SimError>,
    recorder: Option<WaveRecorder>,
    started: bool,
    pending_forks: Vec<Box<dyn SimProcess>>,
}

/// The process-facing surface: sampling, pin driving, forking, and
/// stopping. Pin writes take effect immediately in the state buffer
/// but the combinational cone only re-converges at the process's next
/// suspension point.
pub struct SimIo<'a> {
    circuit: &'a Circuit,
    plan: &'a EvalPlan,
    state: &'a mut SimState,
    time: SimTime,
    stopped: &'a mut bool,
    failure: &'a mut Option<SimError>,
    forks: &'a mut Vec<Box<dyn SimProcess>>,
}

impl<'a> SimIo<'a> {
    pub fn peek(&self, probe: &impl Probe) -> VBits {
        match probe.probe_ref(self.circuit) {
            Some(port) => self.state.read(self.plan, port),
            None => VBits::undef(0),
        }
    }

    pub fn peek_u64(&self, probe: &impl Probe) -> Option<u64> {
        self.peek(probe).as_u64()
    }

    pub fn peek_bool(&self, probe: &impl Probe) -> Option<bool> {
        self.peek(probe).as_bool()
    }

    pub fn poke(&mut self, pin: &InputPin, value: u128) {
        let bits = VBits::from_u128(value, pin.kind().width());
        self.poke_bits(pin, bits);
    }

    pub fn poke_bits(&mut self, pin: &InputPin, bits: VBits) {
        self.state
            .write(self.plan, OutputRef::new(pin.id(), 0), &bits);
    }

    /// Marks every bit of the pin undefined.
    pub fn poke_undefined(&mut self, pin: &InputPin) {
        let bits = VBits::undef(pin.kind().width());
        self.poke_bits(pin, bits);
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn time_ps(&self) -> u64 {
        (self.time.numer() / self.time.denom()) as u64
    }

    /// Launches another process; it runs its first segment within the
    /// current event, after the caller suspends.
    pub fn fork(&mut self, process: impl SimProcess + 'static) {
        self.forks.push(Box::new(process));
    }

    /// Halts the whole simulation after the current event.
    pub fn stop(&mut self) {
        *self.stopped = true;
    }

    /// Records a failed check; the run terminates with an error.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.failure.is_none() {
            *self.failure = Some(SimError::CheckFailed {
                message: message.into(),
                time_ps: (self.time.numer() / self.time.denom()) as u64,
            });
        }
        *self.stopped = true;
    }

    /// `fail`s unless the condition holds.
    pub fn check(&mut self, cond: bool, message: impl Into<String>) {
        if !cond {
            self.fail(message);
        }
    }
}

impl<'c> Simulation<'c> {
    pub fn new(circuit: &'c Circuit) -> Result<Simulation<'c>, SimError> {
        let plan = EvalPlan::build(circuit)?;
        let state = SimState::new(&plan);
        let mut sim = Simulation {
            circuit,
            plan,
            state,
            procs: Vec::new(),
            queue: BTreeMap::new(),
            time: SimTime::from_integer(0),
            stopped: false,
            failure: None,
            recorder: None,
            started: false,
            pending_forks: Vec::new(),
        };
        let clock_ids: Vec<ClockId> = circuit.iter_clocks().map(|c| c.id).collect();
        for clk in clock_ids {
            let period = circuit.clock(clk).period_ps();
            sim.queue.entry(period).or_default().edges.push(clk);
        }
        Ok(sim)
    }

    pub fn add_process(&mut self, process: impl SimProcess + 'static) {
        self.procs.push(ProcSlot {
            process: Box::new(process),
            waiting: Waiting::Start,
        });
    }

    /// Attaches a waveform recorder sampling every named signal, pin
    /// and register at every event.
    pub fn record_waves(&mut self) {
        self.recorder = Some(WaveRecorder::new(self.circuit, &self.plan));
    }

    pub fn take_recorder(&mut self) -> Option<WaveRecorder> {
        self.recorder.take()
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn peek(&self, probe: &impl Probe) -> VBits {
        match probe.probe_ref(self.circuit) {
            Some(port) => self.state.read(&self.plan, port),
            None => VBits::undef(0),
        }
    }

    /// Runs until the given simulation time, a stop request, or a
    /// failure. The simulator is not restartable after an error.
    pub fn run(&mut self, until: SimTime) -> Result<(), SimError> {
        if !self.started {
            self.started = true;
            self.initialise()?;
        }
        while !self.stopped {
            let Some((&t, _)) = self.queue.iter().next() else {
                break;
            };
            if t > until {
                break;
            }
            let slot = self.queue.remove(&t).unwrap();
            self.time = t;
            self.handle_event(slot)?;
            if let Some(failure) = self.failure.take() {
                return Err(failure);
            }
        }
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        Ok(())
    }

    fn initialise(&mut self) -> Result<(), SimError> {
        self.settle();
        // power-on: registers come up in their reset value
        let regs: Vec<NodeId> = self
            .plan
            .seq_by_clock
            .values()
            .flatten()
            .copied()
            .collect();
        for id in regs {
            let node = self.circuit.node(id);
            match node.kind {
                NodeKind::Register(_) => {
                    if let Some(reset) = node.input(reg_in::RESET_VALUE) {
                        let v = self.state.read(&self.plan, reset);
                        self.state.write(&self.plan, OutputRef::new(id, 0), &v);
                    }
                }
                NodeKind::Prng { seed } => {
                    self.state.prng.insert(id, seed | 1);
                }
                _ => {}
            }
        }
        self.settle();
        let ready: Vec<usize> = (0..self.procs.len()).collect();
        self.resume_batch(&ready)?;
        self.settle_phase()?;
        self.record_sample();
        Ok(())
    }

    fn handle_event(&mut self, slot: EventSlot) -> Result<(), SimError> {
        if !slot.edges.is_empty() {
            self.clock_edges(&slot.edges);
            self.settle();
        }
        // reschedule the periodic edges
        for clk in &slot.edges {
            let period = self.circuit.clock(*clk).period_ps();
            let next = self.time + period;
            self.queue.entry(next).or_default().edges.push(*clk);
        }
        let mut ready: Vec<usize> = slot.wakes;
        for (idx, proc) in self.procs.iter().enumerate() {
            if let Waiting::Clock(c) = proc.waiting {
                if slot.edges.contains(&c) {
                    ready.push(idx);
                }
            }
        }
        ready.sort();
        ready.dedup();
        self.resume_batch(&ready)?;
        self.settle_phase()?;
        self.check_assertions(&slot.edges)?;
        self.record_sample();
        Ok(())
    }

    /// Capture-then-advance over every sequential node of the edged
    /// clocks. All captures see pre-edge state; there is no observable
    /// intermediate state.
    fn clock_edges(&mut self, edges: &[ClockId]) {
        struct PendingWrite {
            memory: NodeId,
            addr: VBits,
            data: VBits,
            enable: VBits,
        }
        struct PendingRead {
            port: NodeId,
            addr: VBits,
            pre_value: VBits,
            policy: CollisionPolicy,
            latency: usize,
        }
        let mut writes: Vec<PendingWrite> = Vec::new();
        let mut reads: Vec<PendingRead> = Vec::new();

        // capture
        for clk in edges {
            let Some(nodes) = self.plan.seq_by_clock.get(clk) else {
                continue;
            };
            for &id in nodes.clone().iter() {
                let node = self.circuit.node(id);
                match &node.kind {
                    NodeKind::Register(_) => {
                        let w = node.outputs[0].width();
                        let data = match node.input(reg_in::DATA) {
                            Some(src) => self.state.read(&self.plan, src),
                            None => VBits::undef(w),
                        };
                        let enable = node
                            .input(reg_in::ENABLE)
                            .map(|src| self.state.read(&self.plan, src));
                        let current = self.state.read(&self.plan, OutputRef::new(id, 0));
                        let next = match enable.as_ref().map(|e| e.as_bool()) {
                            None | Some(Some(true)) => data,
                            Some(Some(false)) => current,
                            Some(None) => VBits::undef(w),
                        };
                        self.state.next.insert(id, next);
                    }
                    NodeKind::Synchronizer { stages } => {
                        let w = node.outputs[0].width();
                        let input = match node.input(0) {
                            Some(src) => self.state.read(&self.plan, src),
                            None => VBits::undef(w),
                        };
                        let chain = self
                            .state
                            .chains
                            .entry(id)
                            .or_insert_with(|| vec![VBits::undef(w); (*stages).max(1)]);
                        let out = chain.last().cloned().unwrap();
                        chain.rotate_right(1);
                        chain[0] = input;
                        self.state.next.insert(id, out);
                    }
                    NodeKind::WritePort { memory } => {
                        let word = self.state.mems[memory].word_width();
                        let addr = match node.input(write_port_in::ADDR) {
                            Some(src) => self.state.read(&self.plan, src),
                            None => VBits::undef(1),
                        };
                        let data = match node.input(write_port_in::DATA) {
                            Some(src) => self.state.read(&self.plan, src),
                            None => VBits::undef(word),
                        };
                        let enable = match node.input(write_port_in::ENABLE) {
                            Some(src) => self.state.read(&self.plan, src),
                            None => VBits::from_bool(true),
                        };
                        writes.push(PendingWrite {
                            memory: *memory,
                            addr,
                            data,
                            enable,
                        });
                    }
                    NodeKind::ReadPort {
                        memory,
                        sync: true,
                        latency,
                        collision,
                    } => {
                        let enable = node
                            .input(read_port_in::ENABLE)
                            .map(|src| self.state.read(&self.plan, src));
                        if let Some(Some(false)) = enable.as_ref().map(|e| e.as_bool()) {
                            continue;
                        }
                        let addr = match node.input(read_port_in::ADDR) {
                            Some(src) => self.state.read(&self.plan, src),
                            None => VBits::undef(1),
                        };
                        let pre_value = self.read_memory(*memory, &addr);
                        reads.push(PendingRead {
                            port: id,
                            addr,
                            pre_value,
                            policy: *collision,
                            latency: *latency,
                        });
                    }
                    NodeKind::Prng { .. } => {
                        let w = node.outputs[0].width();
                        let s = self.state.prng.get_mut(&id).expect("prng seeded at init");
                        let mut bits = VBits::zero(w);
                        let mut word = 0u64;
                        for i in 0..w {
                            if i % 64 == 0 {
                                word = xorshift64(s);
                            }
                            bits.value[i] = (word >> (i % 64)) & 1 != 0;
                        }
                        self.state.next.insert(id, bits);
                    }
                    _ => {}
                }
            }
        }

        // advance: promote captured state
        let captured: Vec<(NodeId, VBits)> = self.state.next.drain().collect();
        for (id, bits) in captured {
            self.state.write(&self.plan, OutputRef::new(id, 0), &bits);
        }

        // apply memory writes
        for w in writes {
            match w.enable.as_bool() {
                Some(false) => {}
                Some(true) => match w.addr.as_u64() {
                    Some(addr) => {
                        if let Some(mem) = self.state.mems.get_mut(&w.memory) {
                            mem.write_word(addr, &w.data);
                        }
                    }
                    // a write at an undefined address can land anywhere
                    None => {
                        if let Some(mem) = self.state.mems.get_mut(&w.memory) {
                            mem.poison();
                        }
                    }
                },
                None => {
                    if let Some(mem) = self.state.mems.get_mut(&w.memory) {
                        mem.poison();
                    }
                }
            }
        }

        // resolve synchronous reads against the collision policy
        for r in reads {
            let node = self.circuit.node(r.port);
            let NodeKind::ReadPort { memory, .. } = node.kind else {
                unreachable!()
            };
            let stage1 = match r.policy {
                CollisionPolicy::WriteBeforeRead => self.read_memory(memory, &r.addr),
                _ => r.pre_value,
            };
            let out = if r.latency >= 2 {
                let prev = self
                    .state
                    .stage2
                    .insert(r.port, stage1)
                    .unwrap_or_else(|| VBits::undef(node.outputs[0].width()));
                prev
            } else {
                stage1
            };
            self.state.write(&self.plan, OutputRef::new(r.port, 0), &out);
        }
    }

    fn read_memory(&self, memory: NodeId, addr: &VBits) -> VBits {
        let mem = &self.state.mems[&memory];
        match addr.as_u64() {
            Some(a) => {
                let NodeKind::Memory { depth, .. } = self.circuit.node(memory).kind else {
                    unreachable!()
                };
                if (a as usize) < depth {
                    mem.read_word(a)
                } else {
                    VBits::undef(mem.word_width())
                }
            }
            None => VBits::undef(mem.word_width()),
        }
    }

    /// One pass over the combinational order; sufficient for a fix
    /// point because the graph is acyclic.
    fn settle(&mut self) {
        for id in self.plan.comb_order.clone() {
            let node = self.circuit.node(id);
            let outs: SmallVec<[VBits; 2]> = match &node.kind {
                NodeKind::ReadPort {
                    memory,
                    sync: false,
                    ..
                } => {
                    let addr = match node.input(read_port_in::ADDR) {
                        Some(src) => self.state.read(&self.plan, src),
                        None => VBits::undef(1),
                    };
                    [self.read_memory(*memory, &addr)].into_iter().collect()
                }
                _ => {
                    let state = &self.state;
                    let plan = &self.plan;
                    eval_combinational(self.circuit, node, &mut |r| state.read(plan, r))
                }
            };
            for (port, v) in outs.iter().enumerate() {
                self.state.write(&self.plan, OutputRef::new(id, port), v);
            }
        }
    }

    fn resume_batch(&mut self, ready: &[usize]) -> Result<(), SimError> {
        for &idx in ready {
            self.resume_one(idx)?;
            // children forked by this process run their first segment
            // within the same event, in fork order
            while !self.pending_forks.is_empty() {
                let forked = std::mem::take(&mut self.pending_forks);
                for process in forked {
                    self.procs.push(ProcSlot {
                        process,
                        waiting: Waiting::Start,
                    });
                    let child = self.procs.len() - 1;
                    self.resume_one(child)?;
                }
            }
            if self.stopped {
                break;
            }
        }
        Ok(())
    }

    fn resume_one(&mut self, idx: usize) -> Result<(), SimError> {
        if matches!(self.procs[idx].waiting, Waiting::Done) {
            return Ok(());
        }
        let mut process = std::mem::replace(
            &mut self.procs[idx].process,
            Box::new(|_: &mut SimIo| Suspend::Done),
        );
        let suspend = {
            let mut io = SimIo {
                circuit: self.circuit,
                plan: &self.plan,
                state: &mut self.state,
                time: self.time,
                stopped: &mut self.stopped,
                failure: &mut self.failure,
                forks: &mut self.pending_forks,
            };
            process.resume(&mut io)
        };
        self.procs[idx].process = process;
        self.procs[idx].waiting = match suspend {
            Suspend::OnClk(clk) => Waiting::Clock(clk),
            Suspend::WaitFor(d) if d == SimTime::from_integer(0) => Waiting::Settle,
            Suspend::WaitFor(d) => {
                let at = self.time + d;
                self.queue.entry(at).or_default().wakes.push(idx);
                Waiting::Time
            }
            Suspend::Settle => Waiting::Settle,
            Suspend::Done => Waiting::Done,
        };
        Ok(())
    }

    /// Converges the cone, then serves `Settle` waiters until none are
    /// left. Bounded so a pathological process cannot hang the event.
    fn settle_phase(&mut self) -> Result<(), SimError> {
        for _ in 0..64 {
            self.settle();
            let waiters: Vec<usize> = self
                .procs
                .iter()
                .enumerate()
                .filter(|(_, p)| matches!(p.waiting, Waiting::Settle))
                .map(|(i, _)| i)
                .collect();
            if waiters.is_empty() {
                return Ok(());
            }
            self.resume_batch(&waiters)?;
        }
        Err(SimError::CheckFailed {
            message: "settle loop did not converge".into(),
            time_ps: (self.time.numer() / self.time.denom()) as u64,
        })
    }

    fn check_assertions(&mut self, edges: &[ClockId]) -> Result<(), SimError> {
        for clk in edges {
            let Some(asserts) = self.plan.assertions_by_clock.get(clk) else {
                continue;
            };
            for &id in asserts {
                let node = self.circuit.node(id);
                let NodeKind::Assertion { message } = &node.kind else {
                    continue;
                };
                let cond = match node.input(0) {
                    Some(src) => self.state.read(&self.plan, src),
                    None => VBits::undef(1),
                };
                let time_ps = (self.time.numer() / self.time.denom()) as u64;
                match cond.as_bool() {
                    Some(true) => {}
                    Some(false) => {
                        return Err(SimError::AssertionFailed {
                            message: message.clone(),
                            time_ps,
                            site: node.meta.site_string(),
                        })
                    }
                    None => {
                        return Err(SimError::AssertionUndefined {
                            message: message.clone(),
                            time_ps,
                            site: node.meta.site_string(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn record_sample(&mut self) {
        if let Some(rec) = &mut self.recorder {
            let time_ps = (self.time.numer() / self.time.denom()) as u64;
            rec.sample(self.circuit, &self.plan, &self.state, time_ps);
        }
    }
}

fn xorshift64(s: &mut u64) -> u64 {
    *s ^= *s << 13;
    *s ^= *s >> 7;
    *s ^= *s << 17;
    *s
}
