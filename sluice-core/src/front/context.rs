//! The thread-local build context. All frontend calls route through the
//! context of the innermost live [`Design`]; the scope stacks decide
//! which clock, condition and group a new node receives.

use std::cell::RefCell;

use crate::error::DesignError;
use crate::ir::circuit::Circuit;
use crate::ir::clock::{ClockConfig, ClockId};
use crate::ir::group::{GroupId, GroupKind};
use crate::ir::node::OutputRef;

pub struct BuildContext {
    pub circuit: Circuit,
    clock_stack: Vec<ClockId>,
    /// Each entry is the full conjunction of the enclosing conditions.
    cond_stack: Vec<OutputRef>,
    group_stack: Vec<GroupId>,
}

impl BuildContext {
    fn new() -> Self {
        let circuit = Circuit::new();
        let root = circuit.root_group();
        BuildContext {
            circuit,
            clock_stack: Vec::new(),
            cond_stack: Vec::new(),
            group_stack: vec![root],
        }
    }

    pub fn current_clock(&self) -> Result<ClockId, DesignError> {
        self.clock_stack.last().copied().ok_or(DesignError::NoClockScope)
    }

    pub fn current_cond(&self) -> Option<OutputRef> {
        self.cond_stack.last().copied()
    }

    pub fn current_group(&self) -> GroupId {
        *self.group_stack.last().expect("group stack never empty")
    }

    pub(crate) fn push_clock(&mut self, clk: ClockId) {
        self.clock_stack.push(clk);
    }

    pub(crate) fn pop_clock(&mut self) {
        self.clock_stack.pop();
    }

    pub(crate) fn push_cond(&mut self, conj: OutputRef) {
        self.cond_stack.push(conj);
    }

    pub(crate) fn pop_cond(&mut self) {
        self.cond_stack.pop();
    }

    pub(crate) fn push_group(&mut self, group: GroupId) {
        self.group_stack.push(group);
    }

    pub(crate) fn pop_group(&mut self) {
        self.group_stack.pop();
    }
}

thread_local! {
    static CTX: RefCell<Option<BuildContext>> = const { RefCell::new(None) };
}

/// Runs `f` with the active context. Panics when called outside a
/// [`Design`]; frontend construction errors are fatal by design.
pub fn with_ctx<R>(f: impl FnOnce(&mut BuildContext) -> R) -> R {
    try_with_ctx(f).unwrap_or_else(|| panic!("{}", DesignError::NoDesignContext))
}

/// Like [`with_ctx`] but a no-op outside a design; scope guards use
/// this so they may outlive the design they were opened in.
pub fn try_with_ctx<R>(f: impl FnOnce(&mut BuildContext) -> R) -> Option<R> {
    CTX.with(|c| {
        let mut borrow = c.borrow_mut();
        borrow.as_mut().map(f)
    })
}

/// An elaboration session. Creating a `Design` installs a fresh circuit
/// as the thread's build target; `finish` returns the built circuit.
/// One design per thread at a time.
pub struct Design {
    finished: bool,
}

impl Design {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Design {
        CTX.with(|c| {
            let mut borrow = c.borrow_mut();
            if borrow.is_some() {
                panic!("{}", DesignError::NestedDesignContext);
            }
            *borrow = Some(BuildContext::new());
        });
        Design { finished: false }
    }

    /// Builds a whole design in one closure.
    pub fn build(f: impl FnOnce()) -> Circuit {
        let design = Design::new();
        f();
        design.finish()
    }

    pub fn finish(mut self) -> Circuit {
        self.finished = true;
        CTX.with(|c| c.borrow_mut().take())
            .map(|ctx| ctx.circuit)
            .expect("design context disappeared")
    }
}

impl Drop for Design {
    fn drop(&mut self) {
        if !self.finished {
            CTX.with(|c| c.borrow_mut().take());
        }
    }
}

/// Frontend clock handle.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Clock {
    id: ClockId,
}

impl Clock {
    pub fn new(config: ClockConfig) -> Clock {
        let id = with_ctx(|ctx| ctx.circuit.add_clock(config));
        Clock { id }
    }

    /// A logical derivative sharing this clock's pin source.
    pub fn derive(&self, config: ClockConfig) -> Clock {
        let id = with_ctx(|ctx| ctx.circuit.derive_clock(self.id, config));
        Clock { id }
    }

    pub fn id(&self) -> ClockId {
        self.id
    }

    /// Makes this the active clock for registers and memory ports built
    /// while the guard lives.
    pub fn scope(&self) -> ClockScope {
        with_ctx(|ctx| ctx.push_clock(self.id));
        ClockScope { _priv: () }
    }
}

pub struct ClockScope {
    _priv: (),
}

impl Drop for ClockScope {
    fn drop(&mut self) {
        try_with_ctx(|ctx| ctx.pop_clock());
    }
}

/// Opens a child node-group of the current one; nodes built while the
/// guard lives belong to it.
pub fn area(name: impl Into<String>) -> GroupScope {
    group_scope(GroupKind::Area, name)
}

pub fn entity(name: impl Into<String>) -> GroupScope {
    group_scope(GroupKind::Entity, name)
}

fn group_scope(kind: GroupKind, name: impl Into<String>) -> GroupScope {
    with_ctx(|ctx| {
        let parent = ctx.current_group();
        let id = ctx.circuit.add_group(parent, kind, name);
        ctx.push_group(id);
    });
    GroupScope { _priv: () }
}

pub struct GroupScope {
    _priv: (),
}

impl Drop for GroupScope {
    fn drop(&mut self) {
        try_with_ctx(|ctx| ctx.pop_group());
    }
}
