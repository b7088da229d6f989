use num_rational::Ratio;

#[derive(Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ClockId(pub usize);

impl std::fmt::Debug for ClockId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

pub const PS_PER_SECOND: u128 = 1_000_000_000_000;

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum ResetKind {
    None,
    Synchronous,
    Asynchronous,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum ResetActive {
    High,
    Low,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum TriggerEdge {
    Rising,
    Falling,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum MemoryResetPolicy {
    None,
    Zero,
    Random,
}

#[derive(Clone, Debug)]
pub struct ClockConfig {
    /// Absolute frequency in Hz, exact.
    pub frequency: Ratio<u128>,
    pub name: Option<String>,
    pub reset_kind: ResetKind,
    pub reset_active: ResetActive,
    pub trigger: TriggerEdge,
    pub memory_reset: MemoryResetPolicy,
}

impl ClockConfig {
    pub fn new(frequency_hz: u128) -> Self {
        ClockConfig {
            frequency: Ratio::from_integer(frequency_hz),
            name: None,
            reset_kind: ResetKind::Synchronous,
            reset_active: ResetActive::High,
            trigger: TriggerEdge::Rising,
            memory_reset: MemoryResetPolicy::None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_reset(mut self, kind: ResetKind, active: ResetActive) -> Self {
        self.reset_kind = kind;
        self.reset_active = active;
        self
    }

    pub fn with_trigger(mut self, edge: TriggerEdge) -> Self {
        self.trigger = edge;
        self
    }

    pub fn with_memory_reset(mut self, policy: MemoryResetPolicy) -> Self {
        self.memory_reset = policy;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ClockDef {
    pub id: ClockId,
    pub config: ClockConfig,
    /// The physical clock this one is a logical derivative of. Domain
    /// comparisons use this, never the id.
    pub pin_source: ClockId,
}

impl ClockDef {
    /// Exact clock period in picoseconds.
    pub fn period_ps(&self) -> Ratio<u128> {
        Ratio::from_integer(PS_PER_SECOND) / self.config.frequency
    }

    pub fn display_name(&self) -> String {
        match &self.config.name {
            Some(n) => n.clone(),
            None => format!("{:?}", self.id),
        }
    }
}
