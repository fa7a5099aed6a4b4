//! Resource limits for a VM instance.

/// Default evaluation stack capacity, in entries.
pub const DEFAULT_MAX_STACK_SIZE: usize = 65_536;

/// Configuration for a [`Vm`](super::Vm).
///
/// Both limits are checked before every instruction. Exceeding either one
/// ends the run with a non-catchable error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of stack entries (values and markers).
    pub max_stack_size: usize,
    /// Maximum instructions executed since the last reset; `None` is unlimited.
    pub max_cycle_count: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            max_cycle_count: None,
        }
    }
}

impl VmConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stack capacity.
    #[must_use]
    pub fn with_max_stack_size(mut self, size: usize) -> Self {
        self.max_stack_size = size;
        self
    }

    /// Sets the instruction budget.
    #[must_use]
    pub fn with_max_cycle_count(mut self, cycles: u64) -> Self {
        self.max_cycle_count = Some(cycles);
        self
    }

    /// Removes the instruction budget.
    #[must_use]
    pub fn unlimited_cycles(mut self) -> Self {
        self.max_cycle_count = None;
        self
    }
}
