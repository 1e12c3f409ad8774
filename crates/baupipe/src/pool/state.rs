use core::fmt;
use portable_atomic::{AtomicU8, Ordering};

/// Lifecycle of a worker.
///
/// `New -> Running <-> Wait`, any state `-> Terminated`, and `Terminated ->
/// New` again when the pool resurrects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    New = 0,
    Running = 1,
    Wait = 2,
    Terminated = 3,
}

impl State {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::New,
            1 => Self::Running,
            2 => Self::Wait,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Running => "running",
            Self::Wait => "wait",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A [`State`] shared between a worker, its thread and the pool.
pub struct WorkerState {
    #[cfg(feature = "cache-padded")]
    raw: crossbeam_utils::CachePadded<AtomicU8>,
    #[cfg(not(feature = "cache-padded"))]
    raw: AtomicU8,
}

impl WorkerState {
    pub fn new(state: State) -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            raw: crossbeam_utils::CachePadded::new(AtomicU8::new(state as u8)),
            #[cfg(not(feature = "cache-padded"))]
            raw: AtomicU8::new(state as u8),
        }
    }

    pub fn get(&self) -> State {
        State::from_raw(self.raw.load(Ordering::Acquire))
    }

    pub fn set(&self, state: State) {
        self.raw.store(state as u8, Ordering::Release);
    }

    pub fn get_and_set(&self, state: State) -> State {
        State::from_raw(self.raw.swap(state as u8, Ordering::AcqRel))
    }

    /// Moves to `update` only if the current state is `expected`.
    pub fn compare_and_set(&self, expected: State, update: State) -> bool {
        self.raw
            .compare_exchange(
                expected as u8,
                update as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new(State::New)
    }
}

impl fmt::Debug for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkerState").field(&self.get()).finish()
    }
}
