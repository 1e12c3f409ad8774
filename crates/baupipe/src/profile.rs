//! The capability set a caller's event type implements to travel through the
//! pipeline, and the [`Conversion`] it renders into.

use crate::AssemblyNode;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// A profile event: an opaque payload tagged with a logical slot id and an
/// optional dependency on another slot.
///
/// Profiles are created by the caller, prepared by the façade
/// ([`set_verbosity`](Self::set_verbosity) then
/// [`pre_process`](Self::pre_process)), and consumed exactly once by a worker
/// which calls [`invalidate`](Self::invalidate),
/// [`post_process`](Self::post_process) and finally [`convert`](Self::convert).
pub trait Profile: Send {
    /// Logical slot id. Other profiles name this id as their dependency.
    fn id(&self) -> u32;

    /// The slot this profile must be placed directly after, if any.
    fn dependency_id(&self) -> Option<u32> {
        None
    }

    /// Semantic match against a candidate anchor whose id equals
    /// [`dependency_id`](Self::dependency_id).
    fn predicate(&self, _anchor: &dyn Profile) -> bool {
        true
    }

    fn set_verbosity(&mut self, _verbose: bool) {}

    fn pre_process(&mut self) {}

    /// Returns `true` if this profile must be discarded.
    fn invalidate(&mut self) -> bool {
        false
    }

    fn post_process(&mut self) {}

    /// Renders this profile into its document fragment.
    fn convert(&self) -> Conversion;
}

/// Profiles that carry a caller-driven [`Timer`].
pub trait Timed {
    fn set_timer(&mut self, timer: Timer);
}

/// The rendered, ready-to-emit form of one profile plus its structural
/// placement.
///
/// `nodes` lists the nesting descriptors from the outermost wrapper inwards.
/// `id` identifies the originating conversion kind: consecutive fragments
/// sharing both `id` and their deepest wrapper become separate elements of
/// that wrapper.
#[derive(Clone, Debug)]
pub struct Conversion {
    id: u64,
    body: String,
    nodes: Vec<Arc<dyn AssemblyNode>>,
}

impl Conversion {
    pub fn new(id: u64, body: impl Into<String>, nodes: Vec<Arc<dyn AssemblyNode>>) -> Self {
        Self {
            id,
            body: body.into(),
            nodes,
        }
    }

    /// A fragment placed directly in the top-level wrapper.
    pub fn flat(id: u64, body: impl Into<String>) -> Self {
        Self::new(id, body, Vec::new())
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn nodes(&self) -> &[Arc<dyn AssemblyNode>] {
        &self.nodes
    }

    /// Nesting depth of this fragment.
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }
}

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

fn nanos_to_millis(nanos: u64) -> f64 {
    (nanos as f64 * 1e-1).round() / 1e5
}

/// Start/stop timestamps recorded in nanoseconds since a process-wide epoch.
#[derive(Debug, Default)]
pub struct TimedAction {
    start: AtomicU64,
    end: AtomicU64,
}

impl TimedAction {
    fn now() -> u64 {
        u64::try_from(epoch().elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn start(&self) {
        self.start.store(Self::now(), Ordering::Release);
    }

    pub fn stop(&self) {
        self.end.store(Self::now(), Ordering::Release);
    }

    pub fn start_time(&self) -> u64 {
        self.start.load(Ordering::Acquire)
    }

    pub fn end_time(&self) -> u64 {
        self.end.load(Ordering::Acquire)
    }

    pub fn total_time(&self) -> u64 {
        self.end_time().saturating_sub(self.start_time())
    }

    pub fn start_time_millis(&self) -> f64 {
        nanos_to_millis(self.start_time())
    }

    pub fn end_time_millis(&self) -> f64 {
        nanos_to_millis(self.end_time())
    }

    pub fn total_time_millis(&self) -> f64 {
        nanos_to_millis(self.total_time())
    }
}

/// A shared handle over a [`TimedAction`].
///
/// The caller holds one end and starts/stops it; the profile holds the other
/// and reads it when converted. An inert timer (from a disabled profiler)
/// ignores `start`/`stop`.
#[derive(Clone, Debug)]
pub struct Timer {
    action: Arc<TimedAction>,
    inert: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            action: Arc::new(TimedAction::default()),
            inert: false,
        }
    }

    pub fn inert() -> Self {
        Self {
            action: Arc::new(TimedAction::default()),
            inert: true,
        }
    }

    pub fn start(&self) {
        if !self.inert {
            self.action.start();
        }
    }

    pub fn stop(&self) {
        if !self.inert {
            self.action.stop();
        }
    }

    pub fn info(&self) -> &TimedAction {
        &self.action
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_measures_elapsed_time() {
        let timer = Timer::new();
        timer.start();
        std::thread::sleep(std::time::Duration::from_millis(2));
        timer.stop();

        let info = timer.info();
        assert!(info.end_time() > info.start_time());
        assert!(info.total_time() >= 2_000_000);
        assert!(info.total_time_millis() >= 2.0);
    }

    #[test]
    fn inert_timer_records_nothing() {
        let timer = Timer::inert();
        timer.start();
        timer.stop();
        assert_eq!(timer.info().start_time(), 0);
        assert_eq!(timer.info().total_time(), 0);
    }

    #[test]
    fn millis_are_rounded_to_five_decimals() {
        assert_eq!(nanos_to_millis(1_234_567_891), 1234.56789);
        assert_eq!(nanos_to_millis(1), 0.0);
        assert_eq!(nanos_to_millis(6), 0.00001);
        assert_eq!(nanos_to_millis(1_000_000), 1.0);
        assert_eq!(nanos_to_millis(2_500_000), 2.5);
    }
}
