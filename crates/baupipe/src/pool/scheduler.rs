use crate::SchedulingError;

/// What a scheduling policy may ask of a worker.
pub trait Schedulable {
    fn is_alive(&self) -> bool;
    fn num_connections(&self) -> usize;
}

/// Picks the worker a newly dispatched group is assigned to.
pub trait SchedulingPolicy: Send + Sync {
    /// Returns the index of the chosen worker.
    ///
    /// # Errors
    /// [`SchedulingError`] if no worker is alive.
    fn select(&self, workers: &[&dyn Schedulable]) -> Result<usize, SchedulingError>;
}

/// Picks the live worker with the fewest connections; the first one seen wins
/// ties.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeastConnection;

impl SchedulingPolicy for LeastConnection {
    fn select(&self, workers: &[&dyn Schedulable]) -> Result<usize, SchedulingError> {
        workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_alive())
            .min_by_key(|(i, w)| (w.num_connections(), *i))
            .map(|(i, _)| i)
            .ok_or(SchedulingError)
    }
}
