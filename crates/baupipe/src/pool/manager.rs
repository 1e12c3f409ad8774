//! Bounded worker pool that lazily starts, tears itself down when idle and
//! comes back on the next distribution.
//!
//! The pool owns N [`Worker`]s, each with its own [`Runner`] thread. Groups
//! are assigned by a [`SchedulingPolicy`] (least connections by default).
//! A global in-flight counter tracks distributed groups that have not been
//! assembled yet; when it drops to zero the worker that retired the last
//! group asks the pool to terminate:
//!
//! - every worker is marked [`State::Terminated`],
//! - every runner generation is retired,
//! - every worker is woken so a waiting thread can exit.
//!
//! The idle check and the teardown happen under the same pool lock as
//! distribution, so a concurrent distribution either resurrects the pool or
//! waits for teardown to finish.

use crate::{
    AssemblerFactory, Backoff, BackoffConfig, DistributionError, Grouping, LeastConnection,
    Printer, Runner, Schedulable, SchedulingPolicy, State, Terminator, UniqueId, Worker,
};
use core::fmt;
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Settings for a [`WorkerPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub num_workers: usize,
    pub backoff: BackoffConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 2,
            backoff: BackoffConfig::default(),
        }
    }
}

struct Lifecycle {
    terminated: bool,
}

struct PoolInner {
    workers: Vec<Worker>,
    runners: Vec<Runner>,
    scheduler: Box<dyn SchedulingPolicy>,
    #[cfg(feature = "cache-padded")]
    in_flight: crossbeam_utils::CachePadded<AtomicUsize>,
    #[cfg(not(feature = "cache-padded"))]
    in_flight: AtomicUsize,
    lifecycle: Mutex<Lifecycle>,
}

/// Owns the workers that drain, order and assemble groups.
///
/// Dropping the pool terminates every worker and joins their threads. Groups
/// still in flight at that point are abandoned.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Creates a pool scheduling by [`LeastConnection`]. No thread is started
    /// until the first distribution.
    pub fn new(
        config: PoolConfig,
        grouping: Arc<Grouping>,
        factory: Arc<dyn AssemblerFactory>,
        printer: Arc<dyn Printer>,
    ) -> Self {
        Self::with_scheduler(config, grouping, factory, printer, Box::new(LeastConnection))
    }

    pub fn with_scheduler(
        config: PoolConfig,
        grouping: Arc<Grouping>,
        factory: Arc<dyn AssemblerFactory>,
        printer: Arc<dyn Printer>,
        scheduler: Box<dyn SchedulingPolicy>,
    ) -> Self {
        let workers = (0..config.num_workers)
            .map(|index| {
                let backoff: Arc<dyn Backoff> = Arc::new(config.backoff.build());
                Worker::new(
                    index,
                    Arc::clone(&grouping),
                    backoff,
                    Arc::clone(&factory),
                    Arc::clone(&printer),
                )
            })
            .collect();
        let runners = (0..config.num_workers)
            .map(|index| Runner::new(format!("baupipe-worker-{index}")))
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                workers,
                runners,
                scheduler,
                #[cfg(feature = "cache-padded")]
                in_flight: crossbeam_utils::CachePadded::new(AtomicUsize::new(0)),
                #[cfg(not(feature = "cache-padded"))]
                in_flight: AtomicUsize::new(0),
                lifecycle: Mutex::new(Lifecycle { terminated: false }),
            }),
        }
    }

    /// Assigns group `id` to a worker, starting or resurrecting workers as
    /// needed.
    ///
    /// # Errors
    /// - [`DistributionError::NoLiveWorker`] if the scheduler found no live
    ///   worker.
    /// - [`DistributionError::Spawn`] if the chosen worker's thread could not
    ///   be started.
    ///
    /// A failed distribution is not counted as in flight.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn distribute(&self, id: UniqueId) -> Result<(), DistributionError> {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let scheduled = self.inner.schedule(id);
        if scheduled.is_err() {
            self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        scheduled
    }

    /// Groups distributed but not yet assembled.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.inner.is_idle()
    }

    /// Whether the pool is torn down and waiting for the next distribution.
    pub fn is_terminated(&self) -> bool {
        self.inner.lifecycle.lock().terminated
    }

    pub fn num_workers(&self) -> usize {
        self.inner.workers.len()
    }

    pub fn worker_states(&self) -> Vec<State> {
        self.inner.workers.iter().map(|w| w.state().get()).collect()
    }

    /// Connections currently held by each worker.
    pub fn worker_connections(&self) -> Vec<usize> {
        self.inner
            .workers
            .iter()
            .map(Schedulable::num_connections)
            .collect()
    }
}

impl PoolInner {
    fn schedule(self: &Arc<Self>, id: UniqueId) -> Result<(), DistributionError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.terminated {
            self.resurrect();
            lifecycle.terminated = false;
        }

        let candidates: Vec<&dyn Schedulable> = self
            .workers
            .iter()
            .map(|w| w as &dyn Schedulable)
            .collect();
        let index = self
            .scheduler
            .select(&candidates)
            .map_err(|source| DistributionError::NoLiveWorker { group: id, source })?;

        let worker = &self.workers[index];
        if worker.state().get() == State::New {
            self.start(index)?;
        }
        worker.consume(id);
        Ok(())
    }

    fn start(self: &Arc<Self>, index: usize) -> Result<(), DistributionError> {
        let worker = &self.workers[index];
        worker.state().set(State::Running);

        let pool: Weak<Self> = Arc::downgrade(self);
        let started = self.runners[index].start(move || match pool.upgrade() {
            Some(pool) => {
                pool.workers[index].execute(&*pool);
                true
            }
            None => false,
        });

        if let Err(e) = started {
            worker.state().set(State::New);
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to start worker {index}: {e}");
            return Err(DistributionError::Spawn {
                worker: index,
                reason: e.to_string(),
            });
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {index} started");
        Ok(())
    }

    fn resurrect(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!("Resurrecting {} workers", self.workers.len());
        for (worker, runner) in self.workers.iter().zip(&self.runners) {
            runner.resurrect();
            worker.state().set(State::New);
        }
    }

    /// Marks every worker terminated and wakes them. Callers hold the
    /// lifecycle lock.
    fn terminate(&self, lifecycle: &mut Lifecycle) {
        for (worker, runner) in self.workers.iter().zip(&self.runners) {
            worker.state().set(State::Terminated);
            runner.request_termination();
            worker.notify_of_termination();
        }
        lifecycle.terminated = true;
    }
}

impl Terminator for PoolInner {
    fn notify_group_consumed(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == 0
    }

    fn tentative_terminate(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.terminated || !self.is_idle() {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool idle, terminating workers");
        self.terminate(&mut lifecycle);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // === Phase 0: Terminate every worker and retire its runner ===
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Shutting down worker pool ({} groups in flight)",
            self.in_flight()
        );
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            self.inner.terminate(&mut lifecycle);
        }

        // === Phase 1: Join worker threads outside the pool lock ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Joining worker threads");
        for runner in &self.inner.runners {
            runner.join();
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.inner.workers)
            .field("in_flight", &self.in_flight())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
