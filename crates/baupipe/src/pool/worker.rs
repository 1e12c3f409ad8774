use crate::{
    AssemblerFactory, Backoff, Conversion, ConsumptionThrottler, GroupConnections, GroupConsumer,
    Grouping, OrderedProfiles, Printer, Profile, Schedulable, State, UniqueId, WorkerState,
};
use core::fmt;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

/// The pool-side callbacks a worker uses once it finished a group.
pub trait Terminator: Send + Sync {
    /// One fewer group is in flight.
    fn notify_group_consumed(&self);

    /// Whether no group is in flight anywhere in the pool.
    fn is_idle(&self) -> bool;

    /// Tears the pool down if it is still idle once checked under the pool
    /// lock.
    fn tentative_terminate(&self);
}

struct Task {
    consumer: ConsumptionThrottler<Arc<Grouping>, Arc<dyn Backoff>>,
    selected: Option<UniqueId>,
    buffers: HashMap<UniqueId, OrderedProfiles>,
}

impl Task {
    /// Moves every pending profile of `id` into its ordering buffer,
    /// discarding the ones that invalidate themselves.
    fn drain(&mut self, id: UniqueId) {
        let buffer = self.buffers.entry(id).or_default();
        while self.consumer.has_next(id) {
            let Ok(mut profile) = self.consumer.next(id) else {
                break;
            };
            if profile.invalidate() {
                continue;
            }
            buffer.insert(profile);
        }
    }

    /// Drained, and no more profiles will ever arrive.
    fn is_complete(&mut self, id: UniqueId) -> bool {
        self.consumer.is_final(id) && !self.consumer.peek(id)
    }
}

/// A single logical consumer that drains, orders and assembles the groups
/// assigned to it.
///
/// [`execute`](Self::execute) runs one iteration and is called in a loop by
/// the worker's thread. Task handling is serialized by an internal lock, so a
/// thread left over from a torn-down pool generation never runs alongside its
/// successor.
pub struct Worker {
    index: usize,
    state: WorkerState,
    connections: Mutex<GroupConnections>,
    wake: Condvar,
    backoff: Arc<dyn Backoff>,
    task: Mutex<Task>,
    factory: Arc<dyn AssemblerFactory>,
    printer: Arc<dyn Printer>,
}

impl Worker {
    pub fn new(
        index: usize,
        grouping: Arc<Grouping>,
        backoff: Arc<dyn Backoff>,
        factory: Arc<dyn AssemblerFactory>,
        printer: Arc<dyn Printer>,
    ) -> Self {
        Self {
            index,
            state: WorkerState::default(),
            connections: Mutex::new(GroupConnections::new()),
            wake: Condvar::new(),
            task: Mutex::new(Task {
                consumer: ConsumptionThrottler::new(grouping, Arc::clone(&backoff)),
                selected: None,
                buffers: HashMap::new(),
            }),
            backoff,
            factory,
            printer,
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Runs one iteration:
    ///
    /// 1. waits while no group is connected,
    /// 2. returns early when idle and terminated,
    /// 3. selects a group if none is selected,
    /// 4. drains the selected group into its ordering buffer,
    /// 5. assembles, prints and retires the group once it is final and empty,
    /// 6. rotates to the next group if more than one is connected.
    pub fn execute(&self, terminator: &dyn Terminator) {
        let mut task = self.task.lock();
        if !self.await_work() {
            return;
        }
        if task.selected.is_none() {
            self.select(&mut task);
        }
        let Some(id) = task.selected else {
            return;
        };

        task.drain(id);
        if task.is_complete(id) {
            self.retire(&mut task, id);
            terminator.notify_group_consumed();
            if terminator.is_idle() {
                terminator.tentative_terminate();
            }
        }

        if task.selected.is_some() && self.num_connections() > 1 {
            self.select(&mut task);
        }
    }

    /// Blocks while nothing is connected and the worker may go to sleep.
    /// Returns `false` once idle and terminated.
    fn await_work(&self) -> bool {
        let mut connections = self.connections.lock();
        while connections.is_empty() && self.state.compare_and_set(State::Running, State::Wait) {
            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {} waiting for groups", self.index);
            self.wake.wait(&mut connections);
            self.state.compare_and_set(State::Wait, State::Running);
        }
        !(connections.is_empty() && self.state.get() == State::Terminated)
    }

    fn select(&self, task: &mut Task) {
        match self.connections.lock().service_connection() {
            Ok(id) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Worker {} selected group {id}", self.index);
                task.selected = Some(id);
                task.buffers.entry(id).or_default();
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Worker {} kept its selection: {_e}", self.index);
            }
        }
    }

    /// Emits the document for `id` and drops every trace of the group.
    fn retire(&self, task: &mut Task, id: UniqueId) {
        let buffer = task.buffers.remove(&id).unwrap_or_default();
        match buffer.build() {
            Ok(mut profiles) => self.output(id, &mut profiles),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {} dropped group {id}: {_e}", self.index);
            }
        }

        if let Err(_e) = task.consumer.delete_group(id) {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker {} failed to delete group {id}: {_e}", self.index);
        }
        if let Err(_e) = self.connections.lock().disconnect() {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker {} failed to disconnect group {id}: {_e}", self.index);
        }
        task.selected = None;
    }

    fn output(&self, _id: UniqueId, profiles: &mut [Box<dyn Profile>]) {
        for profile in profiles.iter_mut() {
            profile.post_process();
        }
        let conversions: Vec<Conversion> = profiles.iter().map(|p| p.convert()).collect();
        let estimated = conversions.iter().map(|c| c.body().len()).sum();
        let assembly = self
            .factory
            .create()
            .assemble(&mut conversions.into_iter(), estimated);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Worker {} assembled group {_id} ({} profiles, {} bytes)",
            self.index,
            profiles.len(),
            assembly.len()
        );
        self.printer.print(&assembly);
    }

    /// Connects group `id` and wakes the worker if it was waiting.
    pub fn consume(&self, id: UniqueId) {
        {
            let mut connections = self.connections.lock();
            connections.connect(id);
            if self.state.compare_and_set(State::Wait, State::Running) {
                self.wake.notify_one();
            }
        }
        self.backoff.interrupt();
    }

    /// Wakes the worker so it can observe that it was terminated.
    pub fn notify_of_termination(&self) {
        {
            let _connections = self.connections.lock();
            self.wake.notify_all();
        }
        self.backoff.interrupt();
    }
}

impl Schedulable for Worker {
    fn is_alive(&self) -> bool {
        self.state.get() != State::Terminated
    }

    fn num_connections(&self) -> usize {
        self.connections.lock().num_connections()
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("state", &self.state.get())
            .field("connections", &self.num_connections())
            .finish_non_exhaustive()
    }
}
