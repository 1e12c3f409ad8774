use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The execution resource behind one worker: a named OS thread that keeps
/// calling a body until its generation is retired.
///
/// Every [`request_termination`](Self::request_termination) retires the
/// current generation. A thread of a retired generation finishes the
/// iteration it is in and exits, so a runner can be started again right
/// away without waiting for the old thread.
#[derive(Debug)]
pub struct Runner {
    name: String,
    generation: Arc<AtomicU64>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Runner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: Arc::new(AtomicU64::new(0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns a thread that calls `body` until this generation is retired or
    /// `body` returns `false`.
    ///
    /// # Errors
    /// Returns the OS error if the thread could not be spawned.
    pub fn start<F>(&self, mut body: F) -> io::Result<()>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let generation = Arc::clone(&self.generation);
        let current = generation.load(Ordering::Acquire);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                #[cfg(feature = "tracing")]
                tracing::trace!("Runner generation {current} started");
                while generation.load(Ordering::Acquire) == current {
                    if !body() {
                        break;
                    }
                }
                #[cfg(feature = "tracing")]
                tracing::trace!("Runner generation {current} stopped");
            })?;
        self.handles.lock().push(handle);
        Ok(())
    }

    /// Retires the running generation.
    pub fn request_termination(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Prepares the runner for a new start by reaping finished threads.
    pub fn resurrect(&self) {
        let finished: Vec<_> = {
            let mut handles = self.handles.lock();
            let (finished, running): (Vec<_>, Vec<_>) =
                handles.drain(..).partition(JoinHandle::is_finished);
            *handles = running;
            finished
        };
        for handle in finished {
            let _ = handle.join();
        }
    }

    /// Number of threads started by this runner that have not been reaped.
    pub fn live_threads(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Waits for every thread this runner started, except the calling one.
    pub fn join(&self) {
        let handles = core::mem::take(&mut *self.handles.lock());
        let me = thread::current().id();
        for handle in handles {
            if handle.thread().id() != me {
                let _ = handle.join();
            }
        }
    }
}
