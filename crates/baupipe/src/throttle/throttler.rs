use crate::{Backoff, GroupConsumer, GroupError, Profile, UniqueId};
use std::collections::HashSet;

/// Wraps a worker's [`GroupConsumer`] and sleeps once every group the worker
/// has seen active came up empty in a row.
///
/// Bookkeeping per worker:
/// - the set of active group ids,
/// - the most recently polled id and how many polls returned data since the
///   worker switched to it,
/// - the streak of empty polls and the streak of backoffs.
///
/// The first poll of a group that was never seen before does not count as an
/// empty poll, so fresh groups that have not produced yet are not punished.
/// The first successful poll after a streak resets the backoff.
#[derive(Debug)]
pub struct ConsumptionThrottler<C, B> {
    inner: C,
    backoff: B,
    active: HashSet<UniqueId>,
    most_recent: Option<UniqueId>,
    fresh: bool,
    hits: u64,
    failed: usize,
    backoffs: u64,
}

impl<C, B> ConsumptionThrottler<C, B>
where
    C: GroupConsumer,
    B: Backoff,
{
    pub fn new(inner: C, backoff: B) -> Self {
        Self {
            inner,
            backoff,
            active: HashSet::new(),
            most_recent: None,
            fresh: false,
            hits: 0,
            failed: 0,
            backoffs: 0,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    /// Consecutive backoffs since the last reset.
    pub const fn backoff_streak(&self) -> u64 {
        self.backoffs
    }

    /// Number of groups this throttler is currently tracking as active.
    pub fn active_groups(&self) -> usize {
        self.active.len()
    }

    /// Polls the wrapped consumer without counting the poll.
    pub fn peek(&mut self, id: UniqueId) -> bool {
        self.inner.has_next(id)
    }

    fn switch_to(&mut self, id: UniqueId) {
        if self.most_recent != Some(id) {
            self.fresh = self.active.insert(id);
            self.most_recent = Some(id);
            self.hits = 0;
        }
    }

    const fn requires_reset(&self) -> bool {
        self.hits == 0 && (self.backoffs > 0 || self.failed > 0)
    }

    fn reset(&mut self) {
        self.backoffs = 0;
        self.failed = 0;
        self.backoff.reset();
    }

    fn escalate(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            streak = self.backoffs + 1,
            active = self.active.len(),
            "all active groups empty, backing off"
        );
        self.backoff.backoff();
        self.backoff.increase();
        self.backoffs += 1;
        self.failed = 0;
    }
}

impl<C, B> GroupConsumer for ConsumptionThrottler<C, B>
where
    C: GroupConsumer,
    B: Backoff,
{
    fn has_next(&mut self, id: UniqueId) -> bool {
        let has_next = self.inner.has_next(id);
        self.switch_to(id);

        if has_next {
            if self.requires_reset() {
                self.reset();
            }
            self.hits += 1;
        } else {
            if self.hits == 0 && !self.fresh {
                self.failed += 1;
            }
            self.most_recent = None;
        }

        if self.failed > 0 && self.failed == self.active.len() {
            self.escalate();
        }
        has_next
    }

    fn next(&mut self, id: UniqueId) -> Result<Box<dyn Profile>, GroupError> {
        self.inner.next(id)
    }

    fn is_final(&self, id: UniqueId) -> bool {
        self.inner.is_final(id)
    }

    fn delete_group(&mut self, id: UniqueId) -> Result<(), GroupError> {
        if self.requires_reset() {
            self.reset();
        }
        self.inner.delete_group(id)?;
        self.active.remove(&id);
        Ok(())
    }
}
