use crate::{ConnectionError, UniqueId};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Service {
    Idle,
    InService(UniqueId),
}

/// The round-robin ledger of groups assigned to one worker.
///
/// Pending groups wait in a FIFO. The group currently being drained is held
/// apart as "in service" and rejoins the tail of the FIFO when the next group
/// is serviced, so every connected group gets a turn before any gets a second
/// one.
///
/// ```
/// use baupipe::GroupConnections;
///
/// let mut ledger = GroupConnections::new();
/// for id in 1..=3 {
///     ledger.connect(id);
/// }
/// let order: Vec<_> = (0..6).map(|_| ledger.service_connection().unwrap()).collect();
/// assert_eq!(order, [1, 2, 3, 1, 2, 3]);
/// ```
#[derive(Clone, Debug)]
pub struct GroupConnections {
    pending: VecDeque<UniqueId>,
    service: Service,
}

impl GroupConnections {
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            service: Service::Idle,
        }
    }

    pub fn connect(&mut self, id: UniqueId) {
        self.pending.push_back(id);
    }

    /// Rotates the in-service group to the tail and services the next one.
    ///
    /// # Errors
    /// [`ConnectionError::Unavailable`] if no group other than the one in
    /// service is connected.
    pub fn service_connection(&mut self) -> Result<UniqueId, ConnectionError> {
        let next = self
            .pending
            .pop_front()
            .ok_or(ConnectionError::Unavailable)?;
        if let Service::InService(current) = self.service {
            self.pending.push_back(current);
        }
        self.service = Service::InService(next);
        Ok(next)
    }

    /// Drops the in-service group from the ledger.
    ///
    /// # Errors
    /// [`ConnectionError::NotServicing`] if nothing is in service.
    pub fn disconnect(&mut self) -> Result<UniqueId, ConnectionError> {
        match core::mem::replace(&mut self.service, Service::Idle) {
            Service::InService(id) => Ok(id),
            Service::Idle => Err(ConnectionError::NotServicing),
        }
    }

    pub const fn in_service(&self) -> Option<UniqueId> {
        match self.service {
            Service::InService(id) => Some(id),
            Service::Idle => None,
        }
    }

    /// Connected groups, including the one in service.
    pub fn num_connections(&self) -> usize {
        self.pending.len() + usize::from(self.in_service().is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.num_connections() == 0
    }
}

impl Default for GroupConnections {
    fn default() -> Self {
        Self::new()
    }
}
