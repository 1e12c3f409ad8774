use crate::{GroupConsumer, GroupError, GroupProducer, Profile, UniqueId};
use core::fmt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque, hash_map::Entry};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Open,
    Final,
    Deleted,
}

struct Group {
    events: VecDeque<Box<dyn Profile>>,
    stage: Stage,
}

/// Thread-safe per-group FIFO queues of pending profiles.
///
/// The map of groups sits behind a read-mostly lock that is only taken for
/// writing on create and delete. Every other operation clones the group's
/// handle out of the map and then works under that group's own lock, so
/// producers feeding different groups never contend with each other.
///
/// A group moves `Open -> Final -> Deleted`, and may only be deleted once it
/// is both final and empty.
#[derive(Default)]
pub struct Grouping {
    groups: RwLock<HashMap<UniqueId, Arc<Mutex<Group>>>>,
}

impl Grouping {
    pub fn new() -> Self {
        Self::default()
    }

    fn group(&self, id: UniqueId) -> Option<Arc<Mutex<Group>>> {
        self.groups.read().get(&id).cloned()
    }

    fn existing(&self, id: UniqueId) -> Result<Arc<Mutex<Group>>, GroupError> {
        self.group(id).ok_or(GroupError::NotFound(id))
    }

    pub fn contains(&self, id: UniqueId) -> bool {
        self.groups.read().contains_key(&id)
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pending profiles in group `id`, or `None` if it is unknown.
    pub fn pending(&self, id: UniqueId) -> Option<usize> {
        self.group(id).map(|group| group.lock().events.len())
    }

    pub fn has_next(&self, id: UniqueId) -> bool {
        self.group(id)
            .is_some_and(|group| !group.lock().events.is_empty())
    }

    pub fn next(&self, id: UniqueId) -> Result<Box<dyn Profile>, GroupError> {
        self.existing(id)?
            .lock()
            .events
            .pop_front()
            .ok_or(GroupError::Empty(id))
    }

    pub fn is_final(&self, id: UniqueId) -> bool {
        self.group(id)
            .is_some_and(|group| group.lock().stage == Stage::Final)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn delete_group(&self, id: UniqueId) -> Result<(), GroupError> {
        let mut groups = self.groups.write();
        let group = groups.get(&id).ok_or(GroupError::NotFound(id))?;
        {
            let mut group = group.lock();
            if !group.events.is_empty() {
                return Err(GroupError::NotEmpty(id));
            }
            if group.stage != Stage::Final {
                return Err(GroupError::NotFinal(id));
            }
            group.stage = Stage::Deleted;
        }
        groups.remove(&id);
        Ok(())
    }
}

impl GroupProducer for Grouping {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    fn create_group(&self, id: UniqueId) -> Result<(), GroupError> {
        match self.groups.write().entry(id) {
            Entry::Occupied(_) => Err(GroupError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(Group {
                    events: VecDeque::new(),
                    stage: Stage::Open,
                })));
                Ok(())
            }
        }
    }

    fn insert(&self, profile: Box<dyn Profile>, id: UniqueId) -> Result<(), GroupError> {
        let group = self.existing(id)?;
        let mut group = group.lock();
        // Lost a race with delete: the handle outlived its map entry.
        if group.stage == Stage::Deleted {
            return Err(GroupError::NotFound(id));
        }
        group.events.push_back(profile);
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    fn mark_final(&self, id: UniqueId) -> Result<(), GroupError> {
        let group = self.existing(id)?;
        let mut group = group.lock();
        match group.stage {
            Stage::Deleted => Err(GroupError::NotFound(id)),
            _ => {
                group.stage = Stage::Final;
                Ok(())
            }
        }
    }
}

impl GroupConsumer for Arc<Grouping> {
    fn has_next(&mut self, id: UniqueId) -> bool {
        Grouping::has_next(self, id)
    }

    fn next(&mut self, id: UniqueId) -> Result<Box<dyn Profile>, GroupError> {
        Grouping::next(self, id)
    }

    fn is_final(&self, id: UniqueId) -> bool {
        Grouping::is_final(self, id)
    }

    fn delete_group(&mut self, id: UniqueId) -> Result<(), GroupError> {
        Grouping::delete_group(self, id)
    }
}

impl fmt::Debug for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grouping")
            .field("groups", &self.len())
            .finish()
    }
}
