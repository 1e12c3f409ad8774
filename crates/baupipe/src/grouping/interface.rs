use crate::{GroupError, Profile, UniqueId};
use std::sync::Arc;

/// The producing side of the group registry: used by dispatchers on caller
/// threads.
pub trait GroupProducer: Send + Sync {
    /// # Errors
    /// [`GroupError::AlreadyExists`] if `id` is already registered.
    fn create_group(&self, id: UniqueId) -> Result<(), GroupError>;

    /// Appends `profile` to the tail of group `id`.
    ///
    /// # Errors
    /// [`GroupError::NotFound`] if `id` is not registered.
    fn insert(&self, profile: Box<dyn Profile>, id: UniqueId) -> Result<(), GroupError>;

    /// Declares that no more profiles will arrive for `id`.
    ///
    /// # Errors
    /// [`GroupError::NotFound`] if `id` is not registered.
    fn mark_final(&self, id: UniqueId) -> Result<(), GroupError>;
}

/// The consuming side of the group registry: owned by exactly one worker.
pub trait GroupConsumer: Send {
    /// Whether group `id` currently holds a pending profile. Unknown groups
    /// have none.
    fn has_next(&mut self, id: UniqueId) -> bool;

    /// Pops the head of group `id`.
    ///
    /// # Errors
    /// [`GroupError::NotFound`] or [`GroupError::Empty`].
    fn next(&mut self, id: UniqueId) -> Result<Box<dyn Profile>, GroupError>;

    fn is_final(&self, id: UniqueId) -> bool;

    /// Removes group `id` for good.
    ///
    /// # Errors
    /// - [`GroupError::NotFound`] if `id` is not registered.
    /// - [`GroupError::NotEmpty`] if profiles are still pending.
    /// - [`GroupError::NotFinal`] if `id` was never marked final.
    fn delete_group(&mut self, id: UniqueId) -> Result<(), GroupError>;
}

impl<P: GroupProducer + ?Sized> GroupProducer for Arc<P> {
    fn create_group(&self, id: UniqueId) -> Result<(), GroupError> {
        (**self).create_group(id)
    }

    fn insert(&self, profile: Box<dyn Profile>, id: UniqueId) -> Result<(), GroupError> {
        (**self).insert(profile, id)
    }

    fn mark_final(&self, id: UniqueId) -> Result<(), GroupError> {
        (**self).mark_final(id)
    }
}
