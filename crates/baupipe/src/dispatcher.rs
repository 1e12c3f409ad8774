use crate::{
    AssemblerFactory, GroupId, GroupProducer, Grouping, PoolConfig, Printer, Profile, Result,
    UniqueEncoder, UniqueId, WorkerPool,
};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Routes groups and their profiles from caller ids into the worker pool.
///
/// Caller-chosen [`GroupId`]s are mapped to compact [`UniqueId`]s by the
/// encoder for as long as the group is open. Once released, the external id
/// may be dispatched again while the previous incarnation is still being
/// assembled under its old internal id.
#[derive(Debug)]
pub struct ConcurrentDispatcher {
    encoder: UniqueEncoder,
    grouping: Arc<Grouping>,
    pool: WorkerPool,
}

impl ConcurrentDispatcher {
    pub fn new(
        encoder: UniqueEncoder,
        config: PoolConfig,
        factory: Arc<dyn AssemblerFactory>,
        printer: Arc<dyn Printer>,
    ) -> Self {
        let grouping = Arc::new(Grouping::new());
        let pool = WorkerPool::new(config, Arc::clone(&grouping), factory, printer);
        Self::from_parts(encoder, grouping, pool)
    }

    /// Builds a dispatcher over an existing registry and pool. `pool` must
    /// consume from `grouping`.
    pub fn from_parts(encoder: UniqueEncoder, grouping: Arc<Grouping>, pool: WorkerPool) -> Self {
        Self {
            encoder,
            grouping,
            pool,
        }
    }

    /// Opens `group` and hands it to a worker.
    ///
    /// # Errors
    /// Fails if the encoder is exhausted or already holds `group`, or if no
    /// worker could take it. Nothing stays behind on failure.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn dispatch_group(&self, group: GroupId) -> Result<UniqueId> {
        let unique = self.encoder.encode(group)?;
        if let Err(e) = self.grouping.create_group(unique) {
            self.release_encoding(group);
            return Err(e.into());
        }
        if let Err(e) = self.pool.distribute(unique) {
            self.rollback(group, unique);
            return Err(e.into());
        }
        Ok(unique)
    }

    fn rollback(&self, group: GroupId, unique: UniqueId) {
        if let Err(_e) = self.grouping.mark_final(unique) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to close group {group} ({unique}) on rollback: {_e}");
        }
        if let Err(_e) = self.grouping.delete_group(unique) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to roll back group {group} ({unique}): {_e}");
        }
        self.release_encoding(group);
    }

    fn release_encoding(&self, group: GroupId) {
        if let Err(_e) = self.encoder.remove(group) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to release encoding of group {group} on rollback: {_e}");
        }
    }

    /// Appends `profile` to the open `group`.
    ///
    /// # Errors
    /// Fails if `group` is not dispatched or was already released.
    pub fn dispatch_profile(&self, profile: Box<dyn Profile>, group: GroupId) -> Result<()> {
        let unique = self.encoder.get_encoding(group)?;
        self.grouping.insert(profile, unique)?;
        Ok(())
    }

    /// Marks `group` final and frees its external id.
    ///
    /// # Errors
    /// Fails if `group` is not dispatched.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn release_group(&self, group: GroupId) -> Result<UniqueId> {
        let unique = self.encoder.get_encoding(group)?;
        self.grouping.mark_final(unique)?;
        self.encoder.remove(group)?;
        Ok(unique)
    }

    pub fn encoder(&self) -> &UniqueEncoder {
        &self.encoder
    }

    pub fn grouping(&self) -> &Arc<Grouping> {
        &self.grouping
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubProfile;
    use crate::{
        BackoffConfig, CollectingPrinter, EncoderError, Error, GroupError,
        StreamingAssemblerFactory,
    };
    use core::time::Duration;
    use std::thread;
    use std::time::Instant;

    fn dispatcher(
        encoder: UniqueEncoder,
        num_workers: usize,
    ) -> (ConcurrentDispatcher, Arc<CollectingPrinter>) {
        let printer = Arc::new(CollectingPrinter::new());
        let config = PoolConfig {
            num_workers,
            backoff: BackoffConfig {
                base: Duration::from_millis(1),
                rate: 2,
                ceiling: Some(Duration::from_millis(10)),
            },
        };
        let dispatcher = ConcurrentDispatcher::new(
            encoder,
            config,
            Arc::new(StreamingAssemblerFactory::default()),
            printer.clone(),
        );
        (dispatcher, printer)
    }

    fn wait_for(printer: &CollectingPrinter, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while printer.len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        printer.documents()
    }

    #[test]
    fn dispatch_profile_release_prints_document() {
        let (d, printer) = dispatcher(UniqueEncoder::unbounded(), 2);
        d.dispatch_group(4_000_000_000).unwrap();
        d.dispatch_profile(StubProfile::new(1, r#""x":1"#).boxed(), 4_000_000_000)
            .unwrap();
        d.release_group(4_000_000_000).unwrap();
        assert!(d.encoder().is_empty());
        assert_eq!(wait_for(&printer, 1), [r#"{"x":1}"#]);
    }

    #[test]
    fn group_id_is_reusable_after_release() {
        let (d, printer) = dispatcher(UniqueEncoder::unbounded(), 1);
        let first = d.dispatch_group(7).unwrap();
        d.dispatch_profile(StubProfile::new(1, r#""n":1"#).boxed(), 7)
            .unwrap();
        d.release_group(7).unwrap();

        let second = d.dispatch_group(7).unwrap();
        assert_ne!(first, second);
        d.dispatch_profile(StubProfile::new(1, r#""n":2"#).boxed(), 7)
            .unwrap();
        d.release_group(7).unwrap();

        let mut docs = wait_for(&printer, 2);
        docs.sort();
        assert_eq!(docs, [r#"{"n":1}"#, r#"{"n":2}"#]);
    }

    #[test]
    fn double_dispatch_fails_and_keeps_group() {
        let (d, _) = dispatcher(UniqueEncoder::unbounded(), 1);
        let unique = d.dispatch_group(1).unwrap();
        assert_eq!(
            d.dispatch_group(1),
            Err(Error::Encoder(EncoderError::Reencoding(1)))
        );
        assert_eq!(d.encoder().get_encoding(1), Ok(unique));
        assert!(d.grouping().contains(unique));
    }

    #[test]
    fn unknown_group_is_rejected() {
        let (d, _) = dispatcher(UniqueEncoder::unbounded(), 1);
        assert_eq!(
            d.dispatch_profile(StubProfile::new(1, "x").boxed(), 9),
            Err(Error::Encoder(EncoderError::NotFound(9)))
        );
        assert_eq!(
            d.release_group(9),
            Err(Error::Encoder(EncoderError::NotFound(9)))
        );
    }

    #[test]
    fn profile_after_release_is_rejected() {
        let (d, _) = dispatcher(UniqueEncoder::unbounded(), 1);
        d.dispatch_group(3).unwrap();
        d.release_group(3).unwrap();
        assert!(d.dispatch_profile(StubProfile::new(1, "x").boxed(), 3).is_err());
    }

    #[test]
    fn exhausted_encoder_fails_dispatch() {
        let (d, _) = dispatcher(UniqueEncoder::bounded(0, 0).unwrap(), 1);
        d.dispatch_group(1).unwrap();
        assert_eq!(
            d.dispatch_group(2),
            Err(Error::Encoder(EncoderError::FullCapacity { capacity: 1 }))
        );
    }

    #[test]
    fn failed_distribution_rolls_back() {
        let (d, _) = dispatcher(UniqueEncoder::unbounded(), 0);
        assert!(matches!(d.dispatch_group(5), Err(Error::Distribution(_))));
        assert!(d.encoder().is_empty());
        assert!(d.grouping().is_empty());
        assert_eq!(d.pool().in_flight(), 0);
    }

    #[test]
    fn failed_group_creation_releases_the_encoding() {
        let grouping = Arc::new(Grouping::new());
        grouping.create_group(0).unwrap();
        let pool = WorkerPool::new(
            PoolConfig::default(),
            Arc::clone(&grouping),
            Arc::new(StreamingAssemblerFactory::default()),
            Arc::new(CollectingPrinter::new()),
        );
        let d = ConcurrentDispatcher::from_parts(UniqueEncoder::unbounded(), grouping, pool);

        assert_eq!(
            d.dispatch_group(8),
            Err(Error::Group(GroupError::AlreadyExists(0)))
        );
        assert!(d.encoder().is_empty());
        assert_eq!(d.grouping().len(), 1);
        assert_eq!(d.pool().in_flight(), 0);
        assert_eq!(d.dispatch_group(8), Ok(1));
    }

    #[test]
    fn release_twice_fails() {
        let (d, _) = dispatcher(UniqueEncoder::unbounded(), 1);
        d.dispatch_group(2).unwrap();
        d.release_group(2).unwrap();
        assert_eq!(
            d.release_group(2),
            Err(Error::Encoder(EncoderError::NotFound(2)))
        );
    }
}
