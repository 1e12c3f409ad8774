//! The façade host applications talk to.
//!
//! A [`Profiler`] tracks which caller groups are attached and routes each
//! profile to one of three places:
//!
//! - the group itself, prepared and dispatched, once the group is attached,
//! - a link cache, while the group is not attached but a link names where
//!   its profiles should wait (a hard link set by [`Profiler::link`] wins over
//!   the soft link passed alongside the profile),
//! - nowhere, when the group is disabled or no link applies.
//!
//! Cached profiles are replayed into the first group attached with
//! [`Profiler::attach_linked`] under the same link.

use crate::{ConcurrentDispatcher, GroupId, Profile, ProfilerError, Result, Timed, Timer};
use core::fmt;
use core::hash::{Hash, Hasher};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Reduces any hashable link value to the key profiles are cached under.
pub fn link_key<T: Hash + ?Sized>(link: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    link.hash(&mut hasher);
    hasher.finish()
}

struct Active {
    dispatcher: ConcurrentDispatcher,
    verbose: bool,
    attached: Mutex<HashSet<GroupId>>,
    disabled: RwLock<HashSet<GroupId>>,
    hard_links: RwLock<HashMap<GroupId, u64>>,
    cache: Mutex<HashMap<u64, Vec<Box<dyn Profile>>>>,
}

/// Entry point for emitting profiles into the pipeline.
///
/// A profiler built with [`Profiler::disabled`] accepts every call and does
/// nothing, so instrumented code needs no conditionals of its own.
///
/// # Example
/// ```
/// use baupipe::{
///     CollectingPrinter, ConcurrentDispatcher, Conversion, PoolConfig, Profile, Profiler,
///     StreamingAssemblerFactory, UniqueEncoder,
/// };
/// use std::sync::Arc;
///
/// struct Hit(u32);
///
/// impl Profile for Hit {
///     fn id(&self) -> u32 {
///         self.0
///     }
///
///     fn convert(&self) -> Conversion {
///         Conversion::flat(0, format!("\"hit{}\":true", self.0))
///     }
/// }
///
/// let printer = Arc::new(CollectingPrinter::new());
/// let profiler = Profiler::new(
///     ConcurrentDispatcher::new(
///         UniqueEncoder::unbounded(),
///         PoolConfig::default(),
///         Arc::new(StreamingAssemblerFactory::default()),
///         printer.clone(),
///     ),
///     false,
/// );
///
/// profiler.attach(42).unwrap();
/// profiler.profile(Box::new(Hit(1)), 42).unwrap();
/// profiler.detach(42).unwrap();
/// ```
pub struct Profiler {
    inner: Option<Active>,
}

impl Profiler {
    /// Creates an active profiler. `verbose` is handed to every profile
    /// before it is dispatched.
    pub fn new(dispatcher: ConcurrentDispatcher, verbose: bool) -> Self {
        Self {
            inner: Some(Active {
                dispatcher,
                verbose,
                attached: Mutex::new(HashSet::new()),
                disabled: RwLock::new(HashSet::new()),
                hard_links: RwLock::new(HashMap::new()),
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A profiler whose every operation is a no-op.
    pub const fn disabled() -> Self {
        Self { inner: None }
    }

    pub const fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn dispatcher(&self) -> Option<&ConcurrentDispatcher> {
        self.inner.as_ref().map(|active| &active.dispatcher)
    }

    /// Makes `profile` calls for `group` effective again.
    pub fn enable(&self, group: GroupId) {
        if let Some(active) = &self.inner {
            active.disabled.write().remove(&group);
        }
    }

    /// Makes `profile` calls for `group` no-ops until re-enabled.
    pub fn disable(&self, group: GroupId) {
        if let Some(active) = &self.inner {
            active.disabled.write().insert(group);
        }
    }

    /// Caches profiles for the unattached `group` under `link`, overriding any
    /// soft link passed with them.
    pub fn link<T: Hash + ?Sized>(&self, group: GroupId, link: &T) {
        if let Some(active) = &self.inner {
            active.hard_links.write().insert(group, link_key(link));
        }
    }

    pub fn unlink(&self, group: GroupId) {
        if let Some(active) = &self.inner {
            active.hard_links.write().remove(&group);
        }
    }

    /// Opens `group` in the pipeline.
    ///
    /// # Errors
    /// - [`ProfilerError::AlreadyAttached`] if `group` is attached.
    /// - Any dispatch failure, in which case `group` stays detached.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn attach(&self, group: GroupId) -> Result<()> {
        let Some(active) = &self.inner else {
            return Ok(());
        };
        let mut attached = active.attached.lock();
        if attached.contains(&group) {
            return Err(ProfilerError::AlreadyAttached(group).into());
        }
        active.dispatcher.dispatch_group(group)?;
        attached.insert(group);
        Ok(())
    }

    /// Opens `group` and replays every profile cached under `link` into it.
    ///
    /// # Errors
    /// Same as [`attach`](Self::attach). A failed replay leaves the remaining
    /// cached profiles discarded.
    pub fn attach_linked<T: Hash + ?Sized>(&self, group: GroupId, link: &T) -> Result<()> {
        let Some(active) = &self.inner else {
            return Ok(());
        };
        self.attach(group)?;

        let cached = active.cache.lock().remove(&link_key(link));
        if let Some(profiles) = cached {
            #[cfg(feature = "tracing")]
            tracing::debug!("Replaying {} cached profiles into group {group}", profiles.len());
            for profile in profiles {
                active.dispatch(profile, group)?;
            }
        }
        Ok(())
    }

    /// Closes `group`. Its document is emitted once the pipeline drained it.
    ///
    /// # Errors
    /// [`ProfilerError::NotAttached`] if `group` is not attached.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn detach(&self, group: GroupId) -> Result<()> {
        let Some(active) = &self.inner else {
            return Ok(());
        };
        let mut attached = active.attached.lock();
        if !attached.contains(&group) {
            return Err(ProfilerError::NotAttached(group).into());
        }
        active.dispatcher.release_group(group)?;
        attached.remove(&group);
        Ok(())
    }

    /// Discards every cached profile.
    pub fn clean(&self) {
        if let Some(active) = &self.inner {
            active.cache.lock().clear();
        }
    }

    /// Emits `profile` for `group`.
    ///
    /// # Errors
    /// Fails only if dispatching into an attached group fails.
    pub fn profile(&self, profile: Box<dyn Profile>, group: GroupId) -> Result<()> {
        match &self.inner {
            Some(active) => active.route(profile, group, None),
            None => Ok(()),
        }
    }

    /// Emits `profile` for `group`, caching it under `link` if the group is not
    /// attached and has no hard link.
    ///
    /// # Errors
    /// Same as [`profile`](Self::profile).
    pub fn profile_linked<T: Hash + ?Sized>(
        &self,
        profile: Box<dyn Profile>,
        group: GroupId,
        link: &T,
    ) -> Result<()> {
        match &self.inner {
            Some(active) => active.route(profile, group, Some(link_key(link))),
            None => Ok(()),
        }
    }

    /// Emits a timed profile and returns the caller's end of its timer.
    ///
    /// A disabled profiler returns an inert timer.
    ///
    /// # Errors
    /// Same as [`profile`](Self::profile).
    pub fn tprofile<P>(&self, profile: P, group: GroupId) -> Result<Timer>
    where
        P: Profile + Timed + 'static,
    {
        match &self.inner {
            Some(active) => {
                let (profile, timer) = timed(profile);
                active.route(profile, group, None)?;
                Ok(timer)
            }
            None => Ok(Timer::inert()),
        }
    }

    /// [`tprofile`](Self::tprofile) with a soft link.
    ///
    /// # Errors
    /// Same as [`profile`](Self::profile).
    pub fn tprofile_linked<P, T>(&self, profile: P, group: GroupId, link: &T) -> Result<Timer>
    where
        P: Profile + Timed + 'static,
        T: Hash + ?Sized,
    {
        match &self.inner {
            Some(active) => {
                let (profile, timer) = timed(profile);
                active.route(profile, group, Some(link_key(link)))?;
                Ok(timer)
            }
            None => Ok(Timer::inert()),
        }
    }

    pub fn is_attached(&self, group: GroupId) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|active| active.attached.lock().contains(&group))
    }

    /// Number of profiles waiting under `link`.
    pub fn cached<T: Hash + ?Sized>(&self, link: &T) -> usize {
        self.inner.as_ref().map_or(0, |active| {
            active
                .cache
                .lock()
                .get(&link_key(link))
                .map_or(0, Vec::len)
        })
    }
}

fn timed<P: Profile + Timed + 'static>(mut profile: P) -> (Box<dyn Profile>, Timer) {
    let timer = Timer::new();
    profile.set_timer(timer.clone());
    (Box::new(profile), timer)
}

impl Active {
    fn route(&self, profile: Box<dyn Profile>, group: GroupId, soft: Option<u64>) -> Result<()> {
        if self.disabled.read().contains(&group) {
            return Ok(());
        }
        if self.attached.lock().contains(&group) {
            return self.dispatch(profile, group);
        }

        let hard = self.hard_links.read().get(&group).copied();
        match hard.or(soft) {
            Some(key) => self.cache.lock().entry(key).or_default().push(profile),
            None => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Dropped profile {} for unattached group {group}", profile.id());
            }
        }
        Ok(())
    }

    fn dispatch(&self, mut profile: Box<dyn Profile>, group: GroupId) -> Result<()> {
        profile.set_verbosity(self.verbose);
        profile.pre_process();
        self.dispatcher.dispatch_profile(profile, group)
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for Profiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(active) => f
                .debug_struct("Profiler")
                .field("dispatcher", &active.dispatcher)
                .field("verbose", &active.verbose)
                .field("attached", &active.attached.lock().len())
                .field("cached_links", &active.cache.lock().len())
                .finish(),
            None => f.write_str("Profiler(disabled)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubProfile;
    use crate::{
        BackoffConfig, CollectingPrinter, Error, PoolConfig, StreamingAssemblerFactory,
        UniqueEncoder,
    };
    use core::time::Duration;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn profiler(verbose: bool) -> (Profiler, Arc<CollectingPrinter>) {
        let printer = Arc::new(CollectingPrinter::new());
        let config = PoolConfig {
            num_workers: 2,
            backoff: BackoffConfig {
                base: Duration::from_millis(1),
                rate: 2,
                ceiling: Some(Duration::from_millis(10)),
            },
        };
        let dispatcher = ConcurrentDispatcher::new(
            UniqueEncoder::unbounded(),
            config,
            Arc::new(StreamingAssemblerFactory::default()),
            printer.clone(),
        );
        (Profiler::new(dispatcher, verbose), printer)
    }

    fn wait_for(printer: &CollectingPrinter, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while printer.len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        printer.documents()
    }

    fn event(id: u32, body: &str) -> Box<dyn Profile> {
        StubProfile::new(id, body).boxed()
    }

    #[test]
    fn attach_profile_detach() {
        let (p, printer) = profiler(false);
        p.attach(1).unwrap();
        assert!(p.is_attached(1));
        p.profile(event(1, r#""a":1"#), 1).unwrap();
        p.profile(event(2, r#""b":2"#), 1).unwrap();
        p.detach(1).unwrap();
        assert!(!p.is_attached(1));
        assert_eq!(wait_for(&printer, 1), [r#"{"a":1,"b":2}"#]);
    }

    #[test]
    fn attach_twice_fails() {
        let (p, _) = profiler(false);
        p.attach(1).unwrap();
        assert_eq!(
            p.attach(1),
            Err(Error::Profiler(ProfilerError::AlreadyAttached(1)))
        );
    }

    #[test]
    fn detach_unattached_fails() {
        let (p, _) = profiler(false);
        assert_eq!(
            p.detach(1),
            Err(Error::Profiler(ProfilerError::NotAttached(1)))
        );
    }

    #[test]
    fn reattach_after_detach() {
        let (p, printer) = profiler(false);
        for n in 0..3 {
            p.attach(5).unwrap();
            p.profile(event(1, &format!(r#""n":{n}"#)), 5).unwrap();
            p.detach(5).unwrap();
        }
        assert_eq!(wait_for(&printer, 3).len(), 3);
    }

    #[test]
    fn profiles_before_attach_without_link_are_dropped() {
        let (p, printer) = profiler(false);
        p.profile(event(1, r#""early":1"#), 1).unwrap();
        p.attach(1).unwrap();
        p.profile(event(2, r#""late":2"#), 1).unwrap();
        p.detach(1).unwrap();
        assert_eq!(wait_for(&printer, 1), [r#"{"late":2}"#]);
    }

    #[test]
    fn soft_link_cache_is_replayed_on_linked_attach() {
        let (p, printer) = profiler(false);
        p.profile_linked(event(1, r#""cached":1"#), 9, "request-7")
            .unwrap();
        assert_eq!(p.cached("request-7"), 1);

        p.attach_linked(1, "request-7").unwrap();
        assert_eq!(p.cached("request-7"), 0);
        p.profile(event(2, r#""live":2"#), 1).unwrap();
        p.detach(1).unwrap();
        assert_eq!(wait_for(&printer, 1), [r#"{"cached":1,"live":2}"#]);
    }

    #[test]
    fn hard_link_overrides_soft_link() {
        let (p, _) = profiler(false);
        p.link(3, &17_u64);
        p.profile_linked(event(1, "x"), 3, "soft").unwrap();
        assert_eq!(p.cached("soft"), 0);
        assert_eq!(p.cached(&17_u64), 1);

        p.unlink(3);
        p.profile_linked(event(1, "y"), 3, "soft").unwrap();
        assert_eq!(p.cached("soft"), 1);
    }

    #[test]
    fn hard_link_applies_without_soft_link() {
        let (p, _) = profiler(false);
        p.link(3, "hard");
        p.profile(event(1, "x"), 3).unwrap();
        assert_eq!(p.cached("hard"), 1);
    }

    #[test]
    fn clean_discards_caches() {
        let (p, printer) = profiler(false);
        p.profile_linked(event(1, r#""gone":1"#), 2, &"k").unwrap();
        p.clean();
        p.attach_linked(1, &"k").unwrap();
        p.profile(event(2, r#""kept":2"#), 1).unwrap();
        p.detach(1).unwrap();
        assert_eq!(wait_for(&printer, 1), [r#"{"kept":2}"#]);
    }

    #[test]
    fn disabled_group_ignores_profiles() {
        let (p, printer) = profiler(false);
        p.attach(1).unwrap();
        p.disable(1);
        p.profile(event(1, r#""muted":1"#), 1).unwrap();
        p.profile_linked(event(1, r#""muted":2"#), 1, "l").unwrap();
        assert_eq!(p.cached("l"), 0);
        p.enable(1);
        p.profile(event(2, r#""heard":3"#), 1).unwrap();
        p.detach(1).unwrap();
        assert_eq!(wait_for(&printer, 1), [r#"{"heard":3}"#]);
    }

    #[test]
    fn verbosity_and_pre_processing_are_applied() {
        let (p, printer) = profiler(true);
        p.attach(1).unwrap();
        p.profile(event(1, r#""v":1"#), 1).unwrap();
        p.detach(1).unwrap();
        // The stub marks verbose conversions with a trailing `!`.
        assert_eq!(wait_for(&printer, 1), [r#"{"v":1!}"#]);
    }

    #[test]
    fn tprofile_hands_out_a_shared_timer() {
        let (p, _) = profiler(false);
        p.attach(1).unwrap();
        let timer = p.tprofile(StubProfile::new(1, "t"), 1).unwrap();
        timer.start();
        thread::sleep(Duration::from_millis(2));
        timer.stop();
        assert!(timer.info().total_time() > 0);

        let linked = p
            .tprofile_linked(StubProfile::new(1, "t"), 2, "later")
            .unwrap();
        linked.start();
        assert_eq!(p.cached("later"), 1);
    }

    #[test]
    fn disabled_profiler_is_inert() {
        let p = Profiler::disabled();
        assert!(!p.is_enabled());
        p.attach(1).unwrap();
        p.attach(1).unwrap();
        p.link(1, "x");
        p.profile(event(1, "a"), 1).unwrap();
        p.profile_linked(event(1, "a"), 2, "x").unwrap();
        assert_eq!(p.cached("x"), 0);
        p.detach(7).unwrap();
        p.clean();

        let timer = p.tprofile(StubProfile::new(1, "t"), 1).unwrap();
        timer.start();
        timer.stop();
        assert_eq!(timer.info().total_time(), 0);
        assert!(p.dispatcher().is_none());
    }

    #[test]
    fn link_keys_depend_on_value() {
        assert_eq!(link_key("a"), link_key("a"));
        assert_ne!(link_key("a"), link_key("b"));
        assert_eq!(link_key(&42_u64), link_key(&42_u64));
    }
}
