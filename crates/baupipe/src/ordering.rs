use crate::{OrderError, Profile};
use core::fmt;
use std::collections::{HashMap, VecDeque};

/// Collects one group's profiles and emits them in dependency order.
///
/// Profiles without a dependency keep their arrival order. A profile that
/// depends on slot `D` waits in a per-`D` queue and is spliced in directly
/// after the next placed profile whose id is `D` and which it accepts through
/// [`Profile::predicate`]. Dependents are placed like any other profile, so a
/// run of profiles depending on their own id unrolls as one contiguous chain
/// behind the profile that started it.
///
/// This is a single pass over linear chains, not a topological sort.
///
/// ```
/// use baupipe::{Conversion, OrderedProfiles, Profile};
///
/// struct Event(u32, Option<u32>);
///
/// impl Profile for Event {
///     fn id(&self) -> u32 { self.0 }
///     fn dependency_id(&self) -> Option<u32> { self.1 }
///     fn convert(&self) -> Conversion { Conversion::flat(0, self.0.to_string()) }
/// }
///
/// let mut builder = OrderedProfiles::new();
/// builder.insert(Box::new(Event(1, None)));
/// builder.insert(Box::new(Event(2, None)));
/// builder.insert(Box::new(Event(3, Some(1))));
///
/// let ids: Vec<_> = builder.build().unwrap().iter().map(|p| p.id()).collect();
/// assert_eq!(ids, [1, 3, 2]);
/// ```
#[derive(Default)]
pub struct OrderedProfiles {
    independent: VecDeque<Box<dyn Profile>>,
    dependents: HashMap<u32, VecDeque<Box<dyn Profile>>>,
    len: usize,
}

impl OrderedProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: Box<dyn Profile>) {
        match profile.dependency_id() {
            Some(dependency) => self
                .dependents
                .entry(dependency)
                .or_default()
                .push_back(profile),
            None => self.independent.push_back(profile),
        }
        self.len += 1;
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consumes the builder and returns the ordered profiles.
    ///
    /// Dependents whose anchor never matched are dropped.
    ///
    /// # Errors
    /// [`OrderError::Diamond`] if a left over dependent accepts an anchor
    /// that another dependent already claimed.
    pub fn build(self) -> Result<Vec<Box<dyn Profile>>, OrderError> {
        let Self {
            mut independent,
            mut dependents,
            len,
        } = self;
        let mut ordered = Vec::with_capacity(len);
        // Per anchor slot: position of each claimed anchor and its dependent.
        let mut claimed: HashMap<u32, Vec<(usize, u32)>> = HashMap::new();

        while let Some(profile) = independent.pop_front() {
            let anchor = profile.id();
            if let Some(waiting) = dependents.get_mut(&anchor) {
                if waiting.front().is_some_and(|d| d.predicate(&*profile)) {
                    if let Some(dependent) = waiting.pop_front() {
                        claimed
                            .entry(anchor)
                            .or_default()
                            .push((ordered.len(), dependent.id()));
                        independent.push_front(dependent);
                    }
                }
            }
            ordered.push(profile);
        }

        let mut anchors: Vec<_> = dependents
            .into_iter()
            .filter(|(_, waiting)| !waiting.is_empty())
            .collect();
        anchors.sort_unstable_by_key(|(anchor, _)| *anchor);
        for (anchor, waiting) in anchors {
            for second in &waiting {
                let contested = claimed.get(&anchor).and_then(|claims| {
                    claims
                        .iter()
                        .find(|(placed, _)| second.predicate(&*ordered[*placed]))
                });
                if let Some(&(_, first)) = contested {
                    return Err(OrderError::Diamond {
                        anchor,
                        first,
                        second: second.id(),
                    });
                }
            }
            #[cfg(feature = "tracing")]
            tracing::warn!(
                anchor,
                dropped = waiting.len(),
                "dropping profiles whose dependency never matched"
            );
        }
        Ok(ordered)
    }
}

impl fmt::Debug for OrderedProfiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedProfiles")
            .field("independent", &self.independent.len())
            .field("anchors", &self.dependents.len())
            .field("len", &self.len)
            .finish()
    }
}
