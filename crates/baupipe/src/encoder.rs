use crate::{EncoderError, GroupId, UniqueId};
use parking_lot::Mutex;
use std::collections::{HashMap, hash_map::Entry};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A bidirectional mapping from caller-chosen group ids to a compact,
/// reusable internal id range `[min, max]`.
///
/// Internal ids are handed out by a circular pointer that advances on every
/// allocation attempt and wraps from `max` back to `min`. Occupied ids are
/// skipped, so reuse is FIFO-by-wraparound rather than smallest-first:
///
/// - low churn: allocation is O(1) amortized,
/// - high occupancy: at most `capacity` probes before an id is found,
/// - full: [`EncoderError::FullCapacity`] is returned before probing.
///
/// At most `max - min + 1` internal ids are live at once.
///
/// # Example
/// ```
/// use baupipe::UniqueEncoder;
///
/// let encoder = UniqueEncoder::bounded(0, 1).unwrap();
/// let first = encoder.encode(1_000).unwrap();
/// let second = encoder.encode(2_000).unwrap();
/// assert_ne!(first, second);
/// assert!(encoder.encode(3_000).is_err());
///
/// encoder.remove(1_000).unwrap();
/// assert_eq!(encoder.encode(3_000).unwrap(), first);
/// ```
#[derive(Debug)]
pub struct UniqueEncoder {
    tables: Mutex<Tables>,
    min: UniqueId,
    max: UniqueId,
    capacity: u64,
}

#[derive(Debug)]
struct Tables {
    encoding: HashMap<GroupId, UniqueId>,
    reverse: HashMap<UniqueId, GroupId>,
    pointer: UniqueId,
}

impl UniqueEncoder {
    /// Creates an encoder over the internal id range `[min, max]`.
    ///
    /// # Errors
    /// Returns [`EncoderError::Boundary`] if `min < 0`, `min > max`, or `max`
    /// does not fit the internal id type.
    pub fn bounded(min: i64, max: i64) -> Result<Self, EncoderError> {
        if min < 0 || min > max || max > i64::from(UniqueId::MAX) {
            return Err(EncoderError::Boundary { min, max });
        }
        let (min, max) = (min as UniqueId, max as UniqueId);
        Ok(Self {
            tables: Mutex::new(Tables {
                encoding: HashMap::new(),
                reverse: HashMap::new(),
                pointer: min,
            }),
            min,
            max,
            capacity: u64::from(max - min) + 1,
        })
    }

    /// Creates an encoder spanning `[0, i32::MAX]`.
    pub fn unbounded() -> Self {
        Self {
            tables: Mutex::new(Tables {
                encoding: HashMap::new(),
                reverse: HashMap::new(),
                pointer: 0,
            }),
            min: 0,
            max: i32::MAX as UniqueId,
            capacity: i32::MAX as u64 + 1,
        }
    }

    /// Number of internal ids that may be live at once.
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of currently live encodings.
    pub fn len(&self) -> usize {
        self.tables.lock().reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assigns a fresh internal id to `group` and returns it.
    ///
    /// # Errors
    /// - [`EncoderError::FullCapacity`] if every internal id is live.
    /// - [`EncoderError::Reencoding`] if `group` is already encoded. The
    ///   tentatively claimed internal id is released first, so existing
    ///   encodings are left untouched.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn encode(&self, group: GroupId) -> Result<UniqueId, EncoderError> {
        let mut tables = self.tables.lock();
        let unique = self.claim(&mut tables, group)?;

        if tables.encoding.contains_key(&group) {
            tables.reverse.remove(&unique);
            return Err(EncoderError::Reencoding(group));
        }
        tables.encoding.insert(group, unique);
        Ok(unique)
    }

    fn claim(&self, tables: &mut Tables, group: GroupId) -> Result<UniqueId, EncoderError> {
        loop {
            if tables.reverse.len() as u64 == self.capacity {
                return Err(EncoderError::FullCapacity {
                    capacity: self.capacity,
                });
            }
            let candidate = tables.pointer;
            tables.pointer = if candidate == self.max {
                self.min
            } else {
                candidate + 1
            };
            if let Entry::Vacant(slot) = tables.reverse.entry(candidate) {
                slot.insert(group);
                return Ok(candidate);
            }
        }
    }

    /// Returns the internal id currently assigned to `group`.
    ///
    /// # Errors
    /// Returns [`EncoderError::NotFound`] if `group` is not encoded.
    pub fn get_encoding(&self, group: GroupId) -> Result<UniqueId, EncoderError> {
        self.tables
            .lock()
            .encoding
            .get(&group)
            .copied()
            .ok_or(EncoderError::NotFound(group))
    }

    /// Frees both directions of `group`'s encoding.
    ///
    /// # Errors
    /// Returns [`EncoderError::NotFound`] if `group` is not encoded.
    pub fn remove(&self, group: GroupId) -> Result<UniqueId, EncoderError> {
        let mut tables = self.tables.lock();
        let unique = tables
            .encoding
            .remove(&group)
            .ok_or(EncoderError::NotFound(group))?;
        tables.reverse.remove(&unique);
        Ok(unique)
    }
}

impl Default for UniqueEncoder {
    fn default() -> Self {
        Self::unbounded()
    }
}
