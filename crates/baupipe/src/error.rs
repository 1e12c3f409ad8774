//! Error types for the telemetry pipeline.
//!
//! Every component reports contract violations through its own small error
//! enum. These are signals to the caller and are never retried internally:
//!
//! - [`EncoderError`]: bounds, capacity and (re-)encoding misuse.
//! - [`GroupError`]: registry misuse (double create, missing group, deleting
//!   a group that is still open or still holds events).
//! - [`ConnectionError`]: connection ledger misuse.
//! - [`SchedulingError`] / [`DistributionError`]: no live worker could take a
//!   group.
//! - [`OrderError`]: malformed dependency configurations.
//! - [`AssemblerError`]: factory lookup and parameter failures.
//! - [`ProfilerError`]: façade misuse (attach/detach).
//!
//! [`Error`] aggregates all of them so higher layers can use `?` freely.

/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    #[error(transparent)]
    Profiler(#[from] ProfilerError),
}

/// Failures of the [`UniqueEncoder`](crate::UniqueEncoder).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncoderError {
    /// The requested internal id range is empty, negative or does not fit the
    /// internal id type.
    #[error("invalid encoder bounds [{min}, {max}]")]
    Boundary { min: i64, max: i64 },

    /// Every internal id in range is currently live.
    #[error("encoder exhausted ({capacity} live ids)")]
    FullCapacity { capacity: u64 },

    /// The external group id already holds an encoding.
    #[error("group {0} is already encoded")]
    Reencoding(u64),

    /// The external group id holds no encoding.
    #[error("group {0} has no encoding")]
    NotFound(u64),
}

/// Failures of the group registry. All carry the internal group id.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("group {0} already exists")]
    AlreadyExists(u32),

    #[error("group {0} does not exist")]
    NotFound(u32),

    #[error("group {0} has no pending events")]
    Empty(u32),

    #[error("group {0} still holds pending events")]
    NotEmpty(u32),

    #[error("group {0} has not been marked final")]
    NotFinal(u32),
}

/// Failures of a worker's [`GroupConnections`](crate::GroupConnections).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// No connection other than the one in service is queued.
    #[error("no connection available for service")]
    Unavailable,

    /// `disconnect` was called while nothing was in service.
    #[error("no connection is in service")]
    NotServicing,
}

/// The scheduling policy found no live worker.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no live worker to schedule on")]
pub struct SchedulingError;

/// A group could not be handed to any worker.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DistributionError {
    #[error("failed to distribute group {group}: {source}")]
    NoLiveWorker {
        group: u32,
        #[source]
        source: SchedulingError,
    },

    #[error("failed to start worker {worker}: {reason}")]
    Spawn { worker: usize, reason: String },
}

/// Malformed dependency configurations detected while ordering a group.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// Two dependents matched the same placed anchor independently.
    #[error("profiles {first} and {second} both depend on the same profile {anchor}")]
    Diamond { anchor: u32, first: u32, second: u32 },
}

/// Failures looking up or configuring an assembler factory.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AssemblerError {
    #[error("no assembler factory registered as `{0}`")]
    UnknownFactory(String),

    #[error("invalid parameters for assembler factory `{factory}`: {reason}")]
    InvalidParams { factory: String, reason: String },
}

/// Misuse of the [`Profiler`](crate::Profiler) façade.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProfilerError {
    #[error("group {0} attached multiple times")]
    AlreadyAttached(u64),

    #[error("group {0} is not attached")]
    NotAttached(u64),
}
