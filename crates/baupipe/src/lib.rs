#![doc = include_str!("../README.md")]

mod assembler;
mod config;
mod connections;
mod dispatcher;
mod encoder;
mod error;
mod grouping;
mod ordering;
mod pool;
mod printer;
mod profile;
mod profiler;
#[cfg(test)]
mod testing;
mod throttle;

pub use crate::assembler::*;
pub use crate::config::*;
pub use crate::connections::*;
pub use crate::dispatcher::*;
pub use crate::encoder::*;
pub use crate::error::*;
pub use crate::grouping::*;
pub use crate::ordering::*;
pub use crate::pool::*;
pub use crate::printer::*;
pub use crate::profile::*;
pub use crate::profiler::*;
pub use crate::throttle::*;

/// Caller-chosen group id, as seen by the façade.
pub type GroupId = u64;

/// Compact internal group id handed out by the [`UniqueEncoder`].
pub type UniqueId = u32;
