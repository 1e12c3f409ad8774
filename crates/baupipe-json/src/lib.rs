#![doc = include_str!("../README.md")]

mod factory;
mod nodes;
mod pretty;

pub use crate::factory::*;
pub use crate::nodes::*;
pub use crate::pretty::*;
