mod interface;
mod registry;
#[cfg(test)]
mod tests;

pub use interface::*;
pub use registry::*;
