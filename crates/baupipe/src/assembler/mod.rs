mod interface;
mod node;
mod registry;
mod streaming;

pub use interface::*;
pub use node::*;
pub use registry::*;
pub use streaming::*;
