mod backoff;
mod throttler;

pub use backoff::*;
pub use throttler::*;
