mod manager;
mod runner;
mod scheduler;
mod state;
mod worker;

pub use manager::*;
pub use runner::*;
pub use scheduler::*;
pub use state::*;
pub use worker::*;
