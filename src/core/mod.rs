//! Core application primitives (workers, scheduler, watchdog, HTTP)

pub mod http;
pub mod runtime;
pub mod scheduler;
pub mod watchdog;

pub use http::*;
pub use runtime::*;
pub use scheduler::*;
pub use watchdog::*;
