//! Logging abstractions for runtime-agnostic logging

mod noop;
mod tracing_logger;
mod traits;

#[cfg(test)]
pub(crate) mod capture;

pub use noop::NoOpLogger;
pub use tracing_logger::TracingLogger;
pub use traits::{Logger, SharedLogger};
