//! Fan-out of records to independently paced sinks.

mod consumer;
mod dispatcher;
mod sink;

pub use dispatcher::{DEFAULT_STALL_TIMEOUT, Dispatcher};
pub use sink::{Delivery, Sink, SinkFilter};
