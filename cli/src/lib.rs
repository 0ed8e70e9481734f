pub mod app;
pub mod args;
pub mod console;
pub mod logging;
pub mod quit;

pub use app::{AppError, run};
pub use args::Args;
pub use console::ConsoleSink;
