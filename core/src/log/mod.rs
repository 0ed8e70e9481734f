mod line;
mod tailer;

pub use line::{LogLine, decode_line};
pub use tailer::{FileIdentity, ResetReason, TailState, TailStatus, Tailer};
