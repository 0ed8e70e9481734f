//! Scrolling terminal sink.
//!
//! Segments are written with 24-bit ANSI colours on the palette background.
//! Linked segments become OSC-8 hyperlinks, which terminals without support
//! show as plain text.

use std::io::{self, Write};

use sclm_core::Sink;
use sclm_core::events::{Notice, Record};
use sclm_core::render::{Rgb, Segment, palette, render_notice, render_record};
use tracing::warn;

const RESET: &str = "\x1b[0m";
const ERASE_TO_EOL: &str = "\x1b[K";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub struct ConsoleSink<W: Write> {
    out: W,
    failed: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, segments: &[Segment]) {
        if self.failed {
            return;
        }
        let line = format_line(segments);
        if let Err(e) = self.out.write_all(line.as_bytes()) {
            self.fail(e);
        }
    }

    fn fail(&mut self, e: io::Error) {
        warn!(error = %e, "Console output failed");
        self.failed = true;
    }
}

fn foreground(rgb: Rgb) -> String {
    format!("\x1b[38;2;{};{};{}m", rgb.0, rgb.1, rgb.2)
}

fn background(rgb: Rgb) -> String {
    format!("\x1b[48;2;{};{};{}m", rgb.0, rgb.1, rgb.2)
}

/// One terminal line, background filled to the right edge.
pub fn format_line(segments: &[Segment]) -> String {
    let mut line = background(palette::BACKGROUND);
    for segment in segments {
        line.push_str(&foreground(segment.style.color()));
        match &segment.link {
            Some(url) => {
                line.push_str(&format!("\x1b]8;;{url}\x1b\\{}\x1b]8;;\x1b\\", segment.text));
            }
            None => line.push_str(&segment.text),
        }
    }
    line.push_str(ERASE_TO_EOL);
    line.push_str(RESET);
    line.push('\n');
    line
}

impl<W: Write> Sink for ConsoleSink<W> {
    fn accept(&mut self, record: &Record) {
        self.write_line(&render_record(record));
    }

    fn notice(&mut self, notice: &Notice) {
        // The overlay announces itself in its own window
        if *notice == Notice::OverlayBanner {
            return;
        }
        self.write_line(&render_notice(notice));
    }

    fn clear(&mut self) {
        if self.failed {
            return;
        }
        if let Err(e) = self.out.write_all(CLEAR_SCREEN.as_bytes()) {
            self.fail(e);
        }
    }

    fn tick(&mut self) -> bool {
        if !self.failed
            && let Err(e) = self.out.flush()
        {
            self.fail(e);
        }
        !self.failed
    }
}
