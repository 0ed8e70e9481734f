use std::time::{Duration, Instant};

use sclm_core::events::{Notice, Record};
use sclm_core::render::{render_notice, render_record};
use sclm_core::Sink;
use sclm_types::OverlaySettings;
use tracing::{debug, info};

use crate::buffer::LineBuffer;
use crate::frame::OverlayFrame;
use crate::layout::{overlay_geometry, select_monitor};
use crate::platform::{
    NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError, get_all_monitors,
};

/// Minimum time between two redraws.
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(50);
/// How often the window is put back on top.
pub const RAISE_INTERVAL: Duration = Duration::from_secs(1);
/// Event pump cadence; faster than the redraw so dragging stays smooth.
const POLL_CADENCE: Duration = Duration::from_millis(16);

/// Shows the last few records in an always-on-top window.
pub struct OverlaySink<P = NativeOverlay> {
    frame: OverlayFrame<P>,
    buffer: LineBuffer,
    last_draw: Option<Instant>,
    last_raise: Instant,
}

impl OverlaySink<NativeOverlay> {
    /// Create the native window on the configured display.
    ///
    /// Must run on the thread that will drive the sink.
    pub fn open(settings: &OverlaySettings) -> Result<Self, PlatformError> {
        let monitors = get_all_monitors();
        let monitor = select_monitor(&monitors, settings.display).ok_or(PlatformError::NoDisplay)?;
        if monitors.get(settings.display).is_none() {
            info!(
                display = settings.display,
                available = monitors.len(),
                "Overlay display not found, using the primary display"
            );
        }

        let geometry = overlay_geometry(monitor, settings.lines, settings.font_size);
        let window = NativeOverlay::new(OverlayConfig {
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            title: Notice::OverlayBanner.message(),
        })?;
        info!(
            monitor = %monitor.id,
            x = geometry.x,
            y = geometry.y,
            width = geometry.width,
            height = geometry.height,
            "Overlay window opened"
        );

        Self::with_window(window, settings)
    }
}

impl<P: OverlayPlatform> OverlaySink<P> {
    /// Wrap an existing window. The overlay banner is the first line shown.
    pub fn with_window(window: P, settings: &OverlaySettings) -> Result<Self, PlatformError> {
        let mut buffer = LineBuffer::new(settings.lines);
        buffer.push(render_notice(&Notice::OverlayBanner));

        Ok(Self {
            frame: OverlayFrame::new(window, settings.font_size)?,
            buffer,
            last_draw: None,
            last_raise: Instant::now(),
        })
    }

    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    pub fn frame(&self) -> &OverlayFrame<P> {
        &self.frame
    }

    fn redraw(&mut self) {
        self.frame.begin_frame();
        for (row, line) in self.buffer.lines().enumerate() {
            self.frame.draw_line(row, line);
        }
        self.frame.end_frame();
    }
}

impl<P: OverlayPlatform> Sink for OverlaySink<P> {
    fn accept(&mut self, record: &Record) {
        self.buffer.push(render_record(record));
    }

    fn notice(&mut self, notice: &Notice) {
        // The window opens with its own banner
        if *notice == Notice::Banner {
            return;
        }
        self.buffer.push(render_notice(notice));
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }

    fn tick(&mut self) -> bool {
        if !self.frame.window_mut().poll_events() {
            debug!("Overlay window closed");
            return false;
        }
        if self.frame.window_mut().take_damaged() {
            self.buffer.mark_dirty();
        }

        let now = Instant::now();
        let due = self
            .last_draw
            .is_none_or(|last| now.duration_since(last) >= REDRAW_INTERVAL);
        if due && self.buffer.take_dirty() {
            self.redraw();
            self.last_draw = Some(now);
        }

        if now.duration_since(self.last_raise) >= RAISE_INTERVAL {
            self.frame.window_mut().raise();
            self.last_raise = now;
        }
        true
    }

    fn cadence(&self) -> Duration {
        POLL_CADENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MonitorInfo;
    use sclm_core::events::{Event, UnmatchedLine};
    use sclm_core::log::LogLine;
    use sclm_core::render::plain_text;
    use sclm_types::EventType;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// In-memory window that records what the sink asked of it.
    struct HeadlessWindow {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        commits: usize,
        raises: usize,
        open: bool,
        damaged: bool,
    }

    impl OverlayPlatform for HeadlessWindow {
        fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
            Ok(Self {
                width: config.width,
                height: config.height,
                pixels: vec![0; (config.width * config.height * 4) as usize],
                commits: 0,
                raises: 0,
                open: true,
                damaged: false,
            })
        }

        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn x(&self) -> i32 {
            0
        }

        fn y(&self) -> i32 {
            0
        }

        fn set_position(&mut self, _x: i32, _y: i32) {}

        fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
            Some(&mut self.pixels)
        }

        fn commit(&mut self) {
            self.commits += 1;
        }

        fn raise(&mut self) {
            self.raises += 1;
        }

        fn poll_events(&mut self) -> bool {
            self.open
        }

        fn take_damaged(&mut self) -> bool {
            std::mem::take(&mut self.damaged)
        }

        fn get_monitors(&self) -> Vec<MonitorInfo> {
            Vec::new()
        }
    }

    fn settings(lines: usize) -> OverlaySettings {
        OverlaySettings {
            lines,
            ..OverlaySettings::default()
        }
    }

    fn sink(lines: usize) -> OverlaySink<HeadlessWindow> {
        let window = HeadlessWindow::new(OverlayConfig {
            x: 0,
            y: 0,
            width: 320,
            height: 103,
            title: String::new(),
        })
        .unwrap();
        OverlaySink::with_window(window, &settings(lines)).unwrap()
    }

    fn unmatched(text: &str) -> Record {
        Record::Unmatched(Arc::new(UnmatchedLine {
            line: LogLine {
                text: text.to_string(),
                offset: 0,
                read_at: chrono::Utc::now(),
            },
        }))
    }

    fn shown(sink: &OverlaySink<HeadlessWindow>) -> Vec<String> {
        sink.buffer().lines().map(plain_text).collect()
    }

    #[test]
    fn test_starts_with_overlay_banner() {
        let sink = sink(3);
        assert_eq!(shown(&sink), vec![Notice::OverlayBanner.message()]);
    }

    #[test]
    fn test_shows_only_the_last_lines() {
        let mut sink = sink(2);
        sink.notice(&Notice::Banner);
        sink.accept(&unmatched("one"));
        sink.accept(&unmatched("two"));
        sink.accept(&unmatched("three"));
        assert_eq!(shown(&sink), vec!["two", "three"]);

        sink.clear();
        assert!(sink.buffer().is_empty());
    }

    #[test]
    fn test_events_are_rendered() {
        let mut sink = sink(3);
        let event = Event {
            event_type: EventType::ActorStall,
            timestamp: chrono::Utc::now(),
            raw_line: String::new(),
            fields: [("player", "Carol"), ("type", "downstream"), ("length", "1.26")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            organizations: BTreeMap::new(),
        };
        sink.accept(&Record::Event(Arc::new(event)));

        let last = shown(&sink).pop().unwrap();
        assert!(last.contains("Carol"));
        assert!(last.contains("1.3"));
    }

    #[test]
    fn test_redraws_only_when_dirty_and_rate_limited() {
        let mut sink = sink(3);

        assert!(sink.tick());
        assert_eq!(sink.frame().window().commits, 1);

        // Nothing changed
        assert!(sink.tick());
        assert_eq!(sink.frame().window().commits, 1);

        // Changed, but inside the redraw interval
        sink.accept(&unmatched("fresh"));
        assert!(sink.tick());
        assert_eq!(sink.frame().window().commits, 1);

        std::thread::sleep(REDRAW_INTERVAL + Duration::from_millis(10));
        assert!(sink.tick());
        assert_eq!(sink.frame().window().commits, 2);
    }

    #[test]
    fn test_chrome_is_drawn_and_background_is_transparent() {
        let mut sink = sink(3);
        sink.tick();

        let window = sink.frame().window();
        let pixel = |x: u32, y: u32| {
            let i = ((y * window.width + x) * 4) as usize;
            window.pixels[i + 3]
        };
        // Border and drag indicator at the centre of the top edge
        assert!((100..=104).contains(&pixel(160, 1)));
        assert!(pixel(160, 4) > 0);
        // Bottom corner stays see-through
        assert_eq!(pixel(0, window.height - 1), 0);
    }

    #[test]
    fn test_window_is_raised_periodically() {
        let mut sink = sink(3);
        sink.tick();
        assert_eq!(sink.frame().window().raises, 0);

        std::thread::sleep(RAISE_INTERVAL + Duration::from_millis(20));
        sink.tick();
        sink.tick();
        assert_eq!(sink.frame().window().raises, 1);
    }

    #[test]
    fn test_closed_window_stops_the_sink() {
        let mut sink = sink(3);
        sink.frame.window_mut().open = false;
        assert!(!sink.tick());
    }
}
