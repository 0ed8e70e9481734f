use std::collections::VecDeque;

use sclm_core::render::Segment;

/// The rendered lines currently on screen, oldest first.
///
/// Bounded to the configured line count; pushing beyond it evicts the oldest.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<Vec<Segment>>,
    capacity: usize,
    dirty: bool,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            dirty: true,
        }
    }

    pub fn push(&mut self, line: Vec<Segment>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        if !self.lines.is_empty() {
            self.lines.clear();
            self.dirty = true;
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &[Segment]> {
        self.lines.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force a redraw on the next frame, e.g. after an expose.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear and return the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
