use std::collections::VecDeque;

/// How many rendered lines the viewer keeps on screen.
pub const DISPLAY_CAPACITY: usize = 25;

/// Bounded FIFO of the most recent display lines, oldest first.
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    lines:    VecDeque<String>,
    capacity: usize,
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self {
            lines:    VecDeque::with_capacity(DISPLAY_CAPACITY),
            capacity: DISPLAY_CAPACITY,
        }
    }

    /// Push a new line, evicting the oldest if at capacity.
    pub fn append(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Owned copy of the current lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
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
}
