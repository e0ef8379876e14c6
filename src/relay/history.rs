use std::collections::VecDeque;

pub const DEFAULT_HISTORY_SIZE: usize = 1024;

/// Bounded record history; pushing past capacity evicts the oldest line.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl HistoryRing {
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// History as replay writes: up to `chunk_size` lines joined by `\n`, each
    /// chunk newline-terminated.
    #[must_use]
    pub fn replay_chunks(&self, chunk_size: usize) -> Vec<String> {
        let lines: Vec<&str> = self.iter().collect();
        lines
            .chunks(chunk_size.max(1))
            .map(|chunk| {
                let mut out = chunk.join("\n");
                out.push('\n');
                out
            })
            .collect()
    }
}
