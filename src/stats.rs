//! Statistic structures used to track progress at runtime.
use std::fmt;

/// Simple progress counter over a known amount of work.
pub struct Progress {
    done: usize,
    total: usize,
}

impl Progress {
    /// Constructs a new tracker for `total` units of work.
    pub fn new(total: usize) -> Self {
        Self { done: 0, total }
    }

    /// Marks another unit of work as complete.
    ///
    /// This returns the tracker itself so it can be logged directly.
    #[inline]
    pub fn advance(&mut self) -> &Self {
        self.done += 1;
        self
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.done, self.total)
    }
}
