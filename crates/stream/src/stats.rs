use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Per-frame cache statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Placeholder entities created by the loading pass.
    pub cells_created: usize,
    /// `(layer, key)` pairs forwarded to the fetcher.
    pub requests_forwarded: usize,
    /// Payloads written by local sources before loading.
    pub tiles_delivered: usize,
    pub entities_hidden: usize,
    pub entities_shown: usize,
    /// Keys evicted because the FIFO queue exceeded the cache limit.
    pub keys_evicted: usize,
    /// Keys removed immediately because a layer failed to load them.
    pub error_keys_removed: usize,
    pub queue_len: usize,
    pub entity_count: usize,
    pub frame_time: Duration,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame={} created={} requested={} delivered={} hidden={} shown={} evicted={} errors={} queue={} entities={}",
            self.frame,
            self.cells_created,
            self.requests_forwarded,
            self.tiles_delivered,
            self.entities_hidden,
            self.entities_shown,
            self.keys_evicted,
            self.error_keys_removed,
            self.queue_len,
            self.entity_count
        )
    }
}

/// Rolling window of frame durations.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    window: VecDeque<Duration>,
    capacity: usize,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, dt: Duration) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(dt);
    }

    pub fn count(&self) -> usize {
        self.window.len()
    }

    pub fn average(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let len = u32::try_from(self.window.len()).unwrap_or(u32::MAX);
        self.window.iter().sum::<Duration>() / len
    }

    pub fn max(&self) -> Duration {
        self.window.iter().copied().max().unwrap_or(Duration::ZERO)
    }
}
