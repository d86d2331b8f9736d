//! Generic size/time-triggered batch buffer (spec §4.6), ported from
//! `original_source/.../utils.py`'s `TelemetryBuffer`. One instance per
//! stream (physics, scoring) per open lap.

use std::time::{Duration, Instant};

pub struct BatchBuffer<T> {
    max_size: usize,
    flush_interval: Duration,
    items: Vec<T>,
    last_flush: Instant,
}

impl<T> BatchBuffer<T> {
    pub fn new(max_size: usize, flush_interval: Duration) -> Self {
        Self {
            max_size,
            flush_interval,
            items: Vec::new(),
            last_flush: Instant::now(),
        }
    }

    /// Push one record. Returns true if the buffer now meets a flush
    /// trigger (size or age) — the caller decides when to actually drain it
    /// via `take`.
    pub fn push(&mut self, item: T) -> bool {
        self.items.push(item);
        self.should_flush()
    }

    pub fn should_flush(&self) -> bool {
        self.items.len() >= self.max_size || self.last_flush.elapsed() >= self.flush_interval
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drain and return everything currently buffered, resetting the flush
    /// clock.
    pub fn take(&mut self) -> Vec<T> {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_once_max_size_reached() {
        let mut buffer = BatchBuffer::new(3, Duration::from_secs(60));
        assert!(!buffer.push(1));
        assert!(!buffer.push(2));
        assert!(buffer.push(3));
        assert_eq!(buffer.take(), vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn flushes_once_interval_elapses() {
        let mut buffer: BatchBuffer<i32> = BatchBuffer::new(1000, Duration::from_millis(1));
        buffer.push(1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(buffer.should_flush());
    }

    #[test]
    fn take_resets_the_flush_clock() {
        let mut buffer = BatchBuffer::new(2, Duration::from_secs(60));
        buffer.push(1);
        buffer.push(2);
        assert!(buffer.should_flush());
        buffer.take();
        assert!(!buffer.should_flush());
    }
}
