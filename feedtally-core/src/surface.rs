//! Feed surfaces
//!
//! A [`FeedSurface`] is the viewport the driver scrolls: it yields the
//! currently rendered document, reports its visible height, and advances.
//! The wait between scrolling and re-reading is a separate [`Waiter`] effect
//! so tests can run the driver without real time passing.

use std::time::Duration;

use crate::error::Result;

/// A scrollable, virtualized feed viewport.
pub trait FeedSurface: Send {
    /// HTML of everything currently rendered.
    fn snapshot(&mut self) -> Result<String>;

    /// Visible height in pixels.
    fn viewport_height(&self) -> u32;

    /// Advance the viewport by `pixels`.
    fn scroll_by(&mut self, pixels: u32) -> Result<()>;

    /// Address of the page being viewed.
    fn location(&self) -> String;
}

/// Suspends the driver between scrolling and the second pass of a step.
pub trait Waiter: Send {
    fn wait(&mut self, duration: Duration);
}

/// Waits by sleeping the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadWaiter;

impl Waiter for ThreadWaiter {
    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Position within a fixed sequence of rendered frames.
///
/// Each non-zero scroll shows the next frame; scrolling past the end keeps
/// showing the last one, which is what a feed that stopped loading looks like.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCursor {
    index: usize,
    len: usize,
}

impl FrameCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self, pixels: u32) {
        if pixels > 0 && self.index + 1 < self.len {
            self.index += 1;
        }
    }
}

/// A surface replaying frames held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    frames: Vec<String>,
    cursor: FrameCursor,
    location: String,
    viewport_height: u32,
    scrolled: u64,
}

impl MemoryFeed {
    pub fn new(location: impl Into<String>, frames: Vec<String>) -> Self {
        let cursor = FrameCursor::new(frames.len());
        Self {
            frames,
            cursor,
            location: location.into(),
            viewport_height: 900,
            scrolled: 0,
        }
    }

    pub fn with_viewport_height(mut self, height: u32) -> Self {
        self.viewport_height = height;
        self
    }

    /// Total pixels scrolled so far.
    pub fn scrolled(&self) -> u64 {
        self.scrolled
    }

    pub fn frame_index(&self) -> usize {
        self.cursor.index()
    }
}

impl FeedSurface for MemoryFeed {
    fn snapshot(&mut self) -> Result<String> {
        Ok(self
            .frames
            .get(self.cursor.index())
            .cloned()
            .unwrap_or_default())
    }

    fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    fn scroll_by(&mut self, pixels: u32) -> Result<()> {
        self.scrolled += u64::from(pixels);
        self.cursor.advance(pixels);
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_feed_advances_and_holds_last_frame() {
        let mut feed = MemoryFeed::new(
            "https://x.com/alice",
            vec!["a".to_string(), "b".to_string()],
        );
        assert_eq!(feed.snapshot().unwrap(), "a");

        feed.scroll_by(0).unwrap();
        assert_eq!(feed.snapshot().unwrap(), "a");

        feed.scroll_by(810).unwrap();
        assert_eq!(feed.snapshot().unwrap(), "b");

        feed.scroll_by(810).unwrap();
        assert_eq!(feed.snapshot().unwrap(), "b");
        assert_eq!(feed.scrolled(), 1620);
        assert_eq!(feed.location(), "https://x.com/alice");
    }

    #[test]
    fn test_empty_memory_feed_renders_nothing() {
        let mut feed = MemoryFeed::new("https://x.com/alice", Vec::new());
        assert_eq!(feed.snapshot().unwrap(), "");
        feed.scroll_by(100).unwrap();
        assert_eq!(feed.frame_index(), 0);
    }

    #[test]
    fn test_frame_cursor_stops_on_last_frame() {
        let mut cursor = FrameCursor::new(3);
        cursor.advance(0);
        assert_eq!(cursor.index(), 0);
        cursor.advance(1);
        cursor.advance(1);
        assert_eq!(cursor.index(), 2);
        cursor.advance(1);
        assert_eq!(cursor.index(), 2);
    }
}
