//! Captured-frame replay
//!
//! [`SnapshotFeed`] replays a directory of saved HTML documents as a feed
//! surface. Frames are ordered by file name (`000.html`, `001.html`, ...), and
//! each one is the document as rendered at one scroll position. Frames are
//! read from disk when shown, so a large capture is never held in memory.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::surface::{FeedSurface, FrameCursor};

/// A feed surface backed by a directory of `*.html` frames.
#[derive(Debug, Clone)]
pub struct SnapshotFeed {
    frames: Vec<PathBuf>,
    cursor: FrameCursor,
    location: String,
    viewport_height: u32,
}

impl SnapshotFeed {
    /// Discover frames in `dir`.
    ///
    /// Fails if the directory holds no `*.html` files.
    pub fn open(dir: &Path, location: impl Into<String>, viewport_height: u32) -> Result<Self> {
        let frames = discover_frames(dir)?;
        if frames.is_empty() {
            return Err(Error::Feed(format!(
                "no *.html frames in {}",
                dir.display()
            )));
        }

        tracing::debug!(dir = %dir.display(), frames = frames.len(), "snapshot feed opened");
        Ok(Self {
            cursor: FrameCursor::new(frames.len()),
            frames,
            location: location.into(),
            viewport_height,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Path of the frame currently shown.
    pub fn current_frame(&self) -> Option<&Path> {
        self.frames.get(self.cursor.index()).map(PathBuf::as_path)
    }
}

/// `*.html` files directly under `dir`, sorted by name.
pub fn discover_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Feed(format!(
            "frame directory not found: {}",
            dir.display()
        )));
    }

    let pattern = dir.join("*.html");
    let pattern_str = pattern.to_string_lossy();
    let entries = glob::glob(&pattern_str)
        .map_err(|e| Error::Feed(format!("Invalid glob pattern: {}", e)))?;

    let mut frames: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
    frames.sort();
    Ok(frames)
}

impl FeedSurface for SnapshotFeed {
    fn snapshot(&mut self) -> Result<String> {
        let path = self
            .current_frame()
            .ok_or_else(|| Error::Feed("snapshot feed has no frames".to_string()))?;
        Ok(std::fs::read_to_string(path)?)
    }

    fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    fn scroll_by(&mut self, pixels: u32) -> Result<()> {
        self.cursor.advance(pixels);
        tracing::trace!(frame = self.cursor.index(), pixels, "snapshot feed scrolled");
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}
