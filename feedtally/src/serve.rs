//! `feedtally serve`: the command protocol as JSON lines over stdin/stdout
//!
//! Each input line is one command object (`{"type":"START","maxCount":200}`);
//! each answer is one JSON line. The collection runs in the background between
//! commands. End of input stops any running collection.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use feedtally_core::driver::ScrollDriver;
use feedtally_core::snapshot::SnapshotFeed;
use feedtally_core::surface::ThreadWaiter;
use feedtally_core::{Config, RecordParser, Session, SharedStore};

pub fn run(frames: &Path, location: &str, out: Option<PathBuf>, config: &Config) -> Result<()> {
    let feed = SnapshotFeed::open(frames, location, config.feed.viewport_height)
        .context("failed to open frames")?;
    let driver = ScrollDriver::new(
        feed,
        ThreadWaiter,
        RecordParser::new(config.feed.base_url.clone()),
        SharedStore::new(),
    );
    let export_dir = out.unwrap_or_else(|| config.export_dir());
    let mut session = Session::new(driver, config.collection.clone(), export_dir);

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = session.handle_json(line);
        let encoded = serde_json::to_string(&response).context("failed to encode response")?;
        writeln!(stdout, "{}", encoded).context("failed to write response")?;
        stdout.flush().context("failed to flush response")?;
    }

    if let Some(summary) = session.halt() {
        tracing::info!(state = %summary.state, count = summary.count, "serve finished");
    }
    Ok(())
}
