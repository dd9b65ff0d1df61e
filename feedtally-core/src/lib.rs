//! # feedtally-core
//!
//! Core library for feedtally - a post collector for virtualized social feeds.
//!
//! This library provides:
//! - Extraction of post records from rendered feed items, tolerant of
//!   locale-dependent compact numbers and renderer variants
//! - A deduplicating collection store
//! - A scroll driver that runs extraction passes until the feed is exhausted
//! - The START/STOP/STATUS/CLEAR/EXPORT command protocol and CSV export
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows leaves first:
//! - **Extract:** [`extract::number`] → [`extract::locator`] → [`extract::record`]
//! - **Store:** parsed records are merged by id into a [`CollectionStore`]
//! - **Drive:** a [`ScrollDriver`] alternates passes with viewport advances
//!   over a [`FeedSurface`]
//! - **Serve:** a [`Session`] answers protocol commands and writes exports
//!
//! ## Example
//!
//! ```rust,no_run
//! use feedtally_core::{Config, DriverConfig, RecordParser, ScrollDriver, SharedStore};
//! use feedtally_core::snapshot::SnapshotFeed;
//! use feedtally_core::surface::ThreadWaiter;
//! use std::path::Path;
//!
//! let config = Config::load().expect("failed to load config");
//! let feed = SnapshotFeed::open(Path::new("frames"), "https://x.com/alice", 900)
//!     .expect("failed to open frames");
//!
//! let mut driver = ScrollDriver::new(
//!     feed,
//!     ThreadWaiter,
//!     RecordParser::new(config.feed.base_url.clone()),
//!     SharedStore::new(),
//! );
//! driver.start(DriverConfig::from_collection(&config.collection));
//! let summary = driver.run();
//! println!("{} posts ({})", summary.count, summary.state);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use driver::{DriverConfig, DriverState, RunSummary, ScrollDriver, StepOutcome, StopHandle};
pub use error::{Error, Result};
pub use extract::{collect_visible, parse_compact_number, PassStats, RecordParser};
pub use session::{Command, Response, Session};
pub use store::{CollectionStore, MergeOutcome, SharedStore};
pub use surface::{FeedSurface, Waiter};
pub use types::*;

// Public modules
pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod extract;
pub mod logging;
pub mod profile;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod surface;
pub mod types;
