//! Scroll driver
//!
//! Drives repeated extraction passes interleaved with viewport advances until
//! the target count is reached, the feed stops yielding new posts, or a stop
//! is requested.
//!
//! ```text
//! Idle --start--> Running --+--> Done       (count reached the target)
//!                           +--> Exhausted  (idle or step budget spent)
//!                           +--> Stopped    (stop requested)
//! ```
//!
//! One step is: pass, check the target, scroll, wait, pass, check the target,
//! classify. A step that stored at least one new record is *progress*;
//! anything else is *idle*. The stop flag is checked at each step boundary, so
//! an in-flight step always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CollectionConfig;
use crate::extract::{collect_visible, PassStats, RecordParser};
use crate::store::SharedStore;
use crate::surface::{FeedSurface, Waiter};

/// Limits for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Author handle retained records must match; `None` keeps everyone
    pub owner_filter: Option<String>,
    /// Stop once the store holds this many records
    pub max_count: usize,
    /// Wait between scrolling and the second pass
    pub step_wait: Duration,
    /// Maximum number of steps per run
    pub max_steps: u32,
    /// Consecutive idle steps that end the run
    pub max_idle_steps: u32,
    /// Fraction of the viewport height scrolled per step
    pub scroll_fraction: f64,
}

impl DriverConfig {
    pub fn from_collection(config: &CollectionConfig) -> Self {
        Self {
            owner_filter: None,
            max_count: config.max_count,
            step_wait: Duration::from_millis(config.step_wait_ms),
            max_steps: config.max_steps,
            max_idle_steps: config.max_idle_steps,
            scroll_fraction: config.scroll_fraction,
        }
    }

    pub fn with_owner_filter(mut self, owner: Option<String>) -> Self {
        self.owner_filter = owner;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from_collection(&CollectionConfig::default())
    }
}

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    /// The target count was reached
    Done,
    /// A stop was requested
    Stopped,
    /// The idle or step budget ran out
    Exhausted,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::Idle => "idle",
            DriverState::Running => "running",
            DriverState::Done => "done",
            DriverState::Stopped => "stopped",
            DriverState::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one call to [`ScrollDriver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step stored `added` new records
    Progress { added: usize },
    /// The step stored nothing new; `streak` consecutive idle steps so far
    Idle { streak: u32 },
    /// The driver is not running; carries the state it is in
    Finished(DriverState),
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub state: DriverState,
    pub steps: u32,
    /// Records in the store when the run ended
    pub count: usize,
    /// Surface reads or scrolls that failed during the run
    pub surface_errors: u32,
}

/// Cooperative stop flag shared with other threads.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Scrolls a [`FeedSurface`] and collects posts into a [`SharedStore`].
pub struct ScrollDriver<S, W> {
    surface: S,
    waiter: W,
    parser: RecordParser,
    store: SharedStore,
    config: DriverConfig,
    state: DriverState,
    steps: u32,
    idle_streak: u32,
    surface_errors: u32,
    stop: StopHandle,
}

impl<S: FeedSurface, W: Waiter> ScrollDriver<S, W> {
    pub fn new(surface: S, waiter: W, parser: RecordParser, store: SharedStore) -> Self {
        Self {
            surface,
            waiter,
            parser,
            store,
            config: DriverConfig::default(),
            state: DriverState::Idle,
            steps: 0,
            idle_streak: 0,
            surface_errors: 0,
            stop: StopHandle::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// A handle that stops this driver at its next step boundary.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Begin a run. Returns `false` (and changes nothing) if already running.
    ///
    /// Records from earlier runs stay in the store.
    pub fn start(&mut self, config: DriverConfig) -> bool {
        if self.state == DriverState::Running {
            return false;
        }

        self.store
            .lock()
            .set_owner_filter(config.owner_filter.clone());
        tracing::info!(
            owner = config.owner_filter.as_deref().unwrap_or(""),
            max_count = config.max_count,
            step_wait_ms = config.step_wait.as_millis() as u64,
            "collection started"
        );

        self.config = config;
        self.state = DriverState::Running;
        self.steps = 0;
        self.idle_streak = 0;
        self.surface_errors = 0;
        self.stop.reset();
        true
    }

    /// Run one step.
    pub fn step(&mut self) -> StepOutcome {
        if self.state != DriverState::Running {
            return StepOutcome::Finished(self.state);
        }
        if self.stop.is_stopped() {
            return self.finish(DriverState::Stopped);
        }
        if self.steps >= self.config.max_steps {
            return self.finish(DriverState::Exhausted);
        }
        self.steps += 1;

        let before = self.store.len();
        self.pass();
        if self.store.len() >= self.config.max_count {
            return self.finish(DriverState::Done);
        }

        let pixels = self.scroll_distance();
        if let Err(e) = self.surface.scroll_by(pixels) {
            self.surface_errors += 1;
            tracing::warn!(error = %e, "scroll failed");
        }
        self.waiter.wait(self.config.step_wait);

        self.pass();
        let after = self.store.len();
        if after >= self.config.max_count {
            return self.finish(DriverState::Done);
        }

        if after > before {
            self.idle_streak = 0;
            tracing::debug!(step = self.steps, added = after - before, "step classified: progress");
            StepOutcome::Progress {
                added: after - before,
            }
        } else {
            self.idle_streak += 1;
            tracing::debug!(step = self.steps, streak = self.idle_streak, "step classified: idle");
            if self.idle_streak >= self.config.max_idle_steps {
                return self.finish(DriverState::Exhausted);
            }
            StepOutcome::Idle {
                streak: self.idle_streak,
            }
        }
    }

    /// Step until the run ends.
    pub fn run(&mut self) -> RunSummary {
        while !matches!(self.step(), StepOutcome::Finished(_)) {}
        self.summary()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            state: self.state,
            steps: self.steps,
            count: self.store.len(),
            surface_errors: self.surface_errors,
        }
    }

    /// Extract once from whatever the surface shows now.
    pub fn pass(&mut self) -> PassStats {
        match self.surface.snapshot() {
            Ok(html) => collect_visible(&html, &self.parser, &self.store),
            Err(e) => {
                self.surface_errors += 1;
                tracing::warn!(error = %e, "snapshot failed, pass skipped");
                PassStats::default()
            }
        }
    }

    fn scroll_distance(&self) -> u32 {
        (f64::from(self.surface.viewport_height()) * self.config.scroll_fraction).floor() as u32
    }

    fn finish(&mut self, state: DriverState) -> StepOutcome {
        self.state = state;
        tracing::info!(
            state = %state,
            steps = self.steps,
            count = self.store.len(),
            surface_errors = self.surface_errors,
            "collection finished"
        );
        StepOutcome::Finished(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::surface::MemoryFeed;

    /// Records every wait instead of sleeping.
    #[derive(Debug, Default)]
    struct RecordingWaiter {
        waits: Vec<Duration>,
    }

    impl Waiter for RecordingWaiter {
        fn wait(&mut self, duration: Duration) {
            self.waits.push(duration);
        }
    }

    fn item(author: &str, id: u64) -> String {
        format!(r#"<article data-testid="tweet"><a href="/{author}/status/{id}">p</a></article>"#)
    }

    /// Renders `per_frame` new posts after every scroll, forever.
    struct EndlessFeed {
        next_id: u64,
        per_frame: u64,
    }

    impl FeedSurface for EndlessFeed {
        fn snapshot(&mut self) -> Result<String> {
            Ok((self.next_id..self.next_id + self.per_frame)
                .map(|id| item("alice", id))
                .collect())
        }

        fn viewport_height(&self) -> u32 {
            1000
        }

        fn scroll_by(&mut self, _pixels: u32) -> Result<()> {
            self.next_id += self.per_frame;
            Ok(())
        }

        fn location(&self) -> String {
            "https://x.com/alice".to_string()
        }
    }

    /// Snapshot always fails.
    struct BrokenFeed;

    impl FeedSurface for BrokenFeed {
        fn snapshot(&mut self) -> Result<String> {
            Err(Error::Feed("renderer gone".to_string()))
        }

        fn viewport_height(&self) -> u32 {
            0
        }

        fn scroll_by(&mut self, _pixels: u32) -> Result<()> {
            Ok(())
        }

        fn location(&self) -> String {
            String::new()
        }
    }

    fn config(max_count: usize, max_steps: u32, max_idle_steps: u32) -> DriverConfig {
        DriverConfig {
            owner_filter: None,
            max_count,
            step_wait: Duration::from_millis(250),
            max_steps,
            max_idle_steps,
            scroll_fraction: 0.9,
        }
    }

    fn driver<S: FeedSurface>(surface: S) -> ScrollDriver<S, RecordingWaiter> {
        ScrollDriver::new(
            surface,
            RecordingWaiter::default(),
            RecordParser::default(),
            SharedStore::new(),
        )
    }

    #[test]
    fn test_static_feed_exhausts_within_idle_budget() {
        let frame = (1..=3).map(|id| item("alice", id)).collect::<String>();
        let mut d = driver(MemoryFeed::new("https://x.com/alice", vec![frame]));
        d.start(config(100, 10_000, 4));

        let summary = d.run();
        assert_eq!(summary.state, DriverState::Exhausted);
        assert_eq!(summary.count, 3);
        // The first step stores the visible posts; the next four add nothing.
        assert_eq!(summary.steps, 5);
        assert!(summary.steps <= 1 + 4);
    }

    #[test]
    fn test_endless_feed_stops_exactly_at_target() {
        let mut d = driver(EndlessFeed {
            next_id: 1,
            per_frame: 3,
        });
        d.start(config(10, 10_000, 5));

        let summary = d.run();
        assert_eq!(summary.state, DriverState::Done);
        // Three new posts per scroll: 3, 6, 9, then 12 on the third step.
        assert_eq!(summary.count, 12);
        assert_eq!(summary.steps, 3);
    }

    #[test]
    fn test_target_checked_after_first_pass() {
        let mut d = driver(EndlessFeed {
            next_id: 1,
            per_frame: 5,
        });
        d.start(config(5, 10_000, 5));

        assert_eq!(d.step(), StepOutcome::Finished(DriverState::Done));
        assert!(d.waiter.waits.is_empty());
        assert_eq!(d.store().len(), 5);
    }

    #[test]
    fn test_step_budget_exhausts() {
        let mut d = driver(EndlessFeed {
            next_id: 1,
            per_frame: 1,
        });
        d.start(config(1_000, 3, 5));

        let summary = d.run();
        assert_eq!(summary.state, DriverState::Exhausted);
        assert_eq!(summary.steps, 3);
        assert_eq!(d.waiter.waits, vec![Duration::from_millis(250); 3]);
    }

    #[test]
    fn test_step_classification_and_scroll_distance() {
        let frames = vec![item("alice", 1), item("alice", 2), item("alice", 2)];
        let mut d = driver(MemoryFeed::new("https://x.com/alice", frames).with_viewport_height(1000));
        d.start(config(100, 100, 5));

        assert_eq!(d.step(), StepOutcome::Progress { added: 2 });
        assert_eq!(d.step(), StepOutcome::Idle { streak: 1 });
        assert_eq!(d.surface().scrolled(), 1800);
    }

    #[test]
    fn test_stop_takes_effect_at_step_boundary() {
        let mut d = driver(EndlessFeed {
            next_id: 1,
            per_frame: 1,
        });
        d.start(config(1_000, 1_000, 5));
        let stop = d.stop_handle();

        assert!(matches!(d.step(), StepOutcome::Progress { .. }));
        stop.stop();
        assert_eq!(d.step(), StepOutcome::Finished(DriverState::Stopped));
        assert_eq!(d.step(), StepOutcome::Finished(DriverState::Stopped));
        assert_eq!(d.steps(), 1);
    }

    #[test]
    fn test_start_is_idempotent_and_restart_keeps_records() {
        let mut d = driver(EndlessFeed {
            next_id: 1,
            per_frame: 2,
        });
        assert_eq!(d.state(), DriverState::Idle);
        assert!(d.start(config(1_000, 1_000, 5)));
        assert!(!d.start(config(1, 1, 1)));
        assert_eq!(d.config.max_count, 1_000);

        d.step();
        d.stop_handle().stop();
        d.run();
        assert_eq!(d.state(), DriverState::Stopped);
        let kept = d.store().len();

        assert!(d.start(config(1_000, 1, 5)));
        assert_eq!(d.state(), DriverState::Running);
        d.run();
        assert!(d.store().len() > kept);
    }

    #[test]
    fn test_owner_filter_applied_on_start() {
        let frame = format!("{}{}", item("alice", 1), item("bob", 2));
        let mut d = driver(MemoryFeed::new("https://x.com/alice", vec![frame]));
        d.start(config(100, 100, 1).with_owner_filter(Some("alice".to_string())));
        d.run();
        assert_eq!(d.store().len(), 1);
        assert!(d.store().lock().get("1").is_some());
    }

    #[test]
    fn test_surface_errors_do_not_abort() {
        crate::logging::init_test();
        let mut d = driver(BrokenFeed);
        d.start(config(10, 100, 3));
        let summary = d.run();
        assert_eq!(summary.state, DriverState::Exhausted);
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.surface_errors, 6);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn test_step_before_start_reports_idle_state() {
        let mut d = driver(BrokenFeed);
        assert_eq!(d.step(), StepOutcome::Finished(DriverState::Idle));
    }
}
