//! Command protocol and collection session
//!
//! A control surface drives collection with five commands, each answered by
//! one [`Response`]:
//!
//! | Command | Fields | Response |
//! |---------|--------|----------|
//! | `START` | `maxCount`, `onlyOwner`, `stepWaitMs` | `ok`, `collecting`, `profile` |
//! | `STOP` | | `ok`, `collecting` |
//! | `STATUS` | | `ok`, `collecting`, `count`, `profile`, `lastAddedAt` |
//! | `CLEAR` | | `ok`, `count` |
//! | `EXPORT` | | `ok`, `count`, `path` |
//!
//! Commands are JSON objects tagged by `type`. Anything else is answered with
//! `{"ok":false,"error":"unknown message"}`.
//!
//! A [`Session`] owns the scroll driver. `START` moves it onto a worker thread
//! for the length of one run; the session takes it back when the run ends.
//! Records survive `STOP`/`START` cycles and are dropped only by `CLEAR`.

use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CollectionConfig;
use crate::driver::{DriverConfig, RunSummary, ScrollDriver, StopHandle};
use crate::error::Result;
use crate::export;
use crate::profile::profile_handle;
use crate::store::SharedStore;
use crate::surface::{FeedSurface, Waiter};

/// Accepted range of `maxCount`.
pub const MAX_COUNT_RANGE: (i64, i64) = (1, 50_000);
/// Accepted range of `stepWaitMs`.
pub const STEP_WAIT_MS_RANGE: (i64, i64) = (250, 3_000);

/// Used when `maxCount` is missing, zero, or not a number.
const FALLBACK_MAX_COUNT: i64 = 10_000;
/// Used when `stepWaitMs` is missing, zero, or not a number (then clamped).
const FALLBACK_STEP_WAIT_MS: i64 = 100_000;

const UNKNOWN_MESSAGE: &str = "unknown message";

// ============================================
// Protocol
// ============================================

/// A control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Command {
    Start(StartOptions),
    Stop,
    Status,
    Clear,
    Export,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start(_) => "START",
            Command::Stop => "STOP",
            Command::Status => "STATUS",
            Command::Clear => "CLEAR",
            Command::Export => "EXPORT",
        }
    }
}

/// Fields of `START`, as sent. Numbers may arrive as JSON numbers or strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<Value>,
    pub only_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_wait_ms: Option<Value>,
}

impl StartOptions {
    /// Target count, defaulted and clamped to [`MAX_COUNT_RANGE`].
    pub fn max_count(&self) -> usize {
        clamp_field(self.max_count.as_ref(), FALLBACK_MAX_COUNT, MAX_COUNT_RANGE) as usize
    }

    /// Per-step wait, defaulted and clamped to [`STEP_WAIT_MS_RANGE`].
    pub fn step_wait(&self) -> Duration {
        Duration::from_millis(
            clamp_field(self.step_wait_ms.as_ref(), FALLBACK_STEP_WAIT_MS, STEP_WAIT_MS_RANGE) as u64,
        )
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn clamp_field(value: Option<&Value>, fallback: i64, (lo, hi): (i64, i64)) -> i64 {
    let n = value
        .and_then(numeric)
        .filter(|n| n.is_finite() && *n != 0.0)
        .unwrap_or(fallback as f64);
    n.clamp(lo as f64, hi as f64) as i64
}

/// Parse one command. Malformed JSON and unknown types are
/// [`Error::Json`](crate::Error::Json).
pub fn parse_command(line: &str) -> Result<Command> {
    Ok(serde_json::from_str(line)?)
}

/// Answer to a command. Absent fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collecting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Epoch milliseconds of the last insertion, `0` if none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_added_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// File written by `EXPORT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn unknown() -> Self {
        Self::error(UNKNOWN_MESSAGE)
    }
}

// ============================================
// Session
// ============================================

enum DriverSlot<S, W> {
    Parked(ScrollDriver<S, W>),
    Running {
        handle: JoinHandle<ScrollDriver<S, W>>,
        stop: StopHandle,
    },
    /// The worker thread panicked or could not be spawned
    Lost,
}

/// Serves the command protocol over one feed surface.
pub struct Session<S, W> {
    slot: DriverSlot<S, W>,
    store: SharedStore,
    defaults: CollectionConfig,
    export_dir: PathBuf,
    location: String,
    profile: Option<String>,
    last_summary: Option<RunSummary>,
}

impl<S, W> Session<S, W>
where
    S: FeedSurface + 'static,
    W: Waiter + 'static,
{
    pub fn new(driver: ScrollDriver<S, W>, defaults: CollectionConfig, export_dir: PathBuf) -> Self {
        let location = driver.surface().location();
        Self {
            store: driver.store().clone(),
            slot: DriverSlot::Parked(driver),
            defaults,
            export_dir,
            profile: profile_handle(&location),
            location,
            last_summary: None,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Whether a run is in progress and has not been asked to stop.
    pub fn is_collecting(&self) -> bool {
        match &self.slot {
            DriverSlot::Running { handle, stop } => !handle.is_finished() && !stop.is_stopped(),
            _ => false,
        }
    }

    /// Stop handle of the current run, for use from another thread.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        match &self.slot {
            DriverSlot::Running { stop, .. } => Some(stop.clone()),
            _ => None,
        }
    }

    /// Handle one command.
    pub fn handle(&mut self, command: Command) -> Response {
        tracing::info!(command = command.name(), "command received");
        self.reclaim(false);

        match command {
            Command::Start(options) => self.start(&options),
            Command::Stop => {
                if let Some(stop) = self.stop_handle() {
                    stop.stop();
                }
                Response {
                    collecting: Some(false),
                    ..Response::ok()
                }
            }
            Command::Status => self.status(),
            Command::Clear => {
                self.halt();
                self.store.lock().clear();
                Response {
                    collecting: Some(false),
                    count: Some(0),
                    ..Response::ok()
                }
            }
            Command::Export => self.export(),
        }
    }

    /// Handle one JSON-encoded command.
    pub fn handle_json(&mut self, line: &str) -> Response {
        match parse_command(line) {
            Ok(command) => self.handle(command),
            Err(e) => {
                tracing::info!(input = line, error = %e, "unknown message");
                Response::unknown()
            }
        }
    }

    /// Block until the current run ends on its own or through a stop.
    pub fn wait(&mut self) -> Option<RunSummary> {
        self.reclaim(true);
        self.last_summary
    }

    /// Stop the current run and wait for it to end.
    pub fn halt(&mut self) -> Option<RunSummary> {
        if let Some(stop) = self.stop_handle() {
            stop.stop();
        }
        self.wait()
    }

    fn start(&mut self, options: &StartOptions) -> Response {
        if self.is_collecting() {
            return Response {
                collecting: Some(true),
                note: Some("already running".to_string()),
                ..Response::ok()
            };
        }
        // A stopped run may still be finishing its last step.
        self.reclaim(true);

        let mut driver = match std::mem::replace(&mut self.slot, DriverSlot::Lost) {
            DriverSlot::Parked(driver) => driver,
            _ => return Response::error("collector unavailable"),
        };

        self.profile = profile_handle(&self.location);
        let owner = if options.only_owner {
            self.profile.clone()
        } else {
            None
        };
        let config = DriverConfig {
            max_count: options.max_count(),
            step_wait: options.step_wait(),
            ..DriverConfig::from_collection(&self.defaults)
        }
        .with_owner_filter(owner);

        driver.start(config);
        let stop = driver.stop_handle();
        let spawned = std::thread::Builder::new()
            .name("feedtally-driver".to_string())
            .spawn(move || {
                driver.run();
                driver
            });

        match spawned {
            Ok(handle) => {
                self.slot = DriverSlot::Running { handle, stop };
                Response {
                    collecting: Some(true),
                    profile: self.profile.clone(),
                    ..Response::ok()
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn driver thread");
                Response::error(format!("failed to start: {}", e))
            }
        }
    }

    fn status(&self) -> Response {
        Response {
            collecting: Some(self.is_collecting()),
            count: Some(self.store.len()),
            profile: self.current_profile(),
            last_added_at: Some(
                self.store
                    .last_mutation()
                    .map(|t| t.timestamp_millis())
                    .unwrap_or(0),
            ),
            ..Response::ok()
        }
    }

    fn export(&self) -> Response {
        let records = self.store.export_view();
        let profile = self
            .current_profile()
            .unwrap_or_else(|| "profile".to_string());

        match export::write_export(&self.export_dir, &profile, &records, Utc::now()) {
            Ok(path) => Response {
                count: Some(records.len()),
                path: Some(path.display().to_string()),
                ..Response::ok()
            },
            Err(e) => {
                tracing::warn!(error = %e, "export failed");
                Response::error(e.to_string())
            }
        }
    }

    fn current_profile(&self) -> Option<String> {
        self.profile
            .clone()
            .or_else(|| profile_handle(&self.location))
    }

    /// Take the driver back from a finished worker; with `block`, wait for it.
    fn reclaim(&mut self, block: bool) {
        let finished = match &self.slot {
            DriverSlot::Running { handle, .. } => block || handle.is_finished(),
            _ => false,
        };
        if !finished {
            return;
        }

        if let DriverSlot::Running { handle, .. } = std::mem::replace(&mut self.slot, DriverSlot::Lost) {
            match handle.join() {
                Ok(driver) => {
                    self.last_summary = Some(driver.summary());
                    self.slot = DriverSlot::Parked(driver);
                }
                Err(_) => {
                    tracing::error!("driver thread panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverState;
    use crate::error::Error;
    use crate::extract::RecordParser;
    use crate::surface::MemoryFeed;
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Returns immediately.
    struct NoWait;

    impl Waiter for NoWait {
        fn wait(&mut self, _duration: Duration) {}
    }

    /// Blocks every wait until the paired sender is dropped.
    struct GateWaiter(mpsc::Receiver<()>);

    impl Waiter for GateWaiter {
        fn wait(&mut self, _duration: Duration) {
            let _ = self.0.recv();
        }
    }

    fn item(author: &str, id: u64, created_at: &str) -> String {
        format!(
            r#"<article data-testid="tweet"><a href="/{author}/status/{id}"><time datetime="{created_at}">t</time></a></article>"#
        )
    }

    fn frames() -> Vec<String> {
        vec![
            format!(
                "{}{}",
                item("alice", 1, "2024-01-02T00:00:00.000Z"),
                item("bob", 2, "2024-01-01T00:00:00.000Z")
            ),
            item("alice", 3, "2024-01-01T00:00:00.000Z"),
        ]
    }

    fn session<W: Waiter + 'static>(waiter: W, dir: &TempDir) -> Session<MemoryFeed, W> {
        let driver = ScrollDriver::new(
            MemoryFeed::new("https://x.com/alice/with_replies", frames()),
            waiter,
            RecordParser::default(),
            SharedStore::new(),
        );
        let defaults = CollectionConfig {
            max_idle_steps: 2,
            ..Default::default()
        };
        Session::new(driver, defaults, dir.path().to_path_buf())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command(r#"{"type":"STOP"}"#).unwrap(), Command::Stop);
        assert_eq!(parse_command(r#"{"type":"STATUS"}"#).unwrap(), Command::Status);
        assert_eq!(
            parse_command(r#"{"type":"START"}"#).unwrap(),
            Command::Start(StartOptions::default())
        );
        assert!(matches!(parse_command(r#"{"type":"PAUSE"}"#), Err(Error::Json(_))));
        assert!(matches!(parse_command("not json"), Err(Error::Json(_))));
        assert!(matches!(parse_command(r#"{"maxCount":5}"#), Err(Error::Json(_))));
    }

    #[test]
    fn test_start_option_clamping() {
        let opts = |json: &str| match parse_command(json) {
            Ok(Command::Start(o)) => o,
            other => panic!("not a start command: {:?}", other),
        };

        let o = opts(r#"{"type":"START"}"#);
        assert_eq!(o.max_count(), 10_000);
        assert_eq!(o.step_wait(), Duration::from_millis(3_000));
        assert!(!o.only_owner);

        let o = opts(r#"{"type":"START","maxCount":0,"stepWaitMs":0}"#);
        assert_eq!(o.max_count(), 10_000);
        assert_eq!(o.step_wait(), Duration::from_millis(3_000));

        let o = opts(r#"{"type":"START","maxCount":999999,"stepWaitMs":10,"onlyOwner":true}"#);
        assert_eq!(o.max_count(), 50_000);
        assert_eq!(o.step_wait(), Duration::from_millis(250));
        assert!(o.only_owner);

        let o = opts(r#"{"type":"START","maxCount":"42","stepWaitMs":-5}"#);
        assert_eq!(o.max_count(), 42);
        assert_eq!(o.step_wait(), Duration::from_millis(250));

        let o = opts(r#"{"type":"START","maxCount":"lots"}"#);
        assert_eq!(o.max_count(), 10_000);
    }

    #[test]
    fn test_response_json_omits_absent_fields() {
        let json = serde_json::to_string(&Response::unknown()).unwrap();
        assert_eq!(json, r#"{"ok":false,"error":"unknown message"}"#);

        let json = serde_json::to_string(&Response {
            collecting: Some(true),
            last_added_at: Some(0),
            ..Response::ok()
        })
        .unwrap();
        assert_eq!(json, r#"{"ok":true,"collecting":true,"lastAddedAt":0}"#);
    }

    #[test]
    fn test_unknown_message() {
        let dir = TempDir::new().unwrap();
        let mut s = session(NoWait, &dir);
        assert_eq!(s.handle_json(r#"{"type":"NOPE"}"#), Response::unknown());
        assert_eq!(s.handle_json("{"), Response::unknown());
    }

    #[test]
    fn test_full_session_cycle() {
        let dir = TempDir::new().unwrap();
        let mut s = session(NoWait, &dir);

        let status = s.handle(Command::Status);
        assert_eq!(status.collecting, Some(false));
        assert_eq!(status.count, Some(0));
        assert_eq!(status.profile.as_deref(), Some("alice"));
        assert_eq!(status.last_added_at, Some(0));

        let started = s.handle_json(r#"{"type":"START","onlyOwner":true,"maxCount":100}"#);
        assert!(started.ok);
        assert_eq!(started.collecting, Some(true));
        assert_eq!(started.profile.as_deref(), Some("alice"));

        let summary = s.wait().unwrap();
        assert_eq!(summary.state, DriverState::Exhausted);
        assert_eq!(summary.count, 2);

        let status = s.handle(Command::Status);
        assert_eq!(status.collecting, Some(false));
        assert_eq!(status.count, Some(2));
        assert!(status.last_added_at.unwrap() > 0);

        let exported = s.handle(Command::Export);
        assert!(exported.ok);
        assert_eq!(exported.count, Some(2));
        let path = PathBuf::from(exported.path.unwrap());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("x-alice-tweets-"));
        let ids: Vec<String> = export::read_records(&path)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["3", "1"]);

        let cleared = s.handle(Command::Clear);
        assert_eq!(cleared.count, Some(0));
        assert_eq!(cleared.collecting, Some(false));
        assert_eq!(s.store().len(), 0);
    }

    #[test]
    fn test_restart_keeps_records_until_clear() {
        let dir = TempDir::new().unwrap();
        let mut s = session(NoWait, &dir);

        s.handle_json(r#"{"type":"START","maxCount":100}"#);
        s.wait();
        assert_eq!(s.store().len(), 3);

        s.handle_json(r#"{"type":"START","maxCount":100}"#);
        s.wait();
        assert_eq!(s.store().len(), 3);
    }

    #[test]
    fn test_start_while_running_and_stop() {
        let dir = TempDir::new().unwrap();
        let (gate, rx) = mpsc::channel();
        let mut s = session(GateWaiter(rx), &dir);

        let first = s.handle_json(r#"{"type":"START","maxCount":100}"#);
        assert_eq!(first.collecting, Some(true));
        assert!(first.note.is_none());

        let second = s.handle_json(r#"{"type":"START"}"#);
        assert!(second.ok);
        assert_eq!(second.collecting, Some(true));
        assert_eq!(second.note.as_deref(), Some("already running"));

        let stopped = s.handle(Command::Stop);
        assert_eq!(stopped.collecting, Some(false));
        assert_eq!(s.handle(Command::Status).collecting, Some(false));

        drop(gate);
        let summary = s.wait().unwrap();
        assert_eq!(summary.state, DriverState::Stopped);
        assert!(summary.steps <= 1);
    }
}
