//! `feedtally collect`: one full session against captured frames

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use feedtally_core::driver::ScrollDriver;
use feedtally_core::export;
use feedtally_core::session::StartOptions;
use feedtally_core::snapshot::SnapshotFeed;
use feedtally_core::surface::ThreadWaiter;
use feedtally_core::{Command, Config, RecordParser, Session, SharedStore};
use indicatif::{ProgressBar, ProgressStyle};

use crate::CollectArgs;

pub fn run(args: &CollectArgs, mut config: Config, verbose: u8) -> Result<()> {
    if let Some(max_idle) = args.max_idle {
        config.collection.max_idle_steps = max_idle.max(1);
    }

    let feed = SnapshotFeed::open(&args.frames, &args.location, config.feed.viewport_height)
        .context("failed to open frames")?;
    println!(
        "Frames: {} ({} captured)",
        args.frames.display(),
        feed.frame_count()
    );

    let store = SharedStore::new();
    if let Some(resume) = &args.resume {
        let records = export::read_records(resume)
            .with_context(|| format!("failed to resume from {}", resume.display()))?;
        let added = store.lock().seed(records);
        println!("Resumed {} posts from {}", added, resume.display());
    }

    let driver = ScrollDriver::new(
        feed,
        ThreadWaiter,
        RecordParser::new(config.feed.base_url.clone()),
        store.clone(),
    );
    let export_dir = args.out.clone().unwrap_or_else(|| config.export_dir());
    let mut session = Session::new(driver, config.collection.clone(), export_dir);

    let started = session.handle(Command::Start(StartOptions {
        max_count: Some(args.max.unwrap_or(config.collection.max_count).into()),
        only_owner: config.collection.only_owner && !args.all_authors,
        step_wait_ms: Some(args.wait_ms.unwrap_or(config.collection.step_wait_ms).into()),
    }));
    if !started.ok {
        bail!(
            "failed to start collection: {}",
            started.error.unwrap_or_default()
        );
    }
    println!(
        "Profile: {}",
        started.profile.as_deref().unwrap_or("(unknown)")
    );

    // Ctrl+C stops cooperatively; the current step finishes first
    if let Some(stop) = session.stop_handle() {
        ctrlc::set_handler(move || {
            eprintln!("\nStopping after the current step...");
            stop.stop();
        })
        .context("failed to set Ctrl+C handler")?;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .context("invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    while session.is_collecting() {
        pb.set_message(format!("{} posts", store.len()));
        thread::sleep(Duration::from_millis(200));
    }
    let summary = session.wait();
    pb.finish_and_clear();

    let exported = session.handle(Command::Export);
    if !exported.ok {
        bail!("export failed: {}", exported.error.unwrap_or_default());
    }

    println!("\nCollection complete:");
    if let Some(summary) = summary {
        println!("  Result:  {}", summary.state);
        println!("  Steps:   {}", summary.steps);
        if verbose >= 1 || summary.surface_errors > 0 {
            println!("  Surface errors: {}", summary.surface_errors);
        }
    }
    println!("  Posts:   {}", exported.count.unwrap_or(0));
    println!("  Export:  {}", exported.path.unwrap_or_default());

    if verbose >= 1 {
        for record in store.export_view() {
            println!(
                "  {} @{} [{}] likes={} views={}",
                record.id,
                record.author_handle,
                record.post_type,
                record.metrics.like,
                record.metrics.view
            );
        }
    }

    tracing::info!(count = store.len(), "feedtally collect complete");
    Ok(())
}
