//! Sync, status and watch commands

use super::{load_config, open_queue, open_store};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pacer_common::{Severity, EXIT_ERROR, EXIT_PARTIAL_SYNC, EXIT_SUCCESS};
use pacer_sync::{
    notice_for, Connectivity, ConnectivityMonitor, HttpDispatcher, HttpProbe, Notice,
    NoticeState, NoticeTracker, StorageStatus, SyncConfig, SyncEngine, SyncLock, SyncReport,
    SyncStatus,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn exit_code(report: &SyncReport) -> i32 {
    if report.storage_error.is_some() {
        EXIT_ERROR
    } else if report.failed_count > 0 {
        EXIT_PARTIAL_SYNC
    } else {
        EXIT_SUCCESS
    }
}

fn print_notice(notice: &Notice) {
    let icon = match notice.severity {
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
        Severity::Success => "✓",
    };
    eprintln!("{} {}", icon, notice.message);
    if let Some(detail) = &notice.detail {
        eprintln!("  {}", detail);
    }
}

pub async fn cmd_sync(offline: bool, json: bool) -> Result<i32> {
    let config = SyncConfig::from(&load_config()?);
    config.validate()?;

    // The engine takes the workspace sync lock around the pass
    let engine = if offline {
        let dispatcher = Arc::new(HttpDispatcher::new(&config)?);
        SyncEngine::with_parts(
            config.clone(),
            open_store(&config),
            ConnectivityMonitor::new(Connectivity::Offline),
            dispatcher,
        )
    } else {
        SyncEngine::new(config).await?
    };

    let pb = if json {
        None
    } else {
        Some(spinner("Syncing pending actions...")?)
    };
    let report = engine.sync_now().await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    print_report(&report, json)?;
    if !json && report.failed_count > 0 {
        for action in engine.queue().list() {
            if let Some(error) = &action.error {
                eprintln!("  ✗ {} {}: {}", action.kind(), action.id, error);
            }
        }
    }

    Ok(exit_code(&report))
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let icon = match report.status {
        SyncStatus::Completed if report.failed_count == 0 => "✓",
        SyncStatus::NothingToSync => "✓",
        SyncStatus::AlreadyRunning => "⏳",
        _ => "⚠",
    };
    eprintln!("{} {}", icon, report.message);
    if let Some(error) = &report.storage_error {
        eprintln!("⚠ Queue could not be saved: {}", error);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    api_url: String,
    online: bool,
    pending: usize,
    /// Another process holds the sync lock
    syncing: bool,
    storage: StorageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<Notice>,
}

pub async fn cmd_status(json: bool) -> Result<i32> {
    let workspace = load_config()?;
    let config = SyncConfig::from(&workspace);
    config.validate()?;

    let online = HttpProbe::new(&config)?.check().await.is_online();
    let queue = open_queue(&config);
    let pending = queue.len();
    let syncing = SyncLock::is_held(&workspace.lock_path())
        .context("Failed to check the sync lock")?;

    let status = StatusOutput {
        api_url: config.base_url.clone(),
        online,
        pending,
        syncing,
        storage: queue.store().status(),
        notice: notice_for(NoticeState {
            online,
            was_offline: false,
            pending,
        }),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(EXIT_SUCCESS);
    }

    eprintln!(
        "API:      {} ({})",
        status.api_url,
        Connectivity::from_online(online)
    );
    eprintln!("Pending:  {}", status.pending);
    eprintln!(
        "Storage:  {} KB / {} KB ({}%)",
        status.storage.used_kb, status.storage.capacity_kb, status.storage.percent_used
    );
    if status.syncing {
        eprintln!("Sync in progress in another process");
    }
    if let Some(notice) = &status.notice {
        print_notice(notice);
    }
    Ok(EXIT_SUCCESS)
}

pub async fn cmd_watch() -> Result<i32> {
    let workspace = load_config()?;
    let config = SyncConfig::from(&workspace);

    let pb = spinner("Checking API...")?;
    let engine = Arc::new(SyncEngine::new(config).await?);
    pb.finish_and_clear();

    let snapshot = engine.snapshot();
    eprintln!(
        "✓ Watching {} ({}), Ctrl+C to stop",
        engine.config().base_url,
        Connectivity::from_online(snapshot.online)
    );

    let mut tracker = NoticeTracker::new(snapshot.online, snapshot.pending);
    if let Some(notice) = tracker.current() {
        print_notice(&notice);
    }

    let mut events = engine.connectivity().subscribe();
    let mut reports = engine.subscribe_reports();
    let (stop, shutdown) = watch::channel(false);

    let runner = tokio::spawn({
        let engine = engine.clone();
        async move { engine.start(shutdown).await }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(change) = events.recv() => {
                if change.previous != change.current {
                    if let Some(notice) = tracker.observe(change, engine.queue().len()) {
                        print_notice(&notice);
                    }
                }
            }
            Ok(report) = reports.recv() => {
                print_report(&report, false)?;
                tracker.set_pending(engine.queue().len());
                if report.status == SyncStatus::Completed {
                    tracker.acknowledge();
                }
            }
        }
    }

    let _ = stop.send(true);
    runner.await?;
    eprintln!("✓ Watcher stopped");
    Ok(EXIT_SUCCESS)
}
