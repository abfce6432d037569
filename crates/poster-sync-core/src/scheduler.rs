//! Interval-gated automatic sweeps
//!
//! A tick acquires the sweep lock, checks whether the configured interval has
//! elapsed since the last successful sweep, and runs one if so. The lock is a
//! marker file holding its creation time; it is advisory and a marker older
//! than two hours is treated as left behind by a crashed process.

use chrono::{DateTime, Duration, Utc};
use poster_sync_config::{PathManager, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::{ImportError, SweepReport};

const LOCK_FILE: &str = "auto_import.lock";
const STATE_FILE: &str = "last_run.json";

pub fn stale_lock_age() -> Duration {
    Duration::hours(2)
}

/// Parse `<integer><unit>` with unit m, h, d or w; anything else means 24 hours
pub fn parse_interval(spec: &str) -> Duration {
    let fallback = Duration::hours(24);
    let spec = spec.trim();
    let Some(unit) = spec.chars().last() else {
        return fallback;
    };
    let Ok(amount) = spec[..spec.len() - unit.len_utf8()].trim().parse::<i64>() else {
        return fallback;
    };
    if !(0..=1_000_000).contains(&amount) {
        return fallback;
    }
    match unit.to_ascii_lowercase() {
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        'd' => Duration::days(amount),
        'w' => Duration::weeks(amount),
        _ => fallback,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchedulerState {
    last_run: Option<DateTime<Utc>>,
}

/// Held sweep lock; the marker file is removed on drop
#[derive(Debug)]
pub struct ImportLock {
    path: PathBuf,
}

impl ImportLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ImportLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Released sweep lock {:?}", self.path),
            Err(e) => warn!("Failed to release sweep lock {:?}: {}", self.path, e),
        }
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    Disabled,
    /// Another sweep holds a fresh lock
    Locked { since: Option<DateTime<Utc>> },
    NotDue { next_run: DateTime<Utc> },
    Completed(SweepReport),
    /// The sweep ran but some runs failed; the last-run time was not advanced
    Incomplete(SweepReport),
    Failed(String),
}

pub struct AutoImportScheduler {
    dir: PathBuf,
    interval: Duration,
    enabled: bool,
}

impl AutoImportScheduler {
    pub fn new(dir: impl Into<PathBuf>, interval: &str, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            interval: parse_interval(interval),
            enabled,
        }
    }

    pub fn from_config(config: &SchedulerConfig, paths: &PathManager) -> Self {
        Self::new(paths.scheduler_dir(), &config.interval, config.enabled)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Time the current lock was taken, if any
    pub fn lock_holder_since(&self) -> Option<DateTime<Utc>> {
        let path = self.lock_path();
        if !path.exists() {
            return None;
        }
        if let Some(stamp) = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        {
            return Some(stamp.with_timezone(&Utc));
        }
        std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Take the sweep lock, reclaiming a stale one; `None` while a fresh lock is held
    pub fn acquire_lock(&self, now: DateTime<Utc>) -> Result<Option<ImportLock>, ImportError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ImportError::filesystem(&self.dir, e))?;
        let path = self.lock_path();

        if path.exists() {
            match self.lock_holder_since() {
                Some(since) if now - since < stale_lock_age() => return Ok(None),
                since => {
                    warn!("Reclaiming stale sweep lock taken at {:?}", since);
                    if let Err(e) = std::fs::remove_file(&path) {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            return Err(ImportError::filesystem(&path, e));
                        }
                    }
                }
            }
        }

        let mut file = match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(ImportError::filesystem(&path, e)),
        };
        let lock = ImportLock { path: path.clone() };
        file.write_all(now.to_rfc3339().as_bytes())
            .map_err(|e| ImportError::filesystem(&path, e))?;
        Ok(Some(lock))
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        let content = std::fs::read_to_string(self.state_path()).ok()?;
        match serde_json::from_str::<SchedulerState>(&content) {
            Ok(state) => state.last_run,
            Err(e) => {
                warn!("Ignoring unreadable scheduler state: {}", e);
                None
            }
        }
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.last_run().map(|last| last + self.interval)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run() {
            Some(last) => now - last >= self.interval,
            None => true,
        }
    }

    pub fn record_success(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ImportError::filesystem(&self.dir, e))?;
        let state = SchedulerState { last_run: Some(at) };
        let content = serde_json::to_string_pretty(&state)
            .map_err(|e| ImportError::Data(format!("failed to encode scheduler state: {}", e)))?;
        let path = self.state_path();
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, content).map_err(|e| ImportError::filesystem(&temp_path, e))?;
        std::fs::rename(&temp_path, &path).map_err(|e| ImportError::filesystem(&path, e))
    }

    /// One scheduler tick; `sweep` is only invoked when the lock is free and a sweep is due
    pub async fn tick<F, Fut>(&self, now: DateTime<Utc>, sweep: F) -> Result<TickOutcome, ImportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SweepReport, ImportError>>,
    {
        if !self.enabled {
            debug!("Auto import disabled");
            return Ok(TickOutcome::Disabled);
        }

        let Some(_lock) = self.acquire_lock(now)? else {
            let since = self.lock_holder_since();
            info!(operation = "auto_import", "Another sweep is running, skipping this tick");
            return Ok(TickOutcome::Locked { since });
        };

        if !self.is_due(now) {
            let next_run = self.next_run().unwrap_or(now);
            debug!("Next automatic sweep due at {}", next_run);
            return Ok(TickOutcome::NotDue { next_run });
        }

        info!(operation = "auto_import", interval_minutes = self.interval.num_minutes(), "Sweep due, starting");
        match sweep().await {
            Ok(report) if report.is_success() => {
                self.record_success(now)?;
                info!(operation = "auto_import", "Automatic sweep completed");
                Ok(TickOutcome::Completed(report))
            }
            Ok(report) => {
                warn!(
                    operation = "auto_import",
                    failed_runs = report.failures.len(),
                    "Automatic sweep incomplete, will retry on the next tick"
                );
                Ok(TickOutcome::Incomplete(report))
            }
            Err(e) => {
                error!(operation = "auto_import", error = %e, "Automatic sweep failed");
                Ok(TickOutcome::Failed(e.to_string()))
            }
        }
    }
}
