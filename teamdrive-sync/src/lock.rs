//! Cross-process mutual exclusion and the durable pending-work queue.
//!
//! Concurrently triggered workers (webhook bursts, cron) coordinate through
//! two directory-create locks and one queue file under a shared state
//! directory. Directory creation is atomic at the filesystem level, which
//! makes it usable as a mutex across unrelated processes. A lock left
//! behind by a crashed process stays held until an operator removes the
//! marker directory; there is no expiry.
//!
//! All access to the queue file goes through [`PendingQueue`]; no other
//! code path may touch it.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use teamdrive_types::TeamId;
use tracing::{debug, warn};

/// Prefix shared by all lock marker directories.
pub const LOCK_PREFIX: &str = "teamdrive-lock-";
/// Lock guarding the reconciliation run itself.
pub const RUN_LOCK: &str = "run";
/// Lock guarding access to the pending-queue file.
pub const PLAN_LOCK: &str = "plan";
/// File holding queued team ids, one per line.
pub const QUEUE_FILE: &str = "teamdrive-pending-teams";

const PLAN_WAIT_ATTEMPTS: u32 = 50;
const PLAN_WAIT_STEP: Duration = Duration::from_millis(20);

/// Directory-create mutual exclusion.
#[derive(Debug, Clone)]
pub struct CycleLock {
    path: PathBuf,
}

impl CycleLock {
    /// A named lock under `state_dir`. The directory itself must exist.
    #[must_use]
    pub fn new(state_dir: &Path, name: &str) -> Self {
        Self {
            path: state_dir.join(format!("{LOCK_PREFIX}{name}")),
        }
    }

    /// Attempts to take the lock. Returns false when another holder exists.
    ///
    /// Contention is the expected deferral signal, not an error; callers
    /// respond by enqueuing and returning.
    pub fn try_lock(&self) -> bool {
        match fs::create_dir(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "lock acquired");
                true
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
            Err(e) => {
                warn!(path = %self.path.display(), "lock create failed: {e}");
                false
            }
        }
    }

    /// Releases the lock, ignoring an already-removed marker.
    pub fn unlock(&self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "lock release failed: {e}"),
        }
    }
}

/// Durable list of team ids awaiting reconciliation.
#[derive(Debug, Clone)]
pub struct PendingQueue {
    file: PathBuf,
    plan_lock: CycleLock,
}

impl PendingQueue {
    /// The queue under `state_dir`, guarded by the PLAN lock.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            file: state_dir.join(QUEUE_FILE),
            plan_lock: CycleLock::new(state_dir, PLAN_LOCK),
        }
    }

    fn with_plan_lock<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        for _ in 0..PLAN_WAIT_ATTEMPTS {
            if self.plan_lock.try_lock() {
                let out = f();
                self.plan_lock.unlock();
                return Some(out);
            }
            std::thread::sleep(PLAN_WAIT_STEP);
        }
        None
    }

    /// Appends team ids to the queue file.
    ///
    /// Best-effort: the typical caller is a webhook handler that must
    /// return quickly, so I/O failures are logged and swallowed.
    pub fn add(&self, teams: &[TeamId]) {
        if teams.is_empty() {
            return;
        }
        let outcome = self.with_plan_lock(|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file)?;
            for team in teams {
                writeln!(file, "{team}")?;
            }
            Ok(())
        });
        match outcome {
            Some(Ok(())) => debug!(count = teams.len(), "queued pending teams"),
            Some(Err(e)) => warn!("failed to append pending teams: {e}"),
            None => warn!("plan lock busy, dropping {} pending team(s)", teams.len()),
        }
    }

    /// Reads and deletes the queue file, returning the union of `seed`
    /// and the queued ids. An absent queue file contributes nothing.
    #[must_use]
    pub fn drain(&self, seed: &HashSet<TeamId>) -> HashSet<TeamId> {
        let mut merged = seed.clone();
        let content = self.with_plan_lock(|| {
            let content = fs::read_to_string(&self.file).unwrap_or_default();
            if let Err(e) = fs::remove_file(&self.file) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("failed to remove queue file: {e}");
                }
            }
            content
        });
        match content {
            Some(content) => {
                for line in content.lines() {
                    let id = line.trim();
                    if !id.is_empty() {
                        merged.insert(TeamId::new(id));
                    }
                }
            }
            None => warn!("plan lock busy, draining without queued teams"),
        }
        merged
    }
}
