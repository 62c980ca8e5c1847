//! Synchronization job: one full reconciliation cycle per team.
//!
//! Webhook and cron triggers funnel through [`SyncJob::run`], which either
//! takes the RUN lock and processes batches until the pending queue is
//! empty, or enqueues and returns immediately; callers never wait on the
//! lock. Within an acquired run, each team's cycle is snapshot, then admin
//! reconciliation, then the change-feed walk.

use crate::admin::{reconcile_admin, sync_group_members, AdminReconciliation};
use crate::cancel::CancelFlag;
use crate::error::{SyncError, SyncResult};
use crate::lock::{CycleLock, PendingQueue, RUN_LOCK};
use crate::project::ProjectSystem;
use crate::provision::rename_team_folder_if_needed;
use crate::reconciler::{reconcile_changes, ReconcileStats};
use crate::store::BindingStore;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teamdrive_directory::{DirectoryClient, SnapshotOptions, TeamSnapshot};
use teamdrive_types::{ProjectId, ProjectStorageBinding, TeamId};
use tracing::{info, warn};

/// Supplies the team-scoped API client for a team id. Tokens are
/// institution credentials held by an external store.
pub trait ClientProvider: Send + Sync {
    fn client_for(&self, team: &TeamId) -> SyncResult<Arc<DirectoryClient>>;
}

/// Fixed client table, for hosts with a known set of teams and for tests.
#[derive(Default)]
pub struct StaticClients {
    clients: HashMap<TeamId, Arc<DirectoryClient>>,
}

impl StaticClients {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, team: TeamId, client: Arc<DirectoryClient>) {
        self.clients.insert(team, client);
    }
}

impl ClientProvider for StaticClients {
    fn client_for(&self, team: &TeamId) -> SyncResult<Arc<DirectoryClient>> {
        self.clients
            .get(team)
            .cloned()
            .ok_or_else(|| SyncError::Project(format!("no credentials for team {team}")))
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncJobConfig {
    /// Directory holding the lock markers and the pending-queue file.
    /// Fixed name prefixes inside it let concurrently invoked processes
    /// agree on locations without coordination.
    pub state_dir: PathBuf,
    /// Delay between per-binding remote calls during maintenance, to stay
    /// under the vendor's API budget.
    pub maintenance_delay_ms: u64,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self {
            state_dir: std::env::temp_dir().join("teamdrive"),
            maintenance_delay_ms: 1_000,
        }
    }
}

/// How a [`SyncJob::run`] invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// This invocation held the RUN lock and processed the batches.
    Completed {
        teams_processed: usize,
        failures: usize,
    },
    /// Another worker holds the RUN lock; the teams were enqueued.
    Deferred,
}

/// Result of one team's cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub team: TeamId,
    pub admin: AdminReconciliation,
    pub stats: ReconcileStats,
}

/// Result of a periodic maintenance pass.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MaintenanceReport {
    pub bindings_visited: usize,
    pub titles_renamed: usize,
    pub failures: usize,
}

/// The reconciliation orchestrator.
pub struct SyncJob {
    clients: Arc<dyn ClientProvider>,
    store: Arc<BindingStore>,
    projects: Arc<dyn ProjectSystem>,
    config: SyncJobConfig,
    cancel: CancelFlag,
    /// Last-seen project titles, scoped to this orchestrator's lifetime.
    title_cache: Mutex<HashMap<ProjectId, String>>,
}

impl SyncJob {
    /// Creates the orchestrator, ensuring the shared state directory exists.
    pub fn new(
        clients: Arc<dyn ClientProvider>,
        store: Arc<BindingStore>,
        projects: Arc<dyn ProjectSystem>,
        config: SyncJobConfig,
    ) -> SyncResult<Self> {
        std::fs::create_dir_all(&config.state_dir)
            .map_err(|e| SyncError::Lock(format!("cannot create state dir: {e}")))?;
        Ok(Self {
            clients,
            store,
            projects,
            config,
            cancel: CancelFlag::new(),
            title_cache: Mutex::new(HashMap::new()),
        })
    }

    /// A handle for requesting cooperative cancellation.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Entry point for webhook and cron triggers.
    ///
    /// Acquires the RUN lock or defers: contention means another worker is
    /// active, so the requested teams are queued for it to pick up and this
    /// call returns immediately.
    pub async fn run(&self, teams: Vec<TeamId>) -> SyncResult<RunOutcome> {
        let run_lock = CycleLock::new(&self.config.state_dir, RUN_LOCK);
        let queue = PendingQueue::new(&self.config.state_dir);

        if !run_lock.try_lock() {
            let count = teams.len();
            let q = queue.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || q.add(&teams)).await {
                warn!("queueing task failed: {e}");
            }
            info!(teams = count, "reconciliation already running, deferred");
            return Ok(RunOutcome::Deferred);
        }

        let result = self.run_locked(&queue, teams).await;
        run_lock.unlock();
        result
    }

    async fn run_locked(&self, queue: &PendingQueue, teams: Vec<TeamId>) -> SyncResult<RunOutcome> {
        let mut seed: HashSet<TeamId> = teams.into_iter().collect();
        let mut teams_processed = 0;
        let mut failures = 0;

        loop {
            // Merge in work queued by deferred invocations; new work may
            // have arrived while the previous batch was processing.
            let q = queue.clone();
            let drain_seed = std::mem::take(&mut seed);
            let batch = tokio::task::spawn_blocking(move || q.drain(&drain_seed))
                .await
                .map_err(|e| SyncError::Lock(format!("queue drain task failed: {e}")))?;
            if batch.is_empty() {
                break;
            }

            let mut batch: Vec<TeamId> = batch.into_iter().collect();
            batch.sort();
            for team in batch {
                if self.cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                match self.run_team_cycle(&team).await {
                    Ok(report) => {
                        teams_processed += 1;
                        info!(
                            team = %team,
                            admin = %report.admin.acting_admin,
                            minted = report.stats.tokens_minted,
                            "team cycle complete"
                        );
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(team = %team, "team cycle failed: {e}");
                    }
                }
            }
        }

        Ok(RunOutcome::Completed {
            teams_processed,
            failures,
        })
    }

    /// One full cycle for one team: snapshot, admin reconciliation, then
    /// the change-feed walk under the (possibly new) acting admin.
    pub async fn run_team_cycle(&self, team: &TeamId) -> SyncResult<CycleReport> {
        let client = self.clients.client_for(team)?;
        let mut snapshot = TeamSnapshot::build(
            &client,
            SnapshotOptions {
                members: true,
                groups: true,
                team_folders: true,
                properties: false,
            },
        )
        .await?;

        let admin = reconcile_admin(&client, &mut snapshot, &self.store).await?;
        let stats = reconcile_changes(
            &client,
            &mut snapshot,
            &self.store,
            self.projects.as_ref(),
            &admin.acting_admin,
            &self.cancel,
        )
        .await?;

        Ok(CycleReport {
            team: team.clone(),
            admin,
            stats,
        })
    }

    /// Institution-wide maintenance: re-syncs per-project titles and
    /// contributor membership against remote state. Every binding is
    /// isolated (one failure never aborts the pass) and a fixed delay
    /// between bindings respects the vendor's rate budget.
    pub async fn run_periodic_maintenance(&self) -> SyncResult<MaintenanceReport> {
        let bindings = self.store.all_bindings()?;
        let mut report = MaintenanceReport::default();
        let mut snapshots: HashMap<TeamId, TeamSnapshot> = HashMap::new();

        for binding in bindings {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if !binding.is_provisioned() {
                continue;
            }
            report.bindings_visited += 1;
            match self.maintain_binding(&binding, &mut snapshots).await {
                Ok(renamed) => {
                    if renamed {
                        report.titles_renamed += 1;
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(project = %binding.project_id, "maintenance failed: {e}");
                }
            }
            tokio::time::sleep(Duration::from_millis(self.config.maintenance_delay_ms)).await;
        }
        info!(
            visited = report.bindings_visited,
            renamed = report.titles_renamed,
            failures = report.failures,
            "maintenance pass complete"
        );
        Ok(report)
    }

    async fn maintain_binding(
        &self,
        binding: &ProjectStorageBinding,
        snapshots: &mut HashMap<TeamId, TeamSnapshot>,
    ) -> SyncResult<bool> {
        let client = self.clients.client_for(&binding.team_id)?;
        let snapshot = match snapshots.entry(binding.team_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let snapshot = TeamSnapshot::build(
                    &client,
                    SnapshotOptions {
                        team_folders: true,
                        ..Default::default()
                    },
                )
                .await?;
                entry.insert(snapshot)
            }
        };

        let title = self.projects.project_title(&binding.project_id).await?;
        let title_changed = {
            let mut cache = self.title_cache.lock().unwrap();
            let changed = cache.get(&binding.project_id) != Some(&title);
            cache.insert(binding.project_id, title.clone());
            changed
        };
        let mut renamed = false;
        if title_changed {
            renamed = rename_team_folder_if_needed(&client, snapshot, binding, &title).await;
            if renamed {
                snapshot.refresh_team_folders(&client).await?;
            }
        }

        if let Some(group) = &binding.group_id {
            let contributors = self.projects.contributors(&binding.project_id).await?;
            sync_group_members(&client, group, &contributors).await?;
        }
        Ok(renamed)
    }
}
