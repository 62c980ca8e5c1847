//! Persistent local state for bindings, cursors, file nodes, and audit log.
//!
//! Uses a dedicated SQLite file so reconciliation state is isolated from
//! the surrounding platform's stores. The change-feed reconciler applies
//! each entry's mutations inside one transaction, so a crash mid-entry
//! leaves no partially-applied state.

use crate::error::{SyncError, SyncResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use std::sync::{Arc, Mutex};
use teamdrive_types::{GroupId, MemberId, ProjectId, ProjectStorageBinding, TeamFolderId, TeamId};

/// Audit-log action recorded for a verified file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    FileAdded,
    FileUpdated,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::FileAdded => write!(f, "file_added"),
            AuditAction::FileUpdated => write!(f, "file_updated"),
        }
    }
}

fn parse_audit_action(s: &str) -> AuditAction {
    match s {
        "file_updated" => AuditAction::FileUpdated,
        _ => AuditAction::FileAdded, // fallback
    }
}

/// One audit-log row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub project_id: ProjectId,
    pub action: AuditAction,
    pub path: String,
    pub detail: String,
    pub timestamp: String,
}

/// Persistent store for reconciliation state backed by SQLite.
pub struct BindingStore {
    conn: Arc<Mutex<Connection>>,
}

impl BindingStore {
    /// Opens (or creates) a store at the given path.
    pub fn new(path: &str) -> SyncResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Storage(format!("failed to open binding store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Storage(format!("failed to open in-memory store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS bindings (
                project_id TEXT NOT NULL,
                team_id TEXT NOT NULL,
                team_folder_id TEXT,
                group_id TEXT,
                admin_identity TEXT,
                change_cursor TEXT,
                UNIQUE(project_id, team_id),
                UNIQUE(project_id, team_folder_id)
            );

            CREATE TABLE IF NOT EXISTS team_cursors (
                team_id TEXT PRIMARY KEY,
                cursor TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                content_hash TEXT,
                UNIQUE(project_id, path)
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL,
                action TEXT NOT NULL,
                path TEXT NOT NULL,
                detail TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| SyncError::Storage(format!("failed to init schema: {e}")))?;
        Ok(())
    }

    // ── Bindings ─────────────────────────────────────────────────

    /// Inserts or replaces a binding.
    pub fn save_binding(&self, binding: &ProjectStorageBinding) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO bindings
             (project_id, team_id, team_folder_id, group_id, admin_identity, change_cursor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                binding.project_id.to_string(),
                binding.team_id.to_string(),
                binding.team_folder_id.as_ref().map(|id| id.to_string()),
                binding.group_id.as_ref().map(|id| id.to_string()),
                binding.admin_identity.as_ref().map(|id| id.to_string()),
                binding.change_cursor,
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to save binding: {e}")))?;
        Ok(())
    }

    /// Loads one binding.
    pub fn binding(
        &self,
        project: &ProjectId,
        team: &TeamId,
    ) -> SyncResult<Option<ProjectStorageBinding>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT project_id, team_id, team_folder_id, group_id, admin_identity, change_cursor
             FROM bindings WHERE project_id = ?1 AND team_id = ?2",
            params![project.to_string(), team.to_string()],
            row_to_binding,
        )
        .optional()
        .map_err(|e| SyncError::Storage(format!("failed to load binding: {e}")))
    }

    /// Loads every binding for one team.
    pub fn bindings_for_team(&self, team: &TeamId) -> SyncResult<Vec<ProjectStorageBinding>> {
        self.query_bindings(
            "SELECT project_id, team_id, team_folder_id, group_id, admin_identity, change_cursor
             FROM bindings WHERE team_id = ?1 ORDER BY project_id",
            params![team.to_string()],
        )
    }

    /// Loads the bindings attached to one team folder. Normally exactly
    /// one; callers tolerate the invariant being momentarily violated.
    pub fn bindings_for_team_folder(
        &self,
        team: &TeamId,
        folder: &TeamFolderId,
    ) -> SyncResult<Vec<ProjectStorageBinding>> {
        self.query_bindings(
            "SELECT project_id, team_id, team_folder_id, group_id, admin_identity, change_cursor
             FROM bindings WHERE team_id = ?1 AND team_folder_id = ?2 ORDER BY project_id",
            params![team.to_string(), folder.to_string()],
        )
    }

    /// Loads every binding across all teams.
    pub fn all_bindings(&self) -> SyncResult<Vec<ProjectStorageBinding>> {
        self.query_bindings(
            "SELECT project_id, team_id, team_folder_id, group_id, admin_identity, change_cursor
             FROM bindings ORDER BY team_id, project_id",
            params![],
        )
    }

    fn query_bindings(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> SyncResult<Vec<ProjectStorageBinding>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SyncError::Storage(format!("failed to prepare binding query: {e}")))?;
        let rows = stmt
            .query_map(args, row_to_binding)
            .map_err(|e| SyncError::Storage(format!("failed to query bindings: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| SyncError::Storage(format!("bad binding row: {e}")))?);
        }
        Ok(result)
    }

    /// Records the acting-admin identity on one binding.
    pub fn set_admin_identity(
        &self,
        project: &ProjectId,
        team: &TeamId,
        admin: &MemberId,
    ) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE bindings SET admin_identity = ?3 WHERE project_id = ?1 AND team_id = ?2",
            params![project.to_string(), team.to_string(), admin.to_string()],
        )
        .map_err(|e| SyncError::Storage(format!("failed to set admin identity: {e}")))?;
        Ok(())
    }

    /// Nulls one binding's change cursor so the next walk starts over.
    pub fn clear_change_cursor(&self, project: &ProjectId, team: &TeamId) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE bindings SET change_cursor = NULL WHERE project_id = ?1 AND team_id = ?2",
            params![project.to_string(), team.to_string()],
        )
        .map_err(|e| SyncError::Storage(format!("failed to clear cursor: {e}")))?;
        Ok(())
    }

    /// Marks a binding complete after a successful provisioning transaction.
    pub fn mark_provisioned(
        &self,
        project: &ProjectId,
        team: &TeamId,
        folder: &TeamFolderId,
        group: &GroupId,
    ) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE bindings SET team_folder_id = ?3, group_id = ?4
             WHERE project_id = ?1 AND team_id = ?2",
            params![
                project.to_string(),
                team.to_string(),
                folder.to_string(),
                group.to_string()
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to mark provisioned: {e}")))?;
        Ok(())
    }

    // ── Cursors ──────────────────────────────────────────────────

    /// The team's saved change-feed position.
    pub fn team_cursor(&self, team: &TeamId) -> SyncResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT cursor FROM team_cursors WHERE team_id = ?1",
            params![team.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SyncError::Storage(format!("failed to load team cursor: {e}")))
    }

    /// Saves the team's change-feed position and mirrors it onto the
    /// team's bindings.
    pub fn set_team_cursor(&self, team: &TeamId, cursor: &str) -> SyncResult<()> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard
            .transaction()
            .map_err(|e| SyncError::Storage(format!("failed to begin transaction: {e}")))?;
        tx.execute(
            "INSERT OR REPLACE INTO team_cursors (team_id, cursor) VALUES (?1, ?2)",
            params![team.to_string(), cursor],
        )
        .map_err(|e| SyncError::Storage(format!("failed to save team cursor: {e}")))?;
        tx.execute(
            "UPDATE bindings SET change_cursor = ?2 WHERE team_id = ?1",
            params![team.to_string(), cursor],
        )
        .map_err(|e| SyncError::Storage(format!("failed to mirror cursor: {e}")))?;
        tx.commit()
            .map_err(|e| SyncError::Storage(format!("failed to commit cursor: {e}")))?;
        Ok(())
    }

    /// Forgets the team's change-feed position (full rescan on next walk).
    pub fn clear_team_cursor(&self, team: &TeamId) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM team_cursors WHERE team_id = ?1",
            params![team.to_string()],
        )
        .map_err(|e| SyncError::Storage(format!("failed to clear team cursor: {e}")))?;
        Ok(())
    }

    // ── File nodes and audit log ─────────────────────────────────

    /// Upserts a file node without touching the audit log. Used when a
    /// valid timestamp token already covers the content.
    pub fn upsert_file_node(
        &self,
        project: &ProjectId,
        path: &str,
        size: u64,
        content_hash: Option<&str>,
    ) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO file_nodes (project_id, path, size, content_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, path)
             DO UPDATE SET size = ?3, content_hash = ?4",
            params![project.to_string(), path, size as i64, content_hash],
        )
        .map_err(|e| SyncError::Storage(format!("failed to upsert file node: {e}")))?;
        Ok(())
    }

    /// Applies one verified file change: upserts the node and writes the
    /// audit entry in a single transaction. Returns true when the node
    /// pre-existed (`file_updated`), false when it was created
    /// (`file_added`).
    pub fn apply_file_event(
        &self,
        project: &ProjectId,
        path: &str,
        size: u64,
        content_hash: Option<&str>,
        detail: &str,
    ) -> SyncResult<bool> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard
            .transaction()
            .map_err(|e| SyncError::Storage(format!("failed to begin transaction: {e}")))?;

        let pre_existed: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM file_nodes WHERE project_id = ?1 AND path = ?2",
                params![project.to_string(), path],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| SyncError::Storage(format!("failed to probe file node: {e}")))?
            > 0;

        tx.execute(
            "INSERT INTO file_nodes (project_id, path, size, content_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, path)
             DO UPDATE SET size = ?3, content_hash = ?4",
            params![project.to_string(), path, size as i64, content_hash],
        )
        .map_err(|e| SyncError::Storage(format!("failed to upsert file node: {e}")))?;

        let action = if pre_existed {
            AuditAction::FileUpdated
        } else {
            AuditAction::FileAdded
        };
        tx.execute(
            "INSERT INTO audit_log (project_id, action, path, detail, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.to_string(),
                action.to_string(),
                path,
                detail,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to write audit entry: {e}")))?;

        tx.commit()
            .map_err(|e| SyncError::Storage(format!("failed to commit file event: {e}")))?;
        Ok(pre_existed)
    }

    /// Loads a file node's (size, content_hash), if present.
    pub fn file_node(
        &self,
        project: &ProjectId,
        path: &str,
    ) -> SyncResult<Option<(u64, Option<String>)>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT size, content_hash FROM file_nodes WHERE project_id = ?1 AND path = ?2",
            params![project.to_string(), path],
            |row| {
                let size: i64 = row.get(0)?;
                let hash: Option<String> = row.get(1)?;
                Ok((size as u64, hash))
            },
        )
        .optional()
        .map_err(|e| SyncError::Storage(format!("failed to load file node: {e}")))
    }

    /// Loads audit log entries with pagination, newest first.
    pub fn audit_log(&self, limit: usize, offset: usize) -> SyncResult<Vec<AuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT project_id, action, path, detail, timestamp FROM audit_log
                 ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| SyncError::Storage(format!("failed to prepare audit query: {e}")))?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                let project: String = row.get(0)?;
                let action: String = row.get(1)?;
                let path: String = row.get(2)?;
                let detail: String = row.get(3)?;
                let timestamp: String = row.get(4)?;
                Ok((project, action, path, detail, timestamp))
            })
            .map_err(|e| SyncError::Storage(format!("failed to query audit log: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let (project, action, path, detail, timestamp) =
                row.map_err(|e| SyncError::Storage(format!("bad audit row: {e}")))?;
            let project_id = project
                .parse()
                .map_err(|e| SyncError::Storage(format!("invalid project_id in audit: {e}")))?;
            result.push(AuditEntry {
                project_id,
                action: parse_audit_action(&action),
                path,
                detail,
                timestamp,
            });
        }
        Ok(result)
    }

    /// Returns the total number of audit log entries.
    pub fn audit_log_count(&self) -> SyncResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(|e| SyncError::Storage(format!("failed to count audit log: {e}")))?;
        Ok(count as usize)
    }
}

fn row_to_binding(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectStorageBinding> {
    let project: String = row.get(0)?;
    let team: String = row.get(1)?;
    let folder: Option<String> = row.get(2)?;
    let group: Option<String> = row.get(3)?;
    let admin: Option<String> = row.get(4)?;
    let cursor: Option<String> = row.get(5)?;

    let project_id = project.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ProjectStorageBinding {
        project_id,
        team_id: TeamId::new(team),
        team_folder_id: folder.map(TeamFolderId::new),
        group_id: group.map(GroupId::new),
        admin_identity: admin.map(MemberId::new),
        change_cursor: cursor,
    })
}
