//! Name index - records which owner claimed a name in a uniqueness scope
//!
//! [`SqliteNameIndex`] persists claims in `.ngt/names.db`. SQLite serializes
//! writers to one database file, which gives consistent answers on one host;
//! it offers no guarantees across hosts sharing a network filesystem.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::core::collaborator::{ClaimOutcome, CollaboratorError, NameIndex};

const COLLABORATOR: &str = "name index";

/// In-process name index
#[derive(Debug, Default)]
pub struct MemoryNameIndex {
    claims: Mutex<HashMap<(String, String), String>>,
}

impl MemoryNameIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameIndex for MemoryNameIndex {
    fn owner_of(&self, scope: &str, name: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(self
            .claims
            .lock()
            .get(&(scope.to_string(), name.to_string()))
            .cloned())
    }

    fn claim(&self, scope: &str, name: &str, owner: &str) -> Result<ClaimOutcome, CollaboratorError> {
        let mut claims = self.claims.lock();
        let key = (scope.to_string(), name.to_string());
        Ok(match claims.get(&key) {
            Some(existing) if existing == owner => ClaimOutcome::AlreadyOwned,
            Some(existing) => ClaimOutcome::Conflict {
                owner: existing.clone(),
            },
            None => {
                claims.insert(key, owner.to_string());
                ClaimOutcome::Claimed
            }
        })
    }
}

/// SQLite-backed name index
pub struct SqliteNameIndex {
    conn: Mutex<Connection>,
}

impl SqliteNameIndex {
    /// Open (or create) an index database at `path`
    pub fn open(path: &Path) -> Result<Self, CollaboratorError> {
        let conn = Connection::open(path).map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        Self::with_connection(conn)
    }

    /// An index that lives only as long as the process
    pub fn open_in_memory() -> Result<Self, CollaboratorError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CollaboratorError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS name_claims (
                scope      TEXT NOT NULL,
                name       TEXT NOT NULL,
                owner      TEXT NOT NULL,
                claimed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                PRIMARY KEY (scope, name)
            );",
        )
        .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All claims as (scope, name, owner), sorted
    pub fn claims(&self) -> Result<Vec<(String, String, String)>, CollaboratorError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT scope, name, owner FROM name_claims ORDER BY scope, name")
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))
    }
}

impl NameIndex for SqliteNameIndex {
    fn owner_of(&self, scope: &str, name: &str) -> Result<Option<String>, CollaboratorError> {
        self.conn
            .lock()
            .query_row(
                "SELECT owner FROM name_claims WHERE scope = ?1 AND name = ?2",
                params![scope, name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))
    }

    fn claim(&self, scope: &str, name: &str, owner: &str) -> Result<ClaimOutcome, CollaboratorError> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO name_claims (scope, name, owner) VALUES (?1, ?2, ?3)",
                params![scope, name, owner],
            )
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;

        if inserted == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        let existing: String = conn
            .query_row(
                "SELECT owner FROM name_claims WHERE scope = ?1 AND name = ?2",
                params![scope, name],
                |row| row.get(0),
            )
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;

        Ok(if existing == owner {
            ClaimOutcome::AlreadyOwned
        } else {
            ClaimOutcome::Conflict { owner: existing }
        })
    }
}

/// Stand-in for an index that could not be opened; every lookup fails
#[derive(Debug, Clone)]
pub struct UnavailableNameIndex {
    reason: String,
}

impl UnavailableNameIndex {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl NameIndex for UnavailableNameIndex {
    fn owner_of(&self, _scope: &str, _name: &str) -> Result<Option<String>, CollaboratorError> {
        Err(CollaboratorError::unavailable(COLLABORATOR, self.reason.clone()))
    }

    fn claim(&self, _scope: &str, _name: &str, _owner: &str) -> Result<ClaimOutcome, CollaboratorError> {
        Err(CollaboratorError::unavailable(COLLABORATOR, self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(index: &dyn NameIndex) {
        assert_eq!(index.owner_of("env:prod", "prod-a-b").unwrap(), None);
        assert_eq!(
            index.claim("env:prod", "prod-a-b", "alice").unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            index.claim("env:prod", "prod-a-b", "alice").unwrap(),
            ClaimOutcome::AlreadyOwned
        );
        assert_eq!(
            index.claim("env:prod", "prod-a-b", "bob").unwrap(),
            ClaimOutcome::Conflict {
                owner: "alice".to_string()
            }
        );
        // same name in another scope is independent
        assert_eq!(
            index.claim("env:dev", "prod-a-b", "bob").unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            index.owner_of("env:prod", "prod-a-b").unwrap().as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_memory_index_claims() {
        exercise(&MemoryNameIndex::new());
    }

    #[test]
    fn test_sqlite_index_claims() {
        exercise(&SqliteNameIndex::open_in_memory().unwrap());
    }

    #[test]
    fn test_unavailable_index_always_fails() {
        let index = UnavailableNameIndex::new("database locked");
        assert!(index.owner_of("global", "x").is_err());
        assert!(index.claim("global", "x", "alice").is_err());
    }

    #[test]
    fn test_sqlite_index_persists() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("names.db");

        {
            let index = SqliteNameIndex::open(&path).unwrap();
            index.claim("global", "prod-data-bucket", "alice").unwrap();
        }

        let reopened = SqliteNameIndex::open(&path).unwrap();
        assert_eq!(
            reopened.owner_of("global", "prod-data-bucket").unwrap().as_deref(),
            Some("alice")
        );
        assert_eq!(reopened.claims().unwrap().len(), 1);
    }
}
