use std::path::{Path, PathBuf};
use std::sync::Arc;

use bhuvan_shared::models::{MapState, ProjectRecord};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const PROJECTS_TABLE: JsonTable = TableDefinition::new("projects");
const MAP_STATES_TABLE: JsonTable = TableDefinition::new("map_states");

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),
    #[error("corrupt record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for StorageError {
            fn from(e: $t) -> Self {
                StorageError::Database(e.into())
            }
        })*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError
);

/// Project metadata and locally held map states, as JSON values in redb.
pub struct Storage {
    db: Database,
    path: PathBuf,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Arc<Self>, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(PROJECTS_TABLE)?;
            write_txn.open_table(MAP_STATES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Arc::new(Storage {
            db,
            path: path.to_path_buf(),
        }))
    }

    fn put<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(key, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> Result<Option<T>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn remove(&self, table: JsonTable, key: &str) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(table)?;
            let result = table.remove(key)?;
            result.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    // ---------------------------------------------------------------------------
    // Projects
    // ---------------------------------------------------------------------------

    pub fn save_project(&self, project: &ProjectRecord) -> Result<(), StorageError> {
        self.put(PROJECTS_TABLE, &project.project_id, project)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRecord>, StorageError> {
        self.get(PROJECTS_TABLE, id)
    }

    pub fn delete_project(&self, id: &str) -> Result<bool, StorageError> {
        self.remove(PROJECTS_TABLE, id)
    }

    /// Projects owned by `owner_id`, newest first.
    pub fn list_projects(&self, owner_id: &str) -> Result<Vec<ProjectRecord>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROJECTS_TABLE)?;
        let mut projects = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let project: ProjectRecord = serde_json::from_slice(value.value())?;
            if project.owner_id == owner_id {
                projects.push(project);
            }
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    pub fn count_projects(&self) -> Result<u64, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROJECTS_TABLE)?;
        Ok(table.len()?)
    }

    pub fn db_size_bytes(&self) -> Result<u64, StorageError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    // ---------------------------------------------------------------------------
    // Map states (used when no external executor is configured)
    // ---------------------------------------------------------------------------

    pub fn put_state(&self, project_id: &str, state: &MapState) -> Result<(), StorageError> {
        self.put(MAP_STATES_TABLE, project_id, state)
    }

    pub fn get_state(&self, project_id: &str) -> Result<Option<MapState>, StorageError> {
        self.get(MAP_STATES_TABLE, project_id)
    }

    pub fn delete_state(&self, project_id: &str) -> Result<bool, StorageError> {
        self.remove(MAP_STATES_TABLE, project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bhuvan_shared::models::ViewState;

    fn temp_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("nested/test.redb")).unwrap();
        (dir, storage)
    }

    fn record(id: &str, owner: &str, created_at: &str) -> ProjectRecord {
        ProjectRecord {
            project_id: id.into(),
            name: format!("Project {id}"),
            owner_id: owner.into(),
            created_at: created_at.into(),
            updated_at: created_at.into(),
        }
    }

    #[test]
    fn test_project_round_trip_and_delete() {
        let (_dir, storage) = temp_storage();
        let p = record("p1", "alice", "2024-01-01T00:00:00Z");
        storage.save_project(&p).unwrap();
        assert_eq!(storage.get_project("p1").unwrap(), Some(p));
        assert_eq!(storage.count_projects().unwrap(), 1);

        assert!(storage.delete_project("p1").unwrap());
        assert!(!storage.delete_project("p1").unwrap());
        assert!(storage.get_project("p1").unwrap().is_none());
    }

    #[test]
    fn test_list_projects_filters_owner_newest_first() {
        let (_dir, storage) = temp_storage();
        storage.save_project(&record("a", "alice", "2024-01-01T00:00:00Z")).unwrap();
        storage.save_project(&record("b", "bob", "2024-02-01T00:00:00Z")).unwrap();
        storage.save_project(&record("c", "alice", "2024-03-01T00:00:00Z")).unwrap();

        let ids: Vec<String> = storage
            .list_projects("alice")
            .unwrap()
            .into_iter()
            .map(|p| p.project_id)
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_state_round_trip() {
        let (_dir, storage) = temp_storage();
        let state = MapState {
            view: ViewState {
                center: [77.2, 28.6],
                zoom: 11.0,
            },
            geo_json_urls: vec!["https://example.org/a.geojson".into()],
            ..MapState::default()
        };
        storage.put_state("p1", &state).unwrap();
        assert_eq!(storage.get_state("p1").unwrap(), Some(state));
        assert!(storage.delete_state("p1").unwrap());
        assert!(storage.get_state("p1").unwrap().is_none());
    }

    #[test]
    fn test_db_size_is_reported() {
        let (_dir, storage) = temp_storage();
        assert!(storage.db_size_bytes().unwrap() > 0);
    }
}
