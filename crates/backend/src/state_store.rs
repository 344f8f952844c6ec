//! Where map-state rows live.
//!
//! With an executor configured, rows go to the caller's own database through
//! SQL. Otherwise they are kept in the server's redb file next to the project
//! metadata.

use std::sync::Arc;

use bhuvan_shared::models::MapState;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::gateway::{Gateway, GatewayError};
use crate::identity::UserId;
use crate::storage::{Storage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("malformed map state row: {0}")]
    Malformed(String),
}

#[derive(Clone)]
pub enum StateStore {
    Local(Arc<Storage>),
    Executor(Gateway),
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS map_states (
  project_id VARCHAR(255) PRIMARY KEY,
  view_state JSONB NOT NULL,
  wms_layers JSONB,
  pbf_layers JSONB,
  geojson_urls JSONB,
  annotations JSONB
);
ALTER TABLE map_states ADD COLUMN IF NOT EXISTS pbf_layers JSONB;";

impl StateStore {
    pub fn name(&self) -> &'static str {
        match self {
            StateStore::Local(_) => "local",
            StateStore::Executor(_) => "executor",
        }
    }

    pub async fn put(&self, user: &UserId, project_id: &str, state: &MapState) -> Result<(), StateStoreError> {
        match self {
            StateStore::Local(storage) => Ok(storage.put_state(project_id, state)?),
            StateStore::Executor(gw) => {
                let query = insert_query(project_id, state)?;
                debug!(project_id, "writing map state row");
                gw.query_rows(user, &query).await?;
                Ok(())
            }
        }
    }

    pub async fn get(&self, user: &UserId, project_id: &str) -> Result<Option<MapState>, StateStoreError> {
        match self {
            StateStore::Local(storage) => Ok(storage.get_state(project_id)?),
            StateStore::Executor(gw) => {
                let query = format!(
                    "SELECT * FROM map_states WHERE project_id = '{}'",
                    quote(project_id)
                );
                let rows = gw.query_rows(user, &query).await?;
                rows.first().map(state_from_row).transpose()
            }
        }
    }

    pub async fn delete(&self, user: &UserId, project_id: &str) -> Result<(), StateStoreError> {
        match self {
            StateStore::Local(storage) => {
                storage.delete_state(project_id)?;
                Ok(())
            }
            StateStore::Executor(gw) => {
                let query = format!(
                    "DELETE FROM map_states WHERE project_id = '{}'",
                    quote(project_id)
                );
                gw.query_rows(user, &query).await?;
                Ok(())
            }
        }
    }
}

/// Escape a value for use inside a single-quoted SQL literal.
fn quote(s: &str) -> String {
    s.replace('\'', "''")
}

fn json_literal<T: serde::Serialize>(value: &T) -> Result<String, StateStoreError> {
    let json = serde_json::to_string(value).map_err(|e| StateStoreError::Malformed(e.to_string()))?;
    Ok(format!("'{}'", quote(&json)))
}

fn insert_query(project_id: &str, state: &MapState) -> Result<String, StateStoreError> {
    Ok(format!(
        "{CREATE_TABLE}\n\nINSERT INTO map_states (project_id, view_state, wms_layers, pbf_layers, geojson_urls, annotations)\nVALUES ('{}', {}, {}, {}, {}, {});",
        quote(project_id),
        json_literal(&state.view)?,
        json_literal(&state.wms_layers)?,
        json_literal(&state.pbf_layers)?,
        json_literal(&state.geo_json_urls)?,
        json_literal(&state.annotations)?,
    ))
}

// JSONB columns come back either decoded or as their text form depending on
// the executor's driver.
fn column<T: DeserializeOwned + Default>(row: &Value, name: &str) -> Result<T, StateStoreError> {
    let value = match row.get(name) {
        None | Some(Value::Null) => return Ok(T::default()),
        Some(Value::String(text)) => serde_json::from_str(text),
        Some(other) => serde_json::from_value(other.clone()),
    };
    value.map_err(|e| StateStoreError::Malformed(format!("{name}: {e}")))
}

fn state_from_row(row: &Value) -> Result<MapState, StateStoreError> {
    if row.get("view_state").is_none_or(Value::is_null) {
        return Err(StateStoreError::Malformed("view_state is missing".into()));
    }
    Ok(MapState {
        view: column(row, "view_state")?,
        wms_layers: column(row, "wms_layers")?,
        pbf_layers: column(row, "pbf_layers")?,
        geo_json_urls: column(row, "geojson_urls")?,
        annotations: column(row, "annotations")?,
    })
}
