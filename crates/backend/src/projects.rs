use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bhuvan_shared::models::{
    new_project_id, LoadMapResponse, ProjectRecord, SaveMapRequest, SaveMapResponse,
};
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::identity::UserId;
use crate::state_store::StateStore;
use crate::storage::Storage;

#[derive(Clone)]
pub struct Projects {
    pub storage: Arc<Storage>,
    pub store: StateStore,
}

/// Routes nested under `/api/map`.
pub fn router() -> Router<Projects> {
    Router::new()
        .route("/save", post(save_map))
        .route("/load/{project_id}", get(load_map))
}

async fn save_map(
    user: UserId,
    State(projects): State<Projects>,
    Json(req): Json<SaveMapRequest>,
) -> Result<(StatusCode, Json<SaveMapResponse>), ApiError> {
    let name = req.project_name.trim();
    let Some(state) = req.map_state.as_ref().filter(|_| !name.is_empty()) else {
        return Err(ApiError::BadRequest(
            "Missing project name or map state".into(),
        ));
    };

    let project_id = new_project_id();
    let now = chrono::Utc::now().to_rfc3339();
    let record = ProjectRecord {
        project_id: project_id.clone(),
        name: name.to_string(),
        owner_id: user.0.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    projects.storage.save_project(&record).map_err(|e| {
        error!(error = %e, "failed to write project metadata");
        ApiError::Internal
    })?;

    if let Err(e) = projects.store.put(&user, &project_id, state).await {
        error!(project_id = %project_id, store = projects.store.name(), error = %e, "failed to write map state");
        match projects.storage.delete_project(&project_id) {
            Ok(_) => info!(project_id = %project_id, "rolled back project metadata"),
            Err(rollback) => {
                error!(project_id = %project_id, error = %rollback, "rollback of project metadata failed")
            }
        }
        return Err(ApiError::Internal);
    }

    info!(project_id = %project_id, owner = %user, "map saved");
    Ok((
        StatusCode::CREATED,
        Json(SaveMapResponse {
            message: "Map saved successfully!".into(),
            project_id,
        }),
    ))
}

async fn load_map(
    _user: UserId,
    State(projects): State<Projects>,
    Path(project_id): Path<String>,
) -> Result<Json<LoadMapResponse>, ApiError> {
    let record = projects
        .storage
        .get_project(&project_id)
        .map_err(|e| {
            error!(project_id = %project_id, error = %e, "failed to read project metadata");
            ApiError::Internal
        })?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;

    // State rows live in the owner's database, whoever opens the link.
    let owner = UserId(record.owner_id.clone());
    let map_state = projects
        .store
        .get(&owner, &project_id)
        .await
        .map_err(|e| {
            error!(project_id = %project_id, error = %e, "failed to read map state");
            ApiError::Internal
        })?
        .ok_or_else(|| {
            warn!(project_id = %project_id, "project has no map state row");
            ApiError::NotFound("Map state not found".into())
        })?;

    Ok(Json(LoadMapResponse {
        project_id: record.project_id,
        name: record.name,
        created_at: record.created_at,
        map_state,
    }))
}
