use std::sync::Arc;

use async_graphql::{Context, Enum, Object, SimpleObject, ID};
use bhuvan_shared::catalog::{CatalogLayer, LayerKind};
use bhuvan_shared::models::ProjectRecord;
use tracing::info;

use crate::assets::Assets;
use crate::identity::UserId;
use crate::state_store::StateStore;
use crate::storage::Storage;

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlLayerKind {
    Wms,
    VectorTile,
    ExternalGeoJson,
}

impl From<LayerKind> for GqlLayerKind {
    fn from(k: LayerKind) -> Self {
        match k {
            LayerKind::Wms => GqlLayerKind::Wms,
            LayerKind::VectorTile => GqlLayerKind::VectorTile,
            LayerKind::ExternalGeoJson => GqlLayerKind::ExternalGeoJson,
        }
    }
}

impl From<GqlLayerKind> for LayerKind {
    fn from(k: GqlLayerKind) -> Self {
        match k {
            GqlLayerKind::Wms => LayerKind::Wms,
            GqlLayerKind::VectorTile => LayerKind::VectorTile,
            GqlLayerKind::ExternalGeoJson => LayerKind::ExternalGeoJson,
        }
    }
}

// GraphQL output types

#[derive(SimpleObject)]
pub struct GqlLayer {
    pub id: String,
    pub name: String,
    pub url: String,
    pub label: String,
    pub kind: GqlLayerKind,
}

impl From<&CatalogLayer> for GqlLayer {
    fn from(l: &CatalogLayer) -> Self {
        GqlLayer {
            id: l.id.clone(),
            name: l.name.clone(),
            url: l.url.clone(),
            label: l.label.clone(),
            kind: l.kind.into(),
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlProject {
    pub id: ID,
    pub name: String,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProjectRecord> for GqlProject {
    fn from(p: ProjectRecord) -> Self {
        GqlProject {
            id: ID(p.project_id),
            name: p.name,
            owner_id: p.owner_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlStats {
    pub total_projects: u64,
    pub db_size_bytes: u64,
}

/// Surface a storage failure as a GraphQL error carrying its message.
fn internal(e: impl std::fmt::Display) -> async_graphql::Error {
    async_graphql::Error::new(e.to_string())
}

fn caller<'a>(ctx: &'a Context<'_>) -> async_graphql::Result<&'a UserId> {
    ctx.data_opt::<UserId>()
        .ok_or_else(|| async_graphql::Error::new("Not authenticated"))
}

/// Fetch a project and check that the caller owns it.
fn owned_project(ctx: &Context<'_>, id: &str) -> async_graphql::Result<ProjectRecord> {
    let user = caller(ctx)?;
    let storage = ctx.data::<Arc<Storage>>()?;
    let project = storage
        .get_project(id)
        .map_err(internal)?
        .ok_or_else(|| async_graphql::Error::new("Project not found"))?;
    if project.owner_id != user.0 {
        return Err(async_graphql::Error::new("Not the owner of this project"));
    }
    Ok(project)
}

// Query root

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Overlays offered in the layer panel.
    async fn layers(
        &self,
        ctx: &Context<'_>,
        kind: Option<GqlLayerKind>,
    ) -> async_graphql::Result<Vec<GqlLayer>> {
        let assets = ctx.data::<Arc<Assets>>()?;
        Ok(assets
            .layers_of(kind.map(LayerKind::from))
            .map(GqlLayer::from)
            .collect())
    }

    /// The caller's projects, newest first.
    async fn projects(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<GqlProject>> {
        let user = caller(ctx)?;
        let storage = ctx.data::<Arc<Storage>>()?;
        let projects = storage
            .list_projects(&user.0)
            .map_err(internal)?;
        Ok(projects.into_iter().map(GqlProject::from).collect())
    }

    async fn project(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<GqlProject>> {
        caller(ctx)?;
        let storage = ctx.data::<Arc<Storage>>()?;
        let project = storage.get_project(&id).map_err(internal)?;
        Ok(project.map(GqlProject::from))
    }

    async fn stats(&self, ctx: &Context<'_>) -> async_graphql::Result<GqlStats> {
        let storage = ctx.data::<Arc<Storage>>()?;
        Ok(GqlStats {
            total_projects: storage.count_projects().map_err(internal)?,
            db_size_bytes: storage.db_size_bytes().map_err(internal)?,
        })
    }
}

// Mutation root

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn rename_project(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: String,
    ) -> async_graphql::Result<GqlProject> {
        let name = name.trim();
        if name.is_empty() {
            return Err(async_graphql::Error::new("Project name must not be empty"));
        }
        let mut project = owned_project(ctx, &id)?;
        project.name = name.to_string();
        project.updated_at = chrono::Utc::now().to_rfc3339();

        let storage = ctx.data::<Arc<Storage>>()?;
        storage
            .save_project(&project)
            .map_err(internal)?;
        Ok(GqlProject::from(project))
    }

    /// Remove the state row, then the metadata.
    async fn delete_project(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let project = owned_project(ctx, &id)?;
        let user = caller(ctx)?;
        let store = ctx.data::<StateStore>()?;
        store
            .delete(user, &project.project_id)
            .await
            .map_err(internal)?;

        let storage = ctx.data::<Arc<Storage>>()?;
        let removed = storage
            .delete_project(&project.project_id)
            .map_err(internal)?;
        info!(project_id = %project.project_id, "project deleted");
        Ok(removed)
    }
}

pub type Schema = async_graphql::Schema<QueryRoot, MutationRoot, async_graphql::EmptySubscription>;

pub fn build_schema(assets: Arc<Assets>, storage: Arc<Storage>, store: StateStore) -> Schema {
    async_graphql::Schema::build(QueryRoot, MutationRoot, async_graphql::EmptySubscription)
        .data(assets)
        .data(storage)
        .data(store)
        .finish()
}

#[cfg(test)]
mod tests {
    use bhuvan_shared::catalog;
    use bhuvan_shared::models::MapState;

    use super::*;

    fn test_schema() -> (tempfile::TempDir, Arc<Storage>, Schema) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("g.redb")).unwrap();
        let assets = Arc::new(Assets {
            layers: catalog::builtin(),
        });
        let schema = build_schema(assets, storage.clone(), StateStore::Local(storage.clone()));
        (dir, storage, schema)
    }

    fn seed(storage: &Storage, id: &str, owner: &str, created_at: &str) {
        storage
            .save_project(&ProjectRecord {
                project_id: id.into(),
                name: format!("Project {id}"),
                owner_id: owner.into(),
                created_at: created_at.into(),
                updated_at: created_at.into(),
            })
            .unwrap();
    }

    async fn run(schema: &Schema, user: Option<&str>, query: &str) -> async_graphql::Response {
        let mut req = async_graphql::Request::new(query);
        if let Some(user) = user {
            req = req.data(UserId(user.into()));
        }
        schema.execute(req).await
    }

    #[tokio::test]
    async fn test_layers_filtered_by_kind() {
        let (_dir, _storage, schema) = test_schema();
        let resp = run(&schema, None, "{ layers(kind: VECTOR_TILE) { id kind } }").await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        let data = resp.data.into_json().unwrap();
        let layers = data["layers"].as_array().unwrap();
        assert_eq!(layers.len(), 2);
        assert!(layers.iter().all(|l| l["kind"] == "VECTOR_TILE"));
    }

    #[tokio::test]
    async fn test_projects_are_scoped_to_caller() {
        let (_dir, storage, schema) = test_schema();
        seed(&storage, "a", "alice", "2024-01-01T00:00:00Z");
        seed(&storage, "b", "bob", "2024-01-02T00:00:00Z");
        seed(&storage, "c", "alice", "2024-01-03T00:00:00Z");

        let resp = run(&schema, Some("alice"), "{ projects { id } }").await;
        let data = resp.data.into_json().unwrap();
        assert_eq!(data["projects"][0]["id"], "c");
        assert_eq!(data["projects"][1]["id"], "a");
        assert_eq!(data["projects"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_projects_require_identity() {
        let (_dir, _storage, schema) = test_schema();
        let resp = run(&schema, None, "{ projects { id } }").await;
        assert_eq!(resp.errors[0].message, "Not authenticated");
    }

    #[tokio::test]
    async fn test_rename_is_owner_only() {
        let (_dir, storage, schema) = test_schema();
        seed(&storage, "a", "alice", "2024-01-01T00:00:00Z");

        let resp = run(
            &schema,
            Some("bob"),
            r#"mutation { renameProject(id: "a", name: "Mine") { name } }"#,
        )
        .await;
        assert!(!resp.errors.is_empty());

        let resp = run(
            &schema,
            Some("alice"),
            r#"mutation { renameProject(id: "a", name: " Flood survey ") { name } }"#,
        )
        .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        assert_eq!(storage.get_project("a").unwrap().unwrap().name, "Flood survey");
    }

    #[tokio::test]
    async fn test_delete_removes_state_and_metadata() {
        let (_dir, storage, schema) = test_schema();
        seed(&storage, "a", "alice", "2024-01-01T00:00:00Z");
        storage.put_state("a", &MapState::default()).unwrap();

        let resp = run(&schema, Some("alice"), r#"mutation { deleteProject(id: "a") }"#).await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        assert!(storage.get_project("a").unwrap().is_none());
        assert!(storage.get_state("a").unwrap().is_none());
    }

    #[test]
    fn test_storage_errors_keep_their_message() {
        let io = std::io::Error::other("disk full");
        let err = internal(crate::storage::StorageError::from(io));
        assert_eq!(err.message, "io error: disk full");

        let err = internal(crate::state_store::StateStoreError::Malformed("view_state is missing".into()));
        assert_eq!(err.message, "malformed map state row: view_state is missing");
    }

    #[tokio::test]
    async fn test_stats_counts_projects() {
        let (_dir, storage, schema) = test_schema();
        seed(&storage, "a", "alice", "2024-01-01T00:00:00Z");
        let resp = run(&schema, None, "{ stats { totalProjects dbSizeBytes } }").await;
        let data = resp.data.into_json().unwrap();
        assert_eq!(data["stats"]["totalProjects"], 1);
        assert!(data["stats"]["dbSizeBytes"].as_u64().unwrap() > 0);
    }
}
