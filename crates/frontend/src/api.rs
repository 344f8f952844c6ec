use bhuvan_shared::catalog::{CatalogLayer, LayerKind};
use bhuvan_shared::editor::{RouteError, RouteSource};
use bhuvan_shared::models::{
    LoadMapResponse, MapState, SaveMapRequest, SaveMapResponse, USER_ID_HEADER,
};
use bhuvan_shared::projection::LonLat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const USER_ID_KEY: &str = "bhuvan_user_id";

pub const NOT_SIGNED_IN: &str = "You need to be signed in to do that.";

const STORAGE_UNAVAILABLE: &str = "This browser did not let the user id be stored.";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

/// The signed-in user id, if any.
pub fn current_user() -> Option<String> {
    local_storage()?
        .get_item(USER_ID_KEY)
        .ok()?
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed user id to store, or `None` to sign out.
fn normalize_user_id(user_id: Option<&str>) -> Option<&str> {
    user_id.map(str::trim).filter(|v| !v.is_empty())
}

/// Store or clear the signed-in user id.
pub fn set_current_user(user_id: Option<&str>) -> Result<(), String> {
    let storage = local_storage().ok_or_else(|| {
        tracing::warn!("localStorage is unavailable");
        STORAGE_UNAVAILABLE.to_string()
    })?;
    let result = match normalize_user_id(user_id) {
        Some(id) => storage.set_item(USER_ID_KEY, id),
        None => storage.remove_item(USER_ID_KEY),
    };
    result.map_err(|e| {
        tracing::warn!(error = ?e, "failed to update the stored user id");
        STORAGE_UNAVAILABLE.to_string()
    })
}

/// Every server call is refused here when nobody is signed in.
fn require_user() -> Result<String, String> {
    current_user().ok_or_else(|| NOT_SIGNED_IN.to_string())
}

fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default()
}

fn api_url(path: &str) -> String {
    format!("{}{}", origin(), path)
}

/// Build a shareable map URL from origin and project ID.
pub fn build_map_url(origin: &str, project_id: &str) -> String {
    format!("{}/map-view/{}", origin, project_id)
}

pub fn share_url(project_id: &str) -> String {
    build_map_url(&origin(), project_id)
}

// ---------------------------------------------------------------------------
// GraphQL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

async fn query<T: for<'de> Deserialize<'de>>(
    query_str: &str,
    variables: Option<Value>,
) -> Result<T, String> {
    let req = GraphQLRequest {
        query: query_str.to_string(),
        variables,
    };

    let mut builder = reqwest::Client::new().post(api_url("/graphql")).json(&req);
    if let Some(user) = current_user() {
        builder = builder.header(USER_ID_HEADER, user);
    }
    let resp = builder.send().await.map_err(|e| e.to_string())?;

    let gql_resp: GraphQLResponse<T> = resp.json().await.map_err(|e| e.to_string())?;

    if let Some(errors) = gql_resp.errors {
        if let Some(first) = errors.into_iter().next() {
            return Err(first.message);
        }
    }

    gql_resp.data.ok_or_else(|| "No data returned".to_string())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerData {
    pub id: String,
    pub name: String,
    pub url: String,
    pub label: String,
    pub kind: String,
}

impl LayerData {
    fn into_catalog(self) -> Option<CatalogLayer> {
        let kind = match self.kind.as_str() {
            "WMS" => LayerKind::Wms,
            "VECTOR_TILE" => LayerKind::VectorTile,
            "EXTERNAL_GEO_JSON" => LayerKind::ExternalGeoJson,
            _ => return None,
        };
        Some(CatalogLayer {
            id: self.id,
            name: self.name,
            url: self.url,
            label: self.label,
            kind,
        })
    }
}

#[derive(Deserialize)]
pub struct LayersResponse {
    pub layers: Vec<LayerData>,
}

pub async fn fetch_layers() -> Result<Vec<CatalogLayer>, String> {
    let resp: LayersResponse = query(r#"query { layers { id name url label kind } }"#, None).await?;
    Ok(resp
        .layers
        .into_iter()
        .filter_map(LayerData::into_catalog)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectData>,
}

pub async fn fetch_projects() -> Result<Vec<ProjectData>, String> {
    require_user()?;
    let resp: ProjectsResponse =
        query(r#"query { projects { id name createdAt updatedAt } }"#, None).await?;
    Ok(resp.projects)
}

#[derive(Deserialize)]
pub struct RenameProjectResponse {
    #[serde(rename = "renameProject")]
    pub rename_project: ProjectData,
}

pub async fn rename_project(id: &str, name: &str) -> Result<ProjectData, String> {
    require_user()?;
    let resp: RenameProjectResponse = query(
        r#"mutation RenameProject($id: ID!, $name: String!) {
            renameProject(id: $id, name: $name) { id name createdAt updatedAt }
        }"#,
        Some(serde_json::json!({ "id": id, "name": name })),
    )
    .await?;
    Ok(resp.rename_project)
}

#[derive(Deserialize)]
pub struct DeleteProjectResponse {
    #[serde(rename = "deleteProject")]
    pub delete_project: bool,
}

pub async fn delete_project(id: &str) -> Result<bool, String> {
    require_user()?;
    let resp: DeleteProjectResponse = query(
        r#"mutation DeleteProject($id: ID!) { deleteProject(id: $id) }"#,
        Some(serde_json::json!({ "id": id })),
    )
    .await?;
    Ok(resp.delete_project)
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

/// Pull the human-readable message out of an error body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or_else(|| format!("Request failed ({status})"))
}

async fn read_json<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, String> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(error_message(status, &body));
    }
    resp.json().await.map_err(|e| e.to_string())
}

pub async fn save_map(project_name: &str, map_state: MapState) -> Result<SaveMapResponse, String> {
    let user = require_user()?;
    let body = SaveMapRequest {
        project_name: project_name.to_string(),
        map_state: Some(map_state),
    };
    let resp = reqwest::Client::new()
        .post(api_url("/api/map/save"))
        .header(USER_ID_HEADER, user)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read_json(resp).await
}

pub async fn load_map(project_id: &str) -> Result<LoadMapResponse, String> {
    let user = require_user()?;
    let resp = reqwest::Client::new()
        .get(api_url(&format!("/api/map/load/{project_id}")))
        .header(USER_ID_HEADER, user)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read_json(resp).await
}

/// Fetch an external GeoJSON document.
pub async fn fetch_geojson(url: &str) -> Result<Value, String> {
    let resp = reqwest::get(url).await.map_err(|e| e.to_string())?;
    read_json(resp).await
}

/// Fetch one tile of a vector-tile layer to check that the service answers.
pub async fn check_tile(url: &str) -> Result<(), String> {
    let resp = reqwest::get(url).await.map_err(|e| e.to_string())?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(format!("tile request failed ({})", resp.status()))
    }
}

// ---------------------------------------------------------------------------
// Routing through the gateway
// ---------------------------------------------------------------------------

/// Routing via `/api/bhuvan/routing` as the signed-in user.
pub struct GatewayRoutes;

pub fn routing_params(from: LonLat, to: LonLat) -> [(&'static str, String); 4] {
    [
        ("lat1", from.lat.to_string()),
        ("lon1", from.lon.to_string()),
        ("lat2", to.lat.to_string()),
        ("lon2", to.lon.to_string()),
    ]
}

impl RouteSource for GatewayRoutes {
    async fn route(&self, from: LonLat, to: LonLat) -> Result<Value, RouteError> {
        let user = require_user().map_err(RouteError::Upstream)?;
        let resp = reqwest::Client::new()
            .get(api_url("/api/bhuvan/routing"))
            .header(USER_ID_HEADER, user)
            .query(&routing_params(from, to))
            .send()
            .await
            .map_err(|e| RouteError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RouteError::Upstream(error_message(status, &body)));
        }
        resp.json()
            .await
            .map_err(|e| RouteError::Transport(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Bhuvan services and SQL executor
// ---------------------------------------------------------------------------

async fn gateway_get(path: &str, params: &[(&str, String)]) -> Result<Value, String> {
    let user = require_user()?;
    let resp = reqwest::Client::new()
        .get(api_url(path))
        .header(USER_ID_HEADER, user)
        .query(params)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read_json(resp).await
}

pub fn thematic_params(lat: f64, lon: f64, year: &str) -> [(&'static str, String); 3] {
    [
        ("lat", lat.to_string()),
        ("lon", lon.to_string()),
        ("year", year.trim().to_string()),
    ]
}

/// Land use / land cover at a point for a survey cycle such as `2005_06`.
pub async fn thematic(lat: f64, lon: f64, year: &str) -> Result<Value, String> {
    gateway_get("/api/bhuvan/thematic", &thematic_params(lat, lon, year)).await
}

pub async fn village_geocode(village: &str) -> Result<Value, String> {
    gateway_get("/api/bhuvan/vg", &[("village", village.trim().to_string())]).await
}

/// Raw routing answer between two positions.
pub async fn routing(from: LonLat, to: LonLat) -> Result<Value, String> {
    gateway_get("/api/bhuvan/routing", &routing_params(from, to)).await
}

/// Ellipsoid-to-geoid download URL for tile `id` under `origin`.
pub fn ellipsoid_url(origin: &str, id: &str) -> Result<String, String> {
    let base = format!("{origin}/api/bhuvan/ellipsoid");
    reqwest::Url::parse_with_params(&base, &[("id", id.trim())])
        .map(String::from)
        .map_err(|e| e.to_string())
}

/// Fetch the ellipsoid archive for `id` and hand it to the browser as `{id}.zip`.
pub async fn download_ellipsoid(id: &str) -> Result<(), String> {
    let user = require_user()?;
    let id = id.trim();
    if id.is_empty() {
        return Err("A tile id is required.".into());
    }
    let resp = reqwest::Client::new()
        .get(ellipsoid_url(&origin(), id)?)
        .header(USER_ID_HEADER, user)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(error_message(status, &body));
    }
    let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
    save_download(&bytes, &format!("{id}.zip"))
}

fn js_error(e: wasm_bindgen::JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

fn save_download(bytes: &[u8], file_name: &str) -> Result<(), String> {
    use wasm_bindgen::JsCast;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or("no document to download into")?;
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
    let blob = web_sys::Blob::new_with_u8_array_sequence(&parts).map_err(js_error)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(js_error)?;
    let anchor: web_sys::HtmlAnchorElement = document
        .create_element("a")
        .map_err(js_error)?
        .dyn_into()
        .map_err(|_| "could not create a download link".to_string())?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.click();
    if let Err(e) = web_sys::Url::revoke_object_url(&url) {
        tracing::warn!(error = %js_error(e), "failed to release download URL");
    }
    Ok(())
}

/// Which database a console query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    /// The signed-in user's own database.
    Personal,
    /// The shared Bhuvan database.
    Central,
}

impl QueryTarget {
    fn path(self) -> &'static str {
        match self {
            QueryTarget::Personal => "/api/bhuvan/execute-query",
            QueryTarget::Central => "/api/bhuvan/execute-central-query",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

async fn run_query(target: QueryTarget, sql: &str) -> Result<Value, String> {
    let user = require_user()?;
    let sql = sql.trim();
    if sql.is_empty() {
        return Err("Query is required".into());
    }
    let resp = reqwest::Client::new()
        .post(api_url(target.path()))
        .header(USER_ID_HEADER, user)
        .json(&QueryRequest { query: sql })
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read_json(resp).await
}

pub async fn execute_query(sql: &str) -> Result<Value, String> {
    run_query(QueryTarget::Personal, sql).await
}

pub async fn execute_central_query(sql: &str) -> Result<Value, String> {
    run_query(QueryTarget::Central, sql).await
}

/// Rows of an executor answer, which wraps them in `data` or returns them bare.
pub fn result_rows(payload: &Value) -> &[Value] {
    payload
        .get("data")
        .unwrap_or(payload)
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Column names in first-seen order across `rows`.
pub fn result_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in rows.iter().filter_map(Value::as_object).flat_map(|o| o.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

/// A result cell as display text; strings unquoted, null empty.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_graphql_request_omits_null_variables() {
        let req = GraphQLRequest {
            query: "query { layers { id } }".to_string(),
            variables: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("variables").is_none());
    }

    #[test]
    fn test_layers_response_maps_kinds() {
        let json = r#"{"layers":[
            {"id":"bhuvan_drainage","name":"BDRAIN","url":"https://h/wms","label":"Drainage","kind":"WMS"},
            {"id":"bhuvan_road_rdd","name":"mmi.road_rdd","url":"https://h/{z}/{x}/{y}.pbf","label":"Roads","kind":"VECTOR_TILE"},
            {"id":"odd","name":"x","url":"https://h","label":"?","kind":"SOMETHING_ELSE"}
        ]}"#;
        let resp: LayersResponse = serde_json::from_str(json).unwrap();
        let catalog: Vec<CatalogLayer> = resp
            .layers
            .into_iter()
            .filter_map(LayerData::into_catalog)
            .collect();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].kind, LayerKind::Wms);
        assert_eq!(catalog[1].kind, LayerKind::VectorTile);
    }

    #[test]
    fn test_projects_response_deserializes() {
        let json = r#"{"projects":[{"id":"p1","name":"Survey","createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-02T00:00:00Z"}]}"#;
        let resp: ProjectsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.projects[0].name, "Survey");
    }

    #[test]
    fn test_graphql_error_response() {
        let json = r#"{"data":null,"errors":[{"message":"Not authenticated"}]}"#;
        let resp: GraphQLResponse<ProjectsResponse> = serde_json::from_str(json).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.errors.unwrap()[0].message, "Not authenticated");
    }

    #[test]
    fn test_error_message_prefers_message_then_error() {
        let status = reqwest::StatusCode::NOT_FOUND;
        assert_eq!(
            error_message(status, r#"{"message":"Project not found"}"#),
            "Project not found"
        );
        assert_eq!(
            error_message(status, r#"{"error":"Bad Gateway","details":"x"}"#),
            "Bad Gateway"
        );
        assert_eq!(error_message(status, "<html>"), "Request failed (404 Not Found)");
    }

    #[test]
    fn test_routing_params_order() {
        let params = routing_params(LonLat::new(77.2, 28.6), LonLat::new(77.4, 28.7));
        assert_eq!(params[0], ("lat1", "28.6".to_string()));
        assert_eq!(params[1], ("lon1", "77.2".to_string()));
        assert_eq!(params[3], ("lon2", "77.4".to_string()));
    }

    #[test]
    fn test_normalize_user_id() {
        assert_eq!(normalize_user_id(Some("  alice ")), Some("alice"));
        assert_eq!(normalize_user_id(Some("   ")), None);
        assert_eq!(normalize_user_id(None), None);
    }

    #[test]
    fn test_thematic_params() {
        let params = thematic_params(23.0, 77.5, " 2005_06 ");
        assert_eq!(params[0], ("lat", "23".to_string()));
        assert_eq!(params[1], ("lon", "77.5".to_string()));
        assert_eq!(params[2], ("year", "2005_06".to_string()));
    }

    #[test]
    fn test_ellipsoid_url_encodes_id() {
        assert_eq!(
            ellipsoid_url("https://maps.example.org", " cdnc43e ").unwrap(),
            "https://maps.example.org/api/bhuvan/ellipsoid?id=cdnc43e"
        );
        assert_eq!(
            ellipsoid_url("https://maps.example.org", "a&b").unwrap(),
            "https://maps.example.org/api/bhuvan/ellipsoid?id=a%26b"
        );
        assert!(ellipsoid_url("", "x").is_err());
    }

    #[test]
    fn test_query_targets_use_executor_routes() {
        assert_eq!(QueryTarget::Personal.path(), "/api/bhuvan/execute-query");
        assert_eq!(QueryTarget::Central.path(), "/api/bhuvan/execute-central-query");
        let body = serde_json::to_value(QueryRequest { query: "SELECT 1" }).unwrap();
        assert_eq!(body, json!({"query": "SELECT 1"}));
    }

    #[test]
    fn test_result_rows_and_columns() {
        let wrapped = json!({"data": [
            {"theme_name": "Forest", "area": 12.5},
            {"theme_name": "Water", "code": null}
        ]});
        let rows = result_rows(&wrapped);
        assert_eq!(rows.len(), 2);
        assert_eq!(result_columns(rows), vec!["theme_name", "area", "code"]);
        assert_eq!(cell_text(rows[0].get("area")), "12.5");
        assert_eq!(cell_text(rows[0].get("theme_name")), "Forest");
        assert_eq!(cell_text(rows[1].get("code")), "");
        assert_eq!(cell_text(rows[1].get("area")), "");

        let bare = json!([{"n": 1}]);
        assert_eq!(result_rows(&bare).len(), 1);
        assert!(result_rows(&json!({"rowCount": 0})).is_empty());
    }

    #[test]
    fn test_build_map_url() {
        assert_eq!(
            build_map_url("https://maps.example.org", "550e8400-e29b-41d4-a716-446655440000"),
            "https://maps.example.org/map-view/550e8400-e29b-41d4-a716-446655440000"
        );
    }
}
