use serde::{Deserialize, Serialize};

use crate::geojson::FeatureCollection;

/// Header carrying the opaque per-user identifier on every protected call.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Camera position as persisted: geographic center and zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// `[longitude, latitude]`
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        // Center of India
        ViewState {
            center: [78.9629, 20.5937],
            zoom: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerEntry {
    pub url: String,
    pub layer_name: String,
}

/// Everything needed to rebuild an editor session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    pub view: ViewState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wms_layers: Vec<LayerEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pbf_layers: Vec<LayerEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub geo_json_urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: FeatureCollection,
}

// Rows written before vector-tile layers existed come back with null columns.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMapRequest {
    #[serde(default)]
    pub project_name: String,
    pub map_state: Option<MapState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMapResponse {
    pub message: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMapResponse {
    pub project_id: String,
    pub name: String,
    pub created_at: String,
    pub map_state: MapState,
}

/// Project metadata. The map state itself lives in a separate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub project_id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Generate an opaque project identifier.
#[cfg(feature = "uuid-support")]
pub fn new_project_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
