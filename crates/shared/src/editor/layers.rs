//! Remote overlays toggled onto the map.
//!
//! WMS and vector-tile layers are identified by `(kind, layer name)`; external
//! GeoJSON layers have no name and are identified by `(kind, url)`. Each
//! activation gets a fresh [`LayerId`], so callbacks raised by a layer that
//! was removed (or removed and re-added) never touch the current instance.

use serde_json::Value;
use tracing::{debug, warn};

use super::notice::Notice;
use super::{EditorError, MapEditor};
use crate::catalog::LayerKind;
use crate::geojson::{self, GeoJson};
use crate::projection::geometry_to_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// What to show: service URL plus, for named kinds, the layer on that service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRef {
    pub kind: LayerKind,
    pub url: String,
    pub layer_name: Option<String>,
}

impl LayerRef {
    pub fn wms(url: impl Into<String>, layer_name: impl Into<String>) -> Self {
        LayerRef {
            kind: LayerKind::Wms,
            url: url.into(),
            layer_name: Some(layer_name.into()),
        }
    }

    pub fn vector_tile(url: impl Into<String>, layer_name: impl Into<String>) -> Self {
        LayerRef {
            kind: LayerKind::VectorTile,
            url: url.into(),
            layer_name: Some(layer_name.into()),
        }
    }

    pub fn geojson(url: impl Into<String>) -> Self {
        LayerRef {
            kind: LayerKind::ExternalGeoJson,
            url: url.into(),
            layer_name: None,
        }
    }

    /// Identity within its kind: the layer name, or the URL for GeoJSON.
    pub fn key(&self) -> &str {
        match (&self.layer_name, self.kind.requires_layer_name()) {
            (Some(name), true) => name,
            _ => &self.url,
        }
    }

    /// Trim and validate. WMS URLs lose their query string; GetMap
    /// parameters are added per request.
    pub fn normalized(self) -> Result<LayerRef, EditorError> {
        let mut url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(EditorError::InvalidLayer("a URL is required".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/')) {
            return Err(EditorError::InvalidLayer(format!("unsupported URL: {url}")));
        }
        if self.kind == LayerKind::Wms {
            if let Some(idx) = url.find('?') {
                url.truncate(idx);
            }
        }
        let layer_name = if self.kind.requires_layer_name() {
            let name = self
                .layer_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    EditorError::InvalidLayer(format!("a {} layer needs a layer name", self.kind))
                })?;
            Some(name.to_string())
        } else {
            None
        };
        Ok(LayerRef {
            kind: self.kind,
            url,
            layer_name,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLayer {
    pub id: LayerId,
    pub layer: LayerRef,
    /// Features of an external GeoJSON layer, in map projection. Empty until
    /// the fetch completes and for the other kinds.
    pub features: Vec<geojson::Feature>,
    /// Set when a GeoJSON fetch failed; the layer stays registered.
    pub failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added(LayerId),
    AlreadyActive(LayerId),
}

impl AddOutcome {
    pub fn id(self) -> LayerId {
        match self {
            AddOutcome::Added(id) | AddOutcome::AlreadyActive(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Tiled layer torn down.
    Removed(LayerRef),
    /// GeoJSON layer kept, marked failed.
    Retained(LayerRef),
    /// No such active layer (already removed); ignored.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded(usize),
    Failed,
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerRegistry {
    layers: Vec<ActiveLayer>,
    last_id: u64,
}

impl LayerRegistry {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveLayer> {
        self.layers.iter()
    }

    pub fn of_kind(&self, kind: LayerKind) -> impl Iterator<Item = &ActiveLayer> {
        self.layers.iter().filter(move |l| l.layer.kind == kind)
    }

    pub fn get(&self, id: LayerId) -> Option<&ActiveLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn find(&self, kind: LayerKind, key: &str) -> Option<&ActiveLayer> {
        self.layers
            .iter()
            .find(|l| l.layer.kind == kind && l.layer.key() == key)
    }

    pub fn is_active(&self, kind: LayerKind, key: &str) -> bool {
        self.find(kind, key).is_some()
    }

    pub fn add(&mut self, layer: LayerRef) -> Result<AddOutcome, EditorError> {
        let layer = layer.normalized()?;
        if let Some(existing) = self.find(layer.kind, layer.key()) {
            return Ok(AddOutcome::AlreadyActive(existing.id));
        }
        self.last_id += 1;
        let id = LayerId(self.last_id);
        self.layers.push(ActiveLayer {
            id,
            layer,
            features: Vec::new(),
            failed: false,
        });
        Ok(AddOutcome::Added(id))
    }

    pub fn remove(&mut self, kind: LayerKind, key: &str) -> Result<LayerRef, EditorError> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.layer.kind == kind && l.layer.key() == key)
            .ok_or_else(|| EditorError::LayerNotFound {
                kind,
                key: key.to_string(),
            })?;
        Ok(self.layers.remove(idx).layer)
    }

    pub fn remove_id(&mut self, id: LayerId) -> Option<ActiveLayer> {
        let idx = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(idx))
    }

    fn get_mut(&mut self, id: LayerId) -> Option<&mut ActiveLayer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }
}

impl MapEditor {
    /// Activate a layer. Re-adding an active layer is a no-op with a notice.
    pub fn add_layer(&mut self, layer: LayerRef) -> Result<AddOutcome, EditorError> {
        let key = layer.key().trim().to_string();
        let outcome = match self.layers.add(layer) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notify(Notice::warning(e.to_string()));
                return Err(e);
            }
        };
        match outcome {
            AddOutcome::Added(id) => debug!(%id, layer = %key, "layer added"),
            AddOutcome::AlreadyActive(_) => {
                self.notify(Notice::info(format!("Layer '{key}' is already on the map.")))
            }
        }
        Ok(outcome)
    }

    pub fn remove_layer(&mut self, kind: LayerKind, key: &str) -> Result<LayerRef, EditorError> {
        let removed = self.layers.remove(kind, key)?;
        debug!(%kind, layer = %key, "layer removed");
        Ok(removed)
    }

    /// A tile or feature fetch for layer `id` failed.
    ///
    /// Tiled layers are removed outright; a GeoJSON layer stays registered
    /// (empty) and is only reported.
    pub fn report_layer_failure(&mut self, id: LayerId) -> FailureOutcome {
        let Some(active) = self.layers.get(id) else {
            warn!(%id, "load failure for inactive layer ignored");
            return FailureOutcome::Unknown;
        };
        let layer = active.layer.clone();
        if layer.kind == LayerKind::ExternalGeoJson {
            if let Some(active) = self.layers.get_mut(id) {
                active.failed = true;
                active.features.clear();
            }
            warn!(%id, url = %layer.url, "geojson layer failed to load");
            self.notify(Notice::error(format!(
                "Error loading features from {}.",
                layer.url
            )));
            return FailureOutcome::Retained(layer);
        }
        self.layers.remove_id(id);
        warn!(%id, layer = %layer.key(), "tile load failed, layer removed");
        self.notify(Notice::error(format!(
            "Error loading tiles for layer '{}'. The layer has been removed.",
            layer.key()
        )));
        FailureOutcome::Removed(layer)
    }

    /// Deliver the body fetched for GeoJSON layer `id` (geographic coordinates).
    pub fn complete_geojson_fetch(&mut self, id: LayerId, body: Result<Value, String>) -> FetchOutcome {
        let is_geojson_layer = self
            .layers
            .get(id)
            .is_some_and(|l| l.layer.kind == LayerKind::ExternalGeoJson);
        if !is_geojson_layer {
            warn!(%id, "geojson result for inactive layer ignored");
            return FetchOutcome::Stale;
        }
        let parsed = body.and_then(|v| GeoJson::from_value(v).map_err(|e| e.to_string()));
        match parsed {
            Ok(features) => {
                let projected: Vec<geojson::Feature> = features
                    .into_iter()
                    .map(|mut f| {
                        f.geometry = f.geometry.as_ref().map(geometry_to_map);
                        f
                    })
                    .collect();
                let count = projected.len();
                if let Some(active) = self.layers.get_mut(id) {
                    active.features = projected;
                    active.failed = false;
                }
                debug!(%id, count, "geojson layer loaded");
                FetchOutcome::Loaded(count)
            }
            Err(e) => {
                warn!(%id, error = %e, "geojson fetch failed");
                self.report_layer_failure(id);
                FetchOutcome::Failed
            }
        }
    }
}
