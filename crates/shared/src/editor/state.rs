//! Conversion between a live editor and the persisted [`MapState`].

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::feature::{generate_id, Feature, FeatureKind};
use super::layers::LayerRef;
use super::{check_geometry, normalize_geometry, EditorError, MapEditor};
use crate::catalog::{self, CatalogLayer, LayerKind};
use crate::geojson::{self, FeatureCollection};
use crate::models::{LayerEntry, MapState};
use crate::projection::{geometry_to_lon_lat, geometry_to_map};

/// What a load could not restore.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Saved layers with no catalog match, or that failed validation.
    pub skipped_layers: Vec<(LayerKind, LayerEntry)>,
    /// Annotations without a usable geometry.
    pub skipped_features: usize,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_layers.is_empty() && self.skipped_features == 0
    }
}

fn entry(layer: &LayerRef) -> LayerEntry {
    LayerEntry {
        url: layer.url.clone(),
        layer_name: layer.layer_name.clone().unwrap_or_default(),
    }
}

fn to_geo_feature(feature: &Feature) -> geojson::Feature {
    let mut properties = Map::new();
    properties.insert("name".into(), Value::String(feature.name.clone()));
    geojson::Feature {
        id: Some(Value::String(feature.id.clone())),
        geometry: Some(geometry_to_lon_lat(&feature.geometry)),
        properties: Some(properties),
    }
}

impl MapEditor {
    /// Snapshot view, active layers and every annotation in geographic coordinates.
    pub fn to_map_state(&self) -> MapState {
        let entries = |kind: LayerKind| -> Vec<LayerEntry> {
            self.layers.of_kind(kind).map(|l| entry(&l.layer)).collect()
        };
        MapState {
            view: self.view,
            wms_layers: entries(LayerKind::Wms),
            pbf_layers: entries(LayerKind::VectorTile),
            geo_json_urls: self
                .layers
                .of_kind(LayerKind::ExternalGeoJson)
                .map(|l| l.layer.url.clone())
                .collect(),
            annotations: FeatureCollection {
                features: self
                    .points
                    .iter()
                    .chain(self.polygons.iter())
                    .chain(self.paths.iter())
                    .map(to_geo_feature)
                    .collect(),
            },
        }
    }

    /// Build a fresh editor from a saved state.
    pub fn from_map_state(state: &MapState, catalog: &[CatalogLayer]) -> (MapEditor, LoadReport) {
        let mut editor = MapEditor::new();
        let report = editor.apply_map_state(state, catalog);
        (editor, report)
    }

    /// Replay a saved state into this editor.
    ///
    /// WMS and vector-tile entries are resolved against `catalog` by layer name
    /// and kind; entries without a match are not restored and are listed in the
    /// returned report. Annotations are sorted into collections by geometry type.
    pub fn apply_map_state(&mut self, state: &MapState, catalog: &[CatalogLayer]) -> LoadReport {
        let mut report = LoadReport::default();
        self.view = state.view;

        let named = [
            (LayerKind::Wms, &state.wms_layers),
            (LayerKind::VectorTile, &state.pbf_layers),
        ];
        for (kind, entries) in named {
            for saved in entries {
                let Some(known) = catalog::find(catalog, &saved.layer_name, kind) else {
                    warn!(%kind, layer = %saved.layer_name, "saved layer not in catalog, skipped");
                    report.skipped_layers.push((kind, saved.clone()));
                    continue;
                };
                let layer = LayerRef {
                    kind,
                    url: known.url.clone(),
                    layer_name: Some(known.name.clone()),
                };
                if self.add_layer(layer).is_err() {
                    report.skipped_layers.push((kind, saved.clone()));
                }
            }
        }
        for url in &state.geo_json_urls {
            if self.add_layer(LayerRef::geojson(url.as_str())).is_err() {
                report.skipped_layers.push((
                    LayerKind::ExternalGeoJson,
                    LayerEntry {
                        url: url.clone(),
                        layer_name: String::new(),
                    },
                ));
            }
        }

        for (index, saved) in state.annotations.features.iter().enumerate() {
            match self.restore_feature(saved, index) {
                Ok(id) => debug!(feature_id = %id, "annotation restored"),
                Err(e) => {
                    warn!(index, error = %e, "annotation skipped");
                    report.skipped_features += 1;
                }
            }
        }
        report
    }

    fn restore_feature(&mut self, saved: &geojson::Feature, index: usize) -> Result<String, EditorError> {
        let geometry = saved
            .geometry
            .as_ref()
            .ok_or(EditorError::InvalidGeometry("missing geometry"))?;
        let kind = FeatureKind::from_geometry(geometry)
            .ok_or(EditorError::InvalidGeometry("unsupported geometry type"))?;
        let geometry = geometry_to_map(geometry);
        check_geometry(kind, &geometry)?;

        let id = match saved.id_string().filter(|id| !id.is_empty()) {
            Some(id) if !self.id_taken(&id) => id,
            _ => generate_id(kind, index as i64, |c| self.id_taken(c)),
        };
        let feature = Feature {
            id: id.clone(),
            kind,
            geometry: normalize_geometry(geometry),
            name: saved.property_str("name").unwrap_or_default().to_string(),
        };
        self.collection_mut(kind).insert(feature);
        Ok(id)
    }

    /// All annotations plus loaded external GeoJSON features, in geographic
    /// coordinates, for "Export as GeoJSON".
    pub fn export_geojson(&self) -> Result<FeatureCollection, EditorError> {
        let mut features = self.to_map_state().annotations.features;
        for layer in self.layers.of_kind(LayerKind::ExternalGeoJson) {
            features.extend(layer.features.iter().map(|f| geojson::Feature {
                geometry: f.geometry.as_ref().map(geometry_to_lon_lat),
                ..f.clone()
            }));
        }
        if features.is_empty() {
            return Err(EditorError::NothingToExport);
        }
        Ok(FeatureCollection { features })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::editor::tests::{draw, square};
    use crate::editor::DrawKind;
    use crate::geojson::Geometry;
    use crate::models::ViewState;
    use crate::projection::{to_map, Coord, LonLat};

    const TOLERANCE_M: f64 = 1e-6;

    fn at(lon: f64, lat: f64) -> Coord {
        to_map(LonLat::new(lon, lat))
    }

    /// Two points, one named polygon, one routed path, one catalog WMS layer.
    fn populated() -> MapEditor {
        let mut editor = MapEditor::new();
        editor.set_view(ViewState {
            center: [78.96, 20.59],
            zoom: 4.0,
        });
        draw(&mut editor, DrawKind::Point, Geometry::Point(at(77.2, 28.6)), 1);
        editor.rename_selected("Start").unwrap();
        draw(&mut editor, DrawKind::Point, Geometry::Point(at(77.4, 28.7)), 2);
        let poly = Geometry::Polygon(vec![vec![
            at(76.0, 20.0),
            at(77.0, 20.0),
            at(77.0, 21.0),
            at(76.0, 20.0),
        ]]);
        draw(&mut editor, DrawKind::Polygon, poly, 3);
        editor.rename_selected("Catchment").unwrap();
        let req = editor.request_path().unwrap();
        let path = Geometry::LineString(vec![at(77.2, 28.6), at(77.3, 28.65), at(77.4, 28.7)]);
        editor.apply_route(req.token, Ok(path));
        let drainage = catalog::builtin().into_iter().find(|l| l.name == "BDRAIN").unwrap();
        editor
            .add_layer(LayerRef::wms(drainage.url, drainage.name))
            .unwrap();
        editor
    }

    fn assert_same_features(a: &MapEditor, b: &MapEditor) {
        assert_eq!(a.features().count(), b.features().count());
        for original in a.features() {
            let restored = b.feature(&original.id).unwrap();
            assert_eq!(restored.kind, original.kind);
            assert_eq!(restored.name, original.name);
            let (ca, cb) = (original.geometry.coords(), restored.geometry.coords());
            assert_eq!(ca.len(), cb.len());
            for (x, y) in ca.iter().zip(&cb) {
                assert!(x.distance(y) < TOLERANCE_M, "{x:?} vs {y:?}");
            }
        }
    }

    #[test]
    fn test_round_trip_reproduces_model() {
        let original = populated();
        let state = original.to_map_state();
        let (restored, report) = MapEditor::from_map_state(&state, &catalog::builtin());

        assert!(report.is_complete());
        assert_eq!(restored.view(), original.view());
        assert_eq!(restored.points().len(), 2);
        assert_eq!(restored.polygons().len(), 1);
        assert_eq!(restored.paths().len(), 1);
        assert_same_features(&original, &restored);
        assert!(restored.layers().is_active(LayerKind::Wms, "BDRAIN"));
        assert_eq!(restored.layers().len(), 1);
    }

    #[test]
    fn test_round_trip_through_json() {
        let original = populated();
        let text = serde_json::to_string(&original.to_map_state()).unwrap();
        let state: MapState = serde_json::from_str(&text).unwrap();
        let (restored, _) = MapEditor::from_map_state(&state, &catalog::builtin());
        assert_same_features(&original, &restored);
        assert_eq!(restored.view().center, [78.96, 20.59]);
        assert_eq!(restored.view().zoom, 4.0);
    }

    #[test]
    fn test_serialized_annotations_are_geographic() {
        let state = populated().to_map_state();
        let first = &state.annotations.features[0];
        assert_eq!(first.id_string().as_deref(), Some("point_1"));
        assert_eq!(first.property_str("name"), Some("Start"));
        let c = first.geometry.as_ref().unwrap().coords()[0];
        assert!((c.x - 77.2).abs() < 1e-9);
        assert!((c.y - 28.6).abs() < 1e-9);
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["wmsLayers"][0]["layerName"], "BDRAIN");
        let kinds: Vec<&str> = state
            .annotations
            .features
            .iter()
            .map(|f| f.geometry.as_ref().unwrap().type_name())
            .collect();
        assert_eq!(kinds, vec!["Point", "Point", "Polygon", "LineString"]);
    }

    #[test]
    fn test_unmatched_catalog_layer_reported() {
        let state = MapState {
            wms_layers: vec![LayerEntry {
                url: "https://example.org/wms".into(),
                layer_name: "custom:thing".into(),
            }],
            pbf_layers: vec![LayerEntry {
                url: "https://bhuvanmaps.nrsc.gov.in/tileserver2/mmi.road_rdd/{z}/{x}/{y}.pbf".into(),
                layer_name: "mmi.road_rdd".into(),
            }],
            ..MapState::default()
        };
        let (editor, report) = MapEditor::from_map_state(&state, &catalog::builtin());
        assert_eq!(report.skipped_layers.len(), 1);
        assert_eq!(report.skipped_layers[0].0, LayerKind::Wms);
        assert!(editor.layers().is_active(LayerKind::VectorTile, "mmi.road_rdd"));
        assert_eq!(editor.layers().len(), 1);
    }

    #[test]
    fn test_geojson_urls_restored() {
        let state = MapState {
            geo_json_urls: vec!["https://example.org/a.geojson".into()],
            ..MapState::default()
        };
        let (editor, _) = MapEditor::from_map_state(&state, &[]);
        assert!(editor
            .layers()
            .is_active(LayerKind::ExternalGeoJson, "https://example.org/a.geojson"));
    }

    #[test]
    fn test_kind_inferred_from_geometry_type() {
        let state: MapState = serde_json::from_value(json!({
            "view": {"center": [77.0, 28.0], "zoom": 9},
            "annotations": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "MultiPolygon", "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]]]}, "properties": {"name": "Islands"}},
                {"type": "Feature", "id": "path_7", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}, "properties": null},
                {"type": "Feature", "geometry": {"type": "MultiPoint", "coordinates": [[0, 0]]}, "properties": {}},
                {"type": "Feature", "geometry": null, "properties": {}}
            ]}
        }))
        .unwrap();
        let (editor, report) = MapEditor::from_map_state(&state, &[]);
        assert_eq!(editor.polygons().len(), 1);
        assert_eq!(editor.paths().len(), 1);
        assert!(editor.paths().contains("path_7"));
        assert_eq!(report.skipped_features, 2);
        assert_eq!(editor.polygons().iter().next().unwrap().name, "Islands");
    }

    #[test]
    fn test_duplicate_saved_ids_made_unique() {
        let point = json!({"type": "Feature", "id": "point_1", "geometry": {"type": "Point", "coordinates": [1, 1]}, "properties": {}});
        let state: MapState = serde_json::from_value(json!({
            "view": {"center": [0, 0], "zoom": 2},
            "annotations": {"type": "FeatureCollection", "features": [point.clone(), point]}
        }))
        .unwrap();
        let (editor, _) = MapEditor::from_map_state(&state, &[]);
        assert_eq!(editor.points().len(), 2);
    }

    #[test]
    fn test_export_requires_features() {
        let editor = MapEditor::new();
        assert_eq!(editor.export_geojson(), Err(EditorError::NothingToExport));
    }

    #[test]
    fn test_export_includes_annotations_and_external_features() {
        let mut editor = MapEditor::new();
        draw(&mut editor, DrawKind::Polygon, square(0.0, 0.0, 1000.0), 1);
        let id = editor
            .add_layer(LayerRef::geojson("https://example.org/a.geojson"))
            .unwrap()
            .id();
        editor.complete_geojson_fetch(
            id,
            Ok(json!({"type": "Point", "coordinates": [77.0, 28.0]})),
        );
        let fc = editor.export_geojson().unwrap();
        assert_eq!(fc.features.len(), 2);
        let external = fc.features[1].geometry.as_ref().unwrap().coords()[0];
        assert!((external.x - 77.0).abs() < 1e-9);
        assert!((external.y - 28.0).abs() < 1e-9);
    }
}
