use serde::{Deserialize, Serialize};

/// Kind of remote overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    #[serde(rename = "wms")]
    Wms,
    #[serde(rename = "pbf")]
    VectorTile,
    #[serde(rename = "geojson")]
    ExternalGeoJson,
}

impl LayerKind {
    /// Whether the kind is addressed by a layer name on its service.
    pub fn requires_layer_name(self) -> bool {
        matches!(self, LayerKind::Wms | LayerKind::VectorTile)
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerKind::Wms => write!(f, "WMS"),
            LayerKind::VectorTile => write!(f, "vector tile"),
            LayerKind::ExternalGeoJson => write!(f, "GeoJSON"),
        }
    }
}

/// A known overlay that can be toggled on from the layer panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogLayer {
    pub id: String,
    /// Service-side layer name (`LAYERS` for WMS, tileset name for vector tiles).
    pub name: String,
    pub url: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
}

const WMS_VEC1: &str = "https://bhuvanmaps.nrsc.gov.in/vec1wms/gwc/service/wms";
const WMS_NB24: &str = "https://bhuvanmaps.nrsc.gov.in/nb24wms/gwc/service/wms";

/// The Bhuvan overlays offered out of the box.
pub fn builtin() -> Vec<CatalogLayer> {
    let entry = |id: &str, name: &str, url: &str, label: &str, kind| CatalogLayer {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        label: label.to_string(),
        kind,
    };
    vec![
        entry("bhuvan_drainage", "BDRAIN", WMS_VEC1, "Bhuvan Drainage", LayerKind::Wms),
        entry("bhuvan_basin", "hydrology:BASIN", WMS_VEC1, "Bhuvan Basin", LayerKind::Wms),
        entry(
            "bhuvan_subbasin",
            "hydrology:SUBBASIN",
            WMS_NB24,
            "Bhuvan Subbasin",
            LayerKind::Wms,
        ),
        entry(
            "bhuvan_watershed",
            "hydrology:WSHED",
            WMS_NB24,
            "Bhuvan Watershed",
            LayerKind::Wms,
        ),
        entry(
            "bhuvan_road_rdd",
            "mmi.road_rdd",
            "https://bhuvanmaps.nrsc.gov.in/tileserver2/mmi.road_rdd/{z}/{x}/{y}.pbf",
            "Bhuvan Roadway",
            LayerKind::VectorTile,
        ),
        entry(
            "bhuvan_rail_rdd",
            "bhuvan_rail_rdd",
            "https://bhuvanmaps.nrsc.gov.in/tileserver2/rail.india_rail_network/{z}/{x}/{y}.pbf",
            "Bhuvan Railway",
            LayerKind::VectorTile,
        ),
    ]
}

/// Resolve a saved layer against the catalog by name and kind.
pub fn find<'a>(catalog: &'a [CatalogLayer], name: &str, kind: LayerKind) -> Option<&'a CatalogLayer> {
    catalog.iter().find(|l| l.name == name && l.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_wms_and_vector_tiles() {
        let catalog = builtin();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.iter().filter(|l| l.kind == LayerKind::Wms).count(), 4);
        assert_eq!(
            catalog.iter().filter(|l| l.kind == LayerKind::VectorTile).count(),
            2
        );
    }

    #[test]
    fn test_builtin_ids_are_unique() {
        let catalog = builtin();
        for (i, a) in catalog.iter().enumerate() {
            for b in &catalog[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_find_matches_name_and_kind() {
        let catalog = builtin();
        assert_eq!(
            find(&catalog, "BDRAIN", LayerKind::Wms).map(|l| l.id.as_str()),
            Some("bhuvan_drainage")
        );
        assert!(find(&catalog, "BDRAIN", LayerKind::VectorTile).is_none());
        assert!(find(&catalog, "nope", LayerKind::Wms).is_none());
    }

    #[test]
    fn test_catalog_json_uses_type_member() {
        let json = r#"[{"id":"x","name":"L","url":"https://h/{z}/{x}/{y}.pbf","label":"X","type":"pbf"}]"#;
        let layers: Vec<CatalogLayer> = serde_json::from_str(json).unwrap();
        assert_eq!(layers[0].kind, LayerKind::VectorTile);
    }

    #[test]
    fn test_requires_layer_name() {
        assert!(LayerKind::Wms.requires_layer_name());
        assert!(LayerKind::VectorTile.requires_layer_name());
        assert!(!LayerKind::ExternalGeoJson.requires_layer_name());
    }
}
