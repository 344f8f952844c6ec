use crate::geojson::Geometry;
use crate::projection::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Point,
    Polygon,
    Path,
}

impl FeatureKind {
    /// Prefix used for generated ids (`point_1712345678901`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            FeatureKind::Point => "point",
            FeatureKind::Polygon => "polygon",
            FeatureKind::Path => "path",
        }
    }

    /// Infer the collection a geometry belongs to. Geometries the editor does
    /// not draw (e.g. MultiPoint) have no kind.
    pub fn from_geometry(geometry: &Geometry) -> Option<FeatureKind> {
        match geometry {
            Geometry::Point(_) => Some(FeatureKind::Point),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Some(FeatureKind::Polygon),
            Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(FeatureKind::Path),
            Geometry::MultiPoint(_) => None,
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Point => write!(f, "Point"),
            FeatureKind::Polygon => write!(f, "Polygon"),
            FeatureKind::Path => write!(f, "Path"),
        }
    }
}

/// A drawn annotation. Geometry is in map projection.
///
/// Features are values: edits produce a new `Feature` that replaces the old one
/// in its [`FeatureSet`], so anything derived from a feature (its style, the
/// editor panel) only has to look at current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub kind: FeatureKind,
    pub geometry: Geometry,
    pub name: String,
}

impl Feature {
    pub fn with_name(&self, name: impl Into<String>) -> Feature {
        Feature {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_geometry(&self, geometry: Geometry) -> Feature {
        Feature {
            geometry,
            ..self.clone()
        }
    }

    /// The point position for Point features.
    pub fn position(&self) -> Option<Coord> {
        match self.geometry {
            Geometry::Point(c) => Some(c),
            _ => None,
        }
    }
}

/// Insertion-ordered collection with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    items: Vec<Feature>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.items.iter().find(|f| f.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Add a feature. Returns `false` (and leaves the set unchanged) when the id is taken.
    pub fn insert(&mut self, feature: Feature) -> bool {
        if self.contains(&feature.id) {
            return false;
        }
        self.items.push(feature);
        true
    }

    /// Swap in a new value for an existing id, keeping its position.
    pub fn replace(&mut self, feature: Feature) -> Option<Feature> {
        let slot = self.items.iter_mut().find(|f| f.id == feature.id)?;
        Some(std::mem::replace(slot, feature))
    }

    pub fn remove(&mut self, id: &str) -> Option<Feature> {
        let idx = self.items.iter().position(|f| f.id == id)?;
        Some(self.items.remove(idx))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Build a `{kind}_{timestamp}` id, suffixing `_{n}` until `taken` rejects it.
pub fn generate_id(kind: FeatureKind, now_ms: i64, taken: impl Fn(&str) -> bool) -> String {
    let base = format!("{}_{}", kind.id_prefix(), now_ms);
    if !taken(&base) {
        return base;
    }
    (1u32..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, x: f64, y: f64) -> Feature {
        Feature {
            id: id.to_string(),
            kind: FeatureKind::Point,
            geometry: Geometry::Point(Coord::new(x, y)),
            name: String::new(),
        }
    }

    #[test]
    fn test_kind_from_geometry() {
        assert_eq!(
            FeatureKind::from_geometry(&Geometry::Point(Coord::new(0.0, 0.0))),
            Some(FeatureKind::Point)
        );
        assert_eq!(
            FeatureKind::from_geometry(&Geometry::MultiPolygon(vec![])),
            Some(FeatureKind::Polygon)
        );
        assert_eq!(
            FeatureKind::from_geometry(&Geometry::LineString(vec![])),
            Some(FeatureKind::Path)
        );
        assert_eq!(FeatureKind::from_geometry(&Geometry::MultiPoint(vec![])), None);
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut set = FeatureSet::default();
        assert!(set.insert(point("a", 0.0, 0.0)));
        assert!(!set.insert(point("a", 1.0, 1.0)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a").unwrap().position(), Some(Coord::new(0.0, 0.0)));
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut set = FeatureSet::default();
        set.insert(point("a", 0.0, 0.0));
        set.insert(point("b", 1.0, 1.0));
        let renamed = set.get("a").unwrap().with_name("Gate");
        let old = set.replace(renamed).unwrap();
        assert_eq!(old.name, "");
        let ids: Vec<&str> = set.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(set.get("a").unwrap().name, "Gate");
    }

    #[test]
    fn test_replace_unknown_id_is_none() {
        let mut set = FeatureSet::default();
        assert!(set.replace(point("x", 0.0, 0.0)).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_generate_id_format() {
        assert_eq!(
            generate_id(FeatureKind::Polygon, 1_700_000_000_000, |_| false),
            "polygon_1700000000000"
        );
    }

    #[test]
    fn test_generate_id_suffixes_on_collision() {
        let taken = ["point_5", "point_5_1"];
        let id = generate_id(FeatureKind::Point, 5, |c| taken.contains(&c));
        assert_eq!(id, "point_5_2");
    }
}
