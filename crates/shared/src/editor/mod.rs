//! Client-side model of a map editing session.
//!
//! [`MapEditor`] holds the drawn annotations (points, polygons and the routed
//! path), the remote overlays toggled onto the map, the camera, and the state
//! of the draw/select tools. It performs no I/O: network work is described by
//! request values (see [`routing`]) and its results are fed back in, which keeps
//! every transition testable without a browser.

pub mod feature;
pub mod interaction;
pub mod layers;
pub mod notice;
pub mod routing;
pub mod state;
pub mod style;

use geo::Contains;
use tracing::debug;

use crate::catalog::LayerKind;
use crate::geojson::Geometry;
use crate::models::ViewState;
use crate::projection::Coord;

pub use feature::{Feature, FeatureKind, FeatureSet};
pub use interaction::{DrawKind, Tool, ToolChange};
pub use layers::{
    ActiveLayer, AddOutcome, FailureOutcome, FetchOutcome, LayerId, LayerRef, LayerRegistry,
};
pub use notice::{Notice, NoticeLevel};
pub use routing::{fetch_route, parse_route, RouteError, RouteOutcome, RouteRequest, RouteSource};
pub use state::LoadReport;
pub use style::{feature_style, FeatureStyle};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EditorError {
    #[error("exactly two points are required to create a path, found {0}")]
    WrongPointCount(usize),
    #[error("no draw tool is active")]
    NotDrawing,
    #[error("a {expected} cannot be created from a {found} geometry")]
    GeometryMismatch {
        expected: FeatureKind,
        found: &'static str,
    },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("feature {0} not found")]
    FeatureNotFound(String),
    #[error("path features cannot be selected")]
    PathNotSelectable,
    #[error("selection is disabled while drawing")]
    SelectionDisabled,
    #[error("nothing is selected")]
    NothingSelected,
    #[error("invalid layer: {0}")]
    InvalidLayer(String),
    #[error("{kind} layer {key} is not active")]
    LayerNotFound { kind: LayerKind, key: String },
    #[error("there are no features to export")]
    NothingToExport,
}

#[derive(Debug, Clone, Default)]
pub struct MapEditor {
    view: ViewState,
    points: FeatureSet,
    polygons: FeatureSet,
    paths: FeatureSet,
    selected: Option<String>,
    tool: Tool,
    layers: LayerRegistry,
    route: routing::RouteTracker,
    notices: Vec<Notice>,
}

impl MapEditor {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------------
    // View
    // ---------------------------------------------------------------------------

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn set_view(&mut self, view: ViewState) {
        self.view = view;
    }

    // ---------------------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------------------

    pub fn points(&self) -> &FeatureSet {
        &self.points
    }

    pub fn polygons(&self) -> &FeatureSet {
        &self.polygons
    }

    pub fn paths(&self) -> &FeatureSet {
        &self.paths
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    /// All annotations in draw order: polygons under paths under points.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.polygons
            .iter()
            .chain(self.paths.iter())
            .chain(self.points.iter())
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.points
            .get(id)
            .or_else(|| self.polygons.get(id))
            .or_else(|| self.paths.get(id))
    }

    pub(crate) fn id_taken(&self, id: &str) -> bool {
        self.feature(id).is_some()
    }

    fn collection_mut(&mut self, kind: FeatureKind) -> &mut FeatureSet {
        match kind {
            FeatureKind::Point => &mut self.points,
            FeatureKind::Polygon => &mut self.polygons,
            FeatureKind::Path => &mut self.paths,
        }
    }

    /// Style for a feature under the current selection.
    pub fn style_of(&self, feature: &Feature) -> FeatureStyle {
        feature_style(feature, self.selected.as_deref())
    }

    // ---------------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------------

    pub fn selection_enabled(&self) -> bool {
        matches!(self.tool, Tool::Idle)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_feature(&self) -> Option<&Feature> {
        self.feature(self.selected.as_deref()?)
    }

    /// Select a Point or Polygon, replacing any previous selection.
    pub fn select(&mut self, id: &str) -> Result<(), EditorError> {
        if !self.selection_enabled() {
            return Err(EditorError::SelectionDisabled);
        }
        match self.feature(id).map(|f| f.kind) {
            Some(FeatureKind::Point | FeatureKind::Polygon) => {
                debug!(feature_id = %id, "feature selected");
                self.selected = Some(id.to_string());
                Ok(())
            }
            Some(FeatureKind::Path) => Err(EditorError::PathNotSelectable),
            None => Err(EditorError::FeatureNotFound(id.to_string())),
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Select whatever is under `at`, or clear the selection when nothing is.
    /// Returns the selected id.
    pub fn select_at(&mut self, at: Coord, tolerance: f64) -> Result<Option<String>, EditorError> {
        if !self.selection_enabled() {
            return Err(EditorError::SelectionDisabled);
        }
        match self.selectable_at(at, tolerance).map(|f| f.id.clone()) {
            Some(id) => {
                self.select(&id)?;
                Ok(Some(id))
            }
            None => {
                self.clear_selection();
                Ok(None)
            }
        }
    }

    /// Topmost selectable feature under `at`. Points win over polygons; the
    /// nearest point within `tolerance` (map units) is picked.
    pub fn selectable_at(&self, at: Coord, tolerance: f64) -> Option<&Feature> {
        let nearest_point = self
            .points
            .iter()
            .filter_map(|f| Some((f, f.position()?.distance(&at))))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(f, _)| f);
        nearest_point.or_else(|| {
            self.polygons
                .iter()
                .rev()
                .find(|f| geometry_contains(&f.geometry, at))
        })
    }

    pub fn rename_selected(&mut self, name: &str) -> Result<(), EditorError> {
        let renamed = self
            .selected_feature()
            .ok_or(EditorError::NothingSelected)?
            .with_name(name.trim());
        self.collection_mut(renamed.kind).replace(renamed);
        Ok(())
    }

    /// Replace the selected feature's geometry after a drag.
    pub fn reshape_selected(&mut self, geometry: Geometry) -> Result<(), EditorError> {
        let current = self.selected_feature().ok_or(EditorError::NothingSelected)?;
        let kind = current.kind;
        check_geometry(kind, &geometry)?;
        let reshaped = current.with_geometry(normalize_geometry(geometry));
        self.collection_mut(kind).replace(reshaped);
        if kind == FeatureKind::Point {
            self.invalidate_paths();
        }
        Ok(())
    }

    pub fn delete_selected(&mut self) -> Result<Feature, EditorError> {
        let id = self.selected.take().ok_or(EditorError::NothingSelected)?;
        let kind = self
            .feature(&id)
            .map(|f| f.kind)
            .ok_or_else(|| EditorError::FeatureNotFound(id.clone()))?;
        let removed = self
            .collection_mut(kind)
            .remove(&id)
            .ok_or(EditorError::FeatureNotFound(id))?;
        if kind == FeatureKind::Point {
            self.invalidate_paths();
        }
        debug!(feature_id = %removed.id, kind = %kind, "feature deleted");
        Ok(removed)
    }

    // ---------------------------------------------------------------------------
    // Notices
    // ---------------------------------------------------------------------------

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain pending notices for display.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Reject geometries that cannot back a feature of `kind`.
fn check_geometry(kind: FeatureKind, geometry: &Geometry) -> Result<(), EditorError> {
    if FeatureKind::from_geometry(geometry) != Some(kind) {
        return Err(EditorError::GeometryMismatch {
            expected: kind,
            found: geometry.type_name(),
        });
    }
    let valid = match geometry {
        Geometry::Point(c) => c.x.is_finite() && c.y.is_finite(),
        Geometry::Polygon(rings) => rings.first().is_some_and(|r| distinct_len(r) >= 3),
        Geometry::MultiPolygon(polys) => {
            !polys.is_empty()
                && polys
                    .iter()
                    .all(|rings| rings.first().is_some_and(|r| distinct_len(r) >= 3))
        }
        Geometry::LineString(line) => line.len() >= 2,
        Geometry::MultiLineString(lines) => lines.iter().any(|l| l.len() >= 2),
        Geometry::MultiPoint(_) => false,
    };
    if valid {
        Ok(())
    } else {
        Err(EditorError::InvalidGeometry("too few positions"))
    }
}

fn distinct_len(ring: &[Coord]) -> usize {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => ring.len() - 1,
        _ => ring.len(),
    }
}

/// Close any open polygon rings.
fn normalize_geometry(geometry: Geometry) -> Geometry {
    let close = |mut ring: Vec<Coord>| {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
            if first != *last {
                ring.push(first);
            }
        }
        ring
    };
    match geometry {
        Geometry::Polygon(rings) => Geometry::Polygon(rings.into_iter().map(close).collect()),
        Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
            polys
                .into_iter()
                .map(|rings| rings.into_iter().map(close).collect())
                .collect(),
        ),
        other => other,
    }
}

/// Whether `at` lies inside a polygon geometry. Holes and boundaries are outside.
fn geometry_contains(geometry: &Geometry, at: Coord) -> bool {
    let at = geo::Point::from(at);
    match geo::Geometry::from(geometry) {
        geo::Geometry::Polygon(p) => p.contains(&at),
        geo::Geometry::MultiPolygon(mp) => mp.contains(&at),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            Coord::new(x, y),
            Coord::new(x + size, y),
            Coord::new(x + size, y + size),
            Coord::new(x, y + size),
            Coord::new(x, y),
        ]])
    }

    pub(crate) fn draw(editor: &mut MapEditor, kind: DrawKind, geometry: Geometry, now: i64) -> String {
        editor.toggle_draw(kind);
        editor.commit_draw(geometry, now).unwrap()
    }

    #[test]
    fn test_new_editor_is_empty_with_default_view() {
        let editor = MapEditor::new();
        assert_eq!(editor.view(), ViewState::default());
        assert_eq!(editor.features().count(), 0);
        assert!(editor.selection_enabled());
        assert!(editor.selected_id().is_none());
    }

    #[test]
    fn test_selection_is_exclusive_across_kinds() {
        let mut editor = MapEditor::new();
        let p1 = draw(&mut editor, DrawKind::Point, Geometry::Point(Coord::new(0.0, 0.0)), 1);
        let p2 = draw(&mut editor, DrawKind::Point, Geometry::Point(Coord::new(5.0, 5.0)), 2);
        let poly = draw(&mut editor, DrawKind::Polygon, square(10.0, 10.0, 4.0), 3);

        editor.select(&p1).unwrap();
        editor.select(&poly).unwrap();
        let selected: Vec<&Feature> = editor.features().filter(|f| editor.style_of(f).selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, poly);

        editor.select(&p2).unwrap();
        assert_eq!(editor.selected_id(), Some(p2.as_str()));
        assert!(!editor.style_of(editor.feature(&poly).unwrap()).selected);
    }

    #[test]
    fn test_select_rejects_unknown_and_disabled() {
        let mut editor = MapEditor::new();
        assert_eq!(
            editor.select("point_9"),
            Err(EditorError::FeatureNotFound("point_9".into()))
        );
        editor.toggle_draw(DrawKind::Point);
        assert_eq!(editor.select("point_9"), Err(EditorError::SelectionDisabled));
    }

    #[test]
    fn test_select_at_prefers_points_over_polygons() {
        let mut editor = MapEditor::new();
        let poly = draw(&mut editor, DrawKind::Polygon, square(0.0, 0.0, 100.0), 1);
        let pt = draw(&mut editor, DrawKind::Point, Geometry::Point(Coord::new(50.0, 50.0)), 2);

        assert_eq!(editor.select_at(Coord::new(52.0, 50.0), 5.0).unwrap(), Some(pt));
        assert_eq!(editor.select_at(Coord::new(10.0, 10.0), 5.0).unwrap(), Some(poly));
        assert_eq!(editor.select_at(Coord::new(500.0, 500.0), 5.0).unwrap(), None);
        assert!(editor.selected_id().is_none());
    }

    #[test]
    fn test_polygon_hole_is_not_inside() {
        let ring = |x: f64, s: f64| {
            vec![
                Coord::new(x, x),
                Coord::new(x + s, x),
                Coord::new(x + s, x + s),
                Coord::new(x, x + s),
                Coord::new(x, x),
            ]
        };
        let donut = Geometry::Polygon(vec![ring(0.0, 10.0), ring(4.0, 2.0)]);
        assert!(geometry_contains(&donut, Coord::new(1.0, 1.0)));
        assert!(!geometry_contains(&donut, Coord::new(5.0, 5.0)));
    }

    #[test]
    fn test_select_at_hits_any_part_of_multipolygon() {
        let mut editor = MapEditor::new();
        let part = |x: f64| {
            vec![vec![
                Coord::new(x, 0.0),
                Coord::new(x + 10.0, 0.0),
                Coord::new(x + 10.0, 10.0),
                Coord::new(x, 0.0),
            ]]
        };
        let islands = draw(
            &mut editor,
            DrawKind::Polygon,
            Geometry::MultiPolygon(vec![part(0.0), part(100.0)]),
            1,
        );
        editor.clear_selection();

        assert_eq!(editor.select_at(Coord::new(108.0, 2.0), 1.0).unwrap(), Some(islands));
        assert_eq!(editor.select_at(Coord::new(50.0, 2.0), 1.0).unwrap(), None);
    }

    #[test]
    fn test_rename_replaces_feature_value() {
        let mut editor = MapEditor::new();
        let poly = draw(&mut editor, DrawKind::Polygon, square(0.0, 0.0, 1.0), 1);
        let before = editor.feature(&poly).unwrap().clone();
        editor.rename_selected("  Reservoir ").unwrap();
        let after = editor.feature(&poly).unwrap();
        assert_eq!(after.name, "Reservoir");
        assert_eq!(after.geometry, before.geometry);
        assert_eq!(editor.style_of(after).label.as_deref(), Some("Reservoir"));
        assert_eq!(before.name, "");
    }

    #[test]
    fn test_rename_without_selection_fails() {
        let mut editor = MapEditor::new();
        assert_eq!(editor.rename_selected("x"), Err(EditorError::NothingSelected));
    }

    #[test]
    fn test_reshape_checks_kind_and_closes_ring() {
        let mut editor = MapEditor::new();
        let poly = draw(&mut editor, DrawKind::Polygon, square(0.0, 0.0, 1.0), 1);
        let err = editor
            .reshape_selected(Geometry::Point(Coord::new(1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, EditorError::GeometryMismatch { .. }));

        let open = Geometry::Polygon(vec![vec![
            Coord::new(0.0, 0.0),
            Coord::new(2.0, 0.0),
            Coord::new(2.0, 2.0),
        ]]);
        editor.reshape_selected(open).unwrap();
        let coords = editor.feature(&poly).unwrap().geometry.coords();
        assert_eq!(coords.len(), 4);
        assert_eq!(coords.first(), coords.last());
    }

    #[test]
    fn test_delete_selected_clears_selection() {
        let mut editor = MapEditor::new();
        let poly = draw(&mut editor, DrawKind::Polygon, square(0.0, 0.0, 1.0), 1);
        let removed = editor.delete_selected().unwrap();
        assert_eq!(removed.id, poly);
        assert!(editor.polygons().is_empty());
        assert!(editor.selected_id().is_none());
        assert_eq!(editor.delete_selected(), Err(EditorError::NothingSelected));
    }

    #[test]
    fn test_take_notices_drains_queue() {
        let mut editor = MapEditor::new();
        editor.notify(Notice::info("hello"));
        assert_eq!(editor.notices().len(), 1);
        let drained = editor.take_notices();
        assert_eq!(drained, vec![Notice::info("hello")]);
        assert!(editor.notices().is_empty());
    }
}
