//! Routed path between the two drawn points.
//!
//! A path request is split in three steps so the editor never awaits anything:
//! [`MapEditor::request_path`] validates and issues a token, [`fetch_route`]
//! does the network call through a [`RouteSource`], and
//! [`MapEditor::apply_route`] commits the result if it is still current.
//! A result is current when its token is the last one issued and the point set
//! has not changed since it was issued; anything else is dropped.

use serde_json::Value;
use tracing::{debug, warn};

use super::feature::{Feature, FeatureKind};
use super::notice::Notice;
use super::{EditorError, MapEditor};
use crate::geojson::{GeoJson, GeoJsonError, Geometry};
use crate::projection::{geometry_to_map, to_lon_lat, LonLat};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("{0}")]
    Upstream(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unreadable route: {0}")]
    Parse(#[from] GeoJsonError),
    #[error("no route found between the points")]
    EmptyRoute,
}

/// A validated path request, in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub token: u64,
    pub from: LonLat,
    pub to: LonLat,
}

/// Anything that can answer a routing query with a GeoJSON payload.
#[allow(async_fn_in_trait)]
pub trait RouteSource {
    async fn route(&self, from: LonLat, to: LonLat) -> Result<Value, RouteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The path was replaced with the routed line.
    Applied,
    /// Superseded by a newer request or a point change; nothing was touched.
    Stale,
    /// The route failed; paths untouched and an error notice raised.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRoute {
    token: u64,
    generation: u64,
}

/// Request bookkeeping. `generation` moves whenever the point set changes.
#[derive(Debug, Clone, Default)]
pub(super) struct RouteTracker {
    last_token: u64,
    generation: u64,
    pending: Option<PendingRoute>,
}

/// Call `source` for `request` and parse the answer into a map-projection line.
pub async fn fetch_route<S: RouteSource + ?Sized>(
    source: &S,
    request: &RouteRequest,
) -> Result<Geometry, RouteError> {
    let payload = source.route(request.from, request.to).await?;
    parse_route(payload)
}

/// Parse a routing payload into a single line geometry. An `error` member
/// means the upstream refused. Several line features are joined into one
/// MultiLineString so the route stays a single Path.
pub fn parse_route(payload: Value) -> Result<Geometry, RouteError> {
    if let Some(err) = payload.get("error") {
        let message = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(RouteError::Upstream(message));
    }
    let lines: Vec<Geometry> = GeoJson::from_value(payload)?
        .into_iter()
        .filter_map(|f| f.geometry)
        .filter(|g| matches!(g, Geometry::LineString(_) | Geometry::MultiLineString(_)))
        .map(|g| geometry_to_map(&g))
        .collect();
    match <[Geometry; 1]>::try_from(lines) {
        Ok([line]) => Ok(line),
        Err(lines) if lines.is_empty() => Err(RouteError::EmptyRoute),
        Err(lines) => Ok(Geometry::MultiLineString(
            lines
                .into_iter()
                .flat_map(|g| match g {
                    Geometry::LineString(line) => vec![line],
                    Geometry::MultiLineString(parts) => parts,
                    _ => Vec::new(),
                })
                .collect(),
        )),
    }
}

impl MapEditor {
    /// Validate the point set and issue a path request.
    ///
    /// Exactly two points are required; otherwise a warning is raised and no
    /// request is produced. Issuing a request supersedes any in flight.
    pub fn request_path(&mut self) -> Result<RouteRequest, EditorError> {
        let positions: Vec<_> = self.points.iter().filter_map(Feature::position).collect();
        let [a, b] = positions[..] else {
            let count = self.points.len();
            self.notify(Notice::warning("Please draw exactly two points to create a path."));
            return Err(EditorError::WrongPointCount(count));
        };
        self.route.last_token += 1;
        let token = self.route.last_token;
        self.route.pending = Some(PendingRoute {
            token,
            generation: self.route.generation,
        });
        debug!(token, "path requested");
        Ok(RouteRequest {
            token,
            from: to_lon_lat(a),
            to: to_lon_lat(b),
        })
    }

    /// Whether a path request is waiting for its result.
    pub fn route_pending(&self) -> bool {
        self.route.pending.is_some()
    }

    /// Commit the result of the request identified by `token`.
    pub fn apply_route(
        &mut self,
        token: u64,
        result: Result<Geometry, RouteError>,
    ) -> RouteOutcome {
        let current = PendingRoute {
            token,
            generation: self.route.generation,
        };
        if self.route.pending != Some(current) {
            warn!(token, "discarding stale route result");
            return RouteOutcome::Stale;
        }
        self.route.pending = None;

        match result {
            Ok(geometry) => {
                self.paths.clear();
                self.paths.insert(Feature {
                    id: format!("path_{token}"),
                    kind: FeatureKind::Path,
                    geometry,
                    name: String::new(),
                });
                debug!(token, "path applied");
                RouteOutcome::Applied
            }
            Err(e) => {
                warn!(token, error = %e, "route failed");
                self.notify(Notice::error(format!("Error fetching route: {e}")));
                RouteOutcome::Failed
            }
        }
    }

    /// Drop the routed path; the point set it was derived from changed.
    pub(super) fn invalidate_paths(&mut self) {
        self.paths.clear();
        self.route.generation += 1;
        if self.route.pending.take().is_some() {
            debug!("in-flight path request invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::editor::tests::{draw, square};
    use crate::editor::{DrawKind, NoticeLevel};
    use crate::projection::{to_map, Coord};

    struct StubRoute {
        payload: Value,
        calls: Cell<usize>,
    }

    impl StubRoute {
        fn new(payload: Value) -> Self {
            StubRoute {
                payload,
                calls: Cell::new(0),
            }
        }
    }

    impl RouteSource for StubRoute {
        async fn route(&self, _from: LonLat, _to: LonLat) -> Result<Value, RouteError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.payload.clone())
        }
    }

    struct DownRoute;

    impl RouteSource for DownRoute {
        async fn route(&self, _from: LonLat, _to: LonLat) -> Result<Value, RouteError> {
            Err(RouteError::Transport("connection refused".into()))
        }
    }

    fn route_payload() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[77.2, 28.6], [77.3, 28.7], [77.4, 28.7]]},
                "properties": {"distance": 12.5}
            }]
        })
    }

    fn two_points() -> MapEditor {
        let mut editor = MapEditor::new();
        draw(
            &mut editor,
            DrawKind::Point,
            Geometry::Point(to_map(LonLat::new(77.2, 28.6))),
            1,
        );
        draw(
            &mut editor,
            DrawKind::Point,
            Geometry::Point(to_map(LonLat::new(77.4, 28.7))),
            2,
        );
        editor
    }

    #[test]
    fn test_request_requires_exactly_two_points() {
        for count in [0usize, 1, 3] {
            let mut editor = MapEditor::new();
            for i in 0..count {
                draw(
                    &mut editor,
                    DrawKind::Point,
                    Geometry::Point(Coord::new(i as f64, 0.0)),
                    i as i64,
                );
            }
            let before = editor.paths().clone();
            assert_eq!(editor.request_path(), Err(EditorError::WrongPointCount(count)));
            assert!(!editor.route_pending());
            assert_eq!(editor.paths(), &before);
            let notices = editor.take_notices();
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].level, NoticeLevel::Warning);
        }
    }

    #[test]
    fn test_request_converts_points_to_geographic() {
        let mut editor = two_points();
        let req = editor.request_path().unwrap();
        assert!((req.from.lon - 77.2).abs() < 1e-9);
        assert!((req.from.lat - 28.6).abs() < 1e-9);
        assert!((req.to.lon - 77.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_successful_route_replaces_paths() {
        let mut editor = two_points();
        let source = StubRoute::new(route_payload());

        let req = editor.request_path().unwrap();
        let result = fetch_route(&source, &req).await;
        assert_eq!(editor.apply_route(req.token, result), RouteOutcome::Applied);
        assert_eq!(editor.paths().len(), 1);

        // A second request fully recomputes rather than appending.
        let req = editor.request_path().unwrap();
        let result = fetch_route(&source, &req).await;
        assert_eq!(editor.apply_route(req.token, result), RouteOutcome::Applied);
        assert_eq!(editor.paths().len(), 1);
        assert_eq!(source.calls.get(), 2);

        let path = editor.paths().iter().next().unwrap();
        let first = path.geometry.coords()[0];
        let expected = to_map(LonLat::new(77.2, 28.6));
        assert!(first.distance(&expected) < 1e-6);
    }

    #[tokio::test]
    async fn test_upstream_error_leaves_paths_untouched() {
        let mut editor = two_points();
        let ok = StubRoute::new(route_payload());
        let req = editor.request_path().unwrap();
        let result = fetch_route(&ok, &req).await;
        editor.apply_route(req.token, result);
        let before = editor.paths().clone();
        editor.take_notices();

        let failing = StubRoute::new(json!({"error": "x"}));
        let req = editor.request_path().unwrap();
        let result = fetch_route(&failing, &req).await;
        assert!(matches!(&result, Err(RouteError::Upstream(m)) if m == "x"));
        assert_eq!(editor.apply_route(req.token, result), RouteOutcome::Failed);
        assert_eq!(editor.paths(), &before);
        let notices = editor.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(!editor.route_pending());
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_notice() {
        let mut editor = two_points();
        let req = editor.request_path().unwrap();
        let result = fetch_route(&DownRoute, &req).await;
        assert_eq!(editor.apply_route(req.token, result), RouteOutcome::Failed);
        assert!(editor.paths().is_empty());
        assert!(editor.take_notices()[0].message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_older_request_result_is_stale() {
        let mut editor = two_points();
        let source = StubRoute::new(route_payload());
        let first = editor.request_path().unwrap();
        let second = editor.request_path().unwrap();

        let late = fetch_route(&source, &first).await;
        assert_eq!(editor.apply_route(first.token, late), RouteOutcome::Stale);
        assert!(editor.paths().is_empty());
        assert!(editor.route_pending());

        let fresh = fetch_route(&source, &second).await;
        assert_eq!(editor.apply_route(second.token, fresh), RouteOutcome::Applied);
    }

    #[tokio::test]
    async fn test_point_change_invalidates_in_flight_route() {
        let mut editor = two_points();
        let source = StubRoute::new(route_payload());
        let req = editor.request_path().unwrap();

        let first = editor.points().iter().next().unwrap().id.clone();
        editor.select(&first).unwrap();
        editor.delete_selected().unwrap();

        let result = fetch_route(&source, &req).await;
        assert_eq!(editor.apply_route(req.token, result), RouteOutcome::Stale);
        assert!(editor.paths().is_empty());
    }

    #[tokio::test]
    async fn test_new_point_draw_clears_existing_path() {
        let mut editor = two_points();
        let source = StubRoute::new(route_payload());
        let req = editor.request_path().unwrap();
        let result = fetch_route(&source, &req).await;
        editor.apply_route(req.token, result);
        assert_eq!(editor.paths().len(), 1);

        editor.toggle_draw(DrawKind::Polygon);
        assert_eq!(editor.paths().len(), 1);
        editor.toggle_draw(DrawKind::Point);
        assert!(editor.paths().is_empty());
    }

    #[test]
    fn test_paths_are_not_selectable() {
        let mut editor = two_points();
        let req = editor.request_path().unwrap();
        let line = Geometry::LineString(vec![Coord::new(0.0, 0.0), Coord::new(1.0, 1.0)]);
        editor.apply_route(req.token, Ok(line));
        let id = format!("path_{}", req.token);
        assert_eq!(editor.select(&id), Err(EditorError::PathNotSelectable));
    }

    #[test]
    fn test_parse_route_accepts_bare_geometry() {
        let line = parse_route(json!({"type": "MultiLineString", "coordinates": [[[77.0, 28.0], [77.1, 28.1]]]})).unwrap();
        assert_eq!(line.type_name(), "MultiLineString");
    }

    #[tokio::test]
    async fn test_multi_feature_route_becomes_one_path() {
        let mut editor = two_points();
        let legs = StubRoute::new(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[77.2, 28.6], [77.3, 28.7]]}, "properties": {}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [77.3, 28.7]}, "properties": {}},
                {"type": "Feature", "geometry": {"type": "MultiLineString", "coordinates": [[[77.3, 28.7], [77.35, 28.7]], [[77.35, 28.7], [77.4, 28.7]]]}, "properties": {}}
            ]
        }));
        let req = editor.request_path().unwrap();
        let result = fetch_route(&legs, &req).await;
        assert_eq!(editor.apply_route(req.token, result), RouteOutcome::Applied);

        assert_eq!(editor.paths().len(), 1);
        let path = editor.paths().iter().next().unwrap();
        assert_eq!(path.id, format!("path_{}", req.token));
        let Geometry::MultiLineString(parts) = &path.geometry else {
            panic!("expected a MultiLineString, got {}", path.geometry.type_name());
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_parse_route_without_lines_is_empty() {
        let payload = json!({"type": "Point", "coordinates": [77.0, 28.0]});
        assert!(matches!(parse_route(payload), Err(RouteError::EmptyRoute)));
        let polygon_only = square(0.0, 0.0, 1.0);
        let payload = serde_json::to_value(&polygon_only).unwrap();
        assert!(matches!(parse_route(payload), Err(RouteError::EmptyRoute)));
    }

    #[test]
    fn test_parse_route_non_string_error() {
        let err = parse_route(json!({"error": {"code": 5}})).unwrap_err();
        assert!(matches!(err, RouteError::Upstream(m) if m.contains("\"code\"")));
    }
}
