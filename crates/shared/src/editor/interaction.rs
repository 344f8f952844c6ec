use tracing::debug;

use super::feature::{generate_id, Feature, FeatureKind};
use super::{check_geometry, normalize_geometry, EditorError, MapEditor};
use crate::geojson::Geometry;

/// Geometry kinds the user can draw by hand. Paths only come from routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Point,
    Polygon,
}

impl From<DrawKind> for FeatureKind {
    fn from(kind: DrawKind) -> Self {
        match kind {
            DrawKind::Point => FeatureKind::Point,
            DrawKind::Polygon => FeatureKind::Polygon,
        }
    }
}

/// Active tool. Selection and modification are available only while `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Idle,
    Drawing(DrawKind),
}

/// What a toolbar button press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChange {
    Started(DrawKind),
    /// The previous tool was torn down before the new one was installed.
    Switched { from: DrawKind, to: DrawKind },
    Cancelled(DrawKind),
}

impl MapEditor {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Press the "Add Point"/"Add Polygon" button.
    ///
    /// Pressing the active tool again cancels it without committing anything.
    pub fn toggle_draw(&mut self, kind: DrawKind) -> ToolChange {
        let change = match self.tool {
            Tool::Drawing(active) if active == kind => {
                self.tool = Tool::Idle;
                debug!(?kind, "draw cancelled");
                return ToolChange::Cancelled(kind);
            }
            Tool::Drawing(active) => ToolChange::Switched {
                from: active,
                to: kind,
            },
            Tool::Idle => ToolChange::Started(kind),
        };
        self.selected = None;
        self.tool = Tool::Drawing(kind);
        if kind == DrawKind::Point {
            self.invalidate_paths();
        }
        debug!(?change, "draw tool changed");
        change
    }

    /// Finish the active draw with `geometry` (map projection).
    ///
    /// The new feature gets a `{kind}_{now_ms}` id and an empty name, is
    /// auto-selected, and the tool returns to `Idle`.
    pub fn commit_draw(&mut self, geometry: Geometry, now_ms: i64) -> Result<String, EditorError> {
        let Tool::Drawing(draw) = self.tool else {
            return Err(EditorError::NotDrawing);
        };
        let kind = FeatureKind::from(draw);
        check_geometry(kind, &geometry)?;

        let id = generate_id(kind, now_ms, |candidate| self.id_taken(candidate));
        let feature = Feature {
            id: id.clone(),
            kind,
            geometry: normalize_geometry(geometry),
            name: String::new(),
        };
        self.collection_mut(kind).insert(feature);
        if kind == FeatureKind::Point {
            self.invalidate_paths();
        }
        self.tool = Tool::Idle;
        self.selected = Some(id.clone());
        debug!(feature_id = %id, kind = %kind, "feature drawn");
        Ok(id)
    }
}
