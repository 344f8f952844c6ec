//! Rendering style derived from a feature and the current selection.
//!
//! Styles are computed on every render instead of being cached on the feature,
//! so a rename or a selection change shows up without any invalidation step.

use super::feature::{Feature, FeatureKind};

pub const POINT_FILL: &str = "#ffcc33";
pub const POINT_OUTLINE: &str = "#ffffff";
pub const POLYGON_STROKE: &str = "#e64a19";
pub const POLYGON_FILL: &str = "rgba(230, 74, 25, 0.4)";
pub const PATH_STROKE: &str = "#0000ff";
pub const SELECTED_COLOR: &str = "#3399CC";
pub const SELECTED_FILL: &str = "rgba(51, 153, 204, 0.4)";

pub const LABEL_FONT: &str = "bold 12px Calibri, sans-serif";
pub const LABEL_FILL: &str = "#000000";
pub const LABEL_HALO: &str = "#ffffff";
pub const LABEL_HALO_WIDTH: f64 = 4.0;
/// Labels sit above the anchor, in screen pixels.
pub const LABEL_OFFSET_Y: f64 = -20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStyle {
    pub stroke_color: &'static str,
    pub stroke_width: f64,
    pub fill_color: Option<&'static str>,
    /// Circle radius for point markers.
    pub marker_radius: Option<f64>,
    pub label: Option<String>,
    pub selected: bool,
}

/// Style for `feature` given the currently selected feature id.
pub fn feature_style(feature: &Feature, selected_id: Option<&str>) -> FeatureStyle {
    let selected = feature.kind != FeatureKind::Path && selected_id == Some(feature.id.as_str());
    let label = (!feature.name.is_empty()).then(|| feature.name.clone());
    match feature.kind {
        FeatureKind::Point => FeatureStyle {
            stroke_color: POINT_OUTLINE,
            stroke_width: 2.0,
            fill_color: Some(if selected { SELECTED_COLOR } else { POINT_FILL }),
            marker_radius: Some(if selected { 9.0 } else { 7.0 }),
            label,
            selected,
        },
        FeatureKind::Polygon => FeatureStyle {
            stroke_color: if selected { SELECTED_COLOR } else { POLYGON_STROKE },
            stroke_width: if selected { 5.0 } else { 3.0 },
            fill_color: Some(if selected { SELECTED_FILL } else { POLYGON_FILL }),
            marker_radius: None,
            label,
            selected,
        },
        FeatureKind::Path => FeatureStyle {
            stroke_color: PATH_STROKE,
            stroke_width: 4.0,
            fill_color: None,
            marker_radius: None,
            label: None,
            selected: false,
        },
    }
}
