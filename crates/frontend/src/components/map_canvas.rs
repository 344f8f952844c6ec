use std::collections::HashSet;
use std::fmt::Write;

use bhuvan_shared::catalog::LayerKind;
use bhuvan_shared::editor::{DrawKind, LayerId, MapEditor, Notice, Tool};
use bhuvan_shared::editor::style::{LABEL_FILL, LABEL_FONT, LABEL_HALO, LABEL_HALO_WIDTH, LABEL_OFFSET_Y};
use bhuvan_shared::geojson::Geometry;
use bhuvan_shared::projection::Coord;
use dioxus::html::geometry::WheelDelta;
use dioxus::html::input_data::MouseButton;
use dioxus::prelude::*;

use crate::api;
use crate::tiles::{tile_url, wms_getmap_url, BaseLayer, Viewport};

const MAP_CONTAINER_ID: &str = "bhuvan-map-container";

/// Movement below this many pixels is a click.
const DRAG_THRESHOLD: f64 = 3.0;

/// Hit radius for selecting a point, in screen pixels.
const SELECT_TOLERANCE_PX: f64 = 10.0;

/// Zoom change per wheel notch.
const ZOOM_STEP: f64 = 0.5;

const DEFAULT_SIZE: (f64, f64) = (800.0, 600.0);

const OVERLAY_STROKE: &str = "#3388ff";
const OVERLAY_FILL: &str = "rgba(51, 136, 255, 0.2)";
const DRAFT_STROKE: &str = "#e64a19";

// ---------------------------------------------------------------------------
// DOM helpers
// ---------------------------------------------------------------------------

fn container_rect() -> Option<web_sys::DomRect> {
    let document = web_sys::window()?.document()?;
    let element = document.get_element_by_id(MAP_CONTAINER_ID)?;
    Some(element.get_bounding_client_rect())
}

/// The live viewport for `editor`, sized to the map container.
fn viewport(editor: &MapEditor) -> Viewport {
    let (w, h) = container_rect()
        .map(|r| (r.width(), r.height()))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
        .unwrap_or(DEFAULT_SIZE);
    Viewport::from_view(editor.view(), w, h)
}

/// Client coordinates relative to the map container.
fn local_point(client_x: f64, client_y: f64) -> Option<(f64, f64)> {
    let rect = container_rect()?;
    Some((client_x - rect.left(), client_y - rect.top()))
}

fn wheel_delta_y(delta: WheelDelta) -> f64 {
    match delta {
        WheelDelta::Pixels(d) => d.y,
        WheelDelta::Lines(d) => d.y * 40.0,
        WheelDelta::Pages(d) => d.y * 400.0,
    }
}

fn now_ms() -> i64 {
    js_sys::Date::now() as i64
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

fn translated(geometry: &Geometry, dx: f64, dy: f64) -> Geometry {
    geometry.map_coords(|c| Coord::new(c.x + dx, c.y + dy))
}

/// Anchor for a label: the point itself, or the mean of the outer ring.
fn label_anchor(geometry: &Geometry) -> Option<Coord> {
    let coords = match geometry {
        Geometry::Point(c) => return Some(*c),
        Geometry::Polygon(rings) => rings.first()?.clone(),
        Geometry::MultiPolygon(polys) => polys.first()?.first()?.clone(),
        other => other.coords(),
    };
    if coords.is_empty() {
        return None;
    }
    let n = coords.len() as f64;
    let (sx, sy) = coords.iter().fold((0.0, 0.0), |(x, y), c| (x + c.x, y + c.y));
    Some(Coord::new(sx / n, sy / n))
}

/// Append `c` to a polygon draft unless it repeats the last vertex.
fn push_vertex(draft: &mut Vec<Coord>, c: Coord, min_distance: f64) {
    if draft.last().is_some_and(|last| last.distance(&c) <= min_distance) {
        return;
    }
    draft.push(c);
}

// ---------------------------------------------------------------------------
// SVG builder
// ---------------------------------------------------------------------------

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn ring_data(out: &mut String, ring: &[Coord], vp: &Viewport, close: bool) {
    for (i, c) in ring.iter().enumerate() {
        let (x, y) = vp.map_to_screen(*c);
        let cmd = if i == 0 { 'M' } else { 'L' };
        let _ = write!(out, "{cmd}{x:.1} {y:.1} ");
    }
    if close && !ring.is_empty() {
        out.push('Z');
    }
}

/// SVG path data for the line and area parts of `geometry`.
fn path_data(geometry: &Geometry, vp: &Viewport) -> String {
    let mut d = String::new();
    match geometry {
        Geometry::LineString(line) => ring_data(&mut d, line, vp, false),
        Geometry::MultiLineString(lines) => {
            for line in lines {
                ring_data(&mut d, line, vp, false);
            }
        }
        Geometry::Polygon(rings) => {
            for ring in rings {
                ring_data(&mut d, ring, vp, true);
            }
        }
        Geometry::MultiPolygon(polys) => {
            for ring in polys.iter().flatten() {
                ring_data(&mut d, ring, vp, true);
            }
        }
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
    }
    d.trim_end().to_string()
}

fn build_label(svg: &mut String, text: &str, x: f64, y: f64) {
    let text = escape_xml(text);
    let _ = write!(
        svg,
        r#"<text x="{x:.1}" y="{y:.1}" fill="{LABEL_FILL}" stroke="{LABEL_HALO}" stroke-width="{LABEL_HALO_WIDTH}" paint-order="stroke" text-anchor="middle" style="font: {LABEL_FONT}">{text}</text>"#
    );
}

fn build_overlays(svg: &mut String, editor: &MapEditor, vp: &Viewport) {
    for layer in editor.layers().of_kind(LayerKind::ExternalGeoJson) {
        for geometry in layer.features.iter().filter_map(|f| f.geometry.as_ref()) {
            match geometry {
                Geometry::Point(c) => {
                    let (x, y) = vp.map_to_screen(*c);
                    let _ = write!(
                        svg,
                        r#"<circle cx="{x:.1}" cy="{y:.1}" r="5" fill="{OVERLAY_FILL}" stroke="{OVERLAY_STROKE}" stroke-width="2"/>"#
                    );
                }
                Geometry::MultiPoint(ps) => {
                    for c in ps {
                        let (x, y) = vp.map_to_screen(*c);
                        let _ = write!(
                            svg,
                            r#"<circle cx="{x:.1}" cy="{y:.1}" r="5" fill="{OVERLAY_FILL}" stroke="{OVERLAY_STROKE}" stroke-width="2"/>"#
                        );
                    }
                }
                other => {
                    let fill = match other {
                        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => OVERLAY_FILL,
                        _ => "none",
                    };
                    let d = path_data(other, vp);
                    let _ = write!(
                        svg,
                        r#"<path d="{d}" fill="{fill}" fill-rule="evenodd" stroke="{OVERLAY_STROKE}" stroke-width="2"/>"#
                    );
                }
            }
        }
    }
}

/// Everything drawn above the raster layers: GeoJSON overlays, the editor's
/// annotations, and the polygon being drawn.
///
/// `drag` offsets the selected feature by a map-unit delta while it is being
/// moved; the editor itself is only updated when the drag ends.
fn build_svg_content(
    editor: &MapEditor,
    vp: &Viewport,
    draft: &[Coord],
    drag: Option<(f64, f64)>,
) -> String {
    let mut svg = String::with_capacity(4096);
    build_overlays(&mut svg, editor, vp);

    for feature in editor.features() {
        let style = editor.style_of(feature);
        let geometry = match drag {
            Some((dx, dy)) if style.selected => translated(&feature.geometry, dx, dy),
            _ => feature.geometry.clone(),
        };
        let stroke = style.stroke_color;
        let width = style.stroke_width;
        match (&geometry, style.marker_radius) {
            (Geometry::Point(c), Some(r)) => {
                let (x, y) = vp.map_to_screen(*c);
                let fill = style.fill_color.unwrap_or("none");
                let _ = write!(
                    svg,
                    r#"<circle cx="{x:.1}" cy="{y:.1}" r="{r}" fill="{fill}" stroke="{stroke}" stroke-width="{width}"/>"#
                );
            }
            _ => {
                let d = path_data(&geometry, vp);
                let fill = style.fill_color.unwrap_or("none");
                let _ = write!(
                    svg,
                    r#"<path d="{d}" fill="{fill}" fill-rule="evenodd" stroke="{stroke}" stroke-width="{width}" stroke-linejoin="round"/>"#
                );
            }
        }
        if let (Some(label), Some(anchor)) = (style.label.as_deref(), label_anchor(&geometry)) {
            let (x, y) = vp.map_to_screen(anchor);
            build_label(&mut svg, label, x, y + LABEL_OFFSET_Y);
        }
    }

    if !draft.is_empty() {
        let mut d = String::new();
        ring_data(&mut d, draft, vp, false);
        let _ = write!(
            svg,
            r#"<path d="{}" fill="none" stroke="{DRAFT_STROKE}" stroke-width="2" stroke-dasharray="6 4"/>"#,
            d.trim_end()
        );
        for c in draft {
            let (x, y) = vp.map_to_screen(*c);
            let _ = write!(
                svg,
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="4" fill="{DRAFT_STROKE}"/>"#
            );
        }
    }
    svg
}

// ---------------------------------------------------------------------------
// Remote layer loading
// ---------------------------------------------------------------------------

/// Fetch the body of GeoJSON layer `id` and hand it to the editor.
pub fn fetch_geojson_layer(mut editor: Signal<MapEditor>, id: LayerId, url: String) {
    spawn(async move {
        let body = api::fetch_geojson(&url).await;
        editor.write().complete_geojson_fetch(id, body);
    });
}

/// Fetch one tile of a vector-tile layer; a failure tears the layer down.
fn check_vector_tile(mut editor: Signal<MapEditor>, id: LayerId, url: String) {
    spawn(async move {
        if let Err(e) = api::check_tile(&url).await {
            tracing::warn!(%id, error = %e, "vector tile check failed");
            editor.write().report_layer_failure(id);
        }
    });
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[component]
pub fn MapCanvas(mut editor: Signal<MapEditor>) -> Element {
    // Bumped once mounted so the first real container size is used.
    let mut mounted = use_signal(|| false);

    let mut draft = use_signal(Vec::<Coord>::new);

    let mut is_dragging = use_signal(|| false);
    let mut did_drag = use_signal(|| false);
    let mut drag_start = use_signal(|| (0.0_f64, 0.0_f64));
    let mut drag_start_view = use_signal(|| None::<Viewport>);
    let mut moving_selected = use_signal(|| false);
    let mut drag_offset = use_signal(|| None::<(f64, f64)>);

    let mut checked = use_signal(HashSet::<(LayerId, (u32, u32, u32))>::new);
    let mut base = use_signal(BaseLayer::default);

    // Drop a half-drawn polygon when the tool changes.
    use_effect(move || {
        if editor.read().tool() != Tool::Drawing(DrawKind::Polygon) {
            draft.write().clear();
        }
    });

    // One check per vector-tile layer and center tile.
    use_effect(move || {
        let _ = mounted.read();
        let ed = editor.read();
        let vp = viewport(&ed);
        let (z, x, y) = vp.center_tile();
        let targets: Vec<(LayerId, String)> = ed
            .layers()
            .of_kind(LayerKind::VectorTile)
            .filter(|l| !checked.peek().contains(&(l.id, (z, x, y))))
            .map(|l| (l.id, tile_url(&l.layer.url, z, x, y)))
            .collect();
        drop(ed);
        for (id, url) in targets {
            checked.write().insert((id, (z, x, y)));
            check_vector_tile(editor, id, url);
        }
    });

    let _ = mounted.read();
    let ed = editor.read();
    let vp = viewport(&ed);
    let tiles = vp.visible_tiles();
    let wms: Vec<(LayerId, String)> = ed
        .layers()
        .of_kind(LayerKind::Wms)
        .filter_map(|l| {
            let name = l.layer.layer_name.as_deref()?;
            Some((l.id, wms_getmap_url(&l.layer.url, name, &vp)?))
        })
        .collect();
    let svg_content = build_svg_content(&ed, &vp, &draft.read(), *drag_offset.read());
    let svg_html = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" style="position:absolute;top:0;left:0;pointer-events:none;">{svg_content}</svg>"#,
        w = vp.width,
        h = vp.height,
    );

    let container_class = match (ed.tool(), *is_dragging.read() && *did_drag.read()) {
        (_, true) => "map-canvas dragging",
        (Tool::Drawing(_), _) => "map-canvas drawing",
        (Tool::Idle, _) => "map-canvas",
    };
    let drawing_polygon = ed.tool() == Tool::Drawing(DrawKind::Polygon);
    drop(ed);

    rsx! {
        div {
            id: MAP_CONTAINER_ID,
            class: "{container_class}",

            onmounted: move |_| mounted.set(true),

            onwheel: move |evt: Event<WheelData>| {
                evt.prevent_default();
                let delta_y = wheel_delta_y(evt.data().delta());
                let client = evt.data().client_coordinates();
                let Some((sx, sy)) = local_point(client.x, client.y) else { return };
                let vp = viewport(&editor.read());
                let step = if delta_y < 0.0 { ZOOM_STEP } else { -ZOOM_STEP };
                let zoomed = vp.zoomed_at(sx, sy, vp.zoom + step);
                if (zoomed.zoom - vp.zoom).abs() < 1e-9 {
                    return;
                }
                editor.write().set_view(zoomed.to_view());
            },

            onmousedown: move |evt: Event<MouseData>| {
                if evt.trigger_button() != Some(MouseButton::Primary) {
                    return;
                }
                let client = evt.client_coordinates();
                let ed = editor.read();
                let vp = viewport(&ed);
                // Pressing on the selected feature moves it instead of the map.
                let on_selected = local_point(client.x, client.y).is_some_and(|(sx, sy)| {
                    let at = vp.screen_to_map(sx, sy);
                    ed.selection_enabled()
                        && ed
                            .selectable_at(at, SELECT_TOLERANCE_PX * vp.resolution())
                            .is_some_and(|f| Some(f.id.as_str()) == ed.selected_id())
                });
                drop(ed);
                is_dragging.set(true);
                did_drag.set(false);
                drag_start.set((client.x, client.y));
                drag_start_view.set(Some(vp));
                moving_selected.set(on_selected);
                drag_offset.set(None);
            },

            onmousemove: move |evt: Event<MouseData>| {
                if !*is_dragging.read() {
                    return;
                }
                let client = evt.client_coordinates();
                let (x0, y0) = *drag_start.read();
                let (dx, dy) = (client.x - x0, client.y - y0);
                if !*did_drag.read() && (dx.abs() > DRAG_THRESHOLD || dy.abs() > DRAG_THRESHOLD) {
                    did_drag.set(true);
                }
                if !*did_drag.read() {
                    return;
                }
                let Some(start_vp) = *drag_start_view.read() else { return };
                if *moving_selected.read() {
                    let res = start_vp.resolution();
                    drag_offset.set(Some((dx * res, -dy * res)));
                } else {
                    editor.write().set_view(start_vp.panned(dx, dy).to_view());
                }
            },

            onmouseup: move |evt: Event<MouseData>| {
                let was_dragging = *is_dragging.read();
                let was_drag = *did_drag.read();
                is_dragging.set(false);

                if let Some((dx, dy)) = drag_offset.take() {
                    let moved = editor
                        .read()
                        .selected_feature()
                        .map(|f| translated(&f.geometry, dx, dy));
                    if let Some(geometry) = moved {
                        let mut ed = editor.write();
                        if let Err(e) = ed.reshape_selected(geometry) {
                            ed.notify(Notice::warning(e.to_string()));
                        }
                    }
                    return;
                }
                if !was_dragging || was_drag {
                    return;
                }

                let client = evt.client_coordinates();
                let Some((sx, sy)) = local_point(client.x, client.y) else { return };
                let vp = viewport(&editor.read());
                let at = vp.screen_to_map(sx, sy);
                let tool = editor.read().tool();
                match tool {
                    Tool::Drawing(DrawKind::Point) => {
                        let mut ed = editor.write();
                        if let Err(e) = ed.commit_draw(Geometry::Point(at), now_ms()) {
                            ed.notify(Notice::warning(e.to_string()));
                        }
                    }
                    Tool::Drawing(DrawKind::Polygon) => {
                        push_vertex(&mut draft.write(), at, DRAG_THRESHOLD * vp.resolution());
                    }
                    Tool::Idle => {
                        let _ = editor.write().select_at(at, SELECT_TOLERANCE_PX * vp.resolution());
                    }
                }
            },

            onmouseleave: move |_| {
                is_dragging.set(false);
                drag_offset.set(None);
            },

            ondoubleclick: move |evt: Event<MouseData>| {
                evt.prevent_default();
                if !drawing_polygon {
                    return;
                }
                let ring = draft.take();
                let mut ed = editor.write();
                if let Err(e) = ed.commit_draw(Geometry::Polygon(vec![ring]), now_ms()) {
                    ed.notify(Notice::warning(e.to_string()));
                }
            },

            div { class: "map-tiles",
                for t in tiles {
                    img {
                        key: "{t.z}/{t.x}/{t.y}",
                        src: tile_url(base().template(), t.z, t.x, t.y),
                        draggable: "false",
                        style: "left:{t.left}px;top:{t.top}px;width:{t.size}px;height:{t.size}px;",
                    }
                }
            }

            for (id, src) in wms {
                img {
                    key: "{id}",
                    class: "map-overlay",
                    src: "{src}",
                    draggable: "false",
                    onerror: move |_| {
                        editor.write().report_layer_failure(id);
                    },
                }
            }

            div {
                class: "map-annotations",
                dangerous_inner_html: "{svg_html}",
            }

            if drawing_polygon {
                div { class: "map-hint", "Click to add vertices, double-click to finish." }
            }

            div {
                class: "base-switch",
                onmousedown: move |evt: Event<MouseData>| evt.stop_propagation(),
                onmouseup: move |evt: Event<MouseData>| evt.stop_propagation(),
                ondoubleclick: move |evt: Event<MouseData>| evt.stop_propagation(),
                onwheel: move |evt: Event<WheelData>| evt.stop_propagation(),
                for layer in BaseLayer::ALL {
                    button {
                        key: "{layer.label()}",
                        class: if base() == layer { "active" } else { "" },
                        onclick: move |_| base.set(layer),
                        "{layer.label()}"
                    }
                }
            }
        }
    }
}
