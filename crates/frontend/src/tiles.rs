//! Screen <-> map-projection math for the canvas, XYZ tile layout for the base
//! map and GetMap URLs for WMS overlays.

use bhuvan_shared::models::ViewState;
use bhuvan_shared::projection::{to_lon_lat, to_map, Coord, LonLat, HALF_WORLD_M};

pub const TILE_SIZE: f64 = 256.0;
pub const ZOOM_MIN: f64 = 2.0;
pub const ZOOM_MAX: f64 = 19.0;

pub const STREET_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const SATELLITE_TILE_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// Base map drawn under every overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseLayer {
    #[default]
    Street,
    Satellite,
}

impl BaseLayer {
    pub const ALL: [BaseLayer; 2] = [BaseLayer::Street, BaseLayer::Satellite];

    pub fn template(self) -> &'static str {
        match self {
            BaseLayer::Street => STREET_TILE_URL,
            BaseLayer::Satellite => SATELLITE_TILE_URL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BaseLayer::Street => "Street",
            BaseLayer::Satellite => "Satellite",
        }
    }
}

/// Map units (metres) per screen pixel at `zoom`.
pub fn resolution(zoom: f64) -> f64 {
    2.0 * HALF_WORLD_M / (TILE_SIZE * 2f64.powf(zoom))
}

/// The visible part of the map: a center in map projection, a zoom level and
/// the size of the canvas in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coord,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileView {
    pub z: u32,
    pub x: u32,
    pub y: u32,
    pub left: f64,
    pub top: f64,
    pub size: f64,
}

impl Viewport {
    pub fn from_view(view: ViewState, width: f64, height: f64) -> Self {
        Viewport {
            center: to_map(LonLat::new(view.center[0], view.center[1])),
            zoom: view.zoom.clamp(ZOOM_MIN, ZOOM_MAX),
            width,
            height,
        }
    }

    pub fn to_view(&self) -> ViewState {
        let c = to_lon_lat(self.center);
        ViewState {
            center: [c.lon, c.lat],
            zoom: self.zoom,
        }
    }

    pub fn resolution(&self) -> f64 {
        resolution(self.zoom)
    }

    pub fn screen_to_map(&self, sx: f64, sy: f64) -> Coord {
        let res = self.resolution();
        Coord::new(
            self.center.x + (sx - self.width / 2.0) * res,
            self.center.y - (sy - self.height / 2.0) * res,
        )
    }

    pub fn map_to_screen(&self, c: Coord) -> (f64, f64) {
        let res = self.resolution();
        (
            (c.x - self.center.x) / res + self.width / 2.0,
            (self.center.y - c.y) / res + self.height / 2.0,
        )
    }

    /// `[min_x, min_y, max_x, max_y]` in map projection.
    pub fn bbox(&self) -> [f64; 4] {
        let min = self.screen_to_map(0.0, self.height);
        let max = self.screen_to_map(self.width, 0.0);
        [min.x, min.y, max.x, max.y]
    }

    /// Move the view by a screen-pixel drag.
    pub fn panned(&self, dx: f64, dy: f64) -> Viewport {
        let res = self.resolution();
        let y_limit = HALF_WORLD_M;
        Viewport {
            center: Coord::new(
                self.center.x - dx * res,
                (self.center.y + dy * res).clamp(-y_limit, y_limit),
            ),
            ..*self
        }
    }

    /// Zoom to `zoom`, keeping the map point under `(sx, sy)` fixed.
    pub fn zoomed_at(&self, sx: f64, sy: f64, zoom: f64) -> Viewport {
        let anchor = self.screen_to_map(sx, sy);
        let zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        let res = resolution(zoom);
        Viewport {
            center: Coord::new(
                anchor.x - (sx - self.width / 2.0) * res,
                anchor.y + (sy - self.height / 2.0) * res,
            ),
            zoom,
            ..*self
        }
    }

    /// Base-map tiles covering the viewport, with their screen placement.
    pub fn visible_tiles(&self) -> Vec<TileView> {
        let z = self.zoom.round().clamp(0.0, ZOOM_MAX) as u32;
        let count = 1u32 << z;
        let span = 2.0 * HALF_WORLD_M / count as f64;
        let [min_x, min_y, max_x, max_y] = self.bbox();

        let col = |x: f64| ((x + HALF_WORLD_M) / span).floor().clamp(0.0, (count - 1) as f64) as u32;
        let row = |y: f64| ((HALF_WORLD_M - y) / span).floor().clamp(0.0, (count - 1) as f64) as u32;

        let size = span / self.resolution();
        let mut tiles = Vec::new();
        for y in row(max_y)..=row(min_y) {
            for x in col(min_x)..=col(max_x) {
                let origin = Coord::new(-HALF_WORLD_M + x as f64 * span, HALF_WORLD_M - y as f64 * span);
                let (left, top) = self.map_to_screen(origin);
                tiles.push(TileView {
                    z,
                    x,
                    y,
                    left,
                    top,
                    size,
                });
            }
        }
        tiles
    }

    /// The tile under the viewport center at the nearest integer zoom.
    pub fn center_tile(&self) -> (u32, u32, u32) {
        let z = self.zoom.round().clamp(0.0, ZOOM_MAX) as u32;
        let count = 1u32 << z;
        let span = 2.0 * HALF_WORLD_M / count as f64;
        let max = (count - 1) as f64;
        let x = ((self.center.x + HALF_WORLD_M) / span).floor().clamp(0.0, max) as u32;
        let y = ((HALF_WORLD_M - self.center.y) / span).floor().clamp(0.0, max) as u32;
        (z, x, y)
    }
}

pub fn tile_url(template: &str, z: u32, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

/// A WMS 1.1.1 GetMap request covering `viewport`.
pub fn wms_getmap_url(base: &str, layer_name: &str, viewport: &Viewport) -> Option<String> {
    let [a, b, c, d] = viewport.bbox();
    let bbox = format!("{a},{b},{c},{d}");
    let width = (viewport.width.round() as u32).to_string();
    let height = (viewport.height.round() as u32).to_string();
    reqwest::Url::parse_with_params(
        base,
        &[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetMap"),
            ("LAYERS", layer_name),
            ("STYLES", ""),
            ("FORMAT", "image/png"),
            ("TRANSPARENT", "true"),
            ("SRS", "EPSG:3857"),
            ("BBOX", bbox.as_str()),
            ("WIDTH", width.as_str()),
            ("HEIGHT", height.as_str()),
        ],
    )
    .ok()
    .map(String::from)
}
