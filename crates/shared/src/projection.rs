//! Spherical Web Mercator (EPSG:3857) <-> geographic (EPSG:4326).
//!
//! The editor keeps feature geometry in map projection, the same space the map
//! canvas renders in. Everything that leaves the editor (persisted state, routing
//! requests, exports) is geographic.

use geo::EuclideanDistance;
use serde::{Deserialize, Serialize};

use crate::geojson::Geometry;

// WGS84 semi-major axis in meters
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

// Latitude at which the projected map becomes square
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

// Half the width of the projected world in meters (~20037508.34)
pub const HALF_WORLD_M: f64 = std::f64::consts::PI * EARTH_RADIUS_M;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        LonLat { lon, lat }
    }
}

/// A position in map projection (or, inside GeoJSON documents, any `[x, y]` pair).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Coord { x, y }
    }

    /// Euclidean distance in the coordinate's own units.
    pub fn distance(&self, other: &Coord) -> f64 {
        geo::Point::from(*self).euclidean_distance(&geo::Point::from(*other))
    }
}

impl From<Coord> for geo::Coord<f64> {
    fn from(c: Coord) -> Self {
        geo::Coord { x: c.x, y: c.y }
    }
}

impl From<Coord> for geo::Point<f64> {
    fn from(c: Coord) -> Self {
        geo::Point::new(c.x, c.y)
    }
}

/// Project a geographic position into Web Mercator meters.
pub fn to_map(pos: LonLat) -> Coord {
    let lat = pos.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS_M * pos.lon.to_radians();
    let y = EARTH_RADIUS_M
        * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
            .tan()
            .ln();
    Coord { x, y }
}

/// Inverse of [`to_map`].
pub fn to_lon_lat(coord: Coord) -> LonLat {
    let lon = (coord.x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (coord.y / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    LonLat { lon, lat }
}

/// `[x, y]` pair as a geographic position, for GeoJSON documents that are
/// already in EPSG:4326.
pub fn coord_as_lon_lat(coord: Coord) -> LonLat {
    LonLat {
        lon: coord.x,
        lat: coord.y,
    }
}

pub fn lon_lat_as_coord(pos: LonLat) -> Coord {
    Coord {
        x: pos.lon,
        y: pos.lat,
    }
}

/// Reproject a GeoJSON geometry from geographic degrees into map projection.
pub fn geometry_to_map(geometry: &Geometry) -> Geometry {
    geometry.map_coords(|c| to_map(coord_as_lon_lat(c)))
}

/// Reproject a map-projection geometry back to geographic degrees.
pub fn geometry_to_lon_lat(geometry: &Geometry) -> Geometry {
    geometry.map_coords(|c| lon_lat_as_coord(to_lon_lat(c)))
}
