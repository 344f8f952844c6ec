//! Minimal GeoJSON (RFC 7946) document model.
//!
//! Covers what the map editor reads and writes: the six simple geometry types,
//! features with free-form properties, and feature collections. Positions with
//! an altitude component are accepted and the altitude is dropped.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::projection::Coord;

#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("missing \"type\" member")]
    MissingType,
    #[error("unsupported GeoJSON type: {0}")]
    UnsupportedType(String),
    #[error("malformed GeoJSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.x)?;
        tup.serialize_element(&self.y)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl<'de> Visitor<'de> for PositionVisitor {
            type Value = Coord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a position array with at least two numbers")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Coord, A::Error> {
                let x: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let y: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                // Altitude and any further members are ignored
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}
                Ok(Coord { x, y })
            }
        }

        deserializer.deserialize_seq(PositionVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
}

impl Geometry {
    /// The GeoJSON `type` member for this geometry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Apply `f` to every position, preserving structure.
    pub fn map_coords(&self, f: impl Fn(Coord) -> Coord) -> Geometry {
        let line = |ps: &Vec<Coord>| ps.iter().map(|c| f(*c)).collect::<Vec<_>>();
        match self {
            Geometry::Point(c) => Geometry::Point(f(*c)),
            Geometry::MultiPoint(ps) => Geometry::MultiPoint(line(ps)),
            Geometry::LineString(ps) => Geometry::LineString(line(ps)),
            Geometry::MultiLineString(ls) => {
                Geometry::MultiLineString(ls.iter().map(&line).collect())
            }
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(&line).collect()),
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys
                    .iter()
                    .map(|rings| rings.iter().map(&line).collect())
                    .collect(),
            ),
        }
    }

    /// Every position in document order.
    pub fn coords(&self) -> Vec<Coord> {
        match self {
            Geometry::Point(c) => vec![*c],
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.clone(),
            Geometry::MultiLineString(ls) | Geometry::Polygon(ls) => {
                ls.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().copied().collect(),
        }
    }
}

fn line_string(positions: &[Coord]) -> geo::LineString<f64> {
    positions.iter().map(|c| geo::Coord::from(*c)).collect()
}

// First ring is the exterior, the rest are holes.
fn polygon(rings: &[Vec<Coord>]) -> geo::Polygon<f64> {
    match rings.split_first() {
        Some((exterior, holes)) => geo::Polygon::new(
            line_string(exterior),
            holes.iter().map(|h| line_string(h)).collect(),
        ),
        None => geo::Polygon::new(geo::LineString::new(Vec::new()), Vec::new()),
    }
}

impl From<&Geometry> for geo::Geometry<f64> {
    fn from(g: &Geometry) -> Self {
        match g {
            Geometry::Point(c) => geo::Geometry::Point((*c).into()),
            Geometry::MultiPoint(ps) => {
                geo::Geometry::MultiPoint(ps.iter().map(|c| geo::Point::from(*c)).collect())
            }
            Geometry::LineString(ps) => geo::Geometry::LineString(line_string(ps)),
            Geometry::MultiLineString(ls) => geo::Geometry::MultiLineString(geo::MultiLineString::new(
                ls.iter().map(|l| line_string(l)).collect(),
            )),
            Geometry::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)),
            Geometry::MultiPolygon(polys) => geo::Geometry::MultiPolygon(geo::MultiPolygon::new(
                polys.iter().map(|rings| polygon(rings)).collect(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Feature {
            id: None,
            geometry: Some(geometry),
            properties: None,
        }
    }

    /// Feature id rendered as a string; numeric ids are stringified.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.as_ref()?.get(key)?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Any top-level GeoJSON document, normalized to a list of features.
pub struct GeoJson;

impl GeoJson {
    /// Parse a FeatureCollection, a single Feature, or a bare Geometry.
    pub fn from_value(value: Value) -> Result<Vec<Feature>, GeoJsonError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(GeoJsonError::MissingType)?
            .to_string();
        match kind.as_str() {
            "FeatureCollection" => {
                let fc: FeatureCollection = serde_json::from_value(value)?;
                Ok(fc.features)
            }
            "Feature" => Ok(vec![serde_json::from_value(value)?]),
            "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon"
            | "MultiPolygon" => {
                let geometry: Geometry = serde_json::from_value(value)?;
                Ok(vec![Feature::new(geometry)])
            }
            other => Err(GeoJsonError::UnsupportedType(other.to_string())),
        }
    }
}
