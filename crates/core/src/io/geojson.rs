//! GeoJSON boundary reader

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Boundary, Feature, FeatureCollection};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    id: Option<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

/// Read a GeoJSON `FeatureCollection` from disk.
///
/// Unreadable or malformed files are reported as [`Error::VectorOpen`].
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::vector_open(path, e))?;
    read_geojson_from_str(&text).map_err(|e| Error::vector_open(path, e))
}

/// Parse a GeoJSON `FeatureCollection` held in memory
pub fn read_geojson_from_str(text: &str) -> Result<FeatureCollection> {
    let raw: RawCollection =
        serde_json::from_str(text).map_err(|e| Error::Other(format!("invalid GeoJSON: {}", e)))?;

    if raw.kind != "FeatureCollection" {
        return Err(Error::Other(format!(
            "expected a FeatureCollection, found {}",
            raw.kind
        )));
    }

    let mut collection = FeatureCollection::new();
    for (index, feature) in raw.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => convert_geometry(g).map_err(|reason| {
                Error::Other(format!("feature {}: {}", index, reason))
            })?,
            None => None,
        };

        let properties = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, attribute_value(v)))
            .collect();

        collection.push(Feature {
            geometry,
            properties,
            id: feature.id.map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        });
    }

    Ok(collection)
}

/// Load boundaries keyed by `id_field`, validating every feature up front
pub fn read_boundaries<P: AsRef<Path>>(path: P, id_field: &str) -> Result<Vec<Boundary>> {
    let collection = read_geojson(path)?;
    Boundary::from_features(&collection, id_field)
}

fn attribute_value(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn coord(position: &[f64]) -> std::result::Result<Coord<f64>, String> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(format!("position needs at least 2 values, got {}", position.len())),
    }
}

fn ring(positions: &[Vec<f64>]) -> std::result::Result<LineString<f64>, String> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> std::result::Result<Polygon<f64>, String> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| "polygon without rings".to_string())?;
    let interiors = interiors
        .iter()
        .map(|r| ring(r))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(ring(exterior)?, interiors))
}

fn convert_geometry(raw: RawGeometry) -> std::result::Result<Option<Geometry<f64>>, String> {
    let geometry = match raw {
        RawGeometry::Point { coordinates } => Geometry::Point(Point::from(coord(&coordinates)?)),
        RawGeometry::LineString { coordinates } => Geometry::LineString(ring(&coordinates)?),
        RawGeometry::Polygon { coordinates } => Geometry::Polygon(polygon(&coordinates)?),
        RawGeometry::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
            coordinates
                .iter()
                .map(|p| polygon(p))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        )),
        RawGeometry::Unsupported => return Ok(None),
    };
    Ok(Some(geometry))
}
