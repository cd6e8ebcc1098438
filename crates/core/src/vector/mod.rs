//! Vector features and administrative boundaries

use crate::error::{Error, Result};
use geo_types::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Ordered collection of features, in file order
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Polygonal geometries in file order; features without one are skipped
    pub fn polygons(&self) -> Vec<MultiPolygon<f64>> {
        self.iter()
            .filter_map(|feature| match &feature.geometry {
                Some(Geometry::Polygon(p)) => Some(MultiPolygon::new(vec![p.clone()])),
                Some(Geometry::MultiPolygon(mp)) => Some(mp.clone()),
                _ => None,
            })
            .collect()
    }
}

/// An administrative unit: polygon area plus the identifier it is reported under.
#[derive(Debug, Clone)]
pub struct Boundary {
    /// Position in the input file
    pub index: usize,
    /// Value of the identifier attribute (aggregation key)
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    pub fn new(index: usize, id: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            index,
            id: id.into(),
            geometry: geometry.into(),
        }
    }

    /// Convert features into boundaries keyed by `id_field`.
    ///
    /// Every feature must carry a non-null `id_field` and a polygonal
    /// geometry; the first one that does not fails the whole load.
    pub fn from_features(collection: &FeatureCollection, id_field: &str) -> Result<Vec<Boundary>> {
        collection
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let id = match feature.get_property(id_field) {
                    Some(AttributeValue::Null) | None => {
                        return Err(Error::MissingAttribute {
                            feature: index,
                            field: id_field.to_string(),
                        })
                    }
                    Some(value) => value.to_string(),
                };

                let geometry = match &feature.geometry {
                    Some(Geometry::Polygon(p)) => MultiPolygon::new(vec![p.clone()]),
                    Some(Geometry::MultiPolygon(mp)) => mp.clone(),
                    Some(other) => {
                        return Err(Error::UnsupportedGeometry {
                            feature: index,
                            kind: geometry_kind(other).to_string(),
                        })
                    }
                    None => {
                        return Err(Error::UnsupportedGeometry {
                            feature: index,
                            kind: "null".to_string(),
                        })
                    }
                };

                Ok(Boundary { index, id, geometry })
            })
            .collect()
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
