//! Vector feature records.
//!
//! Features arrive as newline-delimited JSON, one record per line, with a
//! GeoJSON-style geometry and a flat tag map. Only the geometry kinds the
//! mapper can turn into shapes are accepted; anything else fails decode for
//! that tile rather than being silently dropped.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// A decoded feature: stable id, source tags, geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub geometry: Geometry,
}

/// Geometry subset understood by the feature mapper.
///
/// Coordinates are `[longitude, latitude]` pairs in degrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

/// Structural problems in a decoded geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("line string needs at least 2 points, got {0}")]
    ShortLine(usize),
    #[error("polygon ring needs at least 4 points, got {0}")]
    ShortRing(usize),
    #[error("polygon ring is not closed")]
    OpenRing,
    #[error("polygon has no rings")]
    NoRings,
}

impl Geometry {
    /// Validates the structural invariants serde cannot express.
    ///
    /// Line strings need two or more points. Polygon rings need four or
    /// more points with the first repeated as the last, and a polygon
    /// needs at least its exterior ring.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Geometry::Point { .. } => Ok(()),
            Geometry::LineString { coordinates } => validate_line(coordinates),
            Geometry::MultiLineString { coordinates } => {
                coordinates.iter().try_for_each(|line| validate_line(line))
            }
            Geometry::Polygon { coordinates } => validate_polygon(coordinates),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .try_for_each(|polygon| validate_polygon(polygon)),
        }
    }

    /// All line strings in this geometry, empty for points and polygons.
    pub fn lines(&self) -> Vec<&[[f64; 2]]> {
        match self {
            Geometry::LineString { coordinates } => vec![coordinates.as_slice()],
            Geometry::MultiLineString { coordinates } => {
                coordinates.iter().map(|line| line.as_slice()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// All polygon rings in this geometry, exterior and interior alike,
    /// empty for points and lines.
    pub fn rings(&self) -> Vec<&[[f64; 2]]> {
        match self {
            Geometry::Polygon { coordinates } => {
                coordinates.iter().map(|ring| ring.as_slice()).collect()
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flat_map(|polygon| polygon.iter().map(|ring| ring.as_slice()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn validate_line(line: &[[f64; 2]]) -> Result<(), GeometryError> {
    if line.len() < 2 {
        return Err(GeometryError::ShortLine(line.len()));
    }
    Ok(())
}

fn validate_polygon(rings: &[Vec<[f64; 2]>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::NoRings);
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(GeometryError::ShortRing(ring.len()));
        }
        if ring.first() != ring.last() {
            return Err(GeometryError::OpenRing);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_string_record() {
        let record: FeatureRecord = serde_json::from_str(
            r#"{"id": "way/42", "tags": {"highway": "residential"},
                "geometry": {"type": "LineString",
                             "coordinates": [[0.0, 0.0], [1.0, 1.0]]}}"#,
        )
        .unwrap();
        assert_eq!(record.id, "way/42");
        assert_eq!(record.tags["highway"], "residential");
        assert!(record.geometry.validate().is_ok());
        assert_eq!(record.geometry.lines().len(), 1);
    }

    #[test]
    fn test_tags_default_empty() {
        let record: FeatureRecord = serde_json::from_str(
            r#"{"id": "node/1",
                "geometry": {"type": "Point", "coordinates": [5.0, 6.0]}}"#,
        )
        .unwrap();
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_unknown_geometry_type_rejected() {
        let result: Result<FeatureRecord, _> = serde_json::from_str(
            r#"{"id": "x",
                "geometry": {"type": "GeometryCollection", "geometries": []}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_short_line_invalid() {
        let geometry = Geometry::LineString {
            coordinates: vec![[0.0, 0.0]],
        };
        assert_eq!(geometry.validate(), Err(GeometryError::ShortLine(1)));
    }

    #[test]
    fn test_open_ring_invalid() {
        let geometry = Geometry::Polygon {
            coordinates: vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]],
        };
        assert_eq!(geometry.validate(), Err(GeometryError::OpenRing));
    }

    #[test]
    fn test_multi_polygon_rings_flattened() {
        let square =
            |ox: f64| vec![[ox, 0.0], [ox + 1.0, 0.0], [ox + 1.0, 1.0], [ox, 1.0], [ox, 0.0]];
        let geometry = Geometry::MultiPolygon {
            coordinates: vec![vec![square(0.0)], vec![square(5.0), square(5.25)]],
        };
        assert!(geometry.validate().is_ok());
        assert_eq!(geometry.rings().len(), 3);
    }
}
