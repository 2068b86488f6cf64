//! Tag-driven mapping from feature records to drawable shapes.
//!
//! The mapping table is part of generator configuration: an ordered list
//! of rules, each a tag predicate plus a shape template. The first rule
//! whose predicate matches claims the feature. Rules whose shape does not
//! fit the feature's geometry (a polygon template against a line, say)
//! skip the feature rather than failing the tile.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::{DrawRule, ProjectedPolygon, Segment, ShapeKind, VectorShape};
use crate::bvh::Bvh;
use crate::feature::FeatureRecord;
use crate::projection::GeographicProjection;

/// Predicate over a feature's tag map.
///
/// Matches when the key is present and, if `value` is given, maps to that
/// exact value.
#[derive(Debug, Clone, Deserialize)]
pub struct TagMatch {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl TagMatch {
    fn matches(&self, record: &FeatureRecord) -> bool {
        match record.tags.get(&self.key) {
            Some(actual) => self.value.as_ref().is_none_or(|wanted| wanted == actual),
            None => false,
        }
    }
}

/// Shape template a matched feature is instantiated into.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapeSpec {
    LineNarrow {
        draw: Vec<DrawRule>,
        #[serde(default)]
        layer: f64,
    },
    LineWide {
        draw: Vec<DrawRule>,
        #[serde(default)]
        layer: f64,
        radius: f64,
    },
    PolygonFill {
        draw: Vec<DrawRule>,
        #[serde(default)]
        layer: f64,
    },
    PolygonDistance {
        draw: Vec<DrawRule>,
        #[serde(default)]
        layer: f64,
        max_dist: u32,
    },
}

/// One entry of the mapping table.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingRule {
    #[serde(rename = "match")]
    pub tag: TagMatch,
    #[serde(flatten)]
    pub shape: ShapeSpec,
}

/// Ordered mapping table applied to every decoded feature.
#[derive(Debug, Clone)]
pub struct FeatureMapper {
    rules: Vec<MappingRule>,
}

impl FeatureMapper {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    /// Maps one record into a shape, projecting its coordinates to local
    /// space.
    ///
    /// Returns `None` when no rule matches, the matched shape does not fit
    /// the geometry, or any coordinate falls outside the projection
    /// domain. All three mean "this feature is not drawn here", never an
    /// error.
    pub fn map(
        &self,
        record: &FeatureRecord,
        projection: &dyn GeographicProjection,
    ) -> Option<VectorShape> {
        let rule = self.rules.iter().find(|rule| rule.tag.matches(record))?;

        let (draw, layer, kind) = match &rule.shape {
            ShapeSpec::LineNarrow { draw, layer } => {
                let segments = project_lines(record, projection)?;
                (draw, *layer, ShapeKind::NarrowLine { segments })
            }
            ShapeSpec::LineWide { draw, layer, radius } => {
                let segments = project_lines(record, projection)?;
                (draw, *layer, ShapeKind::WideLine { segments, radius: *radius })
            }
            ShapeSpec::PolygonFill { draw, layer } => {
                let polygon = project_rings(record, projection)?;
                (draw, *layer, ShapeKind::FillPolygon { polygon })
            }
            ShapeSpec::PolygonDistance { draw, layer, max_dist } => {
                let polygon = project_rings(record, projection)?;
                (draw, *layer, ShapeKind::DistancePolygon { polygon, max_dist: *max_dist })
            }
        };

        Some(VectorShape::new(
            Arc::from(record.id.as_str()),
            layer,
            draw.clone(),
            kind,
        ))
    }
}

fn project_lines(
    record: &FeatureRecord,
    projection: &dyn GeographicProjection,
) -> Option<Bvh<Segment>> {
    let lines = record.geometry.lines();
    if lines.is_empty() {
        debug!(feature = %record.id, "line shape rule matched non-line geometry, skipping");
        return None;
    }

    let mut segments = Vec::new();
    for line in lines {
        let points = project_points(record, line, projection)?;
        for pair in points.windows(2) {
            segments.push(Segment::new(pair[0].0, pair[0].1, pair[1].0, pair[1].1));
        }
    }
    Some(Bvh::build(segments))
}

fn project_rings(
    record: &FeatureRecord,
    projection: &dyn GeographicProjection,
) -> Option<ProjectedPolygon> {
    let rings = record.geometry.rings();
    if rings.is_empty() {
        debug!(feature = %record.id, "polygon shape rule matched non-polygon geometry, skipping");
        return None;
    }

    let projected: Option<Vec<_>> = rings
        .iter()
        .map(|ring| project_points(record, ring, projection))
        .collect();
    Some(ProjectedPolygon::new(&projected?))
}

fn project_points(
    record: &FeatureRecord,
    points: &[[f64; 2]],
    projection: &dyn GeographicProjection,
) -> Option<Vec<(f64, f64)>> {
    points
        .iter()
        .map(|&[lon, lat]| match projection.project(lon, lat) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(feature = %record.id, error = %e, "feature outside projection domain, skipping");
                None
            }
        })
        .collect()
}
