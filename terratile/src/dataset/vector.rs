//! Vector feature tiles: newline-delimited feature records mapped into
//! drawable shapes at decode time.
//!
//! Vector tiles are gridded in geographic degrees (unlike scalar tiles,
//! which grid in raster cells), so tile lookup here takes geographic
//! coordinates directly. Each decoded tile holds the mapped shapes of
//! every feature whose geometry intersects it; a feature spanning several
//! tiles appears in each, so area queries dedup by feature id.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use super::{DatasetError, TileLoader, TiledDataset};
use crate::feature::FeatureRecord;
use crate::fetch::{format_url, FetchCache};
use crate::geom::{CornerBoundingBox2d, TilePos};
use crate::projection::GeographicProjection;
use crate::vector::{FeatureMapper, VectorShape};

/// Loads and decodes one vector tile through the persistent fetch cache.
pub struct VectorTileLoader {
    fetch: Arc<FetchCache>,
    urls: Arc<Vec<String>>,
    mapper: Arc<FeatureMapper>,
    projection: Arc<dyn GeographicProjection>,
}

impl VectorTileLoader {
    pub fn new(
        fetch: Arc<FetchCache>,
        urls: Vec<String>,
        mapper: Arc<FeatureMapper>,
        projection: Arc<dyn GeographicProjection>,
    ) -> Self {
        Self {
            fetch,
            urls: Arc::new(urls),
            mapper,
            projection,
        }
    }
}

impl TileLoader for VectorTileLoader {
    type Tile = Vec<Arc<VectorShape>>;

    fn load(&self, pos: TilePos) -> BoxFuture<'static, Result<Self::Tile, DatasetError>> {
        let fetch = self.fetch.clone();
        let urls = self.urls.clone();
        let mapper = self.mapper.clone();
        let projection = self.projection.clone();

        async move {
            let mut properties = HashMap::new();
            properties.insert("x".to_string(), pos.x.to_string());
            properties.insert("z".to_string(), pos.z.to_string());
            let resolved: Vec<String> = urls
                .iter()
                .map(|template| format_url(template, &properties))
                .collect::<Result<_, _>>()?;

            let Some(bytes) = fetch.get_first(&resolved).await? else {
                debug!(tile = %pos, "vector tile absent upstream");
                return Ok(Vec::new());
            };

            let text = std::str::from_utf8(&bytes).map_err(|e| DatasetError::Decode {
                pos,
                message: format!("tile is not valid UTF-8: {e}"),
            })?;
            decode_features(pos, text, &mapper, &*projection)
        }
        .boxed()
    }
}

/// Decodes one-record-per-line JSON into mapped shapes.
///
/// A malformed or structurally invalid line fails the whole tile; a
/// feature no mapping rule claims is dropped silently.
fn decode_features(
    pos: TilePos,
    text: &str,
    mapper: &FeatureMapper,
    projection: &dyn GeographicProjection,
) -> Result<Vec<Arc<VectorShape>>, DatasetError> {
    let mut shapes = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: FeatureRecord =
            serde_json::from_str(line).map_err(|e| DatasetError::Decode {
                pos,
                message: format!("line {}: {e}", index + 1),
            })?;
        record.geometry.validate().map_err(|e| DatasetError::Decode {
            pos,
            message: format!("line {}: feature {}: {e}", index + 1, record.id),
        })?;
        if let Some(shape) = mapper.map(&record, projection) {
            shapes.push(Arc::new(shape));
        }
    }
    Ok(shapes)
}

/// A dataset of drawable vector shapes addressed by geographic area.
pub struct VectorTileDataset {
    tiles: TiledDataset<VectorTileLoader>,
}

impl VectorTileDataset {
    /// `tile_size` is the grid pitch in geographic degrees.
    pub fn new(loader: VectorTileLoader, tile_size: f64) -> Self {
        Self {
            tiles: TiledDataset::new(loader, tile_size),
        }
    }

    /// All shapes intersecting the given geographic area, deduplicated by
    /// feature id across tiles.
    ///
    /// Any needed tile failing to fetch or decode fails the query.
    pub async fn shapes_in(
        &self,
        bounds_geo: &CornerBoundingBox2d,
    ) -> Result<Vec<Arc<VectorShape>>, DatasetError> {
        let tiles = self.tiles.tiles_in(&bounds_geo.axis_align()).await?;

        let mut seen = HashSet::new();
        let mut shapes = Vec::new();
        for (_, tile) in tiles {
            for shape in tile.iter() {
                if seen.insert(shape.id().clone()) {
                    shapes.push(shape.clone());
                }
            }
        }
        Ok(shapes)
    }

    /// Evicts decoded tiles not accessed within `max_age`.
    pub fn prune(&self, max_age: std::time::Duration) {
        self.tiles.prune(max_age);
    }
}
