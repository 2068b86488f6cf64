//! The baker chain: each baker requests data from one dataset and writes
//! derived attributes into the region builder.
//!
//! Requests run in parallel; bake steps run sequentially in registered
//! order, so a later baker sees everything earlier bakers wrote. The set
//! of bakers is closed: unknown names fail configuration parsing.

use std::sync::Arc;

use serde::Deserialize;

use super::{BakeError, ChunkDataBuilder, GeneratorDatasets};
use crate::geom::{CornerBoundingBox2d, RegionPos, REGION_SIZE};
use crate::vector::VectorShape;

const CELLS: usize = REGION_SIZE as usize;

/// One registered baker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baker {
    /// Surface elevation from the heights dataset; missing samples fall
    /// back to the default height and mark the column as unknown-depth
    /// ocean.
    Heights,
    /// Biome ids from the land-cover dataset.
    Biomes,
    /// Vector features rasterized through their draw rules.
    Features,
}

/// Payload produced by a baker's request phase, consumed by its bake
/// phase.
pub enum BakerData {
    Grid(Vec<f64>),
    Shapes(Vec<Arc<VectorShape>>),
}

impl Baker {
    /// Asynchronous request phase: fetch whatever this baker needs for
    /// the region covering `bounds_geo`.
    pub async fn request(
        &self,
        datasets: &GeneratorDatasets,
        bounds_geo: &CornerBoundingBox2d,
    ) -> Result<BakerData, BakeError> {
        match self {
            Baker::Heights => {
                let grid = datasets.heights.get_grid(bounds_geo, CELLS, CELLS).await?;
                Ok(BakerData::Grid(grid))
            }
            Baker::Biomes => {
                let grid = datasets.landcover.get_grid(bounds_geo, CELLS, CELLS).await?;
                Ok(BakerData::Grid(grid))
            }
            Baker::Features => {
                let shapes = datasets.features.shapes_in(bounds_geo).await?;
                Ok(BakerData::Shapes(shapes))
            }
        }
    }

    /// Synchronous bake phase: write this baker's attributes into the
    /// builder.
    pub fn bake(&self, region: RegionPos, data: BakerData, builder: &mut ChunkDataBuilder) {
        match (self, data) {
            (Baker::Heights, BakerData::Grid(grid)) => bake_heights(&grid, builder),
            (Baker::Biomes, BakerData::Grid(grid)) => bake_biomes(&grid, builder),
            (Baker::Features, BakerData::Shapes(shapes)) => {
                bake_features(shapes, region, builder);
            }
            // request() always pairs a baker with its own payload kind.
            _ => {}
        }
    }
}

fn bake_heights(grid: &[f64], builder: &mut ChunkDataBuilder) {
    for x in 0..CELLS {
        for z in 0..CELLS {
            // Sample grids are row-major in Z.
            let height = grid[z * CELLS + x];
            if height.is_nan() {
                builder.mark_ocean_unknown(x, z);
            } else {
                builder.set_surface_height(x, z, height.floor() as i32);
            }
        }
    }
}

fn bake_biomes(grid: &[f64], builder: &mut ChunkDataBuilder) {
    for x in 0..CELLS {
        for z in 0..CELLS {
            let value = grid[z * CELLS + x];
            if !value.is_nan() {
                builder.set_biome(x, z, (value as i64).clamp(0, u8::MAX as i64) as u8);
            }
        }
    }
}

/// Applies shapes in ascending layer order. Equal layers fall back to
/// feature id, so output never depends on the order tiles were decoded
/// in.
fn bake_features(
    mut shapes: Vec<Arc<VectorShape>>,
    region: RegionPos,
    builder: &mut ChunkDataBuilder,
) {
    shapes.sort_by(|a, b| {
        a.layer()
            .total_cmp(&b.layer())
            .then_with(|| a.id().cmp(b.id()))
    });
    for shape in shapes {
        shape.apply(builder, region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::WaterType;
    use crate::vector::{BlockId, DrawRule, ProjectedPolygon, ShapeKind};

    #[test]
    fn test_heights_bake_floors_and_marks_ocean() {
        let mut grid = vec![12.7; 256];
        grid[0] = f64::NAN; // sample (x=0, z=0)
        grid[5] = f64::NAN; // sample (x=5, z=0)

        let mut builder = ChunkDataBuilder::new(-100);
        bake_heights(&grid, &mut builder);
        let data = builder.build();

        assert_eq!(data.surface_height(1, 0), 12);
        assert_eq!(data.surface_height(0, 0), -100);
        assert_eq!(data.water_type(0, 0), WaterType::Ocean);
        assert_eq!(data.water_depth(0, 0), None);
        assert_eq!(data.water_type(5, 0), WaterType::Ocean);
        assert_eq!(data.water_type(0, 5), WaterType::None);
    }

    #[test]
    fn test_biomes_bake_ignores_missing_samples() {
        let mut grid = vec![7.0; 256];
        grid[3] = f64::NAN;

        let mut builder = ChunkDataBuilder::new(0);
        bake_biomes(&grid, &mut builder);
        let data = builder.build();

        assert_eq!(data.biome(1, 0), 7);
        assert_eq!(data.biome(3, 0), 0);
    }

    fn square_shape(id: &str, layer: f64, block: u16) -> Arc<VectorShape> {
        let ring = vec![(2.0, 2.0), (14.0, 2.0), (14.0, 14.0), (2.0, 14.0), (2.0, 2.0)];
        Arc::new(VectorShape::new(
            Arc::from(id),
            layer,
            vec![DrawRule::Block { block: BlockId(block) }],
            ShapeKind::FillPolygon {
                polygon: ProjectedPolygon::new(&[ring]),
            },
        ))
    }

    #[test]
    fn test_features_tie_break_by_id_not_registration_order() {
        let region = RegionPos::new(0, 0);

        let mut forward = ChunkDataBuilder::new(0);
        bake_features(
            vec![square_shape("way/a", 1.0, 1), square_shape("way/b", 1.0, 2)],
            region,
            &mut forward,
        );
        let mut reversed = ChunkDataBuilder::new(0);
        bake_features(
            vec![square_shape("way/b", 1.0, 2), square_shape("way/a", 1.0, 1)],
            region,
            &mut reversed,
        );

        // "way/b" sorts last either way, so its block wins either way.
        assert_eq!(forward.build().surface_block(8, 8), Some(BlockId(2)));
        assert_eq!(reversed.build().surface_block(8, 8), Some(BlockId(2)));
    }

    #[test]
    fn test_features_layer_order_beats_id() {
        let mut builder = ChunkDataBuilder::new(0);
        bake_features(
            vec![square_shape("way/z", 1.0, 1), square_shape("way/a", 2.0, 2)],
            RegionPos::new(0, 0),
            &mut builder,
        );
        assert_eq!(builder.build().surface_block(8, 8), Some(BlockId(2)));
    }
}
