//! Scalar (elevation / land-cover) tiled datasets.
//!
//! Tiles are square rasters fetched as Terrarium-encoded PNGs:
//! `height = (r * 256 + g + b / 256) - 32768`. A tile the source confirms
//! absent decodes to an all-`NaN` raster, so missing data propagates as an
//! explicit signal instead of a silently-wrong numeric default.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Deserialize;
use tracing::debug;

use super::{DatasetError, TileLoader, TiledDataset};
use crate::fetch::{format_url, FetchCache};
use crate::geom::{CornerBoundingBox2d, TilePos};
use crate::projection::GeographicProjection;

/// How point queries blend neighboring raster cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Value of the cell containing the sample point.
    Nearest,
    /// Bilinear blend of the four surrounding cells. `NaN` in any
    /// contributing cell makes the sample `NaN`.
    Linear,
}

/// One decoded raster tile: `resolution * resolution` values, row-major in
/// Z.
#[derive(Debug)]
pub struct ScalarTile {
    resolution: u32,
    values: Vec<f64>,
}

impl ScalarTile {
    fn new(resolution: u32, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), (resolution * resolution) as usize);
        Self { resolution, values }
    }

    /// An all-`NaN` tile standing in for a confirmed-absent source tile.
    fn absent(resolution: u32) -> Self {
        Self::new(resolution, vec![f64::NAN; (resolution * resolution) as usize])
    }

    /// Value at cell coordinates local to this tile.
    fn get(&self, cx: u32, cz: u32) -> f64 {
        self.values[(cz * self.resolution + cx) as usize]
    }
}

/// Loads scalar tiles through the persistent fetch cache.
pub struct ScalarTileLoader {
    fetch: Arc<FetchCache>,
    urls: Arc<Vec<String>>,
    resolution: u32,
}

impl ScalarTileLoader {
    pub fn new(fetch: Arc<FetchCache>, urls: Vec<String>, resolution: u32) -> Self {
        Self {
            fetch,
            urls: Arc::new(urls),
            resolution,
        }
    }
}

impl TileLoader for ScalarTileLoader {
    type Tile = ScalarTile;

    fn load(&self, pos: TilePos) -> BoxFuture<'static, Result<ScalarTile, DatasetError>> {
        let fetch = self.fetch.clone();
        let urls = self.urls.clone();
        let resolution = self.resolution;

        async move {
            let mut properties = HashMap::new();
            properties.insert("x".to_string(), pos.x.to_string());
            properties.insert("z".to_string(), pos.z.to_string());
            let resolved: Vec<String> = urls
                .iter()
                .map(|template| format_url(template, &properties))
                .collect::<Result<_, _>>()?;

            match fetch.get_first(&resolved).await? {
                Some(bytes) => decode_terrarium(pos, &bytes, resolution),
                None => {
                    debug!(tile = %pos, "scalar tile absent upstream");
                    Ok(ScalarTile::absent(resolution))
                }
            }
        }
        .boxed()
    }
}

fn decode_terrarium(pos: TilePos, bytes: &[u8], resolution: u32) -> Result<ScalarTile, DatasetError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| DatasetError::Decode {
            pos,
            message: format!("not a valid image: {e}"),
        })?
        .into_rgb8();

    if image.width() != resolution || image.height() != resolution {
        return Err(DatasetError::Decode {
            pos,
            message: format!(
                "expected {resolution}x{resolution} raster, got {}x{}",
                image.width(),
                image.height()
            ),
        });
    }

    let mut values = Vec::with_capacity((resolution * resolution) as usize);
    for z in 0..resolution {
        for x in 0..resolution {
            let [r, g, b] = image.get_pixel(x, z).0;
            values.push((r as f64 * 256.0 + g as f64 + b as f64 / 256.0) - 32768.0);
        }
    }
    Ok(ScalarTile::new(resolution, values))
}

/// A dataset of floating-point samples addressed by geographic coordinates.
pub struct ScalarDataset {
    projection: Arc<dyn GeographicProjection>,
    tiles: TiledDataset<ScalarTileLoader>,
    blend: BlendMode,
}

impl ScalarDataset {
    /// `projection` maps geographic coordinates to this dataset's cell
    /// grid; each tile covers `resolution` cells per axis.
    pub fn new(
        projection: Arc<dyn GeographicProjection>,
        loader: ScalarTileLoader,
        blend: BlendMode,
    ) -> Self {
        let resolution = loader.resolution;
        Self {
            projection,
            tiles: TiledDataset::new(loader, resolution as f64),
            blend,
        }
    }

    /// Samples the value at a single geographic point.
    ///
    /// Returns `NaN` when the source has no data there; errs when the point
    /// is outside the projection domain or a needed tile cannot be
    /// obtained.
    pub async fn get(&self, lon: f64, lat: f64) -> Result<f64, DatasetError> {
        let (x, z) = self.projection.project(lon, lat)?;
        self.sample(x, z).await
    }

    /// Samples a `size_x * size_z` grid over the given geographic
    /// quadrilateral, row-major in Z.
    ///
    /// Samples are taken at cell centers of the requested grid. A sample
    /// outside the projection domain yields `NaN` (that corner of the area
    /// is simply unavailable); a tile that fails to fetch or decode fails
    /// the whole request.
    pub async fn get_grid(
        &self,
        bounds_geo: &CornerBoundingBox2d,
        size_x: usize,
        size_z: usize,
    ) -> Result<Vec<f64>, DatasetError> {
        // Warm every tile the area can touch in parallel; per-sample awaits
        // below then resolve from cache. Warming failures are ignored here
        // and surface precisely on the samples that need them.
        if let Ok(local) = bounds_geo.from_geo(&*self.projection) {
            let positions = local.axis_align().expand(1.0).to_tiles(self.tiles.tile_size());
            join_all(positions.into_iter().map(|pos| self.tiles.tile(pos))).await;
        }

        let mut out = Vec::with_capacity(size_x * size_z);
        for iz in 0..size_z {
            for ix in 0..size_x {
                let fx = (ix as f64 + 0.5) / size_x as f64;
                let fz = (iz as f64 + 0.5) / size_z as f64;
                let geo = bounds_geo.point(fx, fz);

                let value = match self.projection.project(geo.x, geo.z) {
                    Ok((x, z)) => self.sample(x, z).await?,
                    Err(_) => f64::NAN,
                };
                out.push(value);
            }
        }
        Ok(out)
    }

    async fn sample(&self, x: f64, z: f64) -> Result<f64, DatasetError> {
        match self.blend {
            BlendMode::Nearest => self.cell(x.floor() as i64, z.floor() as i64).await,
            BlendMode::Linear => {
                let bx = (x - 0.5).floor();
                let bz = (z - 0.5).floor();
                let fx = (x - 0.5) - bx;
                let fz = (z - 0.5) - bz;
                let (bx, bz) = (bx as i64, bz as i64);

                let v00 = self.cell(bx, bz).await?;
                let v10 = self.cell(bx + 1, bz).await?;
                let v01 = self.cell(bx, bz + 1).await?;
                let v11 = self.cell(bx + 1, bz + 1).await?;

                let lo = v00 + (v10 - v00) * fx;
                let hi = v01 + (v11 - v01) * fx;
                Ok(lo + (hi - lo) * fz)
            }
        }
    }

    /// Value of one cell of the global raster grid.
    async fn cell(&self, cx: i64, cz: i64) -> Result<f64, DatasetError> {
        let resolution = self.tiles.tile_size() as i64;
        let tile_pos = TilePos::new(
            cx.div_euclid(resolution) as i32,
            cz.div_euclid(resolution) as i32,
        );
        let tile = self.tiles.tile(tile_pos).await?;
        Ok(tile.get(
            cx.rem_euclid(resolution) as u32,
            cz.rem_euclid(resolution) as u32,
        ))
    }

    /// Evicts decoded tiles not accessed within `max_age`.
    pub fn prune(&self, max_age: std::time::Duration) {
        self.tiles.prune(max_age);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::projection::Equirectangular;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Encodes a height raster into Terrarium PNG bytes for stub sources.
    pub(crate) fn terrarium_png(resolution: u32, height_at: impl Fn(u32, u32) -> f64) -> Vec<u8> {
        let mut image = RgbImage::new(resolution, resolution);
        for z in 0..resolution {
            for x in 0..resolution {
                let shifted = height_at(x, z) + 32768.0;
                let r = (shifted / 256.0).floor();
                let g = (shifted - r * 256.0).floor();
                let b = ((shifted - shifted.floor()) * 256.0).floor();
                image.put_pixel(x, z, Rgb([r as u8, g as u8, b as u8]));
            }
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_terrarium_round_trip() {
        let png = terrarium_png(4, |x, z| (x * 10 + z) as f64 - 100.0);
        let tile = decode_terrarium(TilePos::new(0, 0), &png, 4).unwrap();
        for z in 0..4 {
            for x in 0..4 {
                let expected = (x * 10 + z) as f64 - 100.0;
                assert!(
                    (tile.get(x, z) - expected).abs() < 1.0 / 256.0 + 1e-9,
                    "({x}, {z}): {} vs {expected}",
                    tile.get(x, z)
                );
            }
        }
    }

    #[test]
    fn test_decode_rejects_wrong_resolution() {
        let png = terrarium_png(4, |_, _| 0.0);
        let err = decode_terrarium(TilePos::new(1, 1), &png, 8).unwrap_err();
        assert!(matches!(err, DatasetError::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_terrarium(TilePos::new(0, 0), b"not a png", 4).unwrap_err();
        assert!(matches!(err, DatasetError::Decode { .. }));
    }

    fn stub_dataset(blend: BlendMode) -> (tempfile::TempDir, ScalarDataset) {
        use crate::fetch::{FetchStore, HttpGet};
        use bytes::Bytes;

        struct TileServer;
        impl HttpGet for TileServer {
            fn get<'a>(
                &'a self,
                url: &'a str,
            ) -> BoxFuture<'a, Result<Option<Bytes>, crate::fetch::FetchError>> {
                // Tile (0, 0) slopes with x; everything else is missing.
                let body = if url == "http://h/0/0.png" {
                    Some(Bytes::from(terrarium_png(16, |x, _| x as f64)))
                } else {
                    None
                };
                async move { Ok(body) }.boxed()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = FetchStore::open(dir.path()).unwrap();
        let fetch = Arc::new(FetchCache::new(store, Arc::new(TileServer), 1));
        let loader = ScalarTileLoader::new(fetch, vec!["http://h/${x}/${z}.png".to_string()], 16);
        // One degree maps to one cell.
        let dataset = ScalarDataset::new(Arc::new(Equirectangular), loader, blend);
        (dir, dataset)
    }

    #[tokio::test]
    async fn test_nearest_sample() {
        let (_dir, dataset) = stub_dataset(BlendMode::Nearest);
        let value = dataset.get(3.2, 5.9).await.unwrap();
        assert_eq!(value, 3.0);
    }

    #[tokio::test]
    async fn test_linear_sample_between_cells() {
        let (_dir, dataset) = stub_dataset(BlendMode::Linear);
        // Halfway between cell centers 3 and 4 along the slope.
        let value = dataset.get(4.0, 5.5).await.unwrap();
        assert!((value - 3.5).abs() < 1e-9, "got {value}");
    }

    #[tokio::test]
    async fn test_absent_tile_samples_nan() {
        let (_dir, dataset) = stub_dataset(BlendMode::Nearest);
        let value = dataset.get(40.0, 40.0).await.unwrap();
        assert!(value.is_nan());
    }

    #[tokio::test]
    async fn test_out_of_domain_point_is_an_error() {
        let (_dir, dataset) = stub_dataset(BlendMode::Nearest);
        assert!(matches!(
            dataset.get(300.0, 0.0).await,
            Err(DatasetError::Projection(_))
        ));
    }

    #[tokio::test]
    async fn test_grid_is_row_major_and_sized() {
        let (_dir, dataset) = stub_dataset(BlendMode::Nearest);
        let bounds = crate::geom::Bounds2d::of(0.0, 8.0, 0.0, 8.0);
        let bb = CornerBoundingBox2d::axis_aligned(&bounds);
        let grid = dataset.get_grid(&bb, 8, 8).await.unwrap();
        assert_eq!(grid.len(), 64);
        // Sample centers land at x + 0.5, so column ix reads cell ix.
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[7], 7.0);
        assert_eq!(grid[8], 0.0);
    }
}
