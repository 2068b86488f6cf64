//! Immutable per-region composite data and its builder.
//!
//! One [`ChunkData`] holds the merged output of every baker for one 16x16
//! region: per-column surface height, water, biome and optional surface
//! block override. Built once by the region cache and shared read-only
//! afterwards.

use crate::vector::BlockId;

/// Water drawn with weight `w` is `w + WATER_DEPTH_OFFSET` cells deep, so
/// a boundary cell still carries at least one cell of water.
pub const WATER_DEPTH_OFFSET: i32 = 1;

/// Depth value meaning "water of unknown depth", used for columns where
/// elevation data is missing entirely.
pub const WATER_DEPTH_UNKNOWN: u8 = WATER_DEPTH_MASK;

/// Ground depth assumed for unknown-depth water columns.
const UNKNOWN_DEPTH_ESTIMATE: i32 = 30;

// One byte per column: type in the top two bits, depth in the low six.
const WATER_TYPE_MASK: u8 = 0b1100_0000;
const WATER_DEPTH_MASK: u8 = 0b0011_1111;
const WATER_TYPE_OCEAN: u8 = 1 << 6;
const WATER_TYPE_RIVER: u8 = 2 << 6;

/// Kind of water occupying a column, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterType {
    None,
    Ocean,
    River,
}

fn index(x: usize, z: usize) -> usize {
    debug_assert!(x < 16 && z < 16);
    x * 16 + z
}

/// Immutable composite result for one region.
pub struct ChunkData {
    surface_height: [i32; 256],
    water: [u8; 256],
    biomes: [u8; 256],
    surface_blocks: [Option<BlockId>; 256],
    min_ground: i32,
    max_surface: i32,
}

impl ChunkData {
    /// Terrain surface height of the column, water included.
    pub fn surface_height(&self, x: usize, z: usize) -> i32 {
        self.surface_height[index(x, z)]
    }

    /// Solid ground height of the column: the surface minus any water
    /// depth. Unknown-depth water uses a fixed deep estimate.
    pub fn ground_height(&self, x: usize, z: usize) -> i32 {
        self.surface_height[index(x, z)] - water_depth_estimate(self.water[index(x, z)])
    }

    pub fn water_type(&self, x: usize, z: usize) -> WaterType {
        match self.water[index(x, z)] & WATER_TYPE_MASK {
            WATER_TYPE_OCEAN => WaterType::Ocean,
            WATER_TYPE_RIVER => WaterType::River,
            _ => WaterType::None,
        }
    }

    /// Water depth in cells, `None` for dry columns and unknown-depth
    /// water.
    pub fn water_depth(&self, x: usize, z: usize) -> Option<u8> {
        let water = self.water[index(x, z)];
        let depth = water & WATER_DEPTH_MASK;
        if water & WATER_TYPE_MASK == 0 || depth == WATER_DEPTH_UNKNOWN {
            None
        } else {
            Some(depth)
        }
    }

    /// Biome identifier of the column.
    pub fn biome(&self, x: usize, z: usize) -> u8 {
        self.biomes[index(x, z)]
    }

    /// Surface block override drawn by a vector feature, if any.
    pub fn surface_block(&self, x: usize, z: usize) -> Option<BlockId> {
        self.surface_blocks[index(x, z)]
    }

    /// True when the vertical slab `[min_y, max_y]` lies entirely above
    /// every column's surface: the consumer can fill it with air.
    pub fn above_surface(&self, min_y: i32, max_y: i32) -> bool {
        debug_assert!(min_y <= max_y);
        min_y > self.max_surface
    }

    /// True when the slab lies entirely below every column's ground: the
    /// consumer can fill it with stone.
    pub fn below_surface(&self, min_y: i32, max_y: i32) -> bool {
        debug_assert!(min_y <= max_y);
        max_y < self.min_ground
    }
}

fn water_depth_estimate(water: u8) -> i32 {
    if water & WATER_TYPE_MASK == 0 {
        return 0;
    }
    match water & WATER_DEPTH_MASK {
        WATER_DEPTH_UNKNOWN => UNKNOWN_DEPTH_ESTIMATE,
        depth => depth as i32,
    }
}

/// Mutable accumulator the bakers write into, in registered order.
pub struct ChunkDataBuilder {
    surface_height: [i32; 256],
    water: [u8; 256],
    biomes: [u8; 256],
    surface_blocks: [Option<BlockId>; 256],
}

impl ChunkDataBuilder {
    /// Starts with every column at `default_height`, dry, biome 0, no
    /// overrides.
    pub fn new(default_height: i32) -> Self {
        Self {
            surface_height: [default_height; 256],
            water: [0; 256],
            biomes: [0; 256],
            surface_blocks: [None; 256],
        }
    }

    pub fn set_surface_height(&mut self, x: usize, z: usize, height: i32) {
        self.surface_height[index(x, z)] = height;
    }

    /// Current surface height, visible to later bakers.
    pub fn surface_height(&self, x: usize, z: usize) -> i32 {
        self.surface_height[index(x, z)]
    }

    pub fn set_biome(&mut self, x: usize, z: usize, biome: u8) {
        self.biomes[index(x, z)] = biome;
    }

    pub fn set_surface_block(&mut self, x: usize, z: usize, block: BlockId) {
        self.surface_blocks[index(x, z)] = block.into();
    }

    /// Merges water into a column. Ocean outranks river; within one type
    /// the deeper value wins, with unknown depth counting as deepest.
    pub fn update_water(&mut self, x: usize, z: usize, water_type: WaterType, depth: u8) {
        let encoded = encode_water(water_type, depth);
        let slot = &mut self.water[index(x, z)];
        if rank(encoded) > rank(*slot) {
            *slot = encoded;
        }
    }

    /// Marks a column as ocean of unknown depth, the fallback for missing
    /// elevation data.
    pub fn mark_ocean_unknown(&mut self, x: usize, z: usize) {
        self.update_water(x, z, WaterType::Ocean, WATER_DEPTH_UNKNOWN);
    }

    /// Marks the whole region as ocean of unknown depth.
    pub fn mark_all_ocean_unknown(&mut self) {
        self.water = [WATER_TYPE_OCEAN | WATER_DEPTH_UNKNOWN; 256];
    }

    pub fn build(self) -> ChunkData {
        let mut min_ground = i32::MAX;
        let mut max_surface = i32::MIN;
        for i in 0..256 {
            max_surface = max_surface.max(self.surface_height[i]);
            min_ground = min_ground.min(self.surface_height[i] - water_depth_estimate(self.water[i]));
        }
        ChunkData {
            surface_height: self.surface_height,
            water: self.water,
            biomes: self.biomes,
            surface_blocks: self.surface_blocks,
            min_ground,
            max_surface,
        }
    }
}

fn encode_water(water_type: WaterType, depth: u8) -> u8 {
    let type_bits = match water_type {
        WaterType::None => return 0,
        WaterType::Ocean => WATER_TYPE_OCEAN,
        WaterType::River => WATER_TYPE_RIVER,
    };
    type_bits | (depth & WATER_DEPTH_MASK)
}

/// Merge priority: ocean beats river beats dry, deeper beats shallower,
/// unknown depth beats any known depth.
fn rank(water: u8) -> u16 {
    let type_rank = match water & WATER_TYPE_MASK {
        WATER_TYPE_OCEAN => 2u16,
        WATER_TYPE_RIVER => 1,
        _ => 0,
    };
    (type_rank << 6) | (water & WATER_DEPTH_MASK) as u16
}
