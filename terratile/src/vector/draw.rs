//! Draw rules applied per rasterized cell.
//!
//! A shape carries an ordered list of rules; every covered cell passes
//! through all of them in sequence, so later rules see earlier writes.
//! The set is closed: unknown rule names fail configuration parsing, not
//! a draw call.

use serde::Deserialize;

use crate::bake::{ChunkDataBuilder, WaterType, WATER_DEPTH_OFFSET};

/// Opaque surface block identifier, resolved by the consuming generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u16);

/// One per-cell drawing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawRule {
    /// Overrides the column's surface block.
    Block { block: BlockId },
    /// Marks the column as ocean, depth derived from the cell weight.
    Ocean,
    /// Marks the column as river water, depth derived from the cell
    /// weight.
    Water,
}

impl DrawRule {
    /// Applies this rule to one cell. `weight` is the rasterizer's signed
    /// distance (0 for plain fills); cells outside the boundary draw
    /// nothing.
    pub fn draw(&self, builder: &mut ChunkDataBuilder, x: usize, z: usize, weight: i32) {
        if weight < 0 {
            return;
        }
        match self {
            DrawRule::Block { block } => builder.set_surface_block(x, z, *block),
            DrawRule::Ocean => builder.update_water(x, z, WaterType::Ocean, depth_from(weight)),
            DrawRule::Water => builder.update_water(x, z, WaterType::River, depth_from(weight)),
        }
    }
}

fn depth_from(weight: i32) -> u8 {
    (weight + WATER_DEPTH_OFFSET).clamp(0, (crate::bake::WATER_DEPTH_UNKNOWN - 1) as i32) as u8
}
