//! Voxelized occupancy model of a container.
//!
//! Cells are addressed as `(x, y, z)` with `x` along the width, `y` along the
//! depth and `z` along the height. Each `(x, y)` column is stored as a run of
//! bit words along `z`, so range queries along the height are word-parallel.

use serde::Serialize;
use utoipa::ToSchema;

use crate::types::{Dimensions, EPSILON_GENERAL};

const WORD_BITS: usize = u64::BITS as usize;

/// Corner of a region in grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub struct CellPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl CellPos {
    #[inline]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

/// Size of a region in grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellExtent {
    pub width: usize,
    pub depth: usize,
    pub height: usize,
}

/// Cells covering `length` real units, rounded down.
fn cells_floor(length: f64, resolution: u32) -> usize {
    (length * f64::from(resolution) + EPSILON_GENERAL).floor() as usize
}

/// Cells covering `length` real units, rounded up.
fn cells_ceil(length: f64, resolution: u32) -> usize {
    (length * f64::from(resolution) - EPSILON_GENERAL).ceil() as usize
}

impl CellExtent {
    #[inline]
    pub const fn new(width: usize, depth: usize, height: usize) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    /// Grid size of a container: partial cells at the far walls are dropped.
    pub fn of_container(dims: &Dimensions, resolution: u32) -> Self {
        Self::new(
            cells_floor(dims.width, resolution),
            cells_floor(dims.depth, resolution),
            cells_floor(dims.height, resolution),
        )
    }

    /// Cell footprint of an item: partial cells count as occupied.
    pub fn of_item(dims: &Dimensions, resolution: u32) -> Self {
        Self::new(
            cells_ceil(dims.width, resolution).max(1),
            cells_ceil(dims.depth, resolution).max(1),
            cells_ceil(dims.height, resolution).max(1),
        )
    }

    /// Number of cells before any allocation, saturating instead of wrapping.
    pub fn cell_count(&self) -> u128 {
        (self.width as u128)
            .checked_mul(self.depth as u128)
            .and_then(|v| v.checked_mul(self.height as u128))
            .unwrap_or(u128::MAX)
    }

    /// Cells in one horizontal layer.
    #[inline]
    pub fn footprint(&self) -> usize {
        self.width * self.depth
    }
}

/// An axis-aligned block of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRegion {
    pub origin: CellPos,
    pub extent: CellExtent,
}

impl CellRegion {
    #[inline]
    pub const fn new(origin: CellPos, extent: CellExtent) -> Self {
        Self { origin, extent }
    }

    /// Exclusive upper corner.
    #[inline]
    pub fn end(&self) -> CellPos {
        CellPos::new(
            self.origin.x + self.extent.width,
            self.origin.y + self.extent.depth,
            self.origin.z + self.extent.height,
        )
    }

    /// Checks if two regions share at least one cell.
    pub fn intersects(&self, other: &Self) -> bool {
        let (a_end, b_end) = (self.end(), other.end());
        self.origin.x < b_end.x
            && other.origin.x < a_end.x
            && self.origin.y < b_end.y
            && other.origin.y < a_end.y
            && self.origin.z < b_end.z
            && other.origin.z < a_end.z
    }
}

/// Boolean volume recording which cells of a container are filled.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    extent: CellExtent,
    words_per_column: usize,
    bits: Vec<u64>,
    occupied: usize,
}

/// Bit mask selecting bits `lo..hi` of a word, `lo < hi <= 64`.
#[inline]
fn bit_mask(lo: usize, hi: usize) -> u64 {
    let upper = if hi >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << hi) - 1
    };
    upper & !((1u64 << lo) - 1)
}

impl OccupancyGrid {
    /// Allocates an empty grid.
    ///
    /// Callers bound `extent` beforehand, see
    /// [`ContainerBlueprint::instantiate`](crate::model::ContainerBlueprint::instantiate).
    pub fn new(extent: CellExtent) -> Self {
        let words_per_column = extent.height.div_ceil(WORD_BITS);
        let words = extent.footprint() * words_per_column;
        Self {
            extent,
            words_per_column,
            bits: vec![0; words],
            occupied: 0,
        }
    }

    #[inline]
    pub fn extent(&self) -> CellExtent {
        self.extent
    }

    /// Number of filled cells.
    #[inline]
    pub fn occupied_cells(&self) -> usize {
        self.occupied
    }

    /// Checks if the region lies completely inside the grid.
    pub fn contains_region(&self, region: &CellRegion) -> bool {
        let end = region.end();
        end.x <= self.extent.width && end.y <= self.extent.depth && end.z <= self.extent.height
    }

    #[inline]
    fn column_base(&self, x: usize, y: usize) -> usize {
        (x * self.extent.depth + y) * self.words_per_column
    }

    /// Reads a single cell. Out-of-range cells read as free.
    pub fn is_occupied(&self, pos: CellPos) -> bool {
        if pos.x >= self.extent.width || pos.y >= self.extent.depth || pos.z >= self.extent.height
        {
            return false;
        }
        let word = self.bits[self.column_base(pos.x, pos.y) + pos.z / WORD_BITS];
        (word >> (pos.z % WORD_BITS)) & 1 == 1
    }

    /// Lowest filled cell of a column within `z0..z1`.
    fn column_first_occupied(&self, base: usize, z0: usize, z1: usize) -> Option<usize> {
        let mut z = z0;
        while z < z1 {
            let word_idx = z / WORD_BITS;
            let lo = z % WORD_BITS;
            let hi = (z1 - word_idx * WORD_BITS).min(WORD_BITS);
            let masked = self.bits[base + word_idx] & bit_mask(lo, hi);
            if masked != 0 {
                return Some(word_idx * WORD_BITS + masked.trailing_zeros() as usize);
            }
            z = (word_idx + 1) * WORD_BITS;
        }
        None
    }

    /// Last cell of the filled run that starts at `z` in a column.
    fn column_run_end(&self, base: usize, z: usize) -> usize {
        let mut cursor = z;
        loop {
            let word_idx = cursor / WORD_BITS;
            if word_idx >= self.words_per_column {
                break;
            }
            let bit = cursor % WORD_BITS;
            let ones = (self.bits[base + word_idx] >> bit).trailing_ones() as usize;
            let ones = ones.min(WORD_BITS - bit);
            cursor += ones;
            if bit + ones < WORD_BITS {
                break;
            }
        }
        cursor.saturating_sub(1).max(z)
    }

    /// Finds a filled cell inside `region` and reports how far up it blocks.
    ///
    /// Returns the height of the top cell of the filled run the blocking cell
    /// belongs to, or `None` when the whole region is free. Any region with the
    /// same footprint whose bottom lies between `region.origin.z` and that
    /// height is blocked by the same run. The region must lie inside the grid.
    pub fn blocking_run_top(&self, region: &CellRegion) -> Option<usize> {
        debug_assert!(self.contains_region(region));
        let end = region.end();
        for x in region.origin.x..end.x {
            for y in region.origin.y..end.y {
                let base = self.column_base(x, y);
                if let Some(z) = self.column_first_occupied(base, region.origin.z, end.z) {
                    return Some(self.column_run_end(base, z));
                }
            }
        }
        None
    }

    /// Checks if no cell of an in-bounds region is filled.
    #[inline]
    pub fn is_region_free(&self, region: &CellRegion) -> bool {
        self.blocking_run_top(region).is_none()
    }

    /// Marks every cell of an in-bounds region as filled.
    pub fn fill(&mut self, region: &CellRegion) {
        debug_assert!(self.contains_region(region));
        let end = region.end();
        for x in region.origin.x..end.x {
            for y in region.origin.y..end.y {
                let base = self.column_base(x, y);
                let mut z = region.origin.z;
                while z < end.z {
                    let word_idx = z / WORD_BITS;
                    let lo = z % WORD_BITS;
                    let hi = (end.z - word_idx * WORD_BITS).min(WORD_BITS);
                    let mask = bit_mask(lo, hi);
                    let word = &mut self.bits[base + word_idx];
                    self.occupied += (mask & !*word).count_ones() as usize;
                    *word |= mask;
                    z = (word_idx + 1) * WORD_BITS;
                }
            }
        }
    }

    /// Counts filled cells in layer `z` below the footprint of `region`.
    pub fn occupied_in_layer(&self, region: &CellRegion, z: usize) -> usize {
        let end = region.end();
        let mut count = 0;
        for x in region.origin.x..end.x {
            for y in region.origin.y..end.y {
                if self.is_occupied(CellPos::new(x, y, z)) {
                    count += 1;
                }
            }
        }
        count
    }
}
