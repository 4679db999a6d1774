//! Data models for the placement engine.
//!
//! This module defines the fundamental data structures:
//! - `Item`: an object to be stowed with dimensions, mass, priority and zone preference
//! - `ContainerBlueprint`: a normalized container definition, not yet allocated
//! - `Container`: a container with its occupancy grid and placed items
//! - `PlacedItem`: an item together with its final position
//!
//! Items and containers are owned values. Positions and the available volume
//! change only through [`Container::place`] and [`Container::attach_preassigned`].

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::{PlacementError, Result};
use crate::geometry;
use crate::grid::{CellExtent, CellPos, CellRegion, OccupancyGrid};
use crate::optimizer::PackingConfig;
use crate::types::{
    BoundingBox, Dimensional, Dimensions, MIN_DIMENSION, MIN_MASS, Position, Positioned,
    normalization,
};

/// Supported item priorities.
pub const PRIORITY_RANGE: RangeInclusive<i32> = 1..=10;

/// Priority assumed when a record omits it.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Coarse priority class reported with every placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBand {
    /// Priorities 8 to 10.
    High,
    /// Priorities 4 to 7.
    Medium,
    /// Priorities 1 to 3.
    Low,
}

/// Maps a priority to its band.
pub fn priority_band(priority: i32) -> PriorityBand {
    match priority {
        p if p >= 8 => PriorityBand::High,
        p if p >= 4 => PriorityBand::Medium,
        _ => PriorityBand::Low,
    }
}

/// Axis of a dimension, used in normalization notices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Width,
    Depth,
    Height,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Width => write!(f, "width"),
            Axis::Depth => write!(f, "depth"),
            Axis::Height => write!(f, "height"),
        }
    }
}

/// An input value that was replaced during normalization.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizationNotice {
    DimensionClamped {
        subject: String,
        axis: Axis,
        original: f64,
        applied: f64,
    },
    MassClamped {
        subject: String,
        original: f64,
        applied: f64,
    },
}

impl fmt::Display for NormalizationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationNotice::DimensionClamped {
                subject,
                axis,
                original,
                applied,
            } => write!(f, "{subject}: {axis} {original} raised to {applied}"),
            NormalizationNotice::MassClamped {
                subject,
                original,
                applied,
            } => write!(f, "{subject}: mass {original} raised to {applied}"),
        }
    }
}

/// A normalized value together with the adjustments that produced it.
#[derive(Clone, Debug)]
pub struct Normalized<T> {
    pub value: T,
    pub notices: Vec<NormalizationNotice>,
}

impl<T> Normalized<T> {
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Splits into the value and its notices.
    pub fn into_parts(self) -> (T, Vec<NormalizationNotice>) {
        (self.value, self.notices)
    }
}

/// Clamps every axis to [`MIN_DIMENSION`] and records what changed.
fn normalize_dimensions(
    subject: &str,
    dims: Dimensions,
    notices: &mut Vec<NormalizationNotice>,
) -> Dimensions {
    let mut clamp = |axis: Axis, value: f64| {
        let (applied, changed) = normalization::at_least(value, MIN_DIMENSION);
        if changed {
            let notice = NormalizationNotice::DimensionClamped {
                subject: subject.to_string(),
                axis,
                original: value,
                applied,
            };
            warn!(%notice, "Normalized dimension");
            notices.push(notice);
        }
        applied
    };
    Dimensions::new(
        clamp(Axis::Width, dims.width),
        clamp(Axis::Depth, dims.depth),
        clamp(Axis::Height, dims.height),
    )
}

/// An object to be stowed.
///
/// Created once, then moved into a [`Container`] at most once.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    id: String,
    name: String,
    dims: Dimensions,
    mass: f64,
    priority: i32,
    expiry: Option<String>,
    preferred_zone: Option<String>,
    position: Option<Position>,
}

impl Item {
    /// Creates an item, raising dimensions below 1.0 and a mass below 0.1.
    ///
    /// # Examples
    /// ```
    /// use stowplan::model::Item;
    /// use stowplan::types::Dimensions;
    ///
    /// let ok = Item::new("a", "Water", Dimensions::new(10.0, 20.0, 30.0), 5.0);
    /// assert!(ok.notices.is_empty());
    ///
    /// let flat = Item::new("b", "Sheet", Dimensions::new(10.0, 20.0, 0.0), 5.0);
    /// assert_eq!(flat.notices.len(), 1);
    /// assert_eq!(flat.value.dims().height, 1.0);
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        dims: Dimensions,
        mass: f64,
    ) -> Normalized<Self> {
        let id = id.into();
        let mut notices = Vec::new();
        let dims = normalize_dimensions(&id, dims, &mut notices);

        let (applied_mass, changed) = normalization::at_least(mass, MIN_MASS);
        if changed {
            let notice = NormalizationNotice::MassClamped {
                subject: id.clone(),
                original: mass,
                applied: applied_mass,
            };
            warn!(%notice, "Normalized mass");
            notices.push(notice);
        }

        Normalized {
            value: Self {
                id,
                name: name.into(),
                dims,
                mass: applied_mass,
                priority: DEFAULT_PRIORITY,
                expiry: None,
                preferred_zone: None,
                position: None,
            },
            notices,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the expiry key. Keys compare lexicographically, so ISO-8601 dates order correctly.
    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    pub fn with_preferred_zone(mut self, zone: impl Into<String>) -> Self {
        self.preferred_zone = Some(zone.into());
        self
    }

    /// Marks the item as already stowed at `position`.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn expiry(&self) -> Option<&str> {
        self.expiry.as_deref()
    }

    pub fn preferred_zone(&self) -> Option<&str> {
        self.preferred_zone.as_deref()
    }

    /// Position in real units, `None` until placed unless supplied up front.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Checks the priority against [`PRIORITY_RANGE`].
    pub fn validate_priority(&self) -> Result<()> {
        if PRIORITY_RANGE.contains(&self.priority) {
            Ok(())
        } else {
            Err(PlacementError::PriorityOutOfRange {
                item_id: self.id.clone(),
                priority: self.priority,
            })
        }
    }
}

impl Dimensional for Item {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }
}

/// An item inside a container.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedItem {
    item: Item,
    position: Position,
    cells: Option<CellRegion>,
    stacked: bool,
}

impl PlacedItem {
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Cells claimed in the occupancy grid; `None` for pre-assigned items.
    pub fn cells(&self) -> Option<&CellRegion> {
        self.cells.as_ref()
    }

    /// `true` if the item was passed through with its supplied position.
    pub fn is_preassigned(&self) -> bool {
        self.cells.is_none()
    }

    /// `true` if the item rests above the container floor.
    pub fn is_stacked(&self) -> bool {
        self.stacked
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.item.dims)
    }
}

impl Positioned for PlacedItem {
    fn position(&self) -> Position {
        self.position
    }
}

impl Dimensional for PlacedItem {
    fn dimensions(&self) -> Dimensions {
        self.item.dims
    }
}

/// Normalized container definition, allocated with [`ContainerBlueprint::instantiate`].
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerBlueprint {
    id: String,
    zone: String,
    dims: Dimensions,
}

impl ContainerBlueprint {
    /// Creates a blueprint, raising dimensions below 1.0.
    pub fn new(id: impl Into<String>, zone: impl Into<String>, dims: Dimensions) -> Normalized<Self> {
        let id = id.into();
        let mut notices = Vec::new();
        let dims = normalize_dimensions(&id, dims, &mut notices);
        Normalized {
            value: Self {
                id,
                zone: zone.into(),
                dims,
            },
            notices,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Grid size this blueprint needs at the configured resolution.
    pub fn grid_extent(&self, config: &PackingConfig) -> CellExtent {
        CellExtent::of_container(&self.dims, config.resolution)
    }

    /// Checks the grid size against `config.max_grid_cells` without allocating.
    pub fn check_grid(&self, config: &PackingConfig) -> Result<CellExtent> {
        let extent = self.grid_extent(config);
        let cells = extent.cell_count();
        if cells > u128::from(config.max_grid_cells) {
            return Err(PlacementError::GridTooLarge {
                container_id: self.id.clone(),
                cells,
                limit: config.max_grid_cells,
            });
        }
        Ok(extent)
    }

    /// Allocates an empty container after checking the grid ceiling.
    pub fn instantiate(&self, config: &PackingConfig) -> Result<Container> {
        let extent = self.check_grid(config)?;

        Ok(Container {
            id: self.id.clone(),
            zone: self.zone.clone(),
            dims: self.dims,
            resolution: config.resolution,
            grid: OccupancyGrid::new(extent),
            placed: Vec::new(),
            available_volume: self.dims.volume(),
        })
    }
}

impl Dimensional for ContainerBlueprint {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }
}

/// A container with its occupancy grid and placed items.
#[derive(Clone, Debug)]
pub struct Container {
    id: String,
    zone: String,
    dims: Dimensions,
    resolution: u32,
    grid: OccupancyGrid,
    placed: Vec<PlacedItem>,
    available_volume: f64,
}

impl Container {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Grid cells per unit of real length.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Placed items in placement order.
    pub fn placed(&self) -> &[PlacedItem] {
        &self.placed
    }

    /// Total volume minus the volume of grid-placed items.
    pub fn available_volume(&self) -> f64 {
        self.available_volume
    }

    /// Volume of items that claimed grid cells.
    pub fn placed_volume(&self) -> f64 {
        self.placed
            .iter()
            .filter(|p| !p.is_preassigned())
            .map(|p| p.item.volume())
            .sum()
    }

    /// Percentage of the volume consumed (0.0 to 100.0).
    pub fn utilization_percent(&self) -> f64 {
        let total = self.volume();
        if total <= 0.0 {
            return 0.0;
        }
        (1.0 - self.available_volume / total) * 100.0
    }

    /// Cell extent an item occupies in this container.
    pub fn item_extent(&self, item: &Item) -> CellExtent {
        CellExtent::of_item(&item.dims, self.resolution)
    }

    /// Checks the raw dimensions of an item against the container, without rotation.
    pub fn can_fit(&self, item: &Item, tolerance: f64) -> bool {
        item.fits_in(&self.dims, tolerance)
    }

    /// Checks that the item's cells at `corner` stay inside the grid and are all free.
    pub fn is_position_valid(&self, item: &Item, corner: CellPos) -> bool {
        let region = CellRegion::new(corner, self.item_extent(item));
        self.grid.contains_region(&region) && self.grid.is_region_free(&region)
    }

    /// Converts a cell corner to real units.
    pub fn cell_to_position(&self, corner: CellPos) -> Position {
        let res = f64::from(self.resolution);
        Position::new(
            corner.x as f64 / res,
            corner.y as f64 / res,
            corner.z as f64 / res,
        )
    }

    /// Places an item with its corner at `corner`.
    ///
    /// Validation and the grid write happen together: on failure nothing is
    /// mutated and the item is handed back.
    pub fn place(
        &mut self,
        mut item: Item,
        corner: CellPos,
    ) -> std::result::Result<&PlacedItem, Item> {
        if !self.is_position_valid(&item, corner) {
            return Err(item);
        }

        let region = CellRegion::new(corner, self.item_extent(&item));
        self.grid.fill(&region);

        let position = self.cell_to_position(corner);
        item.position = Some(position);
        self.available_volume -= item.volume();
        self.placed.push(PlacedItem {
            item,
            position,
            cells: Some(region),
            stacked: corner.z > 0,
        });
        Ok(&self.placed[self.placed.len() - 1])
    }

    /// Checks if a pre-assigned item lies completely inside the container bounds.
    pub fn contains_preassigned(&self, item: &Item, tolerance: f64) -> bool {
        item.position
            .is_some_and(|pos| geometry::fits_inside(self.dims, pos, item.dims, tolerance))
    }

    /// Records an item that already carries its final position.
    ///
    /// The grid and the available volume are left untouched.
    pub fn attach_preassigned(
        &mut self,
        item: Item,
        tolerance: f64,
    ) -> std::result::Result<&PlacedItem, Item> {
        let Some(position) = item.position else {
            return Err(item);
        };
        if !self.contains_preassigned(&item, tolerance) {
            return Err(item);
        }
        self.placed.push(PlacedItem {
            item,
            position,
            cells: None,
            stacked: position.z > tolerance,
        });
        Ok(&self.placed[self.placed.len() - 1])
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }
}
