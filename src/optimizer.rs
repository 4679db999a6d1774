//! Placement orchestration.
//!
//! Sorts items by priority (descending) and expiry (soonest first), picks the
//! candidate containers for every item according to the zone policy, runs the
//! bottom-left-back search and records one outcome per item plus per-container
//! statistics.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{PlacementError, Result};
use crate::grid::CellPos;
use crate::model::{Container, ContainerBlueprint, Item, PlacedItem, PriorityBand, priority_band};
use crate::search::{SearchPass, find_bottom_left_back_position};
use crate::types::{Dimensional, Dimensions, Position, Positioned};

/// Configuration for the placement algorithm.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Grid cells per unit of real length, shared by all containers.
    pub resolution: u32,
    /// Minimum share of the footprint that must rest on filled cells (0.0 to 1.0).
    pub support_ratio: f64,
    /// Items with a priority above this value are placed front first.
    pub front_priority_threshold: i32,
    /// Upper bound for the cells of a single occupancy grid.
    pub max_grid_cells: u64,
    /// Upper bound for the cells of all grids of one run together.
    pub max_total_grid_cells: u64,
    /// Only containers in the item's preferred zone are eligible.
    pub enforce_zones: bool,
    /// General numerical tolerance.
    pub general_epsilon: f64,
}

impl PackingConfig {
    pub const DEFAULT_RESOLUTION: u32 = 10;
    pub const DEFAULT_SUPPORT_RATIO: f64 = 0.5;
    pub const DEFAULT_FRONT_PRIORITY_THRESHOLD: i32 = 5;
    pub const DEFAULT_MAX_GRID_CELLS: u64 = 1 << 30;
    pub const DEFAULT_MAX_TOTAL_GRID_CELLS: u64 = 1 << 32;
    pub const DEFAULT_ENFORCE_ZONES: bool = false;
    pub const DEFAULT_GENERAL_EPSILON: f64 = 1e-6;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Rejects values the search cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(PlacementError::InvalidConfiguration(
                "resolution must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.support_ratio) {
            return Err(PlacementError::InvalidConfiguration(format!(
                "support ratio must be between 0 and 1, got: {}",
                self.support_ratio
            )));
        }
        if self.max_grid_cells == 0 {
            return Err(PlacementError::InvalidConfiguration(
                "max grid cells must be greater than 0".to_string(),
            ));
        }
        if self.max_total_grid_cells == 0 {
            return Err(PlacementError::InvalidConfiguration(
                "max total grid cells must be greater than 0".to_string(),
            ));
        }
        if !self.general_epsilon.is_finite() || self.general_epsilon < 0.0 {
            return Err(PlacementError::InvalidConfiguration(format!(
                "general epsilon must be a non-negative number, got: {}",
                self.general_epsilon
            )));
        }
        Ok(())
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            support_ratio: Self::DEFAULT_SUPPORT_RATIO,
            front_priority_threshold: Self::DEFAULT_FRONT_PRIORITY_THRESHOLD,
            max_grid_cells: Self::DEFAULT_MAX_GRID_CELLS,
            max_total_grid_cells: Self::DEFAULT_MAX_TOTAL_GRID_CELLS,
            enforce_zones: Self::DEFAULT_ENFORCE_ZONES,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
        }
    }
}

/// Builder for PackingConfig.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn resolution(mut self, resolution: u32) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn support_ratio(mut self, ratio: f64) -> Self {
        self.config.support_ratio = ratio;
        self
    }

    pub fn front_priority_threshold(mut self, threshold: i32) -> Self {
        self.config.front_priority_threshold = threshold;
        self
    }

    pub fn max_grid_cells(mut self, cells: u64) -> Self {
        self.config.max_grid_cells = cells;
        self
    }

    pub fn max_total_grid_cells(mut self, cells: u64) -> Self {
        self.config.max_total_grid_cells = cells;
        self
    }

    pub fn enforce_zones(mut self, enforce: bool) -> Self {
        self.config.enforce_zones = enforce;
        self
    }

    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// A successfully placed item.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Placement {
    pub item_id: String,
    pub container_id: String,
    pub position: Position,
    pub dimensions: Dimensions,
    /// Rests above the container floor.
    pub stacked: bool,
    /// Passed through with the position supplied in the input.
    pub preassigned: bool,
    pub priority_band: PriorityBand,
}

impl Placement {
    fn new(container_id: &str, placed: &PlacedItem) -> Self {
        let item = placed.item();
        Self {
            item_id: item.id().to_string(),
            container_id: container_id.to_string(),
            position: placed.position(),
            dimensions: placed.dimensions(),
            stacked: placed.is_stacked(),
            preassigned: placed.is_preassigned(),
            priority_band: priority_band(item.priority()),
        }
    }
}

/// Reasons why an item could not be placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    /// Zone enforcement is on and no container carries the preferred zone.
    NoMatchingZone { zone: Option<String> },
    /// No candidate container had room for the item.
    NoSuitablePosition,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::NoMatchingZone { .. } => "no_matching_zone",
            UnplacedReason::NoSuitablePosition => "no_suitable_position",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::NoMatchingZone { zone: Some(zone) } => {
                write!(f, "no containers available with matching zone {}", zone)
            }
            UnplacedReason::NoMatchingZone { zone: None } => {
                write!(f, "no containers available with matching zone (none)")
            }
            UnplacedReason::NoSuitablePosition => write!(f, "no suitable position found"),
        }
    }
}

/// Item that could not be placed.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedItem {
    pub item_id: String,
    pub reason: UnplacedReason,
}

/// Fill level of one container after the run.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ContainerStats {
    pub container_id: String,
    pub zone: String,
    pub items_placed: usize,
    /// Percentage of the volume consumed (0.0 to 100.0).
    pub volume_utilization: f64,
    pub available_volume: f64,
    pub total_volume: f64,
}

impl From<&Container> for ContainerStats {
    fn from(container: &Container) -> Self {
        Self {
            container_id: container.id().to_string(),
            zone: container.zone().to_string(),
            items_placed: container.placed().len(),
            volume_utilization: container.utilization_percent(),
            available_volume: container.available_volume(),
            total_volume: container.volume(),
        }
    }
}

/// Result of a placement run.
#[derive(Clone, Debug)]
pub struct PackingResult {
    pub successful_placements: Vec<Placement>,
    pub unplaced_items: Vec<UnplacedItem>,
    pub container_stats: Vec<ContainerStats>,
    /// Final container states, in input order.
    pub containers: Vec<Container>,
}

impl PackingResult {
    /// Indicates whether every item was placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced_items.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.successful_placements.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced_items.len()
    }

    /// Average utilization over all containers.
    pub fn average_utilization(&self) -> f64 {
        if self.container_stats.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .container_stats
            .iter()
            .map(|s| s.volume_utilization)
            .sum();
        sum / self.container_stats.len() as f64
    }

    pub fn stats_for(&self, container_id: &str) -> Option<&ContainerStats> {
        self.container_stats
            .iter()
            .find(|s| s.container_id == container_id)
    }

    pub fn placement_of(&self, item_id: &str) -> Option<&Placement> {
        self.successful_placements
            .iter()
            .find(|p| p.item_id == item_id)
    }

    pub fn unplaced(&self, item_id: &str) -> Option<&UnplacedItem> {
        self.unplaced_items.iter().find(|u| u.item_id == item_id)
    }
}

/// Progress events of a placement run, for live tracing by the embedding application.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PlacementEvent {
    /// The run begins.
    Started { items: usize, containers: usize },
    /// An item is being processed (1-based index in sorted order).
    ItemStarted {
        item_id: String,
        index: usize,
        total: usize,
        priority: i32,
        preferred_zone: Option<String>,
    },
    /// A pre-assigned item was passed through.
    PreassignedAccepted {
        item_id: String,
        container_id: String,
        position: Position,
    },
    /// A container is evaluated for the current item.
    ContainerTried {
        item_id: String,
        container_id: String,
        zone: String,
    },
    /// The item exceeds the container on at least one axis.
    ContainerSkipped {
        item_id: String,
        container_id: String,
        reason: String,
    },
    /// The search returned a corner.
    PositionFound {
        item_id: String,
        container_id: String,
        cell: CellPos,
        pass: SearchPass,
        /// Supported share of the footprint (1.0 on the floor).
        support: f64,
    },
    /// The search found no corner in this container.
    PositionNotFound {
        item_id: String,
        container_id: String,
    },
    /// The item was placed.
    ItemPlaced {
        item_id: String,
        container_id: String,
        position: Position,
        dimensions: Dimensions,
    },
    /// The item could not be placed.
    ItemRejected {
        item_id: String,
        reason_code: String,
        reason_text: String,
    },
    /// The run is complete.
    Finished { placed: usize, unplaced: usize },
}

/// Places items with the default configuration.
pub fn pack_items(items: Vec<Item>, containers: Vec<ContainerBlueprint>) -> Result<PackingResult> {
    pack_items_with_config(items, containers, PackingConfig::default())
}

/// Places items with a custom configuration.
pub fn pack_items_with_config(
    items: Vec<Item>,
    containers: Vec<ContainerBlueprint>,
    config: PackingConfig,
) -> Result<PackingResult> {
    pack_items_with_progress(items, containers, config, |_| {})
}

/// Checks everything that would make a run ill-defined, without allocating any grid.
pub fn validate_inputs(
    items: &[Item],
    containers: &[ContainerBlueprint],
    config: &PackingConfig,
) -> Result<()> {
    config.validate()?;
    let mut total_cells: u128 = 0;
    for blueprint in containers {
        total_cells = total_cells.saturating_add(blueprint.check_grid(config)?.cell_count());
    }
    if total_cells > u128::from(config.max_total_grid_cells) {
        return Err(PlacementError::GridBudgetExceeded {
            containers: containers.len(),
            cells: total_cells,
            limit: config.max_total_grid_cells,
        });
    }
    for item in items {
        item.validate_priority()?;
        if item.position().is_some_and(|pos| !pos.is_valid()) {
            return Err(PlacementError::InvalidPosition {
                item_id: item.id().to_string(),
            });
        }
    }
    Ok(())
}

/// Priority descending, then expiry ascending.
///
/// A missing expiry compares as the empty key and therefore comes first.
fn placement_order(a: &Item, b: &Item) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.expiry().unwrap_or("").cmp(b.expiry().unwrap_or("")))
}

/// Indices of the containers an item may go into, in evaluation order.
fn candidate_containers(containers: &[Container], item: &Item, enforce_zones: bool) -> Vec<usize> {
    let in_zone = |c: &Container| item.preferred_zone() == Some(c.zone());
    let (matching, other): (Vec<usize>, Vec<usize>) =
        (0..containers.len()).partition(|&idx| in_zone(&containers[idx]));
    if enforce_zones {
        matching
    } else {
        matching.into_iter().chain(other).collect()
    }
}

/// Tries the candidates in order; the first container yielding a position wins.
fn place_in_candidates(
    containers: &mut [Container],
    candidates: &[usize],
    mut item: Item,
    config: &PackingConfig,
    on_event: &mut impl FnMut(&PlacementEvent),
) -> std::result::Result<Placement, Item> {
    for &idx in candidates {
        let container = &mut containers[idx];
        let container_id = container.id().to_string();
        on_event(&PlacementEvent::ContainerTried {
            item_id: item.id().to_string(),
            container_id: container_id.clone(),
            zone: container.zone().to_string(),
        });

        if !container.can_fit(&item, config.general_epsilon) {
            debug!(item_id = item.id(), container_id = %container_id, "Item too large for container");
            on_event(&PlacementEvent::ContainerSkipped {
                item_id: item.id().to_string(),
                container_id,
                reason: "dimensions_exceed_container".to_string(),
            });
            continue;
        }

        let Some(hit) = find_bottom_left_back_position(container, &item, config) else {
            on_event(&PlacementEvent::PositionNotFound {
                item_id: item.id().to_string(),
                container_id,
            });
            continue;
        };

        on_event(&PlacementEvent::PositionFound {
            item_id: item.id().to_string(),
            container_id: container_id.clone(),
            cell: hit.corner,
            pass: hit.pass,
            support: hit.support,
        });

        match container.place(item, hit.corner) {
            Ok(placed) => return Ok(Placement::new(&container_id, placed)),
            Err(returned) => item = returned,
        }
    }
    Err(item)
}

/// Places items and reports every step to `on_event`.
///
/// Structural faults (invalid configuration, out-of-range priorities,
/// oversized grids) are returned as errors before any container is touched.
/// Items that do not fit are reported in [`PackingResult::unplaced_items`].
pub fn pack_items_with_progress(
    items: Vec<Item>,
    containers: Vec<ContainerBlueprint>,
    config: PackingConfig,
    on_event: impl FnMut(&PlacementEvent),
) -> Result<PackingResult> {
    pack_items_cancellable(items, containers, config, on_event, || false)
}

/// Like [`pack_items_with_progress`], but checks `is_cancelled` before each item.
///
/// A cancelled run returns [`PlacementError::Cancelled`] with the number of
/// items already processed; no `Finished` event is emitted.
pub fn pack_items_cancellable(
    items: Vec<Item>,
    containers: Vec<ContainerBlueprint>,
    config: PackingConfig,
    mut on_event: impl FnMut(&PlacementEvent),
    is_cancelled: impl Fn() -> bool,
) -> Result<PackingResult> {
    validate_inputs(&items, &containers, &config)?;
    let mut containers = containers
        .iter()
        .map(|blueprint| blueprint.instantiate(&config))
        .collect::<Result<Vec<_>>>()?;

    let mut items = items;
    items.sort_by(placement_order);
    let total = items.len();

    info!(
        items = total,
        containers = containers.len(),
        enforce_zones = config.enforce_zones,
        "Starting placement run"
    );
    on_event(&PlacementEvent::Started {
        items: total,
        containers: containers.len(),
    });

    let mut successful_placements = Vec::new();
    let mut unplaced_items = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        if is_cancelled() {
            info!(processed = index, total, "Placement run cancelled");
            return Err(PlacementError::Cancelled { processed: index });
        }
        on_event(&PlacementEvent::ItemStarted {
            item_id: item.id().to_string(),
            index: index + 1,
            total,
            priority: item.priority(),
            preferred_zone: item.preferred_zone().map(str::to_string),
        });

        let mut item = item;
        if item.position().is_some() {
            let host = containers
                .iter()
                .position(|c| c.contains_preassigned(&item, config.general_epsilon));
            if let Some(idx) = host {
                let container = &mut containers[idx];
                let container_id = container.id().to_string();
                match container.attach_preassigned(item, config.general_epsilon) {
                    Ok(placed) => {
                        let placement = Placement::new(&container_id, placed);
                        debug!(
                            item_id = %placement.item_id,
                            container_id = %container_id,
                            "Kept pre-assigned position"
                        );
                        on_event(&PlacementEvent::PreassignedAccepted {
                            item_id: placement.item_id.clone(),
                            container_id,
                            position: placement.position,
                        });
                        successful_placements.push(placement);
                        continue;
                    }
                    Err(returned) => item = returned,
                }
            }
        }

        let candidates = candidate_containers(&containers, &item, config.enforce_zones);
        let reason = if config.enforce_zones && candidates.is_empty() {
            debug!(
                item_id = item.id(),
                zone = ?item.preferred_zone(),
                "No container with matching zone"
            );
            UnplacedReason::NoMatchingZone {
                zone: item.preferred_zone().map(str::to_string),
            }
        } else {
            match place_in_candidates(&mut containers, &candidates, item, &config, &mut on_event) {
                Ok(placement) => {
                    on_event(&PlacementEvent::ItemPlaced {
                        item_id: placement.item_id.clone(),
                        container_id: placement.container_id.clone(),
                        position: placement.position,
                        dimensions: placement.dimensions,
                    });
                    successful_placements.push(placement);
                    continue;
                }
                Err(returned) => {
                    item = returned;
                    UnplacedReason::NoSuitablePosition
                }
            }
        };

        on_event(&PlacementEvent::ItemRejected {
            item_id: item.id().to_string(),
            reason_code: reason.code().to_string(),
            reason_text: reason.to_string(),
        });
        unplaced_items.push(UnplacedItem {
            item_id: item.id().to_string(),
            reason,
        });
    }

    let container_stats: Vec<ContainerStats> =
        containers.iter().map(ContainerStats::from).collect();

    info!(
        placed = successful_placements.len(),
        unplaced = unplaced_items.len(),
        "Placement run finished"
    );
    on_event(&PlacementEvent::Finished {
        placed: successful_placements.len(),
        unplaced: unplaced_items.len(),
    });

    Ok(PackingResult {
        successful_placements,
        unplaced_items,
        container_stats,
        containers,
    })
}
