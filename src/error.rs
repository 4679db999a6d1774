//! Structural faults of a placement run.
//!
//! A missing fit is never an error: those outcomes are reported as
//! [`UnplacedReason`](crate::optimizer::UnplacedReason) entries. Apart from
//! `Cancelled`, the variants here abort a run before any container is mutated.

use thiserror::Error;

/// Errors that stop a placement run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    /// The occupancy grid of a container would exceed the configured ceiling.
    #[error(
        "Container {container_id} needs {cells} grid cells, exceeding the limit of {limit}"
    )]
    GridTooLarge {
        container_id: String,
        cells: u128,
        limit: u64,
    },

    /// The grids of all containers of one run together would exceed the configured ceiling.
    #[error(
        "{containers} containers need {cells} grid cells in total, exceeding the limit of {limit}"
    )]
    GridBudgetExceeded {
        containers: usize,
        cells: u128,
        limit: u64,
    },

    /// An item priority outside the supported 1..=10 range.
    #[error("Item {item_id} has priority {priority}, expected a value between 1 and 10")]
    PriorityOutOfRange { item_id: String, priority: i32 },

    /// A pre-assigned position that cannot describe a location in a container.
    #[error("Item {item_id} carries an invalid pre-assigned position")]
    InvalidPosition { item_id: String },

    /// The caller stopped the run before every item was processed.
    #[error("Placement run cancelled after {processed} items")]
    Cancelled { processed: usize },

    /// Invalid packing parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PlacementError {
    /// Stable machine readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PlacementError::GridTooLarge { .. } => "grid_too_large",
            PlacementError::GridBudgetExceeded { .. } => "grid_budget_exceeded",
            PlacementError::PriorityOutOfRange { .. } => "priority_out_of_range",
            PlacementError::InvalidPosition { .. } => "invalid_position",
            PlacementError::Cancelled { .. } => "cancelled",
            PlacementError::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

/// Result type for placement operations.
pub type Result<T> = std::result::Result<T, PlacementError>;
