//! Stowage placement engine.
//!
//! Places rectangular items into rectangular containers on a discretized
//! occupancy grid, using a bottom-left-back heuristic with priority-driven
//! depth ordering, zone preference and a support rule for stacking.
//!
//! ```
//! use stowplan::model::{ContainerBlueprint, Item};
//! use stowplan::optimizer::{PackingConfig, pack_items_with_config};
//! use stowplan::types::Dimensions;
//!
//! let container = ContainerBlueprint::new("c1", "Lab", Dimensions::new(20.0, 20.0, 20.0)).into_inner();
//! let item = Item::new("i1", "Kit", Dimensions::new(5.0, 5.0, 5.0), 2.0)
//!     .into_inner()
//!     .with_priority(9)
//!     .with_preferred_zone("Lab");
//!
//! let config = PackingConfig::builder().resolution(1).build();
//! let result = pack_items_with_config(vec![item], vec![container], config).unwrap();
//! assert!(result.is_complete());
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod model;
pub mod optimizer;
pub mod search;
pub mod types;
