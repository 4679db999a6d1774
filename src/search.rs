//! Bottom-left-back position search.
//!
//! The search runs in two passes over the discretized container:
//! 1. Floor pass: every `(x, y, 0)` corner, `x` outer and `y` inner.
//! 2. Stacking pass: every `(x, y, z)` with `z >= 1`, `x` outer, `y` middle,
//!    `z` inner, accepting a corner only if enough of the footprint rests on
//!    filled cells directly below.
//!
//! The `y` direction depends on the item's priority: items above the
//! configured threshold scan from the front (`y = 0`) so they stay easy to
//! retrieve, all others scan from the back.

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::grid::{CellPos, CellRegion};
use crate::model::{Container, Item};
use crate::optimizer::PackingConfig;

/// Which pass produced a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchPass {
    Floor,
    Stacking,
}

/// A corner accepted by the search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchHit {
    pub corner: CellPos,
    pub pass: SearchPass,
    /// Supported share of the footprint (1.0 on the floor).
    pub support: f64,
}

/// Depth scan order for an item.
fn depth_order(item: &Item, max_y: usize, config: &PackingConfig) -> Vec<usize> {
    if item.priority() > config.front_priority_threshold {
        (0..=max_y).collect()
    } else {
        (0..=max_y).rev().collect()
    }
}

/// Share of the footprint at `region` resting on filled cells one layer below.
pub fn support_ratio(container: &Container, region: &CellRegion) -> f64 {
    if region.origin.z == 0 {
        return 1.0;
    }
    let footprint = region.extent.footprint();
    if footprint == 0 {
        return 0.0;
    }
    let supported = container
        .grid()
        .occupied_in_layer(region, region.origin.z - 1);
    supported as f64 / footprint as f64
}

/// Finds the first valid corner for `item` in `container`.
///
/// Returns `None` when no corner exists; that is a normal outcome.
pub fn find_bottom_left_back_position(
    container: &Container,
    item: &Item,
    config: &PackingConfig,
) -> Option<SearchHit> {
    let grid = container.grid().extent();
    let extent = container.item_extent(item);

    let max_x = grid.width.checked_sub(extent.width)?;
    let max_y = grid.depth.checked_sub(extent.depth)?;
    let max_z = grid.height.checked_sub(extent.height)?;
    let ys = depth_order(item, max_y, config);

    for x in 0..=max_x {
        for &y in &ys {
            let corner = CellPos::new(x, y, 0);
            if container.is_position_valid(item, corner) {
                debug!(item_id = item.id(), x, y, "Found floor position");
                return Some(SearchHit {
                    corner,
                    pass: SearchPass::Floor,
                    support: 1.0,
                });
            }
        }
    }

    debug!(
        item_id = item.id(),
        container_id = container.id(),
        "No floor position, trying to stack"
    );

    for x in 0..=max_x {
        for &y in &ys {
            let mut z = 1;
            while z <= max_z {
                let region = CellRegion::new(CellPos::new(x, y, z), extent);
                if let Some(run_top) = container.grid().blocking_run_top(&region) {
                    z = run_top + 1;
                    continue;
                }

                let support = support_ratio(container, &region);
                if support >= config.support_ratio {
                    debug!(item_id = item.id(), x, y, z, support, "Found supported position");
                    return Some(SearchHit {
                        corner: region.origin,
                        pass: SearchPass::Stacking,
                        support,
                    });
                }

                // Layers z..z+height are free below the footprint of every
                // higher corner up to z + height, so none of them is supported.
                z += extent.height + 1;
            }
        }
    }

    debug!(item_id = item.id(), container_id = container.id(), "No valid position");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerBlueprint;
    use crate::types::Dimensions;

    fn container(dims: (f64, f64, f64)) -> Container {
        let config = PackingConfig::builder().resolution(1).build();
        ContainerBlueprint::new("c", "A", Dimensions::new(dims.0, dims.1, dims.2))
            .into_inner()
            .instantiate(&config)
            .unwrap()
    }

    fn item(id: &str, dims: (f64, f64, f64), priority: i32) -> Item {
        Item::new(id, id, Dimensions::new(dims.0, dims.1, dims.2), 1.0)
            .into_inner()
            .with_priority(priority)
    }

    fn config() -> PackingConfig {
        PackingConfig::builder().resolution(1).build()
    }

    #[test]
    fn empty_container_uses_corner() {
        let cont = container((100.0, 100.0, 100.0));
        let hit = find_bottom_left_back_position(&cont, &item("a", (50.0, 50.0, 50.0), 9), &config())
            .unwrap();
        assert_eq!(hit.corner, CellPos::new(0, 0, 0));
        assert_eq!(hit.pass, SearchPass::Floor);
    }

    #[test]
    fn low_priority_items_start_at_the_back() {
        let cont = container((100.0, 100.0, 100.0));
        let hit = find_bottom_left_back_position(&cont, &item("a", (50.0, 50.0, 50.0), 5), &config())
            .unwrap();
        assert_eq!(hit.corner, CellPos::new(0, 50, 0));
    }

    #[test]
    fn threshold_controls_depth_direction() {
        let cont = container((10.0, 10.0, 10.0));
        let config = PackingConfig::builder()
            .resolution(1)
            .front_priority_threshold(2)
            .build();
        let hit = find_bottom_left_back_position(&cont, &item("a", (5.0, 5.0, 5.0), 3), &config)
            .unwrap();
        assert_eq!(hit.corner, CellPos::new(0, 0, 0));
    }

    #[test]
    fn floor_is_preferred_over_stacking() {
        let mut cont = container((20.0, 10.0, 20.0));
        cont.place(item("base", (10.0, 10.0, 10.0), 9), CellPos::new(0, 0, 0))
            .unwrap();

        let hit = find_bottom_left_back_position(&cont, &item("b", (10.0, 10.0, 10.0), 9), &config())
            .unwrap();
        assert_eq!(hit.corner, CellPos::new(10, 0, 0));
    }

    #[test]
    fn stacks_on_full_support() {
        let mut cont = container((100.0, 100.0, 50.0));
        cont.place(item("a", (100.0, 100.0, 20.0), 9), CellPos::new(0, 0, 0))
            .unwrap();

        let hit = find_bottom_left_back_position(&cont, &item("b", (100.0, 100.0, 20.0), 3), &config())
            .unwrap();
        assert_eq!(hit.corner, CellPos::new(0, 0, 20));
        assert_eq!(hit.pass, SearchPass::Stacking);
        assert!((hit.support - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_stacking_without_enough_support() {
        // The floor is full, but the only raised surface covers 40% of the footprint.
        let mut cont = container((10.0, 10.0, 20.0));
        cont.place(item("low", (10.0, 6.0, 2.0), 9), CellPos::new(0, 0, 0))
            .unwrap();
        cont.place(item("high", (10.0, 4.0, 5.0), 9), CellPos::new(0, 6, 0))
            .unwrap();

        // Resting on "low" at z = 2 would overlap "high"; resting on "high"
        // at z = 5 leaves only 40% of the footprint supported.
        let top = item("top", (10.0, 10.0, 5.0), 9);
        assert!(find_bottom_left_back_position(&cont, &top, &config()).is_none());

        let lenient = PackingConfig::builder().resolution(1).support_ratio(0.4).build();
        let hit = find_bottom_left_back_position(&cont, &top, &lenient).unwrap();
        assert_eq!(hit.corner, CellPos::new(0, 0, 5));
        assert!((hit.support - 0.4).abs() < 1e-9);
    }

    #[test]
    fn returns_none_when_nothing_fits() {
        let mut cont = container((100.0, 100.0, 100.0));
        cont.place(item("a", (60.0, 60.0, 60.0), 5), CellPos::new(0, 0, 0))
            .unwrap();
        assert!(
            find_bottom_left_back_position(&cont, &item("b", (60.0, 60.0, 60.0), 5), &config())
                .is_none()
        );
    }

    #[test]
    fn returns_none_for_items_larger_than_grid() {
        let cont = container((10.0, 10.0, 10.0));
        assert!(
            find_bottom_left_back_position(&cont, &item("big", (11.0, 1.0, 1.0), 5), &config())
                .is_none()
        );
    }

    #[test]
    fn support_ratio_counts_partial_footprints() {
        let mut cont = container((10.0, 10.0, 10.0));
        cont.place(item("half", (5.0, 10.0, 2.0), 9), CellPos::new(0, 0, 0))
            .unwrap();
        let region = CellRegion::new(
            CellPos::new(0, 0, 2),
            crate::grid::CellExtent::new(10, 10, 1),
        );
        assert!((support_ratio(&cont, &region) - 0.5).abs() < 1e-9);
    }
}
