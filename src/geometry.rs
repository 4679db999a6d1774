//! Geometric helpers in real units.
//!
//! The search itself works on grid cells. These functions check placed items
//! against each other and against container bounds in real coordinates, which
//! is what callers see in the result.

use crate::model::PlacedItem;
use crate::types::{BoundingBox, Dimensional, Dimensions, Position, Positioned};

/// Checks if two placed items share interior volume.
///
/// Touching faces are not an intersection.
pub fn intersects(a: &PlacedItem, b: &PlacedItem, tolerance: f64) -> bool {
    a.bounding_box().intersects(&b.bounding_box(), tolerance)
}

/// Length of the overlap of two intervals, at least 0.0.
///
/// # Examples
/// ```
/// use stowplan::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// assert_eq!(overlap_1d(0.0, 1.0, 2.0, 3.0), 0.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Overlap area of the footprints of two placed items in the XY plane.
pub fn overlap_area_xy(a: &PlacedItem, b: &PlacedItem) -> f64 {
    let (pa, da) = (a.position(), a.dimensions());
    let (pb, db) = (b.position(), b.dimensions());
    let x = overlap_1d(pa.x, pa.x + da.width, pb.x, pb.x + db.width);
    let y = overlap_1d(pa.y, pa.y + da.depth, pb.y, pb.y + db.depth);
    x * y
}

/// Checks if a box at `position` with `dims` lies inside a container of `container`.
pub fn fits_inside(container: Dimensions, position: Position, dims: Dimensions, tolerance: f64) -> bool {
    BoundingBox::of_container(container)
        .contains(&BoundingBox::from_position_and_dims(position, dims), tolerance)
}

/// Returns the first pair of indices whose items intersect.
pub fn first_overlap(placed: &[PlacedItem], tolerance: f64) -> Option<(usize, usize)> {
    placed.iter().enumerate().find_map(|(i, a)| {
        placed[i + 1..]
            .iter()
            .position(|b| intersects(a, b, tolerance))
            .map(|offset| (i, i + 1 + offset))
    })
}

/// Footprint area of `item` resting directly on the tops of `others`.
///
/// Items on the floor report their full footprint.
pub fn supported_area(item: &PlacedItem, others: &[PlacedItem], tolerance: f64) -> f64 {
    let bottom = item.position().z;
    if bottom <= tolerance {
        return item.dimensions().base_area();
    }
    others
        .iter()
        .filter(|o| !std::ptr::eq(*o, item))
        .filter(|o| (o.position().z + o.dimensions().height - bottom).abs() <= tolerance)
        .map(|o| overlap_area_xy(item, o))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellPos;
    use crate::model::{Container, ContainerBlueprint, Item};
    use crate::optimizer::PackingConfig;
    use crate::types::EPSILON_GENERAL;

    fn container() -> Container {
        let config = PackingConfig::builder().resolution(1).build();
        ContainerBlueprint::new("c", "A", Dimensions::new(20.0, 20.0, 20.0))
            .into_inner()
            .instantiate(&config)
            .unwrap()
    }

    fn item(id: &str, dims: (f64, f64, f64)) -> Item {
        Item::new(id, id, Dimensions::new(dims.0, dims.1, dims.2), 1.0).into_inner()
    }

    #[test]
    fn touching_items_do_not_intersect() {
        let mut cont = container();
        cont.place(item("a", (10.0, 10.0, 10.0)), CellPos::new(0, 0, 0))
            .unwrap();
        cont.place(item("b", (10.0, 10.0, 10.0)), CellPos::new(10, 0, 0))
            .unwrap();
        cont.place(item("c", (10.0, 10.0, 5.0)), CellPos::new(0, 0, 10))
            .unwrap();

        let placed = cont.placed();
        assert!(!intersects(&placed[0], &placed[1], EPSILON_GENERAL));
        assert!(first_overlap(placed, EPSILON_GENERAL).is_none());
    }

    #[test]
    fn preassigned_overlap_is_detected() {
        let mut cont = container();
        cont.place(item("a", (10.0, 10.0, 10.0)), CellPos::new(0, 0, 0))
            .unwrap();
        let fixed = item("p", (4.0, 4.0, 4.0)).with_position(Position::new(8.0, 8.0, 0.0));
        cont.attach_preassigned(fixed, EPSILON_GENERAL).unwrap();

        assert_eq!(first_overlap(cont.placed(), EPSILON_GENERAL), Some((0, 1)));
        assert!((overlap_area_xy(&cont.placed()[0], &cont.placed()[1]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn supported_area_sums_tops_at_the_same_height() {
        let mut cont = container();
        cont.place(item("left", (10.0, 20.0, 5.0)), CellPos::new(0, 0, 0))
            .unwrap();
        cont.place(item("right", (10.0, 20.0, 8.0)), CellPos::new(10, 0, 0))
            .unwrap();
        cont.place(item("top", (20.0, 20.0, 2.0)), CellPos::new(0, 0, 8))
            .unwrap();

        let placed = cont.placed();
        assert!((supported_area(&placed[0], placed, EPSILON_GENERAL) - 200.0).abs() < 1e-9);
        assert!((supported_area(&placed[2], placed, EPSILON_GENERAL) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn fits_inside_container_bounds() {
        let dims = Dimensions::new(10.0, 10.0, 10.0);
        let cube = Dimensions::new(5.0, 5.0, 5.0);
        assert!(fits_inside(dims, Position::new(5.0, 5.0, 5.0), cube, EPSILON_GENERAL));
        assert!(!fits_inside(dims, Position::new(5.5, 0.0, 0.0), cube, EPSILON_GENERAL));
    }
}
