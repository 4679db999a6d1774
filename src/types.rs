//! Common types and traits for 3D placement.
//!
//! Real-unit value types shared by the model, the search and the API layer.
//! Grid-cell coordinates live in [`crate::grid`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Smallest accepted length along any axis, in real units.
pub const MIN_DIMENSION: f64 = 1.0;

/// Smallest accepted item mass.
pub const MIN_MASS: f64 = 0.1;

/// Extent of an item or container in real units.
///
/// # Examples
/// ```
/// use stowplan::types::Dimensions;
///
/// let dims = Dimensions::new(10.0, 20.0, 30.0);
/// assert_eq!(dims.volume(), 6000.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dimensions {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Dimensions {
    #[inline]
    pub const fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    /// Product of all three axes.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.width * self.depth * self.height
    }

    /// Footprint area (width × depth).
    #[inline]
    pub fn base_area(&self) -> f64 {
        self.width * self.depth
    }

    /// Checks if these dimensions fit inside `outer` on every axis.
    ///
    /// No rotation is considered.
    #[inline]
    pub fn fits_within(&self, outer: &Self, tolerance: f64) -> bool {
        self.width <= outer.width + tolerance
            && self.depth <= outer.depth + tolerance
            && self.height <= outer.height + tolerance
    }
}

/// Corner of a placed item (lowest x, y and z), container-local, in real units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Finite and non-negative on every axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }

    /// Moves the position by the given dimensions.
    #[inline]
    pub fn offset_by(&self, dims: &Dimensions) -> Self {
        Self::new(self.x + dims.width, self.y + dims.depth, self.z + dims.height)
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Dimensions;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }

    /// Checks if this object fits in a container with the given dimensions.
    fn fits_in(&self, container_dims: &Dimensions, tolerance: f64) -> bool {
        self.dimensions().fits_within(container_dims, tolerance)
    }
}

/// Trait for objects with a fixed position inside a container.
pub trait Positioned {
    /// Returns the position (lowest corner).
    fn position(&self) -> Position;
}

/// Represents an Axis-Aligned Bounding Box (AABB) in real units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Position,
    /// Maximum corner (position + dimensions)
    pub max: Position,
}

impl BoundingBox {
    #[inline]
    pub fn from_position_and_dims(position: Position, dims: Dimensions) -> Self {
        Self {
            min: position,
            max: position.offset_by(&dims),
        }
    }

    /// The box spanned by a container, anchored at the origin.
    #[inline]
    pub fn of_container(dims: Dimensions) -> Self {
        Self::from_position_and_dims(Position::origin(), dims)
    }

    /// Checks if two bounding boxes share interior volume.
    ///
    /// Touching faces do not count as an intersection.
    #[inline]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max.x <= other.min.x + tolerance
            || other.max.x <= self.min.x + tolerance
            || self.max.y <= other.min.y + tolerance
            || other.max.y <= self.min.y + tolerance
            || self.max.z <= other.min.z + tolerance
            || other.max.z <= self.min.z + tolerance)
    }

    /// Checks if `inner` lies completely inside this box.
    #[inline]
    pub fn contains(&self, inner: &Self, tolerance: f64) -> bool {
        inner.min.x >= self.min.x - tolerance
            && inner.min.y >= self.min.y - tolerance
            && inner.min.z >= self.min.z - tolerance
            && inner.max.x <= self.max.x + tolerance
            && inner.max.y <= self.max.y + tolerance
            && inner.max.z <= self.max.z + tolerance
    }
}

/// Normalization helpers shared by items and containers.
pub mod normalization {
    /// Raises `value` to `min` when it is smaller, non-positive or not finite.
    ///
    /// Returns the applied value and whether it differs from the input.
    pub fn at_least(value: f64, min: f64) -> (f64, bool) {
        if !value.is_finite() || value < min {
            (min, true)
        } else {
            (value, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_volume_and_area() {
        let dims = Dimensions::new(10.0, 20.0, 30.0);
        assert!((dims.volume() - 6000.0).abs() < EPSILON_GENERAL);
        assert!((dims.base_area() - 200.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_dimensions_fits_within() {
        let small = Dimensions::new(5.0, 5.0, 5.0);
        let large = Dimensions::new(10.0, 10.0, 10.0);

        assert!(small.fits_within(&large, EPSILON_GENERAL));
        assert!(!large.fits_within(&small, EPSILON_GENERAL));
        assert!(!Dimensions::new(200.0, 50.0, 50.0).fits_within(
            &Dimensions::new(100.0, 100.0, 100.0),
            EPSILON_GENERAL
        ));
    }

    #[test]
    fn test_position_validity() {
        assert!(Position::origin().is_valid());
        assert!(!Position::new(-1.0, 0.0, 0.0).is_valid());
        assert!(!Position::new(0.0, f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounding_box_intersects() {
        let cube = Dimensions::new(10.0, 10.0, 10.0);
        let a = BoundingBox::from_position_and_dims(Position::origin(), cube);
        let b = BoundingBox::from_position_and_dims(Position::new(5.0, 5.0, 5.0), cube);
        let c = BoundingBox::from_position_and_dims(Position::new(10.0, 0.0, 0.0), cube);

        assert!(a.intersects(&b, EPSILON_GENERAL));
        // shared face only
        assert!(!a.intersects(&c, EPSILON_GENERAL));
    }

    #[test]
    fn test_bounding_box_contains() {
        let outer = BoundingBox::of_container(Dimensions::new(100.0, 100.0, 100.0));
        let inside = BoundingBox::from_position_and_dims(
            Position::new(50.0, 50.0, 50.0),
            Dimensions::new(50.0, 50.0, 50.0),
        );
        let poking_out = BoundingBox::from_position_and_dims(
            Position::new(60.0, 0.0, 0.0),
            Dimensions::new(50.0, 50.0, 50.0),
        );
        assert!(outer.contains(&inside, EPSILON_GENERAL));
        assert!(!outer.contains(&poking_out, EPSILON_GENERAL));
    }

    #[test]
    fn test_normalization_at_least() {
        assert_eq!(normalization::at_least(5.0, 1.0), (5.0, false));
        assert_eq!(normalization::at_least(0.0, 1.0), (1.0, true));
        assert_eq!(normalization::at_least(-3.0, 1.0), (1.0, true));
        assert_eq!(normalization::at_least(f64::NAN, 0.1), (0.1, true));
        assert_eq!(normalization::at_least(1.0, 1.0), (1.0, false));
    }
}
