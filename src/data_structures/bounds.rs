//! Axis-aligned bounding boxes.

use cgmath::Vector3;

use crate::data_structures::instance::Instance;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all `points`, `None` when there are none.
    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |aabb, p| aabb.including(p)))
    }

    pub fn including(self, p: Vector3<f32>) -> Self {
        Self {
            min: Vector3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            max: Vector3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        }
    }

    pub fn union(self, other: Aabb) -> Self {
        self.including(other.min).including(other.max)
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn corners(&self) -> [Vector3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vector3::new(a.x, a.y, a.z),
            Vector3::new(b.x, a.y, a.z),
            Vector3::new(a.x, b.y, a.z),
            Vector3::new(b.x, b.y, a.z),
            Vector3::new(a.x, a.y, b.z),
            Vector3::new(b.x, a.y, b.z),
            Vector3::new(a.x, b.y, b.z),
            Vector3::new(b.x, b.y, b.z),
        ]
    }

    /// Box around the eight transformed corners.
    pub fn transformed(&self, transform: &Instance) -> Self {
        let [first, rest @ ..] = self.corners().map(|c| transform.transform_point(c));
        rest.into_iter()
            .fold(Self::new(first, first), |aabb, p| aabb.including(p))
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3};

    use super::*;

    #[test]
    fn empty_point_set_has_no_box() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn rotated_box_grows_to_cover_corners() {
        let aabb = Aabb::new(Vector3::new(-1.0, 0.0, -1.0), Vector3::new(1.0, 2.0, 1.0));
        let mut t = Instance::new();
        t.rotation = cgmath::Quaternion::from_angle_y(Deg(45.0));

        let rotated = aabb.transformed(&t);
        let half_diagonal = 2.0_f32.sqrt();
        assert!((rotated.max.x - half_diagonal).abs() < 1e-5);
        assert!((rotated.min.z + half_diagonal).abs() < 1e-5);
        assert!((rotated.max.y - 2.0).abs() < 1e-5);
    }
}
