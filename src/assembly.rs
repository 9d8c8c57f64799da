use std::f32::consts::FRAC_PI_2;

use bevy::{camera::primitives::Aabb, mesh::VertexAttributeValues, prelude::*};

/// Catalog part meshes are authored in millimeters; the scene displays
/// inches. Applied uniformly, exactly once, to every part of every tile.
pub const UNIT_SCALE: f32 = 1.0 / 25.4;

/// Tile footprint in display units. Bases are authored 2in x 2in.
pub const TILE_WIDTH: f32 = 2.0;
pub const TILE_DEPTH: f32 = 2.0;

/// Base-layer height assumed when a tile has no `base` part (~6 mm).
pub const FALLBACK_BASE_HEIGHT: f32 = 0.236;

// ---------------------------------------------------------------------------
// Semantic roles
// ---------------------------------------------------------------------------

/// Semantic role of a part, derived from its slot name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PartRole {
    Base,
    RightWall,
    LeftWall,
    Column,
    Floor,
    Other,
}

impl PartRole {
    /// Ordered, first-match-wins keyword scan: a name containing several
    /// keywords resolves to the earliest entry.
    pub fn classify(part_name: &str) -> Self {
        let name = part_name.to_lowercase();
        if name.contains("base") {
            Self::Base
        } else if name.contains("right wall") {
            Self::RightWall
        } else if name.contains("left wall") {
            Self::LeftWall
        } else if name.contains("column") {
            Self::Column
        } else if name.contains("floor") {
            Self::Floor
        } else {
            Self::Other
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// Extents of a centered part geometry, converted to display units.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct PartMetrics {
    pub width: f32,
    pub depth: f32,
    pub height: f32,
}

impl PartMetrics {
    pub fn from_aabb(aabb: &Aabb) -> Self {
        let size = Vec3::from(aabb.half_extents) * 2.0 * UNIT_SCALE;
        Self {
            width: size.x,
            depth: size.z,
            height: size.y,
        }
    }
}

/// Per-part, per-tile-instance measurement.
#[derive(Clone, Copy, Debug)]
pub struct PartGeometry {
    /// Bounding box of the geometry as loaded, native units.
    pub raw_aabb: Aabb,
    /// Bounding box after centering, native units.
    pub centered_aabb: Aabb,
    /// Centered extents in display units.
    pub metrics: PartMetrics,
}

/// Translate `mesh` so its bounding-box center sits at the local origin,
/// then measure it. Returns `None` for geometry without positions.
///
/// The translation mutates the mesh, so this must run exactly once per
/// loaded instance, and only on an instance the calling tile owns: clone
/// shared assets before centering, or a second tile referencing the same
/// mesh file will see doubly-shifted geometry.
pub fn measure_and_center(mesh: &mut Mesh) -> Option<PartGeometry> {
    let raw_aabb = compute_mesh_aabb(mesh)?;
    translate_positions(mesh, -Vec3::from(raw_aabb.center));
    let centered_aabb = compute_mesh_aabb(mesh)?;
    let metrics = PartMetrics::from_aabb(&centered_aabb);
    Some(PartGeometry {
        raw_aabb,
        centered_aabb,
        metrics,
    })
}

/// Axis-aligned bounds of the mesh's position attribute.
pub fn compute_mesh_aabb(mesh: &Mesh) -> Option<Aabb> {
    let VertexAttributeValues::Float32x3(positions) =
        mesh.attribute(Mesh::ATTRIBUTE_POSITION)?
    else {
        return None;
    };
    let mut iter = positions.iter().map(|p| Vec3::from_array(*p));
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
    Some(Aabb::from_min_max(min, max))
}

fn translate_positions(mesh: &mut Mesh, offset: Vec3) {
    if offset == Vec3::ZERO {
        return;
    }
    if let Some(VertexAttributeValues::Float32x3(positions)) =
        mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION)
    {
        for position in positions.iter_mut() {
            *position = (Vec3::from_array(*position) + offset).to_array();
        }
    }
}

/// Height of the tile's base layer: the measured height of the part whose
/// name classifies as `base`, or the fallback constant when none does.
pub fn base_height<'a>(parts: impl IntoIterator<Item = (&'a str, &'a PartMetrics)>) -> f32 {
    parts
        .into_iter()
        .find(|(name, _)| PartRole::classify(name) == PartRole::Base)
        .map(|(_, metrics)| metrics.height)
        .unwrap_or(FALLBACK_BASE_HEIGHT)
}

// ---------------------------------------------------------------------------
// Placement rules
// ---------------------------------------------------------------------------

/// Local placement of one part inside its tile's group transform.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PartTransform {
    pub position: Vec3,
    /// XYZ Euler angles, radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl PartTransform {
    pub fn to_transform(&self) -> Transform {
        Transform {
            translation: self.position,
            rotation: Quat::from_euler(
                EulerRot::XYZ,
                self.rotation.x,
                self.rotation.y,
                self.rotation.z,
            ),
            scale: self.scale,
        }
    }
}

/// Compute a part's local transform from its centered extents, its slot
/// name, and the height of the tile's base layer.
///
/// Pure: identical inputs always yield the identical transform. Vertical is
/// Y; the tile origin sits at the center of the cell, on the ground.
pub fn compute_part_transform(
    metrics: &PartMetrics,
    part_name: &str,
    base_height: f32,
) -> PartTransform {
    let half_w = TILE_WIDTH / 2.0;
    let half_d = TILE_DEPTH / 2.0;
    let h = metrics.height;

    let (position, rotation) = match PartRole::classify(part_name) {
        // The base rests on the ground, centered in the cell.
        PartRole::Base => (Vec3::new(0.0, h / 2.0, 0.0), Vec3::ZERO),
        // Walls stand on top of the base at the cell edge; the left wall
        // runs along the perpendicular axis, a quarter turn about vertical.
        PartRole::RightWall => (
            Vec3::new(half_w, base_height + h / 2.0, 0.0),
            Vec3::ZERO,
        ),
        PartRole::LeftWall => (
            Vec3::new(0.0, base_height + h / 2.0, half_d),
            Vec3::new(0.0, FRAC_PI_2, 0.0),
        ),
        // Columns fill the corner where both walls meet.
        PartRole::Column => (
            Vec3::new(half_w, base_height + h / 2.0, half_d),
            Vec3::new(-FRAC_PI_2, 0.0, FRAC_PI_2),
        ),
        PartRole::Floor => (Vec3::new(0.0, base_height + h / 2.0, 0.0), Vec3::ZERO),
        PartRole::Other => (Vec3::ZERO, Vec3::ZERO),
    };

    PartTransform {
        position,
        rotation,
        scale: Vec3::splat(UNIT_SCALE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn metrics(width: f32, depth: f32, height: f32) -> PartMetrics {
        PartMetrics {
            width,
            depth,
            height,
        }
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPS
    }

    #[test]
    fn classification_is_ordered_first_match_wins() {
        assert_eq!(PartRole::classify("base"), PartRole::Base);
        assert_eq!(PartRole::classify("Right Wall"), PartRole::RightWall);
        assert_eq!(PartRole::classify("left wall"), PartRole::LeftWall);
        assert_eq!(PartRole::classify("corner column"), PartRole::Column);
        assert_eq!(PartRole::classify("stone floor"), PartRole::Floor);
        assert_eq!(PartRole::classify("decoration"), PartRole::Other);
        // `base` outranks later keywords even when both appear
        assert_eq!(PartRole::classify("right wall base"), PartRole::Base);
        assert_eq!(PartRole::classify("floor column"), PartRole::Column);
    }

    #[test]
    fn transform_is_deterministic() {
        let m = metrics(2.0, 2.0, 1.5);
        let a = compute_part_transform(&m, "right wall", 0.25);
        let b = compute_part_transform(&m, "right wall", 0.25);
        assert_eq!(a, b);
    }

    #[test]
    fn base_sits_at_half_its_height() {
        let t = compute_part_transform(&metrics(2.0, 2.0, 0.3), "base", 0.3);
        assert!(approx(t.position, Vec3::new(0.0, 0.15, 0.0)));
        assert!(approx(t.rotation, Vec3::ZERO));
    }

    #[test]
    fn wall_stands_on_the_base() {
        // Base height h, wall height w: wall center at h + w/2.
        let h = 0.3;
        let w = 1.8;
        let t = compute_part_transform(&metrics(2.0, 0.2, w), "right wall", h);
        assert!((t.position.y - (h + w / 2.0)).abs() < EPS);
        assert!((t.position.x - TILE_WIDTH / 2.0).abs() < EPS);
        assert!((t.position.z).abs() < EPS);
    }

    #[test]
    fn left_wall_is_a_quarter_turn_from_right_wall() {
        let m = metrics(2.0, 0.2, 1.8);
        let right = compute_part_transform(&m, "right wall", 0.3);
        let left = compute_part_transform(&m, "left wall", 0.3);
        // Same vertical placement on the perpendicular edge, rotated 90°
        // about the vertical axis.
        assert!((left.position.y - right.position.y).abs() < EPS);
        assert!((left.position.z - TILE_DEPTH / 2.0).abs() < EPS);
        assert!(approx(left.rotation - right.rotation, Vec3::new(0.0, FRAC_PI_2, 0.0)));
    }

    #[test]
    fn column_fills_the_corner() {
        let t = compute_part_transform(&metrics(0.3, 0.3, 1.8), "column", 0.3);
        assert!((t.position.x - TILE_WIDTH / 2.0).abs() < EPS);
        assert!((t.position.z - TILE_DEPTH / 2.0).abs() < EPS);
        assert!(approx(t.rotation, Vec3::new(-FRAC_PI_2, 0.0, FRAC_PI_2)));
    }

    #[test]
    fn floor_rests_on_the_base_with_no_offset() {
        let t = compute_part_transform(&metrics(2.0, 2.0, 0.1), "wood floor", 0.3);
        assert!(approx(t.position, Vec3::new(0.0, 0.35, 0.0)));
        assert!(approx(t.rotation, Vec3::ZERO));
    }

    #[test]
    fn unknown_parts_sit_at_the_tile_origin() {
        let t = compute_part_transform(&metrics(1.0, 1.0, 1.0), "banner", 0.3);
        assert!(approx(t.position, Vec3::ZERO));
        assert!(approx(t.rotation, Vec3::ZERO));
    }

    #[test]
    fn scale_is_uniform_for_every_role() {
        for name in ["base", "right wall", "left wall", "column", "floor", "misc"] {
            let t = compute_part_transform(&metrics(1.0, 1.0, 1.0), name, 0.3);
            assert_eq!(t.scale, Vec3::splat(UNIT_SCALE));
        }
    }

    #[test]
    fn base_height_prefers_the_base_part() {
        let base = metrics(2.0, 2.0, 0.25);
        let wall = metrics(2.0, 0.2, 1.8);
        let parts = [("cut-stone base", &base), ("right wall", &wall)];
        assert!((base_height(parts) - 0.25).abs() < EPS);
    }

    #[test]
    fn base_height_falls_back_without_a_base() {
        let wall = metrics(2.0, 0.2, 1.8);
        let parts = [("right wall", &wall)];
        assert!((base_height(parts) - FALLBACK_BASE_HEIGHT).abs() < EPS);
    }

    #[test]
    fn centering_normalizes_an_offset_mesh() {
        // 50.8mm x 6mm x 50.8mm cuboid pushed away from the origin.
        let mut mesh = Mesh::from(Cuboid::new(50.8, 6.0, 50.8));
        translate_positions(&mut mesh, Vec3::new(30.0, -12.0, 4.5));

        let geometry = measure_and_center(&mut mesh).unwrap();
        assert!(approx(
            Vec3::from(geometry.raw_aabb.center),
            Vec3::new(30.0, -12.0, 4.5)
        ));
        assert!(Vec3::from(geometry.centered_aabb.center).length() < EPS);

        // Extents convert native mm to display inches.
        assert!((geometry.metrics.width - 2.0).abs() < 1e-4);
        assert!((geometry.metrics.depth - 2.0).abs() < 1e-4);
        assert!((geometry.metrics.height - 6.0 * UNIT_SCALE).abs() < 1e-4);
    }

    #[test]
    fn centering_an_already_centered_mesh_is_stable() {
        let mut mesh = Mesh::from(Cuboid::new(50.8, 6.0, 50.8));
        let first = measure_and_center(&mut mesh).unwrap();
        let second = measure_and_center(&mut mesh).unwrap();
        assert!(approx(
            Vec3::from(second.centered_aabb.center),
            Vec3::from(first.centered_aabb.center)
        ));
        assert_eq!(first.metrics, second.metrics);
    }

    #[test]
    fn geometry_without_positions_is_not_measurable() {
        use bevy::mesh::PrimitiveTopology;

        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, default());
        assert!(measure_and_center(&mut mesh).is_none());
    }
}
