use bevy::prelude::*;
use bevy_infinite_grid::{InfiniteGrid, InfiniteGridPlugin, InfiniteGridSettings};

/// Width of one grid cell in world units. Placement and rendering share this
/// constant; every tile occupies exactly one cell.
pub const CELL_SIZE: f32 = 2.0;

pub struct GridPlugin;

impl Plugin for GridPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InfiniteGridPlugin)
            .init_resource::<GridSettings>()
            .add_systems(Startup, spawn_grid)
            .add_systems(Update, sync_grid_settings);
    }
}

// ---------------------------------------------------------------------------
// Grid display settings
// ---------------------------------------------------------------------------

#[derive(Resource)]
pub struct GridSettings {
    pub visible: bool,
    /// Minor-line spacing. Defaults to one cell so the rendered grid marks
    /// the same cells placement snaps to.
    pub scale: f32,
    pub major_line_color: Color,
    pub minor_line_color: Color,
    pub fadeout_distance: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            visible: true,
            scale: CELL_SIZE,
            major_line_color: Color::srgb(0.25, 0.25, 0.25),
            minor_line_color: Color::srgb(0.1, 0.1, 0.1),
            fadeout_distance: 150.0,
        }
    }
}

fn spawn_grid(mut commands: Commands) {
    commands.spawn(InfiniteGrid);
}

fn sync_grid_settings(
    grid: Res<GridSettings>,
    mut grids: Query<(&mut InfiniteGridSettings, &mut Visibility), With<InfiniteGrid>>,
) {
    if !grid.is_changed() {
        return;
    }
    for (mut settings, mut visibility) in &mut grids {
        settings.scale = grid.scale;
        settings.major_line_color = grid.major_line_color;
        settings.minor_line_color = grid.minor_line_color;
        settings.fadeout_distance = grid.fadeout_distance;
        *visibility = if grid.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

// ---------------------------------------------------------------------------
// Coordinate conversions
// ---------------------------------------------------------------------------

/// Discrete cell address on the horizontal plane. Grid `x` runs along world
/// X, grid `y` along world Z.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

/// Snap a continuous position to the nearest grid-aligned coordinate,
/// independently per axis. Idempotent: snapping a snapped value is a no-op.
pub fn snap_to_grid(position: Vec3, cell_size: f32) -> Vec3 {
    Vec3::new(
        (position.x / cell_size).round() * cell_size,
        (position.y / cell_size).round() * cell_size,
        (position.z / cell_size).round() * cell_size,
    )
}

/// Cell containing a continuous world position.
pub fn world_to_cell(position: Vec3) -> GridCell {
    GridCell {
        x: (position.x / CELL_SIZE).round() as i32,
        y: (position.z / CELL_SIZE).round() as i32,
    }
}

/// World position of a cell's center, at the given height.
pub fn cell_to_world(cell: GridCell, height: f32) -> Vec3 {
    Vec3::new(cell.x as f32 * CELL_SIZE, height, cell.y as f32 * CELL_SIZE)
}

/// Intersect a pointer ray with the horizontal plane at `plane_height`.
///
/// Returns `None` when the ray runs parallel to the plane or the
/// intersection lies behind the ray origin. Callers must treat `None` as
/// "no valid drop position" and abort placement; defaulting to the origin
/// would silently place tiles at an unintended cell.
pub fn project_ray_to_ground(ray: Ray3d, plane_height: f32) -> Option<Vec3> {
    let direction = *ray.direction;
    if direction.y.abs() < 1e-4 {
        return None;
    }
    let t = (plane_height - ray.origin.y) / direction.y;
    if t < 0.0 {
        return None;
    }
    Some(ray.origin + direction * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(origin: Vec3, direction: Vec3) -> Ray3d {
        Ray3d {
            origin,
            direction: Dir3::new(direction).unwrap(),
        }
    }

    #[test]
    fn snap_rounds_to_nearest_cell() {
        assert_eq!(
            snap_to_grid(Vec3::new(2.9, 0.0, -1.2), CELL_SIZE),
            Vec3::new(2.0, 0.0, -2.0)
        );
        assert_eq!(
            snap_to_grid(Vec3::new(1.0, 0.0, 1.0), CELL_SIZE),
            Vec3::new(2.0, 0.0, 2.0)
        );
    }

    #[test]
    fn snap_is_idempotent() {
        for p in [
            Vec3::new(0.3, 1.7, -5.1),
            Vec3::new(-0.99, 0.0, 0.99),
            Vec3::new(123.45, -67.8, 9.0),
            Vec3::ZERO,
        ] {
            let once = snap_to_grid(p, CELL_SIZE);
            assert_eq!(snap_to_grid(once, CELL_SIZE), once);
        }
    }

    #[test]
    fn cell_roundtrip() {
        let cell = GridCell { x: -3, y: 7 };
        assert_eq!(world_to_cell(cell_to_world(cell, 0.0)), cell);
        assert_eq!(
            world_to_cell(Vec3::new(-6.4, 0.0, 13.9)),
            GridCell { x: -3, y: 7 }
        );
    }

    #[test]
    fn projection_hits_ground_plane() {
        let hit = project_ray_to_ground(
            ray(Vec3::new(0.0, 10.0, 10.0), Vec3::new(0.0, -1.0, -1.0)),
            0.0,
        )
        .unwrap();
        assert!((hit - Vec3::ZERO).length() < 1e-4);
    }

    #[test]
    fn projection_respects_plane_height() {
        let hit = project_ray_to_ground(
            ray(Vec3::new(0.0, 4.0, 0.0), Vec3::new(1.0, -1.0, 0.0)),
            2.0,
        )
        .unwrap();
        assert!((hit - Vec3::new(2.0, 2.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn parallel_ray_yields_no_position() {
        // Camera looking along the plane: no valid drop position.
        let result = project_ray_to_ground(
            ray(Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            0.0,
        );
        assert!(result.is_none());
    }

    #[test]
    fn intersection_behind_origin_yields_no_position() {
        // Camera above the plane looking up: the plane is behind the ray.
        let result = project_ray_to_ground(
            ray(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 1.0, 0.1)),
            0.0,
        );
        assert!(result.is_none());
    }
}
