use std::f32::consts::FRAC_PI_2;

use bevy::{
    picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility},
    prelude::*,
    ui::UiGlobalTransform,
};
use bowerbird_camera::OrbitCameraSettings;

use crate::{
    PointerBlocking,
    grid::{self, GridCell},
    part_select::PartSelectionState,
    placement::{PlacementOutcome, TileId, TilePlacementStore, TilePosition},
    tile::TileRoot,
};

pub struct DragDropPlugin;

impl Plugin for DragDropPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DragPayload>()
            .init_resource::<TileDragState>()
            .init_resource::<SelectedTile>()
            .add_systems(
                Update,
                (
                    finish_blueprint_drop,
                    drag_placed_tiles,
                    tile_keyboard_ops,
                    suppress_camera_during_drag,
                ),
            );
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Blueprint id picked up from the catalog panel, carried until the pointer
/// is released.
#[derive(Resource, Default)]
pub struct DragPayload(pub Option<String>);

/// Live drag of an already-placed tile.
#[derive(Resource, Default)]
pub struct TileDragState {
    pub active: Option<TileId>,
}

/// Tile targeted by keyboard operations (rotate, delete). Set by clicking a
/// tile in the viewport.
#[derive(Resource, Default)]
pub struct SelectedTile(pub Option<TileId>);

/// A blueprint was dropped on a valid, snapped grid cell. Opens the
/// part-selection flow.
#[derive(Event, Debug, Clone)]
pub struct BlueprintDropped {
    pub blueprint_id: String,
    pub cell: GridCell,
}

// ---------------------------------------------------------------------------
// Blueprint drop
// ---------------------------------------------------------------------------

fn finish_blueprint_drop(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    camera_query: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
    chrome: Query<(&ComputedNode, &UiGlobalTransform), With<PointerBlocking>>,
    mut payload: ResMut<DragPayload>,
    mut commands: Commands,
) {
    if !mouse.just_released(MouseButton::Left) {
        return;
    }
    let Some(blueprint_id) = payload.0.take() else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    if cursor_over_chrome(cursor, &chrome) {
        return;
    }
    let Ok((camera, cam_tf)) = camera_query.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(cam_tf, cursor) else {
        return;
    };
    let Some(hit) = grid::project_ray_to_ground(ray, 0.0) else {
        // Degenerate view angle: abort rather than guessing a cell.
        warn!("drop aborted: pointer ray does not reach the ground plane");
        return;
    };
    let cell = grid::world_to_cell(grid::snap_to_grid(hit, grid::CELL_SIZE));
    commands.trigger(BlueprintDropped { blueprint_id, cell });
}

// ---------------------------------------------------------------------------
// Dragging placed tiles
// ---------------------------------------------------------------------------

fn drag_placed_tiles(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    camera_query: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
    chrome: Query<(&ComputedNode, &UiGlobalTransform), With<PointerBlocking>>,
    tile_roots: Query<&TileRoot>,
    parents: Query<&ChildOf>,
    payload: Res<DragPayload>,
    dialog: Res<PartSelectionState>,
    mut drag: ResMut<TileDragState>,
    mut selected: ResMut<SelectedTile>,
    mut store: ResMut<TilePlacementStore>,
    mut ray_cast: MeshRayCast,
) {
    if payload.0.is_some() || dialog.active.is_some() {
        drag.active = None;
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, cam_tf)) = camera_query.single() else {
        return;
    };

    if mouse.just_pressed(MouseButton::Left) && !cursor_over_chrome(cursor, &chrome) {
        let mut picked = None;
        if let Ok(ray) = camera.viewport_to_world(cam_tf, cursor) {
            let settings = MeshRayCastSettings::default().with_visibility(RayCastVisibility::Any);
            // Skip non-tile hits (the ground plane) and walk child meshes
            // up to their tile root.
            for (hit_entity, _) in ray_cast.cast_ray(ray, &settings) {
                if let Some(id) = find_tile_ancestor(*hit_entity, &tile_roots, &parents) {
                    picked = Some(id);
                    break;
                }
            }
        }
        selected.0 = picked;
        drag.active = picked;
    }

    if mouse.just_released(MouseButton::Left) {
        drag.active = None;
        return;
    }

    let Some(id) = drag.active else {
        return;
    };
    if !mouse.pressed(MouseButton::Left) {
        drag.active = None;
        return;
    }

    // Live move: every step revalidated by the store, so dragging across an
    // occupied cell leaves the tile at its last accepted position.
    let Ok(ray) = camera.viewport_to_world(cam_tf, cursor) else {
        return;
    };
    let Some(hit) = grid::project_ray_to_ground(ray, 0.0) else {
        return;
    };
    let cell = grid::world_to_cell(grid::snap_to_grid(hit, grid::CELL_SIZE));
    let Some(tile) = store.get(id) else {
        drag.active = None;
        return;
    };
    if tile.position().cell() == cell {
        return;
    }
    let target = TilePosition {
        x: cell.x,
        y: cell.y,
        z: tile.position().z,
    };
    match store.update_tile_position(id, target) {
        PlacementOutcome::Accepted => {}
        PlacementOutcome::RejectedCollision => {
            debug!("cell ({}, {}) occupied; tile stays put", cell.x, cell.y);
        }
        PlacementOutcome::NotFound => drag.active = None,
    }
}

// ---------------------------------------------------------------------------
// Keyboard operations
// ---------------------------------------------------------------------------

fn tile_keyboard_ops(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut selected: ResMut<SelectedTile>,
    mut store: ResMut<TilePlacementStore>,
    mut commands: Commands,
) {
    let Some(id) = selected.0 else {
        return;
    };

    if keyboard.just_pressed(KeyCode::KeyR) {
        let Some(tile) = store.get(id) else {
            selected.0 = None;
            return;
        };
        let target = tile.rotation() + FRAC_PI_2;
        if store.rotate_tile(id, target) == PlacementOutcome::NotFound {
            selected.0 = None;
        }
    }

    if keyboard.just_pressed(KeyCode::Delete) || keyboard.just_pressed(KeyCode::KeyX) {
        if let Some(entity) = store.renderable(id) {
            commands.entity(entity).despawn();
        }
        store.remove_tile(id);
        selected.0 = None;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn suppress_camera_during_drag(
    payload: Res<DragPayload>,
    drag: Res<TileDragState>,
    mut cameras: Query<&mut OrbitCameraSettings>,
) {
    let busy = payload.0.is_some() || drag.active.is_some();
    for mut settings in &mut cameras {
        if settings.enabled == busy {
            settings.enabled = !busy;
        }
    }
}

/// True when the cursor sits inside any pointer-blocking chrome region (the
/// catalog panel, an open dialog).
fn cursor_over_chrome(
    cursor: Vec2,
    chrome: &Query<(&ComputedNode, &UiGlobalTransform), With<PointerBlocking>>,
) -> bool {
    chrome.iter().any(|(computed, tf)| {
        let scale = computed.inverse_scale_factor();
        let center = tf.translation * scale;
        let size = computed.size() * scale;
        let half = size / 2.0;
        cursor.x >= center.x - half.x
            && cursor.x <= center.x + half.x
            && cursor.y >= center.y - half.y
            && cursor.y <= center.y + half.y
    })
}

/// Walk up the `ChildOf` hierarchy from a raycast hit to the owning tile
/// root, if any. Part meshes are direct children today, but assembled
/// composites may nest deeper.
fn find_tile_ancestor(
    mut entity: Entity,
    tile_roots: &Query<&TileRoot>,
    parents: &Query<&ChildOf>,
) -> Option<TileId> {
    loop {
        if let Ok(root) = tile_roots.get(entity) {
            return Some(root.id);
        }
        match parents.get(entity) {
            Ok(child_of) => entity = child_of.0,
            Err(_) => return None,
        }
    }
}
