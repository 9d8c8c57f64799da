use bevy::{asset::LoadState, gltf::GltfAssetLabel, prelude::*};

use crate::{
    assembly,
    grid::{self, GridCell},
    placement::{AddOutcome, NewTile, TilePlacementStore, TileId, TilePosition},
};

pub struct TilePlugin;

impl Plugin for TilePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_tile_assets)
            .add_systems(Update, (assemble_loaded_tiles, sync_tile_transforms))
            .add_observer(on_place_tile);
    }
}

// ---------------------------------------------------------------------------
// Components & events
// ---------------------------------------------------------------------------

/// Root entity of a placed tile's renderable group. Part meshes spawn as
/// children once their geometry resolves.
#[derive(Component)]
pub struct TileRoot {
    pub id: TileId,
}

/// Part meshes still loading for a tile. The tile renders nothing until
/// every handle resolves; the component is removed after assembly.
#[derive(Component)]
pub struct PendingParts {
    handles: Vec<Handle<Mesh>>,
    /// Slot names aligned with `handles`, driving the placement rules.
    names: Vec<String>,
}

/// A confirmed part selection ready to become a placed tile.
#[derive(Event, Debug, Clone)]
pub struct PlaceTileRequest {
    pub blueprint_id: String,
    pub cell: GridCell,
    /// Mesh-file addresses in slot order.
    pub part_references: Vec<String>,
    /// Slot names in slot order.
    pub part_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// Shared assets
// ---------------------------------------------------------------------------

#[derive(Resource)]
pub struct TileAssets {
    /// Substituted when a part's mesh address fails to resolve. Native
    /// units: a 2in x 6mm x 2in slab.
    pub fallback_mesh: Handle<Mesh>,
    pub part_material: Handle<StandardMaterial>,
}

fn setup_tile_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let fallback_mesh = meshes.add(Cuboid::new(50.8, 6.0, 50.8));
    let part_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.25, 0.35, 0.8),
        perceptual_roughness: 0.5,
        metallic: 0.2,
        double_sided: true,
        cull_mode: None,
        ..default()
    });
    commands.insert_resource(TileAssets {
        fallback_mesh,
        part_material,
    });
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

fn on_place_tile(
    event: On<PlaceTileRequest>,
    mut store: ResMut<TilePlacementStore>,
    asset_server: Res<AssetServer>,
    mut commands: Commands,
) {
    let outcome = store.add_tile(NewTile {
        blueprint_id: event.blueprint_id.clone(),
        position: TilePosition::at_cell(event.cell),
        rotation: 0.0,
        part_references: event.part_references.clone(),
    });
    let id = match outcome {
        AddOutcome::Accepted(id) => id,
        AddOutcome::RejectedCollision => {
            warn!(
                "cell ({}, {}) is already occupied; tile not placed",
                event.cell.x, event.cell.y
            );
            return;
        }
    };

    // Part meshes load independently and concurrently; assembly waits on
    // all of them, but other tiles and the store never do.
    let handles = event
        .part_references
        .iter()
        .map(|address| load_part_mesh(&asset_server, address))
        .collect();

    let entity = commands
        .spawn((
            Name::new(format!("Tile {}", event.blueprint_id)),
            TileRoot { id },
            Transform::from_translation(grid::cell_to_world(event.cell, 0.0)),
            Visibility::default(),
            PendingParts {
                handles,
                names: event.part_names.clone(),
            },
        ))
        .id();
    store.set_renderable(id, entity);
    info!(
        "placed tile {id:?} at cell ({}, {})",
        event.cell.x, event.cell.y
    );
}

fn load_part_mesh(asset_server: &AssetServer, address: &str) -> Handle<Mesh> {
    asset_server.load(
        GltfAssetLabel::Primitive {
            mesh: 0,
            primitive: 0,
        }
        .from_asset(address.to_string()),
    )
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn assemble_loaded_tiles(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    assets: Res<TileAssets>,
    mut pending_query: Query<(Entity, &TileRoot, &mut PendingParts)>,
) {
    for (entity, root, mut pending) in &mut pending_query {
        // A failed load must not stall the composite: swap in the fallback.
        for handle in pending.handles.iter_mut() {
            if meshes.contains(&*handle) {
                continue;
            }
            if matches!(asset_server.load_state(handle.id()), LoadState::Failed(_)) {
                warn!("part mesh failed to load; substituting fallback geometry");
                *handle = assets.fallback_mesh.clone();
            }
        }

        // Suspend until every part geometry has resolved.
        if !pending.handles.iter().all(|handle| meshes.contains(handle)) {
            continue;
        }

        // Center per-tile clones of the loaded geometry. Centering mutates
        // the mesh, and two tiles referencing the same mesh file must not
        // observe each other's translation.
        let mut parts = Vec::with_capacity(pending.handles.len());
        for (handle, name) in pending.handles.iter().zip(&pending.names) {
            let Some(mut mesh) = meshes.get(handle).cloned() else {
                continue;
            };
            let Some(geometry) = assembly::measure_and_center(&mut mesh) else {
                warn!("part '{name}' has no measurable geometry; skipping");
                continue;
            };
            parts.push((name.clone(), geometry, meshes.add(mesh)));
        }

        let base_height = assembly::base_height(
            parts
                .iter()
                .map(|(name, geometry, _)| (name.as_str(), &geometry.metrics)),
        );

        for (name, geometry, handle) in &parts {
            let transform =
                assembly::compute_part_transform(&geometry.metrics, name, base_height)
                    .to_transform();
            commands.spawn((
                Name::new(name.clone()),
                Mesh3d(handle.clone()),
                MeshMaterial3d(assets.part_material.clone()),
                transform,
                ChildOf(entity),
            ));
        }

        commands.entity(entity).remove::<PendingParts>();
        debug!("assembled tile {:?} from {} parts", root.id, parts.len());
    }
}

// ---------------------------------------------------------------------------
// Store sync
// ---------------------------------------------------------------------------

/// Keep tile root transforms in step with the store. Roots whose tile has
/// been removed are despawned by the removal path; a mesh load resolving
/// after that finds no `PendingParts` target and is simply discarded.
fn sync_tile_transforms(
    store: Res<TilePlacementStore>,
    mut roots: Query<(&TileRoot, &mut Transform)>,
) {
    if !store.is_changed() {
        return;
    }
    for (root, mut transform) in &mut roots {
        let Some(tile) = store.get(root.id) else {
            continue;
        };
        let position = tile.position();
        transform.translation = grid::cell_to_world(position.cell(), position.z);
        transform.rotation = Quat::from_rotation_y(tile.rotation());
    }
}
