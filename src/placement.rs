use std::collections::HashMap;
use std::f32::consts::TAU;

use bevy::prelude::*;

use crate::grid::GridCell;

pub struct PlacementPlugin;

impl Plugin for PlacementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TilePlacementStore>();
    }
}

// ---------------------------------------------------------------------------
// Tile data
// ---------------------------------------------------------------------------

/// Opaque identifier for a placed tile. Assigned by the store at creation,
/// immutable thereafter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TileId(u64);

/// Grid-space placement: `x`/`y` are cell indices on the horizontal plane,
/// `z` a vertical offset (normally 0).
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TilePosition {
    pub x: i32,
    pub y: i32,
    pub z: f32,
}

impl TilePosition {
    pub fn at_cell(cell: GridCell) -> Self {
        Self {
            x: cell.x,
            y: cell.y,
            z: 0.0,
        }
    }

    pub fn cell(&self) -> GridCell {
        GridCell {
            x: self.x,
            y: self.y,
        }
    }
}

/// A placed instance of a blueprint. Position and rotation are only mutated
/// through the store's validated operations.
#[derive(Clone, Debug)]
pub struct Tile {
    id: TileId,
    blueprint_id: String,
    position: TilePosition,
    rotation: f32,
    part_references: Vec<String>,
}

impl Tile {
    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn blueprint_id(&self) -> &str {
        &self.blueprint_id
    }

    pub fn position(&self) -> TilePosition {
        self.position
    }

    /// Yaw about the vertical axis, always finite and in `[0, 2π)`.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Mesh-file addresses, one per blueprint part slot, in slot order.
    pub fn part_references(&self) -> &[String] {
        &self.part_references
    }
}

/// Tile data supplied by the caller; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewTile {
    pub blueprint_id: String,
    pub position: TilePosition,
    pub rotation: f32,
    pub part_references: Vec<String>,
}

// ---------------------------------------------------------------------------
// Mutation outcomes
// ---------------------------------------------------------------------------

/// Result of [`TilePlacementStore::add_tile`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[must_use]
pub enum AddOutcome {
    Accepted(TileId),
    RejectedCollision,
}

impl AddOutcome {
    pub fn accepted(self) -> Option<TileId> {
        match self {
            Self::Accepted(id) => Some(id),
            Self::RejectedCollision => None,
        }
    }
}

/// Result of a move or rotate operation. Callers can tell a committed change
/// from a collision rejection or a missing tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[must_use]
pub enum PlacementOutcome {
    Accepted,
    RejectedCollision,
    NotFound,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The authoritative set of placed tiles, keyed by id. All layout mutations
/// funnel through its methods, which uphold the one-tile-per-cell invariant;
/// each call runs to completion before any other mutation is observed.
///
/// The store also owns the tile-id → renderable-entity map, updated in step
/// with the mutations, so the render layer never has to search the scene
/// graph for a tile's entity.
#[derive(Resource, Default)]
pub struct TilePlacementStore {
    tiles: HashMap<TileId, Tile>,
    renderables: HashMap<TileId, Entity>,
    next_id: u64,
}

impl TilePlacementStore {
    /// Insert a new tile, unless its `(x, y)` cell is already occupied.
    pub fn add_tile(&mut self, tile: NewTile) -> AddOutcome {
        if self.cell_occupied(tile.position.cell(), None) {
            return AddOutcome::RejectedCollision;
        }
        let id = TileId(self.next_id);
        self.next_id += 1;
        let rotation = match normalize_rotation(tile.rotation) {
            Some(angle) => angle,
            None => {
                warn!("add_tile: non-finite rotation {}; using 0", tile.rotation);
                0.0
            }
        };
        self.tiles.insert(
            id,
            Tile {
                id,
                blueprint_id: tile.blueprint_id,
                position: tile.position,
                rotation,
                part_references: tile.part_references,
            },
        );
        AddOutcome::Accepted(id)
    }

    /// Move a tile to a new position. Rejected (tile stays put) when any
    /// *other* tile occupies the target cell.
    pub fn update_tile_position(&mut self, id: TileId, position: TilePosition) -> PlacementOutcome {
        if !self.tiles.contains_key(&id) {
            return PlacementOutcome::NotFound;
        }
        if self.cell_occupied(position.cell(), Some(id)) {
            return PlacementOutcome::RejectedCollision;
        }
        if let Some(tile) = self.tiles.get_mut(&id) {
            tile.position = position;
        }
        PlacementOutcome::Accepted
    }

    /// Set a tile's rotation, normalized into `[0, 2π)`. Rotation never
    /// participates in collision checks, so this commits unconditionally.
    /// Non-finite angles are ignored; the stored value stays finite.
    pub fn rotate_tile(&mut self, id: TileId, rotation: f32) -> PlacementOutcome {
        let Some(tile) = self.tiles.get_mut(&id) else {
            return PlacementOutcome::NotFound;
        };
        match normalize_rotation(rotation) {
            Some(angle) => tile.rotation = angle,
            None => warn!(
                "rotate_tile: non-finite angle {rotation}; keeping {}",
                tile.rotation
            ),
        }
        PlacementOutcome::Accepted
    }

    /// Remove a tile, freeing its cell, and drop its renderable mapping.
    pub fn remove_tile(&mut self, id: TileId) -> Option<Tile> {
        self.renderables.remove(&id);
        self.tiles.remove(&id)
    }

    /// True when any tile other than `exclude` occupies the `(x, y)` cell.
    /// Rotation and vertical offset deliberately do not participate: two
    /// tiles at different heights in the same cell still collide.
    pub fn cell_occupied(&self, cell: GridCell, exclude: Option<TileId>) -> bool {
        self.tiles
            .values()
            .any(|tile| Some(tile.id) != exclude && tile.position.cell() == cell)
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    pub fn tile_at(&self, cell: GridCell) -> Option<&Tile> {
        self.tiles.values().find(|tile| tile.position.cell() == cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Record the scene entity rendering a tile.
    pub fn set_renderable(&mut self, id: TileId, entity: Entity) {
        if self.tiles.contains_key(&id) {
            self.renderables.insert(id, entity);
        }
    }

    pub fn renderable(&self, id: TileId) -> Option<Entity> {
        self.renderables.get(&id).copied()
    }
}

/// Map an angle into `[0, 2π)` by Euclidean modulo, so negative inputs wrap
/// rather than truncate. `None` for non-finite input.
fn normalize_rotation(angle: f32) -> Option<f32> {
    if !angle.is_finite() {
        return None;
    }
    let mut normalized = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if normalized >= TAU {
        normalized -= TAU;
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn tile_at(x: i32, y: i32) -> NewTile {
        NewTile {
            blueprint_id: "bp-floor".to_string(),
            position: TilePosition { x, y, z: 0.0 },
            rotation: 0.0,
            part_references: vec!["a.glb".to_string(), "b.glb".to_string()],
        }
    }

    fn assert_no_overlap(store: &TilePlacementStore) {
        let cells: Vec<_> = store.iter().map(|t| t.position().cell()).collect();
        for (i, a) in cells.iter().enumerate() {
            for b in &cells[i + 1..] {
                assert_ne!(a, b, "two tiles share cell {a:?}");
            }
        }
    }

    #[test]
    fn adds_non_overlapping_tiles() {
        let mut store = TilePlacementStore::default();
        let a = store.add_tile(tile_at(0, 0));
        let b = store.add_tile(tile_at(1, 0));
        assert!(a.accepted().is_some());
        assert!(b.accepted().is_some());
        assert_eq!(store.len(), 2);
        assert_no_overlap(&store);
    }

    #[test]
    fn rejects_overlapping_add() {
        let mut store = TilePlacementStore::default();
        let first = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        assert_eq!(store.add_tile(tile_at(0, 0)), AddOutcome::RejectedCollision);
        assert_eq!(store.len(), 1);
        // The original occupant is untouched by the rejected add.
        let occupant = store.tile_at(GridCell { x: 0, y: 0 }).unwrap();
        assert_eq!(occupant.id(), first);
    }

    #[test]
    fn add_preserves_part_reference_order() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        let tile = store.get(id).unwrap();
        assert_eq!(tile.part_references(), ["a.glb", "b.glb"]);
    }

    #[test]
    fn move_to_free_cell_commits() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        let outcome = store.update_tile_position(id, TilePosition { x: 3, y: -2, z: 0.0 });
        assert_eq!(outcome, PlacementOutcome::Accepted);
        assert_eq!(store.get(id).unwrap().position().cell(), GridCell { x: 3, y: -2 });
        assert_no_overlap(&store);
    }

    #[test]
    fn rejected_move_preserves_position() {
        let mut store = TilePlacementStore::default();
        let a = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        store.add_tile(tile_at(1, 0)).accepted().unwrap();

        let before = store.get(a).unwrap().position();
        let outcome = store.update_tile_position(a, TilePosition { x: 1, y: 0, z: 0.0 });
        assert_eq!(outcome, PlacementOutcome::RejectedCollision);
        assert_eq!(store.get(a).unwrap().position(), before);
        assert_no_overlap(&store);
    }

    #[test]
    fn move_onto_own_cell_is_not_a_collision() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(2, 2)).accepted().unwrap();
        // Same cell, new vertical offset: only other tiles count.
        let outcome = store.update_tile_position(id, TilePosition { x: 2, y: 2, z: 0.5 });
        assert_eq!(outcome, PlacementOutcome::Accepted);
        assert_eq!(store.get(id).unwrap().position().z, 0.5);
    }

    #[test]
    fn collision_ignores_vertical_offset() {
        let mut store = TilePlacementStore::default();
        store.add_tile(tile_at(0, 0)).accepted().unwrap();
        let raised = NewTile {
            position: TilePosition { x: 0, y: 0, z: 4.0 },
            ..tile_at(0, 0)
        };
        assert_eq!(store.add_tile(raised), AddOutcome::RejectedCollision);
    }

    #[test]
    fn move_of_unknown_tile_is_not_found() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        store.remove_tile(id);
        let outcome = store.update_tile_position(id, TilePosition { x: 1, y: 1, z: 0.0 });
        assert_eq!(outcome, PlacementOutcome::NotFound);
    }

    #[test]
    fn rotation_normalizes_into_range() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();

        for (input, expected) in [
            (FRAC_PI_2, FRAC_PI_2),
            (TAU + PI, PI),
            (-FRAC_PI_2, TAU - FRAC_PI_2),
            (-3.0 * TAU, 0.0),
            (7.0 * TAU + 0.25, 0.25),
        ] {
            assert_eq!(store.rotate_tile(id, input), PlacementOutcome::Accepted);
            let stored = store.get(id).unwrap().rotation();
            assert!((0.0..TAU).contains(&stored), "{stored} out of range");
            // Congruent to the input modulo 2π
            let diff = (stored - expected).abs();
            assert!(diff < 1e-5 || (diff - TAU).abs() < 1e-5, "{stored} vs {expected}");
        }
    }

    #[test]
    fn rotation_stays_finite_for_tiny_negative_angles() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        assert_eq!(store.rotate_tile(id, -1.0e-10), PlacementOutcome::Accepted);
        let stored = store.get(id).unwrap().rotation();
        assert!(stored.is_finite());
        assert!((0.0..TAU).contains(&stored));
    }

    #[test]
    fn rotate_unknown_tile_is_not_found() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        store.remove_tile(id);
        assert_eq!(store.rotate_tile(id, 1.0), PlacementOutcome::NotFound);
    }

    #[test]
    fn remove_frees_the_cell() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        assert!(store.remove_tile(id).is_some());
        assert!(store.is_empty());
        assert!(store.add_tile(tile_at(0, 0)).accepted().is_some());
    }

    #[test]
    fn renderable_mapping_follows_tile_lifetime() {
        let mut store = TilePlacementStore::default();
        let id = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        store.set_renderable(id, Entity::PLACEHOLDER);
        assert_eq!(store.renderable(id), Some(Entity::PLACEHOLDER));
        store.remove_tile(id);
        assert_eq!(store.renderable(id), None);
    }

    #[test]
    fn invariant_holds_across_mixed_mutations() {
        let mut store = TilePlacementStore::default();
        let a = store.add_tile(tile_at(0, 0)).accepted().unwrap();
        let b = store.add_tile(tile_at(1, 0)).accepted().unwrap();
        store.add_tile(tile_at(0, 1)).accepted().unwrap();
        assert_no_overlap(&store);

        let _ = store.update_tile_position(a, TilePosition { x: 1, y: 0, z: 0.0 });
        assert_no_overlap(&store);
        let _ = store.update_tile_position(b, TilePosition { x: 5, y: 5, z: 0.0 });
        assert_no_overlap(&store);
        let _ = store.update_tile_position(a, TilePosition { x: 1, y: 0, z: 0.0 });
        let _ = store.rotate_tile(a, -PI);
        assert_no_overlap(&store);
        assert_eq!(store.len(), 3);
    }
}
