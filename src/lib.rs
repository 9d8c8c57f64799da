pub mod assembly;
pub mod blueprint_panel;
pub mod catalog;
pub mod drag_drop;
pub mod grid;
pub mod part_select;
pub mod placement;
pub mod tile;

use bevy::{
    input::mouse::{MouseScrollUnit, MouseWheel},
    picking::hover::HoverMap,
    prelude::*,
};

/// Marker for chrome regions that swallow viewport pointer input (the
/// catalog panel, open dialogs). Drops and tile picks ignore the cursor
/// while it is over one of these.
#[derive(Component, Default)]
pub struct PointerBlocking;

/// Shared UI palette and spacing.
pub(crate) mod tokens {
    use bevy::prelude::*;

    pub const PANEL_BG: Color = Color::srgba(0.12, 0.12, 0.12, 1.0);
    pub const OVERLAY_BG: Color = Color::srgba(0.0, 0.0, 0.0, 0.45);
    pub const HOVER_BG: Color = Color::srgba(0.25, 0.25, 0.25, 1.0);
    pub const SELECTED_BG: Color = Color::srgba(0.17, 0.32, 0.5, 1.0);
    pub const BUTTON_BG: Color = Color::srgba(0.2, 0.2, 0.2, 1.0);
    pub const TEXT: Color = Color::srgb(0.87, 0.87, 0.87);
    pub const TEXT_DIM: Color = Color::srgb(0.55, 0.55, 0.55);

    pub const FONT_SM: f32 = 13.0;
    pub const FONT_MD: f32 = 16.0;

    pub const SPACING_SM: f32 = 4.0;
    pub const SPACING_MD: f32 = 8.0;
    pub const SPACING_LG: f32 = 12.0;
}

pub struct EditorPlugin;

impl Plugin for EditorPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            bowerbird_camera::OrbitCameraPlugin,
            grid::GridPlugin,
            placement::PlacementPlugin,
            catalog::CatalogPlugin,
            blueprint_panel::BlueprintPanelPlugin,
            drag_drop::DragDropPlugin,
            part_select::PartSelectPlugin,
            tile::TilePlugin,
        ))
        .add_systems(Startup, spawn_layout)
        .add_systems(Update, send_scroll_events)
        .add_observer(on_scroll);
    }
}

fn spawn_layout(mut commands: Commands) {
    commands.spawn((
        Name::new("Editor Layout"),
        Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Row,
            align_items: AlignItems::Stretch,
            ..Default::default()
        },
        children![blueprint_panel::blueprint_panel()],
    ));
}

// ---------------------------------------------------------------------------
// UI scrolling
// ---------------------------------------------------------------------------

const SCROLL_LINE_HEIGHT: f32 = 21.0;

#[derive(EntityEvent, Debug)]
#[entity_event(propagate, auto_propagate)]
struct Scroll {
    entity: Entity,
    delta: Vec2,
}

fn send_scroll_events(
    mut mouse_wheel: MessageReader<MouseWheel>,
    hover_map: Res<HoverMap>,
    mut commands: Commands,
) {
    for event in mouse_wheel.read() {
        let mut delta = -Vec2::new(event.x, event.y);
        if event.unit == MouseScrollUnit::Line {
            delta *= SCROLL_LINE_HEIGHT;
        }
        for pointer_map in hover_map.values() {
            for entity in pointer_map.keys().copied() {
                commands.trigger(Scroll { entity, delta });
            }
        }
    }
}

fn on_scroll(
    mut scroll: On<Scroll>,
    mut query: Query<(&mut ScrollPosition, &Node, &ComputedNode)>,
) {
    let Ok((mut scroll_position, node, computed)) = query.get_mut(scroll.entity) else {
        return;
    };
    let max_offset = (computed.content_size() - computed.size()) * computed.inverse_scale_factor();
    let delta = &mut scroll.delta;

    if node.overflow.y == OverflowAxis::Scroll && delta.y != 0. {
        let at_limit = if delta.y > 0. {
            scroll_position.y >= max_offset.y
        } else {
            scroll_position.y <= 0.
        };
        if !at_limit {
            scroll_position.y += delta.y;
            delta.y = 0.;
        }
    }

    if *delta == Vec2::ZERO {
        scroll.propagate(false);
    }
}
