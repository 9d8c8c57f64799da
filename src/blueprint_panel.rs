use bevy::prelude::*;

use crate::{
    PointerBlocking,
    catalog::BlueprintLibrary,
    drag_drop::DragPayload,
    tokens,
};

pub struct BlueprintPanelPlugin;

impl Plugin for BlueprintPanelPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, refresh_panel);
    }
}

/// Marker for the catalog panel container.
#[derive(Component)]
pub struct BlueprintPanel;

/// Marker for the list area where blueprint entries are displayed.
#[derive(Component)]
pub struct BlueprintList;

// ---------------------------------------------------------------------------
// Layout helper — creates the catalog panel bundle
// ---------------------------------------------------------------------------

pub fn blueprint_panel() -> impl Bundle {
    (
        BlueprintPanel,
        PointerBlocking,
        Node {
            width: Val::Px(260.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Column,
            padding: UiRect::all(Val::Px(tokens::SPACING_MD)),
            row_gap: Val::Px(tokens::SPACING_MD),
            flex_shrink: 0.0,
            ..Default::default()
        },
        BackgroundColor(tokens::PANEL_BG),
        children![
            (
                Text::new("Blueprints"),
                TextFont {
                    font_size: tokens::FONT_MD,
                    ..Default::default()
                },
                TextColor(tokens::TEXT),
            ),
            (
                BlueprintList,
                Node {
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(tokens::SPACING_SM),
                    flex_grow: 1.0,
                    min_height: Val::Px(0.0),
                    overflow: Overflow::scroll_y(),
                    ..Default::default()
                },
            )
        ],
    )
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

fn refresh_panel(
    library: Res<BlueprintLibrary>,
    mut commands: Commands,
    list_query: Query<(Entity, Option<&Children>), With<BlueprintList>>,
) {
    if !library.is_changed() {
        return;
    }
    let Ok((list_entity, children)) = list_query.single() else {
        return;
    };
    if let Some(children) = children {
        for child in children.iter() {
            commands.entity(child).despawn();
        }
    }

    if !library.loaded {
        spawn_notice(&mut commands, list_entity, "Loading catalog...");
        return;
    }
    if library.blueprints.is_empty() {
        // Catalog failure degrades to an empty, visible option set.
        spawn_notice(&mut commands, list_entity, "No blueprints available");
        return;
    }

    for blueprint in &library.blueprints {
        let row = commands
            .spawn((
                Node {
                    padding: UiRect::axes(
                        Val::Px(tokens::SPACING_MD),
                        Val::Px(tokens::SPACING_SM),
                    ),
                    ..Default::default()
                },
                BackgroundColor(Color::NONE),
                children![(
                    Text::new(blueprint.name.clone()),
                    TextFont {
                        font_size: tokens::FONT_SM,
                        ..Default::default()
                    },
                    TextColor(tokens::TEXT),
                )],
                ChildOf(list_entity),
            ))
            .id();

        // Hover effects
        commands.entity(row).observe(
            |hover: On<Pointer<Over>>, mut bg: Query<&mut BackgroundColor>| {
                if let Ok(mut bg) = bg.get_mut(hover.event_target()) {
                    bg.0 = tokens::HOVER_BG;
                }
            },
        );
        commands.entity(row).observe(
            |out: On<Pointer<Out>>, mut bg: Query<&mut BackgroundColor>| {
                if let Ok(mut bg) = bg.get_mut(out.event_target()) {
                    bg.0 = Color::NONE;
                }
            },
        );
        // Dragging an entry arms the drop payload; the drop itself is
        // resolved against the viewport on pointer release.
        let blueprint_id = blueprint.id.clone();
        commands.entity(row).observe(
            move |_: On<Pointer<DragStart>>, mut payload: ResMut<DragPayload>| {
                payload.0 = Some(blueprint_id.clone());
            },
        );
    }
}

fn spawn_notice(commands: &mut Commands, parent: Entity, message: &str) {
    commands.spawn((
        Text::new(message),
        TextFont {
            font_size: tokens::FONT_SM,
            ..Default::default()
        },
        TextColor(tokens::TEXT_DIM),
        ChildOf(parent),
    ));
}
