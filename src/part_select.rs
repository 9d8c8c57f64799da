use std::collections::HashMap;

use bevy::prelude::*;

use crate::{
    PointerBlocking,
    catalog::{
        BlueprintLibrary, CatalogConfig, PartRecord, ResponseCell, TagQueryResponse,
        request_part_options, take_response,
    },
    drag_drop::BlueprintDropped,
    grid::GridCell,
    tile::PlaceTileRequest,
    tokens,
};

pub struct PartSelectPlugin;

impl Plugin for PartSelectPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PartSelectionState>()
            .add_observer(open_part_selection)
            .add_systems(Update, (poll_slot_queries, refresh_dialog).chain());
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// One part slot's catalog query and the user's current choice.
pub struct SlotOptions {
    pub slot_name: String,
    pub options: Vec<PartRecord>,
    /// Co-occurring tag frequencies from the query, for refinement display.
    pub tag_counts: HashMap<String, u32>,
    pub selected: Option<usize>,
    /// Query finished (possibly with an empty option set).
    pub resolved: bool,
    pending: Option<ResponseCell<TagQueryResponse>>,
}

/// A placement waiting on part confirmation. Dropped wholesale on cancel:
/// the store never sees a partially assembled tile.
pub struct PendingPlacement {
    pub blueprint_id: String,
    pub blueprint_name: String,
    pub cell: GridCell,
    pub slots: Vec<SlotOptions>,
}

#[derive(Resource, Default)]
pub struct PartSelectionState {
    pub active: Option<PendingPlacement>,
    needs_refresh: bool,
}

/// Marker for the dialog overlay root.
#[derive(Component)]
struct PartSelectDialog;

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

fn open_part_selection(
    event: On<BlueprintDropped>,
    library: Res<BlueprintLibrary>,
    config: Res<CatalogConfig>,
    mut state: ResMut<PartSelectionState>,
) {
    if state.active.is_some() {
        debug!("part selection already open; ignoring drop");
        return;
    }
    let Some(blueprint) = library.get(&event.blueprint_id) else {
        warn!("dropped unknown blueprint '{}'", event.blueprint_id);
        return;
    };

    let slots = blueprint
        .blueprint_config
        .parts
        .iter()
        .map(|slot| SlotOptions {
            slot_name: slot.name.clone(),
            options: Vec::new(),
            tag_counts: HashMap::new(),
            selected: None,
            resolved: false,
            pending: Some(request_part_options(&config, slot)),
        })
        .collect();

    state.active = Some(PendingPlacement {
        blueprint_id: blueprint.id.clone(),
        blueprint_name: blueprint.name.clone(),
        cell: event.cell,
        slots,
    });
    state.needs_refresh = true;
}

fn poll_slot_queries(mut state: ResMut<PartSelectionState>) {
    let mut refreshed = false;
    if let Some(placement) = state.active.as_mut() {
        for slot in placement.slots.iter_mut() {
            let Some(cell) = slot.pending.as_ref() else {
                continue;
            };
            let Some(result) = take_response(cell) else {
                continue;
            };
            slot.pending = None;
            slot.resolved = true;
            match result {
                Ok(response) => {
                    slot.options = response.blueprints;
                    slot.tag_counts = response.tag_counts;
                    // Preselect the first option, matching the catalog's
                    // relevance ordering.
                    slot.selected = if slot.options.is_empty() { None } else { Some(0) };
                }
                Err(err) => {
                    // Degrades to "no options available" for this slot only.
                    warn!("options query for slot '{}' failed: {err:#}", slot.slot_name);
                    slot.options.clear();
                    slot.selected = None;
                }
            }
            refreshed = true;
        }
    }
    if refreshed {
        state.needs_refresh = true;
    }
}

// ---------------------------------------------------------------------------
// Dialog UI
// ---------------------------------------------------------------------------

fn refresh_dialog(
    mut state: ResMut<PartSelectionState>,
    mut commands: Commands,
    dialog_query: Query<Entity, With<PartSelectDialog>>,
) {
    if state.active.is_none() {
        if let Ok(dialog) = dialog_query.single() {
            commands.entity(dialog).despawn();
        }
        return;
    }
    if !state.needs_refresh && !dialog_query.is_empty() {
        return;
    }
    state.needs_refresh = false;

    if let Ok(existing) = dialog_query.single() {
        commands.entity(existing).despawn();
    }
    let Some(placement) = state.active.as_ref() else {
        return;
    };

    // Full-screen dim overlay with a centered dialog panel
    let overlay = commands
        .spawn((
            PartSelectDialog,
            PointerBlocking,
            Node {
                position_type: PositionType::Absolute,
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..Default::default()
            },
            BackgroundColor(tokens::OVERLAY_BG),
            GlobalZIndex(10),
        ))
        .id();

    let panel = commands
        .spawn((
            Node {
                flex_direction: FlexDirection::Column,
                width: Val::Px(420.0),
                max_height: Val::Percent(80.0),
                padding: UiRect::all(Val::Px(tokens::SPACING_LG)),
                row_gap: Val::Px(tokens::SPACING_MD),
                overflow: Overflow::scroll_y(),
                ..Default::default()
            },
            BackgroundColor(tokens::PANEL_BG),
            ChildOf(overlay),
        ))
        .id();

    commands.spawn((
        Text::new(format!("Select parts: {}", placement.blueprint_name)),
        TextFont {
            font_size: tokens::FONT_MD,
            ..Default::default()
        },
        TextColor(tokens::TEXT),
        ChildOf(panel),
    ));

    for (slot_index, slot) in placement.slots.iter().enumerate() {
        spawn_slot(&mut commands, panel, slot_index, slot);
    }

    // Buttons
    let buttons = commands
        .spawn((
            Node {
                flex_direction: FlexDirection::Row,
                justify_content: JustifyContent::FlexEnd,
                column_gap: Val::Px(tokens::SPACING_MD),
                ..Default::default()
            },
            ChildOf(panel),
        ))
        .id();

    let cancel = spawn_button(&mut commands, buttons, "Cancel");
    commands.entity(cancel).observe(
        |_: On<Pointer<Click>>, mut state: ResMut<PartSelectionState>| {
            state.active = None;
        },
    );

    let confirm = spawn_button(&mut commands, buttons, "Place tile");
    commands.entity(confirm).observe(
        |_: On<Pointer<Click>>, mut state: ResMut<PartSelectionState>, mut commands: Commands| {
            let Some(placement) = state.active.as_ref() else {
                return;
            };
            let mut part_references = Vec::with_capacity(placement.slots.len());
            let mut part_names = Vec::with_capacity(placement.slots.len());
            for slot in &placement.slots {
                let Some(option) = slot.selected.and_then(|index| slot.options.get(index)) else {
                    warn!("slot '{}' has no selection; nothing placed", slot.slot_name);
                    return;
                };
                part_references.push(option.storage_address.clone());
                part_names.push(slot.slot_name.clone());
            }
            commands.trigger(PlaceTileRequest {
                blueprint_id: placement.blueprint_id.clone(),
                cell: placement.cell,
                part_references,
                part_names,
            });
            state.active = None;
        },
    );
}

fn spawn_slot(commands: &mut Commands, panel: Entity, slot_index: usize, slot: &SlotOptions) {
    commands.spawn((
        Text::new(slot.slot_name.clone()),
        TextFont {
            font_size: tokens::FONT_SM,
            ..Default::default()
        },
        TextColor(tokens::TEXT),
        ChildOf(panel),
    ));

    if !slot.resolved {
        spawn_dim_text(commands, panel, "Loading options...");
        return;
    }
    if slot.options.is_empty() {
        spawn_dim_text(commands, panel, "No options available");
        return;
    }

    for (option_index, option) in slot.options.iter().enumerate() {
        let is_selected = slot.selected == Some(option_index);
        let row = commands
            .spawn((
                Node {
                    padding: UiRect::axes(
                        Val::Px(tokens::SPACING_MD),
                        Val::Px(tokens::SPACING_SM),
                    ),
                    margin: UiRect::left(Val::Px(tokens::SPACING_MD)),
                    ..Default::default()
                },
                BackgroundColor(if is_selected {
                    tokens::SELECTED_BG
                } else {
                    Color::NONE
                }),
                children![(
                    Text::new(option.name.clone()),
                    TextFont {
                        font_size: tokens::FONT_SM,
                        ..Default::default()
                    },
                    TextColor(tokens::TEXT),
                )],
                ChildOf(panel),
            ))
            .id();

        if !is_selected {
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
        }
        commands.entity(row).observe(
            move |_: On<Pointer<Click>>, mut state: ResMut<PartSelectionState>| {
                if let Some(placement) = state.active.as_mut() {
                    if let Some(slot) = placement.slots.get_mut(slot_index) {
                        slot.selected = Some(option_index);
                    }
                }
                state.needs_refresh = true;
            },
        );
    }

    // A short tag-frequency readout helps narrow large option sets.
    if !slot.tag_counts.is_empty() {
        let mut counts: Vec<_> = slot.tag_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let summary = counts
            .iter()
            .take(4)
            .map(|(tag, count)| format!("{tag} ({count})"))
            .collect::<Vec<_>>()
            .join("  ");
        spawn_dim_text(commands, panel, &summary);
    }
}

fn spawn_dim_text(commands: &mut Commands, parent: Entity, message: &str) {
    commands.spawn((
        Text::new(message),
        TextFont {
            font_size: tokens::FONT_SM,
            ..Default::default()
        },
        TextColor(tokens::TEXT_DIM),
        Node {
            margin: UiRect::left(Val::Px(tokens::SPACING_MD)),
            ..Default::default()
        },
        ChildOf(parent),
    ));
}

fn spawn_button(commands: &mut Commands, parent: Entity, label: &str) -> Entity {
    let button = commands
        .spawn((
            Node {
                padding: UiRect::axes(Val::Px(tokens::SPACING_LG), Val::Px(tokens::SPACING_SM)),
                ..Default::default()
            },
            BackgroundColor(tokens::BUTTON_BG),
            children![(
                Text::new(label.to_string()),
                TextFont {
                    font_size: tokens::FONT_SM,
                    ..Default::default()
                },
                TextColor(tokens::TEXT),
            )],
            ChildOf(parent),
        ))
        .id();
    commands.entity(button).observe(
        |hover: On<Pointer<Over>>, mut bg: Query<&mut BackgroundColor>| {
            if let Ok(mut bg) = bg.get_mut(hover.event_target()) {
                bg.0 = tokens::HOVER_BG;
            }
        },
    );
    commands.entity(button).observe(
        |out: On<Pointer<Out>>, mut bg: Query<&mut BackgroundColor>| {
            if let Ok(mut bg) = bg.get_mut(out.event_target()) {
                bg.0 = tokens::BUTTON_BG;
            }
        },
    );
    button
}
