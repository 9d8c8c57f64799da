use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Context as _;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub struct CatalogPlugin;

impl Plugin for CatalogPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CatalogConfig>()
            .init_resource::<BlueprintLibrary>()
            .init_resource::<PendingBlueprintFetch>()
            .add_systems(Startup, request_blueprints)
            .add_systems(Update, poll_blueprint_fetch);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where the catalog/tag query service lives. Override with the
/// `BOWERBIRD_CATALOG_URL` environment variable.
#[derive(Resource)]
pub struct CatalogConfig {
    pub base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let base_url = std::env::var("BOWERBIRD_CATALOG_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api".to_string());
        Self { base_url }
    }
}

// ---------------------------------------------------------------------------
// Wire model
// ---------------------------------------------------------------------------

/// A catalog entry describing a tile type and its ordered part slots.
#[derive(Deserialize, Clone, Debug)]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blueprint_config: BlueprintConfig,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct BlueprintConfig {
    #[serde(default)]
    pub parts: Vec<PartSlot>,
}

/// A named position within a blueprint, to be filled by a selected mesh.
#[derive(Deserialize, Clone, Debug)]
pub struct PartSlot {
    pub name: String,
    #[serde(default)]
    pub tags: TagRules,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct TagRules {
    #[serde(default)]
    pub require: Vec<TagRequirement>,
    #[serde(default)]
    pub deny: Vec<TagRequirement>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TagRequirement {
    pub tag: String,
}

/// Require/deny filter posted to the tag query endpoint.
#[derive(Serialize, Debug)]
pub struct TagQuery<'a> {
    pub require: &'a [TagRequirement],
    pub deny: &'a [TagRequirement],
}

/// One selectable part returned by a tag query.
#[derive(Deserialize, Clone, Debug)]
pub struct PartRecord {
    pub id: String,
    pub name: String,
    /// Resolvable mesh-file address for this part.
    pub storage_address: String,
}

/// Tag-query response: matching records plus the frequencies of
/// co-occurring tags, for filter refinement.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct TagQueryResponse {
    #[serde(default)]
    pub blueprints: Vec<PartRecord>,
    #[serde(default)]
    pub tag_counts: HashMap<String, u32>,
}

#[derive(Deserialize, Debug, Default)]
struct BlueprintListResponse {
    #[serde(default)]
    blueprints: Vec<Blueprint>,
}

// ---------------------------------------------------------------------------
// Fetch plumbing
// ---------------------------------------------------------------------------

/// Completion cell for an in-flight catalog request. The ehttp callback
/// fills it from its worker thread; a system on the main schedule drains it.
pub type ResponseCell<T> = Arc<Mutex<Option<anyhow::Result<T>>>>;

/// POST a JSON body and parse the JSON response into `T` off the main
/// thread. The returned cell holds the parsed result once the request
/// completes.
pub fn fetch_json<T>(url: String, body: Vec<u8>) -> ResponseCell<T>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let cell: ResponseCell<T> = Arc::default();
    let out = Arc::clone(&cell);
    let mut request = ehttp::Request::post(&url, body);
    request.headers.insert("Content-Type", "application/json");
    ehttp::fetch(request, move |result| {
        let parsed = result.map_err(anyhow::Error::msg).and_then(|response| {
            if !response.ok {
                return Err(anyhow::anyhow!(
                    "catalog request to {url} failed: HTTP {}",
                    response.status
                ));
            }
            serde_json::from_slice::<T>(&response.bytes)
                .with_context(|| format!("malformed catalog response from {url}"))
        });
        if let Ok(mut slot) = out.lock() {
            *slot = Some(parsed);
        }
    });
    cell
}

/// Drain a completion cell. `None` while the request is still in flight.
pub fn take_response<T>(cell: &ResponseCell<T>) -> Option<anyhow::Result<T>> {
    cell.lock().ok().and_then(|mut slot| slot.take())
}

/// Issue the part-option query for one slot, with its require/deny tags.
pub fn request_part_options(
    config: &CatalogConfig,
    slot: &PartSlot,
) -> ResponseCell<TagQueryResponse> {
    let url = format!("{}/blueprints/tags", config.base_url);
    let query = TagQuery {
        require: &slot.tags.require,
        deny: &slot.tags.deny,
    };
    let body = serde_json::to_vec(&query).unwrap_or_default();
    fetch_json(url, body)
}

// ---------------------------------------------------------------------------
// Blueprint library
// ---------------------------------------------------------------------------

/// Blueprints fetched from the catalog service at startup. A failed fetch
/// leaves the library empty but `loaded`, so the panel can say so instead
/// of spinning forever.
#[derive(Resource, Default)]
pub struct BlueprintLibrary {
    pub blueprints: Vec<Blueprint>,
    pub loaded: bool,
}

impl BlueprintLibrary {
    pub fn get(&self, id: &str) -> Option<&Blueprint> {
        self.blueprints.iter().find(|blueprint| blueprint.id == id)
    }
}

#[derive(Resource, Default)]
struct PendingBlueprintFetch(Option<ResponseCell<BlueprintListResponse>>);

fn request_blueprints(config: Res<CatalogConfig>, mut pending: ResMut<PendingBlueprintFetch>) {
    let url = format!(
        "{}/blueprints/tags?models=false&blueprints=true",
        config.base_url
    );
    pending.0 = Some(fetch_json(url, Vec::new()));
}

fn poll_blueprint_fetch(
    mut pending: ResMut<PendingBlueprintFetch>,
    mut library: ResMut<BlueprintLibrary>,
) {
    let Some(cell) = pending.0.as_ref() else {
        return;
    };
    let Some(result) = take_response(cell) else {
        return;
    };
    pending.0 = None;
    match result {
        Ok(response) => {
            info!("catalog: {} blueprints available", response.blueprints.len());
            library.blueprints = response.blueprints;
        }
        // Degrades to an empty catalog; the panel shows "no blueprints".
        Err(err) => warn!("catalog: blueprint fetch failed: {err:#}"),
    }
    library.loaded = true;
}
