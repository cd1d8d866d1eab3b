//! Reference-data store: cached code-to-label resolution for master data
//!
//! One store instance is shared read-only by every open edit session. Each
//! collection loads at most once per process; there is no invalidation or
//! refresh channel, so a new process start is required to pick up upstream
//! master-data changes.
//!
//! Resolution never shows an undefined-style value to the operator: during
//! the window between view mount and reference-data arrival it yields a
//! loading placeholder, and a failed fetch degrades to the static seed
//! tables instead of blocking the view.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::fields::MasterCollection;
use crate::gateway::PersistenceGateway;

/// What hosts render while a collection is still loading
pub const LOADING_PLACEHOLDER: &str = "…";

/// Lifecycle of one cached collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// One resolvable entry of a reference collection
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub code: String,
    pub label: String,
}

#[derive(Debug)]
struct CollectionSlot {
    state: LoadState,
    entries: Vec<ReferenceEntry>,
}

impl CollectionSlot {
    fn empty() -> Self {
        CollectionSlot {
            state: LoadState::NotLoaded,
            entries: Vec::new(),
        }
    }
}

/// Shared cache of master-data collections with four-tier resolution
pub struct ReferenceDataStore {
    gateway: Arc<dyn PersistenceGateway>,
    collections: RwLock<HashMap<MasterCollection, CollectionSlot>>,
}

impl ReferenceDataStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let collections = MasterCollection::ALL
            .into_iter()
            .map(|c| (c, CollectionSlot::empty()))
            .collect();

        ReferenceDataStore {
            gateway,
            collections: RwLock::new(collections),
        }
    }

    pub fn state(&self, collection: MasterCollection) -> LoadState {
        self.collections
            .read()
            .expect("reference data lock poisoned")
            .get(&collection)
            .map(|slot| slot.state)
            .unwrap_or(LoadState::NotLoaded)
    }

    /// Snapshot of a collection's entries (merged seeds + fetched rows)
    pub fn entries(&self, collection: MasterCollection) -> Vec<ReferenceEntry> {
        self.collections
            .read()
            .expect("reference data lock poisoned")
            .get(&collection)
            .map(|slot| slot.entries.clone())
            .unwrap_or_default()
    }

    /// Fetch and cache one collection. Idempotent: a second call while the
    /// collection is `Loading` or after it is `Loaded` is a no-op.
    pub async fn load(&self, collection: MasterCollection) {
        {
            let mut collections = self
                .collections
                .write()
                .expect("reference data lock poisoned");
            let slot = collections
                .entry(collection)
                .or_insert_with(CollectionSlot::empty);
            match slot.state {
                LoadState::Loading | LoadState::Loaded => return,
                _ => slot.state = LoadState::Loading,
            }
        }

        match self.gateway.list_master(collection).await {
            Ok(rows) => {
                let fetched: Vec<ReferenceEntry> = rows
                    .iter()
                    .filter(|row| row.is_active())
                    .map(|row| ReferenceEntry {
                        code: row.code(),
                        label: row.name.clone(),
                    })
                    .collect();
                let entries = merge_with_seeds(collection, fetched);
                debug!("loaded {} entries for {}", entries.len(), collection);

                let mut collections = self
                    .collections
                    .write()
                    .expect("reference data lock poisoned");
                if let Some(slot) = collections.get_mut(&collection) {
                    slot.entries = entries;
                    slot.state = LoadState::Loaded;
                }
            }
            Err(err) => {
                warn!("failed to load {}: {}", collection, err);
                let mut collections = self
                    .collections
                    .write()
                    .expect("reference data lock poisoned");
                if let Some(slot) = collections.get_mut(&collection) {
                    slot.state = LoadState::Failed;
                }
            }
        }
    }

    /// Kick off all collection loads concurrently
    pub async fn load_all(&self) {
        join_all(MasterCollection::ALL.into_iter().map(|c| self.load(c))).await;
    }

    /// Resolve a code to its display label.
    ///
    /// Tiers, in priority order: the loaded label; the loading placeholder
    /// while the fetch is pending; the raw code when loaded but unmatched
    /// (data-integrity fallback, distinct from "loading"); the static seed
    /// label when the fetch failed.
    pub fn resolve(&self, collection: MasterCollection, code: &str) -> String {
        let collections = self
            .collections
            .read()
            .expect("reference data lock poisoned");
        let Some(slot) = collections.get(&collection) else {
            return code.to_string();
        };

        match slot.state {
            LoadState::Loaded => slot
                .entries
                .iter()
                .find(|entry| entry.code == code)
                .map(|entry| entry.label.clone())
                .unwrap_or_else(|| code.to_string()),
            LoadState::NotLoaded | LoadState::Loading => LOADING_PLACEHOLDER.to_string(),
            LoadState::Failed => seeds(collection)
                .iter()
                .find(|(seed_code, _)| *seed_code == code)
                .map(|(_, label)| label.to_string())
                .unwrap_or_else(|| code.to_string()),
        }
    }
}

/// Static seed entries for collections with well-known defaults.
///
/// Seeds serve two purposes: the offline fallback tier when a fetch fails,
/// and gap-filling in the merged option list when the backend omits a
/// well-known code.
fn seeds(collection: MasterCollection) -> &'static [(&'static str, &'static str)] {
    match collection {
        MasterCollection::BloodGroups => &[
            ("A+", "A+"),
            ("A-", "A-"),
            ("B+", "B+"),
            ("B-", "B-"),
            ("AB+", "AB+"),
            ("AB-", "AB-"),
            ("O+", "O+"),
            ("O-", "O-"),
        ],
        MasterCollection::Degrees => &[
            ("B.Tech", "B.Tech"),
            ("B.E", "B.E"),
            ("B.Sc", "B.Sc"),
            ("B.Com", "B.Com"),
            ("BBA", "BBA"),
            ("MBA", "MBA"),
            ("M.Tech", "M.Tech"),
            ("MCA", "MCA"),
            ("Diploma", "Diploma"),
        ],
        MasterCollection::ExperienceBands => &[
            ("0", "Fresher"),
            ("1", "1 year"),
            ("2", "2 years"),
            ("3", "3 years"),
            ("4", "4 years"),
            ("5", "5 years"),
            ("6", "6+ years"),
        ],
        _ => &[],
    }
}

/// Merge fetched rows over the collection's seeds, deduplicated by code.
///
/// A fetched label wins for a code both sides know, so a backend row that
/// duplicates a default never shows up twice; seeds fill the gaps the
/// backend omits.
fn merge_with_seeds(
    collection: MasterCollection,
    fetched: Vec<ReferenceEntry>,
) -> Vec<ReferenceEntry> {
    let mut merged: Vec<ReferenceEntry> = seeds(collection)
        .iter()
        .map(|(code, label)| ReferenceEntry {
            code: code.to_string(),
            label: label.to_string(),
        })
        .collect();

    for entry in fetched {
        match merged.iter_mut().find(|seed| seed.code == entry.code) {
            Some(seed) => seed.label = entry.label,
            None => merged.push(entry),
        }
    }

    merged
}
