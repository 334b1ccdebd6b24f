//! External collaborator interfaces.
//!
//! The subsystem consumes a flat-collection data store, a generic
//! per-player quest-property store, an inventory, and quest/encounter
//! handles. Each is a trait here; SQLite-backed implementations live in
//! [`crate::persistence`], and the in-memory implementations below back
//! tests and content tooling.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::types::{
    ArtifactBonus, ArtifactDefinition, ArtifactInstance, ArtifactVersionRow, ItemInstanceId,
    ItemSnapshot, ItemTemplate, PlayerId,
};

// ---------------------------------------------------------------------------
// Artifact data store
// ---------------------------------------------------------------------------

/// Source of the three flat collections the registry indexes, plus item
/// template lookups.
pub trait ArtifactStore: Send + Sync {
    /// All artifact definition rows.
    fn load_artifacts(&self) -> Result<Vec<ArtifactDefinition>>;
    /// All (artifact, version) rows.
    fn load_versions(&self) -> Result<Vec<ArtifactVersionRow>>;
    /// All sparse bonus level-requirement rows.
    fn load_bonuses(&self) -> Result<Vec<ArtifactBonus>>;
    /// Look up one item template; `None` when missing (the caller logs).
    fn item_template(&self, id: &str) -> Result<Option<ItemTemplate>>;
}

// ---------------------------------------------------------------------------
// Quest property store
// ---------------------------------------------------------------------------

/// Generic key/value string storage per (player, quest-session) pair.
///
/// The core defines its own keys and owns the serialization format; no
/// other component reads them.
pub trait QuestPropertyStore: Send + Sync {
    /// Read one property.
    fn get(&self, player: PlayerId, session: &str, key: &str) -> Result<Option<String>>;
    /// Write one property, replacing any previous value.
    fn set(&self, player: PlayerId, session: &str, key: &str, value: &str) -> Result<()>;
    /// Remove one property if present.
    fn remove(&self, player: PlayerId, session: &str, key: &str) -> Result<()>;
    /// Delete every property of the session (called on finish).
    fn delete_session(&self, player: PlayerId, session: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// The slice of an inventory system this core needs. The core produces
/// and combines items without owning item storage.
pub trait Inventory {
    /// Snapshot of every carried item.
    fn items(&self) -> Vec<ItemSnapshot>;
    /// The item in `slot`, if any.
    fn find_by_slot(&self, slot: i32) -> Option<ItemSnapshot>;
    /// Remove exactly this instance. Returns `false` if it is gone.
    fn remove_item(&mut self, instance: ItemInstanceId) -> bool;
    /// Create an item from a template. `false` means insufficient
    /// capacity; the caller must treat the grant as not having happened.
    fn receive_item(&mut self, template: &ItemTemplate) -> bool;
    /// Place an artifact instance with pre-set progress. Same capacity
    /// contract as [`Inventory::receive_item`].
    fn receive_artifact(&mut self, instance: ArtifactInstance) -> bool;
}

// ---------------------------------------------------------------------------
// Quest handles
// ---------------------------------------------------------------------------

/// Opaque handle onto an encounter or activation quest owned by the
/// surrounding quest framework.
pub trait QuestHandle: Send + Sync {
    /// How many times the player has finished this quest.
    fn is_finished_by(&self, player: PlayerId) -> u32;
    /// Mark the quest finished for the player, bypassing its own steps.
    fn force_complete(&self, player: PlayerId);
}

/// Maps stored identifier strings onto quest handles.
///
/// Populated explicitly by whatever the surrounding quest framework
/// initializes; the core never performs type discovery.
pub trait QuestHandleResolver: Send + Sync {
    /// Resolve a stored identifier; `None` when nothing is registered.
    fn resolve(&self, id: &str) -> Option<Arc<dyn QuestHandle>>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory [`ArtifactStore`] for tests and content tooling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Vec<ArtifactDefinition>,
    versions: Vec<ArtifactVersionRow>,
    bonuses: Vec<ArtifactBonus>,
    templates: HashMap<String, ItemTemplate>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition row.
    pub fn push_artifact(&mut self, def: ArtifactDefinition) {
        self.artifacts.push(def);
    }

    /// Add a version row.
    pub fn push_version(&mut self, row: ArtifactVersionRow) {
        self.versions.push(row);
    }

    /// Add a bonus row.
    pub fn push_bonus(&mut self, bonus: ArtifactBonus) {
        self.bonuses.push(bonus);
    }

    /// Add an item template.
    pub fn push_template(&mut self, template: ItemTemplate) {
        self.templates.insert(template.id.clone(), template);
    }
}

impl ArtifactStore for MemoryStore {
    fn load_artifacts(&self) -> Result<Vec<ArtifactDefinition>> {
        Ok(self.artifacts.clone())
    }

    fn load_versions(&self) -> Result<Vec<ArtifactVersionRow>> {
        Ok(self.versions.clone())
    }

    fn load_bonuses(&self) -> Result<Vec<ArtifactBonus>> {
        Ok(self.bonuses.clone())
    }

    fn item_template(&self, id: &str) -> Result<Option<ItemTemplate>> {
        Ok(self.templates.get(id).cloned())
    }
}

/// In-memory [`QuestPropertyStore`].
#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    map: Mutex<HashMap<(PlayerId, String, String), String>>,
}

impl MemoryPropertyStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuestPropertyStore for MemoryPropertyStore {
    fn get(&self, player: PlayerId, session: &str, key: &str) -> Result<Option<String>> {
        let map = self.map.lock();
        Ok(map
            .get(&(player, session.to_owned(), key.to_owned()))
            .cloned())
    }

    fn set(&self, player: PlayerId, session: &str, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.lock();
        map.insert(
            (player, session.to_owned(), key.to_owned()),
            value.to_owned(),
        );
        Ok(())
    }

    fn remove(&self, player: PlayerId, session: &str, key: &str) -> Result<()> {
        let mut map = self.map.lock();
        map.remove(&(player, session.to_owned(), key.to_owned()));
        Ok(())
    }

    fn delete_session(&self, player: PlayerId, session: &str) -> Result<()> {
        let mut map = self.map.lock();
        map.retain(|(p, s, _), _| !(*p == player && s == session));
        Ok(())
    }
}

/// Slot-addressed in-memory [`Inventory`] with a fixed capacity.
#[derive(Debug)]
pub struct MemoryInventory {
    slots: Vec<Option<ItemSnapshot>>,
}

impl MemoryInventory {
    /// Inventory with `capacity` backpack slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Insert an already-built snapshot into the first free slot.
    /// Returns the occupied slot, or `None` when full.
    pub fn insert(&mut self, mut item: ItemSnapshot) -> Option<i32> {
        let free = self.slots.iter().position(Option::is_none)?;
        item.slot = i32::try_from(free).unwrap_or(i32::MAX);
        let slot = item.slot;
        self.slots[free] = Some(item);
        Some(slot)
    }
}

impl Inventory for MemoryInventory {
    fn items(&self) -> Vec<ItemSnapshot> {
        self.slots.iter().flatten().cloned().collect()
    }

    fn find_by_slot(&self, slot: i32) -> Option<ItemSnapshot> {
        usize::try_from(slot)
            .ok()
            .and_then(|i| self.slots.get(i))
            .and_then(Clone::clone)
    }

    fn remove_item(&mut self, instance: ItemInstanceId) -> bool {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|i| i.instance == instance) {
                *slot = None;
                return true;
            }
        }
        false
    }

    fn receive_item(&mut self, template: &ItemTemplate) -> bool {
        let snapshot = ItemSnapshot {
            instance: ItemInstanceId::new(),
            template_id: template.id.clone(),
            name: template.name.clone(),
            slot: 0,
            magical: false,
            artifact: None,
        };
        self.insert(snapshot).is_some()
    }

    fn receive_artifact(&mut self, instance: ArtifactInstance) -> bool {
        let snapshot = ItemSnapshot {
            instance: instance.id,
            template_id: String::new(),
            name: instance.name.clone(),
            slot: 0,
            magical: false,
            artifact: Some(crate::types::ArtifactState {
                experience: instance.experience,
                level: instance.level,
            }),
        };
        self.insert(snapshot).is_some()
    }
}

/// A quest handle that records completions in memory.
#[derive(Debug, Default)]
pub struct FlagQuest {
    finished: Mutex<HashMap<PlayerId, u32>>,
}

impl FlagQuest {
    /// New, unfinished for everyone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuestHandle for FlagQuest {
    fn is_finished_by(&self, player: PlayerId) -> u32 {
        *self.finished.lock().get(&player).unwrap_or(&0)
    }

    fn force_complete(&self, player: PlayerId) {
        *self.finished.lock().entry(player).or_insert(0) += 1;
    }
}

/// Explicit registration table mapping handle ids to quest handles.
#[derive(Default)]
pub struct QuestTable {
    handles: Mutex<HashMap<String, Arc<dyn QuestHandle>>>,
}

impl QuestTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under `id`, replacing any previous entry.
    pub fn register(&self, id: impl Into<String>, handle: Arc<dyn QuestHandle>) {
        self.handles.lock().insert(id.into(), handle);
    }
}

impl QuestHandleResolver for QuestTable {
    fn resolve(&self, id: &str) -> Option<Arc<dyn QuestHandle>> {
        self.handles.lock().get(id).cloned()
    }
}

impl std::fmt::Debug for QuestTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestTable")
            .field("handles", &self.handles.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_store_round_trip_and_session_delete() {
        let store = MemoryPropertyStore::new();
        let player = PlayerId::new();
        store.set(player, "TurnIn", "Art", "Battler").expect("set");
        store.set(player, "TurnIn", "VS", "2").expect("set");
        assert_eq!(
            store.get(player, "TurnIn", "Art").expect("get").as_deref(),
            Some("Battler")
        );
        store.delete_session(player, "TurnIn").expect("delete");
        assert_eq!(store.get(player, "TurnIn", "Art").expect("get"), None);
    }

    #[test]
    fn inventory_capacity_and_exact_identity_removal() {
        let mut inv = MemoryInventory::new(1);
        let template = ItemTemplate {
            id: "scalars_cloth".into(),
            name: "Maddening Scalars".into(),
            allowed_classes: vec![],
            model: 0,
        };
        assert!(inv.receive_item(&template));
        assert!(!inv.receive_item(&template), "second item must not fit");

        let carried = inv.items();
        let ghost = ItemInstanceId::new();
        assert!(!inv.remove_item(ghost), "unknown instance is not removed");
        assert!(inv.remove_item(carried[0].instance));
        assert!(inv.items().is_empty());
    }

    #[test]
    fn quest_table_resolves_registered_handles_only() {
        let table = QuestTable::new();
        let player = PlayerId::new();
        let quest = Arc::new(FlagQuest::new());
        table.register("BattlerEncounter", quest.clone());

        let handle = table.resolve("BattlerEncounter").expect("registered");
        assert_eq!(handle.is_finished_by(player), 0);
        handle.force_complete(player);
        assert_eq!(handle.is_finished_by(player), 1);
        assert!(table.resolve("UnknownQuest").is_none());
    }
}
