//! The artifact registry: loads and indexes definitions, versions and
//! level-requirement bonuses, and answers read-mostly lookups.
//!
//! The registry is an explicitly owned, single-instance service with a
//! `load`/`reload` lifecycle, injected into the components that need it.
//! Lookups take a shared read lock; (re)loading builds the new index
//! fully and publishes it under the exclusive lock, so readers never
//! observe a partially built index. Unknown ids yield empty results,
//! never errors; callers decide whether empty is "nothing available" or
//! a data problem worth logging.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::Result;
use crate::resolve::{BookTitleIndex, NameIndex};
use crate::store::{ArtifactStore, Inventory};
use crate::types::{
    ArtifactBonus, ArtifactDefinition, ArtifactId, ArtifactVersionRow, CharacterClass,
    ItemSnapshot, ItemTemplate, Realm, VersionKey, BONUS_SLOTS,
};

/// Fixed vocabulary scanned when inferring a version label from an item
/// name; armor weights first, then roles.
const LABEL_KEYWORDS: &[&str] = &[
    "Cloth", "Leather", "Studded", "Reinforced", "Scale", "Chain", "Plate", "Caster", "Melee",
];

/// One selectable version of an artifact, as presented during turn-in.
#[derive(Debug, Clone)]
pub struct VersionChoice {
    /// The ordered attribute tuple identifying this version.
    pub key: VersionKey,
    /// Display label (unique within one artifact's choice set).
    pub label: String,
    /// The item template granted when this version is chosen.
    pub template: ItemTemplate,
}

#[derive(Default)]
struct RegistryIndex {
    artifacts: HashMap<ArtifactId, Arc<ArtifactDefinition>>,
    versions: HashMap<ArtifactId, Vec<ArtifactVersionRow>>,
    bonuses: Vec<ArtifactBonus>,
    names: Option<Arc<NameIndex>>,
}

/// Registry over the artifact data store. See the module docs for the
/// locking and lifecycle contract.
pub struct ArtifactRegistry {
    store: Arc<dyn ArtifactStore>,
    index: RwLock<RegistryIndex>,
    books: BookTitleIndex,
    loaded: AtomicBool,
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("loaded", &self.loaded.load(Ordering::Acquire))
            .field("artifacts", &self.index.read().artifacts.len())
            .finish_non_exhaustive()
    }
}

impl ArtifactRegistry {
    /// Create an unloaded registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            index: RwLock::new(RegistryIndex::default()),
            books: BookTitleIndex::curated(),
            loaded: AtomicBool::new(false),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Load the three flat collections and build the indices.
    ///
    /// Idempotent: concurrent callers see a single load execution and
    /// the loaded flag is set only after the index is fully populated.
    /// Returns the number of artifacts indexed.
    ///
    /// # Errors
    /// Propagates store errors; on error nothing is published.
    pub fn load(&self) -> Result<usize> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(self.index.read().artifacts.len());
        }

        let mut index = self.index.write();
        // Lost the race: someone else finished the load first.
        if self.loaded.load(Ordering::Acquire) {
            return Ok(index.artifacts.len());
        }

        let built = self.build_index()?;
        let count = built.artifacts.len();
        *index = built;
        self.loaded.store(true, Ordering::Release);
        info!(artifacts = count, "artifact registry loaded");
        Ok(count)
    }

    /// Rebuild the indices from the store, replacing them wholesale.
    ///
    /// # Errors
    /// Propagates store errors; on error the previous index stays live.
    pub fn reload(&self) -> Result<usize> {
        let built = self.build_index()?;
        let count = built.artifacts.len();
        let mut index = self.index.write();
        *index = built;
        self.loaded.store(true, Ordering::Release);
        info!(artifacts = count, "artifact registry reloaded");
        Ok(count)
    }

    fn build_index(&self) -> Result<RegistryIndex> {
        let mut artifacts = HashMap::new();
        for def in self.store.load_artifacts()? {
            artifacts.insert(def.id.clone(), Arc::new(def));
        }

        let mut versions: HashMap<ArtifactId, Vec<ArtifactVersionRow>> = HashMap::new();
        for row in self.store.load_versions()? {
            versions.entry(row.artifact_id.clone()).or_default().push(row);
        }

        let bonuses = self.store.load_bonuses()?;

        Ok(RegistryIndex {
            artifacts,
            versions,
            bonuses,
            names: None,
        })
    }

    /// Number of artifacts currently indexed.
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.read().artifacts.len()
    }

    // -----------------------------------------------------------------------
    // Definition lookups
    // -----------------------------------------------------------------------

    /// The definition for `id`, if known.
    #[must_use]
    pub fn get(&self, id: &ArtifactId) -> Option<Arc<ArtifactDefinition>> {
        self.index.read().artifacts.get(id).cloned()
    }

    /// Every loaded definition.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<ArtifactDefinition>> {
        self.index.read().artifacts.values().cloned().collect()
    }

    /// All artifacts displayed under `zone`.
    #[must_use]
    pub fn artifacts_in_zone(&self, zone: &str) -> Vec<Arc<ArtifactDefinition>> {
        self.index
            .read()
            .artifacts
            .values()
            .filter(|def| def.zone == zone)
            .cloned()
            .collect()
    }

    /// Display names of the scholars studying `id`.
    #[must_use]
    pub fn scholars(&self, id: &ArtifactId) -> Vec<String> {
        self.get(id).map(|def| def.scholars.clone()).unwrap_or_default()
    }

    /// The artifact whose completed book carries `book_id` as its title.
    #[must_use]
    pub fn artifact_for_book(&self, book_id: &str) -> Option<ArtifactId> {
        self.index
            .read()
            .artifacts
            .values()
            .find(|def| def.book_id.eq_ignore_ascii_case(book_id))
            .map(|def| def.id.clone())
    }

    // -----------------------------------------------------------------------
    // Item lookups
    // -----------------------------------------------------------------------

    /// The artifact one of whose version rows references `template_id`.
    #[must_use]
    pub fn artifact_id_for_item(&self, template_id: &str) -> Option<ArtifactId> {
        let index = self.index.read();
        for rows in index.versions.values() {
            for row in rows {
                if row.item_id == template_id {
                    return Some(row.artifact_id.clone());
                }
            }
        }
        None
    }

    /// Whether the item is an artifact (an owned instance, or created
    /// from any known version template).
    #[must_use]
    pub fn is_artifact(&self, item: &ItemSnapshot) -> bool {
        item.artifact.is_some() || self.artifact_id_for_item(&item.template_id).is_some()
    }

    /// Canonical ids of every artifact the inventory carries.
    #[must_use]
    pub fn artifacts_carried(&self, inventory: &dyn Inventory) -> Vec<ArtifactId> {
        inventory
            .items()
            .iter()
            .filter_map(|item| self.artifact_id_for_item(&item.template_id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    /// The versions of `id` eligible for a class/realm combination, in
    /// stable row order, with display labels made unique.
    ///
    /// Unknown artifact ids yield an empty list.
    ///
    /// # Errors
    /// Propagates item-template store errors.
    pub fn versions_for(
        &self,
        id: &ArtifactId,
        class: CharacterClass,
        realm: Realm,
    ) -> Result<Vec<VersionChoice>> {
        let rows: Vec<ArtifactVersionRow> = {
            let index = self.index.read();
            index
                .versions
                .get(id)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| row.realm.allows(realm))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut choices: Vec<VersionChoice> = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(template) = self.store.item_template(&row.item_id)? else {
                warn!(item = %row.item_id, artifact = %id, "artifact item template is missing");
                continue;
            };
            if !template.allows_class(class) {
                continue;
            }

            let key = if row.version.is_blank() {
                VersionKey::new(infer_version_label(&template))
            } else {
                row.version.clone()
            };

            // Two templates may reduce to the same key; suffix a counter
            // so every choice stays addressable.
            let mut unique = key.clone();
            let mut n = 2;
            while choices.iter().any(|c| c.key == unique) {
                unique = VersionKey::new(format!("{key} #{n}"));
                n += 1;
            }

            let label = unique.label();
            choices.push(VersionChoice {
                key: unique,
                label,
                template,
            });
        }
        Ok(choices)
    }

    /// Look up one item template in the backing store.
    ///
    /// # Errors
    /// Propagates store errors.
    pub fn item_template(&self, id: &str) -> Result<Option<ItemTemplate>> {
        self.store.item_template(id)
    }

    // -----------------------------------------------------------------------
    // Level requirements
    // -----------------------------------------------------------------------

    /// Required artifact level per bonus slot; slots with no row are 0.
    #[must_use]
    pub fn level_requirements(&self, id: &ArtifactId) -> [u8; BONUS_SLOTS] {
        let mut requirements = [0u8; BONUS_SLOTS];
        let index = self.index.read();
        for bonus in &index.bonuses {
            if bonus.artifact_id == *id {
                if let Some(slot) = requirements.get_mut(usize::from(bonus.row.bonus_id)) {
                    *slot = bonus.row.level;
                }
            }
        }
        requirements
    }

    // -----------------------------------------------------------------------
    // Name resolution
    // -----------------------------------------------------------------------

    /// Resolve a loose player-facing name (credit token, scroll name,
    /// partial title) to a canonical id. `None` means "cannot identify
    /// artifact" and must be surfaced, never defaulted.
    #[must_use]
    pub fn resolve_name(&self, raw: &str) -> Option<ArtifactId> {
        self.name_index().resolve(raw)
    }

    /// Resolve an exact book title, consulting the curated title table
    /// before falling back to the general resolver.
    #[must_use]
    pub fn resolve_book_title(&self, raw_title: &str) -> Option<ArtifactId> {
        self.books
            .resolve(raw_title)
            .or_else(|| self.resolve_name(raw_title))
    }

    /// The lazily built name index. Double-checked: the read path never
    /// takes the exclusive lock once the index exists.
    fn name_index(&self) -> Arc<NameIndex> {
        {
            let index = self.index.read();
            if let Some(names) = &index.names {
                return Arc::clone(names);
            }
        }

        let mut index = self.index.write();
        if let Some(names) = &index.names {
            return Arc::clone(names);
        }
        let built = Arc::new(NameIndex::build(index.artifacts.keys()));
        index.names = Some(Arc::clone(&built));
        built
    }
}

/// Derive a version label for a template whose version key is blank:
/// parenthesized text in the display name, a keyword scan, a trailing
/// `_`-suffix of the template id, then the raw display name.
fn infer_version_label(template: &ItemTemplate) -> String {
    if let Some(inner) = parenthesized(&template.name) {
        return inner.to_owned();
    }

    let lower = template.name.to_lowercase();
    for keyword in LABEL_KEYWORDS {
        if lower.contains(&keyword.to_lowercase()) {
            return (*keyword).to_owned();
        }
    }

    if let Some((_, suffix)) = template.id.rsplit_once('_') {
        if !suffix.is_empty() {
            return suffix.to_owned();
        }
    }

    if template.name.is_empty() {
        "Version".to_owned()
    } else {
        template.name.clone()
    }
}

fn parenthesized(name: &str) -> Option<&str> {
    let open = name.find('(')?;
    let close = name[open + 1..].find(')')?;
    let inner = name[open + 1..open + 1 + close].trim();
    (!inner.is_empty()).then_some(inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
