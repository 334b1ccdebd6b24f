//! Core type definitions for the artifact subsystem.
//!
//! Definitions, version rows and bonus rows mirror the flat collections
//! in the world database; they are immutable once loaded and replaced
//! wholesale on reload.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Canonical identifier of an artifact (e.g. `"Maddening Scalars"`).
///
/// Always the exact key from the artifact table. Loose player-facing
/// strings are mapped onto this via [`crate::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    /// Create an artifact id from any string-ish value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw canonical key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique identifier for a player character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one concrete item instance in an inventory.
///
/// Removal after a turn-in targets this id, never the display name, so a
/// stacked duplicate of the same book is never removed by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemInstanceId(pub Uuid);

impl ItemInstanceId {
    /// Create a new random instance ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Realms and classes
// ---------------------------------------------------------------------------

/// The three player realms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Realm {
    /// Albion.
    Albion,
    /// Midgard.
    Midgard,
    /// Hibernia.
    Hibernia,
}

impl Realm {
    /// Numeric realm code as stored in version rows.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Albion => 1,
            Self::Midgard => 2,
            Self::Hibernia => 3,
        }
    }

    /// Decode a stored realm code; `None` for unknown codes.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Albion),
            2 => Some(Self::Midgard),
            3 => Some(Self::Hibernia),
            _ => None,
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Albion => write!(f, "Albion"),
            Self::Midgard => write!(f, "Midgard"),
            Self::Hibernia => write!(f, "Hibernia"),
        }
    }
}

/// Realm restriction on a version row. Code `0` means "any realm".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RealmFilter(pub u8);

impl RealmFilter {
    /// A filter that admits every realm.
    pub const ANY: Self = Self(0);

    /// Restrict to a single realm.
    #[must_use]
    pub fn only(realm: Realm) -> Self {
        Self(realm.code())
    }

    /// Whether this filter admits the given realm.
    #[must_use]
    pub fn allows(self, realm: Realm) -> bool {
        self.0 == 0 || self.0 == realm.code()
    }
}

/// Numeric character-class identifier, matching the class table of the
/// surrounding server. The core never interprets these beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterClass(pub u16);

// ---------------------------------------------------------------------------
// Page bitmask
// ---------------------------------------------------------------------------

bitflags! {
    /// Which of an artifact's three pages an item represents.
    ///
    /// `empty()` and [`PageSet::ALL`] are sentinel states: an item
    /// reporting either is not a combinable scroll.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PageSet: u8 {
        /// First page.
        const PAGE_1 = 0x1;
        /// Second page.
        const PAGE_2 = 0x2;
        /// Third page.
        const PAGE_3 = 0x4;
        /// The complete book.
        const ALL = 0x7;
    }
}

impl PageSet {
    /// Whether this set is a legal combination operand: at least one
    /// page, but not the complete book.
    #[must_use]
    pub fn is_combinable(self) -> bool {
        !self.is_empty() && self != Self::ALL
    }

    /// Number of pages in the set.
    #[must_use]
    pub fn page_count(self) -> u32 {
        self.bits().count_ones()
    }
}

impl fmt::Display for PageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no pages");
        }
        if *self == Self::ALL {
            return write!(f, "complete book");
        }
        let mut first = true;
        for (label, page) in [("1", Self::PAGE_1), ("2", Self::PAGE_2), ("3", Self::PAGE_3)] {
            if self.contains(page) {
                if !first {
                    write!(f, "+")?;
                }
                write!(f, "page {label}")?;
                first = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Version keys
// ---------------------------------------------------------------------------

/// Semicolon-delimited ordered attribute tuple identifying one item
/// variant of an artifact (e.g. `"Slash;Polearm;Strength"`).
///
/// An empty field at a position means "not applicable at this position".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionKey(pub String);

impl VersionKey {
    /// Create a version key from any string-ish value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Whether the stored key is blank (label must be inferred).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The attribute value at `position`, or `None` past the end.
    /// Empty fields are returned as empty strings.
    #[must_use]
    pub fn token_at(&self, position: usize) -> Option<&str> {
        self.0.split(';').nth(position).map(str::trim)
    }

    /// A display label for choice prompts: delimiters folded to spaces.
    #[must_use]
    pub fn label(&self) -> String {
        self.0
            .split([';', '|'])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Flat data rows
// ---------------------------------------------------------------------------

/// Number of bonus slots an artifact can unlock across its levels.
pub const BONUS_SLOTS: usize = 12;

/// One artifact definition row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDefinition {
    /// Canonical artifact id, unique across the table.
    pub id: ArtifactId,
    /// Zone the artifact is displayed under.
    pub zone: String,
    /// Exact title of the completed book.
    pub book_id: String,
    /// Single-page scroll names, pages 1-3.
    pub scrolls: [String; 3],
    /// Pairwise-combined scroll names: pages 1+2, 1+3, 2+3.
    pub combined_scrolls: [String; 3],
    /// Icon model for single-page scrolls.
    pub scroll_model: u16,
    /// Icon model for two-page scrolls.
    pub combined_model: u16,
    /// Icon model for the completed book.
    pub book_model: u16,
    /// Experience rate numerator for this artifact.
    pub xp_rate: u32,
    /// Identifier of the encounter handle gating this artifact.
    pub encounter_id: String,
    /// Identifier of the activation quest handle.
    pub quest_id: String,
    /// Display names of the scholars studying this artifact.
    pub scholars: Vec<String>,
    /// Display name of a deliverable token item that grants encounter
    /// credit, if one exists for this artifact.
    pub credit_token: Option<String>,
}

impl ArtifactDefinition {
    /// The display name a scroll with exactly `pages` carries, or the
    /// book title for [`PageSet::ALL`]. `None` for the empty set.
    #[must_use]
    pub fn scroll_name(&self, pages: PageSet) -> Option<&str> {
        let name = if pages == PageSet::PAGE_1 {
            &self.scrolls[0]
        } else if pages == PageSet::PAGE_2 {
            &self.scrolls[1]
        } else if pages == PageSet::PAGE_3 {
            &self.scrolls[2]
        } else if pages == PageSet::PAGE_1 | PageSet::PAGE_2 {
            &self.combined_scrolls[0]
        } else if pages == PageSet::PAGE_1 | PageSet::PAGE_3 {
            &self.combined_scrolls[1]
        } else if pages == PageSet::PAGE_2 | PageSet::PAGE_3 {
            &self.combined_scrolls[2]
        } else if pages == PageSet::ALL {
            &self.book_id
        } else {
            return None;
        };
        Some(name.as_str())
    }

    /// Icon model for a scroll with exactly `pages`.
    #[must_use]
    pub fn scroll_model_for(&self, pages: PageSet) -> u16 {
        match pages.page_count() {
            1 => self.scroll_model,
            2 => self.combined_model,
            _ => self.book_model,
        }
    }
}

/// One (artifact, version) row linking a version key to an item template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactVersionRow {
    /// Owning artifact.
    pub artifact_id: ArtifactId,
    /// Version key; may be blank, in which case a label is inferred from
    /// the item template.
    pub version: VersionKey,
    /// Item template granted for this version.
    pub item_id: String,
    /// Realm restriction (0 = any).
    pub realm: RealmFilter,
}

/// One sparse level-requirement row for a bonus slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArtifactBonusRow {
    /// Bonus slot, `0..BONUS_SLOTS`.
    pub bonus_id: u8,
    /// Artifact level required to unlock the slot.
    pub level: u8,
}

/// An [`ArtifactBonusRow`] together with its owning artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBonus {
    /// Owning artifact.
    pub artifact_id: ArtifactId,
    /// The slot/level pair.
    pub row: ArtifactBonusRow,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// An item template as the surrounding item system stores it. The core
/// reads only the fields it filters and labels by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Template id (e.g. `"scalars_cloth"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Class ids allowed to use this template; empty means unrestricted.
    pub allowed_classes: Vec<CharacterClass>,
    /// Icon model.
    pub model: u16,
}

impl ItemTemplate {
    /// Whether `class` may use this template.
    #[must_use]
    pub fn allows_class(&self, class: CharacterClass) -> bool {
        self.allowed_classes.is_empty() || self.allowed_classes.contains(&class)
    }
}

/// Progress carried by an equipped artifact item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactState {
    /// Accumulated experience; monotonic.
    pub experience: u64,
    /// Current level, 0-10, derived from experience.
    pub level: u8,
}

/// A read-only view of one inventory item as the core sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Instance identity.
    pub instance: ItemInstanceId,
    /// Template this instance was created from.
    pub template_id: String,
    /// Current display name.
    pub name: String,
    /// Backpack slot the item occupies.
    pub slot: i32,
    /// Whether the item is a loose magical item (scrolls and books are;
    /// equipped artifacts are not).
    pub magical: bool,
    /// Artifact progress, for delivered artifact items.
    pub artifact: Option<ArtifactState>,
}

/// An owned, equipped artifact instance tracked by the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInstance {
    /// Instance identity.
    pub id: ItemInstanceId,
    /// Which artifact this is an instance of.
    pub artifact_id: ArtifactId,
    /// Display name, for level-up notifications.
    pub name: String,
    /// Accumulated experience; never decreases.
    pub experience: u64,
    /// Current level, 0-10.
    pub level: u8,
}

/// A player as the core needs to see one: identity plus the attributes
/// version filtering and messages depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Player identity.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Character class id.
    pub class: CharacterClass,
    /// Player realm.
    pub realm: Realm,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
