//! Per-player world state as the subsystem's systems need to see it.

use relic_core::store::{Inventory, MemoryInventory};
use relic_core::types::{
    ArtifactInstance, CharacterClass, ItemSnapshot, PlayerId, PlayerInfo, Realm,
};

/// A connected player: identity, the state flags the subsystem gates
/// on, a backpack, and the equipped artifact instances that can gain
/// experience.
#[derive(Debug)]
pub struct WorldPlayer {
    /// Identity and class/realm attributes.
    pub info: PlayerInfo,
    /// Whether the player's guild carries the artifact-XP buff.
    pub guild_artifact_buff: bool,
    /// Whether the player is currently praying (blocks artifact XP).
    pub praying: bool,
    /// Backpack contents.
    pub backpack: MemoryInventory,
    /// Currently equipped artifact instances.
    pub equipped: Vec<ArtifactInstance>,
}

impl WorldPlayer {
    /// A fresh player with an empty 40-slot backpack.
    #[must_use]
    pub fn new(name: impl Into<String>, class: CharacterClass, realm: Realm) -> Self {
        Self {
            info: PlayerInfo {
                id: PlayerId::new(),
                name: name.into(),
                class,
                realm,
            },
            guild_artifact_buff: false,
            praying: false,
            backpack: MemoryInventory::new(40),
            equipped: Vec::new(),
        }
    }

    /// The first backpack item with this display name, if present.
    #[must_use]
    pub fn find_item(&self, name: &str) -> Option<ItemSnapshot> {
        self.backpack.items().into_iter().find(|i| i.name == name)
    }
}
