//! World events that drive the artifact subsystem.
//!
//! The host server translates its own callbacks into these through the
//! constructors in [`crate::hooks`]; the functions in
//! [`crate::systems`] consume them.

use serde::{Deserialize, Serialize};

use relic_core::progression::{XpAmounts, XpSource};
use relic_core::types::{ItemSnapshot, PlayerId};

/// A world event relevant to the artifact subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorldEvent {
    /// An NPC died; players within the interaction radius may receive
    /// encounter credit.
    NpcDied {
        /// The dying NPC's display name.
        name: String,
        /// Region the death occurred in.
        region: u16,
        /// Players within the interaction radius, as reported by the
        /// host's radius query.
        nearby: Vec<PlayerId>,
    },

    /// A player gained experience from a kill; equipped artifacts may
    /// gain a share.
    ExperienceGained {
        /// The player who gained experience.
        player: PlayerId,
        /// Experience components.
        amounts: XpAmounts,
        /// What kind of kill produced the gain.
        source: XpSource,
    },

    /// A player handed an item to a scholar.
    ItemDelivered {
        /// The delivering player.
        player: PlayerId,
        /// Display name of the receiving scholar.
        scholar: String,
        /// The delivered item.
        item: ItemSnapshot,
    },

    /// A player whispered to a scholar (or clicked a bracketed option).
    Whisper {
        /// The whispering player.
        player: PlayerId,
        /// Display name of the addressed scholar.
        scholar: String,
        /// The whispered text.
        text: String,
    },
}

impl WorldEvent {
    /// The player this event concerns, if it is player-scoped.
    #[must_use]
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::NpcDied { .. } => None,
            Self::ExperienceGained { player, .. }
            | Self::ItemDelivered { player, .. }
            | Self::Whisper { player, .. } => Some(*player),
        }
    }
}
