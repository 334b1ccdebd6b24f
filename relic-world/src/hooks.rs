//! Integration hooks for the host server's existing callbacks.
//!
//! These bridge the server's own event notifications (NPC death,
//! experience gain, item delivery, whispers) into [`WorldEvent`]s. In a
//! full integration they would be invoked from the server's event
//! manager.

use relic_core::progression::{XpAmounts, XpSource};
use relic_core::types::{ItemSnapshot, PlayerId};

use crate::events::WorldEvent;

/// Create an event from an NPC death notification.
#[must_use]
pub fn on_npc_died(name: String, region: u16, nearby: Vec<PlayerId>) -> WorldEvent {
    WorldEvent::NpcDied {
        name,
        region,
        nearby,
    }
}

/// Create an event from an experience-gain notification.
#[must_use]
pub fn on_experience_gained(
    player: PlayerId,
    base: u64,
    camp: u64,
    group: u64,
    outpost: u64,
    source: XpSource,
) -> WorldEvent {
    WorldEvent::ExperienceGained {
        player,
        amounts: XpAmounts {
            base,
            camp,
            group,
            outpost,
        },
        source,
    }
}

/// Create an event from an item handed to a scholar.
#[must_use]
pub fn on_item_delivered(player: PlayerId, scholar: String, item: ItemSnapshot) -> WorldEvent {
    WorldEvent::ItemDelivered {
        player,
        scholar,
        item,
    }
}

/// Create an event from a whisper addressed to a scholar.
#[must_use]
pub fn on_whisper(player: PlayerId, scholar: String, text: String) -> WorldEvent {
    WorldEvent::Whisper {
        player,
        scholar,
        text,
    }
}
